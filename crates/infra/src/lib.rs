//! Infrastructure layer: ledger storage, the event log, configuration and the
//! stock service that ties them to the pure ledger operations.

pub mod config;
pub mod event_log;
pub mod ledger_store;
pub mod stock_service;

mod integration_tests;

pub use config::{ConfigError, StockConfig};
pub use event_log::{EventLog, EventLogError, InMemoryEventLog, LogQuery};
pub use ledger_store::{InMemoryLedgerStore, LedgerStore, LedgerStoreError, VersionedLedger};
pub use stock_service::{IssueOutcome, MutationOutcome, ServiceError, StockService};
