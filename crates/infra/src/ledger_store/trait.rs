use std::sync::Arc;

use thiserror::Error;

use binstock_core::ExpectedVersion;
use binstock_inventory::{Location, LotLedger, StockKey};

/// A ledger snapshot together with the version it was read at.
///
/// Version 0 means the ledger has never been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedLedger {
    pub key: StockKey,
    pub ledger: LotLedger,
    pub version: u64,
}

/// Ledger store operation error.
///
/// These are storage errors, as opposed to domain errors (validation,
/// invariants) raised by the ledger itself.
#[derive(Debug, Error)]
pub enum LedgerStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("invalid ledger: {0}")]
    InvalidLedger(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Get/put storage for ledgers, keyed by location + item.
///
/// Implementations must:
/// - return an empty ledger at version 0 for unknown keys
/// - reject `save` when `expected` does not match the stored version
/// - advance the version by exactly one per successful save
/// - leave empty ledgers out of `list`
pub trait LedgerStore: Send + Sync {
    fn load(&self, key: &StockKey) -> Result<VersionedLedger, LedgerStoreError>;

    /// Replace the ledger, returning the new version.
    fn save(
        &self,
        key: &StockKey,
        ledger: LotLedger,
        expected: ExpectedVersion,
    ) -> Result<u64, LedgerStoreError>;

    /// Non-empty ledgers at a location, ordered by item name.
    fn list(&self, location: Location) -> Result<Vec<VersionedLedger>, LedgerStoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn load(&self, key: &StockKey) -> Result<VersionedLedger, LedgerStoreError> {
        (**self).load(key)
    }

    fn save(
        &self,
        key: &StockKey,
        ledger: LotLedger,
        expected: ExpectedVersion,
    ) -> Result<u64, LedgerStoreError> {
        (**self).save(key, ledger, expected)
    }

    fn list(&self, location: Location) -> Result<Vec<VersionedLedger>, LedgerStoreError> {
        (**self).list(location)
    }
}
