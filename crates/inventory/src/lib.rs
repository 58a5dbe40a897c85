//! Lot ledger and FEFO allocation for warehouse stock.
//!
//! Pure, deterministic domain logic (no IO, no storage): every operation takes
//! a ledger value and returns a new one plus a structured result.

pub mod allocation;
pub mod expiry;
pub mod ledger;
pub mod location;
pub mod lot;
pub mod record;
pub mod summary;
pub mod units;

pub use allocation::{ConsumedLot, FefoAllocation};
pub use expiry::{ExpiryPolicy, ExpiryStatus, days_until};
pub use ledger::{Correction, LotLedger, LotSelector, StockTotal};
pub use location::{Location, StockKey};
pub use lot::{Lot, LotId, ReceiveLot};
pub use record::{LogGranularity, RecordContext, StockAction, StockEventRecord};
pub use summary::{ExpiryAlert, LotView, StockSummary};
pub use units::{MeasureFamily, SMALL_PER_LARGE, UnitOfMeasure, format_weight};
