//! Results of a FEFO deduction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use binstock_core::ValueObject;

use crate::ledger::LotLedger;
use crate::lot::{Lot, LotId, ReceiveLot};
use crate::units::UnitOfMeasure;

/// Units taken from one lot during an allocation.
///
/// Carries the lot's unit weight and unit so the taken units can be
/// re-received elsewhere (e.g. moved to another warehouse) without losing
/// their per-unit weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedLot {
    pub lot_id: LotId,
    pub expire_date: NaiveDate,
    pub quantity: i64,
    pub unit_weight: Decimal,
    pub unit: UnitOfMeasure,
}

impl ConsumedLot {
    pub(crate) fn take(lot: &Lot, quantity: i64) -> Self {
        Self {
            lot_id: lot.id(),
            expire_date: lot.expire_date(),
            quantity,
            unit_weight: lot.unit_weight(),
            unit: lot.unit(),
        }
    }

    pub fn weight(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_weight
    }

    /// Receipt input carrying the same units into another ledger.
    pub fn to_receive(&self, item_name: impl Into<String>) -> ReceiveLot {
        ReceiveLot {
            item_name: item_name.into(),
            quantity: self.quantity,
            expire_date: self.expire_date,
            unit_weight: self.unit_weight,
            unit: self.unit,
        }
    }
}

/// Outcome of [`LotLedger::allocate_fefo`].
///
/// `sum(consumed quantities) + shortfall == requested`. A shortfall is not an
/// error: whatever stock existed has been drawn, and the caller decides what a
/// nonzero shortfall means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FefoAllocation {
    pub ledger: LotLedger,
    /// Lots drawn from, in FEFO order.
    pub consumed: Vec<ConsumedLot>,
    pub shortfall: i64,
}

impl ValueObject for FefoAllocation {}

impl FefoAllocation {
    pub fn consumed_quantity(&self) -> i64 {
        self.consumed.iter().map(|c| c.quantity).sum()
    }

    pub fn is_short(&self) -> bool {
        self.shortfall > 0
    }

    /// `(expire_date, quantity_taken)` pairs in FEFO order.
    pub fn breakdown(&self) -> Vec<(NaiveDate, i64)> {
        self.consumed.iter().map(|c| (c.expire_date, c.quantity)).collect()
    }
}
