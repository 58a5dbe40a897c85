use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use binstock_core::{DomainError, DomainResult, ValueObject};

use crate::units::{MeasureFamily, UnitOfMeasure};

/// Receipt sequence of a lot within its ledger.
///
/// Assigned in receive order, so it doubles as the FEFO tie-break between lots
/// sharing an expiry date.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(u64);

impl LotId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for LotId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Input for registering a new lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveLot {
    pub item_name: String,
    pub quantity: i64,
    pub expire_date: NaiveDate,
    /// Weight/volume of one unit, expressed in `unit`.
    pub unit_weight: Decimal,
    pub unit: UnitOfMeasure,
}

/// A quantity of one item received together, sharing an expiry date.
///
/// Fields are private: `total_weight` is derived and only ever recomputed from
/// `quantity * unit_weight`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    id: LotId,
    item_name: String,
    quantity: i64,
    expire_date: NaiveDate,
    unit_weight: Decimal,
    unit: UnitOfMeasure,
    total_weight: Decimal,
}

impl ValueObject for Lot {}

impl Lot {
    pub(crate) fn new(id: LotId, input: ReceiveLot) -> DomainResult<Self> {
        Ok(Self {
            id,
            total_weight: weight_of(input.quantity, input.unit_weight)?,
            item_name: input.item_name,
            quantity: input.quantity,
            expire_date: input.expire_date,
            unit_weight: input.unit_weight,
            unit: input.unit,
        })
    }

    pub fn id(&self) -> LotId {
        self.id
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn expire_date(&self) -> NaiveDate {
        self.expire_date
    }

    pub fn unit_weight(&self) -> Decimal {
        self.unit_weight
    }

    pub fn unit(&self) -> UnitOfMeasure {
        self.unit
    }

    pub fn family(&self) -> MeasureFamily {
        self.unit.family()
    }

    pub fn total_weight(&self) -> Decimal {
        self.total_weight
    }

    /// Total weight converted into the family's small unit.
    pub fn small_weight(&self) -> DomainResult<Decimal> {
        self.unit.to_small(self.total_weight)
    }

    /// FEFO sort key: earliest expiry first, then receipt order.
    pub fn fefo_key(&self) -> (NaiveDate, LotId) {
        (self.expire_date, self.id)
    }

    /// `total_weight` agrees with `quantity * unit_weight`.
    pub fn is_consistent(&self) -> bool {
        weight_of(self.quantity, self.unit_weight).is_ok_and(|w| w == self.total_weight)
    }

    /// Same lot with a new quantity; weight recomputed from `unit_weight`.
    pub(crate) fn with_quantity(&self, quantity: i64) -> DomainResult<Self> {
        Ok(Self {
            quantity,
            total_weight: weight_of(quantity, self.unit_weight)?,
            ..self.clone()
        })
    }

    pub(crate) fn with_expire_date(self, expire_date: NaiveDate) -> Self {
        Self { expire_date, ..self }
    }

    /// Lots that may be folded together without losing per-unit weight.
    pub(crate) fn can_merge(&self, other: &Lot) -> bool {
        self.item_name == other.item_name
            && self.expire_date == other.expire_date
            && self.unit_weight == other.unit_weight
            && self.unit == other.unit
    }
}

fn weight_of(quantity: i64, unit_weight: Decimal) -> DomainResult<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_weight)
        .ok_or_else(|| DomainError::validation(format!("weight of {quantity} x {unit_weight} is out of range")))
}
