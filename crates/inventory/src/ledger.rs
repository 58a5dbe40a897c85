//! Lot ledger and FEFO (first-expiry-first-out) allocation.
//!
//! A ledger holds every lot of one item in one storage location. All
//! operations are pure: they read `&self` and return a new ledger, so a caller
//! that loses a compare-and-swap race can simply recompute from a fresh read.
//! Serializing writers per item is the storage layer's job, not the ledger's.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use binstock_core::{DomainError, DomainResult, ValueObject};

use crate::allocation::{ConsumedLot, FefoAllocation};
use crate::expiry::{ExpiryPolicy, ExpiryStatus};
use crate::lot::{Lot, LotId, ReceiveLot};
use crate::units::{MeasureFamily, format_weight};

/// Identifies the lot a correction applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotSelector {
    Id(LotId),
    /// The earliest-received lot with this expiry date.
    FirstExpiring(NaiveDate),
}

/// Manual stocktake adjustment. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub quantity: Option<i64>,
    pub expire_date: Option<NaiveDate>,
}

/// Aggregate view of a ledger for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTotal {
    pub quantity: i64,
    /// `None` for an empty ledger.
    pub family: Option<MeasureFamily>,
    /// Summed weight in the family's small unit.
    pub small_weight: Decimal,
    pub weight_display: String,
}

/// All lots of one item within one storage location.
///
/// `lots` is kept in receipt order; FEFO order is derived on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotLedger {
    item_name: String,
    lots: Vec<Lot>,
    next_lot_id: u64,
}

impl ValueObject for LotLedger {}

impl LotLedger {
    /// Empty ledger for an item.
    pub fn new(item_name: impl Into<String>) -> DomainResult<Self> {
        let item_name = item_name.into();
        if item_name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        Ok(Self {
            item_name,
            lots: Vec::new(),
            next_lot_id: 1,
        })
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    /// Lots in receipt order.
    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    /// Lots in FEFO order: earliest expiry first, receipt order on ties.
    pub fn lots_fefo(&self) -> Vec<&Lot> {
        let mut sorted: Vec<&Lot> = self.lots.iter().collect();
        sorted.sort_by_key(|lot| lot.fefo_key());
        sorted
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Units across all lots. `receive` and `correct` refuse ledgers whose
    /// total would not fit in an `i64`, so this only saturates on ledgers that
    /// bypassed them (e.g. deserialized).
    pub fn total_quantity(&self) -> i64 {
        self.lots
            .iter()
            .fold(0i64, |total, lot| total.saturating_add(lot.quantity()))
    }

    /// Measurement family of the ledger (taken from its first lot).
    pub fn family(&self) -> Option<MeasureFamily> {
        self.lots.first().map(Lot::family)
    }

    pub fn lot(&self, id: LotId) -> Option<&Lot> {
        self.lots.iter().find(|lot| lot.id() == id)
    }

    /// The lot a selector refers to, if present.
    pub fn select(&self, selector: LotSelector) -> Option<&Lot> {
        self.position(selector).map(|idx| &self.lots[idx])
    }

    /// Append a new lot.
    ///
    /// Backdated expiry dates are accepted. A unit from a different
    /// measurement family than the existing lots is rejected.
    pub fn receive(&self, input: ReceiveLot) -> DomainResult<LotLedger> {
        if input.item_name != self.item_name {
            return Err(DomainError::validation(format!(
                "lot for '{}' cannot be received into ledger '{}'",
                input.item_name, self.item_name
            )));
        }
        if input.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if input.unit_weight < Decimal::ZERO {
            return Err(DomainError::validation("unit weight cannot be negative"));
        }
        if let Some(family) = self.family() {
            if family != input.unit.family() {
                return Err(DomainError::validation(format!(
                    "cannot mix {} lot into {family} ledger '{}'",
                    input.unit.family(),
                    self.item_name
                )));
            }
        }

        let mut next = self.clone();
        let id = LotId::new(next.next_lot_id);
        next.next_lot_id += 1;
        next.lots.push(Lot::new(id, input)?);
        next.totals()?;
        Ok(next)
    }

    /// Fold lots with identical expiry, unit weight and unit into the earliest
    /// received of them.
    pub fn consolidate(&self) -> DomainResult<LotLedger> {
        let mut merged: Vec<Lot> = Vec::with_capacity(self.lots.len());
        for lot in &self.lots {
            match merged.iter_mut().find(|m| m.can_merge(lot)) {
                Some(target) => {
                    let quantity = target
                        .quantity()
                        .checked_add(lot.quantity())
                        .ok_or_else(|| quantity_overflow(&self.item_name))?;
                    *target = target.with_quantity(quantity)?;
                }
                None => merged.push(lot.clone()),
            }
        }
        Ok(LotLedger {
            lots: merged,
            ..self.clone()
        })
    }

    /// Put units drawn by an earlier allocation back into their lots.
    ///
    /// Lots still present grow by the drawn quantity; lots that were fully
    /// consumed come back under their original id, so FEFO order and the
    /// receipt tie-break are unchanged.
    pub fn restore(&self, drawn: &[ConsumedLot]) -> DomainResult<LotLedger> {
        let mut next = self.clone();
        for taken in drawn {
            if taken.quantity <= 0 {
                return Err(DomainError::validation("restored quantity must be positive"));
            }
            if taken.lot_id.value() >= next.next_lot_id {
                return Err(DomainError::validation(format!(
                    "lot {} was never issued by ledger '{}'",
                    taken.lot_id, next.item_name
                )));
            }
            match next.lots.iter().position(|lot| lot.id() == taken.lot_id) {
                Some(idx) => {
                    let quantity = next.lots[idx]
                        .quantity()
                        .checked_add(taken.quantity)
                        .ok_or_else(|| quantity_overflow(&next.item_name))?;
                    next.lots[idx] = next.lots[idx].with_quantity(quantity)?;
                }
                None => {
                    if let Some(family) = next.family() {
                        if family != taken.unit.family() {
                            return Err(DomainError::validation(format!(
                                "cannot restore {} units into {family} ledger '{}'",
                                taken.unit.family(),
                                next.item_name
                            )));
                        }
                    }
                    let lot = Lot::new(taken.lot_id, taken.to_receive(next.item_name.clone()))?;
                    let at = next
                        .lots
                        .iter()
                        .position(|lot| lot.id() > taken.lot_id)
                        .unwrap_or(next.lots.len());
                    next.lots.insert(at, lot);
                }
            }
        }
        next.totals()?;
        Ok(next)
    }

    /// Deduct `requested` units in FEFO order.
    ///
    /// Whole lots are consumed until the remainder fits inside one lot, which
    /// is split. When stock runs out the ledger is drained and the missing
    /// amount is reported as `shortfall`.
    pub fn allocate_fefo(&self, requested: i64) -> DomainResult<FefoAllocation> {
        if requested <= 0 {
            return Err(DomainError::validation("requested quantity must be positive"));
        }

        let mut order: Vec<usize> = (0..self.lots.len()).collect();
        order.sort_by_key(|&idx| self.lots[idx].fefo_key());

        let mut left: Vec<i64> = self.lots.iter().map(Lot::quantity).collect();
        let mut remaining = requested;
        let mut consumed = Vec::new();

        for idx in order {
            if remaining == 0 {
                break;
            }
            let take = left[idx].min(remaining);
            if take == 0 {
                continue;
            }
            left[idx] -= take;
            remaining -= take;
            consumed.push(ConsumedLot::take(&self.lots[idx], take));
        }

        let lots = self
            .lots
            .iter()
            .zip(left)
            .filter(|(_, quantity)| *quantity > 0)
            .map(|(lot, quantity)| {
                if quantity == lot.quantity() {
                    Ok(lot.clone())
                } else {
                    lot.with_quantity(quantity)
                }
            })
            .collect::<DomainResult<Vec<Lot>>>()?;

        Ok(FefoAllocation {
            ledger: LotLedger {
                lots,
                ..self.clone()
            },
            consumed,
            shortfall: remaining,
        })
    }

    /// Overwrite one lot's quantity and/or expiry (stocktake). A zero quantity
    /// removes the lot. FEFO order plays no part here.
    pub fn correct(&self, selector: LotSelector, correction: Correction) -> DomainResult<LotLedger> {
        if correction.quantity.is_none() && correction.expire_date.is_none() {
            return Err(DomainError::validation("correction must change quantity or expiry"));
        }
        if matches!(correction.quantity, Some(q) if q < 0) {
            return Err(DomainError::validation("corrected quantity cannot be negative"));
        }

        let idx = self.position(selector).ok_or_else(DomainError::not_found)?;
        let mut next = self.clone();
        let current = &next.lots[idx];
        let quantity = correction.quantity.unwrap_or(current.quantity());

        if quantity == 0 {
            next.lots.remove(idx);
            return Ok(next);
        }

        let mut lot = current.with_quantity(quantity)?;
        if let Some(expire_date) = correction.expire_date {
            lot = lot.with_expire_date(expire_date);
        }
        next.lots[idx] = lot;
        next.totals()?;
        Ok(next)
    }

    /// Total quantity and weight, rendered in the family's display unit.
    ///
    /// A ledger mixing mass and volume lots is rejected rather than summed.
    pub fn aggregate_total(&self) -> DomainResult<StockTotal> {
        let family = self.family();
        if let Some(family) = family {
            if let Some(odd) = self.lots.iter().find(|lot| lot.family() != family) {
                return Err(DomainError::validation(format!(
                    "ledger '{}' mixes {family} and {} lots",
                    self.item_name,
                    odd.family()
                )));
            }
        }

        let (quantity, small_weight) = self.totals()?;
        let weight_display = match family {
            Some(family) => format_weight(family, small_weight),
            None => "0".to_string(),
        };

        Ok(StockTotal {
            quantity,
            family,
            small_weight,
            weight_display,
        })
    }

    /// Lots needing attention (expired, critical, warning), in FEFO order.
    pub fn near_expiry(&self, today: NaiveDate, policy: &ExpiryPolicy) -> Vec<(&Lot, ExpiryStatus)> {
        self.lots_fefo()
            .into_iter()
            .map(|lot| (lot, policy.classify(lot.expire_date(), today)))
            .filter(|(_, status)| status.needs_attention())
            .collect()
    }

    /// Verify the at-rest invariants. Useful on ledgers read back from storage.
    pub fn check_invariants(&self) -> DomainResult<()> {
        for lot in &self.lots {
            if lot.quantity() <= 0 {
                return Err(DomainError::invariant(format!("lot {} has non-positive quantity", lot.id())));
            }
            if !lot.is_consistent() {
                return Err(DomainError::invariant(format!(
                    "lot {} total weight does not match quantity * unit weight",
                    lot.id()
                )));
            }
            if lot.item_name() != self.item_name {
                return Err(DomainError::invariant(format!("lot {} belongs to another item", lot.id())));
            }
            if lot.id().value() >= self.next_lot_id {
                return Err(DomainError::invariant(format!("lot {} was never issued by this ledger", lot.id())));
            }
        }
        self.totals().map_err(|e| DomainError::invariant(e.to_string()))?;
        Ok(())
    }

    /// Quantity and small-unit weight summed with overflow checks.
    fn totals(&self) -> DomainResult<(i64, Decimal)> {
        self.lots.iter().try_fold((0i64, Decimal::ZERO), |(quantity, weight), lot| {
            let quantity = quantity
                .checked_add(lot.quantity())
                .ok_or_else(|| quantity_overflow(&self.item_name))?;
            let weight = weight.checked_add(lot.small_weight()?).ok_or_else(|| {
                DomainError::validation(format!("total weight of '{}' is out of range", self.item_name))
            })?;
            Ok((quantity, weight))
        })
    }

    fn position(&self, selector: LotSelector) -> Option<usize> {
        match selector {
            LotSelector::Id(id) => self.lots.iter().position(|lot| lot.id() == id),
            LotSelector::FirstExpiring(date) => self
                .lots
                .iter()
                .enumerate()
                .filter(|(_, lot)| lot.expire_date() == date)
                .min_by_key(|(_, lot)| lot.id())
                .map(|(idx, _)| idx),
        }
    }
}

fn quantity_overflow(item_name: &str) -> DomainError {
    DomainError::validation(format!("total quantity of '{item_name}' is out of range"))
}
