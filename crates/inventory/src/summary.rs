use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use binstock_core::DomainResult;

use crate::expiry::{ExpiryPolicy, ExpiryStatus, days_until};
use crate::ledger::{LotLedger, StockTotal};
use crate::location::StockKey;
use crate::lot::Lot;

/// One lot as shown on a stock board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotView {
    pub lot: Lot,
    pub days_left: i64,
    pub status: ExpiryStatus,
}

/// A lot needing attention, with the ledger it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryAlert {
    pub key: StockKey,
    pub view: LotView,
}

/// Read-only snapshot of a ledger for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub key: StockKey,
    pub total: StockTotal,
    /// FEFO order.
    pub lots: Vec<LotView>,
}

impl StockSummary {
    pub fn build(
        key: StockKey,
        ledger: &LotLedger,
        today: NaiveDate,
        policy: &ExpiryPolicy,
    ) -> DomainResult<Self> {
        let total = ledger.aggregate_total()?;
        let lots = ledger
            .lots_fefo()
            .into_iter()
            .map(|lot| LotView {
                lot: lot.clone(),
                days_left: days_until(lot.expire_date(), today),
                status: policy.classify(lot.expire_date(), today),
            })
            .collect();
        Ok(Self { key, total, lots })
    }

    /// Most urgent status among the lots, if any.
    pub fn most_urgent(&self) -> Option<ExpiryStatus> {
        self.lots.iter().map(|view| view.status).min()
    }

    /// Lots that are expired, critical or in warning, in FEFO order.
    pub fn alerts(&self) -> Vec<ExpiryAlert> {
        self.lots
            .iter()
            .filter(|view| view.status.needs_attention())
            .map(|view| ExpiryAlert {
                key: self.key.clone(),
                view: view.clone(),
            })
            .collect()
    }
}
