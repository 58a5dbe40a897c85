//! Stock event records (the audit log).
//!
//! One record per completed mutation. Allocations produce either one record
//! per lot touched or one summary record, depending on [`LogGranularity`].

use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use binstock_core::DomainError;
use binstock_events::Event;

use crate::allocation::FefoAllocation;
use crate::location::Location;
use crate::lot::ReceiveLot;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAction {
    Receive,
    Issue,
    Correct,
    Consume,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogGranularity {
    #[default]
    PerLot,
    Summary,
}

impl FromStr for LogGranularity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_lot" | "per-lot" | "lot" => Ok(LogGranularity::PerLot),
            "summary" => Ok(LogGranularity::Summary),
            other => Err(DomainError::validation(format!("unknown log granularity: {other:?}"))),
        }
    }
}

/// Append-only log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEventRecord {
    pub recorded_at: DateTime<Utc>,
    pub actor: String,
    pub location: Location,
    pub action: StockAction,
    pub item_name: String,
    pub quantity: i64,
    /// `None` only on summary records spanning several lots.
    pub expire_date: Option<NaiveDate>,
    pub note: String,
}

impl Event for StockEventRecord {
    fn event_type(&self) -> &'static str {
        match self.action {
            StockAction::Receive => "stock.received",
            StockAction::Issue => "stock.issued",
            StockAction::Correct => "stock.corrected",
            StockAction::Consume => "stock.consumed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// Who/where/when shared by the records of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    pub recorded_at: DateTime<Utc>,
    pub actor: String,
    pub location: Location,
}

impl RecordContext {
    pub fn new(recorded_at: DateTime<Utc>, actor: impl Into<String>, location: Location) -> Self {
        Self {
            recorded_at,
            actor: actor.into(),
            location,
        }
    }

    fn record(
        &self,
        action: StockAction,
        item_name: &str,
        quantity: i64,
        expire_date: Option<NaiveDate>,
        note: impl Into<String>,
    ) -> StockEventRecord {
        StockEventRecord {
            recorded_at: self.recorded_at,
            actor: self.actor.clone(),
            location: self.location,
            action,
            item_name: item_name.to_string(),
            quantity,
            expire_date,
            note: note.into(),
        }
    }

    pub fn received(&self, lot: &ReceiveLot, note: impl Into<String>) -> StockEventRecord {
        self.record(
            StockAction::Receive,
            &lot.item_name,
            lot.quantity,
            Some(lot.expire_date),
            note,
        )
    }

    pub fn corrected(
        &self,
        item_name: &str,
        quantity: i64,
        expire_date: NaiveDate,
        note: impl Into<String>,
    ) -> StockEventRecord {
        self.record(StockAction::Correct, item_name, quantity, Some(expire_date), note)
    }

    /// Records describing an allocation. Nothing is recorded when nothing was
    /// drawn (an allocation against an empty ledger mutates nothing).
    pub fn allocated(
        &self,
        action: StockAction,
        item_name: &str,
        allocation: &FefoAllocation,
        granularity: LogGranularity,
        note: &str,
    ) -> Vec<StockEventRecord> {
        if allocation.consumed.is_empty() {
            return Vec::new();
        }

        match granularity {
            LogGranularity::PerLot => allocation
                .consumed
                .iter()
                .map(|c| self.record(action, item_name, c.quantity, Some(c.expire_date), note))
                .collect(),
            LogGranularity::Summary => {
                let breakdown = allocation
                    .consumed
                    .iter()
                    .map(|c| format!("{}x{}", c.expire_date, c.quantity))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut summary = format!("lots: {breakdown}");
                if allocation.is_short() {
                    summary.push_str(&format!("; short by {}", allocation.shortfall));
                }
                if !note.is_empty() {
                    summary = format!("{note}; {summary}");
                }
                let expire_date = match allocation.consumed.as_slice() {
                    [only] => Some(only.expire_date),
                    _ => None,
                };
                vec![self.record(
                    action,
                    item_name,
                    allocation.consumed_quantity(),
                    expire_date,
                    summary,
                )]
            }
        }
    }
}
