use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use binstock_events::{Event, EventEnvelope};
use binstock_inventory::{Location, StockAction, StockEventRecord};

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("log backend failure: {0}")]
    Backend(String),
}

/// Filter over logged records. Dates are inclusive and compared against the
/// UTC calendar date of `recorded_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub location: Option<Location>,
    pub item_name: Option<String>,
    pub action: Option<StockAction>,
}

impl LogQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn item(mut self, item_name: impl Into<String>) -> Self {
        self.item_name = Some(item_name.into());
        self
    }

    pub fn action(mut self, action: StockAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn validate(&self) -> Result<(), EventLogError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(EventLogError::InvalidQuery(format!(
                    "start date {from} is after end date {to}"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, record: &StockEventRecord) -> bool {
        let day = record.occurred_on();
        self.from.is_none_or(|from| day >= from)
            && self.to.is_none_or(|to| day <= to)
            && self.location.is_none_or(|location| record.location == location)
            && self
                .item_name
                .as_deref()
                .is_none_or(|item| record.item_name == item)
            && self.action.is_none_or(|action| record.action == action)
    }
}

/// Append-only log of stock records.
pub trait EventLog: Send + Sync {
    /// Append records in order, assigning consecutive sequence numbers.
    fn append(
        &self,
        records: Vec<StockEventRecord>,
    ) -> Result<Vec<EventEnvelope<StockEventRecord>>, EventLogError>;

    /// Matching records in sequence order.
    fn query(&self, query: &LogQuery) -> Result<Vec<EventEnvelope<StockEventRecord>>, EventLogError>;
}

impl<L> EventLog for Arc<L>
where
    L: EventLog + ?Sized,
{
    fn append(
        &self,
        records: Vec<StockEventRecord>,
    ) -> Result<Vec<EventEnvelope<StockEventRecord>>, EventLogError> {
        (**self).append(records)
    }

    fn query(&self, query: &LogQuery) -> Result<Vec<EventEnvelope<StockEventRecord>>, EventLogError> {
        (**self).query(query)
    }
}
