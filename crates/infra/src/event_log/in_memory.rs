use std::sync::RwLock;

use uuid::Uuid;

use binstock_events::EventEnvelope;
use binstock_inventory::StockEventRecord;

use super::r#trait::{EventLog, EventLogError, LogQuery};

/// In-memory append-only log. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    entries: RwLock<Vec<EventEnvelope<StockEventRecord>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventLog for InMemoryEventLog {
    fn append(
        &self,
        records: Vec<StockEventRecord>,
    ) -> Result<Vec<EventEnvelope<StockEventRecord>>, EventLogError> {
        if records.is_empty() {
            return Ok(vec![]);
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|_| EventLogError::Backend("lock poisoned".to_string()))?;

        let mut next = entries.last().map(|e| e.sequence_number()).unwrap_or(0) + 1;
        let mut committed = Vec::with_capacity(records.len());
        for record in records {
            let envelope = EventEnvelope::wrap(Uuid::now_v7(), next, record);
            next += 1;
            entries.push(envelope.clone());
            committed.push(envelope);
        }

        Ok(committed)
    }

    fn query(&self, query: &LogQuery) -> Result<Vec<EventEnvelope<StockEventRecord>>, EventLogError> {
        query.validate()?;

        let entries = self
            .entries
            .read()
            .map_err(|_| EventLogError::Backend("lock poisoned".to_string()))?;

        Ok(entries
            .iter()
            .filter(|e| query.matches(e.payload()))
            .cloned()
            .collect())
    }
}
