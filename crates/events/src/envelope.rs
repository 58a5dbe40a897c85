use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Event;

/// Envelope for an event, as handed out by an append-only log.
///
/// - `sequence_number` is monotonically increasing per log, starting at 1.
/// - `event_type`/`event_version` are captured at append time so readers can
///   route payloads without deserializing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    /// Monotonically increasing position in the log.
    sequence_number: u64,

    event_type: String,
    event_version: u32,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        sequence_number: u64,
        event_type: impl Into<String>,
        event_version: u32,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            sequence_number,
            event_type: event_type.into(),
            event_version,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, taking type and version from the event itself.
    pub fn wrap(event_id: Uuid, sequence_number: u64, payload: E) -> Self {
        let event_type = payload.event_type();
        let event_version = payload.version();
        Self::new(event_id, sequence_number, event_type, event_version, payload)
    }
}
