//! Append-only stock event log.
//!
//! Records are written once, assigned a sequence number, and never modified.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventLog;
pub use r#trait::{EventLog, EventLogError, LogQuery};
