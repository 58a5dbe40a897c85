//! Event records and their distribution.
//!
//! Stock operations emit append-only event records. This crate holds the
//! domain-agnostic pieces: the `Event` trait, the sequence-numbered envelope a
//! log assigns on append, and a small pub/sub bus for downstream readers.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
