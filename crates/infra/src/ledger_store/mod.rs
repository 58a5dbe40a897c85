//! Versioned ledger storage boundary.
//!
//! The allocator is pure; this is where writes to one item's ledger are
//! serialized. Every save names the version it was computed from, and a stale
//! version is rejected so the caller can recompute from a fresh read.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::{LedgerStore, LedgerStoreError, VersionedLedger};
