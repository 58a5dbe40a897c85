//! Value object trait: equality by value, not identity.
//!
//! Lots and ledgers are value objects: an operation never edits one in place,
//! it returns a new value. Two lots with the same attributes are the same lot
//! as far as the domain is concerned.

/// Marker trait for value objects.
///
/// Requires `Clone` (operations derive new values from old ones), `PartialEq`
/// (compared by attributes) and `Debug` (logging, test failures).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
