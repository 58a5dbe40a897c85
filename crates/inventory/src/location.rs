use serde::{Deserialize, Serialize};

/// Storage area holding a ledger.
///
/// Stock arrives in the large warehouse, is issued from there into the small
/// warehouse, and is consumed from the small warehouse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    LargeWarehouse,
    SmallWarehouse,
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Location::LargeWarehouse => f.write_str("large_warehouse"),
            Location::SmallWarehouse => f.write_str("small_warehouse"),
        }
    }
}

/// Identifies one ledger: an item within a location.
///
/// Item names are compared exactly (case-sensitive, not trimmed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub location: Location,
    pub item_name: String,
}

impl StockKey {
    pub fn new(location: Location, item_name: impl Into<String>) -> Self {
        Self {
            location,
            item_name: item_name.into(),
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.location, self.item_name)
    }
}
