use std::collections::BTreeMap;
use std::sync::RwLock;

use binstock_core::ExpectedVersion;
use binstock_inventory::{Location, LotLedger, StockKey};

use super::r#trait::{LedgerStore, LedgerStoreError, VersionedLedger};

#[derive(Debug, Clone)]
struct Slot {
    ledger: LotLedger,
    version: u64,
}

/// In-memory ledger store.
///
/// Emptied ledgers stay behind as tombstones so versions (and lot ids) keep
/// increasing if the item is restocked; they are hidden from `list`.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    slots: RwLock<BTreeMap<StockKey, Slot>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load(&self, key: &StockKey) -> Result<VersionedLedger, LedgerStoreError> {
        let slots = self
            .slots
            .read()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;

        match slots.get(key) {
            Some(slot) => Ok(VersionedLedger {
                key: key.clone(),
                ledger: slot.ledger.clone(),
                version: slot.version,
            }),
            None => {
                let ledger = LotLedger::new(key.item_name.clone())
                    .map_err(|e| LedgerStoreError::InvalidLedger(e.to_string()))?;
                Ok(VersionedLedger {
                    key: key.clone(),
                    ledger,
                    version: 0,
                })
            }
        }
    }

    fn save(
        &self,
        key: &StockKey,
        ledger: LotLedger,
        expected: ExpectedVersion,
    ) -> Result<u64, LedgerStoreError> {
        if ledger.item_name() != key.item_name {
            return Err(LedgerStoreError::InvalidLedger(format!(
                "ledger for '{}' saved under key {key}",
                ledger.item_name()
            )));
        }

        let mut slots = self
            .slots
            .write()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;

        let current = slots.get(key).map(|slot| slot.version).unwrap_or(0);
        expected
            .check(current)
            .map_err(|e| LedgerStoreError::Concurrency(format!("{key}: {e}")))?;

        let version = current + 1;
        slots.insert(key.clone(), Slot { ledger, version });
        Ok(version)
    }

    fn list(&self, location: Location) -> Result<Vec<VersionedLedger>, LedgerStoreError> {
        let slots = self
            .slots
            .read()
            .map_err(|_| LedgerStoreError::Backend("lock poisoned".to_string()))?;

        Ok(slots
            .iter()
            .filter(|(key, slot)| key.location == location && !slot.ledger.is_empty())
            .map(|(key, slot)| VersionedLedger {
                key: key.clone(),
                ledger: slot.ledger.clone(),
                version: slot.version,
            })
            .collect())
    }
}
