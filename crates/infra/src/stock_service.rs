//! Stock operations over stored ledgers (application-level orchestration).
//!
//! Every mutating operation follows the same pipeline:
//!
//! ```text
//! 1. Load the ledger + its version from the store
//!   ↓
//! 2. Run the pure ledger operation (receive / allocate_fefo / correct)
//!   ↓
//! 3. Save with ExpectedVersion::Exact(read version)
//!      └─ on a concurrency conflict: go back to 1 (bounded retries)
//!   ↓
//! 4. Append records to the event log
//!   ↓
//! 5. Publish the committed envelopes to the bus
//! ```
//!
//! The ledger never sees concurrency; this module is the single place where
//! writers to one item are serialized.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use binstock_core::{DomainError, DomainResult, ExpectedVersion};
use binstock_events::{EventBus, EventEnvelope};
use binstock_inventory::{
    ConsumedLot, Correction, ExpiryAlert, FefoAllocation, Location, LotLedger, LotSelector,
    ReceiveLot, RecordContext, StockAction, StockEventRecord, StockKey, StockSummary,
};

use crate::config::StockConfig;
use crate::event_log::{EventLog, EventLogError, LogQuery};
use crate::ledger_store::{LedgerStore, LedgerStoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Rejected by the ledger before any mutation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage failure, including conflicts that outlived every retry.
    #[error("ledger store: {0}")]
    Store(#[from] LedgerStoreError),

    #[error("event log: {0}")]
    Log(#[from] EventLogError),

    /// Publication failed after the records were appended (republish is safe).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl ServiceError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Store(LedgerStoreError::Concurrency(_)))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Domain(e) if e.is_validation())
    }
}

/// Result of a receive or correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Ledger version after the write.
    pub version: u64,
    pub records: Vec<EventEnvelope<StockEventRecord>>,
}

/// Result of an issue or consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueOutcome {
    /// Lots drawn from, in FEFO order.
    pub consumed: Vec<ConsumedLot>,
    /// Units requested but not in stock. Data, not an error.
    pub shortfall: i64,
    pub source_version: u64,
    /// Version of the receiving ledger, for transfers that moved anything.
    pub destination_version: Option<u64>,
    pub records: Vec<EventEnvelope<StockEventRecord>>,
}

impl IssueOutcome {
    pub fn issued_quantity(&self) -> i64 {
        self.consumed.iter().map(|c| c.quantity).sum()
    }
}

/// Source of record timestamps.
pub type Clock = fn() -> DateTime<Utc>;

/// Stock operations for both warehouses.
#[derive(Debug)]
pub struct StockService<S, L, B> {
    store: S,
    log: L,
    bus: B,
    config: StockConfig,
    clock: Clock,
}

impl<S, L, B> StockService<S, L, B> {
    pub fn new(store: S, log: L, bus: B, config: StockConfig) -> Self {
        Self {
            store,
            log,
            bus,
            config,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    pub fn into_parts(self) -> (S, L, B) {
        (self.store, self.log, self.bus)
    }
}

impl<S, L, B> StockService<S, L, B>
where
    S: LedgerStore,
    L: EventLog,
    B: EventBus<EventEnvelope<StockEventRecord>>,
{
    /// Register a new lot at `location`.
    #[instrument(skip(self, input), fields(item = %input.item_name, quantity = input.quantity))]
    pub fn receive(
        &self,
        actor: &str,
        location: Location,
        input: ReceiveLot,
    ) -> Result<MutationOutcome, ServiceError> {
        let key = StockKey::new(location, input.item_name.clone());
        let merge = self.config.merge_on_receive;

        let ((), version) = self.update(&key, |ledger| {
            let next = ledger.receive(input.clone())?;
            Ok((if merge { next.consolidate()? } else { next }, ()))
        })?;

        let ctx = RecordContext::new((self.clock)(), actor, location);
        let records = self.record(vec![ctx.received(&input, "")])?;

        info!(version, "lot received");
        Ok(MutationOutcome { version, records })
    }

    /// Move `requested` units from the large to the small warehouse, earliest
    /// expiry first. Moved units keep their expiry date and unit weight.
    #[instrument(skip(self))]
    pub fn issue_to_small(
        &self,
        actor: &str,
        item_name: &str,
        requested: i64,
    ) -> Result<IssueOutcome, ServiceError> {
        let source = StockKey::new(Location::LargeWarehouse, item_name);
        let destination = StockKey::new(Location::SmallWarehouse, item_name);

        // Refuse before deducting anything if the small warehouse would
        // reject the moved units.
        let destination_family = self.store.load(&destination)?.ledger.family();

        let (allocation, source_version) = self.update(&source, |ledger| {
            if let (Some(have), Some(incoming)) = (destination_family, ledger.family()) {
                if have != incoming {
                    return Err(DomainError::validation(format!(
                        "cannot move {incoming} stock into {have} ledger {destination}"
                    )));
                }
            }
            let allocation = ledger.allocate_fefo(requested)?;
            Ok((allocation.ledger.clone(), allocation))
        })?;

        let destination_version = if allocation.consumed.is_empty() {
            None
        } else {
            let merge = self.config.merge_on_receive;
            let received = self.update(&destination, |ledger| {
                let next = receive_all(ledger, item_name, &allocation.consumed)?;
                Ok((if merge { next.consolidate()? } else { next }, ()))
            });
            match received {
                Ok(((), version)) => Some(version),
                Err(cause) => return Err(self.roll_back_issue(actor, &source, &allocation, cause)),
            }
        };

        let now = (self.clock)();
        let granularity = self.config.log_granularity;
        let mut records = RecordContext::new(now, actor, Location::LargeWarehouse).allocated(
            StockAction::Issue,
            item_name,
            &allocation,
            granularity,
            "to small_warehouse",
        );
        records.extend(RecordContext::new(now, actor, Location::SmallWarehouse).allocated(
            StockAction::Receive,
            item_name,
            &allocation,
            granularity,
            "from large_warehouse",
        ));
        let records = self.record(records)?;

        report_shortfall(&allocation);
        info!(
            issued = allocation.consumed_quantity(),
            source_version, "stock issued to small warehouse"
        );

        Ok(IssueOutcome {
            consumed: allocation.consumed,
            shortfall: allocation.shortfall,
            source_version,
            destination_version,
            records,
        })
    }

    /// Use up `requested` units from the small warehouse, earliest expiry first.
    #[instrument(skip(self))]
    pub fn consume(
        &self,
        actor: &str,
        item_name: &str,
        requested: i64,
    ) -> Result<IssueOutcome, ServiceError> {
        let key = StockKey::new(Location::SmallWarehouse, item_name);

        let (allocation, version) = self.update(&key, |ledger| {
            let allocation = ledger.allocate_fefo(requested)?;
            Ok((allocation.ledger.clone(), allocation))
        })?;

        let records = RecordContext::new((self.clock)(), actor, key.location).allocated(
            StockAction::Consume,
            item_name,
            &allocation,
            self.config.log_granularity,
            "",
        );
        let records = self.record(records)?;

        report_shortfall(&allocation);
        info!(consumed = allocation.consumed_quantity(), version, "stock consumed");

        Ok(IssueOutcome {
            consumed: allocation.consumed,
            shortfall: allocation.shortfall,
            source_version: version,
            destination_version: None,
            records,
        })
    }

    /// Overwrite one lot after a stocktake. A correction matching the lot as
    /// stored changes nothing and is not recorded.
    #[instrument(skip(self))]
    pub fn correct(
        &self,
        actor: &str,
        key: &StockKey,
        selector: LotSelector,
        correction: Correction,
    ) -> Result<MutationOutcome, ServiceError> {
        let ((before, changed), version) = self.update(key, |ledger| {
            let before = ledger.select(selector).cloned().ok_or_else(DomainError::not_found)?;
            let next = ledger.correct(selector, correction.clone())?;
            let changed = next != *ledger;
            Ok((next, (before, changed)))
        })?;

        if !changed {
            debug!(version, "correction matches stored lot; nothing recorded");
            return Ok(MutationOutcome {
                version,
                records: Vec::new(),
            });
        }

        let quantity = correction.quantity.unwrap_or(before.quantity());
        let expire_date = correction.expire_date.unwrap_or(before.expire_date());
        let note = format!(
            "lot {}: {} x{} -> {} x{}",
            before.id(),
            before.expire_date(),
            before.quantity(),
            expire_date,
            quantity
        );

        let ctx = RecordContext::new((self.clock)(), actor, key.location);
        let records = self.record(vec![ctx.corrected(&key.item_name, quantity, expire_date, note)])?;

        info!(version, "lot corrected");
        Ok(MutationOutcome { version, records })
    }

    /// Aggregate total and FEFO-ordered lots of one ledger.
    pub fn summary(&self, key: &StockKey, today: NaiveDate) -> Result<StockSummary, ServiceError> {
        let current = self.store.load(key)?;
        Ok(StockSummary::build(
            key.clone(),
            &current.ledger,
            today,
            &self.config.expiry,
        )?)
    }

    /// Summaries of every stocked item at a location, optionally narrowed to
    /// item names containing `search` (case-insensitive).
    pub fn stock_board(
        &self,
        location: Location,
        search: Option<&str>,
        today: NaiveDate,
    ) -> Result<Vec<StockSummary>, ServiceError> {
        let needle = search.map(str::to_lowercase);
        self.store
            .list(location)?
            .into_iter()
            .filter(|stored| {
                needle
                    .as_deref()
                    .is_none_or(|n| stored.key.item_name.to_lowercase().contains(n))
            })
            .map(|stored| {
                StockSummary::build(stored.key, &stored.ledger, today, &self.config.expiry)
                    .map_err(ServiceError::from)
            })
            .collect()
    }

    /// Lots at `location` that are expired or close to expiry, most urgent first.
    pub fn near_expiry(
        &self,
        location: Location,
        today: NaiveDate,
    ) -> Result<Vec<ExpiryAlert>, ServiceError> {
        let mut alerts: Vec<ExpiryAlert> = self
            .stock_board(location, None, today)?
            .iter()
            .flat_map(StockSummary::alerts)
            .collect();
        alerts.sort_by(|a, b| {
            (a.view.status, a.view.lot.expire_date(), &a.key.item_name).cmp(&(
                b.view.status,
                b.view.lot.expire_date(),
                &b.key.item_name,
            ))
        });
        Ok(alerts)
    }

    pub fn logs(&self, query: &LogQuery) -> Result<Vec<EventEnvelope<StockEventRecord>>, ServiceError> {
        Ok(self.log.query(query)?)
    }

    /// Read → compute → compare-and-swap, recomputing from a fresh read on
    /// conflict. Unchanged ledgers are not written.
    fn update<T>(
        &self,
        key: &StockKey,
        op: impl Fn(&LotLedger) -> DomainResult<(LotLedger, T)>,
    ) -> Result<(T, u64), ServiceError> {
        let mut attempt = 0u32;
        loop {
            let current = self.store.load(key)?;
            let (next, out) = op(&current.ledger)?;
            next.check_invariants()?;

            if next == current.ledger {
                return Ok((out, current.version));
            }

            match self.store.save(key, next, ExpectedVersion::Exact(current.version)) {
                Ok(version) => return Ok((out, version)),
                Err(LedgerStoreError::Concurrency(msg)) if attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(%key, attempt, %msg, "ledger changed since read; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Undo a committed large-warehouse deduction whose receipt into the
    /// small warehouse failed. Units that cannot be put back are recorded as
    /// issued so the log still accounts for them. Returns `cause`.
    fn roll_back_issue(
        &self,
        actor: &str,
        source: &StockKey,
        allocation: &FefoAllocation,
        cause: ServiceError,
    ) -> ServiceError {
        let restored = self.update(source, |ledger| Ok((ledger.restore(&allocation.consumed)?, ())));
        match restored {
            Ok(((), version)) => {
                warn!(%source, version, error = %cause, "small warehouse receipt failed; deduction restored");
            }
            Err(restore_error) => {
                error!(
                    %source,
                    error = %cause,
                    %restore_error,
                    stranded = allocation.consumed_quantity(),
                    "small warehouse receipt failed and deduction could not be restored"
                );
                let records = RecordContext::new((self.clock)(), actor, source.location).allocated(
                    StockAction::Issue,
                    &source.item_name,
                    allocation,
                    self.config.log_granularity,
                    "to small_warehouse (not received)",
                );
                if let Err(log_error) = self.record(records) {
                    error!(%log_error, "issue records for stranded units were not written");
                }
            }
        }
        cause
    }

    fn record(
        &self,
        records: Vec<StockEventRecord>,
    ) -> Result<Vec<EventEnvelope<StockEventRecord>>, ServiceError> {
        let committed = self.log.append(records)?;
        for envelope in &committed {
            self.bus
                .publish(envelope.clone())
                .map_err(|e| ServiceError::Publish(format!("{e:?}")))?;
        }
        debug!(count = committed.len(), "records appended");
        Ok(committed)
    }
}

fn receive_all(ledger: &LotLedger, item_name: &str, consumed: &[ConsumedLot]) -> DomainResult<LotLedger> {
    consumed
        .iter()
        .try_fold(ledger.clone(), |acc, lot| acc.receive(lot.to_receive(item_name)))
}

fn report_shortfall(allocation: &FefoAllocation) {
    if allocation.is_short() {
        warn!(
            shortfall = allocation.shortfall,
            drawn = allocation.consumed_quantity(),
            "requested quantity exceeds stock"
        );
    }
}
