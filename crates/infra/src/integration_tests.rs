//! Integration tests for the full stock pipeline.
//!
//! Tests: StockService → LedgerStore → EventLog → EventBus
//!
//! Verifies:
//! - Receipts, transfers and consumption move stock in FEFO order
//! - Shortfalls are reported as data and still drain the ledger
//! - Stale writers are retried from a fresh read
//! - Every mutation lands in the log and on the bus

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use binstock_core::ExpectedVersion;
    use binstock_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use binstock_inventory::{
        Correction, ExpiryStatus, Location, LotLedger, LotSelector, ReceiveLot, StockAction,
        StockEventRecord, StockKey, UnitOfMeasure,
    };

    use crate::config::StockConfig;
    use crate::event_log::{EventLog, InMemoryEventLog, LogQuery};
    use crate::ledger_store::{InMemoryLedgerStore, LedgerStore, LedgerStoreError, VersionedLedger};
    use crate::stock_service::StockService;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<StockEventRecord>>>;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lot(item: &str, quantity: i64, expire_date: NaiveDate) -> ReceiveLot {
        ReceiveLot {
            item_name: item.to_string(),
            quantity,
            expire_date,
            unit_weight: Decimal::from(200),
            unit: UnitOfMeasure::Gram,
        }
    }

    fn setup_with<S: LedgerStore>(
        store: S,
        config: StockConfig,
    ) -> (StockService<S, Arc<InMemoryEventLog>, Bus>, Arc<InMemoryEventLog>, Bus) {
        binstock_observability::init();
        let log = Arc::new(InMemoryEventLog::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let service = StockService::new(store, log.clone(), bus.clone(), config).with_clock(fixed_now);
        (service, log, bus)
    }

    fn setup() -> (
        StockService<Arc<InMemoryLedgerStore>, Arc<InMemoryEventLog>, Bus>,
        Arc<InMemoryEventLog>,
        Bus,
    ) {
        setup_with(Arc::new(InMemoryLedgerStore::new()), StockConfig::default())
    }

    #[test]
    fn receive_issue_and_consume_follow_fefo() {
        let (service, _, _) = setup();

        service.receive("kim", Location::LargeWarehouse, lot("tofu", 5, date(2025, 1, 20))).unwrap();
        service.receive("kim", Location::LargeWarehouse, lot("tofu", 3, date(2025, 1, 15))).unwrap();

        let issued = service.issue_to_small("kim", "tofu", 4).unwrap();
        assert_eq!(issued.shortfall, 0);
        let breakdown: Vec<(NaiveDate, i64)> =
            issued.consumed.iter().map(|c| (c.expire_date, c.quantity)).collect();
        assert_eq!(breakdown, vec![(date(2025, 1, 15), 3), (date(2025, 1, 20), 1)]);
        assert!(issued.destination_version.is_some());

        let large = service
            .summary(&StockKey::new(Location::LargeWarehouse, "tofu"), date(2025, 1, 10))
            .unwrap();
        assert_eq!(large.total.quantity, 4);
        assert_eq!(large.total.weight_display, "800g");

        let consumed = service.consume("lee", "tofu", 2).unwrap();
        assert_eq!(consumed.consumed[0].expire_date, date(2025, 1, 15));

        let small = service
            .summary(&StockKey::new(Location::SmallWarehouse, "tofu"), date(2025, 1, 10))
            .unwrap();
        let lots: Vec<(NaiveDate, i64)> = small
            .lots
            .iter()
            .map(|v| (v.lot.expire_date(), v.lot.quantity()))
            .collect();
        assert_eq!(lots, vec![(date(2025, 1, 15), 1), (date(2025, 1, 20), 1)]);
        assert!(small.lots.iter().all(|v| v.lot.unit_weight() == Decimal::from(200)));
    }

    #[test]
    fn shortfall_is_reported_and_drains_the_ledger() {
        let (service, _, _) = setup();
        service.receive("kim", Location::SmallWarehouse, lot("kimchi", 5, date(2025, 2, 1))).unwrap();

        let outcome = service.consume("kim", "kimchi", 8).unwrap();

        assert_eq!(outcome.issued_quantity(), 5);
        assert_eq!(outcome.shortfall, 3);
        let board = service.stock_board(Location::SmallWarehouse, None, date(2025, 1, 10)).unwrap();
        assert!(board.is_empty());
    }

    #[test]
    fn consuming_unknown_item_changes_nothing_and_logs_nothing() {
        let (service, log, _) = setup();

        let outcome = service.consume("kim", "ghost", 2).unwrap();

        assert_eq!(outcome.shortfall, 2);
        assert_eq!(outcome.source_version, 0);
        assert!(log.is_empty());
    }

    #[test]
    fn invalid_requests_are_rejected_without_side_effects() {
        let (service, log, _) = setup();
        service.receive("kim", Location::LargeWarehouse, lot("oil", 2, date(2025, 3, 1))).unwrap();

        assert!(service.consume("kim", "oil", 0).unwrap_err().is_validation());
        assert!(
            service
                .receive("kim", Location::LargeWarehouse, lot("oil", -1, date(2025, 3, 1)))
                .unwrap_err()
                .is_validation()
        );

        let mut volume = lot("oil", 1, date(2025, 3, 1));
        volume.unit = UnitOfMeasure::Liter;
        assert!(
            service
                .receive("kim", Location::LargeWarehouse, volume)
                .unwrap_err()
                .is_validation()
        );

        assert_eq!(log.len(), 1);
    }

    #[test]
    fn transfer_refuses_mismatched_destination_family() {
        let (service, _, _) = setup();
        service.receive("kim", Location::LargeWarehouse, lot("soy", 4, date(2025, 3, 1))).unwrap();
        let mut litres = lot("soy", 1, date(2025, 3, 1));
        litres.unit = UnitOfMeasure::Liter;
        service.receive("kim", Location::SmallWarehouse, litres).unwrap();

        let err = service.issue_to_small("kim", "soy", 2).unwrap_err();

        assert!(err.is_validation());
        let large = service
            .summary(&StockKey::new(Location::LargeWarehouse, "soy"), date(2025, 1, 10))
            .unwrap();
        assert_eq!(large.total.quantity, 4);
    }

    #[test]
    fn correction_overwrites_one_lot_and_is_logged() {
        let (service, log, _) = setup();
        let key = StockKey::new(Location::SmallWarehouse, "egg");
        service.receive("kim", key.location, lot("egg", 10, date(2025, 1, 12))).unwrap();
        service.receive("kim", key.location, lot("egg", 6, date(2025, 1, 30))).unwrap();

        service
            .correct(
                "park",
                &key,
                LotSelector::FirstExpiring(date(2025, 1, 30)),
                Correction {
                    quantity: Some(4),
                    expire_date: None,
                },
            )
            .unwrap();

        let summary = service.summary(&key, date(2025, 1, 10)).unwrap();
        assert_eq!(summary.total.quantity, 14);
        assert_eq!(summary.lots[1].lot.total_weight(), Decimal::from(800));

        let corrections = log
            .query(&LogQuery::all().action(StockAction::Correct))
            .unwrap();
        assert_eq!(corrections.len(), 1);
        let record = corrections[0].payload();
        assert_eq!(record.actor, "park");
        assert_eq!(record.quantity, 4);
        assert_eq!(record.note, "lot #2: 2025-01-30 x6 -> 2025-01-30 x4");
    }

    #[test]
    fn correcting_a_missing_lot_is_not_found() {
        let (service, _, _) = setup();
        let key = StockKey::new(Location::SmallWarehouse, "egg");
        let err = service
            .correct(
                "park",
                &key,
                LotSelector::FirstExpiring(date(2025, 1, 1)),
                Correction {
                    quantity: Some(1),
                    expire_date: None,
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            crate::stock_service::ServiceError::Domain(binstock_core::DomainError::NotFound)
        ));
    }

    #[test]
    fn records_reach_log_and_bus_per_lot() {
        let (service, log, bus) = setup();
        let subscription = bus.subscribe();

        service.receive("kim", Location::LargeWarehouse, lot("ham", 2, date(2025, 1, 11))).unwrap();
        service.receive("kim", Location::LargeWarehouse, lot("ham", 2, date(2025, 1, 12))).unwrap();
        service.issue_to_small("kim", "ham", 3).unwrap();

        // 2 receipts + 2 issue records + 2 small-warehouse receipts.
        let published = subscription.drain();
        assert_eq!(published.len(), 6);
        let seqs: Vec<u64> = published.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);

        let issues = log
            .query(
                &LogQuery::between(date(2025, 1, 10), date(2025, 1, 10))
                    .at(Location::LargeWarehouse)
                    .action(StockAction::Issue),
            )
            .unwrap();
        let issued: Vec<i64> = issues.iter().map(|e| e.payload().quantity).collect();
        assert_eq!(issued, vec![2, 1]);
        assert!(issues.iter().all(|e| e.payload().note == "to small_warehouse"));
    }

    #[test]
    fn summary_granularity_logs_one_record_per_allocation() {
        let config = StockConfig {
            log_granularity: binstock_inventory::LogGranularity::Summary,
            ..StockConfig::default()
        };
        let (service, log, _) = setup_with(Arc::new(InMemoryLedgerStore::new()), config);
        service.receive("kim", Location::SmallWarehouse, lot("ham", 2, date(2025, 1, 11))).unwrap();
        service.receive("kim", Location::SmallWarehouse, lot("ham", 2, date(2025, 1, 12))).unwrap();

        service.consume("kim", "ham", 3).unwrap();

        let consumed = log.query(&LogQuery::all().action(StockAction::Consume)).unwrap();
        assert_eq!(consumed.len(), 1);
        assert_eq!(consumed[0].payload().quantity, 3);
        assert_eq!(consumed[0].payload().note, "lots: 2025-01-11x2, 2025-01-12x1");
    }

    #[test]
    fn merge_on_receive_folds_matching_lots() {
        let config = StockConfig {
            merge_on_receive: true,
            ..StockConfig::default()
        };
        let (service, _, _) = setup_with(Arc::new(InMemoryLedgerStore::new()), config);
        let key = StockKey::new(Location::LargeWarehouse, "salt");

        service.receive("kim", key.location, lot("salt", 2, date(2025, 5, 1))).unwrap();
        service.receive("kim", key.location, lot("salt", 3, date(2025, 5, 1))).unwrap();

        let summary = service.summary(&key, date(2025, 1, 10)).unwrap();
        assert_eq!(summary.lots.len(), 1);
        assert_eq!(summary.lots[0].lot.quantity(), 5);
        assert_eq!(summary.total.weight_display, "1kg");
    }

    #[test]
    fn near_expiry_lists_urgent_lots_first() {
        let (service, _, _) = setup();
        service.receive("kim", Location::SmallWarehouse, lot("milk", 1, date(2025, 1, 15))).unwrap();
        service.receive("kim", Location::SmallWarehouse, lot("milk", 1, date(2025, 3, 1))).unwrap();
        service.receive("kim", Location::SmallWarehouse, lot("bread", 1, date(2025, 1, 9))).unwrap();
        service.receive("kim", Location::SmallWarehouse, lot("cream", 1, date(2025, 1, 12))).unwrap();

        let alerts = service.near_expiry(Location::SmallWarehouse, date(2025, 1, 10)).unwrap();

        let view: Vec<(&str, ExpiryStatus)> = alerts
            .iter()
            .map(|a| (a.key.item_name.as_str(), a.view.status))
            .collect();
        assert_eq!(
            view,
            vec![
                ("bread", ExpiryStatus::Expired),
                ("cream", ExpiryStatus::Critical),
                ("milk", ExpiryStatus::Warning),
            ]
        );
    }

    #[test]
    fn stock_board_search_is_case_insensitive() {
        let (service, _, _) = setup();
        service.receive("kim", Location::LargeWarehouse, lot("Green Tea", 1, date(2025, 6, 1))).unwrap();
        service.receive("kim", Location::LargeWarehouse, lot("coffee", 1, date(2025, 6, 1))).unwrap();

        let found = service
            .stock_board(Location::LargeWarehouse, Some("tea"), date(2025, 1, 10))
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key.item_name, "Green Tea");
    }

    /// Store that lets another writer slip in once before the first save.
    struct RacingStore {
        inner: InMemoryLedgerStore,
        raced: AtomicBool,
        always: bool,
    }

    impl RacingStore {
        fn new(always: bool) -> Self {
            Self {
                inner: InMemoryLedgerStore::new(),
                raced: AtomicBool::new(false),
                always,
            }
        }
    }

    impl LedgerStore for RacingStore {
        fn load(&self, key: &StockKey) -> Result<VersionedLedger, LedgerStoreError> {
            self.inner.load(key)
        }

        fn save(
            &self,
            key: &StockKey,
            ledger: LotLedger,
            expected: ExpectedVersion,
        ) -> Result<u64, LedgerStoreError> {
            if self.always || !self.raced.swap(true, Ordering::SeqCst) {
                // A concurrent receipt of one unit lands first.
                let current = self.inner.load(key)?;
                let bumped = current
                    .ledger
                    .receive(lot(&key.item_name, 1, date(2025, 1, 1)))
                    .map_err(|e| LedgerStoreError::InvalidLedger(e.to_string()))?;
                self.inner.save(key, bumped, ExpectedVersion::Exact(current.version))?;
            }
            self.inner.save(key, ledger, expected)
        }

        fn list(&self, location: Location) -> Result<Vec<VersionedLedger>, LedgerStoreError> {
            self.inner.list(location)
        }
    }

    #[test]
    fn conflicting_write_is_retried_from_fresh_state() {
        let (service, _, _) = setup_with(RacingStore::new(false), StockConfig::default());

        service.receive("kim", Location::SmallWarehouse, lot("rice", 5, date(2025, 2, 1))).unwrap();

        let summary = service
            .summary(&StockKey::new(Location::SmallWarehouse, "rice"), date(2025, 1, 10))
            .unwrap();
        // Neither the racing unit nor ours was lost.
        assert_eq!(summary.total.quantity, 6);
    }

    #[test]
    fn conflicts_beyond_retry_budget_surface_as_errors() {
        let config = StockConfig {
            max_conflict_retries: 2,
            ..StockConfig::default()
        };
        let (service, log, _) = setup_with(RacingStore::new(true), config);

        let err = service
            .receive("kim", Location::SmallWarehouse, lot("rice", 5, date(2025, 2, 1)))
            .unwrap_err();

        assert!(err.is_conflict());
        assert!(log.is_empty());
    }

    /// Store whose small-warehouse saves always lose the race.
    struct SmallWarehouseContended {
        inner: InMemoryLedgerStore,
    }

    impl LedgerStore for SmallWarehouseContended {
        fn load(&self, key: &StockKey) -> Result<VersionedLedger, LedgerStoreError> {
            self.inner.load(key)
        }

        fn save(
            &self,
            key: &StockKey,
            ledger: LotLedger,
            expected: ExpectedVersion,
        ) -> Result<u64, LedgerStoreError> {
            if key.location == Location::SmallWarehouse {
                return Err(LedgerStoreError::Concurrency(format!("{key}: contended")));
            }
            self.inner.save(key, ledger, expected)
        }

        fn list(&self, location: Location) -> Result<Vec<VersionedLedger>, LedgerStoreError> {
            self.inner.list(location)
        }
    }

    /// Store that accepts a fixed number of saves, then fails every one after.
    struct SaveBudget {
        inner: InMemoryLedgerStore,
        remaining: AtomicUsize,
    }

    impl LedgerStore for SaveBudget {
        fn load(&self, key: &StockKey) -> Result<VersionedLedger, LedgerStoreError> {
            self.inner.load(key)
        }

        fn save(
            &self,
            key: &StockKey,
            ledger: LotLedger,
            expected: ExpectedVersion,
        ) -> Result<u64, LedgerStoreError> {
            self.remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .map_err(|_| LedgerStoreError::Backend("disk full".to_string()))?;
            self.inner.save(key, ledger, expected)
        }

        fn list(&self, location: Location) -> Result<Vec<VersionedLedger>, LedgerStoreError> {
            self.inner.list(location)
        }
    }

    #[test]
    fn failed_transfer_puts_units_back_in_large_warehouse() {
        let store = SmallWarehouseContended {
            inner: InMemoryLedgerStore::new(),
        };
        let (service, log, _) = setup_with(store, StockConfig::default());
        service.receive("kim", Location::LargeWarehouse, lot("tofu", 2, date(2025, 1, 20))).unwrap();
        service.receive("kim", Location::LargeWarehouse, lot("tofu", 3, date(2025, 1, 15))).unwrap();
        let before = service
            .summary(&StockKey::new(Location::LargeWarehouse, "tofu"), date(2025, 1, 10))
            .unwrap();

        let err = service.issue_to_small("kim", "tofu", 4).unwrap_err();

        assert!(err.is_conflict());
        let large = service
            .summary(&StockKey::new(Location::LargeWarehouse, "tofu"), date(2025, 1, 10))
            .unwrap();
        assert_eq!(large.total, before.total);
        assert_eq!(large.lots, before.lots);
        let small = service
            .summary(&StockKey::new(Location::SmallWarehouse, "tofu"), date(2025, 1, 10))
            .unwrap();
        assert_eq!(small.total.quantity, 0);
        assert!(log.query(&LogQuery::all().action(StockAction::Issue)).unwrap().is_empty());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn stranded_transfer_is_still_logged_as_issued() {
        // One save for the receipt, one for the deduction; nothing after.
        let store = SaveBudget {
            inner: InMemoryLedgerStore::new(),
            remaining: AtomicUsize::new(2),
        };
        let (service, log, _) = setup_with(store, StockConfig::default());
        service.receive("kim", Location::LargeWarehouse, lot("tofu", 5, date(2025, 1, 20))).unwrap();

        let err = service.issue_to_small("kim", "tofu", 3).unwrap_err();

        assert!(matches!(
            err,
            crate::stock_service::ServiceError::Store(LedgerStoreError::Backend(_))
        ));
        let large = service
            .summary(&StockKey::new(Location::LargeWarehouse, "tofu"), date(2025, 1, 10))
            .unwrap();
        assert_eq!(large.total.quantity, 2);

        let issues = log.query(&LogQuery::all().action(StockAction::Issue)).unwrap();
        assert_eq!(issues.len(), 1);
        let record = issues[0].payload();
        assert_eq!(record.quantity, 3);
        assert_eq!(record.location, Location::LargeWarehouse);
        assert_eq!(record.note, "to small_warehouse (not received)");
    }

    #[test]
    fn correction_that_changes_nothing_is_not_logged() {
        let (service, log, _) = setup();
        let key = StockKey::new(Location::SmallWarehouse, "egg");
        let received = service.receive("kim", key.location, lot("egg", 6, date(2025, 1, 30))).unwrap();

        let outcome = service
            .correct(
                "park",
                &key,
                LotSelector::FirstExpiring(date(2025, 1, 30)),
                Correction {
                    quantity: Some(6),
                    expire_date: Some(date(2025, 1, 30)),
                },
            )
            .unwrap();

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.version, received.version);
        assert!(log.query(&LogQuery::all().action(StockAction::Correct)).unwrap().is_empty());
    }

    #[test]
    fn oversized_receipt_is_rejected_without_logging() {
        let (service, log, _) = setup();
        let mut huge = lot("flour", i64::MAX, date(2025, 6, 1));
        huge.unit_weight = Decimal::from(100_000_000_000i64);
        huge.unit = UnitOfMeasure::Kilogram;

        let err = service.receive("kim", Location::LargeWarehouse, huge).unwrap_err();

        assert!(err.is_validation());
        assert!(log.is_empty());
    }
}
