//! Optimistic concurrency on balance snapshots.
//!
//! Racing writers are simulated two ways: by interleaving plan/apply by
//! hand, and by a snapshot store that lets a competitor win before every
//! conditional write.

mod common;

use common::{add_account, build, init_logging, ledger_total, post, seed_products, ts, units, CASH};
use current_account_core::{
    balance_writer::{BalanceOutcome, BalancePlan, BalanceWriter, PendingBalance},
    collaborator::{AccountDirectory, LedgerReader, SnapshotStore},
    config::ReconciliationConfig,
    engine::ReconEngine,
    error::{LedgerError, LedgerResult},
    store::{AccountRow, BalanceSnapshot, CasOutcome, LedgerStore, LedgerTransaction},
    types::{AccountStatus, AccountType, AccountingMethod, LedgerPosition, Timestamp},
};
use std::cell::Cell;

fn pending(plan: BalancePlan) -> PendingBalance {
    match plan {
        BalancePlan::Write(p) => p,
        BalancePlan::Skip(reason) => panic!("expected a write, got {reason:?}"),
    }
}

#[test]
fn racing_first_writes_admit_one_winner() {
    let engine = build();
    add_account(&engine.store, "A", CASH, AccountStatus::Open);
    post(&engine.store, "A", "2024-03-01T10:00:00Z", 100);
    post(&engine.store, "A", "2024-03-01T11:00:00Z", -40);
    let cutoff = ts("2024-03-01T12:00:00Z");

    let scheduled = engine.balance_writer();
    let triggered = engine.balance_writer();
    let a = pending(scheduled.plan("A", cutoff).unwrap());
    let b = pending(triggered.plan("A", cutoff).unwrap());
    assert_eq!((a.expected_version, b.expected_version), (0, 0));

    assert_eq!(scheduled.apply(&a).unwrap(), CasOutcome::Applied);
    assert_eq!(
        triggered.apply(&b).unwrap(),
        CasOutcome::VersionMismatch { expected: 0, found: Some(1) }
    );

    // The loser re-reads: nothing new, so nothing is written twice.
    let retry = triggered.update_balance("A", cutoff).unwrap();
    assert!(matches!(retry, BalanceOutcome::Unchanged(_)));
    let stored = engine.store.find_snapshot("A", AccountType::Current).unwrap().unwrap();
    assert_eq!(stored.balance, units(60));
    assert_eq!(stored.version, 1);
}

#[test]
fn stale_update_never_overwrites_winner() {
    let engine = build();
    add_account(&engine.store, "A", CASH, AccountStatus::Open);
    post(&engine.store, "A", "2024-03-01T10:00:00Z", 100);
    let writer = engine.balance_writer();
    writer.update_balance("A", ts("2024-03-01T10:00:00Z")).unwrap();

    post(&engine.store, "A", "2024-03-01T11:00:00Z", 20);
    post(&engine.store, "A", "2024-03-01T12:00:00Z", 3);
    let cutoff = ts("2024-03-01T12:00:00Z");

    let slow = pending(writer.plan("A", cutoff).unwrap());
    let fast = pending(writer.plan("A", cutoff).unwrap());
    assert_eq!(writer.apply(&fast).unwrap(), CasOutcome::Applied);
    assert_eq!(
        writer.apply(&slow).unwrap(),
        CasOutcome::VersionMismatch { expected: 1, found: Some(2) }
    );

    let stored = engine.store.find_snapshot("A", AccountType::Current).unwrap().unwrap();
    assert_eq!(stored.balance, units(123));
    assert_eq!(stored.version, 2);
}

/// Lets a competing writer bump the snapshot before the next `interference`
/// conditional writes.
struct Contended<'a> {
    inner: &'a LedgerStore,
    interference: Cell<u32>,
    attempts: Cell<u32>,
}

impl LedgerReader for Contended<'_> {
    fn transactions_for_account(
        &self,
        account_id: &str,
        from_exclusive: Option<LedgerPosition>,
        to_inclusive: Timestamp,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        LedgerReader::transactions_for_account(self.inner, account_id, from_exclusive, to_inclusive)
    }
}

impl AccountDirectory for Contended<'_> {
    fn account(&self, account_id: &str) -> LedgerResult<Option<AccountRow>> {
        self.inner.account(account_id)
    }

    fn accounting_method(&self, account_id: &str) -> LedgerResult<AccountingMethod> {
        AccountDirectory::accounting_method(self.inner, account_id)
    }

    fn account_status(&self, account_id: &str) -> LedgerResult<AccountStatus> {
        AccountDirectory::account_status(self.inner, account_id)
    }
}

impl SnapshotStore for Contended<'_> {
    fn find_snapshot(
        &self,
        account_id: &str,
        account_type: AccountType,
    ) -> LedgerResult<Option<BalanceSnapshot>> {
        SnapshotStore::find_snapshot(self.inner, account_id, account_type)
    }

    fn compare_and_swap(
        &self,
        snapshot: &BalanceSnapshot,
        expected_version: i64,
    ) -> LedgerResult<CasOutcome> {
        self.attempts.set(self.attempts.get() + 1);
        if self.interference.get() > 0 {
            self.interference.set(self.interference.get() - 1);
            let current = SnapshotStore::find_snapshot(self.inner, &snapshot.account_id, snapshot.account_type)?
                .expect("competitor needs an existing snapshot");
            self.inner.save(&current)?;
        }
        self.inner.compare_and_swap(snapshot, expected_version)
    }

    fn save(&self, snapshot: &BalanceSnapshot) -> LedgerResult<BalanceSnapshot> {
        self.inner.save(snapshot)
    }
}

fn contended_fixture() -> (ReconEngine, Timestamp) {
    let engine = build();
    add_account(&engine.store, "A", CASH, AccountStatus::Open);
    post(&engine.store, "A", "2024-03-01T10:00:00Z", 100);
    engine
        .balance_writer()
        .update_balance("A", ts("2024-03-01T10:00:00Z"))
        .unwrap();
    post(&engine.store, "A", "2024-03-01T11:00:00Z", 7);
    (engine, ts("2024-03-01T11:00:00Z"))
}

#[test]
fn retry_after_lost_race_applies_exactly_once() {
    let (engine, cutoff) = contended_fixture();
    let store = Contended {
        inner: &engine.store,
        interference: Cell::new(2),
        attempts: Cell::new(0),
    };
    let writer = BalanceWriter::new(&store, &engine.config.reconciliation, "test");

    let outcome = writer.update_balance("A", cutoff).unwrap();
    assert_eq!(store.attempts.get(), 3);
    match outcome {
        BalanceOutcome::Updated(snapshot) => {
            assert_eq!(snapshot.balance, units(107));
            // Two competitor bumps plus the original write.
            assert_eq!(snapshot.version, 4);
        }
        other => panic!("expected an update, got {other:?}"),
    }
    assert_eq!(
        engine.store.find_snapshot("A", AccountType::Current).unwrap().unwrap().balance,
        ledger_total(&engine.store, "A", cutoff)
    );
}

#[test]
fn exhausted_retries_surface_as_error() {
    let (engine, cutoff) = contended_fixture();
    let store = Contended {
        inner: &engine.store,
        interference: Cell::new(u32::MAX),
        attempts: Cell::new(0),
    };
    let config = ReconciliationConfig {
        max_update_retries: 3,
        retry_backoff_ms: 0,
        ..ReconciliationConfig::default()
    };
    let writer = BalanceWriter::new(&store, &config, "test");

    let err = writer.update_balance("A", cutoff).unwrap_err();
    match err {
        LedgerError::ConcurrentUpdateExhausted { account_id, attempts } => {
            assert_eq!(account_id, "A");
            assert_eq!(attempts, 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(LedgerError::ConcurrentUpdateExhausted { account_id: "A".into(), attempts: 4 }.is_retryable());
    assert_eq!(store.attempts.get(), 4);

    // The snapshot still reflects only the first catch-up.
    let stored = engine.store.find_snapshot("A", AccountType::Current).unwrap().unwrap();
    assert_eq!(stored.balance, units(100));
}

#[test]
fn parallel_writers_on_one_file_converge() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let base = LedgerStore::open(path.to_str().unwrap()).unwrap();
    base.migrate().unwrap();
    seed_products(&base);
    add_account(&base, "A", CASH, AccountStatus::Open);

    let config = ReconciliationConfig {
        max_update_retries: 50,
        retry_backoff_ms: 1,
        ..ReconciliationConfig::default()
    };
    let cutoff = ts("2024-03-02T00:00:00Z");

    std::thread::scope(|scope| {
        let poster = base.reopen().unwrap();
        scope.spawn(move || {
            for minute in 0..40 {
                let at = format!("2024-03-01T10:{minute:02}:00Z");
                post(&poster, "A", &at, if minute % 3 == 0 { -2 } else { 5 });
            }
        });
        for _ in 0..4 {
            let store = base.reopen().unwrap();
            let config = &config;
            scope.spawn(move || {
                let writer = BalanceWriter::new(&store, config, "worker");
                for _ in 0..20 {
                    writer.update_balance("A", cutoff).unwrap();
                }
            });
        }
    });

    BalanceWriter::new(&base, &config, "final")
        .update_balance("A", cutoff)
        .unwrap();
    let stored = base.find_snapshot("A", AccountType::Current).unwrap().unwrap();
    assert_eq!(stored.balance, ledger_total(&base, "A", cutoff));
    assert_eq!(base.transaction_count("A").unwrap(), 40);
}
