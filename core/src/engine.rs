//! The reconciliation engine: batch entry points and query façade.
//!
//! JOBS:
//!   reconciliation       select candidates, then catch each account up
//!   statement_selection  select due schedules, hand each to the generator
//!
//! RULES:
//!   - Accounts are independent; a batch may fan out across workers.
//!   - Cancellation is honoured between accounts, never inside one.
//!   - Per-account failures are reported, not fatal. A storage failure
//!     stops the batch and propagates.
//!   - Every run is journalled under its job_run_id.

use crate::{
    action_lookup::ActionLookup,
    audit,
    balance_writer::{BalanceOutcome, BalanceWriter},
    config::EngineConfig,
    error::{LedgerError, LedgerResult},
    event::EngineEvent,
    reconciliation_selector::ReconciliationSelector,
    statement_selector::{by_generation_date, StatementSelector},
    store::{AccountStatementSchedule, EngineEventRow, LedgerStore},
    types::{validate_cutoff, AccountId, AccountingMethod, BusinessDate, IdentifierKind, Timestamp},
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub const RECONCILIATION_JOB: &str = "reconciliation";
pub const STATEMENT_JOB: &str = "statement_selection";

/// Shared stop signal for a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The external statement-generation collaborator.
pub trait StatementGenerator {
    fn generate(&mut self, schedule: &AccountStatementSchedule) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountFailure {
    pub account_id: AccountId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub job_run_id: String,
    pub cutoff: Timestamp,
    pub accounting_method: AccountingMethod,
    pub candidates: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failures: Vec<AccountFailure>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementFailure {
    pub account_statement_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementSelectionReport {
    pub job_run_id: String,
    pub as_of: BusinessDate,
    pub due: usize,
    pub handed_off: usize,
    pub failures: Vec<StatementFailure>,
    /// Due schedules left for the next run by the batch limit.
    pub deferred: usize,
    pub cancelled: bool,
}

type AccountResult = (AccountId, LedgerResult<BalanceOutcome>);

/// Called once per processed account, from whichever worker processed it,
/// before the cancel flag is checked for the next account.
pub type AccountProgress<'a> = &'a (dyn Fn(&str, &LedgerResult<BalanceOutcome>) + Sync);

pub struct ReconEngine {
    pub store: LedgerStore,
    pub config: EngineConfig,
}

impl ReconEngine {
    pub fn new(store: LedgerStore, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// In-memory store, migrated, with test configuration.
    pub fn build_test() -> LedgerResult<Self> {
        let store = LedgerStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, EngineConfig::default_test()))
    }

    // ── Query façade ─────────────────────────────────────────────────────

    pub fn selector(&self) -> ReconciliationSelector<'_> {
        ReconciliationSelector::new(&self.store, self.config.reconciliation.behind_rule)
    }

    pub fn balance_writer(&self) -> BalanceWriter<'_, LedgerStore> {
        BalanceWriter::new(
            &self.store,
            &self.config.reconciliation,
            &self.config.system_user,
        )
    }

    pub fn statements(&self) -> StatementSelector<'_> {
        StatementSelector::new(&self.store)
    }

    pub fn actions(&self) -> ActionLookup<'_> {
        ActionLookup::new(&self.store)
    }

    /// Resolve an external `(kind, value)` pair, e.g. `("external-id", "EXT-9")`.
    pub fn resolve_account(&self, kind: &str, value: &str) -> LedgerResult<AccountId> {
        let kind: IdentifierKind = kind.parse()?;
        self.store
            .resolve_account_id(kind, value)?
            .ok_or_else(|| LedgerError::not_found("account", format!("{kind}={value}")))
    }

    // ── Batch: reconciliation ────────────────────────────────────────────

    /// Catch every lagging or unreconciled account of `method` up to `cutoff`.
    pub fn run_reconciliation(
        &self,
        cutoff: Timestamp,
        method: AccountingMethod,
        cancel: &CancelFlag,
    ) -> LedgerResult<ReconciliationReport> {
        self.run_reconciliation_with(cutoff, method, cancel, &|_, _| {})
    }

    /// `run_reconciliation`, reporting each account to `progress` as it finishes.
    pub fn run_reconciliation_with(
        &self,
        cutoff: Timestamp,
        method: AccountingMethod,
        cancel: &CancelFlag,
        progress: AccountProgress<'_>,
    ) -> LedgerResult<ReconciliationReport> {
        let cutoff = validate_cutoff(cutoff)?;
        let job_run_id = Uuid::new_v4().to_string();
        let candidates: Vec<AccountId> = self.selector().candidates(cutoff, method)?.into_iter().collect();

        log::info!(
            "reconciliation {job_run_id}: {} candidates for method={method} cutoff={cutoff}",
            candidates.len()
        );
        self.record(
            &job_run_id,
            RECONCILIATION_JOB,
            &EngineEvent::ReconciliationStarted {
                cutoff,
                accounting_method: method,
                candidates: candidates.len(),
            },
        )?;

        let workers = self.config.reconciliation.workers.min(candidates.len());
        let results = if workers > 1 && self.store.is_shared() {
            self.reconcile_parallel(&candidates, cutoff, workers, cancel, progress)?
        } else {
            self.reconcile_sequential(&candidates, cutoff, cancel, progress)
        };

        let mut report = ReconciliationReport {
            job_run_id: job_run_id.clone(),
            cutoff,
            accounting_method: method,
            candidates: candidates.len(),
            updated: 0,
            unchanged: 0,
            failures: Vec::new(),
            cancelled: false,
        };
        let processed = results.len();
        let mut fatal = None;

        for (account_id, result) in results {
            match result {
                Ok(BalanceOutcome::Updated(snapshot)) => {
                    report.updated += 1;
                    self.record(
                        &job_run_id,
                        RECONCILIATION_JOB,
                        &EngineEvent::AccountReconciled {
                            account_id,
                            balance: snapshot.balance,
                            last_applied_transaction_id: snapshot.last_applied.transaction_id,
                            version: snapshot.version,
                        },
                    )?;
                }
                Ok(BalanceOutcome::Unchanged(_)) => report.unchanged += 1,
                Err(err @ LedgerError::StorageUnavailable(_)) => {
                    fatal.get_or_insert(err);
                }
                Err(err) => {
                    log::warn!("reconciliation {job_run_id}: account={account_id} failed: {err}");
                    self.record(
                        &job_run_id,
                        RECONCILIATION_JOB,
                        &EngineEvent::AccountFailed {
                            account_id: account_id.clone(),
                            error: err.to_string(),
                        },
                    )?;
                    report.failures.push(AccountFailure {
                        account_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        if let Some(err) = fatal {
            log::warn!("reconciliation {job_run_id}: aborted on storage failure: {err}");
            return Err(err);
        }

        report.cancelled = cancel.is_cancelled() && processed < candidates.len();
        if report.cancelled {
            log::warn!(
                "reconciliation {job_run_id}: cancelled after {processed}/{} accounts",
                candidates.len()
            );
        }
        self.record(
            &job_run_id,
            RECONCILIATION_JOB,
            &EngineEvent::ReconciliationFinished {
                updated: report.updated,
                unchanged: report.unchanged,
                failed: report.failures.len(),
                cancelled: report.cancelled,
            },
        )?;
        log::info!(
            "reconciliation {job_run_id}: updated={} unchanged={} failed={}",
            report.updated,
            report.unchanged,
            report.failures.len()
        );
        Ok(report)
    }

    fn reconcile_sequential(
        &self,
        candidates: &[AccountId],
        cutoff: Timestamp,
        cancel: &CancelFlag,
        progress: AccountProgress<'_>,
    ) -> Vec<AccountResult> {
        let writer = self.balance_writer();
        let mut results = Vec::with_capacity(candidates.len());
        for account_id in candidates {
            if cancel.is_cancelled() {
                break;
            }
            let result = writer.update_balance(account_id, cutoff);
            progress(account_id, &result);
            let stop = matches!(result, Err(LedgerError::StorageUnavailable(_)));
            results.push((account_id.clone(), result));
            if stop {
                break;
            }
        }
        results
    }

    /// Each worker owns a connection to the same database file and pulls
    /// the next account from a shared cursor.
    fn reconcile_parallel(
        &self,
        candidates: &[AccountId],
        cutoff: Timestamp,
        workers: usize,
        cancel: &CancelFlag,
        progress: AccountProgress<'_>,
    ) -> LedgerResult<Vec<AccountResult>> {
        let stores = (0..workers)
            .map(|_| self.store.reopen())
            .collect::<LedgerResult<Vec<_>>>()?;
        let cursor = AtomicUsize::new(0);
        let recon = &self.config.reconciliation;
        let actor = self.config.system_user.as_str();

        std::thread::scope(|scope| -> LedgerResult<Vec<AccountResult>> {
            let handles: Vec<_> = stores
                .into_iter()
                .map(|store| {
                    let cursor = &cursor;
                    scope.spawn(move || {
                        let writer = BalanceWriter::new(&store, recon, actor);
                        let mut results = Vec::new();
                        while !cancel.is_cancelled() {
                            let i = cursor.fetch_add(1, Ordering::SeqCst);
                            let Some(account_id) = candidates.get(i) else {
                                break;
                            };
                            let result = writer.update_balance(account_id, cutoff);
                            progress(account_id, &result);
                            let stop = matches!(result, Err(LedgerError::StorageUnavailable(_)));
                            results.push((account_id.clone(), result));
                            if stop {
                                break;
                            }
                        }
                        results
                    })
                })
                .collect();

            let mut all = Vec::with_capacity(candidates.len());
            for handle in handles {
                let results = handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("reconciliation worker panicked"))?;
                all.extend(results);
            }
            Ok(all)
        })
    }

    // ── Batch: statement selection ───────────────────────────────────────

    /// Hand every due schedule, oldest first, to `generator`.
    pub fn run_statement_selection(
        &self,
        as_of: BusinessDate,
        generator: &mut dyn StatementGenerator,
        cancel: &CancelFlag,
    ) -> LedgerResult<StatementSelectionReport> {
        let job_run_id = Uuid::new_v4().to_string();
        let cfg = &self.config.statements;
        let schedule_statuses: BTreeSet<_> = cfg.eligible_schedule_statuses.iter().copied().collect();
        let account_statuses: BTreeSet<_> = cfg.eligible_account_statuses.iter().copied().collect();

        let mut due = self
            .statements()
            .due_statements(as_of, &schedule_statuses, &account_statuses)?;
        by_generation_date(&mut due);

        let limit = cfg.batch_limit.unwrap_or(due.len()).min(due.len());
        self.record(
            &job_run_id,
            STATEMENT_JOB,
            &EngineEvent::StatementSelectionStarted {
                as_of,
                due: due.len(),
            },
        )?;

        let mut report = StatementSelectionReport {
            job_run_id: job_run_id.clone(),
            as_of,
            due: due.len(),
            handed_off: 0,
            failures: Vec::new(),
            deferred: due.len() - limit,
            cancelled: false,
        };

        for (i, schedule) in due.iter().take(limit).enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                report.deferred += limit - i;
                break;
            }
            match generator.generate(schedule) {
                Ok(()) => {
                    report.handed_off += 1;
                    self.record(
                        &job_run_id,
                        STATEMENT_JOB,
                        &EngineEvent::StatementHandedOff {
                            account_statement_id: schedule.account_statement_id,
                            account_id: schedule.account_id.clone(),
                        },
                    )?;
                }
                Err(err) => {
                    log::warn!(
                        "statement_selection {job_run_id}: schedule={} failed: {err:#}",
                        schedule.account_statement_id
                    );
                    self.record(
                        &job_run_id,
                        STATEMENT_JOB,
                        &EngineEvent::StatementFailed {
                            account_statement_id: schedule.account_statement_id,
                            error: format!("{err:#}"),
                        },
                    )?;
                    report.failures.push(StatementFailure {
                        account_statement_id: schedule.account_statement_id,
                        error: format!("{err:#}"),
                    });
                }
            }
        }

        self.record(
            &job_run_id,
            STATEMENT_JOB,
            &EngineEvent::StatementSelectionFinished {
                handed_off: report.handed_off,
                failed: report.failures.len(),
                deferred: report.deferred,
                cancelled: report.cancelled,
            },
        )?;
        log::info!(
            "statement_selection {job_run_id}: due={} handed_off={} failed={} deferred={}",
            report.due,
            report.handed_off,
            report.failures.len(),
            report.deferred
        );
        Ok(report)
    }

    // ── Journal ──────────────────────────────────────────────────────────

    /// Decoded events of one run, in order.
    pub fn events_for_run(&self, job_run_id: &str) -> LedgerResult<Vec<EngineEvent>> {
        self.store
            .events_for_run(job_run_id)?
            .iter()
            .map(|row| Ok(serde_json::from_str::<EngineEvent>(&row.payload)?))
            .collect()
    }

    fn record(&self, job_run_id: &str, job: &str, event: &EngineEvent) -> LedgerResult<()> {
        let entry = EngineEventRow {
            id: None,
            job_run_id: job_run_id.to_string(),
            job: job.to_string(),
            event_type: event.event_type().to_string(),
            payload: serde_json::to_string(event)?,
            recorded_at: audit::stamp(),
        };
        self.store.append_event(&entry)
    }
}
