//! Balance writer: catches one account's snapshot up to a cutoff.
//!
//! Every write is conditioned on the version read at the start of the
//! attempt. A writer that loses the race re-reads and recomputes; it never
//! overwrites the winner. Exhausting the retry budget is an error, never a
//! silent drop.

use crate::{
    audit::{self, AuditMetadata},
    collaborator::{AccountDirectory, LedgerReader, SnapshotStore},
    config::ReconciliationConfig,
    error::{LedgerError, LedgerResult},
    store::{BalanceSnapshot, CasOutcome},
    types::{validate_cutoff, Timestamp},
};
use rust_decimal::Decimal;
use std::time::Duration;

/// Why an update wrote nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unchanged {
    /// The cutoff lies before the snapshot's reference; balances never move backward.
    CutoffBeforeSnapshot,
    /// No ledger entries between the snapshot's reference and the cutoff.
    NoNewTransactions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceOutcome {
    Updated(BalanceSnapshot),
    Unchanged(Unchanged),
}

/// A recomputed snapshot waiting for its conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBalance {
    pub snapshot: BalanceSnapshot,
    pub expected_version: i64,
    pub folded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalancePlan {
    Write(PendingBalance),
    Skip(Unchanged),
}

pub struct BalanceWriter<'a, S> {
    store: &'a S,
    max_retries: u32,
    backoff: Duration,
    actor: String,
}

impl<'a, S> BalanceWriter<'a, S>
where
    S: LedgerReader + AccountDirectory + SnapshotStore,
{
    pub fn new(store: &'a S, config: &ReconciliationConfig, actor: &str) -> Self {
        Self {
            store,
            max_retries: config.max_update_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            actor: actor.to_string(),
        }
    }

    /// Catch `account_id` up to `cutoff`, retrying on version conflicts.
    pub fn update_balance(&self, account_id: &str, cutoff: Timestamp) -> LedgerResult<BalanceOutcome> {
        let cutoff = validate_cutoff(cutoff)?;
        let attempts = self.max_retries + 1;

        for attempt in 1..=attempts {
            let pending = match self.plan(account_id, cutoff)? {
                BalancePlan::Skip(reason) => {
                    log::debug!("account={account_id} unchanged: {reason:?}");
                    return Ok(BalanceOutcome::Unchanged(reason));
                }
                BalancePlan::Write(pending) => pending,
            };

            match self.apply(&pending)? {
                CasOutcome::Applied => {
                    log::debug!(
                        "account={account_id} folded {} txns, balance={} v{}",
                        pending.folded,
                        pending.snapshot.balance,
                        pending.snapshot.version
                    );
                    return Ok(BalanceOutcome::Updated(pending.snapshot));
                }
                CasOutcome::VersionMismatch { expected, found } => {
                    log::debug!(
                        "account={account_id} version conflict on attempt {attempt}/{attempts}: \
                         expected v{expected}, found {found:?}"
                    );
                    if attempt < attempts && !self.backoff.is_zero() {
                        std::thread::sleep(self.backoff * attempt);
                    }
                }
            }
        }

        Err(LedgerError::ConcurrentUpdateExhausted {
            account_id: account_id.to_string(),
            attempts,
        })
    }

    /// Read the current snapshot and fold the ledger window after it.
    /// Has no side effects.
    pub fn plan(&self, account_id: &str, cutoff: Timestamp) -> LedgerResult<BalancePlan> {
        let account = self
            .store
            .account(account_id)?
            .ok_or_else(|| LedgerError::not_found("account", account_id))?;
        let prior = self.store.find_snapshot(account_id, account.account_type)?;

        if let Some(prior) = &prior {
            if cutoff < prior.last_applied.created_at {
                return Ok(BalancePlan::Skip(Unchanged::CutoffBeforeSnapshot));
            }
        }

        let from = prior.as_ref().map(|p| p.last_applied);
        let window = self.store.transactions_for_account(account_id, from, cutoff)?;
        let Some(last) = window.last() else {
            return Ok(BalancePlan::Skip(Unchanged::NoNewTransactions));
        };

        let opening = prior.as_ref().map_or(Decimal::ZERO, |p| p.balance);
        let balance = window
            .iter()
            .fold(opening, |acc, txn| acc + txn.signed_amount());

        let now = audit::stamp();
        let (expected_version, audit) = match &prior {
            Some(p) => (p.version, p.audit.modified(&self.actor, now)),
            None => (0, AuditMetadata::created(&self.actor, now)),
        };

        Ok(BalancePlan::Write(PendingBalance {
            snapshot: BalanceSnapshot {
                account_id: account_id.to_string(),
                account_type: account.account_type,
                balance,
                last_applied: last.position(),
                version: expected_version + 1,
                audit,
            },
            expected_version,
            folded: window.len(),
        }))
    }

    /// The conditional write for a planned snapshot. Atomic: either the
    /// whole snapshot lands or nothing does.
    pub fn apply(&self, pending: &PendingBalance) -> LedgerResult<CasOutcome> {
        self.store
            .compare_and_swap(&pending.snapshot, pending.expected_version)
    }

    /// Unconditional upsert for administrative corrections. The caller is
    /// responsible for a `last_applied` that matches `balance`.
    /// The snapshot's account type must be the account's own, otherwise the
    /// row would sit under a key no reader looks up.
    pub fn save_balance(&self, snapshot: &BalanceSnapshot) -> LedgerResult<BalanceSnapshot> {
        let account = self
            .store
            .account(&snapshot.account_id)?
            .ok_or_else(|| LedgerError::not_found("account", snapshot.account_id.clone()))?;
        if account.account_type != snapshot.account_type {
            return Err(LedgerError::AccountTypeMismatch {
                account_id: snapshot.account_id.clone(),
                actual: account.account_type,
                requested: snapshot.account_type,
            });
        }
        let saved = self.store.save(snapshot)?;
        log::info!(
            "account={} balance overwritten to {} at txn {} (v{}) by {}",
            saved.account_id,
            saved.balance,
            saved.last_applied.transaction_id,
            saved.version,
            self.actor
        );
        Ok(saved)
    }
}
