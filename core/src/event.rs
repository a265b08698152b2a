//! Batch job journal events.
//!
//! RULE: Every batch run records what it did as events in the journal,
//! keyed by the run's job_run_id. Variants are append-only.

use crate::types::{AccountId, AccountingMethod, BusinessDate, Timestamp, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    // ── Reconciliation ─────────────────────────────
    ReconciliationStarted {
        cutoff: Timestamp,
        accounting_method: AccountingMethod,
        candidates: usize,
    },
    AccountReconciled {
        account_id: AccountId,
        balance: Decimal,
        last_applied_transaction_id: TransactionId,
        version: i64,
    },
    AccountFailed {
        account_id: AccountId,
        error: String,
    },
    ReconciliationFinished {
        updated: usize,
        unchanged: usize,
        failed: usize,
        cancelled: bool,
    },

    // ── Statement selection ────────────────────────
    StatementSelectionStarted {
        as_of: BusinessDate,
        due: usize,
    },
    StatementHandedOff {
        account_statement_id: i64,
        account_id: AccountId,
    },
    StatementFailed {
        account_statement_id: i64,
        error: String,
    },
    StatementSelectionFinished {
        handed_off: usize,
        failed: usize,
        deferred: usize,
        cancelled: bool,
    },
}

impl EngineEvent {
    /// Stable name for the event_type column.
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::ReconciliationStarted { .. } => "reconciliation_started",
            EngineEvent::AccountReconciled { .. } => "account_reconciled",
            EngineEvent::AccountFailed { .. } => "account_failed",
            EngineEvent::ReconciliationFinished { .. } => "reconciliation_finished",
            EngineEvent::StatementSelectionStarted { .. } => "statement_selection_started",
            EngineEvent::StatementHandedOff { .. } => "statement_handed_off",
            EngineEvent::StatementFailed { .. } => "statement_failed",
            EngineEvent::StatementSelectionFinished { .. } => "statement_selection_finished",
        }
    }
}
