//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Selectors and writers call store methods (directly or through the
//! collaborator traits); they never execute SQL themselves.

use crate::{
    audit::AuditMetadata,
    error::{LedgerError, LedgerResult},
    types::{
        from_micros, AccountId, AccountStatus, AccountType, AccountingMethod, ActionType,
        BusinessDate, Direction, EntityType, LedgerPosition, ScheduleStatus, Timestamp,
        TransactionId,
    },
};
use rusqlite::{types::Type, Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

mod account;
mod action;
mod balance;
mod event;
mod ledger;
mod reconciliation;
mod statement;

pub use event::EngineEventRow;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    /// For file-based databases, this opens the same file.
    pub fn reopen(&self) -> LedgerResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// True when `reopen()` yields a connection that sees the same data.
    pub fn is_shared(&self) -> bool {
        self.path.is_some()
    }

    /// Apply all schema migrations in order. Safe to call repeatedly.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_accounts.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_ledger.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_balance_snapshot.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_statements.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/005_account_action.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/006_engine_event.sql"))?;
        Ok(())
    }
}

// ── Row types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    pub product_id: String,
    pub name: String,
    pub accounting_method: AccountingMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    pub account_id: AccountId,
    pub account_no: String,
    pub external_id: Option<String>,
    pub account_type: AccountType,
    pub product_id: String,
    pub status: AccountStatus,
    pub audit: AuditMetadata,
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub created_at: Timestamp,
    pub direction: Direction,
    pub amount: Decimal,
}

impl LedgerTransaction {
    pub fn position(&self) -> LedgerPosition {
        LedgerPosition {
            created_at: self.created_at,
            transaction_id: self.transaction_id,
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.direction.apply(self.amount)
    }
}

/// A ledger entry not yet assigned an id.
#[derive(Debug, Clone)]
pub struct NewTransaction<'a> {
    pub account_id: &'a str,
    pub created_at: Timestamp,
    pub direction: Direction,
    pub amount: Decimal,
}

/// The running balance of one account, as of `last_applied`.
///
/// Only the transaction id of `last_applied` is persisted; its timestamp is
/// joined from the ledger on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub account_id: AccountId,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub last_applied: LedgerPosition,
    pub version: i64,
    pub audit: AuditMetadata,
}

impl BalanceSnapshot {
    pub fn last_applied_transaction_id(&self) -> TransactionId {
        self.last_applied.transaction_id
    }
}

/// Result of a version-conditioned snapshot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    /// Another writer got there first; `found` is None if the row vanished
    /// or, for a first write, the version the competing writer created.
    VersionMismatch { expected: i64, found: Option<i64> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatementSchedule {
    pub account_statement_id: i64,
    pub account_id: AccountId,
    pub next_generation_date: BusinessDate,
    pub product_id: String,
    pub owner_id: String,
    pub statement_code: String,
    pub statement_type: String,
    pub publish_type: String,
    pub batch_type: String,
    pub status: ScheduleStatus,
    pub audit: AuditMetadata,
}

/// Schedule fields supplied by the statement collaborator on insert.
#[derive(Debug, Clone)]
pub struct NewStatementSchedule<'a> {
    pub account_id: &'a str,
    pub next_generation_date: BusinessDate,
    pub product_id: &'a str,
    pub owner_id: &'a str,
    pub statement_code: &'a str,
    pub statement_type: &'a str,
    pub publish_type: &'a str,
    pub batch_type: &'a str,
    pub status: ScheduleStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountActionRow {
    pub action_id: i64,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action_type: ActionType,
    pub action_date: BusinessDate,
    pub audit: AuditMetadata,
}

// ── Column helpers ───────────────────────────────────────────────────────
//
// Row mappers run inside rusqlite closures, so conversions report
// rusqlite::Error and surface to callers as StorageUnavailable.

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = LedgerError>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let micros: i64 = row.get(idx)?;
    from_micros(micros).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e))
    })
}

/// Reads four consecutive audit columns starting at `idx`.
pub(crate) fn audit_cols(row: &Row<'_>, idx: usize) -> rusqlite::Result<AuditMetadata> {
    Ok(AuditMetadata {
        created_by: row.get(idx)?,
        created_at: timestamp_col(row, idx + 1)?,
        last_modified_by: row.get(idx + 2)?,
        last_modified_at: timestamp_col(row, idx + 3)?,
    })
}

/// `?1, ?2, …` placeholders for an IN list starting at `first`.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
