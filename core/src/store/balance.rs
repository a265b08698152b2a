use super::{audit_cols, decimal_col, enum_col, timestamp_col, BalanceSnapshot, CasOutcome, LedgerStore};
use crate::{
    error::{LedgerError, LedgerResult},
    types::{to_micros, AccountType, LedgerPosition},
};
use rusqlite::{params, OptionalExtension};

fn snapshot_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BalanceSnapshot> {
    Ok(BalanceSnapshot {
        account_id: row.get(0)?,
        account_type: enum_col(row, 1)?,
        balance: decimal_col(row, 2)?,
        last_applied: LedgerPosition {
            transaction_id: row.get(3)?,
            created_at: timestamp_col(row, 4)?,
        },
        version: row.get(5)?,
        audit: audit_cols(row, 6)?,
    })
}

impl LedgerStore {
    pub fn find_snapshot(
        &self,
        account_id: &str,
        account_type: AccountType,
    ) -> LedgerResult<Option<BalanceSnapshot>> {
        let row = self
            .conn
            .query_row(
                "SELECT s.account_id, s.account_type, s.balance,
                        s.last_applied_transaction_id, t.created_at, s.version,
                        s.created_by, s.created_at, s.last_modified_by, s.last_modified_at
                 FROM balance_snapshot s
                 JOIN ledger_transaction t ON t.transaction_id = s.last_applied_transaction_id
                 WHERE s.account_id = ?1 AND s.account_type = ?2",
                params![account_id, account_type.as_str()],
                snapshot_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn stored_version(&self, account_id: &str, account_type: AccountType) -> LedgerResult<Option<i64>> {
        let v = self
            .conn
            .query_row(
                "SELECT version FROM balance_snapshot WHERE account_id = ?1 AND account_type = ?2",
                params![account_id, account_type.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(v)
    }

    /// Write `snapshot` only if the stored version still equals
    /// `expected_version` (0 = no row yet). The stored version becomes
    /// `expected_version + 1`. A single statement, so a lost race writes
    /// nothing.
    pub fn compare_and_swap_snapshot(
        &self,
        snapshot: &BalanceSnapshot,
        expected_version: i64,
    ) -> LedgerResult<CasOutcome> {
        let changed = if expected_version == 0 {
            self.conn.execute(
                "INSERT INTO balance_snapshot
                 (account_id, account_type, balance, last_applied_transaction_id, version,
                  created_by, created_at, last_modified_by, last_modified_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8)
                 ON CONFLICT (account_id, account_type) DO NOTHING",
                params![
                    snapshot.account_id,
                    snapshot.account_type.as_str(),
                    snapshot.balance.normalize().to_string(),
                    snapshot.last_applied.transaction_id,
                    snapshot.audit.created_by,
                    to_micros(snapshot.audit.created_at),
                    snapshot.audit.last_modified_by,
                    to_micros(snapshot.audit.last_modified_at),
                ],
            )?
        } else {
            self.conn.execute(
                "UPDATE balance_snapshot
                 SET balance = ?1, last_applied_transaction_id = ?2, version = version + 1,
                     last_modified_by = ?3, last_modified_at = ?4
                 WHERE account_id = ?5 AND account_type = ?6 AND version = ?7",
                params![
                    snapshot.balance.normalize().to_string(),
                    snapshot.last_applied.transaction_id,
                    snapshot.audit.last_modified_by,
                    to_micros(snapshot.audit.last_modified_at),
                    snapshot.account_id,
                    snapshot.account_type.as_str(),
                    expected_version,
                ],
            )?
        };

        if changed == 1 {
            return Ok(CasOutcome::Applied);
        }
        let found = self.stored_version(&snapshot.account_id, snapshot.account_type)?;
        Ok(CasOutcome::VersionMismatch {
            expected: expected_version,
            found,
        })
    }

    /// Unconditional upsert. Creates the row at version 1 or bumps the
    /// stored version by one, keeping the original creation audit.
    /// The referenced transaction must belong to the snapshot's account.
    pub fn save_snapshot(&self, snapshot: &BalanceSnapshot) -> LedgerResult<BalanceSnapshot> {
        let txn_id = snapshot.last_applied.transaction_id;
        match self.transaction_position(txn_id)? {
            Some((owner, _)) if owner == snapshot.account_id => {}
            _ => {
                return Err(LedgerError::not_found(
                    "transaction",
                    format!("{txn_id} of account {}", snapshot.account_id),
                ))
            }
        }

        self.conn.execute(
            "INSERT INTO balance_snapshot
             (account_id, account_type, balance, last_applied_transaction_id, version,
              created_by, created_at, last_modified_by, last_modified_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8)
             ON CONFLICT (account_id, account_type) DO UPDATE SET
                 balance = excluded.balance,
                 last_applied_transaction_id = excluded.last_applied_transaction_id,
                 version = balance_snapshot.version + 1,
                 last_modified_by = excluded.last_modified_by,
                 last_modified_at = excluded.last_modified_at",
            params![
                snapshot.account_id,
                snapshot.account_type.as_str(),
                snapshot.balance.normalize().to_string(),
                txn_id,
                snapshot.audit.created_by,
                to_micros(snapshot.audit.created_at),
                snapshot.audit.last_modified_by,
                to_micros(snapshot.audit.last_modified_at),
            ],
        )?;

        self.find_snapshot(&snapshot.account_id, snapshot.account_type)?
            .ok_or_else(|| LedgerError::not_found("balance snapshot", snapshot.account_id.clone()))
    }

    pub fn snapshot_count(&self) -> LedgerResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM balance_snapshot", [], |row| row.get(0))?;
        Ok(n)
    }
}
