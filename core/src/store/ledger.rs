use super::{decimal_col, enum_col, timestamp_col, LedgerStore, LedgerTransaction, NewTransaction};
use crate::{
    error::LedgerResult,
    types::{to_micros, validate_ledger_timestamp, AccountId, LedgerPosition, Timestamp, TransactionId},
};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

fn transaction_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerTransaction> {
    Ok(LedgerTransaction {
        transaction_id: row.get(0)?,
        account_id: row.get(1)?,
        created_at: timestamp_col(row, 2)?,
        direction: enum_col(row, 3)?,
        amount: decimal_col(row, 4)?,
    })
}

impl LedgerStore {
    /// Append one entry to the ledger. Returns the assigned id.
    ///
    /// The ledger is owned by the posting collaborator; the engine never
    /// calls this outside seeding and tests. `created_at` must be a whole
    /// microsecond.
    pub fn append_transaction(&self, txn: &NewTransaction<'_>, recorded_by: &str) -> LedgerResult<TransactionId> {
        let created_at = validate_ledger_timestamp(txn.created_at)?;
        self.conn.execute(
            "INSERT INTO ledger_transaction
             (account_id, created_at, direction, amount, recorded_by, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                txn.account_id,
                to_micros(created_at),
                txn.direction.as_str(),
                txn.amount.normalize().to_string(),
                recorded_by,
                to_micros(Utc::now()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Ledger entries of one account with position in `(from_exclusive, to_inclusive]`,
    /// ascending by timestamp then id.
    pub fn transactions_for_account(
        &self,
        account_id: &str,
        from_exclusive: Option<LedgerPosition>,
        to_inclusive: Timestamp,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        // No lower bound: start before any real (timestamp, id) pair.
        let (from_ts, from_id) = match from_exclusive {
            Some(p) => (to_micros(p.created_at), p.transaction_id),
            None => (i64::MIN, i64::MIN),
        };
        let mut stmt = self.conn.prepare(
            "SELECT transaction_id, account_id, created_at, direction, amount
             FROM ledger_transaction
             WHERE account_id = ?1
               AND (created_at > ?2 OR (created_at = ?2 AND transaction_id > ?3))
               AND created_at <= ?4
             ORDER BY created_at ASC, transaction_id ASC",
        )?;
        let rows = stmt
            .query_map(
                params![account_id, from_ts, from_id, to_micros(to_inclusive)],
                transaction_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_transaction(&self, transaction_id: TransactionId) -> LedgerResult<Option<LedgerTransaction>> {
        let row = self
            .conn
            .query_row(
                "SELECT transaction_id, account_id, created_at, direction, amount
                 FROM ledger_transaction WHERE transaction_id = ?1",
                params![transaction_id],
                transaction_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Owning account and ledger position of a transaction.
    pub fn transaction_position(
        &self,
        transaction_id: TransactionId,
    ) -> LedgerResult<Option<(AccountId, LedgerPosition)>> {
        Ok(self
            .get_transaction(transaction_id)?
            .map(|t| (t.account_id.clone(), t.position())))
    }

    pub fn transaction_count(&self, account_id: &str) -> LedgerResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM ledger_transaction WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}
