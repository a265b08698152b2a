use super::LedgerStore;
use crate::{
    config::BehindRule,
    error::LedgerResult,
    types::{to_micros, AccountId, AccountingMethod, Timestamp},
};
use rusqlite::params;

impl LedgerStore {
    /// Accounts of `method` whose snapshot references a ledger position older
    /// than some transaction at or before `cutoff`.
    pub fn behind_accounts(
        &self,
        cutoff: Timestamp,
        method: AccountingMethod,
        rule: BehindRule,
    ) -> LedgerResult<Vec<AccountId>> {
        let later = match rule {
            BehindRule::LaterTimestamp => "t.created_at > anchor.created_at",
            BehindRule::LaterPosition => {
                "(t.created_at > anchor.created_at
                  OR (t.created_at = anchor.created_at AND t.transaction_id > anchor.transaction_id))"
            }
        };
        let sql = format!(
            "SELECT a.account_id
             FROM account a
             JOIN product p ON p.product_id = a.product_id
             JOIN balance_snapshot s
               ON s.account_id = a.account_id AND s.account_type = a.account_type
             JOIN ledger_transaction anchor ON anchor.transaction_id = s.last_applied_transaction_id
             WHERE p.accounting_method = ?1
               AND EXISTS (
                   SELECT 1 FROM ledger_transaction t
                   WHERE t.account_id = a.account_id
                     AND t.created_at <= ?2
                     AND {later}
               )
             ORDER BY a.account_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params![method.as_str(), to_micros(cutoff)], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Accounts of `method` with ledger activity but no snapshot row.
    pub fn unreconciled_accounts(&self, method: AccountingMethod) -> LedgerResult<Vec<AccountId>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.account_id
             FROM account a
             JOIN product p ON p.product_id = a.product_id
             WHERE p.accounting_method = ?1
               AND NOT EXISTS (
                   SELECT 1 FROM balance_snapshot s
                   WHERE s.account_id = a.account_id AND s.account_type = a.account_type
               )
               AND EXISTS (
                   SELECT 1 FROM ledger_transaction t WHERE t.account_id = a.account_id
               )
             ORDER BY a.account_id ASC",
        )?;
        let ids = stmt
            .query_map(params![method.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
