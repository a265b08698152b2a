use super::{audit_cols, enum_col, AccountRow, LedgerStore, ProductRow};
use crate::{
    audit::AuditMetadata,
    error::{LedgerError, LedgerResult},
    types::{
        to_micros, AccountId, AccountStatus, AccountType, AccountingMethod, IdentifierKind,
    },
};
use rusqlite::{params, OptionalExtension};

const ACCOUNT_COLUMNS: &str = "account_id, account_no, external_id, account_type, product_id, status,
     created_by, created_at, last_modified_by, last_modified_at";

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        account_id: row.get(0)?,
        account_no: row.get(1)?,
        external_id: row.get(2)?,
        account_type: enum_col(row, 3)?,
        product_id: row.get(4)?,
        status: enum_col(row, 5)?,
        audit: audit_cols(row, 6)?,
    })
}

impl LedgerStore {
    // ── Product ──────────────────────────────────────────────────────────

    pub fn insert_product(
        &self,
        product_id: &str,
        name: &str,
        method: AccountingMethod,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO product (product_id, name, accounting_method) VALUES (?1, ?2, ?3)",
            params![product_id, name, method.as_str()],
        )?;
        Ok(())
    }

    pub fn get_product(&self, product_id: &str) -> LedgerResult<Option<ProductRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT product_id, name, accounting_method FROM product WHERE product_id = ?1",
                params![product_id],
                |row| {
                    Ok(ProductRow {
                        product_id: row.get(0)?,
                        name: row.get(1)?,
                        accounting_method: enum_col(row, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ── Account ──────────────────────────────────────────────────────────

    pub fn insert_account(&self, account: &AccountRow) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO account (account_id, account_no, external_id, account_type, product_id,
                                  status, created_by, created_at, last_modified_by, last_modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                account.account_id,
                account.account_no,
                account.external_id,
                account.account_type.as_str(),
                account.product_id,
                account.status.as_str(),
                account.audit.created_by,
                to_micros(account.audit.created_at),
                account.audit.last_modified_by,
                to_micros(account.audit.last_modified_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_account(&self, account_id: &str) -> LedgerResult<Option<AccountRow>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM account WHERE account_id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![account_id], account_from_row)
            .optional()?;
        Ok(row)
    }

    /// Status transitions are owned by the account workflow; the engine only
    /// reads them. Exposed for collaborators and tests.
    pub fn update_account_status(
        &self,
        account_id: &str,
        status: AccountStatus,
        audit: &AuditMetadata,
    ) -> LedgerResult<()> {
        let changed = self.conn.execute(
            "UPDATE account SET status = ?1, last_modified_by = ?2, last_modified_at = ?3
             WHERE account_id = ?4",
            params![
                status.as_str(),
                audit.last_modified_by,
                to_micros(audit.last_modified_at),
                account_id,
            ],
        )?;
        if changed == 0 {
            return Err(LedgerError::not_found("account", account_id));
        }
        Ok(())
    }

    pub fn account_accounting_method(&self, account_id: &str) -> LedgerResult<AccountingMethod> {
        self.conn
            .query_row(
                "SELECT p.accounting_method
                 FROM account a JOIN product p ON p.product_id = a.product_id
                 WHERE a.account_id = ?1",
                params![account_id],
                |row| enum_col(row, 0),
            )
            .optional()?
            .ok_or_else(|| LedgerError::not_found("account", account_id))
    }

    pub fn account_status_of(&self, account_id: &str) -> LedgerResult<AccountStatus> {
        self.conn
            .query_row(
                "SELECT status FROM account WHERE account_id = ?1",
                params![account_id],
                |row| enum_col(row, 0),
            )
            .optional()?
            .ok_or_else(|| LedgerError::not_found("account", account_id))
    }

    pub fn account_type_of(&self, account_id: &str) -> LedgerResult<AccountType> {
        self.conn
            .query_row(
                "SELECT account_type FROM account WHERE account_id = ?1",
                params![account_id],
                |row| enum_col(row, 0),
            )
            .optional()?
            .ok_or_else(|| LedgerError::not_found("account", account_id))
    }

    /// Map an external identifier to the internal account id.
    pub fn resolve_account_id(
        &self,
        kind: IdentifierKind,
        value: &str,
    ) -> LedgerResult<Option<AccountId>> {
        let sql = match kind {
            IdentifierKind::Id => "SELECT account_id FROM account WHERE account_id = ?1",
            IdentifierKind::ExternalId => "SELECT account_id FROM account WHERE external_id = ?1",
            IdentifierKind::AccountNumber => {
                "SELECT account_id FROM account WHERE account_no = ?1"
            }
        };
        let id = self
            .conn
            .query_row(sql, params![value], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    pub fn account_count(&self) -> LedgerResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM account", [], |row| row.get(0))?;
        Ok(n)
    }
}
