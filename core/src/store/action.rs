use super::{audit_cols, enum_col, AccountActionRow, LedgerStore};
use crate::{
    audit::AuditMetadata,
    error::LedgerResult,
    types::{to_micros, ActionType, BusinessDate, EntityType},
};
use rusqlite::params;

impl LedgerStore {
    /// Append one action occurrence.
    pub fn insert_account_action(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        action_type: ActionType,
        action_date: BusinessDate,
        audit: &AuditMetadata,
    ) -> LedgerResult<i64> {
        self.conn.execute(
            "INSERT INTO account_action
             (entity_type, entity_id, action_type, action_date,
              created_by, created_at, last_modified_by, last_modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entity_type.as_str(),
                entity_id,
                action_type.as_str(),
                action_date,
                audit.created_by,
                to_micros(audit.created_at),
                audit.last_modified_by,
                to_micros(audit.last_modified_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn latest_action_date(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        action_type: ActionType,
    ) -> LedgerResult<Option<BusinessDate>> {
        // MAX over zero rows yields a single NULL row.
        let date = self.conn.query_row(
            "SELECT MAX(action_date) FROM account_action
             WHERE entity_type = ?1 AND entity_id = ?2 AND action_type = ?3",
            params![entity_type.as_str(), entity_id, action_type.as_str()],
            |row| row.get::<_, Option<BusinessDate>>(0),
        )?;
        Ok(date)
    }

    pub fn actions_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> LedgerResult<Vec<AccountActionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT action_id, entity_type, entity_id, action_type, action_date,
                    created_by, created_at, last_modified_by, last_modified_at
             FROM account_action
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY action_date ASC, action_id ASC",
        )?;
        let rows = stmt
            .query_map(params![entity_type.as_str(), entity_id], |row| {
                Ok(AccountActionRow {
                    action_id: row.get(0)?,
                    entity_type: enum_col(row, 1)?,
                    entity_id: row.get(2)?,
                    action_type: enum_col(row, 3)?,
                    action_date: row.get(4)?,
                    audit: audit_cols(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
