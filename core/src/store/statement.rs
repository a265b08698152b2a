use super::{
    audit_cols, enum_col, placeholders, AccountStatementSchedule, LedgerStore, NewStatementSchedule,
};
use crate::{
    audit::AuditMetadata,
    error::LedgerResult,
    types::{to_micros, AccountStatus, BusinessDate, ScheduleStatus},
};
use rusqlite::{params, params_from_iter, types::Value};

fn schedule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountStatementSchedule> {
    Ok(AccountStatementSchedule {
        account_statement_id: row.get(0)?,
        account_id: row.get(1)?,
        next_generation_date: row.get(2)?,
        product_id: row.get(3)?,
        owner_id: row.get(4)?,
        statement_code: row.get(5)?,
        statement_type: row.get(6)?,
        publish_type: row.get(7)?,
        batch_type: row.get(8)?,
        status: enum_col(row, 9)?,
        audit: audit_cols(row, 10)?,
    })
}

impl LedgerStore {
    pub fn insert_statement_schedule(
        &self,
        schedule: &NewStatementSchedule<'_>,
        audit: &AuditMetadata,
    ) -> LedgerResult<i64> {
        self.conn.execute(
            "INSERT INTO account_statement_schedule
             (account_id, product_id, owner_id, statement_code, statement_type, publish_type,
              batch_type, next_generation_date, status,
              created_by, created_at, last_modified_by, last_modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                schedule.account_id,
                schedule.product_id,
                schedule.owner_id,
                schedule.statement_code,
                schedule.statement_type,
                schedule.publish_type,
                schedule.batch_type,
                schedule.next_generation_date,
                schedule.status.as_str(),
                audit.created_by,
                to_micros(audit.created_at),
                audit.last_modified_by,
                to_micros(audit.last_modified_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Schedules with `next_generation_date < as_of` whose own status and
    /// owning account's status are both in the given sets, by id.
    pub fn due_statement_schedules(
        &self,
        as_of: BusinessDate,
        schedule_statuses: &[ScheduleStatus],
        account_statuses: &[AccountStatus],
    ) -> LedgerResult<Vec<AccountStatementSchedule>> {
        if schedule_statuses.is_empty() || account_statuses.is_empty() {
            return Ok(Vec::new());
        }

        let sched_in = placeholders(2, schedule_statuses.len());
        let acct_in = placeholders(2 + schedule_statuses.len(), account_statuses.len());
        let sql = format!(
            "SELECT s.account_statement_id, s.account_id, s.next_generation_date, s.product_id,
                    s.owner_id, s.statement_code, s.statement_type, s.publish_type, s.batch_type,
                    s.status, s.created_by, s.created_at, s.last_modified_by, s.last_modified_at
             FROM account_statement_schedule s
             JOIN account a ON a.account_id = s.account_id
             WHERE s.next_generation_date < ?1
               AND s.status IN ({sched_in})
               AND a.status IN ({acct_in})
             ORDER BY s.account_statement_id ASC"
        );

        let mut values: Vec<Value> = Vec::with_capacity(1 + schedule_statuses.len() + account_statuses.len());
        values.push(Value::Text(as_of.format("%Y-%m-%d").to_string()));
        values.extend(schedule_statuses.iter().map(|s| Value::Text(s.as_str().to_string())));
        values.extend(account_statuses.iter().map(|s| Value::Text(s.as_str().to_string())));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), schedule_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Advance a schedule after generation. Called by the statement
    /// collaborator; the selector itself never writes.
    pub fn advance_statement_schedule(
        &self,
        account_statement_id: i64,
        next_generation_date: BusinessDate,
        status: ScheduleStatus,
        audit: &AuditMetadata,
    ) -> LedgerResult<bool> {
        let changed = self.conn.execute(
            "UPDATE account_statement_schedule
             SET next_generation_date = ?1, status = ?2, last_modified_by = ?3, last_modified_at = ?4
             WHERE account_statement_id = ?5",
            params![
                next_generation_date,
                status.as_str(),
                audit.last_modified_by,
                to_micros(audit.last_modified_at),
                account_statement_id,
            ],
        )?;
        Ok(changed == 1)
    }
}
