use super::{timestamp_col, LedgerStore};
use crate::{error::LedgerResult, types::{to_micros, Timestamp}};
use rusqlite::params;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEventRow {
    pub id: Option<i64>,
    pub job_run_id: String,
    pub job: String,
    pub event_type: String,
    pub payload: String,
    pub recorded_at: Timestamp,
}

impl LedgerStore {
    // ── Engine event journal ─────────────────────────────────────────────

    pub fn append_event(&self, entry: &EngineEventRow) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO engine_event (job_run_id, job, event_type, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.job_run_id,
                entry.job,
                entry.event_type,
                entry.payload,
                to_micros(entry.recorded_at),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_run(&self, job_run_id: &str) -> LedgerResult<Vec<EngineEventRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job_run_id, job, event_type, payload, recorded_at
             FROM engine_event WHERE job_run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![job_run_id], |row| {
                Ok(EngineEventRow {
                    id: Some(row.get(0)?),
                    job_run_id: row.get(1)?,
                    job: row.get(2)?,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                    recorded_at: timestamp_col(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
