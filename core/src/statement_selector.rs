//! Picks statement schedules that are due for generation.

use crate::{
    error::LedgerResult,
    store::{AccountStatementSchedule, LedgerStore},
    types::{AccountStatus, BusinessDate, ScheduleStatus},
};
use std::collections::BTreeSet;

pub struct StatementSelector<'a> {
    store: &'a LedgerStore,
}

impl<'a> StatementSelector<'a> {
    pub fn new(store: &'a LedgerStore) -> Self {
        Self { store }
    }

    /// Schedules with `next_generation_date < as_of`, an eligible schedule
    /// status, and an owning account in an eligible status.
    ///
    /// Read-only and restartable. Ordered by schedule id; callers that need
    /// oldest-first processing sort with [`by_generation_date`].
    pub fn due_statements(
        &self,
        as_of: BusinessDate,
        schedule_statuses: &BTreeSet<ScheduleStatus>,
        account_statuses: &BTreeSet<AccountStatus>,
    ) -> LedgerResult<Vec<AccountStatementSchedule>> {
        let schedule_statuses: Vec<_> = schedule_statuses.iter().copied().collect();
        let account_statuses: Vec<_> = account_statuses.iter().copied().collect();
        self.store
            .due_statement_schedules(as_of, &schedule_statuses, &account_statuses)
    }
}

/// Oldest next-generation date first; schedule id breaks ties.
pub fn by_generation_date(schedules: &mut [AccountStatementSchedule]) {
    schedules.sort_by(|a, b| {
        a.next_generation_date
            .cmp(&b.next_generation_date)
            .then(a.account_statement_id.cmp(&b.account_statement_id))
    });
}
