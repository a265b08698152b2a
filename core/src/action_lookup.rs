//! Most-recent action dates, for workflow gates upstream.

use crate::{
    audit::AuditMetadata,
    error::LedgerResult,
    store::LedgerStore,
    types::{ActionType, BusinessDate, EntityType},
};

pub struct ActionLookup<'a> {
    store: &'a LedgerStore,
}

impl<'a> ActionLookup<'a> {
    pub fn new(store: &'a LedgerStore) -> Self {
        Self { store }
    }

    /// None if the action never happened to this entity.
    pub fn last_action_date(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        action_type: ActionType,
    ) -> LedgerResult<Option<BusinessDate>> {
        self.store
            .latest_action_date(entity_type, entity_id, action_type)
    }

    /// Append one occurrence. Repeats on the same date are separate rows.
    pub fn record_action(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        action_type: ActionType,
        action_date: BusinessDate,
        actor: &str,
    ) -> LedgerResult<i64> {
        self.store.insert_account_action(
            entity_type,
            entity_id,
            action_type,
            action_date,
            &AuditMetadata::now(actor),
        )
    }
}
