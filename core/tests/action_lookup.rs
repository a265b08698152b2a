//! Last-action-date lookup.

mod common;

use common::{add_account, build, date, CASH};
use current_account_core::types::{AccountStatus, ActionType, EntityType};

#[test]
fn latest_recorded_date_wins() {
    let engine = build();
    add_account(&engine.store, "A", CASH, AccountStatus::Open);
    let actions = engine.actions();

    actions
        .record_action(EntityType::Account, "A", ActionType::Block, date(2024, 2, 10), "ops")
        .unwrap();
    actions
        .record_action(EntityType::Account, "A", ActionType::Block, date(2024, 4, 1), "ops")
        .unwrap();
    // Recorded out of order: the lookup goes by date, not insertion.
    actions
        .record_action(EntityType::Account, "A", ActionType::Block, date(2024, 3, 15), "ops")
        .unwrap();

    assert_eq!(
        actions
            .last_action_date(EntityType::Account, "A", ActionType::Block)
            .unwrap(),
        Some(date(2024, 4, 1))
    );
    assert_eq!(
        engine
            .store
            .actions_for_entity(EntityType::Account, "A")
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn never_occurred_is_none() {
    let engine = build();
    add_account(&engine.store, "A", CASH, AccountStatus::Open);
    let actions = engine.actions();
    actions
        .record_action(EntityType::Account, "A", ActionType::Activate, date(2024, 1, 2), "ops")
        .unwrap();

    assert_eq!(
        actions
            .last_action_date(EntityType::Account, "A", ActionType::Close)
            .unwrap(),
        None
    );
    assert_eq!(
        actions
            .last_action_date(EntityType::Account, "B", ActionType::Activate)
            .unwrap(),
        None
    );
    assert_eq!(
        actions
            .last_action_date(EntityType::StatementSchedule, "A", ActionType::Activate)
            .unwrap(),
        None
    );
}
