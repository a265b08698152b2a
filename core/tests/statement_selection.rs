//! Statement-due selection.

mod common;

use common::{add_account, add_schedule, build, date, CASH};
use current_account_core::{
    audit::AuditMetadata,
    statement_selector::by_generation_date,
    store::AccountStatementSchedule,
    types::{AccountStatus, ScheduleStatus},
};
use std::collections::BTreeSet;

fn ids(schedules: &[AccountStatementSchedule]) -> Vec<i64> {
    schedules.iter().map(|s| s.account_statement_id).collect()
}

#[test]
fn due_before_as_of_with_eligible_statuses() {
    let engine = build();
    add_account(&engine.store, "OPEN", CASH, AccountStatus::Open);
    add_account(&engine.store, "SHUT", CASH, AccountStatus::Closed);

    let past = add_schedule(&engine.store, "OPEN", date(2024, 5, 30), ScheduleStatus::Active);
    add_schedule(&engine.store, "OPEN", date(2024, 6, 2), ScheduleStatus::Active);
    add_schedule(&engine.store, "OPEN", date(2024, 6, 1), ScheduleStatus::Active);
    add_schedule(&engine.store, "OPEN", date(2024, 5, 1), ScheduleStatus::Suspended);
    add_schedule(&engine.store, "SHUT", date(2024, 5, 1), ScheduleStatus::Active);

    let due = engine
        .statements()
        .due_statements(
            date(2024, 6, 1),
            &BTreeSet::from([ScheduleStatus::Active]),
            &BTreeSet::from([AccountStatus::Open]),
        )
        .unwrap();
    assert_eq!(ids(&due), vec![past]);
    assert_eq!(due[0].account_id, "OPEN");
    assert_eq!(due[0].next_generation_date, date(2024, 5, 30));
}

#[test]
fn widening_status_sets_widens_selection() {
    let engine = build();
    add_account(&engine.store, "OPEN", CASH, AccountStatus::Open);
    add_account(&engine.store, "IDLE", CASH, AccountStatus::Dormant);
    let a = add_schedule(&engine.store, "OPEN", date(2024, 5, 1), ScheduleStatus::Active);
    let b = add_schedule(&engine.store, "OPEN", date(2024, 5, 2), ScheduleStatus::Suspended);
    let c = add_schedule(&engine.store, "IDLE", date(2024, 5, 3), ScheduleStatus::Active);

    let due = engine
        .statements()
        .due_statements(
            date(2024, 6, 1),
            &BTreeSet::from([ScheduleStatus::Active, ScheduleStatus::Suspended]),
            &BTreeSet::from([AccountStatus::Open, AccountStatus::Dormant]),
        )
        .unwrap();
    assert_eq!(ids(&due), vec![a, b, c]);
}

#[test]
fn empty_status_sets_select_nothing() {
    let engine = build();
    add_account(&engine.store, "OPEN", CASH, AccountStatus::Open);
    add_schedule(&engine.store, "OPEN", date(2024, 5, 1), ScheduleStatus::Active);

    let selector = engine.statements();
    let as_of = date(2024, 6, 1);
    assert!(selector
        .due_statements(as_of, &BTreeSet::new(), &BTreeSet::from([AccountStatus::Open]))
        .unwrap()
        .is_empty());
    assert!(selector
        .due_statements(as_of, &BTreeSet::from([ScheduleStatus::Active]), &BTreeSet::new())
        .unwrap()
        .is_empty());
}

#[test]
fn selection_is_restartable_and_sortable_by_date() {
    let engine = build();
    add_account(&engine.store, "OPEN", CASH, AccountStatus::Open);
    let late = add_schedule(&engine.store, "OPEN", date(2024, 5, 20), ScheduleStatus::Active);
    let early = add_schedule(&engine.store, "OPEN", date(2024, 5, 1), ScheduleStatus::Active);
    let tie = add_schedule(&engine.store, "OPEN", date(2024, 5, 1), ScheduleStatus::Active);

    let schedules = BTreeSet::from([ScheduleStatus::Active]);
    let accounts = BTreeSet::from([AccountStatus::Open]);
    let selector = engine.statements();
    let first = selector.due_statements(date(2024, 6, 1), &schedules, &accounts).unwrap();
    let second = selector.due_statements(date(2024, 6, 1), &schedules, &accounts).unwrap();
    assert_eq!(first, second);

    let mut sorted = first;
    by_generation_date(&mut sorted);
    assert_eq!(ids(&sorted), vec![early, tie, late]);
}

#[test]
fn advanced_schedule_drops_out() {
    let engine = build();
    add_account(&engine.store, "OPEN", CASH, AccountStatus::Open);
    let id = add_schedule(&engine.store, "OPEN", date(2024, 5, 1), ScheduleStatus::Active);

    let audit = AuditMetadata::now("statements");
    assert!(engine
        .store
        .advance_statement_schedule(id, date(2024, 6, 30), ScheduleStatus::Active, &audit)
        .unwrap());

    let due = engine
        .statements()
        .due_statements(
            date(2024, 6, 1),
            &BTreeSet::from([ScheduleStatus::Active]),
            &BTreeSet::from([AccountStatus::Open]),
        )
        .unwrap();
    assert!(due.is_empty());
}

#[test]
fn account_leaving_eligible_status_drops_its_schedules() {
    let engine = build();
    add_account(&engine.store, "A", CASH, AccountStatus::Open);
    add_schedule(&engine.store, "A", date(2024, 5, 1), ScheduleStatus::Active);

    let schedules = BTreeSet::from([ScheduleStatus::Active]);
    let accounts = BTreeSet::from([AccountStatus::Open]);
    let selector = engine.statements();
    assert_eq!(selector.due_statements(date(2024, 6, 1), &schedules, &accounts).unwrap().len(), 1);

    engine
        .store
        .update_account_status("A", AccountStatus::Blocked, &AuditMetadata::now("workflow"))
        .unwrap();
    assert_eq!(engine.store.account_status_of("A").unwrap(), AccountStatus::Blocked);
    assert!(selector
        .due_statements(date(2024, 6, 1), &schedules, &accounts)
        .unwrap()
        .is_empty());
}
