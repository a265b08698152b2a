//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use current_account_core::{
    audit::AuditMetadata,
    engine::ReconEngine,
    store::{AccountRow, LedgerStore, NewStatementSchedule, NewTransaction},
    types::{
        AccountStatus, AccountType, AccountingMethod, BusinessDate, Direction, ScheduleStatus,
        Timestamp, TransactionId,
    },
};
use rust_decimal::Decimal;

pub const CASH: &str = "P-CASH";
pub const ACCRUAL: &str = "P-ACCR";
pub const PLAIN: &str = "P-NONE";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory engine with the three fixture products.
pub fn build() -> ReconEngine {
    init_logging();
    let engine = ReconEngine::build_test().expect("build_test failed");
    seed_products(&engine.store);
    engine
}

pub fn seed_products(store: &LedgerStore) {
    store
        .insert_product(CASH, "Cash current account", AccountingMethod::Cash)
        .unwrap();
    store
        .insert_product(ACCRUAL, "Accrual current account", AccountingMethod::AccrualPeriodic)
        .unwrap();
    store
        .insert_product(PLAIN, "No-accounting current account", AccountingMethod::None)
        .unwrap();
}

pub fn add_account(store: &LedgerStore, account_id: &str, product_id: &str, status: AccountStatus) {
    let n = store.account_count().unwrap();
    store
        .insert_account(&AccountRow {
            account_id: account_id.to_string(),
            account_no: format!("{:010}", 1_000 + n),
            external_id: Some(format!("EXT-{account_id}")),
            account_type: AccountType::Current,
            product_id: product_id.to_string(),
            status,
            audit: AuditMetadata::now("test"),
        })
        .unwrap();
}

pub fn ts(raw: &str) -> Timestamp {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

pub fn date(y: i32, m: u32, d: u32) -> BusinessDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn units(n: i64) -> Decimal {
    Decimal::from(n)
}

/// Post a signed whole-unit amount: positive credits, negative debits.
pub fn post(store: &LedgerStore, account_id: &str, at: &str, signed: i64) -> TransactionId {
    let direction = if signed < 0 { Direction::Debit } else { Direction::Credit };
    store
        .append_transaction(
            &NewTransaction {
                account_id,
                created_at: ts(at),
                direction,
                amount: units(signed.abs()),
            },
            "test",
        )
        .unwrap()
}

/// Sum of every entry of `account_id` at or before `cutoff`.
pub fn ledger_total(store: &LedgerStore, account_id: &str, cutoff: Timestamp) -> Decimal {
    store
        .transactions_for_account(account_id, None, cutoff)
        .unwrap()
        .iter()
        .map(|t| t.signed_amount())
        .sum()
}

pub fn add_schedule(
    store: &LedgerStore,
    account_id: &str,
    next: BusinessDate,
    status: ScheduleStatus,
) -> i64 {
    store
        .insert_statement_schedule(
            &NewStatementSchedule {
                account_id,
                next_generation_date: next,
                product_id: CASH,
                owner_id: "client-1",
                statement_code: "MONTHLY",
                statement_type: "account",
                publish_type: "email",
                batch_type: "periodic",
                status,
            },
            &AuditMetadata::now("test"),
        )
        .unwrap()
}
