//! Deterministic demo ledger: products, accounts, transactions, statement
//! schedules and workflow actions, all derived from one seed.
//!
//! Used by the runner to exercise a realistic book and by tests that need
//! volume. Same seed, same spec: identical rows (apart from audit clocks).

use crate::{
    audit::AuditMetadata,
    error::LedgerResult,
    rng::{LedgerRng, SeedStream},
    store::{AccountRow, LedgerStore, NewStatementSchedule, NewTransaction},
    types::{
        AccountStatus, AccountType, AccountingMethod, ActionType, BusinessDate, Direction,
        EntityType, ScheduleStatus, Timestamp,
    },
};
use chrono::{Duration, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// One product per accounting method.
pub const DEMO_PRODUCTS: &[(&str, &str, AccountingMethod)] = &[
    ("CA-BASIC", "Basic current account", AccountingMethod::None),
    ("CA-CASH", "Cash-accounted current account", AccountingMethod::Cash),
    ("CA-ACCR-P", "Periodic-accrual current account", AccountingMethod::AccrualPeriodic),
    ("CA-ACCR-U", "Upfront-accrual current account", AccountingMethod::AccrualUpfront),
];

#[derive(Debug, Clone)]
pub struct DemoLedgerSpec {
    pub seed: u64,
    pub accounts: usize,
    pub days: u32,
    pub start: BusinessDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemoLedgerSummary {
    pub products: usize,
    pub accounts: usize,
    pub transactions: usize,
    pub schedules: usize,
    pub actions: usize,
}

pub struct DemoLedger;

impl DemoLedger {
    pub fn populate(
        store: &LedgerStore,
        spec: &DemoLedgerSpec,
        actor: &str,
    ) -> LedgerResult<DemoLedgerSummary> {
        let audit = AuditMetadata::now(actor);
        let mut summary = DemoLedgerSummary::default();

        for (product_id, name, method) in DEMO_PRODUCTS {
            store.insert_product(product_id, name, *method)?;
            summary.products += 1;
        }

        let mut acct_rng = LedgerRng::for_stream(spec.seed, SeedStream::Accounts);
        let mut txn_rng = LedgerRng::for_stream(spec.seed, SeedStream::Transactions);
        let mut stmt_rng = LedgerRng::for_stream(spec.seed, SeedStream::Statements);
        let mut action_rng = LedgerRng::for_stream(spec.seed, SeedStream::Actions);
        let opened_at = start_of(spec.start);

        for i in 0..spec.accounts {
            let account = demo_account(i, &mut acct_rng, &audit);
            store.insert_account(&account)?;
            summary.accounts += 1;

            for txn in demo_transactions(&account.account_id, opened_at, spec.days, &mut txn_rng) {
                store.append_transaction(&txn, actor)?;
                summary.transactions += 1;
            }

            let lead = stmt_rng.next_u64_below(30) as i64;
            let status = match stmt_rng.next_f64() {
                x if x < 0.80 => ScheduleStatus::Active,
                x if x < 0.90 => ScheduleStatus::Suspended,
                _ => ScheduleStatus::Inactive,
            };
            store.insert_statement_schedule(
                &NewStatementSchedule {
                    account_id: &account.account_id,
                    next_generation_date: spec.start + Duration::days(spec.days as i64 - lead),
                    product_id: &account.product_id,
                    owner_id: &format!("client-{i:06}"),
                    statement_code: "MONTHLY",
                    statement_type: "account",
                    publish_type: if stmt_rng.chance(0.7) { "email" } else { "print" },
                    batch_type: "periodic",
                    status,
                },
                &audit,
            )?;
            summary.schedules += 1;

            store.insert_account_action(
                EntityType::Account,
                &account.account_id,
                ActionType::Activate,
                spec.start,
                &audit,
            )?;
            summary.actions += 1;
            if account.status == AccountStatus::Closed {
                let closed_on = spec.start
                    + Duration::days(action_rng.next_u64_below(spec.days.max(1) as u64) as i64);
                store.insert_account_action(
                    EntityType::Account,
                    &account.account_id,
                    ActionType::Close,
                    closed_on,
                    &audit,
                )?;
                summary.actions += 1;
            }
        }

        log::info!(
            "demo ledger seed={}: {} accounts, {} transactions, {} schedules",
            spec.seed,
            summary.accounts,
            summary.transactions,
            summary.schedules
        );
        Ok(summary)
    }
}

fn start_of(date: BusinessDate) -> Timestamp {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

fn demo_account(i: usize, rng: &mut LedgerRng, audit: &AuditMetadata) -> AccountRow {
    let (product_id, _, _) = rng.pick(DEMO_PRODUCTS);
    let account_type = if rng.chance(0.85) {
        AccountType::Current
    } else {
        AccountType::Savings
    };
    let status = match rng.next_f64() {
        x if x < 0.85 => AccountStatus::Open,
        x if x < 0.90 => AccountStatus::Dormant,
        x if x < 0.95 => AccountStatus::Blocked,
        _ => AccountStatus::Closed,
    };
    let external_id = Uuid::from_u64_pair(rng.next_u64_below(u64::MAX), i as u64);
    AccountRow {
        account_id: format!("acct-{i:06}"),
        account_no: format!("{:010}", 1_000_000_000u64 + i as u64),
        external_id: Some(external_id.to_string()),
        account_type,
        product_id: product_id.to_string(),
        status,
        audit: audit.clone(),
    }
}

/// An opening deposit, then a few entries on most days. Cash-like
/// amounts in cents; debits never exceed what was credited so far.
fn demo_transactions<'a>(
    account_id: &'a str,
    opened_at: Timestamp,
    days: u32,
    rng: &mut LedgerRng,
) -> Vec<NewTransaction<'a>> {
    let mut txns = Vec::new();
    let mut running = Decimal::ZERO;

    let opening = cents(rng.pareto(5_000.0, 1.5).min(500_000.0));
    running += opening;
    txns.push(NewTransaction {
        account_id,
        created_at: opened_at + Duration::seconds(rng.next_u64_below(3_600) as i64),
        direction: Direction::Credit,
        amount: opening,
    });

    for day in 1..days as i64 {
        if !rng.chance(0.6) {
            continue;
        }
        let count = 1 + rng.next_u64_below(3);
        let mut offsets: Vec<i64> = (0..count)
            .map(|_| rng.next_u64_below(86_400) as i64)
            .collect();
        offsets.sort_unstable();
        for offset in offsets {
            let amount = cents(rng.pareto(1_000.0, 1.4).min(200_000.0));
            let direction = if rng.chance(0.45) && amount <= running {
                Direction::Debit
            } else {
                Direction::Credit
            };
            running += direction.apply(amount);
            txns.push(NewTransaction {
                account_id,
                created_at: opened_at + Duration::days(day) + Duration::seconds(offset),
                direction,
                amount,
            });
        }
    }
    txns
}

fn cents(raw: f64) -> Decimal {
    Decimal::new(raw.round() as i64, 2)
}
