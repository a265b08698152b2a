//! recon-runner: headless batch runner for the reconciliation engine.
//!
//! Usage:
//!   recon-runner --db ledger.db --cutoff 2024-03-31T23:59:59Z --method cash
//!   recon-runner --demo-seed 42 --accounts 200 --days 90 --cutoff 2024-04-01T00:00:00Z --json
//!
//! Flags:
//!   --db PATH          SQLite file (default: in-memory)
//!   --config PATH      engine config JSON (default: built-in defaults)
//!   --demo-seed N      populate a deterministic demo ledger first
//!   --accounts N       demo accounts (default 100)
//!   --days N           demo history length in days (default 90)
//!   --start DATE       demo start date (default 2024-01-01)
//!   --cutoff RFC3339   reconciliation cutoff (required)
//!   --method NAME      accounting method, or "all" (default all)
//!   --as-of DATE       statement selection date (default: day after cutoff)
//!   --json             print reports as JSON

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use current_account_core::{
    balance_writer::BalanceOutcome,
    config::EngineConfig,
    demo::{DemoLedger, DemoLedgerSpec},
    engine::{CancelFlag, ReconEngine, ReconciliationReport, StatementGenerator, StatementSelectionReport},
    error::LedgerResult,
    store::{AccountStatementSchedule, LedgerStore},
    types::{parse_cutoff, AccountingMethod},
};
use std::env;

/// Statement generation lives elsewhere; the runner only logs the hand-off.
struct LoggingGenerator;

impl StatementGenerator for LoggingGenerator {
    fn generate(&mut self, schedule: &AccountStatementSchedule) -> anyhow::Result<()> {
        log::info!(
            "generate statement {} for account {} (due {}, {})",
            schedule.account_statement_id,
            schedule.account_id,
            schedule.next_generation_date,
            schedule.publish_type
        );
        Ok(())
    }
}

#[derive(serde::Serialize)]
struct RunOutput {
    reconciliation: Vec<ReconciliationReport>,
    statements: StatementSelectionReport,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let json = args.iter().any(|a| a == "--json");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");

    let config = match flag_value(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let cutoff = parse_cutoff(flag_value(&args, "--cutoff")).context("--cutoff")?;
    let methods: Vec<AccountingMethod> = match flag_value(&args, "--method").unwrap_or("all") {
        "all" => AccountingMethod::ALL
            .iter()
            .copied()
            .filter(|m| m.requires_running_balance())
            .collect(),
        name => vec![name.parse().context("--method")?],
    };
    let as_of = match flag_value(&args, "--as-of") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").context("--as-of")?,
        None => cutoff.date_naive() + Duration::days(1),
    };

    let store = if db == ":memory:" {
        LedgerStore::in_memory()?
    } else {
        LedgerStore::open(db)?
    };
    store.migrate()?;

    if let Some(seed) = flag_value(&args, "--demo-seed") {
        let spec = DemoLedgerSpec {
            seed: seed.parse().context("--demo-seed")?,
            accounts: parse_arg(&args, "--accounts", 100usize),
            days: parse_arg(&args, "--days", 90u32),
            start: match flag_value(&args, "--start") {
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").context("--start")?,
                None => NaiveDate::from_ymd_opt(2024, 1, 1).context("default start date")?,
            },
        };
        let summary = DemoLedger::populate(&store, &spec, &config.system_user)?;
        if !json {
            println!(
                "seeded demo ledger: {} accounts, {} transactions, {} schedules",
                summary.accounts, summary.transactions, summary.schedules
            );
        }
    }

    if !json {
        println!("recon-runner");
        println!("  db:       {db}");
        println!("  cutoff:   {cutoff}");
        println!("  as-of:    {as_of}");
        println!("  workers:  {}", config.reconciliation.workers);
        println!();
    }

    let engine = ReconEngine::new(store, config);
    let cancel = CancelFlag::new();

    let mut reconciliation = Vec::with_capacity(methods.len());
    let progress = |account_id: &str, result: &LedgerResult<BalanceOutcome>| match result {
        Ok(BalanceOutcome::Updated(s)) => {
            log::debug!("{account_id}: balance {} at txn {}", s.balance, s.last_applied.transaction_id)
        }
        Ok(BalanceOutcome::Unchanged(reason)) => log::debug!("{account_id}: unchanged ({reason:?})"),
        Err(err) => log::debug!("{account_id}: {err}"),
    };
    for method in methods {
        reconciliation.push(engine.run_reconciliation_with(cutoff, method, &cancel, &progress)?);
    }

    let mut generator = LoggingGenerator;
    let statements = engine.run_statement_selection(as_of, &mut generator, &cancel)?;

    let output = RunOutput {
        reconciliation,
        statements,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&output);
    }
    Ok(())
}

fn print_summary(output: &RunOutput) {
    println!("=== RECONCILIATION ===");
    for r in &output.reconciliation {
        println!(
            "  {:<17} candidates: {:>5}  updated: {:>5}  unchanged: {:>5}  failed: {:>3}{}",
            r.accounting_method.as_str(),
            r.candidates,
            r.updated,
            r.unchanged,
            r.failures.len(),
            if r.cancelled { "  (cancelled)" } else { "" }
        );
        for f in &r.failures {
            println!("    {} -> {}", f.account_id, f.error);
        }
    }
    println!();
    let s = &output.statements;
    println!("=== STATEMENTS (as of {}) ===", s.as_of);
    println!("  due:        {}", s.due);
    println!("  handed off: {}", s.handed_off);
    println!("  failed:     {}", s.failures.len());
    println!("  deferred:   {}", s.deferred);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    flag_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
