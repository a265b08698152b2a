//! Shared primitive types and the closed enums every store and selector uses.
//!
//! External strings map to variants through one normalized table per enum:
//! lowercase, with '-', '_' and spaces stripped. Anything outside the table
//! is an `UnknownIdentifierKind` error.

use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable account identifier.
pub type AccountId = String;

/// Ledger transaction identifier. Monotonic per store.
pub type TransactionId = i64;

/// Ordering timestamp of a ledger transaction.
pub type Timestamp = DateTime<Utc>;

/// Calendar date used by statements and workflow actions.
pub type BusinessDate = NaiveDate;

fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Generates `as_str`, `Display` and a normalized `FromStr` for a closed enum.
macro_rules! closed_enum {
    (
        $name:ident, $kind:literal,
        { $($variant:ident => $canonical:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $canonical),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(raw: &str) -> LedgerResult<Self> {
                let key = normalize(raw);
                $(
                    if key == normalize($canonical) $(|| key == $alias)* {
                        return Ok($name::$variant);
                    }
                )+
                Err(LedgerError::UnknownIdentifierKind {
                    kind: $kind,
                    value: raw.to_string(),
                })
            }
        }
    };
}

/// Account kinds sharing the balance snapshot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Current,
    Savings,
    FixedDeposit,
    RecurringDeposit,
}

closed_enum!(AccountType, "account type", {
    Current          => "current" | "currentaccount",
    Savings          => "savings" | "savingsaccount",
    FixedDeposit     => "fixed_deposit" | "fixeddepositaccount" | "fd",
    RecurringDeposit => "recurring_deposit" | "recurringdepositaccount" | "rd",
});

/// Accounting treatment configured on the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountingMethod {
    None,
    Cash,
    AccrualPeriodic,
    AccrualUpfront,
}

closed_enum!(AccountingMethod, "accounting method", {
    None            => "none",
    Cash            => "cash" | "cashbased",
    AccrualPeriodic => "accrual_periodic" | "periodicaccrual",
    AccrualUpfront  => "accrual_upfront" | "upfrontaccrual",
});

impl AccountingMethod {
    /// Only these methods keep a running-balance snapshot.
    pub fn requires_running_balance(&self) -> bool {
        !matches!(self, AccountingMethod::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Submitted,
    Approved,
    Open,
    Dormant,
    Blocked,
    Closed,
}

closed_enum!(AccountStatus, "account status", {
    Submitted => "submitted",
    Approved  => "approved",
    Open      => "open" | "active",
    Dormant   => "dormant",
    Blocked   => "blocked",
    Closed    => "closed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Active,
    Suspended,
    Inactive,
}

closed_enum!(ScheduleStatus, "statement schedule status", {
    Active    => "active",
    Suspended => "suspended",
    Inactive  => "inactive",
});

/// How an external caller names an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Id,
    ExternalId,
    AccountNumber,
}

closed_enum!(IdentifierKind, "identifier kind", {
    Id            => "id",
    ExternalId    => "external_id",
    AccountNumber => "account_number" | "accountno",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Account,
    StatementSchedule,
    Customer,
}

closed_enum!(EntityType, "entity type", {
    Account           => "account" | "currentaccount",
    StatementSchedule => "statement_schedule",
    Customer          => "customer" | "client",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Submit,
    Approve,
    Activate,
    Block,
    Unblock,
    Close,
    Reopen,
}

closed_enum!(ActionType, "action type", {
    Submit   => "submit",
    Approve  => "approve",
    Activate => "activate",
    Block    => "block",
    Unblock  => "unblock",
    Close    => "close",
    Reopen   => "reopen",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

closed_enum!(Direction, "transaction direction", {
    Credit => "credit",
    Debit  => "debit",
});

impl Direction {
    /// Signed effect of `amount` on the running balance.
    pub fn apply(&self, amount: Decimal) -> Decimal {
        match self {
            Direction::Credit => amount,
            Direction::Debit => -amount,
        }
    }
}

/// A point in the ledger's total order: timestamp first, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerPosition {
    pub created_at: Timestamp,
    pub transaction_id: TransactionId,
}

/// Convert a timestamp to the Unix microseconds stored in SQLite.
pub fn to_micros(ts: Timestamp) -> i64 {
    ts.timestamp_micros()
}

pub fn from_micros(micros: i64) -> LedgerResult<Timestamp> {
    DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| LedgerError::CorruptValue {
        column: "timestamp",
        value: micros.to_string(),
    })
}

/// Reject cutoffs that cannot bound a ledger query.
///
/// Ledger timestamps are whole microseconds, so an entry is at or before
/// `cutoff` exactly when it is at or before `cutoff` truncated to the
/// microsecond. The returned cutoff is truncated.
pub fn validate_cutoff(cutoff: Timestamp) -> LedgerResult<Timestamp> {
    if cutoff.timestamp_micros() < 0 {
        return Err(LedgerError::InvalidCutoff {
            reason: format!("{cutoff} precedes the Unix epoch"),
        });
    }
    Ok(cutoff.trunc_subsecs(6))
}

/// Ledger entries are kept at microsecond precision; anything finer
/// would not survive the round trip through the store.
pub fn validate_ledger_timestamp(created_at: Timestamp) -> LedgerResult<Timestamp> {
    if created_at.timestamp_subsec_nanos() % 1_000 != 0 {
        return Err(LedgerError::InvalidTimestamp {
            reason: format!("{created_at} is finer than one microsecond"),
        });
    }
    Ok(created_at)
}

/// Parse an RFC 3339 cutoff as supplied by a scheduler or operator.
pub fn parse_cutoff(raw: Option<&str>) -> LedgerResult<Timestamp> {
    let raw = raw.ok_or_else(|| LedgerError::InvalidCutoff {
        reason: "cutoff is required".into(),
    })?;
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| LedgerError::InvalidCutoff {
            reason: format!("'{raw}' is not RFC 3339: {e}"),
        })?
        .with_timezone(&Utc);
    validate_cutoff(parsed)
}
