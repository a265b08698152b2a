use crate::types::{AccountId, AccountType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Balance update for account '{account_id}' lost the version race {attempts} times")]
    ConcurrentUpdateExhausted { account_id: AccountId, attempts: u32 },

    #[error("Invalid cutoff: {reason}")]
    InvalidCutoff { reason: String },

    #[error("Invalid ledger timestamp: {reason}")]
    InvalidTimestamp { reason: String },

    #[error("Account '{account_id}' is {actual}, not {requested}")]
    AccountTypeMismatch {
        account_id: AccountId,
        actual: AccountType,
        requested: AccountType,
    },

    #[error("Unknown {kind} identifier '{value}'")]
    UnknownIdentifierKind { kind: &'static str, value: String },

    #[error("Corrupt {column} value '{value}' in storage")]
    CorruptValue { column: &'static str, value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Transient failures the caller's scheduler should retry on its next run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::ConcurrentUpdateExhausted { .. }
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
