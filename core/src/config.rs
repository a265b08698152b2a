use crate::types::{AccountStatus, ScheduleStatus};
use serde::{Deserialize, Serialize};

/// Which ledger entries count as "after" a snapshot's reference when
/// deciding whether an account is behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BehindRule {
    /// A transaction with a strictly later timestamp exists at or before the cutoff.
    #[default]
    LaterTimestamp,
    /// Also flag transactions that share the reference timestamp but carry a
    /// higher id (the writer folds those; the timestamp rule only catches
    /// them once a later transaction arrives).
    LaterPosition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Retries after the first attempt when the version check fails.
    pub max_update_retries: u32,
    /// Linear backoff between retries, multiplied by the attempt number.
    pub retry_backoff_ms: u64,
    pub behind_rule: BehindRule,
    /// Worker threads for batch runs. Only file-backed stores fan out.
    pub workers: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            max_update_retries: 5,
            retry_backoff_ms: 10,
            behind_rule: BehindRule::LaterTimestamp,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementConfig {
    pub eligible_schedule_statuses: Vec<ScheduleStatus>,
    pub eligible_account_statuses: Vec<AccountStatus>,
    /// Cap on schedules handed to the generator per run; the rest wait for
    /// the next run.
    pub batch_limit: Option<usize>,
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self {
            eligible_schedule_statuses: vec![ScheduleStatus::Active],
            eligible_account_statuses: vec![AccountStatus::Open],
            batch_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Recorded as created_by / last_modified_by on engine writes.
    pub system_user: String,
    pub reconciliation: ReconciliationConfig,
    pub statements: StatementConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_user: "system".into(),
            reconciliation: ReconciliationConfig::default(),
            statements: StatementConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    /// In tests, use EngineConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Single worker, no backoff sleeps.
    pub fn default_test() -> Self {
        Self {
            system_user: "test".into(),
            reconciliation: ReconciliationConfig {
                max_update_retries: 3,
                retry_backoff_ms: 0,
                behind_rule: BehindRule::LaterTimestamp,
                workers: 1,
            },
            statements: StatementConfig::default(),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.reconciliation.workers == 0 {
            anyhow::bail!("reconciliation.workers must be at least 1");
        }
        if self.system_user.trim().is_empty() {
            anyhow::bail!("system_user must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "reconciliation": { "behind_rule": "later_position" } }"#)
                .unwrap();
        assert_eq!(config.reconciliation.behind_rule, BehindRule::LaterPosition);
        assert_eq!(config.reconciliation.max_update_retries, 5);
        assert_eq!(config.statements.eligible_account_statuses, vec![AccountStatus::Open]);
        assert_eq!(config.system_user, "system");
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = EngineConfig::default();
        config.reconciliation.workers = 0;
        assert!(config.validate().is_err());
    }
}
