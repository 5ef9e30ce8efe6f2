use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

/// How a handler treats a failed sub-operation that ran alongside others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Surface the first failure as the event's failure.
    FailFast,
    /// Log the failure and carry on as if it succeeded.
    LogAndContinue,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_fast" => Ok(FailurePolicy::FailFast),
            "log_and_continue" => Ok(FailurePolicy::LogAndContinue),
            other => Err(anyhow!("unknown failure policy: {other}")),
        }
    }
}

/// Failure policy for the two balance updates of a transfer.
///
/// The defaults keep the long-standing behaviour: a failed balance update is
/// only logged when applying, but fails the event when retracting. That can
/// leave `balances` out of step with `transfers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    pub apply_balances: FailurePolicy,
    pub retract_balances: FailurePolicy,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            apply_balances: FailurePolicy::LogAndContinue,
            retract_balances: FailurePolicy::FailFast,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub transfer_policy: TransferPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(v) => v.parse().context("DB_MAX_CONNECTIONS must be a positive integer")?,
            None => 5,
        };

        let defaults = TransferPolicy::default();
        let transfer_policy = TransferPolicy {
            apply_balances: match lookup("TRANSFER_APPLY_BALANCE_POLICY") {
                Some(v) => v.parse()?,
                None => defaults.apply_balances,
            },
            retract_balances: match lookup("TRANSFER_RETRACT_BALANCE_POLICY") {
                Some(v) => v.parse()?,
                None => defaults.retract_balances,
            },
        };

        Ok(Self {
            database_url,
            max_connections,
            transfer_policy,
        })
    }
}
