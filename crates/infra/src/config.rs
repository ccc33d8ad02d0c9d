//! Process configuration, read from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, ensure};
use chrono::Duration;

use copilot_learning::LearningConfig;
use copilot_proposals::ProposalConfig;

pub const DATA_DIR_VAR: &str = "COPILOT_DATA_DIR";
pub const USE_PERSISTENT_STORES_VAR: &str = "COPILOT_USE_PERSISTENT_STORES";
pub const PROPOSAL_TTL_MINUTES_VAR: &str = "COPILOT_PROPOSAL_TTL_MINUTES";
pub const PROPOSAL_RETENTION_HOURS_VAR: &str = "COPILOT_PROPOSAL_RETENTION_HOURS";

const DEFAULT_DATA_DIR: &str = "./databed";

#[derive(Debug, Clone, PartialEq)]
pub struct CopilotConfig {
    /// Directory holding `learning_entries.json` and `learned_patterns.json`.
    pub data_dir: PathBuf,
    /// `false` keeps the learning ledger in memory only.
    pub use_persistent_stores: bool,
    pub proposals: ProposalConfig,
    pub learning: LearningConfig,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            use_persistent_stores: true,
            proposals: ProposalConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl CopilotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let data_dir = lookup(DATA_DIR_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let use_persistent_stores = parse_var(&lookup, USE_PERSISTENT_STORES_VAR)?
            .unwrap_or(defaults.use_persistent_stores);

        let ttl = match parse_var::<i64>(&lookup, PROPOSAL_TTL_MINUTES_VAR)? {
            Some(minutes) => {
                ensure!(minutes > 0, "{PROPOSAL_TTL_MINUTES_VAR} must be positive (got {minutes})");
                Duration::try_minutes(minutes)
                    .with_context(|| format!("{PROPOSAL_TTL_MINUTES_VAR} is out of range"))?
            }
            None => defaults.proposals.ttl,
        };

        let retention = match parse_var::<i64>(&lookup, PROPOSAL_RETENTION_HOURS_VAR)? {
            Some(hours) => {
                ensure!(hours >= 0, "{PROPOSAL_RETENTION_HOURS_VAR} must not be negative (got {hours})");
                Duration::try_hours(hours)
                    .with_context(|| format!("{PROPOSAL_RETENTION_HOURS_VAR} is out of range"))?
            }
            None => defaults.proposals.retention,
        };

        Ok(Self {
            data_dir,
            use_persistent_stores,
            proposals: ProposalConfig { ttl, retention },
            learning: defaults.learning,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<CopilotConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CopilotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, CopilotConfig::default());
        assert_eq!(config.data_dir, PathBuf::from("./databed"));
        assert!(config.use_persistent_stores);
        assert_eq!(config.proposals.ttl, Duration::minutes(30));
        assert_eq!(config.proposals.retention, Duration::hours(24));
    }

    #[test]
    fn variables_override_defaults() {
        let config = config_from(&[
            (DATA_DIR_VAR, "/var/lib/copilot"),
            (USE_PERSISTENT_STORES_VAR, "false"),
            (PROPOSAL_TTL_MINUTES_VAR, " 5 "),
            (PROPOSAL_RETENTION_HOURS_VAR, "0"),
        ])
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/copilot"));
        assert!(!config.use_persistent_stores);
        assert_eq!(config.proposals.ttl, Duration::minutes(5));
        assert_eq!(config.proposals.retention, Duration::zero());
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = config_from(&[(PROPOSAL_TTL_MINUTES_VAR, "half an hour")]).unwrap_err();
        assert!(err.to_string().contains(PROPOSAL_TTL_MINUTES_VAR));

        assert!(config_from(&[(USE_PERSISTENT_STORES_VAR, "yes please")]).is_err());
        assert!(config_from(&[(PROPOSAL_TTL_MINUTES_VAR, "0")]).is_err());
        assert!(config_from(&[(PROPOSAL_RETENTION_HOURS_VAR, "-1")]).is_err());
    }
}
