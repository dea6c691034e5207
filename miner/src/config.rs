//! Configuration for randomjs-miner

use std::fs;
use std::path::Path;

use anyhow::Context;
use randomjs_pow::{PowParams, ProgramOptions, RunnerConfig};
use serde::{Deserialize, Serialize};

/// Default length of a mining session
pub const DEFAULT_MINING_SECS: u64 = 60;

/// Main miner configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Protocol parameters
    pub pow: PowParams,

    /// Program synthesis bounds and weights
    pub program: ProgramOptions,

    /// Interpreter process
    pub runner: RunnerConfig,

    /// Mining session
    pub mining: MiningConfig,
}

/// Mining session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub duration_secs: u64,

    /// Worker threads, 0 means one per CPU
    pub workers: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_MINING_SECS,
            workers: 0,
        }
    }
}

impl MinerConfig {
    /// Load from a TOML file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.pow.validate()?;
        config.program.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use randomjs_pow::FailurePolicy;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(MinerConfig::from_toml("").unwrap(), MinerConfig::default());
        assert_eq!(MinerConfig::load(None).unwrap(), MinerConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = MinerConfig::from_toml(
            r#"
            [pow]
            asymmetry = 4
            failure_policy = "abort"

            [runner]
            command = "d8"
            timeout_ms = 250

            [program]
            max_depth = 2

            [program.binary_weights]
            Add = 1.0
            Mul = 2.0

            [mining]
            workers = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.pow.asymmetry, 4);
        assert_eq!(config.pow.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.pow.nonce_offset, PowParams::default().nonce_offset);
        assert_eq!(config.runner.command, "d8");
        assert_eq!(config.runner.timeout_ms, 250);
        assert_eq!(config.program.max_depth, 2);
        assert_eq!(config.program.binary_weights.len(), 2);
        assert_eq!(config.mining.workers, 3);
        assert_eq!(config.mining.duration_secs, DEFAULT_MINING_SECS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(MinerConfig::from_toml("[pow]\nasymmetry = 9\n").is_err());
        assert!(MinerConfig::from_toml("[pow]\nfailure_policy = \"retry\"\n").is_err());
        assert!(MinerConfig::load(Some(Path::new("/nonexistent/randomjs.toml"))).is_err());
        assert!(MinerConfig::from_toml("[program]\nglobals_min = 9\nglobals_max = 2\n").is_err());
        assert!(MinerConfig::from_toml("[program]\nmax_string_length = 4294967295\n").is_err());
    }
}
