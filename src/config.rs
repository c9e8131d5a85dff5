//! Configuration management for the batch broadcaster
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::error::{BroadcastError, BroadcastResult};
use crate::tx::TransactionSpec;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub broadcaster: BroadcasterConfig,
    pub network: NetworkConfig,
    pub signer: SignerConfig,
    pub batch: BatchConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Pacing, admission and retry knobs for a batch run
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BroadcasterConfig {
    /// Submissions are admitted while the sender's pending depth is below this
    pub max_pending_depth: u32,
    /// Wait between congestion polls
    pub poll_interval_ms: u64,
    /// Fixed pause after every accepted submission
    pub inter_submission_delay_ms: u64,
    /// Forced pause after a rate-limit signal
    pub rate_limit_cooldown_ms: u64,
    pub max_sequence_conflict_retries: u32,
    pub max_transient_retries: u32,
    /// Pause before retrying an index after a non rate-limit transient failure
    pub transient_retry_delay_ms: u64,
    /// Pending depth assumed when the mempool query fails. Defaults to
    /// `max_pending_depth`, which reads as congested.
    pub pending_count_fallback: Option<u32>,
    /// Upper bound on congestion polls per index. `None` waits forever.
    pub max_admission_polls: Option<u32>,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            max_pending_depth: 20,
            poll_interval_ms: 30_000,
            inter_submission_delay_ms: 2_000,
            rate_limit_cooldown_ms: 60_000,
            max_sequence_conflict_retries: 3,
            max_transient_retries: 3,
            transient_retry_delay_ms: 2_000,
            pending_count_fallback: None,
            max_admission_polls: None,
        }
    }
}

impl BroadcasterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn inter_submission_delay(&self) -> Duration {
        Duration::from_millis(self.inter_submission_delay_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }

    pub fn transient_retry_delay(&self) -> Duration {
        Duration::from_millis(self.transient_retry_delay_ms)
    }

    /// Effective pending depth reported when the mempool cannot be read
    pub fn pending_fallback(&self) -> u32 {
        self.pending_count_fallback.unwrap_or(self.max_pending_depth)
    }

    /// Validate broadcaster settings.
    ///
    /// The pending fallback must sit at or above the admission threshold, so a
    /// failed mempool query stalls the batch instead of admitting it.
    pub fn validate(&self) -> BroadcastResult<()> {
        if self.max_pending_depth == 0 {
            return Err(BroadcastError::Configuration(
                "max_pending_depth must be at least 1".to_string(),
            ));
        }
        if let Some(fallback) = self.pending_count_fallback {
            if fallback < self.max_pending_depth {
                return Err(BroadcastError::Configuration(format!(
                    "pending_count_fallback ({}) must be >= max_pending_depth ({})",
                    fallback, self.max_pending_depth
                )));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(BroadcastError::Configuration(
                "poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.max_admission_polls == Some(0) {
            return Err(BroadcastError::Configuration(
                "max_admission_polls must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub name: NetworkKind,
    pub api_urls: Vec<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Mainnet,
    Testnet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    pub url: String,
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub count: u32,
    pub transaction: TransactionSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Settings {
    /// Load settings from the file named by `BROADCASTER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("BROADCASTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        self.broadcaster.validate()?;

        if self.network.api_urls.is_empty() {
            anyhow::bail!("Network {:?} has no API URLs configured", self.network.name);
        }
        if self.signer.address.is_empty() {
            anyhow::bail!("Signer address must be set");
        }
        if self.batch.transaction.function_name.is_empty() {
            anyhow::bail!("Batch transaction has no function name");
        }
        if self.batch.count == 0 {
            tracing::warn!("Batch count is 0 - nothing will be submitted");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::ArgValue;
    use std::io::Write;

    const SAMPLE: &str = r#"
[broadcaster]
max_pending_depth = 10
pending_count_fallback = 15
max_admission_polls = 40

[network]
name = "testnet"
api_urls = ["https://api.testnet.hiro.so"]

[signer]
url = "http://127.0.0.1:9100/sign"
address = "${TEST_SENDER_ADDRESS}"

[batch]
count = 100

[batch.transaction]
contract_address = "SP2N00STXH4K1GBPHC5AM62BP4AJ7STS4XJXCD2D4"
contract_name = "bit-token"
function_name = "mint"
fee = 4000
args = [
    { type = "uint", value = 1 },
    { type = "principal", value = "ST1SENDER" },
]
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = BroadcasterConfig::default();
        assert_eq!(config.max_pending_depth, 20);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.inter_submission_delay(), Duration::from_secs(2));
        assert_eq!(config.rate_limit_cooldown(), Duration::from_secs(60));
        assert_eq!(config.max_admission_polls, None);
        assert_eq!(config.pending_fallback(), 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fallback_below_threshold_is_rejected() {
        let config = BroadcasterConfig {
            pending_count_fallback: Some(5),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BroadcastError::Configuration(_))
        ));
    }

    #[test]
    fn test_fallback_follows_raised_threshold() {
        env::set_var("TEST_SENDER_ADDRESS", "ST1SENDER");
        let raised = SAMPLE
            .replace("max_pending_depth = 10", "max_pending_depth = 30")
            .replace("pending_count_fallback = 15\n", "");

        let settings = Settings::from_toml_str(&raised).unwrap();
        assert_eq!(settings.broadcaster.pending_count_fallback, None);
        assert_eq!(settings.broadcaster.pending_fallback(), 30);

        let explicit = BroadcasterConfig {
            pending_count_fallback: Some(40),
            ..Default::default()
        };
        assert_eq!(explicit.pending_fallback(), 40);
    }

    #[test]
    fn test_load_from_file() {
        env::set_var("TEST_SENDER_ADDRESS", "ST1SENDER");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.signer.address, "ST1SENDER");
        assert_eq!(settings.network.name, NetworkKind::Testnet);
        assert_eq!(settings.network.request_timeout_ms, 30_000);
        assert_eq!(settings.broadcaster.max_pending_depth, 10);
        assert_eq!(settings.broadcaster.max_admission_polls, Some(40));
        // Unset keys keep their defaults
        assert_eq!(settings.broadcaster.rate_limit_cooldown_ms, 60_000);
        assert_eq!(settings.batch.count, 100);
        assert_eq!(settings.batch.transaction.fee, 4000);
        assert_eq!(
            settings.batch.transaction.args,
            vec![ArgValue::Uint(1), ArgValue::Principal("ST1SENDER".to_string())]
        );
        assert!(!settings.api.enabled);
    }

    #[test]
    fn test_missing_api_urls_fail_validation() {
        env::set_var("TEST_SENDER_ADDRESS", "ST1SENDER");
        let broken = SAMPLE.replace(
            "api_urls = [\"https://api.testnet.hiro.so\"]",
            "api_urls = []",
        );
        tokio_test::assert_err!(Settings::from_toml_str(&broken));
    }

    #[test]
    fn test_zero_admission_bound_is_rejected() {
        let config = BroadcasterConfig {
            max_admission_polls: Some(0),
            ..Default::default()
        };
        tokio_test::assert_err!(config.validate());

        let bounded = BroadcasterConfig {
            max_admission_polls: Some(1),
            ..Default::default()
        };
        tokio_test::assert_ok!(bounded.validate());
    }
}
