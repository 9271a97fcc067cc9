//! Configuration management for the batch submitter
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "OVM_SUBMITTER_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub replacer: ReplacerConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub rpc_urls: Vec<String>,
    /// Kept as text; parsed when the transaction builder is created
    pub chain_id: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionConfig {
    /// 0 returns as soon as the node accepts the transaction
    pub default_confirmations: u64,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplacerConfig {
    pub gas_bump_gwei: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub name: String,
    /// Names of the environment variables holding each account's key, in index order
    pub private_key_envs: Vec<String>,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            default_confirmations: 0,
            confirmation_timeout_secs: 300,
            poll_interval_ms: 2_000,
        }
    }
}

impl Default for ReplacerConfig {
    fn default() -> Self {
        Self { gas_bump_gwei: 70 }
    }
}

impl LedgerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SubmissionConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Settings {
    /// Load settings from the file named by `OVM_SUBMITTER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from TOML text, substituting `${VAR}` references first
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.ledger.rpc_urls.is_empty() {
            anyhow::bail!("At least one ledger RPC URL must be configured");
        }
        if self.ledger.request_timeout_ms == 0 {
            anyhow::bail!("ledger.request_timeout_ms must be positive");
        }
        if self.submission.poll_interval_ms == 0 {
            anyhow::bail!("submission.poll_interval_ms must be positive");
        }
        if self.replacer.gas_bump_gwei == 0 {
            anyhow::bail!("replacer.gas_bump_gwei must be positive");
        }

        let mut names = std::collections::HashSet::new();
        for wallet in &self.wallets {
            if !names.insert(wallet.name.as_str()) {
                anyhow::bail!("Wallet {} is configured twice", wallet.name);
            }
            if wallet.private_key_envs.is_empty() {
                tracing::warn!("Wallet {} has no accounts configured", wallet.name);
            }
        }

        if self.wallets.is_empty() {
            tracing::warn!("No wallets configured - only encoding commands will succeed");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");
    }

    let mut result = input.to_string();
    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
