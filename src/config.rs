//! Configuration management for the vault operator
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub operator: OperatorConfig,
    pub chain: ChainConfig,
    pub intake: IntakeConfig,
    pub retry: RetryConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    pub instance_id: String,
    /// Interval between receipt polls while waiting for confirmation
    pub confirm_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_urls: Vec<String>,
    pub vault_address: String,
    /// Name of the environment variable holding the signing key.
    /// The key material itself never appears in config files.
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntakeConfig {
    pub base_url: String,
    /// Long-poll hold time requested from the update feed
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub network_cap_ms: u64,
    pub other_cap_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("OPERATOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.chain.rpc_urls.is_empty() {
            anyhow::bail!("At least one RPC URL must be configured");
        }

        if self.chain.vault_address.is_empty() {
            anyhow::bail!("Vault contract address is not configured");
        }

        if self.chain.private_key_env.is_empty() {
            anyhow::bail!("private_key_env must name the env var holding the signing key");
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }

        if self.retry.base_delay_ms == 0 {
            anyhow::bail!("retry.base_delay_ms must be nonzero");
        }

        Ok(())
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.operator.confirm_poll_interval_ms)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn network_cap(&self) -> Duration {
        Duration::from_millis(self.network_cap_ms)
    }

    pub fn other_cap(&self) -> Duration {
        Duration::from_millis(self.other_cap_ms)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_load_rejects_empty_rpc_urls() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[operator]
instance_id = "op-1"
confirm_poll_interval_ms = 2000

[chain]
chain_id = 1
rpc_urls = []
vault_address = "0x933aafc9C5B1e0000E1dd77ac52D67b0E4e4997C"
private_key_env = "OPERATOR_PRIVATE_KEY"

[intake]
base_url = "https://updates.example.com"
poll_timeout_secs = 50

[retry]
base_delay_ms = 1000
network_cap_ms = 60000
other_cap_ms = 30000
max_attempts = 10

[metrics]
enabled = false
port = 9090
"#
        )
        .unwrap();

        env::set_var("OPERATOR_CONFIG", file.path());
        let result = Settings::load();
        env::remove_var("OPERATOR_CONFIG");

        assert!(result.is_err());
    }
}
