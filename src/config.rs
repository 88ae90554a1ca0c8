use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub signer: SignerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the ledger
    pub rpc_url: String,
    /// Chain id the signer binds its signatures to
    pub chain_id: u64,
    /// Path to the compiled RentalAgreement artifact (ABI + bytecode JSON)
    pub artifact_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    /// Hex-encoded private key of the custodial signer.
    /// Prefer leaving this unset and exporting RENTCHAIN__SIGNER__PRIVATE_KEY
    /// (or plain PRIVATE_KEY) instead of committing it to a config file.
    #[serde(default)]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. When unset the service runs on the
    /// in-memory listing store and loses listings on restart.
    #[serde(default)]
    pub url: Option<String>,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Confirmation wait bound in seconds
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    /// Polling interval for receipt checks in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Fee bump applied on same-nonce replacement, in percent
    #[serde(default = "default_replacement_fee_bump")]
    pub replacement_fee_bump_pct: u64,
    /// Consecutive nonce rejections before the queue halts admission
    #[serde(default = "default_max_nonce_rejections")]
    pub max_nonce_rejections: u32,
}

fn default_confirmation_timeout() -> u64 {
    90
}

fn default_poll_interval() -> u64 {
    500
}

fn default_replacement_fee_bump() -> u64 {
    15
}

fn default_max_nonce_rejections() -> u32 {
    3
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: default_confirmation_timeout(),
            poll_interval_ms: default_poll_interval(),
            replacement_fee_bump_pct: default_replacement_fee_bump(),
            max_nonce_rejections: default_max_nonce_rejections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    /// Interval between sweep cycles (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Maximum listings reconciled per cycle
    #[serde(default = "default_max_per_cycle")]
    pub max_listings_per_cycle: usize,
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_max_per_cycle() -> usize {
    50
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            max_listings_per_cycle: default_max_per_cycle(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Listen port for the HTTP API
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_port() -> u16 {
    3000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file plus RENTCHAIN__* environment overrides
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(Path::new(path)).required(false))
            .add_source(
                Environment::with_prefix("RENTCHAIN")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_defaults_are_sane() {
        let exec = ExecutionConfig::default();
        assert_eq!(exec.confirmation_timeout_secs, 90);
        assert_eq!(exec.poll_interval_ms, 500);
        assert!(exec.replacement_fee_bump_pct >= 10);
        assert!(exec.max_nonce_rejections >= 1);
    }

    #[test]
    fn database_url_defaults_to_none() {
        let db = DatabaseConfig::default();
        assert!(db.url.is_none());
        assert_eq!(db.max_connections, 5);
    }
}
