use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

use crate::address::sanitize_wallet_address;
use crate::token::to_base_units;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    pub rate_limiting: RateLimitingConfig,
    pub cache: CacheConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("GRATUITY_API_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("GRATUITY_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        assert!(
            !self.database.url.is_empty(),
            "Database URL must be specified"
        );
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        self.chain.ensure_bounds()?;
        self.rate_limiting.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

/// Canonical parameters of the tip network and token. Everything the wallet
/// layer needs to switch networks, read balances and submit transfers, plus
/// the fixed per-unit tip amount.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Short network name recorded on every claim (e.g. "polygon")
    pub network: String,
    /// Display name used when asking a wallet to add the chain
    pub display_name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub request_timeout_ms: Option<u64>,
    /// ERC-20 contract the tips are denominated in
    pub token_address: String,
    pub token_decimals: u32,
    pub token_symbol: String,
    /// Human-scale decimal amount of one tip unit (e.g. "100" or "2.50")
    pub tip_amount: String,
    /// Block explorer base URL, joined as {explorer}/tx/{hash}
    pub explorer_url: String,
    pub native_symbol: String,
    #[serde(default = "ChainConfig::default_native_decimals")]
    pub native_decimals: u8,
    pub confirmation_poll_ms: Option<u64>,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(3_000);
        assert!(millis >= 100, "RPC timeout must be at least 100ms");
        assert!(millis <= 60_000, "RPC timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }

    pub fn confirmation_poll(&self) -> Duration {
        let millis = self.confirmation_poll_ms.unwrap_or(2_000);
        assert!(millis >= 250, "Confirmation poll must be at least 250ms");
        assert!(
            millis <= 30_000,
            "Confirmation poll cannot exceed 30 seconds"
        );
        Duration::from_millis(millis)
    }

    /// Chain id as the 0x-prefixed hex quantity wallets expect.
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    /// The fixed tip amount in the token's smallest unit.
    pub fn unit_amount_base_units(&self) -> Result<u128> {
        to_base_units(&self.tip_amount, self.token_decimals)
            .with_context(|| format!("Invalid tip amount {:?}", self.tip_amount))
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }

    pub fn ensure_bounds(&self) -> Result<()> {
        assert!(self.chain_id > 0, "Chain id must be positive");
        assert!(!self.network.is_empty(), "Network name must be specified");
        assert!(self.network.len() <= 32, "Network name exceeds column width");
        assert!(!self.rpc_url.is_empty(), "Chain RPC URL must be specified");
        assert!(
            !self.explorer_url.is_empty(),
            "Explorer URL must be specified"
        );
        assert!(
            self.token_decimals <= 36,
            "Token decimals exceed defensive limit"
        );
        sanitize_wallet_address(&self.token_address)
            .context("Token contract address is not a valid account address")?;
        let unit = self.unit_amount_base_units()?;
        assert!(unit > 0, "Tip amount must be positive");
        assert!(
            unit <= (i64::MAX / 1_000) as u128,
            "Tip amount too large for ledger arithmetic"
        );
        Ok(())
    }

    const fn default_native_decimals() -> u8 {
        18
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitingConfig {
    #[serde(default = "RateLimitingConfig::default_max_claims")]
    pub max_claims: u32,
    #[serde(default = "RateLimitingConfig::default_window_hours")]
    pub window_hours: i64,
}

impl RateLimitingConfig {
    pub fn ensure_bounds(&self) -> Result<()> {
        assert!(self.max_claims > 0, "Claim limit must be positive");
        assert!(
            self.max_claims <= 1_000,
            "Claim limit exceeds defensive bound"
        );
        assert!(self.window_hours > 0, "Rate window must be positive");
        assert!(
            self.window_hours <= 720,
            "Rate window cannot exceed 30 days"
        );
        Ok(())
    }

    const fn default_max_claims() -> u32 {
        5
    }

    const fn default_window_hours() -> i64 {
        24
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub summaries_max_capacity: u64,
    pub summaries_ttl_seconds: u64,
    pub leaderboards_max_capacity: u64,
    pub leaderboards_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.summaries_max_capacity >= 10,
            "Summary cache capacity must be at least 10"
        );
        assert!(
            self.summaries_ttl_seconds <= 3_600,
            "Summary cache TTL cannot exceed one hour"
        );
        assert!(
            self.leaderboards_max_capacity >= 10,
            "Leaderboard cache capacity must be at least 10"
        );
        assert!(
            self.leaderboards_ttl_seconds <= 3_600,
            "Leaderboard cache TTL cannot exceed one hour"
        );
        Ok(())
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
