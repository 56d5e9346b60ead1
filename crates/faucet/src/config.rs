//! Faucet configuration
//!
//! Layered as defaults, then an optional TOML file, then `FAUCET_*`
//! environment variables, then command line flags (applied by the binary).

use crate::error::{FaucetError, FaucetResult};
use faucet_common::utils::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How transaction fees are priced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeMode {
    /// `eth_gasPrice`, EIP-155 transaction
    Legacy,
    /// base fee + `eth_maxPriorityFeePerGas`, type 2 transaction
    Eip1559,
}

impl std::str::FromStr for FeeMode {
    type Err = FaucetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(FeeMode::Legacy),
            "eip1559" => Ok(FeeMode::Eip1559),
            other => Err(FaucetError::Config(format!("unknown fee mode: {}", other))),
        }
    }
}

/// An ERC-20 token the faucet hands out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Display symbol
    pub symbol: String,

    /// Token contract address
    pub contract: String,

    /// Amount per claim in base units
    pub amount: String,
}

/// Faucet service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// Server address
    pub server_addr: String,

    /// RPC endpoint for blockchain
    pub rpc_url: String,

    /// Timeout for a single RPC request (seconds)
    pub rpc_timeout_secs: u64,

    /// Faucet account private key
    pub private_key: String,

    /// Chain id; queried from the node when unset
    pub chain_id: Option<u64>,

    /// Native coin symbol
    pub native_symbol: String,

    /// Native amount per claim (in wei)
    pub native_amount: String,

    /// First ERC-20 token (`TOKEN_A`)
    pub token_a: Option<TokenConfig>,

    /// Second ERC-20 token (`TOKEN_B`)
    pub token_b: Option<TokenConfig>,

    pub fee_mode: FeeMode,

    /// Gas limit for native transfers
    pub native_gas_limit: u64,

    /// Gas limit for token transfers
    pub token_gas_limit: u64,

    /// Rate limit: maximum requests per client IP per window
    pub max_requests_per_window: u32,

    /// Rate limit: time window in seconds
    pub rate_limit_window_secs: u64,

    /// Maximum number of client IPs tracked at once
    pub rate_limit_capacity: u64,

    /// Process-wide request ceiling per minute; 0 disables it
    pub global_requests_per_minute: u32,

    /// Cooldown period between claims for the same address (seconds)
    pub address_cooldown_secs: u64,

    /// Enable captcha verification
    pub captcha_enabled: bool,

    /// Captcha secret key
    pub captcha_secret: Option<String>,

    /// Captcha verification endpoint
    pub captcha_verify_url: String,

    /// Blocks required on top of the receipt, counting its own
    pub confirmations: u64,

    /// Give up waiting for a receipt after this long (seconds)
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval (milliseconds)
    pub confirmation_poll_interval_ms: u64,

    /// Take the client IP from `X-Forwarded-For`
    pub trust_proxy_headers: bool,

    /// Database path
    pub db_path: String,

    /// Expose `/metrics`
    pub metrics_enabled: bool,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins
    pub allowed_origins: Vec<String>,

    pub logging: LoggingConfig,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:3000".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            rpc_timeout_secs: 10,
            private_key: String::new(),
            chain_id: None,
            native_symbol: "ETH".to_string(),
            native_amount: "30000000000000000".to_string(), // 0.03 ETH
            token_a: None,
            token_b: None,
            fee_mode: FeeMode::Legacy,
            native_gas_limit: 21_000,
            token_gas_limit: 100_000,
            max_requests_per_window: 3,
            rate_limit_window_secs: 3600, // 1 hour
            rate_limit_capacity: 100_000,
            global_requests_per_minute: 60,
            address_cooldown_secs: 86400, // 24 hours
            captcha_enabled: true,
            captcha_secret: None,
            captcha_verify_url: "https://hcaptcha.com/siteverify".to_string(),
            confirmations: 1,
            confirmation_timeout_secs: 120,
            confirmation_poll_interval_ms: 1000,
            trust_proxy_headers: false,
            db_path: "./faucet_data".to_string(),
            metrics_enabled: true,
            cors_enabled: true,
            allowed_origins: vec!["*".to_string()],
            logging: LoggingConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, current: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(current)
}

impl FaucetConfig {
    /// Load from a TOML file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> FaucetResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FaucetError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| FaucetError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Defaults or file, then environment overrides
    pub fn load(path: Option<&str>) -> FaucetResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env())
    }

    /// Apply `FAUCET_*` environment variables
    pub fn with_env(mut self) -> Self {
        if let Ok(addr) = std::env::var("FAUCET_SERVER_ADDR") {
            self.server_addr = addr;
        }

        if let Ok(rpc_url) = std::env::var("FAUCET_RPC_URL") {
            self.rpc_url = rpc_url;
        }

        if let Ok(key) = std::env::var("FAUCET_PRIVATE_KEY") {
            self.private_key = key;
        }

        if let Ok(amount) = std::env::var("FAUCET_NATIVE_AMOUNT") {
            self.native_amount = amount;
        }

        if let Ok(mode) = std::env::var("FAUCET_FEE_MODE") {
            self.fee_mode = mode.parse().unwrap_or(self.fee_mode);
        }

        if let Ok(secret) = std::env::var("FAUCET_CAPTCHA_SECRET") {
            self.captcha_secret = Some(secret);
        }

        if let Ok(enabled) = std::env::var("FAUCET_CAPTCHA_ENABLED") {
            self.captcha_enabled = enabled.to_lowercase() == "true";
        }

        if let Ok(db_path) = std::env::var("FAUCET_DB_PATH") {
            self.db_path = db_path;
        }

        self.chain_id = std::env::var("FAUCET_CHAIN_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(self.chain_id);
        self.max_requests_per_window =
            env_parse("FAUCET_MAX_REQUESTS", self.max_requests_per_window);
        self.rate_limit_window_secs =
            env_parse("FAUCET_RATE_LIMIT_WINDOW", self.rate_limit_window_secs);
        self.address_cooldown_secs =
            env_parse("FAUCET_ADDRESS_COOLDOWN", self.address_cooldown_secs);
        self.confirmation_timeout_secs =
            env_parse("FAUCET_CONFIRMATION_TIMEOUT", self.confirmation_timeout_secs);

        self
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> FaucetResult<()> {
        if self.private_key.is_empty() {
            return Err(FaucetError::Config("private_key is required".to_string()));
        }
        if self.max_requests_per_window == 0 {
            return Err(FaucetError::Config(
                "max_requests_per_window must be positive".to_string(),
            ));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(FaucetError::Config(
                "rate_limit_window_secs must be positive".to_string(),
            ));
        }
        if self.confirmations == 0 {
            return Err(FaucetError::Config("confirmations must be at least 1".to_string()));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(FaucetError::Config(
                "confirmation_timeout_secs must be positive".to_string(),
            ));
        }
        if self.confirmation_poll_interval_ms == 0 {
            return Err(FaucetError::Config(
                "confirmation_poll_interval_ms must be positive".to_string(),
            ));
        }
        if let Some(clients) = self.max_clients_per_window() {
            if clients > self.rate_limit_capacity {
                return Err(FaucetError::Config(format!(
                    "rate_limit_capacity {} is below the {} clients the global ceiling admits per window",
                    self.rate_limit_capacity, clients
                )));
            }
        }
        if self.captcha_enabled && self.captcha_secret.is_none() {
            return Err(FaucetError::Config(
                "captcha_secret is required when captcha is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Upper bound on distinct clients inside one rate-limit window: the
    /// global limiter's burst plus its refill over the window. `None` when
    /// the global ceiling is off.
    pub fn max_clients_per_window(&self) -> Option<u64> {
        if self.global_requests_per_minute == 0 {
            return None;
        }
        let per_minute = u64::from(self.global_requests_per_minute);
        let minutes = self.rate_limit_window_secs.div_ceil(60);
        Some(per_minute.saturating_mul(minutes.saturating_add(1)))
    }

    /// Get rate limit duration
    pub fn rate_limit_duration(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Get address cooldown duration
    pub fn address_cooldown_duration(&self) -> Duration {
        Duration::from_secs(self.address_cooldown_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}
