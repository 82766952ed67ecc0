use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// CLI arguments for the quote server.
#[derive(Parser, Debug, Clone)]
#[command(name = "fxqs")]
#[command(about = "FX quote server")]
#[command(version)]
pub struct Args {
    /// Socket address to listen on.
    #[arg(long, default_value = "0.0.0.0:11000", env = "FXQS_LISTEN")]
    pub listen: SocketAddr,
    /// Socket address for the metrics endpoint.
    #[arg(long, default_value = "127.0.0.1:9090", env = "FXQS_METRICS")]
    pub metrics_addr: SocketAddr,
    /// Maximum total concurrent connections.
    #[arg(long, default_value = "10000", env = "FXQS_MAX_CONNS")]
    pub max_conns: usize,
    /// Served requests per user before a lockout is imposed.
    #[arg(long, default_value = "5", env = "FXQS_REQUEST_LIMIT")]
    pub request_limit: u32,
    /// Lockout duration in seconds.
    #[arg(long, default_value = "60", env = "FXQS_BLOCK_SECS")]
    pub block_secs: u64,
    /// Login phase timeout in seconds.
    #[arg(long, default_value = "30", env = "FXQS_LOGIN_TIMEOUT")]
    pub login_timeout: u64,
    /// Maximum frame size in bytes (one read is one frame).
    #[arg(long, default_value = "1024", env = "FXQS_MAX_FRAME")]
    pub max_frame: usize,
    /// Path to a TOML file with `[users]` and `[rates]` tables.
    #[arg(long, env = "FXQS_TABLES")]
    pub tables: Option<PathBuf>,
}

/// Runtime configuration derived from [`Args`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub listen: SocketAddr,
    /// Socket address for the metrics endpoint.
    pub metrics_addr: SocketAddr,
    /// Maximum total concurrent connections.
    pub max_conns: usize,
    /// Served requests per user before a lockout is imposed.
    pub request_limit: u32,
    /// Lockout duration in seconds.
    pub block_secs: u64,
    /// Login phase timeout in seconds.
    pub login_timeout: u64,
    /// Maximum frame size in bytes.
    pub max_frame: usize,
}

impl ServerConfig {
    /// Validates the configuration values are within acceptable bounds.
    /// Returns Ok(()) if valid, Err with description otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_conns == 0 {
            return Err("max_conns must be greater than 0".to_string());
        }
        if self.max_conns > 1_000_000 {
            return Err("max_conns exceeds reasonable limit (1,000,000)".to_string());
        }

        if self.request_limit == 0 {
            return Err("request_limit must be greater than 0".to_string());
        }
        if self.request_limit > 1_000_000 {
            return Err("request_limit exceeds reasonable limit (1,000,000)".to_string());
        }

        if self.block_secs == 0 {
            return Err("block_secs must be greater than 0".to_string());
        }
        if self.block_secs > 86_400 {
            return Err("block_secs exceeds reasonable limit (86400 seconds / 1 day)".to_string());
        }

        if self.login_timeout == 0 {
            return Err("login_timeout must be greater than 0".to_string());
        }
        if self.login_timeout > 300 {
            return Err("login_timeout exceeds reasonable limit (300 seconds)".to_string());
        }

        if self.max_frame == 0 {
            return Err("max_frame must be greater than 0".to_string());
        }
        if self.max_frame > 65_536 {
            return Err("max_frame exceeds reasonable limit (65536 bytes)".to_string());
        }
        Ok(())
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            listen: args.listen,
            metrics_addr: args.metrics_addr,
            max_conns: args.max_conns,
            request_limit: args.request_limit,
            block_secs: args.block_secs,
            login_timeout: args.login_timeout,
            max_frame: args.max_frame,
        }
    }
}

/// Credential and rate tables, deserialized from a TOML file or defaulted.
#[derive(Debug, Clone, Deserialize)]
pub struct Tables {
    /// username → password.
    #[serde(default = "default_users")]
    pub users: HashMap<String, String>,
    /// currency symbol → baseline value.
    #[serde(default = "default_rates")]
    pub rates: HashMap<String, f64>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            users: default_users(),
            rates: default_rates(),
        }
    }
}

fn default_users() -> HashMap<String, String> {
    HashMap::from([
        ("user1".to_string(), "password1".to_string()),
        ("user2".to_string(), "password2".to_string()),
    ])
}

fn default_rates() -> HashMap<String, f64> {
    HashMap::from([
        ("USD".to_string(), 1.0),
        ("EUR".to_string(), 0.85),
        ("UAH".to_string(), 27.2),
    ])
}

impl Tables {
    /// Validates that both tables are usable.
    /// Returns Ok(()) if valid, Err with description otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.users.is_empty() {
            return Err("users table must not be empty".to_string());
        }
        if self.rates.is_empty() {
            return Err("rates table must not be empty".to_string());
        }
        for (symbol, value) in &self.rates {
            if !value.is_finite() || *value <= 0.0 {
                return Err(format!("rate for {symbol} must be finite and positive"));
            }
        }
        Ok(())
    }
}
