use crate::domain::{Address, Decimal, DEFAULT_DECIMALS};
use crate::engine::BONUS_WINDOW_SECS;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub rpc_url: String,
    pub staking_contract: Address,
    pub asset_token: Address,
    pub account: Option<Address>,
    pub token_decimals: u32,
    pub refresh_interval: Duration,
    pub countdown_tick: Duration,
    pub poll_interval: Duration,
    pub max_confirmation_attempts: Option<u32>,
    pub confirmation_mode: ConfirmationMode,
    pub bonus_window_secs: i64,
    pub display: DisplayConfig,
}

/// Whether value-moving actions wait for their receipt before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMode {
    Blocking,
    /// Return the operation id right after submission; confirmation is tracked in the
    /// background.
    Detached,
}

/// Precision used when rendering snapshot values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub amount_decimals: u32,
    pub percent_decimals: u32,
    /// Penalty shown in the early-withdrawal warning, independent of the ledger's own value.
    pub advertised_penalty_percent: Decimal,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            amount_decimals: 4,
            percent_decimals: 2,
            advertised_penalty_percent: Decimal::from(rust_decimal::Decimal::from(30u32)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = required(&env_map, "DATABASE_PATH")?;
        let rpc_url = required(&env_map, "RPC_URL")?;
        let staking_contract = parse_address(&env_map, "STAKING_CONTRACT")?;
        let asset_token = parse_address(&env_map, "ASSET_TOKEN")?;

        let account = match env_map.get("ACCOUNT").filter(|s| !s.trim().is_empty()) {
            Some(s) => Some(Address::from_str(s).map_err(|e| {
                ConfigError::InvalidValue("ACCOUNT".to_string(), e.to_string())
            })?),
            None => None,
        };

        let token_decimals = parse_or(&env_map, "TOKEN_DECIMALS", DEFAULT_DECIMALS, "must be a valid u32")?;
        if token_decimals > 77 {
            return Err(ConfigError::InvalidValue(
                "TOKEN_DECIMALS".to_string(),
                "must be at most 77".to_string(),
            ));
        }

        let refresh_interval = parse_millis(&env_map, "REFRESH_INTERVAL_MS", 2000)?;
        let countdown_tick = parse_millis(&env_map, "COUNTDOWN_TICK_MS", 1000)?;
        let poll_interval = parse_millis(&env_map, "POLL_INTERVAL_MS", 2000)?;

        let max_confirmation_attempts = match env_map.get("MAX_CONFIRMATION_ATTEMPTS") {
            Some(s) => Some(s.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MAX_CONFIRMATION_ATTEMPTS".to_string(),
                    "must be a positive u32".to_string(),
                )
            })?),
            None => None,
        };

        let confirmation_mode = match env_map
            .get("CONFIRMATION_MODE")
            .map(|s| s.as_str())
            .unwrap_or("blocking")
        {
            "blocking" => ConfirmationMode::Blocking,
            "detached" => ConfirmationMode::Detached,
            other => {
                return Err(ConfigError::InvalidValue(
                    "CONFIRMATION_MODE".to_string(),
                    format!("must be blocking or detached, got {}", other),
                ))
            }
        };

        let bonus_window_secs = parse_or(
            &env_map,
            "BONUS_WINDOW_SECS",
            BONUS_WINDOW_SECS,
            "must be a valid i64",
        )?;

        let defaults = DisplayConfig::default();
        let display = DisplayConfig {
            amount_decimals: parse_or(
                &env_map,
                "AMOUNT_DECIMALS",
                defaults.amount_decimals,
                "must be a valid u32",
            )?,
            percent_decimals: parse_or(
                &env_map,
                "PERCENT_DECIMALS",
                defaults.percent_decimals,
                "must be a valid u32",
            )?,
            advertised_penalty_percent: parse_or(
                &env_map,
                "ADVERTISED_PENALTY_PERCENT",
                defaults.advertised_penalty_percent,
                "must be a decimal number",
            )?,
        };

        Ok(Config {
            port,
            database_path,
            rpc_url,
            staking_contract,
            asset_token,
            account,
            token_decimals,
            refresh_interval,
            countdown_tick,
            poll_interval,
            max_confirmation_attempts,
            confirmation_mode,
            bonus_window_secs,
            display,
        })
    }
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    env_map
        .get(key)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn parse_address(env_map: &HashMap<String, String>, key: &str) -> Result<Address, ConfigError> {
    Address::from_str(&required(env_map, key)?)
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expectation: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(s) => s
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), expectation.to_string())),
        None => Ok(default),
    }
}

fn parse_millis(
    env_map: &HashMap<String, String>,
    key: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    let ms = parse_or(env_map, key, default_ms, "must be a positive number of milliseconds")?;
    if ms == 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be a positive number of milliseconds".to_string(),
        ));
    }
    Ok(Duration::from_millis(ms))
}
