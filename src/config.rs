//! Configuration loader for the `codemetal-fanflow` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{FixedOffset, Local, Offset};

use crate::engine::EngineSettings;
use crate::rollup::RollupStrategy;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Where devices, readings and rollups are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("Invalid STORE_BACKEND '{}' (expected postgres|memory)", other)),
        }
    }
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    pub store_backend: StoreBackend,

    /// PostgreSQL connection string; only set for the postgres backend.
    pub db_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// HTTP listen port.
    pub port: u16,

    /// Offset defining local midnight for rollups and series alignment.
    pub utc_offset: FixedOffset,

    pub rollup_strategy: RollupStrategy,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string (postgres backend only)
///
/// Optional:
/// - `STORE_BACKEND` – `postgres` or `memory` (default: postgres)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `PORT` – HTTP listen port (default: 8080)
/// - `DAY_UTC_OFFSET_MINUTES` – local offset for day boundaries (default: server local)
/// - `ROLLUP_STRATEGY` – `recompute` or `incremental` (default: recompute)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let store_backend = match env::var("STORE_BACKEND") {
        Ok(v) => v.parse()?,
        Err(_) => StoreBackend::Postgres,
    };
    let db_url = match store_backend {
        StoreBackend::Postgres => Some(require_env!("DATABASE_URL")),
        StoreBackend::Memory => env::var("DATABASE_URL").ok(),
    };
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let port = u16::try_from(parse_env_u32!("PORT", 8080))
        .map_err(|e| anyhow!("Invalid PORT: {}", e))?;

    let utc_offset = match env::var("DAY_UTC_OFFSET_MINUTES") {
        Ok(v) => parse_offset_minutes(&v)?,
        Err(_) => Local::now().offset().fix(),
    };
    let rollup_strategy = match env::var("ROLLUP_STRATEGY") {
        Ok(v) => v.parse().map_err(|e| anyhow!("Invalid ROLLUP_STRATEGY: {}", e))?,
        Err(_) => RollupStrategy::default(),
    };

    Ok(Config {
        store_backend,
        db_url,
        db_pool_max,
        port,
        utc_offset,
        rollup_strategy,
    })
}

/// Parse a signed minute offset from UTC, e.g. `-300` or `330`.
fn parse_offset_minutes(raw: &str) -> Result<FixedOffset> {
    // ---
    let minutes: i32 = raw
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid DAY_UTC_OFFSET_MINUTES: {}", e))?;
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| anyhow!("DAY_UTC_OFFSET_MINUTES out of range: {}", minutes))
}

/// Mask the password in a database URL for logging.
fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
        }
    }
    db_url.to_string()
}

impl Config {
    /// Engine knobs derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        // ---
        EngineSettings {
            utc_offset: self.utc_offset,
            rollup_strategy: self.rollup_strategy,
        }
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_db_url = self
            .db_url
            .as_deref()
            .map(mask_db_url)
            .unwrap_or_else(|| "(unset)".to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  STORE_BACKEND          : {:?}", self.store_backend);
        tracing::info!("  DATABASE_URL           : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX            : {}", self.db_pool_max);
        tracing::info!("  PORT                   : {}", self.port);
        tracing::info!("  DAY_UTC_OFFSET_MINUTES : {}", self.utc_offset.local_minus_utc() / 60);
        tracing::info!("  ROLLUP_STRATEGY        : {:?}", self.rollup_strategy);
    }
}
