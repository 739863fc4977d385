use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::settings::{
    DEFAULT_BLOCK_SCORE, DEFAULT_HIGH_AMOUNT_THRESHOLD, DEFAULT_VELOCITY_LIMIT,
    DEFAULT_VELOCITY_WINDOW_SECS,
};
use crate::domain::FraudSettings;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Payment service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "payflow")]
#[command(about = "Demo payment service with rule-based fraud screening")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "PAYFLOW_LISTEN_ADDR")]
    pub listen_addr: String,

    /// PostgreSQL connection URL (in-memory storage when unset)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Minimum pooled database connections
    #[arg(long, default_value = "1", env = "PAYFLOW_DB_MIN_CONNECTIONS")]
    pub db_min_connections: u32,

    /// Maximum pooled database connections
    #[arg(long, default_value = "10", env = "PAYFLOW_DB_POOL_SIZE")]
    pub db_max_connections: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "json", env = "PAYFLOW_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Run fraud screening on submitted transactions
    #[arg(long, action = ArgAction::Set, default_value_t = true, env = "FRAUD_DETECTION_ENABLED")]
    pub fraud_detection_enabled: bool,

    /// Amount above which HIGH_AMOUNT triggers
    #[arg(long, default_value_t = Decimal::from(DEFAULT_HIGH_AMOUNT_THRESHOLD), env = "FRAUD_HIGH_AMOUNT_THRESHOLD")]
    pub fraud_high_amount_threshold: Decimal,

    /// Prior transactions in the window that trigger VELOCITY_CHECK
    #[arg(long, default_value_t = DEFAULT_VELOCITY_LIMIT, env = "FRAUD_VELOCITY_LIMIT")]
    pub fraud_velocity_limit: u32,

    /// Velocity window in seconds
    #[arg(long, default_value_t = DEFAULT_VELOCITY_WINDOW_SECS, env = "FRAUD_VELOCITY_WINDOW")]
    pub fraud_velocity_window: u64,

    /// Summed risk score at which a transaction is blocked
    #[arg(long, default_value_t = DEFAULT_BLOCK_SCORE, env = "FRAUD_BLOCK_SCORE")]
    pub fraud_block_score: u32,

    /// Deadline for one fraud evaluation in milliseconds
    #[arg(long, default_value = "2000", env = "PAYFLOW_EVALUATION_TIMEOUT_MS")]
    pub evaluation_timeout_ms: u64,

    /// Probability that a simulated payment fails
    #[arg(long, default_value = "0.05", env = "PAYFLOW_FAILURE_RATE")]
    pub failure_rate: f64,

    /// Enable graceful shutdown
    #[arg(long, action = ArgAction::Set, default_value_t = true, env = "PAYFLOW_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,
}

impl Config {
    /// Get the evaluation deadline as Duration.
    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }

    /// Failure rate clamped to a valid probability.
    pub fn failure_probability(&self) -> f64 {
        if self.failure_rate.is_finite() {
            self.failure_rate.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Settings for the fraud evaluator and aggregator.
    pub fn fraud_settings(&self) -> FraudSettings {
        FraudSettings {
            enabled: self.fraud_detection_enabled,
            high_amount_threshold: self.fraud_high_amount_threshold,
            velocity_limit: self.fraud_velocity_limit,
            velocity_window_secs: self.fraud_velocity_window,
            block_score: self.fraud_block_score,
        }
    }

    pub fn storage_kind(&self) -> &'static str {
        if self.database_url.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            db_min_connections: 1,
            db_max_connections: 10,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            fraud_detection_enabled: true,
            fraud_high_amount_threshold: Decimal::from(DEFAULT_HIGH_AMOUNT_THRESHOLD),
            fraud_velocity_limit: DEFAULT_VELOCITY_LIMIT,
            fraud_velocity_window: DEFAULT_VELOCITY_WINDOW_SECS,
            fraud_block_score: DEFAULT_BLOCK_SCORE,
            evaluation_timeout_ms: 2000,
            failure_rate: 0.05,
            graceful_shutdown: true,
        }
    }
}
