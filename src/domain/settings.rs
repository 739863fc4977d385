use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;

/// Default amount above which HIGH_AMOUNT triggers.
pub const DEFAULT_HIGH_AMOUNT_THRESHOLD: i64 = 5000;

/// Default number of prior transactions that trips VELOCITY_CHECK.
pub const DEFAULT_VELOCITY_LIMIT: u32 = 3;

/// Default trailing window for VELOCITY_CHECK.
pub const DEFAULT_VELOCITY_WINDOW_SECS: u64 = 60;

/// Default alert score total at which a transaction is blocked.
pub const DEFAULT_BLOCK_SCORE: u32 = 80;

/// Parameters for the fraud evaluator and aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FraudSettings {
    /// Evaluator-wide switch
    pub enabled: bool,

    /// HIGH_AMOUNT threshold in currency units
    #[serde(with = "rust_decimal::serde::float")]
    pub high_amount_threshold: Decimal,

    /// VELOCITY_CHECK count limit
    pub velocity_limit: u32,

    /// VELOCITY_CHECK trailing window in seconds
    pub velocity_window_secs: u64,

    /// Score total that blocks a transaction
    pub block_score: u32,
}

impl FraudSettings {
    pub fn velocity_window(&self) -> Duration {
        Duration::from_secs(self.velocity_window_secs)
    }

    /// Same settings with the evaluator switched off.
    pub fn disabled() -> Self {
        FraudSettings {
            enabled: false,
            ..Default::default()
        }
    }
}

impl Default for FraudSettings {
    fn default() -> Self {
        FraudSettings {
            enabled: true,
            high_amount_threshold: Decimal::from(DEFAULT_HIGH_AMOUNT_THRESHOLD),
            velocity_limit: DEFAULT_VELOCITY_LIMIT,
            velocity_window_secs: DEFAULT_VELOCITY_WINDOW_SECS,
            block_score: DEFAULT_BLOCK_SCORE,
        }
    }
}
