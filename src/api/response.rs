use serde::Serialize;

use crate::domain::FraudSettings;
use crate::storage::TransactionStats;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub storage: String,
    pub fraud_detection: bool,
    pub rules: usize,
}

/// Aggregate figures for the dashboard.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub revenue: f64,
    pub transactions: u64,
    pub success_rate: f64,
    pub blocked: u64,
    pub alerts: u64,
}

impl From<TransactionStats> for StatsResponse {
    fn from(stats: TransactionStats) -> Self {
        use rust_decimal::prelude::ToPrimitive;

        StatsResponse {
            revenue: stats.revenue.to_f64().unwrap_or_default(),
            transactions: stats.transactions,
            success_rate: stats.success_rate(),
            blocked: stats.blocked,
            alerts: stats.alerts,
        }
    }
}

/// Effective settings of the running service.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    pub fraud: FraudSettings,
    pub storage: String,
    pub evaluation_timeout_ms: u64,
    pub failure_rate: f64,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "BAD_REQUEST")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "NOT_FOUND")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "INTERNAL_ERROR")
    }
}
