use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{AccountId, FraudAlert, Transaction, TransactionId, TransactionStatus};

/// Read-only view of prior transactions used by the history rules.
///
/// Both queries are point-in-time reads with no isolation guarantee. The
/// window is open at both ends: `since < created_at < until`, so rows written
/// after the transaction under evaluation are never seen.
#[async_trait]
pub trait HistoryLookup: Send + Sync {
    /// Count transactions from `account` created inside the window, excluding `exclude`.
    async fn count_from_account_since(
        &self,
        account: &AccountId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude: TransactionId,
    ) -> anyhow::Result<u64>;

    /// Find one transaction with the same source, destination and amount
    /// (cent precision) created inside the window, excluding `exclude`.
    async fn find_matching_since(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude: TransactionId,
    ) -> anyhow::Result<Option<TransactionId>>;
}

/// Aggregate figures for the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionStats {
    /// Sum of successful transaction amounts
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
    pub transactions: u64,
    pub successful: u64,
    pub blocked: u64,
    pub alerts: u64,
}

impl TransactionStats {
    /// Share of successful transactions, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.transactions == 0 {
            return 0.0;
        }
        self.successful as f64 / self.transactions as f64 * 100.0
    }
}

/// Storage trait for persistence operations.
#[async_trait]
pub trait Storage: HistoryLookup {
    /// This backend viewed as a history lookup for the evaluator.
    fn history(&self) -> &dyn HistoryLookup;

    // Transactions
    async fn insert_transaction(&self, tx: &Transaction) -> anyhow::Result<()>;
    async fn get_transaction(&self, id: TransactionId) -> anyhow::Result<Option<Transaction>>;
    async fn list_transactions(&self, limit: usize) -> anyhow::Result<Vec<Transaction>>;

    /// Persist a status decision. Never overrides a `failed` transaction;
    /// returns whether a row was changed.
    async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> anyhow::Result<bool>;

    // Alerts
    async fn record_alerts(&self, alerts: &[FraudAlert]) -> anyhow::Result<()>;
    async fn alerts_for_transaction(&self, id: TransactionId) -> anyhow::Result<Vec<FraudAlert>>;
    async fn list_alerts(&self, limit: usize) -> anyhow::Result<Vec<FraudAlert>>;

    // Operational
    async fn stats(&self) -> anyhow::Result<TransactionStats>;
    async fn ping(&self) -> anyhow::Result<()>;
}
