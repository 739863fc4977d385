use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::domain::{
    FraudAlert, FraudSettings, NewTransaction, Transaction, TransactionId, TransactionStatus,
};
use crate::observability::{MetricsRegistry, TimingGuard};
use crate::rules::{Aggregation, Aggregator, FraudEvaluator};
use crate::storage::{Storage, TransactionStats};

/// Default deadline for one fraud evaluation.
pub const DEFAULT_EVALUATION_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default probability of a simulated payment failure.
pub const DEFAULT_FAILURE_RATE: f64 = 0.05;

/// Errors that fail a submission.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] crate::domain::ValidationError),

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

/// Errors raised after the transaction is persisted.
///
/// These are logged and counted; the submission still succeeds.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningError {
    #[error("failed to persist fraud alerts: {0}")]
    PersistAlerts(#[source] anyhow::Error),

    #[error("failed to persist status {status}: {source}")]
    PersistStatus {
        status: TransactionStatus,
        #[source]
        source: anyhow::Error,
    },
}

/// Result of a submission.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedTransaction {
    pub transaction: Transaction,
    pub alerts: Vec<FraudAlert>,
    pub total_risk_score: u32,
}

/// A transaction together with its persisted alerts.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetails {
    pub transaction: Transaction,
    pub alerts: Vec<FraudAlert>,
}

/// Payment pipeline: persist, screen, aggregate, persist the decision.
pub struct PaymentProcessor {
    storage: Arc<dyn Storage>,
    evaluator: FraudEvaluator,
    aggregator: Aggregator,
    metrics: Arc<MetricsRegistry>,
    evaluation_timeout: Duration,
    failure_rate: f64,
}

impl PaymentProcessor {
    pub fn new(
        storage: Arc<dyn Storage>,
        settings: &FraudSettings,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        PaymentProcessor {
            storage,
            evaluator: FraudEvaluator::from_settings(settings),
            aggregator: Aggregator::from_settings(settings),
            metrics,
            evaluation_timeout: DEFAULT_EVALUATION_TIMEOUT,
            failure_rate: DEFAULT_FAILURE_RATE,
        }
    }

    pub fn with_evaluation_timeout(mut self, timeout: Duration) -> Self {
        self.evaluation_timeout = timeout;
        self
    }

    /// Probability in `[0, 1]`; out-of-range values are clamped.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = if rate.is_finite() {
            rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn evaluator(&self) -> &FraudEvaluator {
        &self.evaluator
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Process one payment.
    pub async fn submit(&self, request: NewTransaction) -> Result<ProcessedTransaction, ProcessError> {
        let status = self.simulate_outcome();
        let mut tx = request.into_transaction(status);

        if let Err(e) = self.storage.insert_transaction(&tx).await {
            self.metrics.record_storage_error();
            error!(
                transaction_id = %tx.id,
                error = %e,
                "Failed to persist transaction"
            );
            return Err(ProcessError::Storage(e));
        }

        if status == TransactionStatus::Failed {
            warn!(
                transaction_id = %tx.id,
                from_account = %tx.from_account,
                amount = %tx.amount,
                reason = "INSUFFICIENT_FUNDS",
                "Transaction failed"
            );
        }

        let alerts = match self.screen(&mut tx).await {
            Ok(alerts) => alerts,
            Err(e) => {
                self.report_screening_error(tx.id, &e);
                Vec::new()
            }
        };

        let total_risk_score = crate::domain::total_risk_score(&alerts);
        self.metrics.record_transaction(tx.status);

        info!(
            transaction_id = %tx.id,
            status = %tx.status,
            amount = %tx.amount,
            alerts = alerts.len(),
            risk_score = total_risk_score,
            "Transaction processed"
        );

        Ok(ProcessedTransaction {
            transaction: tx,
            alerts,
            total_risk_score,
        })
    }

    /// Evaluate, persist alerts, aggregate and persist the status change.
    ///
    /// Returns the persisted alerts. If the alerts cannot be written nothing
    /// else is; if only the status write fails the alerts are still returned
    /// and `tx` keeps its previous status.
    async fn screen(&self, tx: &mut Transaction) -> Result<Vec<FraudAlert>, ScreeningError> {
        if !self.evaluator.is_enabled() {
            return Ok(Vec::new());
        }

        let evaluation = {
            let _timer = TimingGuard::new(&self.metrics);
            tokio::time::timeout(
                self.evaluation_timeout,
                self.evaluator.evaluate(tx, self.storage.history()),
            )
            .await
        };

        let evaluation = match evaluation {
            Ok(evaluation) => evaluation,
            Err(_) => {
                self.metrics.record_evaluation_timeout();
                warn!(
                    transaction_id = %tx.id,
                    timeout_ms = self.evaluation_timeout.as_millis() as u64,
                    "Fraud evaluation timed out, no alerts recorded"
                );
                return Ok(Vec::new());
            }
        };

        if !evaluation.skipped.is_empty() {
            self.metrics.record_lookup_failures(evaluation.skipped.len());
        }

        if evaluation.alerts.is_empty() {
            return Ok(Vec::new());
        }

        self.storage
            .record_alerts(&evaluation.alerts)
            .await
            .map_err(ScreeningError::PersistAlerts)?;
        self.metrics.record_alerts(&evaluation.alerts);

        for alert in &evaluation.alerts {
            warn!(
                transaction_id = %tx.id,
                rule = %alert.rule(),
                severity = %alert.severity(),
                risk_score = alert.risk_score(),
                details = alert.details(),
                "Fraud alert raised"
            );
        }

        let aggregation = self.aggregator.aggregate(tx, &evaluation.alerts);
        if let Err(e) = self.apply(tx, &aggregation).await {
            self.report_screening_error(tx.id, &e);
        }

        Ok(evaluation.alerts)
    }

    fn report_screening_error(&self, id: TransactionId, e: &ScreeningError) {
        self.metrics.record_screening_error();
        error!(
            transaction_id = %id,
            error = %e,
            "Fraud screening failed"
        );
    }

    async fn apply(
        &self,
        tx: &mut Transaction,
        aggregation: &Aggregation,
    ) -> Result<(), ScreeningError> {
        let Some(status) = aggregation.update() else {
            return Ok(());
        };

        let updated = self
            .storage
            .update_status(tx.id, status)
            .await
            .map_err(|source| ScreeningError::PersistStatus { status, source })?;

        if updated {
            tx.status = status;
            warn!(
                transaction_id = %tx.id,
                risk_score = aggregation.total_risk_score,
                block_score = self.aggregator.block_score(),
                "Transaction blocked"
            );
        }

        Ok(())
    }

    fn simulate_outcome(&self) -> TransactionStatus {
        if self.failure_rate > 0.0 && rand::rng().random_bool(self.failure_rate) {
            TransactionStatus::Failed
        } else {
            TransactionStatus::Success
        }
    }

    pub async fn recent_transactions(&self, limit: usize) -> anyhow::Result<Vec<Transaction>> {
        self.storage.list_transactions(limit).await
    }

    pub async fn transaction_with_alerts(
        &self,
        id: TransactionId,
    ) -> anyhow::Result<Option<TransactionDetails>> {
        let Some(transaction) = self.storage.get_transaction(id).await? else {
            return Ok(None);
        };
        let alerts = self.storage.alerts_for_transaction(id).await?;

        Ok(Some(TransactionDetails {
            transaction,
            alerts,
        }))
    }

    pub async fn recent_alerts(&self, limit: usize) -> anyhow::Result<Vec<FraudAlert>> {
        self.storage.list_alerts(limit).await
    }

    pub async fn stats(&self) -> anyhow::Result<TransactionStats> {
        self.storage.stats().await
    }
}
