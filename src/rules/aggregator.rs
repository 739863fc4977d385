use serde::Serialize;

use crate::domain::{FraudAlert, FraudSettings, Transaction, TransactionStatus};

/// Outcome of combining a transaction's alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    /// Sum of the alert risk scores
    pub total_risk_score: u32,
    /// Status before aggregation
    pub previous: TransactionStatus,
    /// Status after aggregation
    pub status: TransactionStatus,
}

impl Aggregation {
    /// Returns true if the status sink has something to persist.
    #[inline]
    pub fn changed(&self) -> bool {
        self.previous != self.status
    }

    /// The new status, or `None` when unchanged.
    pub fn update(&self) -> Option<TransactionStatus> {
        self.changed().then_some(self.status)
    }
}

/// Turns a transaction's alerts into a blocking decision.
///
/// Blocking applies to `pending` and `success` only; a `failed`
/// transaction keeps its status whatever the score.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    block_score: u32,
}

impl Aggregator {
    pub fn new(block_score: u32) -> Self {
        Aggregator { block_score }
    }

    pub fn from_settings(settings: &FraudSettings) -> Self {
        Aggregator::new(settings.block_score)
    }

    pub fn block_score(&self) -> u32 {
        self.block_score
    }

    /// Sum alert scores and decide the resulting status.
    ///
    /// Alerts raised for other transactions are ignored.
    pub fn aggregate(&self, tx: &Transaction, alerts: &[FraudAlert]) -> Aggregation {
        let mut count = 0usize;
        let total_risk_score = alerts
            .iter()
            .filter(|alert| alert.transaction_id() == tx.id)
            .inspect(|_| count += 1)
            .fold(0u32, |acc, alert| acc.saturating_add(alert.risk_score()));

        let status = if count > 0 && total_risk_score >= self.block_score && tx.status.is_blockable()
        {
            TransactionStatus::Blocked
        } else {
            tx.status
        };

        Aggregation {
            total_risk_score,
            previous: tx.status,
            status,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Aggregator::from_settings(&FraudSettings::default())
    }
}
