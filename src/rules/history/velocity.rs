use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::{RuleHit, RuleId, Transaction};
use crate::rules::traits::HistoryRule;
use crate::storage::HistoryLookup;

const SCORE_AT_LIMIT: u32 = 40;
const SCORE_AT_DOUBLE_LIMIT: u32 = 70;

/// Velocity rule.
///
/// Counts other transactions from the same source account inside a
/// trailing window ending at the transaction's creation time.
#[derive(Debug)]
pub struct VelocityRule {
    /// Prior transaction count that triggers the rule
    limit: u32,
    /// Trailing window in seconds
    window_secs: u64,
}

impl VelocityRule {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        VelocityRule {
            limit: limit.max(1),
            window_secs,
        }
    }
}

#[async_trait]
impl HistoryRule for VelocityRule {
    fn id(&self) -> RuleId {
        RuleId::VelocityCheck
    }

    async fn evaluate(
        &self,
        tx: &Transaction,
        history: &dyn HistoryLookup,
    ) -> anyhow::Result<Option<RuleHit>> {
        let since = i64::try_from(self.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|window| tx.created_at.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let count = history
            .count_from_account_since(&tx.from_account, since, tx.created_at, tx.id)
            .await?;

        let limit = u64::from(self.limit);
        if count < limit {
            return Ok(None);
        }

        let score = if count >= limit * 2 {
            SCORE_AT_DOUBLE_LIMIT
        } else {
            SCORE_AT_LIMIT
        };

        Ok(Some(RuleHit::new(
            self.id(),
            score,
            format!(
                "Account {} made {} transactions in {} seconds",
                tx.from_account,
                count + 1,
                self.window_secs
            ),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, Severity, TransactionStatus};
    use crate::storage::{MemoryStorage, Storage};
    use rust_decimal::Decimal;

    fn test_tx(from: &str) -> Transaction {
        Transaction::new(
            AccountId::new(from),
            AccountId::new("MERCHANT"),
            Decimal::new(2500, 2),
            "",
            TransactionStatus::Success,
        )
    }

    async fn seed(storage: &MemoryStorage, from: &str, count: usize, age_secs: i64) {
        for _ in 0..count {
            let tx = test_tx(from).with_created_at(Utc::now() - Duration::seconds(age_secs));
            storage.insert_transaction(&tx).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_below_limit() {
        let storage = MemoryStorage::new();
        seed(&storage, "ACC-1", 2, 5).await;

        let tx = test_tx("ACC-1");
        storage.insert_transaction(&tx).await.unwrap();

        let rule = VelocityRule::new(3, 60);
        assert!(rule.evaluate(&tx, &storage).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_at_limit() {
        let storage = MemoryStorage::new();
        seed(&storage, "ACC-1", 3, 5).await;

        let tx = test_tx("ACC-1");
        storage.insert_transaction(&tx).await.unwrap();

        let hit = VelocityRule::new(3, 60)
            .evaluate(&tx, &storage)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(hit.rule, RuleId::VelocityCheck);
        assert_eq!(hit.risk_score, 40);
        assert_eq!(hit.severity(), Severity::Medium);
        assert_eq!(hit.details, "Account ACC-1 made 4 transactions in 60 seconds");
    }

    #[tokio::test]
    async fn test_at_double_limit() {
        let storage = MemoryStorage::new();
        seed(&storage, "ACC-1", 6, 5).await;

        let tx = test_tx("ACC-1");
        let hit = VelocityRule::new(3, 60)
            .evaluate(&tx, &storage)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(hit.risk_score, 70);
        assert_eq!(hit.severity(), Severity::High);
    }

    #[tokio::test]
    async fn test_outside_window_and_other_accounts_ignored() {
        let storage = MemoryStorage::new();
        seed(&storage, "ACC-1", 5, 120).await;
        seed(&storage, "ACC-2", 5, 5).await;

        let tx = test_tx("ACC-1");
        assert!(VelocityRule::new(3, 60)
            .evaluate(&tx, &storage)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_later_transactions_not_counted() {
        let storage = MemoryStorage::new();
        let tx = test_tx("ACC-1").with_created_at(Utc::now() - Duration::seconds(30));
        storage.insert_transaction(&tx).await.unwrap();
        seed(&storage, "ACC-1", 5, 5).await;

        assert!(VelocityRule::new(3, 60)
            .evaluate(&tx, &storage)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_lookup_error_propagates_to_evaluator() {
        let storage = MemoryStorage::new();
        storage.set_lookup_failure(true);

        let tx = test_tx("ACC-1");
        assert!(VelocityRule::new(3, 60).evaluate(&tx, &storage).await.is_err());
    }
}
