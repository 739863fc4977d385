use async_trait::async_trait;
use chrono::Duration;

use crate::domain::{RuleHit, RuleId, Transaction};
use crate::rules::traits::HistoryRule;
use crate::storage::HistoryLookup;

/// Trailing window for duplicate detection.
const DUPLICATE_WINDOW_MINUTES: i64 = 5;

const SCORE: u32 = 60;

/// Duplicate transaction rule.
///
/// Triggers when an earlier transaction with the same source, destination
/// and amount exists within the last five minutes.
#[derive(Debug, Default)]
pub struct DuplicateRule;

impl DuplicateRule {
    pub fn new() -> Self {
        DuplicateRule
    }
}

#[async_trait]
impl HistoryRule for DuplicateRule {
    fn id(&self) -> RuleId {
        RuleId::DuplicateTransaction
    }

    async fn evaluate(
        &self,
        tx: &Transaction,
        history: &dyn HistoryLookup,
    ) -> anyhow::Result<Option<RuleHit>> {
        let since = tx.created_at - Duration::minutes(DUPLICATE_WINDOW_MINUTES);

        let existing = history
            .find_matching_since(
                &tx.from_account,
                &tx.to_account,
                tx.amount,
                since,
                tx.created_at,
                tx.id,
            )
            .await?;

        Ok(existing.map(|_| {
            RuleHit::new(
                self.id(),
                SCORE,
                format!(
                    "Duplicate transaction detected: same amount ${:.2} to {} within {} minutes",
                    tx.amount, tx.to_account, DUPLICATE_WINDOW_MINUTES
                ),
            )
        }))
    }
}
