use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::{RuleHit, RuleId, Transaction};
use crate::storage::HistoryLookup;

/// Trait for stateless inline rules.
///
/// Inline rules decide from the transaction alone and cannot fail.
pub trait InlineRule: Send + Sync + Debug {
    /// Identifier reported on alerts.
    fn id(&self) -> RuleId;

    /// Evaluate the rule against a transaction.
    ///
    /// Returns a hit when the rule triggers.
    fn evaluate(&self, tx: &Transaction) -> Option<RuleHit>;
}

/// Trait for rules that consult prior transactions.
///
/// History rules only read through the lookup. A lookup error is returned
/// to the evaluator, which treats it as "did not trigger".
#[async_trait]
pub trait HistoryRule: Send + Sync + Debug {
    /// Identifier reported on alerts.
    fn id(&self) -> RuleId;

    /// Evaluate the rule against a transaction with history context.
    async fn evaluate(
        &self,
        tx: &Transaction,
        history: &dyn HistoryLookup,
    ) -> anyhow::Result<Option<RuleHit>>;
}
