pub mod aggregator;
pub mod history;
pub mod inline;
pub mod traits;

pub use aggregator::{Aggregation, Aggregator};
pub use history::{DuplicateRule, VelocityRule};
pub use inline::{HighAmountRule, SuspiciousPatternRule};
pub use traits::{HistoryRule, InlineRule};

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{total_risk_score, FraudAlert, FraudSettings, RuleHit, RuleId, Transaction};
use crate::storage::HistoryLookup;

/// A rule that produced no result because its history lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    pub rule: RuleId,
    pub error: String,
}

/// Result of evaluating one transaction.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Alerts for the rules that triggered, in rule order
    pub alerts: Vec<FraudAlert>,
    /// Rules skipped because of lookup failures
    pub skipped: Vec<SkippedRule>,
}

impl Evaluation {
    pub fn total_risk_score(&self) -> u32 {
        total_risk_score(&self.alerts)
    }
}

/// The fixed fraud rule set.
///
/// Inline rules run synchronously; history rules run concurrently against
/// the injected lookup. Lookup failures are fail-open: the affected rule is
/// skipped and logged, and evaluation carries on.
pub struct FraudEvaluator {
    enabled: bool,
    pub inline: Vec<Arc<dyn InlineRule>>,
    pub history: Vec<Arc<dyn HistoryRule>>,
}

impl FraudEvaluator {
    /// Build the rule set from settings.
    pub fn from_settings(settings: &FraudSettings) -> Self {
        let inline: Vec<Arc<dyn InlineRule>> = vec![
            Arc::new(HighAmountRule::new(settings.high_amount_threshold)),
            Arc::new(SuspiciousPatternRule::new()),
        ];

        let history: Vec<Arc<dyn HistoryRule>> = vec![
            Arc::new(VelocityRule::new(
                settings.velocity_limit,
                settings.velocity_window_secs,
            )),
            Arc::new(DuplicateRule::new()),
        ];

        FraudEvaluator {
            enabled: settings.enabled,
            inline,
            history,
        }
    }

    /// Create an evaluator that never raises alerts.
    pub fn disabled() -> Self {
        FraudEvaluator {
            enabled: false,
            inline: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rule_count(&self) -> usize {
        self.inline.len() + self.history.len()
    }

    /// Run every rule against a transaction.
    ///
    /// Never fails and has no side effects besides building alerts.
    pub async fn evaluate(&self, tx: &Transaction, history: &dyn HistoryLookup) -> Evaluation {
        if !self.enabled {
            return Evaluation::default();
        }

        let mut hits: Vec<RuleHit> = self
            .inline
            .iter()
            .filter_map(|rule| rule.evaluate(tx))
            .collect();

        let results = join_all(
            self.history
                .iter()
                .map(|rule| async move { (rule.id(), rule.evaluate(tx, history).await) }),
        )
        .await;

        let mut skipped = Vec::new();
        for (rule, result) in results {
            match result {
                Ok(Some(hit)) => hits.push(hit),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        transaction_id = %tx.id,
                        rule = %rule,
                        error = %e,
                        "History lookup failed, rule skipped"
                    );
                    skipped.push(SkippedRule {
                        rule,
                        error: e.to_string(),
                    });
                }
            }
        }

        hits.sort_by_key(|hit| hit.rule);

        let alerts: Vec<FraudAlert> = hits
            .into_iter()
            .map(|hit| FraudAlert::from_hit(tx.id, hit))
            .collect();

        debug!(
            transaction_id = %tx.id,
            alerts = alerts.len(),
            skipped = skipped.len(),
            "Fraud rules evaluated"
        );

        Evaluation { alerts, skipped }
    }
}
