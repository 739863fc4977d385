use rust_decimal::Decimal;

use crate::domain::transaction::round_to_cents;
use crate::domain::{RuleHit, RuleId, Transaction};
use crate::rules::traits::InlineRule;

const SCORE_OVER: u32 = 30;
const SCORE_OVER_DOUBLE: u32 = 50;
const SCORE_OVER_FIVEFOLD: u32 = 80;

/// High-value transaction rule.
///
/// Triggers when the amount exceeds the threshold; the score steps up past
/// twice and five times the threshold.
#[derive(Debug)]
pub struct HighAmountRule {
    threshold: Decimal,
}

impl HighAmountRule {
    pub fn new(threshold: Decimal) -> Self {
        HighAmountRule {
            threshold: round_to_cents(threshold),
        }
    }

    fn exceeds_multiple(&self, amount: Decimal, factor: Decimal) -> bool {
        self.threshold
            .checked_mul(factor)
            .is_some_and(|limit| amount > limit)
    }

    fn score(&self, amount: Decimal) -> u32 {
        if self.exceeds_multiple(amount, Decimal::from(5)) {
            SCORE_OVER_FIVEFOLD
        } else if self.exceeds_multiple(amount, Decimal::TWO) {
            SCORE_OVER_DOUBLE
        } else {
            SCORE_OVER
        }
    }
}

impl InlineRule for HighAmountRule {
    fn id(&self) -> RuleId {
        RuleId::HighAmount
    }

    fn evaluate(&self, tx: &Transaction) -> Option<RuleHit> {
        let amount = round_to_cents(tx.amount);

        if amount <= Decimal::ZERO || amount <= self.threshold {
            return None;
        }

        Some(RuleHit::new(
            self.id(),
            self.score(amount),
            format!(
                "Transaction amount ${:.2} exceeds threshold ${:.2}",
                amount, self.threshold
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, Severity, TransactionStatus};

    fn test_tx(amount: Decimal) -> Transaction {
        Transaction::new(
            AccountId::new("ACC-1"),
            AccountId::new("ACC-2"),
            amount,
            "",
            TransactionStatus::Success,
        )
    }

    fn rule() -> HighAmountRule {
        HighAmountRule::new(Decimal::new(5000, 0))
    }

    #[test]
    fn test_at_threshold() {
        assert!(rule().evaluate(&test_tx(Decimal::new(5000, 0))).is_none());
        assert!(rule().evaluate(&test_tx(Decimal::new(499999, 2))).is_none());
    }

    #[test]
    fn test_just_over_threshold() {
        let hit = rule().evaluate(&test_tx(Decimal::new(500001, 2))).unwrap();

        assert_eq!(hit.rule, RuleId::HighAmount);
        assert_eq!(hit.risk_score, 30);
        assert_eq!(hit.severity(), Severity::Medium);
        assert_eq!(
            hit.details,
            "Transaction amount $5000.01 exceeds threshold $5000.00"
        );
    }

    #[test]
    fn test_double_threshold_is_still_medium() {
        let hit = rule().evaluate(&test_tx(Decimal::new(10000, 0))).unwrap();
        assert_eq!(hit.risk_score, 30);
    }

    #[test]
    fn test_over_double_threshold() {
        let hit = rule().evaluate(&test_tx(Decimal::new(10001, 0))).unwrap();

        assert_eq!(hit.risk_score, 50);
        assert_eq!(hit.severity(), Severity::High);
    }

    #[test]
    fn test_fivefold_boundary() {
        let at = rule().evaluate(&test_tx(Decimal::new(25000, 0))).unwrap();
        assert_eq!(at.risk_score, 50);

        let over = rule().evaluate(&test_tx(Decimal::new(25001, 0))).unwrap();
        assert_eq!(over.risk_score, 80);
        assert_eq!(over.severity(), Severity::Critical);
    }

    #[test]
    fn test_non_positive_amount_never_triggers() {
        let zero_threshold = HighAmountRule::new(Decimal::ZERO);

        assert!(zero_threshold.evaluate(&test_tx(Decimal::ZERO)).is_none());
        assert!(zero_threshold.evaluate(&test_tx(Decimal::new(-100, 0))).is_none());
    }

    #[test]
    fn test_sub_cent_noise_is_ignored() {
        // 5000.004 rounds to 5000.00, which is not over the threshold
        assert!(rule().evaluate(&test_tx(Decimal::new(5000004, 3))).is_none());
    }

    #[test]
    fn test_huge_threshold_does_not_overflow() {
        let rule = HighAmountRule::new(Decimal::MAX / Decimal::TWO);
        let hit = rule.evaluate(&test_tx(Decimal::MAX)).unwrap();

        assert_eq!(hit.risk_score, 30);
    }
}
