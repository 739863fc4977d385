use rust_decimal::Decimal;

use crate::domain::transaction::round_to_cents;
use crate::domain::{RuleHit, RuleId, Transaction};
use crate::rules::traits::InlineRule;

const ROUND_UNIT: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

const SCORE: u32 = 25;

/// Round-amount rule.
///
/// Flags amounts of at least 1000 that are exact multiples of 1000,
/// compared at cent precision.
#[derive(Debug, Default)]
pub struct SuspiciousPatternRule;

impl SuspiciousPatternRule {
    pub fn new() -> Self {
        SuspiciousPatternRule
    }
}

impl InlineRule for SuspiciousPatternRule {
    fn id(&self) -> RuleId {
        RuleId::SuspiciousPattern
    }

    fn evaluate(&self, tx: &Transaction) -> Option<RuleHit> {
        let amount = round_to_cents(tx.amount);

        let round = amount >= ROUND_UNIT
            && amount
                .checked_rem(ROUND_UNIT)
                .is_some_and(|rest| rest.is_zero());
        if !round {
            return None;
        }

        Some(RuleHit::new(
            self.id(),
            SCORE,
            format!("Suspicious round amount: ${:.2}", tx.amount),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, Severity, TransactionStatus};
    use rust_decimal::Decimal;

    fn test_tx(amount: Decimal) -> Transaction {
        Transaction::new(
            AccountId::new("ACC-1"),
            AccountId::new("ACC-2"),
            amount,
            "",
            TransactionStatus::Success,
        )
    }

    #[test]
    fn test_round_thousand() {
        let hit = SuspiciousPatternRule::new()
            .evaluate(&test_tx(Decimal::new(3000, 0)))
            .unwrap();

        assert_eq!(hit.rule, RuleId::SuspiciousPattern);
        assert_eq!(hit.risk_score, 25);
        assert_eq!(hit.severity(), Severity::Low);
        assert_eq!(hit.details, "Suspicious round amount: $3000.00");
    }

    #[test]
    fn test_not_a_multiple() {
        let rule = SuspiciousPatternRule::new();

        assert!(rule.evaluate(&test_tx(Decimal::new(3050, 0))).is_none());
        // Fractional part counts: 3000.50 is not a round amount
        assert!(rule.evaluate(&test_tx(Decimal::new(300050, 2))).is_none());
    }

    #[test]
    fn test_below_one_thousand() {
        let rule = SuspiciousPatternRule::new();

        assert!(rule.evaluate(&test_tx(Decimal::new(999, 0))).is_none());
        assert!(rule.evaluate(&test_tx(Decimal::ZERO)).is_none());
        assert!(rule.evaluate(&test_tx(Decimal::new(-2000, 0))).is_none());
    }

    #[test]
    fn test_exact_one_thousand_and_large_multiples() {
        let rule = SuspiciousPatternRule::new();

        assert!(rule.evaluate(&test_tx(Decimal::new(1000, 0))).is_some());
        assert!(rule.evaluate(&test_tx(Decimal::new(250000, 0))).is_some());
        assert!(rule.evaluate(&test_tx(Decimal::new(100000, 2))).is_some()); // 1000.00
    }

    #[test]
    fn test_amounts_beyond_cent_range() {
        let rule = SuspiciousPatternRule::new();

        assert!(rule.evaluate(&test_tx(Decimal::from(10u64.pow(17)))).is_some());
        assert!(rule.evaluate(&test_tx(Decimal::from(10u64.pow(17) + 1))).is_none());
        assert!(rule.evaluate(&test_tx(Decimal::MAX)).is_none());
    }
}
