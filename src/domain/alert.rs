use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::transaction::TransactionId;

/// Unique alert identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub Uuid);

impl AlertId {
    pub fn new() -> Self {
        AlertId(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        AlertId::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fraud rule identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleId {
    HighAmount,
    VelocityCheck,
    DuplicateTransaction,
    SuspiciousPattern,
}

impl RuleId {
    pub const ALL: [RuleId; 4] = [
        RuleId::HighAmount,
        RuleId::VelocityCheck,
        RuleId::DuplicateTransaction,
        RuleId::SuspiciousPattern,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::HighAmount => "HIGH_AMOUNT",
            RuleId::VelocityCheck => "VELOCITY_CHECK",
            RuleId::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            RuleId::SuspiciousPattern => "SUSPICIOUS_PATTERN",
        }
    }

    /// Parse from string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        RuleId::ALL
            .into_iter()
            .find(|rule| rule.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Severity band for a risk score.
    ///
    /// Bands: below 30 low, below 50 medium, below 80 high, otherwise critical.
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=29 => Severity::Low,
            30..=49 => Severity::Medium,
            50..=79 => Severity::High,
            _ => Severity::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a rule reports when it triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
    /// The rule that triggered
    pub rule: RuleId,

    /// Points contributed to the transaction's total
    pub risk_score: u32,

    /// Human-readable explanation
    pub details: String,
}

impl RuleHit {
    pub fn new(rule: RuleId, risk_score: u32, details: impl Into<String>) -> Self {
        RuleHit {
            rule,
            risk_score,
            details: details.into(),
        }
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        Severity::from_score(self.risk_score)
    }
}

/// Alert raised against a transaction by a triggered rule.
///
/// Alerts are immutable; the severity always follows from the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FraudAlert {
    id: AlertId,
    transaction_id: TransactionId,
    rule_triggered: RuleId,
    risk_score: u32,
    severity: Severity,
    details: String,
    created_at: DateTime<Utc>,
}

impl FraudAlert {
    /// Create an alert for a rule hit on a transaction.
    pub fn from_hit(transaction_id: TransactionId, hit: RuleHit) -> Self {
        let severity = hit.severity();
        FraudAlert {
            id: AlertId::new(),
            transaction_id,
            rule_triggered: hit.rule,
            risk_score: hit.risk_score,
            severity,
            details: hit.details,
            created_at: Utc::now(),
        }
    }

    /// Rebuild a stored alert. Severity is recomputed from the score.
    pub fn restore(
        id: AlertId,
        transaction_id: TransactionId,
        rule_triggered: RuleId,
        risk_score: u32,
        details: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        FraudAlert {
            id,
            transaction_id,
            rule_triggered,
            risk_score,
            severity: Severity::from_score(risk_score),
            details,
            created_at,
        }
    }

    pub fn id(&self) -> AlertId {
        self.id
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn rule(&self) -> RuleId {
        self.rule_triggered
    }

    pub fn risk_score(&self) -> u32 {
        self.risk_score
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Sum of risk scores across alerts.
pub fn total_risk_score(alerts: &[FraudAlert]) -> u32 {
    alerts
        .iter()
        .fold(0u32, |acc, alert| acc.saturating_add(alert.risk_score))
}
