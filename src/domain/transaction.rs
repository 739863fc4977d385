use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(TransactionId)
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        TransactionId::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account identifier (source or destination of a payment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Processing status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Accepted, not yet settled
    Pending,
    /// Settled successfully
    Success,
    /// Processing failed (terminal)
    Failed,
    /// Blocked by fraud screening
    Blocked,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Blocked => "blocked",
        }
    }

    /// Parse from string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "success" => Some(TransactionStatus::Success),
            "failed" => Some(TransactionStatus::Failed),
            "blocked" => Some(TransactionStatus::Blocked),
            _ => None,
        }
    }

    /// Returns true if fraud screening may move this status to blocked.
    #[inline]
    pub fn is_blockable(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Success)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round a money amount to cent precision.
#[inline]
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// Largest accepted amount; matches the `NUMERIC(15, 2)` column.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_319, 232_830, 0, false, 2); // 9_999_999_999_999.99

/// A payment transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier, assigned before evaluation
    pub id: TransactionId,

    /// Source account
    pub from_account: AccountId,

    /// Destination account
    pub to_account: AccountId,

    /// Amount in currency units, cent precision
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Current processing status
    pub status: TransactionStatus,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction with a fresh id and the current timestamp.
    pub fn new(
        from_account: AccountId,
        to_account: AccountId,
        amount: Decimal,
        description: impl Into<String>,
        status: TransactionStatus,
    ) -> Self {
        Transaction {
            id: TransactionId::new(),
            from_account,
            to_account,
            amount: round_to_cents(amount),
            description: description.into(),
            status,
            created_at: Utc::now(),
        }
    }

    /// Override the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Validated input for a new payment.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Decimal,
    pub description: String,
}

/// Reasons a payment request is rejected before processing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("from_account is required")]
    MissingFromAccount,

    #[error("to_account is required")]
    MissingToAccount,

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("amount must not exceed {}", MAX_AMOUNT)]
    AmountTooLarge,

    #[error("amount is not a representable number")]
    InvalidAmount,
}

impl NewTransaction {
    /// Build and validate a payment request.
    ///
    /// Account identifiers are trimmed; the amount is rounded to cents
    /// before the positivity check.
    pub fn new(
        from_account: impl AsRef<str>,
        to_account: impl AsRef<str>,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let from_account = from_account.as_ref().trim();
        let to_account = to_account.as_ref().trim();

        if from_account.is_empty() {
            return Err(ValidationError::MissingFromAccount);
        }
        if to_account.is_empty() {
            return Err(ValidationError::MissingToAccount);
        }

        let amount = round_to_cents(amount);
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount);
        }
        if amount > MAX_AMOUNT {
            return Err(ValidationError::AmountTooLarge);
        }

        Ok(NewTransaction {
            from_account: AccountId::new(from_account),
            to_account: AccountId::new(to_account),
            amount,
            description: description.into(),
        })
    }

    /// Turn into a transaction with the given processing status.
    pub fn into_transaction(self, status: TransactionStatus) -> Transaction {
        Transaction::new(
            self.from_account,
            self.to_account,
            self.amount,
            self.description,
            status,
        )
    }
}
