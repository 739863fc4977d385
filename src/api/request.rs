use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{NewTransaction, ValidationError};

/// Request body for a new payment.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(default)]
    pub from_account: String,

    #[serde(default)]
    pub to_account: String,

    /// Amount in currency units
    pub amount: f64,

    #[serde(default)]
    pub description: String,
}

impl CreateTransactionRequest {
    /// Validate and convert into a processor input.
    pub fn into_new_transaction(self) -> Result<NewTransaction, ValidationError> {
        let amount = match Decimal::from_f64_retain(self.amount) {
            Some(amount) => amount,
            None if self.amount.is_finite() && self.amount > 0.0 => {
                return Err(ValidationError::AmountTooLarge)
            }
            None if self.amount.is_finite() => return Err(ValidationError::NonPositiveAmount),
            None => return Err(ValidationError::InvalidAmount),
        };

        NewTransaction::new(
            &self.from_account,
            &self.to_account,
            amount,
            self.description,
        )
    }
}
