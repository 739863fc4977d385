pub mod alert;
pub mod settings;
pub mod transaction;

pub use alert::{total_risk_score, AlertId, FraudAlert, RuleHit, RuleId, Severity};
pub use settings::FraudSettings;
pub use transaction::{
    AccountId, NewTransaction, Transaction, TransactionId, TransactionStatus, ValidationError,
};
