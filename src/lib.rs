pub mod api;
pub mod config;
pub mod domain;
pub mod observability;
pub mod rules;
pub mod service;
pub mod storage;

pub use config::Config;
pub use domain::{FraudAlert, FraudSettings, NewTransaction, Transaction, TransactionStatus};
pub use rules::{Aggregator, Evaluation, FraudEvaluator};
pub use service::PaymentProcessor;
