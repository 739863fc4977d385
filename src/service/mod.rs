pub mod processor;

pub use processor::{
    PaymentProcessor, ProcessError, ProcessedTransaction, ScreeningError, TransactionDetails,
};
