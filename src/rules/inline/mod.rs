mod high_amount;
mod suspicious_pattern;

pub use high_amount::HighAmountRule;
pub use suspicious_pattern::SuspiciousPatternRule;
