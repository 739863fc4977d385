mod duplicate;
mod velocity;

pub use duplicate::DuplicateRule;
pub use velocity::VelocityRule;
