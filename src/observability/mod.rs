pub mod metrics;
pub mod tracing;

pub use metrics::{InFlightGuard, MetricsRegistry, TimingGuard};
pub use tracing::init_tracing;
