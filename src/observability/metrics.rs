use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::domain::{FraudAlert, RuleId, Severity, TransactionStatus};

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Transactions submitted, by final status
    pub transactions_total: AtomicU64,
    pub transactions_success: AtomicU64,
    pub transactions_failed: AtomicU64,
    pub transactions_blocked: AtomicU64,
    pub transactions_pending: AtomicU64,

    /// Rejected at validation
    pub invalid_requests_total: AtomicU64,

    /// Fraud alerts by rule
    pub alerts_high_amount: AtomicU64,
    pub alerts_velocity: AtomicU64,
    pub alerts_duplicate: AtomicU64,
    pub alerts_suspicious_pattern: AtomicU64,

    /// Fraud alerts by severity
    pub alerts_low: AtomicU64,
    pub alerts_medium: AtomicU64,
    pub alerts_high: AtomicU64,
    pub alerts_critical: AtomicU64,

    /// Evaluation latency, one counter per bucket range
    pub latency_under_1ms: AtomicU64,
    pub latency_1_5ms: AtomicU64,
    pub latency_5_10ms: AtomicU64,
    pub latency_10_50ms: AtomicU64,
    pub latency_50_100ms: AtomicU64,
    pub latency_over_100ms: AtomicU64,
    pub latency_sum_micros: AtomicU64,

    /// Screening problems
    pub lookup_failures_total: AtomicU64,
    pub evaluation_timeouts_total: AtomicU64,
    pub screening_errors_total: AtomicU64,
    pub storage_errors_total: AtomicU64,

    /// HTTP requests currently being served
    pub requests_in_flight: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record a submitted transaction by its final status.
    pub fn record_transaction(&self, status: TransactionStatus) {
        self.transactions_total.fetch_add(1, Ordering::Relaxed);

        let counter = match status {
            TransactionStatus::Success => &self.transactions_success,
            TransactionStatus::Failed => &self.transactions_failed,
            TransactionStatus::Blocked => &self.transactions_blocked,
            TransactionStatus::Pending => &self.transactions_pending,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_request(&self) {
        self.invalid_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record persisted alerts.
    pub fn record_alerts(&self, alerts: &[FraudAlert]) {
        for alert in alerts {
            let by_rule = match alert.rule() {
                RuleId::HighAmount => &self.alerts_high_amount,
                RuleId::VelocityCheck => &self.alerts_velocity,
                RuleId::DuplicateTransaction => &self.alerts_duplicate,
                RuleId::SuspiciousPattern => &self.alerts_suspicious_pattern,
            };
            by_rule.fetch_add(1, Ordering::Relaxed);

            let by_severity = match alert.severity() {
                Severity::Low => &self.alerts_low,
                Severity::Medium => &self.alerts_medium,
                Severity::High => &self.alerts_high,
                Severity::Critical => &self.alerts_critical,
            };
            by_severity.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record evaluation latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.record_latency_micros(micros);
    }

    fn record_latency_micros(&self, micros: u64) {
        self.latency_sum_micros.fetch_add(micros, Ordering::Relaxed);

        if micros < 1000 {
            self.latency_under_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 5000 {
            self.latency_1_5ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 10000 {
            self.latency_5_10ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 50000 {
            self.latency_10_50ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 100000 {
            self.latency_50_100ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_100ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Cumulative latency bucket counts, ending with `+Inf`.
    pub fn latency_buckets(&self) -> [u64; 6] {
        let ranges = [
            &self.latency_under_1ms,
            &self.latency_1_5ms,
            &self.latency_5_10ms,
            &self.latency_10_50ms,
            &self.latency_50_100ms,
            &self.latency_over_100ms,
        ];

        let mut total = 0;
        ranges.map(|range| {
            total += range.load(Ordering::Relaxed);
            total
        })
    }

    pub fn record_lookup_failures(&self, count: usize) {
        self.lookup_failures_total
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_evaluation_timeout(&self) {
        self.evaluation_timeouts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_screening_error(&self) {
        self.screening_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_storage_error(&self) {
        self.storage_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let latency = self.latency_buckets();
        let latency_sum = self.latency_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;

        format!(
            r#"# HELP payflow_transactions_total Total number of submitted transactions
# TYPE payflow_transactions_total counter
payflow_transactions_total {}

# HELP payflow_transactions Transactions by final status
# TYPE payflow_transactions counter
payflow_transactions{{status="success"}} {}
payflow_transactions{{status="failed"}} {}
payflow_transactions{{status="blocked"}} {}
payflow_transactions{{status="pending"}} {}

# HELP payflow_invalid_requests_total Submissions rejected at validation
# TYPE payflow_invalid_requests_total counter
payflow_invalid_requests_total {}

# HELP payflow_fraud_alerts Fraud alerts by rule
# TYPE payflow_fraud_alerts counter
payflow_fraud_alerts{{rule="HIGH_AMOUNT"}} {}
payflow_fraud_alerts{{rule="VELOCITY_CHECK"}} {}
payflow_fraud_alerts{{rule="DUPLICATE_TRANSACTION"}} {}
payflow_fraud_alerts{{rule="SUSPICIOUS_PATTERN"}} {}

# HELP payflow_fraud_alerts_by_severity Fraud alerts by severity
# TYPE payflow_fraud_alerts_by_severity counter
payflow_fraud_alerts_by_severity{{severity="low"}} {}
payflow_fraud_alerts_by_severity{{severity="medium"}} {}
payflow_fraud_alerts_by_severity{{severity="high"}} {}
payflow_fraud_alerts_by_severity{{severity="critical"}} {}

# HELP payflow_evaluation_latency Fraud evaluation latency in seconds
# TYPE payflow_evaluation_latency histogram
payflow_evaluation_latency_bucket{{le="0.001"}} {}
payflow_evaluation_latency_bucket{{le="0.005"}} {}
payflow_evaluation_latency_bucket{{le="0.01"}} {}
payflow_evaluation_latency_bucket{{le="0.05"}} {}
payflow_evaluation_latency_bucket{{le="0.1"}} {}
payflow_evaluation_latency_bucket{{le="+Inf"}} {}
payflow_evaluation_latency_sum {}
payflow_evaluation_latency_count {}

# HELP payflow_lookup_failures_total Rules skipped because a history lookup failed
# TYPE payflow_lookup_failures_total counter
payflow_lookup_failures_total {}

# HELP payflow_evaluation_timeouts_total Evaluations abandoned at the deadline
# TYPE payflow_evaluation_timeouts_total counter
payflow_evaluation_timeouts_total {}

# HELP payflow_screening_errors_total Alert or status persistence failures
# TYPE payflow_screening_errors_total counter
payflow_screening_errors_total {}

# HELP payflow_storage_errors_total Transaction persistence failures
# TYPE payflow_storage_errors_total counter
payflow_storage_errors_total {}

# HELP payflow_requests_in_flight HTTP requests currently being served
# TYPE payflow_requests_in_flight gauge
payflow_requests_in_flight {}
"#,
            self.transactions_total.load(Ordering::Relaxed),
            self.transactions_success.load(Ordering::Relaxed),
            self.transactions_failed.load(Ordering::Relaxed),
            self.transactions_blocked.load(Ordering::Relaxed),
            self.transactions_pending.load(Ordering::Relaxed),
            self.invalid_requests_total.load(Ordering::Relaxed),
            self.alerts_high_amount.load(Ordering::Relaxed),
            self.alerts_velocity.load(Ordering::Relaxed),
            self.alerts_duplicate.load(Ordering::Relaxed),
            self.alerts_suspicious_pattern.load(Ordering::Relaxed),
            self.alerts_low.load(Ordering::Relaxed),
            self.alerts_medium.load(Ordering::Relaxed),
            self.alerts_high.load(Ordering::Relaxed),
            self.alerts_critical.load(Ordering::Relaxed),
            latency[0],
            latency[1],
            latency[2],
            latency[3],
            latency[4],
            latency[5],
            latency_sum,
            latency[5],
            self.lookup_failures_total.load(Ordering::Relaxed),
            self.evaluation_timeouts_total.load(Ordering::Relaxed),
            self.screening_errors_total.load(Ordering::Relaxed),
            self.storage_errors_total.load(Ordering::Relaxed),
            self.requests_in_flight.load(Ordering::Relaxed),
        )
    }
}

/// Guard for timing operations.
pub struct TimingGuard<'a> {
    registry: &'a MetricsRegistry,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(registry: &'a MetricsRegistry) -> Self {
        TimingGuard {
            registry,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimingGuard<'a> {
    fn drop(&mut self) {
        self.registry.record_latency(self.start);
    }
}

/// Holds the in-flight gauge up for the lifetime of a request.
pub struct InFlightGuard<'a> {
    registry: &'a MetricsRegistry,
}

impl<'a> InFlightGuard<'a> {
    pub fn new(registry: &'a MetricsRegistry) -> Self {
        registry.requests_in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard { registry }
    }
}

impl<'a> Drop for InFlightGuard<'a> {
    fn drop(&mut self) {
        self.registry
            .requests_in_flight
            .fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RuleHit, TransactionId};

    #[test]
    fn test_record_transaction() {
        let metrics = MetricsRegistry::new();

        metrics.record_transaction(TransactionStatus::Success);
        metrics.record_transaction(TransactionStatus::Success);
        metrics.record_transaction(TransactionStatus::Blocked);

        assert_eq!(metrics.transactions_total.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.transactions_success.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.transactions_blocked.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_record_alerts() {
        let metrics = MetricsRegistry::new();
        let tx_id = TransactionId::new();
        let alerts = vec![
            FraudAlert::from_hit(tx_id, RuleHit::new(RuleId::HighAmount, 80, "")),
            FraudAlert::from_hit(tx_id, RuleHit::new(RuleId::SuspiciousPattern, 25, "")),
        ];

        metrics.record_alerts(&alerts);

        assert_eq!(metrics.alerts_high_amount.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.alerts_suspicious_pattern.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.alerts_critical.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.alerts_low.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.alerts_medium.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_latency() {
        let metrics = MetricsRegistry::new();

        {
            let _timer = TimingGuard::new(&metrics);
        }

        assert!(metrics.latency_under_1ms.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn test_latency_histogram_is_cumulative() {
        let metrics = MetricsRegistry::new();
        metrics.record_latency_micros(500);
        metrics.record_latency_micros(3_000);
        metrics.record_latency_micros(70_000);
        metrics.record_latency_micros(250_000);

        let buckets = metrics.latency_buckets();
        assert_eq!(buckets, [1, 2, 2, 2, 3, 4]);
        assert!(buckets.windows(2).all(|pair| pair[0] <= pair[1]));

        let output = metrics.to_prometheus();
        assert!(output.contains("# TYPE payflow_evaluation_latency histogram"));
        assert!(output.contains("payflow_evaluation_latency_bucket{le=\"0.005\"} 2"));
        assert!(output.contains("payflow_evaluation_latency_bucket{le=\"+Inf\"} 4"));
        assert!(output.contains("payflow_evaluation_latency_sum 0.3235"));
        assert!(output.contains("payflow_evaluation_latency_count 4"));
    }

    #[test]
    fn test_in_flight_guard() {
        let metrics = MetricsRegistry::new();

        let guard = InFlightGuard::new(&metrics);
        assert_eq!(metrics.requests_in_flight.load(Ordering::Relaxed), 1);

        drop(guard);
        assert_eq!(metrics.requests_in_flight.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = MetricsRegistry::new();
        metrics.record_transaction(TransactionStatus::Failed);
        metrics.record_lookup_failures(2);

        let output = metrics.to_prometheus();

        assert!(output.contains("payflow_transactions_total 1"));
        assert!(output.contains("payflow_transactions{status=\"failed\"} 1"));
        assert!(output.contains("payflow_lookup_failures_total 2"));
        assert!(output.contains("payflow_fraud_alerts{rule=\"HIGH_AMOUNT\"} 0"));
    }
}
