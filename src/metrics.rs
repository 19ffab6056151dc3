use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

/// Refresh metrics collector
pub struct RefreshMetrics {
    /// Refresh attempts by trigger path and outcome
    pub refresh_total: CounterVec,
    /// Refresh duration in seconds, including resolve and clone
    pub refresh_duration: HistogramVec,
    /// Snapshots installed
    pub snapshot_swaps: CounterVec,
}

impl RefreshMetrics {
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let refresh_total = CounterVec::new(
            Opts::new("gitsnap_refresh_total", "Snapshot refresh attempts"),
            &["repo", "trigger", "result"],
        )?;

        let refresh_duration = HistogramVec::new(
            HistogramOpts::new(
                "gitsnap_refresh_duration_seconds",
                "Snapshot refresh duration in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
            &["repo", "trigger"],
        )?;

        let snapshot_swaps = CounterVec::new(
            Opts::new("gitsnap_snapshot_swaps_total", "Snapshots installed"),
            &["repo"],
        )?;

        registry.register(Box::new(refresh_total.clone()))?;
        registry.register(Box::new(refresh_duration.clone()))?;
        registry.register(Box::new(snapshot_swaps.clone()))?;

        Ok(Self { refresh_total, refresh_duration, snapshot_swaps })
    }

    pub fn record_refresh(&self, repo: &str, trigger: &str, result: &str, elapsed: Duration) {
        self.refresh_total.with_label_values(&[repo, trigger, result]).inc();
        self.refresh_duration.with_label_values(&[repo, trigger]).observe(elapsed.as_secs_f64());
    }

    pub fn record_swap(&self, repo: &str) {
        self.snapshot_swaps.with_label_values(&[repo]).inc();
    }
}

/// Render a registry in the Prometheus text exposition format.
pub fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let registry = Arc::new(Registry::new());
        assert!(RefreshMetrics::new(registry).is_ok());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Arc::new(Registry::new());
        RefreshMetrics::new(registry.clone()).unwrap();
        assert!(RefreshMetrics::new(registry).is_err());
    }

    #[test]
    fn test_record_refresh() {
        let registry = Arc::new(Registry::new());
        let metrics = RefreshMetrics::new(registry).unwrap();

        metrics.record_refresh("docs", "check", "unchanged", Duration::from_millis(20));
        metrics.record_refresh("docs", "check", "unchanged", Duration::from_millis(30));
        metrics.record_refresh("docs", "refresh", "changed", Duration::from_secs(2));

        assert_eq!(
            metrics.refresh_total.with_label_values(&["docs", "check", "unchanged"]).get(),
            2.0
        );
        assert_eq!(
            metrics.refresh_duration.with_label_values(&["docs", "check"]).get_sample_count(),
            2
        );
    }

    #[test]
    fn test_encode_includes_swaps() {
        let registry = Arc::new(Registry::new());
        let metrics = RefreshMetrics::new(registry.clone()).unwrap();
        metrics.record_swap("docs");

        let text = encode(&registry).unwrap();
        assert!(text.contains("gitsnap_snapshot_swaps_total"));
        assert!(text.contains("repo=\"docs\""));
    }
}
