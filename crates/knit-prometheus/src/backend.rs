use std::sync::Arc;

use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use knit_core::metrics::{AppOutcome, MetricsBackend};

/// Prometheus metrics backend for knit.
///
/// ## Label cardinality
/// - `outcome`: "finished", "failed", "killed", "submit_failed"
/// - `kind`: recovery paths such as "kill_rm"
#[derive(Clone)]
pub struct PrometheusMetrics {
    apps_submitted: Counter,
    apps_finished: CounterVec,
    app_duration: HistogramVec,
    fallbacks: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create a backend registering into `registry`.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let apps_submitted = Counter::with_opts(
            Opts::new(
                "apps_submitted_total",
                "Applications whose master came up and accepted init",
            )
            .namespace("knit"),
        )?;
        registry.register(Box::new(apps_submitted.clone()))?;

        let apps_finished = CounterVec::new(
            Opts::new(
                "apps_finished_total",
                "Applications observed in a terminal state",
            )
            .namespace("knit"),
            &["outcome"],
        )?;
        registry.register(Box::new(apps_finished.clone()))?;

        // Cluster jobs run for minutes to hours.
        let app_duration = HistogramVec::new(
            HistogramOpts::new(
                "app_duration_seconds",
                "Time from submission to the observed terminal state",
            )
            .namespace("knit")
            .buckets(vec![1.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(app_duration.clone()))?;

        let fallbacks = CounterVec::new(
            Opts::new("fallbacks_total", "Recovery paths taken").namespace("knit"),
            &["kind"],
        )?;
        registry.register(Box::new(fallbacks.clone()))?;

        Ok(Self {
            apps_submitted,
            apps_finished,
            app_duration,
            fallbacks,
            registry,
        })
    }

    /// Create a backend with its own registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    /// Gather all metric families for exposition.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, ready to serve on `/metrics`.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_app_submitted(&self) {
        self.apps_submitted.inc();
    }

    fn record_app_finished(&self, outcome: AppOutcome, duration_ms: u64) {
        let label = outcome.as_label();
        self.apps_finished.with_label_values(&[label]).inc();
        if outcome != AppOutcome::SubmitFailed {
            self.app_duration
                .with_label_values(&[label])
                .observe(duration_ms as f64 / 1000.0);
        }
    }

    fn record_fallback(&self, kind: &str) {
        self.fallbacks.with_label_values(&[kind]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
        families
            .iter()
            .find(|f| f.name() == name)
            .unwrap_or_else(|| panic!("metric {name} not found"))
    }

    #[test]
    fn submitted_counter_counts() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_app_submitted();
        metrics.record_app_submitted();

        let text = metrics.render().unwrap();
        assert!(text.contains("knit_apps_submitted_total 2"), "{text}");
    }

    #[test]
    fn finished_apps_are_split_by_outcome() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_app_finished(AppOutcome::Finished, 90_000);
        metrics.record_app_finished(AppOutcome::Killed, 5_000);
        metrics.record_app_finished(AppOutcome::SubmitFailed, 0);

        let families = metrics.gather();
        assert_eq!(
            family(&families, "knit_apps_finished_total").get_metric().len(),
            3
        );
        // No duration for applications that never ran.
        assert_eq!(
            family(&families, "knit_app_duration_seconds").get_metric().len(),
            2
        );
    }

    #[test]
    fn fallbacks_and_text_exposition() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_fallback("kill_rm");

        let text = metrics.render().unwrap();
        assert!(text.contains("knit_fallbacks_total{kind=\"kill_rm\"} 1"), "{text}");
    }

    #[test]
    fn shared_registry_rejects_double_registration() {
        let registry = Arc::new(Registry::new());
        PrometheusMetrics::new_with_registry(registry.clone()).unwrap();
        assert!(PrometheusMetrics::new_with_registry(registry).is_err());
    }
}
