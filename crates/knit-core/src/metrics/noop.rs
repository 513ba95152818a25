use crate::metrics::backend::{AppOutcome, MetricsBackend};

/// No-op metrics backend that compiles to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_app_submitted(&self) {}

    #[inline(always)]
    fn record_app_finished(&self, _: AppOutcome, _: u64) {}

    #[inline(always)]
    fn record_fallback(&self, _: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_metrics_is_zero_size() {
        assert_eq!(std::mem::size_of::<NoOpMetrics>(), 0);
    }

    #[test]
    fn outcome_labels_are_distinct() {
        let labels = [
            AppOutcome::Finished,
            AppOutcome::Failed,
            AppOutcome::Killed,
            AppOutcome::SubmitFailed,
        ]
        .map(|o| o.as_label());
        let mut dedup = labels.to_vec();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), labels.len());
    }
}
