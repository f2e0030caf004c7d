use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for the engine
// ============================================================================
//
// Provides metrics for:
// - Command and query dispatch (outcome, latency)
// - Event appends per aggregate type
// - Optimistic concurrency conflicts
// - Projector failures
//
// The registry is exposed so the owning service can serve it from whatever
// transport it already runs.
// ============================================================================

/// Dispatch outcome label values.
pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_FAILED: &str = "failed";

/// Central metrics registry shared by buses, repository and projectors
pub struct Metrics {
    registry: Registry,

    // Dispatch Metrics
    pub commands_dispatched: IntCounterVec,
    pub queries_dispatched: IntCounterVec,
    pub dispatch_duration: HistogramVec,

    // Write-side Metrics
    pub events_appended: IntCounterVec,
    pub concurrency_conflicts: IntCounterVec,

    // Read-side Metrics
    pub projection_failures: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let commands_dispatched = IntCounterVec::new(
            Opts::new("commands_dispatched_total", "Total commands dispatched"),
            &["command", "outcome"],
        )?;
        registry.register(Box::new(commands_dispatched.clone()))?;

        let queries_dispatched = IntCounterVec::new(
            Opts::new("queries_dispatched_total", "Total queries dispatched"),
            &["query", "outcome"],
        )?;
        registry.register(Box::new(queries_dispatched.clone()))?;

        let dispatch_duration = HistogramVec::new(
            HistogramOpts::new("dispatch_duration_seconds", "Command/query handling duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["kind", "name"],
        )?;
        registry.register(Box::new(dispatch_duration.clone()))?;

        let events_appended = IntCounterVec::new(
            Opts::new("events_appended_total", "Total events appended to the event store"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let concurrency_conflicts = IntCounterVec::new(
            Opts::new("concurrency_conflicts_total", "Saves rejected by optimistic concurrency"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(concurrency_conflicts.clone()))?;

        let projection_failures = IntCounterVec::new(
            Opts::new("projection_failures_total", "Events a projector failed to apply"),
            &["projector"],
        )?;
        registry.register(Box::new(projection_failures.clone()))?;

        Ok(Self {
            registry,
            commands_dispatched,
            queries_dispatched,
            dispatch_duration,
            events_appended,
            concurrency_conflicts,
            projection_failures,
        })
    }

    /// Get the Prometheus registry for exposing metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_command(&self, command: &str, outcome: &str, duration_secs: f64) {
        self.commands_dispatched.with_label_values(&[command, outcome]).inc();
        self.dispatch_duration.with_label_values(&["command", command]).observe(duration_secs);
    }

    pub fn record_query(&self, query: &str, outcome: &str, duration_secs: f64) {
        self.queries_dispatched.with_label_values(&[query, outcome]).inc();
        self.dispatch_duration.with_label_values(&["query", query]).observe(duration_secs);
    }

    pub fn record_events_appended(&self, aggregate_type: &str, count: usize) {
        self.events_appended.with_label_values(&[aggregate_type]).inc_by(count as u64);
    }

    pub fn record_conflict(&self, aggregate_type: &str) {
        self.concurrency_conflicts.with_label_values(&[aggregate_type]).inc();
    }

    pub fn record_projection_failure(&self, projector: &str) {
        self.projection_failures.with_label_values(&[projector]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_conflict("user");
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_command() {
        let metrics = Metrics::new().unwrap();
        metrics.record_command("user.create", OUTCOME_OK, 0.01);
        metrics.record_command("user.create", OUTCOME_REJECTED, 0.0);

        let dispatched = |outcome: &str| {
            metrics.commands_dispatched.with_label_values(&["user.create", outcome]).get()
        };
        assert_eq!(dispatched(OUTCOME_OK), 1);
        assert_eq!(dispatched(OUTCOME_REJECTED), 1);
        assert_eq!(dispatched(OUTCOME_FAILED), 0);
    }

    #[test]
    fn test_record_events_appended() {
        let metrics = Metrics::new().unwrap();
        metrics.record_events_appended("user", 2);
        metrics.record_events_appended("user", 1);

        assert_eq!(metrics.events_appended.with_label_values(&["user"]).get(), 3);
    }

    #[test]
    fn test_record_projection_failure() {
        let metrics = Metrics::new().unwrap();
        metrics.record_projection_failure("user_directory");

        assert_eq!(
            metrics.projection_failures.with_label_values(&["user_directory"]).get(),
            1
        );
    }
}
