use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Ingestion outcomes (persisted, poison, redelivery) and latency
// - Offset commit failures
// - Read cache hit ratio and size
//
// All metrics are registered with Prometheus and scraped via /metrics
// ============================================================================

pub const OUTCOME_PERSISTED: &str = "persisted";
pub const OUTCOME_POISON: &str = "poison";
pub const OUTCOME_REDELIVERY: &str = "redelivery";

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Ingestion Metrics
    pub orders_consumed: IntCounterVec,
    pub order_commit_failures: IntCounter,
    pub order_processing_duration: Histogram,

    // Cache Metrics
    pub cache_lookups: IntCounterVec,
    pub cache_size: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_consumed = IntCounterVec::new(
            Opts::new("orders_consumed_total", "Inbound order messages by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_consumed.clone()))?;

        let order_commit_failures = IntCounter::new(
            "order_commit_failures_total",
            "Offset commits that failed after processing",
        )?;
        registry.register(Box::new(order_commit_failures.clone()))?;

        let order_processing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "order_processing_duration_seconds",
                "Decode, validate and persist duration per message",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(order_processing_duration.clone()))?;

        let cache_lookups = IntCounterVec::new(
            Opts::new("order_cache_lookups_total", "Read cache lookups by result"),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let cache_size = IntGauge::new("order_cache_size", "Orders held in the read cache")?;
        registry.register(Box::new(cache_size.clone()))?;

        Ok(Self {
            registry,
            orders_consumed,
            order_commit_failures,
            order_processing_duration,
            cache_lookups,
            cache_size,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_consumed(&self, outcome: &str, duration_secs: f64) {
        self.orders_consumed.with_label_values(&[outcome]).inc();
        self.order_processing_duration.observe(duration_secs);
    }

    pub fn record_commit_failure(&self) {
        self.order_commit_failures.inc();
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    pub fn set_cache_size(&self, size: usize) {
        self.cache_size.set(size as i64);
    }
}
