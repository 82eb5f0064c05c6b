//! Monitoring
//!
//! Prometheus text exposition of the cache counters. A fresh registry is
//! filled from the current snapshots on every scrape, so the counters stay
//! owned by the caches themselves.

use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::cache::CacheStatsSnapshot;
use crate::error::{Error, Result};
use crate::service::PostService;

/// Metric name prefix
pub const NAMESPACE: &str = "postcache";

fn prom_err(err: prometheus::Error) -> Error {
    Error::Internal(format!("metrics encoding failed: {}", err))
}

struct LocalCacheMetrics {
    entries: IntGaugeVec,
    requests: IntCounterVec,
    loads: IntCounterVec,
    load_failures: IntCounterVec,
    coalesced: IntCounterVec,
    evictions: IntCounterVec,
    expirations: IntCounterVec,
    hit_ratio: GaugeVec,
    load_latency: GaugeVec,
}

impl LocalCacheMetrics {
    fn register(registry: &Registry) -> Result<Self> {
        let counter = |name: &str, help: &str| -> Result<IntCounterVec> {
            let c = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), &["cache"])
                .map_err(prom_err)?;
            registry.register(Box::new(c.clone())).map_err(prom_err)?;
            Ok(c)
        };

        let entries = IntGaugeVec::new(
            Opts::new("local_entries", "Live entries in the local cache").namespace(NAMESPACE),
            &["cache"],
        )
        .map_err(prom_err)?;
        registry.register(Box::new(entries.clone())).map_err(prom_err)?;

        let requests = IntCounterVec::new(
            Opts::new("local_requests_total", "Local cache lookups by result").namespace(NAMESPACE),
            &["cache", "result"],
        )
        .map_err(prom_err)?;
        registry.register(Box::new(requests.clone())).map_err(prom_err)?;

        let hit_ratio = GaugeVec::new(
            Opts::new("local_hit_ratio", "Local cache hit ratio").namespace(NAMESPACE),
            &["cache"],
        )
        .map_err(prom_err)?;
        registry.register(Box::new(hit_ratio.clone())).map_err(prom_err)?;

        let load_latency = GaugeVec::new(
            Opts::new(
                "local_load_latency_seconds",
                "Moving average of loader latency",
            )
            .namespace(NAMESPACE),
            &["cache"],
        )
        .map_err(prom_err)?;
        registry.register(Box::new(load_latency.clone())).map_err(prom_err)?;

        Ok(Self {
            entries,
            requests,
            loads: counter("local_loads_total", "Loader executions")?,
            load_failures: counter("local_load_failures_total", "Loader executions that failed")?,
            coalesced: counter("local_coalesced_total", "Callers that joined a load in flight")?,
            evictions: counter("local_evictions_total", "Entries evicted by capacity")?,
            expirations: counter("local_expirations_total", "Entries dropped after expiry")?,
            hit_ratio,
            load_latency,
        })
    }

    fn observe(&self, cache: &str, stats: &CacheStatsSnapshot) {
        let labels = [cache];
        self.entries
            .with_label_values(&labels)
            .set(stats.entries as i64);
        self.requests
            .with_label_values(&[cache, "hit"])
            .inc_by(stats.hits);
        self.requests
            .with_label_values(&[cache, "miss"])
            .inc_by(stats.misses);
        self.loads.with_label_values(&labels).inc_by(stats.loads);
        self.load_failures
            .with_label_values(&labels)
            .inc_by(stats.load_failures);
        self.coalesced.with_label_values(&labels).inc_by(stats.coalesced);
        self.evictions.with_label_values(&labels).inc_by(stats.evictions);
        self.expirations
            .with_label_values(&labels)
            .inc_by(stats.expirations);
        self.hit_ratio.with_label_values(&labels).set(stats.hit_ratio);
        self.load_latency
            .with_label_values(&labels)
            .set(stats.load_latency.as_secs_f64());
    }
}

/// Encode every cache counter of `service` in the Prometheus text format
pub fn render_metrics(service: &PostService) -> Result<String> {
    let registry = Registry::new();

    let local = LocalCacheMetrics::register(&registry)?;
    local.observe("post_list", &service.post_list_stats());
    local.observe("post_rows", &service.row_count_stats());

    let shared = service.shared_stats();
    let shared_gauges = [
        ("shared_hits", "Shared tier lookups that found the page", shared.hits),
        ("shared_misses", "Shared tier lookups that missed", shared.misses),
        ("shared_writes", "Shared tier page writes attempted", shared.writes),
        ("shared_write_failures", "Shared tier page writes that failed", shared.write_failures),
    ];
    for (name, help, value) in shared_gauges {
        let gauge =
            IntGauge::with_opts(Opts::new(name, help).namespace(NAMESPACE)).map_err(prom_err)?;
        gauge.set(value as i64);
        registry.register(Box::new(gauge)).map_err(prom_err)?;
    }

    let shared_hit_ratio = Gauge::with_opts(
        Opts::new("shared_hit_ratio", "Shared tier hit ratio").namespace(NAMESPACE),
    )
    .map_err(prom_err)?;
    let lookups = shared.hits + shared.misses;
    if lookups > 0 {
        shared_hit_ratio.set(shared.hits as f64 / lookups as f64);
    }
    registry
        .register(Box::new(shared_hit_ratio))
        .map_err(prom_err)?;

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(prom_err)?;

    String::from_utf8(buffer).map_err(|e| Error::Internal(format!("metrics not utf-8: {}", e)))
}

/// Content type of [`render_metrics`] output
pub fn content_type() -> &'static str {
    prometheus::TEXT_FORMAT
}

// =============================================================================
// Tests
// =============================================================================
