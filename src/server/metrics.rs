//! Prometheus metrics for the kaf server.

use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// Container for all Prometheus metrics.
pub struct Metrics {
    registry: Registry,

    /// Counter of records appended over HTTP.
    pub put_records_total: Counter,

    /// Counter of payload bytes appended over HTTP.
    pub put_bytes_total: Counter,

    /// Counter of records returned by get windows.
    pub get_records_total: Counter,

    /// Counter of payload bytes returned by get windows.
    pub get_bytes_total: Counter,

    /// Counter of accepted archive requests.
    pub archive_requests_total: Counter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics registry with all metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let put_records_total = Counter::default();
        registry.register(
            "kaf_put_records_total",
            "Total number of records appended over HTTP",
            put_records_total.clone(),
        );

        let put_bytes_total = Counter::default();
        registry.register(
            "kaf_put_bytes_total",
            "Total number of payload bytes appended over HTTP",
            put_bytes_total.clone(),
        );

        let get_records_total = Counter::default();
        registry.register(
            "kaf_get_records_total",
            "Total number of records returned by get windows",
            get_records_total.clone(),
        );

        let get_bytes_total = Counter::default();
        registry.register(
            "kaf_get_bytes_total",
            "Total number of payload bytes returned by get windows",
            get_bytes_total.clone(),
        );

        let archive_requests_total = Counter::default();
        registry.register(
            "kaf_archive_requests_total",
            "Total number of archive requests accepted",
            archive_requests_total.clone(),
        );

        Self {
            registry,
            put_records_total,
            put_bytes_total,
            get_records_total,
            get_bytes_total,
            archive_requests_total,
        }
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics should not fail");
        buffer
    }
}
