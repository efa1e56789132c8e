use prometheus::{
    CounterVec, Encoder, HistogramVec, Registry, TextEncoder, histogram_opts, opts,
};
use std::time::Duration;

/// Prometheus metrics registry and collectors for the recordset API
pub struct ApiMetrics {
    registry: Registry,
    requests_total: CounterVec,
    request_duration: HistogramVec,
    guard_rejections: CounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            opts!(
                "recordset_api_requests_total",
                "Total number of recordset collection requests"
            ),
            &["operation", "code"],
        )?;

        let request_duration = HistogramVec::new(
            histogram_opts!(
                "recordset_api_request_duration_seconds",
                "Recordset collection request duration in seconds"
            ),
            &["operation"],
        )?;

        let guard_rejections = CounterVec::new(
            opts!(
                "recordset_api_guard_rejections_total",
                "Mutations refused by a guard rule"
            ),
            &["rule"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(guard_rejections.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            guard_rejections,
        })
    }

    /// Record a finished request with its HTTP status code
    pub fn record_request(&self, operation: &str, code: u16, duration: Duration) {
        self.requests_total
            .with_label_values(&[operation, &code.to_string()])
            .inc();
        self.request_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    pub fn record_guard_rejection(&self, rule: &str) {
        self.guard_rejections.with_label_values(&[rule]).inc();
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
