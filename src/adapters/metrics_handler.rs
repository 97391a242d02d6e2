use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsCollector {
    registry: Registry,

    // Request metrics
    pub requests_total: CounterVec,
    pub request_duration: HistogramVec,

    // Generation cache
    pub cache_hits: Counter,
    pub cache_misses: Counter,

    // Scenario policy
    pub injected_faults: CounterVec,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("schemock_requests_total", "Total number of mock requests"),
            &["method", "route", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "schemock_request_duration_seconds",
                "Mock request duration in seconds, including injected latency",
            ),
            &["method", "route"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let cache_hits = Counter::new("schemock_cache_hits_total", "Generation cache hits")?;
        registry.register(Box::new(cache_hits.clone()))?;

        let cache_misses = Counter::new("schemock_cache_misses_total", "Generation cache misses")?;
        registry.register(Box::new(cache_misses.clone()))?;

        let injected_faults = CounterVec::new(
            Opts::new(
                "schemock_injected_faults_total",
                "Synthetic errors returned by the scenario policy",
            ),
            &["status"],
        )?;
        registry.register(Box::new(injected_faults.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            cache_hits,
            cache_misses,
            injected_faults,
        })
    }

    pub fn record_request(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        self.requests_total
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
        self.request_duration
            .with_label_values(&[method, route])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.inc();
    }

    pub fn record_injected_fault(&self, status: u16) {
        self.injected_faults
            .with_label_values(&[&status.to_string()])
            .inc();
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

pub struct MetricsHandler {
    collector: Arc<MetricsCollector>,
}

impl MetricsHandler {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }

    pub async fn metrics(&self) -> String {
        self.collector.encode().unwrap_or_else(|e| {
            tracing::error!("Failed to encode metrics: {}", e);
            String::from("# Error encoding metrics\n")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        assert!(MetricsCollector::new().is_ok());
    }

    #[test]
    fn test_metrics_encoding() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_request("GET", "/api/users", 200, Duration::from_millis(3));
        collector.record_cache_hit();
        collector.record_injected_fault(503);

        let text = collector.encode().unwrap();
        assert!(text.contains("schemock_requests_total"));
        assert!(text.contains("schemock_request_duration_seconds"));
        assert!(text.contains("schemock_cache_hits_total"));
        assert!(text.contains("schemock_injected_faults_total{status=\"503\"} 1"));
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        let collector = Arc::new(MetricsCollector::new().unwrap());
        let handler = MetricsHandler::new(collector.clone());

        collector.record_request("POST", "/api/users", 201, Duration::ZERO);

        let metrics = handler.metrics().await;
        assert!(metrics.contains("schemock_requests_total"));
        assert!(metrics.contains("route=\"/api/users\""));
    }
}
