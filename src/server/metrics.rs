//! Prometheus metrics.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Latency buckets in seconds; generation takes seconds to minutes.
const INFERENCE_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0];

pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    inference_seconds: HistogramVec,
    model_loaded: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("api_requests_total", "Interaction requests by endpoint and outcome"),
            &["endpoint", "outcome"],
        )?;
        let inference_seconds = HistogramVec::new(
            HistogramOpts::new("inference_duration_seconds", "Time spent generating")
                .buckets(INFERENCE_BUCKETS.to_vec()),
            &["endpoint"],
        )?;
        let model_loaded = IntGauge::new("model_loaded", "1 when the model is ready")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(inference_seconds.clone()))?;
        registry.register(Box::new(model_loaded.clone()))?;

        Ok(Self {
            registry,
            requests,
            inference_seconds,
            model_loaded,
        })
    }

    pub fn observe_request(&self, endpoint: &str, outcome: &str) {
        self.requests.with_label_values(&[endpoint, outcome]).inc();
    }

    pub fn observe_inference(&self, endpoint: &str, seconds: f64) {
        self.inference_seconds
            .with_label_values(&[endpoint])
            .observe(seconds);
    }

    pub fn set_model_loaded(&self, loaded: bool) {
        self.model_loaded.set(i64::from(loaded));
    }

    /// Text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
