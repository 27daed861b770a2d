use lazy_static::lazy_static;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, Unit},
};
use opentelemetry_sdk::metrics::MeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};

use crate::error::{PipelineError, Result};

lazy_static! {
    pub static ref METRICS_INSTANCE: Metrics = Metrics::new();
    pub static ref REGISTRY: Registry = prometheus::Registry::new();
}

pub struct Metrics {
    _meter: Meter,
    pub batches_started: Counter<u64>,
    pub attachment_fetch_skipped: Counter<u64>,
    pub attachments_stored: Counter<u64>,
    pub attachments_hashed: Counter<u64>,
    pub storage_timing: Histogram<f64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("attach2s");
        Self {
            _meter: meter.clone(),
            batches_started: meter
                .u64_counter("batches_started")
                .with_description("Counts the number of processed fetch requests.")
                .init(),
            attachment_fetch_skipped: meter
                .u64_counter("attachment_fetch_skipped")
                .with_description("Counts attachment ids the mail server refused or reported errors for.")
                .init(),
            attachments_stored: meter
                .u64_counter("attachments_stored")
                .with_description("Counts the number of stored attachments.")
                .init(),
            attachments_hashed: meter
                .u64_counter("attachments_hashed")
                .with_description("Counts attachments hashed without uploading.")
                .init(),
            storage_timing: meter
                .f64_histogram("storage_timing")
                .with_description("Measures the duration of a single attachment upload.")
                .with_unit(Unit::new("s"))
                .init(),
        }
    }
}

pub fn setup_metrics_provider() -> Result<()> {
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(REGISTRY.clone())
        .build()
        .map_err(|e| PipelineError::Config(format!("cannot build metrics exporter: {e}")))?;
    let provider = MeterProvider::builder().with_reader(exporter).build();
    global::set_meter_provider(provider);
    Ok(())
}

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder
        .encode(REGISTRY.gather().as_slice(), &mut buffer)
        .map_err(|e| PipelineError::Config(format!("cannot encode metrics: {e}")))?;
    String::from_utf8(buffer).map_err(|e| PipelineError::Config(e.to_string()))
}
