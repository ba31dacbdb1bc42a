use std::path::PathBuf;

use junit_trace_core::error::Result;
use junit_trace_store::FileSpanExporter;
use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::{debug, warn};

pub const TRACER_NAME: &str = "Trace Test Artifact";

#[derive(Debug, Clone)]
pub struct TracerProviderParams {
    pub trace_log_path: PathBuf,
    pub service_name: String,
    pub service_instance_id: String,
    pub service_namespace: String,
    pub service_version: String,
}

/// Provider that writes every span to the trace log as soon as it ends.
///
/// When `OTEL_EXPORTER_OTLP_ENDPOINT` is set the spans are also batched to that
/// collector.
pub fn create_tracer_provider(params: TracerProviderParams) -> Result<SdkTracerProvider> {
    let exporter = FileSpanExporter::create(&params.trace_log_path)?;
    let resource = Resource::builder()
        .with_service_name(params.service_name)
        .with_attributes([
            KeyValue::new("service.instance.id", params.service_instance_id),
            KeyValue::new("service.namespace", params.service_namespace),
            KeyValue::new("service.version", params.service_version),
        ])
        .build();

    let mut builder = SdkTracerProvider::builder()
        .with_simple_exporter(exporter)
        .with_resource(resource);
    if let Some(otlp) = build_otlp_exporter() {
        builder = builder.with_batch_exporter(otlp);
    }

    debug!(path = %params.trace_log_path.display(), "tracer provider ready");
    Ok(builder.build())
}

fn build_otlp_exporter() -> Option<opentelemetry_otlp::SpanExporter> {
    std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    match opentelemetry_otlp::SpanExporter::builder().with_tonic().build() {
        Ok(exporter) => Some(exporter),
        Err(err) => {
            warn!(error = %err, "OTLP exporter unavailable, writing the trace log only");
            None
        }
    }
}
