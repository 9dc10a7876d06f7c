//! OpenTelemetry export for the daemon's tracing spans
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name (default: ohq-daemon)
//!
//! # Example
//!
//! ```text
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 \
//! OTEL_SERVICE_NAME=ohq-staging \
//!     ./ohq-daemon
//! ```

use crate::logging::BoxedLayer;
use anyhow::Result;

type LayerAndNote = (Option<BoxedLayer>, Option<String>);

/// Tracing layer exporting spans over OTLP, if configured
///
/// Returns no layer when no endpoint is set. The note is returned rather than
/// logged because the subscriber does not exist yet.
pub fn layer() -> Result<LayerAndNote> {
    match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => enable(&endpoint),
        Err(_) => Ok((None, None)),
    }
}

#[cfg(feature = "telemetry")]
fn enable(endpoint: &str) -> Result<LayerAndNote> {
    let layer = otlp_layer(endpoint)?;
    Ok((
        Some(layer),
        Some(format!("OpenTelemetry export enabled ({})", endpoint)),
    ))
}

#[cfg(not(feature = "telemetry"))]
fn enable(endpoint: &str) -> Result<LayerAndNote> {
    Ok((
        None,
        Some(format!(
            "OTEL_EXPORTER_OTLP_ENDPOINT={} ignored: rebuild with --features telemetry",
            endpoint
        )),
    ))
}

#[cfg(feature = "telemetry")]
fn otlp_layer(endpoint: &str) -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::TracerProvider;
    use opentelemetry_sdk::Resource;
    use tracing_subscriber::Layer;

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "ohq-daemon".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();

    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}

/// Flush pending spans before exit
pub fn shutdown() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
