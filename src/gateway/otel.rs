//! OTLP span export. Every inbound request span (`omniplexer_request`) and
//! its `upstream_fetch` children are shipped alongside the regular log output.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig as _};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use super::logging::{env_filter, fmt_layer};

pub const SERVICE_NAME: &str = "omniplexer";

/// Flushes pending spans when dropped; hold it for the life of `main`.
#[derive(Debug)]
pub struct OtelGuard {
    provider: SdkTracerProvider,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(err) = self.provider.shutdown() {
            eprintln!("omniplexer: failed to flush spans: {err}");
        }
    }
}

pub(crate) fn service_resource() -> Resource {
    Resource::builder_empty()
        .with_service_name(SERVICE_NAME)
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}

/// `endpoint` overrides the exporter default (`OTEL_EXPORTER_OTLP_ENDPOINT`
/// or `http://localhost:4318`).
pub fn init_tracing(
    endpoint: Option<&str>,
    json_logs: bool,
) -> Result<OtelGuard, Box<dyn std::error::Error>> {
    let mut exporter = SpanExporter::builder().with_http();
    if let Some(endpoint) = endpoint {
        exporter = exporter.with_endpoint(endpoint);
    }

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter.build()?)
        .with_resource(service_resource())
        .build();
    opentelemetry::global::set_tracer_provider(provider.clone());

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer(json_logs))
        .with(tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME)))
        .try_init()?;

    Ok(OtelGuard { provider })
}
