//! Log output and optional span export.
//!
//! Logs always go to stdout through `tracing-subscriber`. Setting
//! `OTEL_EXPORTER_OTLP_ENDPOINT` additionally ships spans (including the
//! per-request `http.request` span) to an OTLP/gRPC collector, with
//! `OTEL_EXPORTER_OTLP_HEADERS` (`key=value,...`) sent as request metadata,
//! typically a collector API key.

use crate::GIT_COMMIT_HASH;
use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{SdkTracerProvider, Tracer},
    Resource,
};
use std::{env::var, time::Duration};
use tonic::{
    metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{debug, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use ulid::Ulid;
use url::Url;

const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Logging settings resolved from the CLI and the `OTEL_*` environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub level: Level,
    /// Source locations in every log line.
    pub debug: bool,
    pub otlp_endpoint: Option<String>,
    pub otlp_headers: Option<String>,
    pub instance_id: String,
}

impl TelemetryConfig {
    #[must_use]
    pub fn from_env(level: Level, debug: bool) -> Self {
        Self {
            level,
            debug,
            otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|endpoint| !endpoint.trim().is_empty()),
            otlp_headers: var("OTEL_EXPORTER_OTLP_HEADERS").ok(),
            instance_id: var("OTEL_SERVICE_INSTANCE_ID").unwrap_or_else(|_| Ulid::new().to_string()),
        }
    }
}

/// `host:port` without a scheme is taken as TLS.
fn otlp_endpoint(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}

fn otlp_metadata(headers: &str) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::new();

    for (key, value) in headers.split(',').filter_map(|pair| pair.split_once('=')) {
        let key = key.trim().to_ascii_lowercase();
        let key = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
            .map_err(|err| anyhow!("invalid OTLP header name {key}: {err}"))?;
        let value = MetadataValue::try_from(value.trim())
            .map_err(|err| anyhow!("invalid OTLP header value for {}: {err}", key.as_str()))?;
        metadata.insert(key, value);
    }

    Ok(metadata)
}

fn resource(instance_id: &str) -> Resource {
    Resource::builder_empty()
        .with_attributes([
            KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new("service.instance.id", instance_id.to_string()),
            KeyValue::new("vcs.ref.head.revision", GIT_COMMIT_HASH),
        ])
        .build()
}

fn filter(level: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("h2=error".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?))
}

fn tracer(config: &TelemetryConfig, endpoint: &str) -> Result<Tracer> {
    let endpoint = otlp_endpoint(endpoint);

    let mut exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(EXPORT_TIMEOUT);

    let url = Url::parse(&endpoint)?;
    if url.scheme() == "https" {
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("OTLP endpoint {endpoint} has no host"))?;
        exporter = exporter.with_tls_config(
            ClientTlsConfig::new()
                .domain_name(host)
                .with_native_roots(),
        );
    }

    if let Some(headers) = &config.otlp_headers {
        exporter = exporter.with_metadata(otlp_metadata(headers)?);
    }

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter.build()?)
        .with_resource(resource(&config.instance_id))
        .build();

    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
    let _ = TRACER_PROVIDER.set(provider);

    debug!("Exporting spans to {endpoint}");
    Ok(tracer)
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the OTLP exporter cannot be built or a subscriber is
/// already installed.
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(config.debug)
        .with_line_number(config.debug);

    let otel_layer = match &config.otlp_endpoint {
        Some(endpoint) => Some(tracing_opentelemetry::layer().with_tracer(tracer(config, endpoint)?)),
        None => None,
    };

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter(config.level)?);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Flush buffered spans. Safe to call when export was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(err) = provider.shutdown() {
            warn!("Failed to flush spans: {err}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_to_https() {
        assert_eq!(otlp_endpoint("collector:4317"), "https://collector:4317");
        assert_eq!(otlp_endpoint(" collector:4317/ "), "https://collector:4317");
        assert_eq!(
            otlp_endpoint("http://localhost:4317"),
            "http://localhost:4317"
        );
    }

    #[test]
    fn headers_become_metadata() {
        let metadata = otlp_metadata("X-Api-Key = secret ,broken, tenant=tracegate").unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(
            metadata.get("x-api-key").and_then(|v| v.to_str().ok()),
            Some("secret")
        );
        assert_eq!(
            metadata.get("tenant").and_then(|v| v.to_str().ok()),
            Some("tracegate")
        );
        assert!(otlp_metadata("").unwrap().is_empty());
    }

    #[test]
    fn invalid_header_is_an_error() {
        assert!(otlp_metadata("bad key=value").is_err());
        assert!(otlp_metadata("key=line\nbreak").is_err());
    }

    #[test]
    fn resource_carries_commit() {
        let resource = resource("instance-1");
        let revision = resource
            .iter()
            .find(|(key, _)| key.as_str() == "vcs.ref.head.revision")
            .map(|(_, value)| value.to_string());
        assert_eq!(revision.as_deref(), Some(GIT_COMMIT_HASH));
        assert!(resource
            .iter()
            .any(|(key, value)| key.as_str() == "service.instance.id"
                && value.as_str() == "instance-1"));
    }

    #[test]
    fn config_from_env() {
        temp_env::with_vars(
            [
                ("OTEL_EXPORTER_OTLP_ENDPOINT", Some(" ")),
                ("OTEL_EXPORTER_OTLP_HEADERS", Some("x-api-key=k")),
                ("OTEL_SERVICE_INSTANCE_ID", Some("pod-7")),
            ],
            || {
                let config = TelemetryConfig::from_env(Level::INFO, true);
                assert_eq!(config.otlp_endpoint, None);
                assert_eq!(config.otlp_headers.as_deref(), Some("x-api-key=k"));
                assert_eq!(config.instance_id, "pod-7");
                assert!(config.debug);
            },
        );

        temp_env::with_vars(
            [
                ("OTEL_EXPORTER_OTLP_ENDPOINT", Some("collector:4317")),
                ("OTEL_SERVICE_INSTANCE_ID", None),
            ],
            || {
                let config = TelemetryConfig::from_env(Level::ERROR, false);
                assert_eq!(config.otlp_endpoint.as_deref(), Some("collector:4317"));
                assert_eq!(config.instance_id.len(), 26);
            },
        );
    }

    #[test]
    fn shutdown_without_exporter_is_noop() {
        shutdown_tracer();
    }
}
