use std::time::Duration;

use opentelemetry::{
    global,
    trace::{SamplingDecision, SamplingResult, TraceContextExt, TraceState, TracerProvider as _},
    KeyValue,
};
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::{
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider},
    trace::{RandomIdGenerator, SdkTracerProvider, ShouldSample},
    Resource,
};
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use tracing::Level;
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::{GenError, Result};

const SERVICE_NAME: &str = "reel-gen";
const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Spans that are too frequent to be worth exporting.
const DROPPED_SPANS: [&str; 1] = ["pause"];

#[derive(Debug, Clone)]
struct FilterSampler;

impl ShouldSample for FilterSampler {
    fn should_sample(
        &self,
        parent_context: Option<&opentelemetry::Context>,
        _trace_id: opentelemetry::TraceId,
        name: &str,
        _span_kind: &opentelemetry::trace::SpanKind,
        _attributes: &[KeyValue],
        _links: &[opentelemetry::trace::Link],
    ) -> opentelemetry::trace::SamplingResult {
        let decision = if DROPPED_SPANS.contains(&name) {
            SamplingDecision::Drop
        } else {
            SamplingDecision::RecordAndSample
        };

        SamplingResult {
            decision,
            attributes: vec![],
            trace_state: match parent_context {
                Some(ctx) => ctx.span().span_context().trace_state().clone(),
                None => TraceState::default(),
            },
        }
    }
}

fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attribute(KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")))
        .build()
}

/// OTLP/HTTP path for one signal under a collector base URL. An explicit
/// exporter endpoint is used verbatim, so the `/v1/<signal>` suffix is added
/// here unless the URL already carries it.
fn signal_endpoint(base: &str, signal: &str) -> String {
    let base = base.trim_end_matches('/');
    let suffix = format!("/v1/{}", signal);
    if base.ends_with(&suffix) {
        base.to_string()
    } else {
        format!("{}{}", base, suffix)
    }
}

/// Retry and failure counters emitted as `monotonic_counter.*` event fields
/// reach the collector through this provider.
fn init_meter_provider(url: &str) -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_endpoint(signal_endpoint(url, "metrics"))
        .with_protocol(Protocol::HttpBinary)
        .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
        .build()
        .map_err(|e| GenError::config(format!("Failed to build metric exporter: {}", e)))?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();

    let meter_provider = MeterProviderBuilder::default()
        .with_resource(resource())
        .with_reader(reader)
        .build();

    global::set_meter_provider(meter_provider.clone());

    Ok(meter_provider)
}

fn init_tracer_provider(url: &str) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(signal_endpoint(url, "traces"))
        .with_protocol(Protocol::HttpBinary)
        .build()
        .map_err(|e| GenError::config(format!("Failed to build span exporter: {}", e)))?;

    Ok(SdkTracerProvider::builder()
        .with_sampler(FilterSampler)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

/// Logging at INFO on stderr, plus OTLP export of traces and metrics when a
/// collector URL is configured. Stdout stays free for the JSON the CLI
/// prints. Keep the guard alive for the whole run.
pub fn init_tracing_subscriber(otel_http_url: &Option<String>) -> Result<OtelGuard> {
    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            Level::INFO,
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    if let Some(url) = otel_http_url {
        let tracer_provider = init_tracer_provider(url)?;
        let meter_provider = init_meter_provider(url)?;

        let tracer = tracer_provider.tracer(SERVICE_NAME);

        registry
            .with(MetricsLayer::new(meter_provider.clone()))
            .with(OpenTelemetryLayer::new(tracer))
            .init();

        Ok(OtelGuard {
            _tracer_provider: Some(tracer_provider),
            _meter_provider: Some(meter_provider),
        })
    } else {
        registry.init();

        Ok(OtelGuard {
            _tracer_provider: None,
            _meter_provider: None,
        })
    }
}

pub struct OtelGuard {
    _tracer_provider: Option<SdkTracerProvider>,
    _meter_provider: Option<SdkMeterProvider>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanKind, TraceId};

    fn decision(name: &str) -> SamplingDecision {
        FilterSampler
            .should_sample(None, TraceId::INVALID, name, &SpanKind::Internal, &[], &[])
            .decision
    }

    #[test]
    fn test_signal_endpoint() {
        assert_eq!(
            signal_endpoint("http://localhost:4318", "traces"),
            "http://localhost:4318/v1/traces"
        );
        assert_eq!(
            signal_endpoint("http://localhost:4318/", "metrics"),
            "http://localhost:4318/v1/metrics"
        );
        assert_eq!(
            signal_endpoint("http://collector/v1/traces", "traces"),
            "http://collector/v1/traces"
        );
    }

    #[test]
    fn test_sampler_drops_pacing_spans() {
        assert!(matches!(decision("pause"), SamplingDecision::Drop));
        assert!(matches!(
            decision("generate_single"),
            SamplingDecision::RecordAndSample
        ));
    }
}
