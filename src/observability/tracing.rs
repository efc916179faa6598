use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{self, RandomIdGenerator, Sampler},
    Resource,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Upper bound on flushing buffered spans at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Failed to initialize OpenTelemetry: {0}")]
    OpenTelemetryInit(#[from] opentelemetry::trace::TraceError),
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Default log directives when `RUST_LOG` is unset. `log_level` applies to
/// this crate only; the AWS SDK stays at warn so DynamoDB retries do not
/// drown out booking logs.
fn default_directives(log_level: &str) -> String {
    format!(
        "{}={},tower_http=info,aws_config=warn,aws_smithy_runtime=warn,aws_sdk_dynamodb=warn",
        env!("CARGO_CRATE_NAME"),
        log_level
    )
}

/// Install the OTLP tracer and the log formatter. Must run once, inside
/// the tokio runtime, before the router is built.
pub fn init_observability(
    service_name: &str,
    service_version: &str,
    otlp_endpoint: Option<&str>,
    log_level: &str,
    enable_json_logging: bool,
) -> Result<(), ObservabilityError> {
    let endpoint = otlp_endpoint
        .filter(|endpoint| !endpoint.is_empty())
        .unwrap_or(DEFAULT_OTLP_ENDPOINT);
    let tracer = otlp_tracer(service_resource(service_name, service_version), endpoint)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    // Exactly one of the two formatters is installed
    let json_logs = enable_json_logging.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_target(false)
            .with_span_events(FmtSpan::NONE)
    });
    let text_logs = (!enable_json_logging).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_span_events(FmtSpan::NONE)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(OpenTelemetryLayer::new(tracer))
        .with(json_logs)
        .with(text_logs)
        .try_init()?;

    info!(
        service = service_name,
        version = service_version,
        otlp_endpoint = endpoint,
        json = enable_json_logging,
        "Observability initialized"
    );
    Ok(())
}

/// Trace id of the active span, if it belongs to a sampled trace
pub fn get_current_trace_id() -> Option<String> {
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let context = tracing::Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    span_context
        .is_valid()
        .then(|| span_context.trace_id().to_string())
}

#[doc(hidden)]
#[macro_export]
macro_rules! log_with_trace {
    ($level:ident, $($arg:tt)*) => {
        match $crate::observability::tracing::get_current_trace_id() {
            Some(trace_id) => tracing::$level!(trace_id = %trace_id, $($arg)*),
            None => tracing::$level!($($arg)*),
        }
    };
}

/// `tracing::info!` with the current `trace_id` attached
#[macro_export]
macro_rules! info_with_trace {
    ($($arg:tt)*) => { $crate::log_with_trace!(info, $($arg)*) };
}

#[macro_export]
macro_rules! warn_with_trace {
    ($($arg:tt)*) => { $crate::log_with_trace!(warn, $($arg)*) };
}

#[macro_export]
macro_rules! error_with_trace {
    ($($arg:tt)*) => { $crate::log_with_trace!(error, $($arg)*) };
}

/// Resource attributes identifying this service in traces
fn service_resource(service_name: &str, service_version: &str) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", service_version.to_string()),
        KeyValue::new("service.namespace", "ticketing"),
        KeyValue::new("cloud.provider", "aws"),
        KeyValue::new("cloud.platform", "aws_container"),
        KeyValue::new("telemetry.sdk.language", "rust"),
    ])
}

fn otlp_tracer(
    resource: Resource,
    endpoint: &str,
) -> Result<opentelemetry_sdk::trace::Tracer, ObservabilityError> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .with_batch_config(
            trace::BatchConfig::default()
                .with_max_export_timeout(Duration::from_secs(30))
                .with_scheduled_delay(Duration::from_millis(500)),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    Ok(tracer)
}

/// Flush pending spans. Gives up after `SHUTDOWN_GRACE` so a dead
/// collector cannot hold the process open.
pub async fn shutdown_observability() {
    info!("Flushing traces");

    // The provider shutdown blocks on the exporter
    let flush = tokio::task::spawn_blocking(global::shutdown_tracer_provider);

    match tokio::time::timeout(SHUTDOWN_GRACE, flush).await {
        Ok(Ok(())) => info!("Traces flushed"),
        Ok(Err(e)) => warn!("Trace flush task failed: {}", e),
        Err(_) => warn!(
            "Trace flush did not finish within {}s, exiting anyway",
            SHUTDOWN_GRACE.as_secs()
        ),
    }
}
