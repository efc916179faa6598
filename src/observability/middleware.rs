use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::{Status, TraceContextExt};
use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, error, info, instrument, warn, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Metrics;
use crate::handlers::auth::REQUESTER_HEADER;

/// Route label for requests that matched no route. Raw paths would give
/// every booking id its own metric series.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Route template of the request (`/api/bookings/:id`), never the raw path
pub fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// Keeps the in-flight gauge balanced when the request future is dropped
/// by an outer timeout before a response exists.
struct InFlight {
    metrics: Arc<Metrics>,
    method: String,
    route: String,
}

impl InFlight {
    fn enter(metrics: Arc<Metrics>, method: String, route: String) -> Self {
        metrics.increment_in_flight(&method, &route);
        Self {
            metrics,
            method,
            route,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.metrics.decrement_in_flight(&self.method, &self.route);
    }
}

/// Per-request server span, HTTP metrics and a completion log line
pub async fn request_observability(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = route_label(&request);
    let requester = request
        .headers()
        .get(REQUESTER_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span_name = format!("{} {}", method, route);
    let span = tracing::info_span!(
        target: "booking_rs::http",
        "{}", span_name,
        otel.name = %span_name,
        otel.kind = "server",
        http.request.method = %method,
        http.route = %route,
        url.path = %request.uri().path(),
        user_agent.original = %user_agent,
        enduser.id = %requester,
        http.response.status_code = tracing::field::Empty,
    );

    async move {
        let _in_flight = InFlight::enter(metrics.clone(), method.clone(), route.clone());

        let response = next.run(request).await;
        let status = response.status();
        let elapsed = started.elapsed();

        mark_span(status);
        metrics.record_http_request(&method, &route, status.as_u16(), elapsed.as_secs_f64());
        log_completion(&method, &route, &requester, status, elapsed);

        response
    }
    .instrument(span)
    .await
}

fn mark_span(status: StatusCode) {
    let span = Span::current();
    span.record("http.response.status_code", status.as_u16());

    // Client errors are expected outcomes here (sold out, not yours)
    if status.is_server_error() {
        span.context()
            .span()
            .set_status(Status::error(status.to_string()));
    } else {
        span.context().span().set_status(Status::Ok);
    }
}

fn log_completion(method: &str, route: &str, requester: &str, status: StatusCode, elapsed: Duration) {
    let status_code = status.as_u16();
    let duration_ms = elapsed.as_millis();

    if status.is_server_error() {
        error!(method, route, requester, status_code, duration_ms, "Request failed");
    } else if status.is_client_error() {
        warn!(method, route, requester, status_code, duration_ms, "Request rejected");
    } else {
        info!(method, route, requester, status_code, duration_ms, "Request completed");
    }
}

/// Times DynamoDB calls into the database metrics
#[derive(Clone)]
pub struct DatabaseTimer {
    metrics: Arc<Metrics>,
}

impl DatabaseTimer {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    pub async fn time<F, T, E>(&self, operation: &str, table: &str, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let started = Instant::now();
        let result = future.await;
        let elapsed = started.elapsed();

        self.metrics.record_database_operation(
            operation,
            table,
            result.is_ok(),
            elapsed.as_secs_f64(),
        );

        match &result {
            Ok(_) => debug!(operation, table, duration_ms = elapsed.as_millis(), "DynamoDB call"),
            Err(error) => error!(
                operation,
                table,
                duration_ms = elapsed.as_millis(),
                error = %error,
                "DynamoDB call failed"
            ),
        }

        result
    }
}

/// Counts booking operations by outcome inside a span carrying the
/// requester
#[derive(Clone)]
pub struct BookingOperationTracer {
    metrics: Arc<Metrics>,
}

impl BookingOperationTracer {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    #[instrument(name = "booking_operation", skip_all, fields(
        operation = %operation,
        requester_id = %requester_id,
        booking_id = booking_id,
    ))]
    pub async fn trace<F, T, E>(
        &self,
        operation: &str,
        requester_id: &str,
        booking_id: Option<&str>,
        future: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let result = future.await;
        self.metrics.record_booking_operation(operation, result.is_ok());

        // Domain refusals surface here too, so they are not logged as errors
        if let Err(error) = &result {
            warn!(error = %error, "Booking operation refused");
        }

        result
    }
}
