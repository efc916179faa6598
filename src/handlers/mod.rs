pub mod admin;
pub mod auth;
pub mod bookings;
pub mod health;
pub mod metrics;
pub mod middleware;

pub use admin::*;
pub use auth::*;
pub use bookings::*;
pub use health::*;
pub use metrics::*;
pub use middleware::*;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::observability::{request_observability, Metrics};
use crate::services::BookingService;

/// Build the full application router.
/// `admin` is optional so the service can run without table management.
pub fn create_router(
    metrics: Arc<Metrics>,
    booking_service: Arc<BookingService>,
    admin: Option<AdminState>,
    limits: RequestLimits,
) -> Router {
    let metrics_for_middleware = metrics.clone();

    let mut app = Router::new()
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .merge(create_booking_router(booking_service));

    if let Some(admin) = admin {
        app = app.merge(create_admin_router(
            admin.table_manager,
            admin.events_table_name,
            admin.bookings_table_name,
        ));
    }

    // Last layer added runs first
    app.layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(cors_middleware))
        .layer(axum::middleware::from_fn_with_state(
            limits,
            request_validation_middleware,
        ))
        .layer(axum::middleware::from_fn(move |req, next| {
            request_observability(metrics_for_middleware.clone(), req, next)
        }))
}
