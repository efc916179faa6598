use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tracing::{info, instrument};

use super::auth::Requester;
use crate::models::{
    ApiResponse, Booking, BookingDetails, CreateBookingRequest, ErrorKind, RepositoryError,
    ServiceError,
};
use crate::services::BookingService;

pub type ErrorResponse = (StatusCode, Json<ApiResponse<()>>);

/// Shared state of the booking endpoints
#[derive(Clone)]
pub struct BookingState {
    pub booking_service: Arc<BookingService>,
}

/// Create the booking API router
pub fn create_booking_router(booking_service: Arc<BookingService>) -> Router {
    let state = BookingState { booking_service };

    Router::new()
        .route("/api/bookings", post(create_booking).get(list_bookings))
        .route("/api/bookings/:booking_id", get(get_booking))
        .route("/api/bookings/:booking_id/cancel", put(cancel_booking))
        .with_state(state)
}

/// Book tickets for an event
#[instrument(name = "create_booking", skip(state, requester, payload), fields(user_id = %requester.user_id))]
pub async fn create_booking(
    State(state): State<BookingState>,
    requester: Requester,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), ErrorResponse> {
    let Json(request) = payload.map_err(|rejection| {
        crate::warn_with_trace!("Rejected booking request body: {}", rejection.body_text());
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::failure(rejection.body_text())),
        )
    })?;

    crate::info_with_trace!(
        "Creating booking for user: {}, event_id: {}, quantity: {}",
        requester.user_id,
        request.event_id,
        request.quantity
    );

    match state
        .booking_service
        .create_booking(&requester.user_id, &request.event_id, request.quantity)
        .await
    {
        Ok(booking) => {
            crate::info_with_trace!("Successfully created booking: {}", booking.id);
            Ok((StatusCode::CREATED, Json(ApiResponse::data(booking))))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to create booking: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// List the requester's bookings, newest first
#[instrument(name = "list_bookings", skip(state, requester), fields(user_id = %requester.user_id))]
pub async fn list_bookings(
    State(state): State<BookingState>,
    requester: Requester,
) -> Result<Json<ApiResponse<Vec<BookingDetails>>>, ErrorResponse> {
    info!("Listing bookings for user: {}", requester.user_id);

    match state
        .booking_service
        .list_user_bookings(&requester.user_id)
        .await
    {
        Ok(bookings) => {
            info!("Successfully listed {} bookings", bookings.len());
            Ok(Json(ApiResponse::list(bookings)))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to list bookings: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Get one of the requester's bookings
#[instrument(name = "get_booking", skip(state, requester), fields(user_id = %requester.user_id, booking_id = %booking_id))]
pub async fn get_booking(
    State(state): State<BookingState>,
    requester: Requester,
    Path(booking_id): Path<String>,
) -> Result<Json<ApiResponse<BookingDetails>>, ErrorResponse> {
    info!("Getting booking with ID: {}", booking_id);

    match state
        .booking_service
        .get_booking(&requester.user_id, &booking_id)
        .await
    {
        Ok(booking) => Ok(Json(ApiResponse::data(booking))),
        Err(err) => {
            crate::error_with_trace!("Failed to get booking {}: {}", booking_id, err);
            Err(service_error_to_response(err))
        }
    }
}

/// Cancel one of the requester's bookings
#[instrument(name = "cancel_booking", skip(state, requester), fields(user_id = %requester.user_id, booking_id = %booking_id))]
pub async fn cancel_booking(
    State(state): State<BookingState>,
    requester: Requester,
    Path(booking_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ErrorResponse> {
    crate::info_with_trace!("Cancelling booking: {}", booking_id);

    match state
        .booking_service
        .cancel_booking(&requester.user_id, &booking_id)
        .await
    {
        Ok(()) => {
            crate::info_with_trace!("Successfully cancelled booking: {}", booking_id);
            Ok(Json(ApiResponse::message("Booking cancelled successfully")))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to cancel booking {}: {}", booking_id, err);
            Err(service_error_to_response(err))
        }
    }
}

/// Map a service error onto a status code and a client-safe message
pub fn service_error_to_response(err: ServiceError) -> ErrorResponse {
    let (status, message) = match err.kind() {
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, not_found_message(&err)),
        ErrorKind::InvalidState => (StatusCode::BAD_REQUEST, invalid_state_message(&err)),
        ErrorKind::InsufficientInventory => (
            StatusCode::BAD_REQUEST,
            "Not enough tickets available".to_string(),
        ),
        ErrorKind::Forbidden => (StatusCode::FORBIDDEN, err.to_string()),
        ErrorKind::Invalid => (StatusCode::BAD_REQUEST, err.to_string()),
        ErrorKind::Unexpected => repository_failure(err),
    };

    (status, Json(ApiResponse::failure(message)))
}

fn not_found_message(err: &ServiceError) -> String {
    match err {
        ServiceError::EventNotFound { .. } => "Event not found".to_string(),
        _ => "Booking not found".to_string(),
    }
}

fn invalid_state_message(err: &ServiceError) -> String {
    match err {
        ServiceError::EventNotApproved { .. } => "Event is not approved for booking".to_string(),
        other => other.to_string(),
    }
}

fn repository_failure(err: ServiceError) -> (StatusCode, String) {
    match err {
        ServiceError::Repository { source } => match source {
            RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            RepositoryError::ConnectionFailed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Database connection failed".to_string(),
            ),
            RepositoryError::Timeout => {
                (StatusCode::REQUEST_TIMEOUT, "Request timeout".to_string())
            }
            RepositoryError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        },
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_of(err: ServiceError) -> (StatusCode, ApiResponse<()>) {
        let (status, Json(body)) = service_error_to_response(err);
        (status, body)
    }

    #[test]
    fn test_domain_errors_map_to_statuses() {
        let (status, body) = response_of(ServiceError::EventNotFound {
            id: "E9".to_string(),
        });
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message.as_deref(), Some("Event not found"));
        assert!(!body.success);

        let (status, body) = response_of(ServiceError::EventNotApproved {
            event_id: "E1".to_string(),
            status: "pending".to_string(),
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message.as_deref(), Some("Event is not approved for booking"));

        let (status, body) = response_of(ServiceError::InsufficientInventory {
            requested: 4,
            available: 3,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message.as_deref(), Some("Not enough tickets available"));

        let (status, body) = response_of(ServiceError::Forbidden { action: "cancel" });
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body.message.as_deref(),
            Some("Not authorized to cancel this booking")
        );

        let (status, _) = response_of(ServiceError::BookingAlreadyCancelled {
            id: "B1".to_string(),
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_repository_errors_do_not_leak_internals() {
        let (status, body) = response_of(
            RepositoryError::AwsSdk {
                message: "arn:aws:dynamodb:secret".to_string(),
            }
            .into(),
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message.as_deref(), Some("Internal server error"));

        let (status, _) = response_of(RepositoryError::RateLimitExceeded.into());
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, _) = response_of(RepositoryError::ConnectionFailed.into());
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = response_of(RepositoryError::Timeout.into());
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }
}
