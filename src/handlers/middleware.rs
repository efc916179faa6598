use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use tracing::{error, warn};

use crate::models::ApiResponse;

type Rejection = (StatusCode, Json<ApiResponse<()>>);

/// Limits enforced on incoming requests
#[derive(Clone, Copy, Debug)]
pub struct RequestLimits {
    pub max_request_size: u64,
}

/// Request validation middleware
pub async fn request_validation_middleware(
    State(limits): State<RequestLimits>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Rejection> {
    validate_request_size(&request, limits.max_request_size)?;
    validate_content_type(&request)?;

    Ok(next.run(request).await)
}

fn declared_length(request: &Request<Body>) -> Option<u64> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

fn has_body(request: &Request<Body>) -> bool {
    declared_length(request).map(|length| length > 0).unwrap_or(false)
        || request.headers().contains_key(header::TRANSFER_ENCODING)
}

/// POST/PUT/PATCH bodies must be JSON. Bodyless calls such as cancel pass.
fn validate_content_type(request: &Request<Body>) -> Result<(), Rejection> {
    let method = request.method();
    if !(method == Method::POST || method == Method::PUT || method == Method::PATCH)
        || !has_body(request)
    {
        return Ok(());
    }

    match request.headers().get(header::CONTENT_TYPE) {
        Some(content_type) => {
            let content_type_str = content_type.to_str().unwrap_or("");
            if !content_type_str.starts_with("application/json") {
                warn!("Invalid content type: {}", content_type_str);
                return Err((
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    Json(ApiResponse::failure("Content-Type must be application/json")),
                ));
            }
            Ok(())
        }
        None => {
            warn!("Missing content type header");
            Err((
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::failure(
                    "Content-Type header is required for requests with body",
                )),
            ))
        }
    }
}

fn validate_request_size(request: &Request<Body>, max_request_size: u64) -> Result<(), Rejection> {
    match declared_length(request) {
        Some(length) if length > max_request_size => {
            error!("Request too large: {} bytes", length);
            Err((
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ApiResponse::failure(format!(
                    "Request size {} bytes exceeds maximum of {} bytes",
                    length, max_request_size
                ))),
            ))
        }
        _ => Ok(()),
    }
}

/// CORS middleware for handling cross-origin requests
pub async fn cors_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-User-Id"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );

    response
}

/// Security headers middleware
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        middleware,
        routing::{post, put},
        Router,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/api/bookings", post(|| async { "created" }))
            .route("/api/bookings/:id/cancel", put(|| async { "cancelled" }))
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(middleware::from_fn(cors_middleware))
            .layer(middleware::from_fn_with_state(
                RequestLimits {
                    max_request_size: 64,
                },
                request_validation_middleware,
            ))
    }

    #[tokio::test]
    async fn test_json_body_accepted() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/bookings")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, "2")
            .body(Body::from("{}"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::X_FRAME_OPTIONS).unwrap(),
            "DENY"
        );
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_non_json_body_rejected() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/bookings")
            .header(header::CONTENT_TYPE, "text/plain")
            .header(header::CONTENT_LENGTH, "5")
            .body(Body::from("hello"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_bodyless_put_passes() {
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/api/bookings/B1/cancel")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let body = "x".repeat(100);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/bookings")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len().to_string())
            .body(Body::from(body))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
