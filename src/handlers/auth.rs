use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};
use tracing::warn;

use crate::models::ApiResponse;

/// Header set by the authentication layer in front of this service
pub const REQUESTER_HEADER: &str = "x-user-id";

/// Identity of the authenticated caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requester {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiResponse<()>>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(REQUESTER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match user_id {
            Some(user_id) => Ok(Requester {
                user_id: user_id.to_string(),
            }),
            None => {
                warn!("Request without authenticated user");
                Err((
                    StatusCode::UNAUTHORIZED,
                    Json(ApiResponse::failure("Authentication required")),
                ))
            }
        }
    }
}
