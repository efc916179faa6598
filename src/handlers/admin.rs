use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::models::ApiResponse;
use crate::repositories::TableManager;

/// Admin state for table management
#[derive(Clone)]
pub struct AdminState {
    pub table_manager: Arc<TableManager>,
    pub events_table_name: String,
    pub bookings_table_name: String,
}

/// Response for table setup operations
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupTablesResponse {
    pub tables_created: Vec<String>,
    pub timestamp: String,
}

/// Create admin router with database management endpoints
pub fn create_admin_router(
    table_manager: Arc<TableManager>,
    events_table_name: String,
    bookings_table_name: String,
) -> Router {
    let state = AdminState {
        table_manager,
        events_table_name,
        bookings_table_name,
    };

    Router::new()
        .route("/api/admin/setup-tables", post(setup_tables))
        .with_state(state)
}

/// Set up the required DynamoDB tables
#[instrument(name = "setup_tables", skip(state), fields(
    events_table = %state.events_table_name,
    bookings_table = %state.bookings_table_name,
))]
pub async fn setup_tables(
    State(state): State<AdminState>,
) -> Result<Json<ApiResponse<SetupTablesResponse>>, (StatusCode, Json<ApiResponse<()>>)> {
    info!("Setting up DynamoDB tables");

    match state
        .table_manager
        .create_all_tables(&state.events_table_name, &state.bookings_table_name)
        .await
    {
        Ok(()) => {
            let tables_created = vec![
                state.events_table_name.clone(),
                state.bookings_table_name.clone(),
            ];

            info!("Successfully created tables: {:?}", tables_created);

            Ok(Json(ApiResponse::data(SetupTablesResponse {
                tables_created,
                timestamp: chrono::Utc::now().to_rfc3339(),
            })))
        }
        Err(err) => {
            error!("Failed to create tables: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::failure("Failed to create tables")),
            ))
        }
    }
}
