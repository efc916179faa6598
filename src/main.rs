use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use booking_rs::{
    handlers::{create_router, AdminState, RequestLimits},
    init_observability,
    observability::{DatabaseTimer, Metrics},
    repositories::{DynamoDbBookingRepository, DynamoDbEventRepository, TableManager},
    services::BookingService,
    shutdown_observability, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (basic logging only)
    let config = Config::from_environment().context("failed to load configuration")?;
    println!("Configuration loaded successfully");

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        config.observability.otlp_endpoint.as_deref(),
        &config.observability.log_level,
        config.observability.enable_json_logging,
    )?;

    info!("Starting booking-rs service");
    info!(
        "Service: {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Region: {}", config.database.region);
    info!(
        "DynamoDB Tables: events={}, bookings={}",
        config.database.events_table_name, config.database.bookings_table_name
    );
    info!(
        "Inventory policy: atomic={}, restore_on_cancel={}",
        config.booking.atomic_inventory, config.booking.restore_inventory_on_cancel
    );

    let metrics = Arc::new(Metrics::new()?);
    info!("Metrics initialized successfully");

    let dynamodb_client = Arc::new(config.dynamodb_client().await);
    info!("AWS clients initialized successfully");

    let table_manager = Arc::new(TableManager::new(
        dynamodb_client.clone(),
        config.database.region.clone(),
    ));

    let event_repository = Arc::new(
        DynamoDbEventRepository::new(
            dynamodb_client.clone(),
            config.database.events_table_name.clone(),
            config.database.region.clone(),
        )
        .with_tracing(DatabaseTimer::new(metrics.clone())),
    );
    let booking_repository = Arc::new(
        DynamoDbBookingRepository::new(
            dynamodb_client.clone(),
            config.database.bookings_table_name.clone(),
            config.database.region.clone(),
        )
        .with_tracing(DatabaseTimer::new(metrics.clone())),
    );
    info!("Repositories initialized successfully");

    let booking_service = Arc::new(BookingService::new_with_metrics(
        event_repository,
        booking_repository,
        config.booking.policy(),
        metrics.clone(),
    ));
    info!("Services initialized successfully");

    let admin_state = AdminState {
        table_manager,
        events_table_name: config.database.events_table_name.clone(),
        bookings_table_name: config.database.bookings_table_name.clone(),
    };

    let app = create_router(
        metrics,
        booking_service,
        Some(admin_state),
        RequestLimits {
            max_request_size: config.server.max_request_size,
        },
    )
    .layer(TimeoutLayer::new(config.server.request_timeout()));

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("invalid server host: {}", config.server.host))?,
        config.server.port,
    );

    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
        shutdown_observability().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
