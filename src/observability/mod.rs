pub mod metrics;
pub mod middleware;
pub mod tracing;

pub use metrics::{Metrics, MetricsError};
pub use middleware::{
    request_observability, BookingOperationTracer, DatabaseTimer,
};
pub use tracing::{init_observability, shutdown_observability, ObservabilityError, get_current_trace_id};
