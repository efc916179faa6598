use thiserror::Error;

/// Coarse classification of service failures, used at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InsufficientInventory,
    Forbidden,
    Invalid,
    Unexpected,
}

/// Service-level errors that can occur in business logic
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Event not found: {id}")]
    EventNotFound { id: String },

    #[error("Booking not found: {id}")]
    BookingNotFound { id: String },

    #[error("Event is not approved for booking (status: {status})")]
    EventNotApproved { event_id: String, status: String },

    #[error("Booking is already cancelled")]
    BookingAlreadyCancelled { id: String },

    #[error("Not enough tickets available: requested={requested}, available={available}")]
    InsufficientInventory { requested: u32, available: u32 },

    #[error("Not authorized to {action} this booking")]
    Forbidden { action: &'static str },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Repository error: {source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::EventNotFound { .. } | ServiceError::BookingNotFound { .. } => {
                ErrorKind::NotFound
            }
            ServiceError::EventNotApproved { .. } | ServiceError::BookingAlreadyCancelled { .. } => {
                ErrorKind::InvalidState
            }
            ServiceError::InsufficientInventory { .. } => ErrorKind::InsufficientInventory,
            ServiceError::Forbidden { .. } => ErrorKind::Forbidden,
            ServiceError::ValidationError { .. } => ErrorKind::Invalid,
            ServiceError::Repository { .. } => ErrorKind::Unexpected,
        }
    }
}

/// Repository-level errors for data access operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database connection failed")]
    ConnectionFailed,

    #[error("Item not found")]
    NotFound,

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Invalid stored item: {message}")]
    InvalidItem { message: String },

    #[error("Timeout occurred during operation")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Validation errors for input data
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredField { field: String },

    #[error("Field too long: {field}, max_length={max_length}, actual_length={actual_length}")]
    TooLong {
        field: String,
        max_length: usize,
        actual_length: usize,
    },

    #[error("Value out of range: {field}, min={min}, max={max}, value={value}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
        value: String,
    },
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::ValidationError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;
