// Repositories module - data access layer

pub mod booking_repository;
mod dynamodb;
pub mod event_repository;
pub mod table_manager;


pub use booking_repository::{BookingRepository, DynamoDbBookingRepository};
pub use event_repository::{DynamoDbEventRepository, EventRepository};
pub use table_manager::TableManager;
