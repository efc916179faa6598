// Services module - business logic layer

pub mod booking_service;

pub use booking_service::{BookingPolicy, BookingService};
