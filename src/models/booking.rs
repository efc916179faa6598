use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BookingStatus, EventSummary};

/// A user's reservation of some tickets for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user: String,
    pub event: String,
    pub quantity: u32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub booked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Request body for creating a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub event_id: String,
    pub quantity: u32,
}

/// Booking with its event projection, as returned by list and get
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub id: String,
    pub user: String,
    pub event_id: String,
    /// `None` when the referenced event no longer exists
    pub event: Option<EventSummary>,
    pub quantity: u32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub booked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Create a new active booking. `total_price` is fixed here and never recomputed.
    pub fn new(user: String, event: String, quantity: u32, total_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user,
            event,
            quantity,
            total_price,
            status: BookingStatus::Active,
            booked_at: Utc::now(),
            cancelled_at: None,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user == user_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }

    /// Move the booking to `Cancelled`. Returns false if it already was.
    pub fn cancel(&mut self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
        true
    }

    pub fn with_event(self, event: Option<EventSummary>) -> BookingDetails {
        BookingDetails {
            id: self.id,
            user: self.user,
            event_id: self.event,
            event,
            quantity: self.quantity,
            total_price: self.total_price,
            status: self.status,
            booked_at: self.booked_at,
            cancelled_at: self.cancelled_at,
        }
    }
}
