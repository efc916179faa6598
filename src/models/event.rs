use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::EventStatus;

/// A ticketed occurrence. Events are created and moderated by another
/// service; bookings only read them and move `remaining_tickets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub price: Decimal,
    pub remaining_tickets: u32,
    pub status: EventStatus,
}

/// Read-only projection attached to bookings when they are listed or fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub price: Decimal,
}

impl Event {
    pub fn is_bookable(&self) -> bool {
        self.status.is_bookable()
    }

    pub fn has_tickets(&self, quantity: u32) -> bool {
        self.remaining_tickets >= quantity
    }

    /// Price for `quantity` tickets at the current event price
    pub fn price_for(&self, quantity: u32) -> Decimal {
        self.price * Decimal::from(quantity)
    }

    /// Take `quantity` tickets out of the inventory.
    /// Returns false and leaves the counter untouched if there are not enough.
    pub fn take_tickets(&mut self, quantity: u32) -> bool {
        match self.remaining_tickets.checked_sub(quantity) {
            Some(remaining) => {
                self.remaining_tickets = remaining;
                true
            }
            None => false,
        }
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            date: self.date,
            location: self.location.clone(),
            price: self.price,
        }
    }
}
