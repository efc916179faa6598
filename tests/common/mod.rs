#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use booking_rs::handlers::{create_router, RequestLimits};
use booking_rs::models::{
    Booking, BookingStatus, Event, EventStatus, RepositoryError, RepositoryResult,
};
use booking_rs::observability::Metrics;
use booking_rs::repositories::{BookingRepository, EventRepository};
use booking_rs::services::{BookingPolicy, BookingService};
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use tokio::net::TcpListener;

/// Event store backed by a map, with the same conditional semantics as DynamoDB
#[derive(Default)]
pub struct InMemoryEventRepository {
    events: Mutex<HashMap<String, Event>>,
}

impl InMemoryEventRepository {
    pub fn insert(&self, event: Event) {
        self.events.lock().unwrap().insert(event.id.clone(), event);
    }

    pub fn remove(&self, id: &str) {
        self.events.lock().unwrap().remove(id);
    }

    pub fn remaining_tickets(&self, id: &str) -> Option<u32> {
        self.events
            .lock()
            .unwrap()
            .get(id)
            .map(|event| event.remaining_tickets)
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Event>> {
        Ok(self.events.lock().unwrap().get(id).cloned())
    }

    async fn update_remaining_tickets(&self, id: &str, remaining_tickets: u32) -> RepositoryResult<()> {
        match self.events.lock().unwrap().get_mut(id) {
            Some(event) => {
                event.remaining_tickets = remaining_tickets;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn reserve_tickets(&self, id: &str, quantity: u32) -> RepositoryResult<Option<Event>> {
        let mut events = self.events.lock().unwrap();
        let Some(event) = events.get_mut(id) else {
            return Ok(None);
        };
        if event.is_bookable() && event.take_tickets(quantity) {
            Ok(Some(event.clone()))
        } else {
            Ok(None)
        }
    }

    async fn release_tickets(&self, id: &str, quantity: u32) -> RepositoryResult<()> {
        let mut events = self.events.lock().unwrap();
        match events.get_mut(id) {
            Some(event) => {
                event.remaining_tickets += quantity;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: Mutex<HashMap<String, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn insert(&self, booking: Booking) {
        self.bookings
            .lock()
            .unwrap()
            .insert(booking.id.clone(), booking);
    }

    pub fn get(&self, id: &str) -> Option<Booking> {
        self.bookings.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.bookings.lock().unwrap().len()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Booking>> {
        Ok(self.get(id))
    }

    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .lock()
            .unwrap()
            .values()
            .filter(|booking| booking.user == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
        Ok(bookings)
    }

    async fn save(&self, booking: Booking) -> RepositoryResult<Booking> {
        self.insert(booking.clone());
        Ok(booking)
    }
}

pub fn event(id: &str, price: Decimal, remaining_tickets: u32, status: EventStatus) -> Event {
    Event {
        id: id.to_string(),
        title: format!("Event {}", id),
        date: Utc::now() + chrono::Duration::days(30),
        location: "Main Hall".to_string(),
        price,
        remaining_tickets,
        status,
    }
}

pub fn booking_at(user: &str, event_id: &str, quantity: u32, booked_at: DateTime<Utc>) -> Booking {
    let mut booking = Booking::new(
        user.to_string(),
        event_id.to_string(),
        quantity,
        Decimal::from(quantity) * Decimal::from(10),
    );
    booking.booked_at = booked_at;
    booking
}

/// The real router served on an ephemeral port over in-memory storage
pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub events: Arc<InMemoryEventRepository>,
    pub bookings: Arc<InMemoryBookingRepository>,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        Self::with_policy(BookingPolicy::default()).await
    }

    pub async fn with_policy(policy: BookingPolicy) -> Self {
        let events = Arc::new(InMemoryEventRepository::default());
        let bookings = Arc::new(InMemoryBookingRepository::default());
        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));

        let service = Arc::new(BookingService::new_with_metrics(
            events.clone(),
            bookings.clone(),
            policy,
            metrics.clone(),
        ));

        let app = create_router(
            metrics,
            service,
            None,
            RequestLimits {
                max_request_size: 1024 * 1024,
            },
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            client: Client::new(),
            base_url,
            events,
            bookings,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn seed_event(&self, id: &str, price: Decimal, remaining_tickets: u32, status: EventStatus) {
        self.events.insert(event(id, price, remaining_tickets, status));
    }

    pub async fn create_booking(&self, user: &str, event_id: &str, quantity: i64) -> reqwest::Response {
        self.client
            .post(self.url("/api/bookings"))
            .header("x-user-id", user)
            .json(&serde_json::json!({ "eventId": event_id, "quantity": quantity }))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn cancel_booking(&self, user: &str, booking_id: &str) -> reqwest::Response {
        self.client
            .put(self.url(&format!("/api/bookings/{}/cancel", booking_id)))
            .header("x-user-id", user)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub fn booking_status(&self, booking_id: &str) -> Option<BookingStatus> {
        self.bookings.get(booking_id).map(|booking| booking.status)
    }
}
