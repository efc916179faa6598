use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::models::{
    validate_identifier, validate_ticket_quantity, Booking, BookingDetails, Event, EventSummary,
    RepositoryError, ServiceError, ServiceResult,
};
use crate::observability::{BookingOperationTracer, Metrics};
use crate::repositories::{BookingRepository, EventRepository};

/// Switches for the inventory behaviour of the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingPolicy {
    /// Reserve tickets with a conditional update instead of read-modify-write
    pub atomic_inventory: bool,
    /// Credit the booked quantity back to the event on cancellation
    pub restore_inventory_on_cancel: bool,
}

/// Service for creating, reading and cancelling bookings
pub struct BookingService {
    event_repository: Arc<dyn EventRepository>,
    booking_repository: Arc<dyn BookingRepository>,
    policy: BookingPolicy,
    metrics: Option<Arc<Metrics>>,
    business_tracing: Option<BookingOperationTracer>,
}

impl BookingService {
    /// Create a new BookingService
    pub fn new(
        event_repository: Arc<dyn EventRepository>,
        booking_repository: Arc<dyn BookingRepository>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            event_repository,
            booking_repository,
            policy,
            metrics: None,
            business_tracing: None,
        }
    }

    /// Create a new BookingService that reports into the given metrics
    pub fn new_with_metrics(
        event_repository: Arc<dyn EventRepository>,
        booking_repository: Arc<dyn BookingRepository>,
        policy: BookingPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            event_repository,
            booking_repository,
            policy,
            business_tracing: Some(BookingOperationTracer::new(metrics.clone())),
            metrics: Some(metrics),
        }
    }

    pub fn policy(&self) -> BookingPolicy {
        self.policy
    }

    /// Book `quantity` tickets of an approved event for the requester
    #[instrument(skip(self), fields(requester_id = %requester_id, event_id = %event_id, quantity = quantity))]
    pub async fn create_booking(
        &self,
        requester_id: &str,
        event_id: &str,
        quantity: u32,
    ) -> ServiceResult<Booking> {
        self.traced("create_booking", requester_id, None, async {
            info!("Creating booking");

            validate_identifier("requesterId", requester_id)?;
            validate_identifier("eventId", event_id)?;
            validate_ticket_quantity(quantity)?;

            let booking = if self.policy.atomic_inventory {
                self.create_with_reservation(requester_id, event_id, quantity)
                    .await?
            } else {
                self.create_with_read_modify_write(requester_id, event_id, quantity)
                    .await?
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_tickets_reserved(quantity);
            }

            info!(booking_id = %booking.id, total_price = %booking.total_price, "Booking created");
            Ok(booking)
        })
        .await
    }

    /// All bookings of the requester, newest first, with their events attached
    #[instrument(skip(self), fields(requester_id = %requester_id))]
    pub async fn list_user_bookings(&self, requester_id: &str) -> ServiceResult<Vec<BookingDetails>> {
        self.traced("list_user_bookings", requester_id, None, async {
            info!("Listing bookings for user");

            validate_identifier("requesterId", requester_id)?;

            let mut bookings = self.booking_repository.find_by_user(requester_id).await?;
            bookings.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));

            let mut summaries: HashMap<String, Option<EventSummary>> = HashMap::new();
            let mut details = Vec::with_capacity(bookings.len());

            for booking in bookings {
                let summary = match summaries.get(&booking.event) {
                    Some(summary) => summary.clone(),
                    None => {
                        let summary = self.event_summary(&booking.event).await?;
                        summaries.insert(booking.event.clone(), summary.clone());
                        summary
                    }
                };
                details.push(booking.with_event(summary));
            }

            info!("Found {} bookings", details.len());
            Ok(details)
        })
        .await
    }

    /// A single booking of the requester, with its event attached
    #[instrument(skip(self), fields(requester_id = %requester_id, booking_id = %booking_id))]
    pub async fn get_booking(
        &self,
        requester_id: &str,
        booking_id: &str,
    ) -> ServiceResult<BookingDetails> {
        self.traced("get_booking", requester_id, Some(booking_id), async {
            info!("Getting booking");

            let booking = self.load_owned_booking(requester_id, booking_id, "view").await?;
            let summary = self.event_summary(&booking.event).await?;

            Ok(booking.with_event(summary))
        })
        .await
    }

    /// Cancel an active booking of the requester
    #[instrument(skip(self), fields(requester_id = %requester_id, booking_id = %booking_id))]
    pub async fn cancel_booking(&self, requester_id: &str, booking_id: &str) -> ServiceResult<()> {
        self.traced("cancel_booking", requester_id, Some(booking_id), async {
            info!("Cancelling booking");

            let mut booking = self
                .load_owned_booking(requester_id, booking_id, "cancel")
                .await?;

            if !booking.cancel() {
                return Err(ServiceError::BookingAlreadyCancelled {
                    id: booking.id.clone(),
                });
            }

            let booking = self.booking_repository.save(booking).await?;
            info!(event_id = %booking.event, quantity = booking.quantity, "Booking cancelled");

            if self.policy.restore_inventory_on_cancel {
                self.restore_inventory(&booking).await;
            }

            Ok(())
        })
        .await
    }

    /// Read-check-decrement-save. Concurrent requests can oversell.
    async fn create_with_read_modify_write(
        &self,
        requester_id: &str,
        event_id: &str,
        quantity: u32,
    ) -> ServiceResult<Booking> {
        let mut event = self.load_event(event_id).await?;
        Self::check_bookable(&event, quantity)?;

        let total_price = event.price_for(quantity);
        if !event.take_tickets(quantity) {
            return Err(ServiceError::InsufficientInventory {
                requested: quantity,
                available: event.remaining_tickets,
            });
        }

        self.event_repository
            .update_remaining_tickets(&event.id, event.remaining_tickets)
            .await?;
        info!(remaining = event.remaining_tickets, "Event inventory updated");

        let booking = Booking::new(
            requester_id.to_string(),
            event_id.to_string(),
            quantity,
            total_price,
        );
        Ok(self.booking_repository.save(booking).await?)
    }

    /// Conditional reservation, released again if the booking cannot be stored
    async fn create_with_reservation(
        &self,
        requester_id: &str,
        event_id: &str,
        quantity: u32,
    ) -> ServiceResult<Booking> {
        let event = match self
            .event_repository
            .reserve_tickets(event_id, quantity)
            .await?
        {
            Some(event) => event,
            None => return Err(self.classify_failed_reservation(event_id, quantity).await),
        };

        let booking = Booking::new(
            requester_id.to_string(),
            event_id.to_string(),
            quantity,
            event.price_for(quantity),
        );

        match self.booking_repository.save(booking).await {
            Ok(booking) => Ok(booking),
            Err(save_error) => {
                warn!(error = %save_error, "Booking save failed, releasing reserved tickets");
                if let Err(release_error) = self
                    .event_repository
                    .release_tickets(event_id, quantity)
                    .await
                {
                    error!(error = %release_error, "Failed to release reserved tickets");
                }
                Err(save_error.into())
            }
        }
    }

    /// Work out why a conditional reservation was refused
    async fn classify_failed_reservation(&self, event_id: &str, quantity: u32) -> ServiceError {
        let event = match self.load_event(event_id).await {
            Ok(event) => event,
            Err(e) => return e,
        };

        match Self::check_bookable(&event, quantity) {
            Err(e) => e,
            // Another booking took the tickets between the update and this read
            Ok(()) => ServiceError::InsufficientInventory {
                requested: quantity,
                available: event.remaining_tickets,
            },
        }
    }

    fn check_bookable(event: &Event, quantity: u32) -> ServiceResult<()> {
        if !event.is_bookable() {
            return Err(ServiceError::EventNotApproved {
                event_id: event.id.clone(),
                status: event.status.to_string(),
            });
        }

        if !event.has_tickets(quantity) {
            return Err(ServiceError::InsufficientInventory {
                requested: quantity,
                available: event.remaining_tickets,
            });
        }

        Ok(())
    }

    async fn load_event(&self, event_id: &str) -> ServiceResult<Event> {
        self.event_repository
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| ServiceError::EventNotFound {
                id: event_id.to_string(),
            })
    }

    async fn event_summary(&self, event_id: &str) -> ServiceResult<Option<EventSummary>> {
        let summary = self
            .event_repository
            .find_by_id(event_id)
            .await?
            .map(|event| event.summary());

        if summary.is_none() {
            warn!(event_id = %event_id, "Booked event no longer exists");
        }
        Ok(summary)
    }

    async fn load_owned_booking(
        &self,
        requester_id: &str,
        booking_id: &str,
        action: &'static str,
    ) -> ServiceResult<Booking> {
        validate_identifier("requesterId", requester_id)?;
        validate_identifier("bookingId", booking_id)?;

        let booking = self
            .booking_repository
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| ServiceError::BookingNotFound {
                id: booking_id.to_string(),
            })?;

        if !booking.is_owned_by(requester_id) {
            warn!(owner = %booking.user, "Requester does not own booking");
            return Err(ServiceError::Forbidden { action });
        }

        Ok(booking)
    }

    /// The cancellation is already stored, so failures here are logged only
    async fn restore_inventory(&self, booking: &Booking) {
        match self
            .event_repository
            .release_tickets(&booking.event, booking.quantity)
            .await
        {
            Ok(()) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_tickets_released(booking.quantity);
                }
                info!(event_id = %booking.event, quantity = booking.quantity, "Inventory restored");
            }
            Err(RepositoryError::NotFound) => {
                warn!(event_id = %booking.event, "Event missing, inventory not restored");
            }
            Err(e) => {
                error!(event_id = %booking.event, error = %e, "Failed to restore inventory");
            }
        }
    }

    async fn traced<F, T>(
        &self,
        operation: &str,
        requester_id: &str,
        booking_id: Option<&str>,
        future: F,
    ) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        match &self.business_tracing {
            Some(tracing) => {
                tracing
                    .trace(operation, requester_id, booking_id, future)
                    .await
            }
            None => future.await,
        }
    }
}
