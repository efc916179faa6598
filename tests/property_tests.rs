use std::sync::Arc;

use booking_rs::models::{
    validate_identifier, validate_ticket_quantity, BookingStatus, EventStatus, ServiceError,
};
use booking_rs::services::{BookingPolicy, BookingService};
use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

mod common;
use common::*;

prop_compose! {
    fn arb_price()(cents in 1u32..100000) -> Decimal {
        Decimal::from_parts(cents, 0, 0, false, 2)
    }
}

prop_compose! {
    fn arb_policy()(atomic_inventory in any::<bool>(), restore_inventory_on_cancel in any::<bool>()) -> BookingPolicy {
        BookingPolicy { atomic_inventory, restore_inventory_on_cancel }
    }
}

fn arb_event_status() -> impl Strategy<Value = EventStatus> {
    prop_oneof![
        Just(EventStatus::Pending),
        Just(EventStatus::Approved),
        Just(EventStatus::Rejected),
    ]
}

struct Fixture {
    events: Arc<InMemoryEventRepository>,
    bookings: Arc<InMemoryBookingRepository>,
    service: BookingService,
}

fn fixture(policy: BookingPolicy) -> Fixture {
    let events = Arc::new(InMemoryEventRepository::default());
    let bookings = Arc::new(InMemoryBookingRepository::default());
    let service = BookingService::new(events.clone(), bookings.clone(), policy);
    Fixture {
        events,
        bookings,
        service,
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn test_booking_takes_exactly_its_quantity(
        price in arb_price(),
        remaining in 0u32..500,
        quantity in 1u32..500,
        policy in arb_policy(),
    ) {
        let f = fixture(policy);
        f.events.insert(event("E1", price, remaining, EventStatus::Approved));

        let result = block_on(f.service.create_booking("U1", "E1", quantity));

        if quantity <= remaining {
            let booking = result.unwrap();
            prop_assert_eq!(booking.total_price, price * Decimal::from(quantity));
            prop_assert_eq!(booking.quantity, quantity);
            prop_assert_eq!(booking.status, BookingStatus::Active);
            prop_assert_eq!(f.events.remaining_tickets("E1"), Some(remaining - quantity));
            prop_assert_eq!(f.bookings.len(), 1);
        } else {
            let is_insufficient = matches!(
                result,
                Err(ServiceError::InsufficientInventory { .. })
            );
            prop_assert!(is_insufficient);
            prop_assert_eq!(f.events.remaining_tickets("E1"), Some(remaining));
            prop_assert_eq!(f.bookings.len(), 0);
        }
    }

    #[test]
    fn test_only_approved_events_are_bookable(
        status in arb_event_status(),
        quantity in 1u32..10,
        policy in arb_policy(),
    ) {
        let f = fixture(policy);
        f.events.insert(event("E1", Decimal::from(20), 100, status));

        let result = block_on(f.service.create_booking("U1", "E1", quantity));

        if status == EventStatus::Approved {
            prop_assert!(result.is_ok());
        } else {
            let is_not_approved = matches!(result, Err(ServiceError::EventNotApproved { .. }));
            prop_assert!(is_not_approved);
            prop_assert_eq!(f.events.remaining_tickets("E1"), Some(100));
        }
    }

    #[test]
    fn test_sequential_bookings_never_oversell(
        remaining in 0u32..50,
        quantities in prop::collection::vec(1u32..10, 1..20),
        policy in arb_policy(),
    ) {
        let f = fixture(policy);
        f.events.insert(event("E1", Decimal::from(5), remaining, EventStatus::Approved));

        let booked: u32 = block_on(async {
            let mut booked = 0;
            for quantity in &quantities {
                if let Ok(booking) = f.service.create_booking("U1", "E1", *quantity).await {
                    booked += booking.quantity;
                }
            }
            booked
        });

        prop_assert!(booked <= remaining);
        prop_assert_eq!(f.events.remaining_tickets("E1"), Some(remaining - booked));
    }

    #[test]
    fn test_cancel_restores_only_when_enabled(
        remaining in 1u32..100,
        restore in any::<bool>(),
    ) {
        let f = fixture(BookingPolicy { atomic_inventory: false, restore_inventory_on_cancel: restore });
        f.events.insert(event("E1", Decimal::from(10), remaining, EventStatus::Approved));

        let booking = block_on(f.service.create_booking("U1", "E1", remaining)).unwrap();
        block_on(f.service.cancel_booking("U1", &booking.id)).unwrap();

        let expected = if restore { remaining } else { 0 };
        prop_assert_eq!(f.events.remaining_tickets("E1"), Some(expected));

        let stored = f.bookings.get(&booking.id).unwrap();
        prop_assert_eq!(stored.status, BookingStatus::Cancelled);
        prop_assert_eq!(stored.total_price, booking.total_price);

        let second = block_on(f.service.cancel_booking("U1", &booking.id));
        let is_already_cancelled = matches!(second, Err(ServiceError::BookingAlreadyCancelled { .. }));
        prop_assert!(is_already_cancelled);
        prop_assert_eq!(f.events.remaining_tickets("E1"), Some(expected));
    }

    #[test]
    fn test_listing_is_newest_first(offsets in prop::collection::vec(0i64..100_000, 0..15)) {
        let f = fixture(BookingPolicy::default());
        let now = Utc::now();
        for offset in &offsets {
            f.bookings.insert(booking_at("U1", "E1", 1, now - Duration::seconds(*offset)));
        }

        let listed = block_on(f.service.list_user_bookings("U1")).unwrap();

        prop_assert_eq!(listed.len(), offsets.len());
        for pair in listed.windows(2) {
            prop_assert!(pair[0].booked_at >= pair[1].booked_at);
        }
    }

    #[test]
    fn test_ticket_quantity_validation(quantity in any::<u32>()) {
        prop_assert_eq!(validate_ticket_quantity(quantity).is_ok(), quantity > 0);
    }

    #[test]
    fn test_identifier_validation(value in "[A-Za-z0-9-]{1,40}") {
        prop_assert!(validate_identifier("eventId", &value).is_ok());
        prop_assert!(validate_identifier("eventId", "   ").is_err());
    }
}
