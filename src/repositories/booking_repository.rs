use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::dynamodb::{
    format_timestamp, get_decimal, get_parsed, get_string, get_timestamp, record_response, Item,
    TableContext,
};
use crate::models::{Booking, BookingStatus, RepositoryResult};
use crate::observability::DatabaseTimer;

pub const USER_BOOKINGS_INDEX: &str = "UserBookingsIndex";

/// Data access for bookings
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Find a booking by its ID
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Booking>>;

    /// All bookings of a user, newest `booked_at` first
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Booking>>;

    /// Save a booking (create or replace)
    async fn save(&self, booking: Booking) -> RepositoryResult<Booking>;
}

/// DynamoDB implementation of the BookingRepository trait
pub struct DynamoDbBookingRepository {
    client: Arc<DynamoDbClient>,
    context: TableContext,
    user_index: String,
}

impl DynamoDbBookingRepository {
    /// Create a new DynamoDB booking repository
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            context: TableContext::new(table_name, region),
            user_index: USER_BOOKINGS_INDEX.to_string(),
        }
    }

    pub fn with_tracing(mut self, db_tracing: DatabaseTimer) -> Self {
        self.context = self.context.with_tracing(db_tracing);
        self
    }

    /// Get the table name (for testing)
    pub fn table_name(&self) -> &str {
        &self.context.table_name
    }

    /// Get the user index name (for testing)
    pub fn user_index(&self) -> &str {
        &self.user_index
    }

    /// Convert a Booking struct to DynamoDB attribute values
    pub fn booking_to_item(&self, booking: &Booking) -> Item {
        let mut item = Item::new();

        item.insert("id".to_string(), AttributeValue::S(booking.id.clone()));
        item.insert(
            "user_id".to_string(),
            AttributeValue::S(booking.user.clone()),
        );
        item.insert(
            "event_id".to_string(),
            AttributeValue::S(booking.event.clone()),
        );
        item.insert(
            "quantity".to_string(),
            AttributeValue::N(booking.quantity.to_string()),
        );
        item.insert(
            "total_price".to_string(),
            AttributeValue::N(booking.total_price.to_string()),
        );
        item.insert(
            "status".to_string(),
            AttributeValue::S(booking.status.to_string()),
        );
        item.insert(
            "booked_at".to_string(),
            AttributeValue::S(format_timestamp(&booking.booked_at)),
        );
        if let Some(ref cancelled_at) = booking.cancelled_at {
            item.insert(
                "cancelled_at".to_string(),
                AttributeValue::S(format_timestamp(cancelled_at)),
            );
        }

        item
    }

    /// Convert a page of items; one corrupt item fails the whole page
    pub fn items_to_bookings(&self, items: Vec<Item>) -> RepositoryResult<Vec<Booking>> {
        items
            .iter()
            .map(|item| {
                self.item_to_booking(item).map_err(|e| {
                    warn!("Failed to parse booking item: {}", e);
                    e
                })
            })
            .collect()
    }

    /// Convert DynamoDB item to Booking struct
    pub fn item_to_booking(&self, item: &Item) -> RepositoryResult<Booking> {
        let cancelled_at = match item.get("cancelled_at") {
            Some(_) => Some(get_timestamp(item, "cancelled_at")?),
            None => None,
        };

        Ok(Booking {
            id: get_string(item, "id")?,
            user: get_string(item, "user_id")?,
            event: get_string(item, "event_id")?,
            quantity: get_parsed(item, "quantity")?,
            total_price: get_decimal(item, "total_price")?,
            status: get_parsed::<BookingStatus>(item, "status")?,
            booked_at: get_timestamp(item, "booked_at")?,
            cancelled_at,
        })
    }
}

#[async_trait]
impl BookingRepository for DynamoDbBookingRepository {
    #[instrument(skip(self), fields(table = %self.context.table_name, id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Booking>> {
        info!("Finding booking by ID");

        let response = self
            .context
            .run("GetItem", async {
                let result = self
                    .client
                    .get_item()
                    .table_name(&self.context.table_name)
                    .key("id", AttributeValue::S(id.to_string()))
                    .send()
                    .await;

                record_response("GetItem", &result);
                result.map_err(|e| self.context.map_sdk_error(e))
            })
            .await?;

        match response.item {
            Some(item) => {
                let booking = self.item_to_booking(&item)?;
                info!("Booking found");
                Ok(Some(booking))
            }
            None => {
                info!("Booking not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.context.table_name, user_id = %user_id))]
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Booking>> {
        info!("Finding bookings by user using GSI");

        let mut bookings = Vec::new();
        let mut exclusive_start_key: Option<Item> = None;

        loop {
            let response = self
                .context
                .run("Query", async {
                    let result = self
                        .client
                        .query()
                        .table_name(&self.context.table_name)
                        .index_name(&self.user_index)
                        .key_condition_expression("user_id = :user_id")
                        .expression_attribute_values(
                            ":user_id",
                            AttributeValue::S(user_id.to_string()),
                        )
                        .scan_index_forward(false)
                        .set_exclusive_start_key(exclusive_start_key.clone())
                        .send()
                        .await;

                    record_response("Query", &result);
                    result.map_err(|e| self.context.map_sdk_error(e))
                })
                .await?;

            bookings.extend(self.items_to_bookings(response.items.unwrap_or_default())?);

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        info!("Found {} bookings", bookings.len());
        Ok(bookings)
    }

    #[instrument(skip(self, booking), fields(table = %self.context.table_name, id = %booking.id))]
    async fn save(&self, booking: Booking) -> RepositoryResult<Booking> {
        info!("Saving booking");

        let item = self.booking_to_item(&booking);

        self.context
            .run("PutItem", async {
                let result = self
                    .client
                    .put_item()
                    .table_name(&self.context.table_name)
                    .set_item(Some(item))
                    .send()
                    .await;

                record_response("PutItem", &result);
                result.map_err(|e| self.context.map_sdk_error(e))
            })
            .await?;

        info!("Booking saved");
        Ok(booking)
    }
}
