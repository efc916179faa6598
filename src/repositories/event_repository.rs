use async_trait::async_trait;
use aws_sdk_dynamodb::operation::update_item::builders::UpdateItemFluentBuilder;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::dynamodb::{
    format_timestamp, get_decimal, get_parsed, get_string, get_timestamp,
    is_conditional_check_failed, record_response, Item, TableContext,
};
use crate::models::{Event, EventStatus, RepositoryError, RepositoryResult};
use crate::observability::DatabaseTimer;

/// Data access for events. Events are owned by another service; this
/// side reads them and moves their ticket inventory.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Find an event by its ID
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Event>>;

    /// Overwrite the ticket counter of an existing event (last write wins).
    /// Every other attribute of the event is left as stored.
    async fn update_remaining_tickets(&self, id: &str, remaining_tickets: u32) -> RepositoryResult<()>;

    /// Atomically take `quantity` tickets from an approved event.
    /// Returns the updated event, or `None` when the event is missing,
    /// not approved, or short of tickets.
    async fn reserve_tickets(&self, id: &str, quantity: u32) -> RepositoryResult<Option<Event>>;

    /// Atomically credit `quantity` tickets back to an event
    async fn release_tickets(&self, id: &str, quantity: u32) -> RepositoryResult<()>;
}

/// DynamoDB implementation of the EventRepository trait
pub struct DynamoDbEventRepository {
    client: Arc<DynamoDbClient>,
    context: TableContext,
}

impl DynamoDbEventRepository {
    /// Create a new DynamoDB event repository
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            context: TableContext::new(table_name, region),
        }
    }

    /// Time every call into the database metrics
    pub fn with_tracing(mut self, db_tracing: DatabaseTimer) -> Self {
        self.context = self.context.with_tracing(db_tracing);
        self
    }

    /// Get the table name (for testing)
    pub fn table_name(&self) -> &str {
        &self.context.table_name
    }

    /// Counter-only update used by the read-modify-write booking path
    pub(crate) fn remaining_tickets_update(
        &self,
        id: &str,
        remaining_tickets: u32,
    ) -> UpdateItemFluentBuilder {
        self.client
            .update_item()
            .table_name(&self.context.table_name)
            .key("id", AttributeValue::S(id.to_string()))
            .update_expression("SET remaining_tickets = :remaining")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_values(
                ":remaining",
                AttributeValue::N(remaining_tickets.to_string()),
            )
    }

    /// Convert an Event struct to DynamoDB attribute values
    pub fn event_to_item(&self, event: &Event) -> Item {
        let mut item = Item::new();

        item.insert("id".to_string(), AttributeValue::S(event.id.clone()));
        item.insert("title".to_string(), AttributeValue::S(event.title.clone()));
        item.insert(
            "date".to_string(),
            AttributeValue::S(format_timestamp(&event.date)),
        );
        item.insert(
            "location".to_string(),
            AttributeValue::S(event.location.clone()),
        );
        item.insert(
            "price".to_string(),
            AttributeValue::N(event.price.to_string()),
        );
        item.insert(
            "remaining_tickets".to_string(),
            AttributeValue::N(event.remaining_tickets.to_string()),
        );
        item.insert(
            "status".to_string(),
            AttributeValue::S(event.status.to_string()),
        );

        item
    }

    /// Convert DynamoDB item to Event struct
    pub fn item_to_event(&self, item: &Item) -> RepositoryResult<Event> {
        Ok(Event {
            id: get_string(item, "id")?,
            title: get_string(item, "title")?,
            date: get_timestamp(item, "date")?,
            location: get_string(item, "location")?,
            price: get_decimal(item, "price")?,
            remaining_tickets: get_parsed(item, "remaining_tickets")?,
            status: get_parsed::<EventStatus>(item, "status")?,
        })
    }
}

#[async_trait]
impl EventRepository for DynamoDbEventRepository {
    #[instrument(skip(self), fields(table = %self.context.table_name, id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Event>> {
        info!("Finding event by ID");

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
                let event = self.item_to_event(&item)?;
                info!("Event found");
                Ok(Some(event))
            }
            None => {
                info!("Event not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.context.table_name, id = %id, remaining = remaining_tickets))]
    async fn update_remaining_tickets(&self, id: &str, remaining_tickets: u32) -> RepositoryResult<()> {
        info!("Updating remaining tickets");

        self.context
            .run("UpdateItem", async {
                let result = self
                    .remaining_tickets_update(id, remaining_tickets)
                    .send()
                    .await;

                record_response("UpdateItem", &result);
                match result {
                    Ok(_) => Ok(()),
                    Err(e) if is_conditional_check_failed(&e) => Err(RepositoryError::NotFound),
                    Err(e) => Err(self.context.map_sdk_error(e)),
                }
            })
            .await?;

        info!("Remaining tickets updated");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.context.table_name, id = %id, quantity = quantity))]
    async fn reserve_tickets(&self, id: &str, quantity: u32) -> RepositoryResult<Option<Event>> {
        info!("Reserving tickets");

        let response = self
            .context
            .run("UpdateItem", async {
                let result = self
                    .client
                    .update_item()
                    .table_name(&self.context.table_name)
                    .key("id", AttributeValue::S(id.to_string()))
                    .update_expression("SET remaining_tickets = remaining_tickets - :quantity")
                    .condition_expression(
                        "attribute_exists(id) AND #status = :approved AND remaining_tickets >= :quantity",
                    )
                    .expression_attribute_names("#status", "status")
                    .expression_attribute_values(
                        ":quantity",
                        AttributeValue::N(quantity.to_string()),
                    )
                    .expression_attribute_values(
                        ":approved",
                        AttributeValue::S(EventStatus::Approved.to_string()),
                    )
                    .return_values(ReturnValue::AllNew)
                    .send()
                    .await;

                record_response("UpdateItem", &result);
                match result {
                    Ok(output) => Ok(Some(output)),
                    Err(e) if is_conditional_check_failed(&e) => Ok(None),
                    Err(e) => Err(self.context.map_sdk_error(e)),
                }
            })
            .await?;

        match response.and_then(|output| output.attributes) {
            Some(attributes) => {
                let event = self.item_to_event(&attributes)?;
                info!(remaining = event.remaining_tickets, "Tickets reserved");
                Ok(Some(event))
            }
            None => {
                warn!("Ticket reservation condition failed");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.context.table_name, id = %id, quantity = quantity))]
    async fn release_tickets(&self, id: &str, quantity: u32) -> RepositoryResult<()> {
        info!("Releasing tickets");

        self.context
            .run("UpdateItem", async {
                let result = self
                    .client
                    .update_item()
                    .table_name(&self.context.table_name)
                    .key("id", AttributeValue::S(id.to_string()))
                    .update_expression("ADD remaining_tickets :quantity")
                    .condition_expression("attribute_exists(id)")
                    .expression_attribute_values(
                        ":quantity",
                        AttributeValue::N(quantity.to_string()),
                    )
                    .send()
                    .await;

                record_response("UpdateItem", &result);
                match result {
                    Ok(_) => Ok(()),
                    Err(e) if is_conditional_check_failed(&e) => Err(RepositoryError::NotFound),
                    Err(e) => Err(self.context.map_sdk_error(e)),
                }
            })
            .await?;

        info!("Tickets released");
        Ok(())
    }
}
