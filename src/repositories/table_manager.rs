use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    Projection, ProjectionType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::booking_repository::USER_BOOKINGS_INDEX;
use super::dynamodb::TableContext;
use crate::models::{RepositoryError, RepositoryResult};

const MAX_ACTIVE_CHECKS: u32 = 30;
const ACTIVE_CHECK_INTERVAL: Duration = Duration::from_secs(10);

fn build_error(what: &str) -> impl FnOnce(BuildError) -> RepositoryError + '_ {
    move |e| RepositoryError::AwsSdk {
        message: format!("Failed to build {}: {}", what, e),
    }
}

fn string_attribute(name: &str) -> RepositoryResult<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(build_error("attribute definition"))
}

fn key(name: &str, key_type: KeyType) -> RepositoryResult<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(build_error("key schema"))
}

/// Manages DynamoDB table creation and configuration
pub struct TableManager {
    client: Arc<DynamoDbClient>,
    region: String,
}

impl TableManager {
    /// Create a new table manager
    pub fn new(client: Arc<DynamoDbClient>, region: String) -> Self {
        Self { client, region }
    }

    fn context(&self, table_name: &str) -> TableContext {
        TableContext::new(table_name.to_string(), self.region.clone())
    }

    /// Create the events table, keyed by `id`
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn create_events_table(&self, table_name: &str) -> RepositoryResult<()> {
        info!("Creating events table");

        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(());
        }

        let context = self.context(table_name);
        self.client
            .create_table()
            .table_name(table_name)
            .attribute_definitions(string_attribute("id")?)
            .key_schema(key("id", KeyType::Hash)?)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| context.map_sdk_error(e))?;

        info!("Table creation initiated, waiting for table to become active");
        self.wait_for_table_active(table_name).await?;
        info!("Events table created successfully");

        Ok(())
    }

    /// Create the bookings table with the per-user index ordered by `booked_at`
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn create_bookings_table(&self, table_name: &str) -> RepositoryResult<()> {
        info!("Creating bookings table");

        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(());
        }

        let attribute_definitions = vec![
            string_attribute("id")?,
            string_attribute("user_id")?,
            string_attribute("booked_at")?,
        ];

        let user_bookings_gsi = GlobalSecondaryIndex::builder()
            .index_name(USER_BOOKINGS_INDEX)
            .key_schema(key("user_id", KeyType::Hash)?)
            .key_schema(key("booked_at", KeyType::Range)?)
            .projection(
                Projection::builder()
                    .projection_type(ProjectionType::All)
                    .build(),
            )
            .build()
            .map_err(build_error("GSI"))?;

        let context = self.context(table_name);
        self.client
            .create_table()
            .table_name(table_name)
            .set_attribute_definitions(Some(attribute_definitions))
            .key_schema(key("id", KeyType::Hash)?)
            .global_secondary_indexes(user_bookings_gsi)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| context.map_sdk_error(e))?;

        info!("Table creation initiated, waiting for table to become active");
        self.wait_for_table_active(table_name).await?;
        info!("Bookings table created successfully");

        Ok(())
    }

    /// Check if a table exists
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        match self.client.describe_table().table_name(table_name).send().await {
            Ok(_) => {
                info!("Table {} exists", table_name);
                Ok(true)
            }
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .map(|service_error| service_error.is_resource_not_found_exception())
                    .unwrap_or(false);

                if not_found {
                    info!("Table {} does not exist", table_name);
                    Ok(false)
                } else {
                    error!("Error checking table existence: {}", e);
                    Err(self.context(table_name).map_sdk_error(e))
                }
            }
        }
    }

    /// Wait for a table to become active
    #[instrument(skip(self), fields(table_name = %table_name))]
    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        let mut attempts = 0;

        loop {
            match self.client.describe_table().table_name(table_name).send().await {
                Ok(response) => match response.table.and_then(|table| table.table_status) {
                    Some(TableStatus::Active) => {
                        info!("Table {} is now active", table_name);
                        return Ok(());
                    }
                    Some(status) => {
                        info!("Table {} status: {:?}, waiting...", table_name, status);
                    }
                    None => {
                        warn!("Table {} status unknown, waiting...", table_name);
                    }
                },
                Err(e) => {
                    error!("Error checking table status: {}", e);
                    return Err(self.context(table_name).map_sdk_error(e));
                }
            }

            attempts += 1;
            if attempts >= MAX_ACTIVE_CHECKS {
                error!("Timeout waiting for table {} to become active", table_name);
                return Err(RepositoryError::Timeout);
            }

            tokio::time::sleep(ACTIVE_CHECK_INTERVAL).await;
        }
    }

    /// Create both tables (convenience method)
    #[instrument(skip(self))]
    pub async fn create_all_tables(
        &self,
        events_table: &str,
        bookings_table: &str,
    ) -> RepositoryResult<()> {
        info!("Creating all tables");

        let (events_result, bookings_result) = tokio::join!(
            self.create_events_table(events_table),
            self.create_bookings_table(bookings_table)
        );

        events_result?;
        bookings_result?;

        info!("All tables created successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_schema_helpers() {
        let hash = key("id", KeyType::Hash).unwrap();
        assert_eq!(hash.attribute_name(), "id");
        assert_eq!(hash.key_type(), &KeyType::Hash);

        let attribute = string_attribute("booked_at").unwrap();
        assert_eq!(attribute.attribute_name(), "booked_at");
        assert_eq!(attribute.attribute_type(), &ScalarAttributeType::S);
    }

    #[test]
    fn test_table_manager_creation() {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        let client = Arc::new(aws_sdk_dynamodb::Client::from_conf(config));
        let manager = TableManager::new(client, "us-east-1".to_string());

        assert_eq!(manager.context("Bookings").table_name, "Bookings");
    }
}
