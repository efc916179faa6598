use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::RequestId;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Error as DynamoDbError;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use tracing::{error, Instrument};

use crate::models::{RepositoryError, RepositoryResult};
use crate::observability::DatabaseTimer;

pub(crate) type Item = HashMap<String, AttributeValue>;

/// Create a DynamoDB subsegment span with proper X-Ray attributes
pub(crate) fn dynamodb_span(operation: &str, table_name: &str, region: &str) -> tracing::Span {
    tracing::info_span!(
        "DynamoDB",
        // AWS X-Ray specific attributes
        "aws.service" = "DynamoDB",
        "aws.operation" = operation,
        "aws.region" = %region,
        "aws.dynamodb.table_name" = %table_name,
        "aws.request_id" = tracing::field::Empty,
        "aws.agent" = "rust-aws-sdk",

        // Resource identification for X-Ray
        "aws.remote.service" = "AWS::DynamoDB",
        "aws.remote.operation" = operation,
        "aws.remote.resource.type" = "AWS::DynamoDB::Table",
        "aws.remote.resource.identifier" = %table_name,

        // OpenTelemetry semantic conventions
        "otel.kind" = "client",
        "otel.name" = format!("DynamoDB.{}", operation),
        "rpc.system" = "aws-api",
        "rpc.service" = "AmazonDynamoDBv2",
        "rpc.method" = operation,
        "http.status_code" = tracing::field::Empty,

        "db.system" = "dynamodb",
        "db.name" = %table_name,
        "db.operation" = operation,
        "component" = "aws-sdk-dynamodb",
    )
}

/// Table-scoped context shared by the DynamoDB repositories: span
/// creation, optional metrics timing and SDK error mapping.
#[derive(Clone)]
pub(crate) struct TableContext {
    pub table_name: String,
    pub region: String,
    db_tracing: Option<DatabaseTimer>,
}

impl TableContext {
    pub fn new(table_name: String, region: String) -> Self {
        Self {
            table_name,
            region,
            db_tracing: None,
        }
    }

    pub fn with_tracing(mut self, db_tracing: DatabaseTimer) -> Self {
        self.db_tracing = Some(db_tracing);
        self
    }

    /// Run `future` inside a DynamoDB span, timing it when metrics are attached
    pub async fn run<F, T>(&self, operation: &str, future: F) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        let span = dynamodb_span(operation, &self.table_name, &self.region);
        match &self.db_tracing {
            Some(db_tracing) => {
                db_tracing
                    .time(operation, &self.table_name, future)
                    .instrument(span)
                    .await
            }
            None => future.instrument(span).await,
        }
    }

    /// Convert an SDK error into a RepositoryError, keeping transport
    /// failures apart from service errors
    pub fn map_sdk_error<E, R>(&self, error: SdkError<E, R>) -> RepositoryError
    where
        DynamoDbError: From<SdkError<E, R>>,
    {
        match &error {
            SdkError::TimeoutError(_) => return RepositoryError::Timeout,
            SdkError::DispatchFailure(_) => return RepositoryError::ConnectionFailed,
            _ => {}
        }
        self.map_dynamodb_error(error.into())
    }

    /// Convert DynamoDB error to RepositoryError
    pub fn map_dynamodb_error(&self, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error: {:?}", error);

        match error {
            DynamoDbError::ResourceNotFoundException(_) => RepositoryError::TableNotFound {
                table_name: self.table_name.clone(),
            },
            DynamoDbError::ProvisionedThroughputExceededException(_)
            | DynamoDbError::RequestLimitExceeded(_) => RepositoryError::RateLimitExceeded,
            other => RepositoryError::AwsSdk {
                message: other.to_string(),
            },
        }
    }
}

/// Record the response attributes on the current DynamoDB span
pub(crate) fn record_response<O: RequestId, E: std::fmt::Display>(
    operation: &str,
    result: &Result<O, E>,
) {
    match result {
        Ok(output) => {
            tracing::Span::current().record("http.status_code", 200);
            if let Some(request_id) = output.request_id() {
                tracing::Span::current().record("aws.request_id", request_id);
            }
        }
        Err(e) => {
            tracing::Span::current().record("http.status_code", 400);
            error!("DynamoDB {} failed: {}", operation, e);
        }
    }
}

/// True when the SDK error is a failed condition expression
pub(crate) fn is_conditional_check_failed<E, R>(error: &SdkError<E, R>) -> bool
where
    E: ConditionalCheck,
{
    error
        .as_service_error()
        .map(ConditionalCheck::is_conditional_check_failed)
        .unwrap_or(false)
}

/// Operation errors that can report a failed condition expression
pub(crate) trait ConditionalCheck {
    fn is_conditional_check_failed(&self) -> bool;
}

impl ConditionalCheck for aws_sdk_dynamodb::operation::put_item::PutItemError {
    fn is_conditional_check_failed(&self) -> bool {
        self.is_conditional_check_failed_exception()
    }
}

impl ConditionalCheck for aws_sdk_dynamodb::operation::update_item::UpdateItemError {
    fn is_conditional_check_failed(&self) -> bool {
        self.is_conditional_check_failed_exception()
    }
}

/// Timestamps are stored at fixed width so they sort lexicographically
pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn get_string(item: &Item, key: &str) -> RepositoryResult<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| RepositoryError::InvalidItem {
            message: format!("Missing {}", key),
        })
}

pub(crate) fn get_parsed<T: FromStr>(item: &Item, key: &str) -> RepositoryResult<T> {
    item.get(key)
        .and_then(|v| v.as_s().ok().or_else(|| v.as_n().ok()))
        .and_then(|s| s.parse::<T>().ok())
        .ok_or_else(|| RepositoryError::InvalidItem {
            message: format!("Invalid {}", key),
        })
}

pub(crate) fn get_decimal(item: &Item, key: &str) -> RepositoryResult<Decimal> {
    get_parsed(item, key)
}

pub(crate) fn get_timestamp(item: &Item, key: &str) -> RepositoryResult<DateTime<Utc>> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RepositoryError::InvalidItem {
            message: format!("Invalid {}", key),
        })
}
