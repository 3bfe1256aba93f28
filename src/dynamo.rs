use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::types::{GlobalSecondaryIndex, ProvisionedThroughput, TableStatus};
use aws_types::SdkConfig;

use crate::bootstrap::{Capacity, Error, Item, Provisioned, TableBackend};
use crate::resources::TableDescriptor;

const ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const ACTIVE_POLL_ATTEMPTS: u32 = 60;

/// [`TableBackend`] over a real or emulated DynamoDB endpoint.
pub struct DynamoTables {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoTables {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        return Self {
            client: aws_sdk_dynamodb::Client::new(sdk_config),
        };
    }
}

fn service_error<E, R>(resource: &str, err: SdkError<E, R>) -> Error
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    return Error::ServiceError {
        resource: resource.to_string(),
        reason: DisplayErrorContext(&err).to_string(),
    };
}

fn throughput(table_name: &str, capacity: Capacity) -> Result<ProvisionedThroughput, Error> {
    return ProvisionedThroughput::builder()
        .read_capacity_units(capacity.read)
        .write_capacity_units(capacity.write)
        .build()
        .map_err(|error| Error::InvalidRequest {
            resource: table_name.to_string(),
            reason: error.to_string(),
        });
}

fn describe_error(table_name: &str, err: SdkError<DescribeTableError, HttpResponse>) -> Error {
    return match err {
        SdkError::ServiceError(context)
            if matches!(context.err(), DescribeTableError::ResourceNotFoundException(_)) =>
        {
            Error::TableNotFound(table_name.to_string())
        }
        err => service_error(table_name, err),
    };
}

/// A table that is already in use counts as provisioned.
fn create_outcome<T>(
    table_name: &str,
    result: Result<T, SdkError<CreateTableError, HttpResponse>>,
) -> Result<Provisioned, Error> {
    return match result {
        Ok(_) => Ok(Provisioned::Created),
        Err(SdkError::ServiceError(context))
            if matches!(context.err(), CreateTableError::ResourceInUseException(_)) =>
        {
            Ok(Provisioned::AlreadyExists)
        }
        Err(err) => Err(service_error(table_name, err)),
    };
}

#[async_trait]
impl TableBackend for DynamoTables {
    async fn describe_table(&self, table_name: &str) -> Result<TableDescriptor, Error> {
        let output = self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|err| describe_error(table_name, err))?;

        let description = output
            .table()
            .ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
        return Ok(TableDescriptor::from_description(table_name, description));
    }

    async fn create_table(
        &self,
        table: &TableDescriptor,
        capacity: Capacity,
    ) -> Result<Provisioned, Error> {
        let mut indexes = Vec::with_capacity(table.secondary_indexes.len());
        for index in &table.secondary_indexes {
            let index = GlobalSecondaryIndex::builder()
                .index_name(&index.index_name)
                .set_key_schema(Some(index.key_schema.clone()))
                .set_projection(index.projection.clone())
                .provisioned_throughput(throughput(&table.table_name, capacity)?)
                .build()
                .map_err(|error| Error::InvalidRequest {
                    resource: table.table_name.clone(),
                    reason: error.to_string(),
                })?;
            indexes.push(index);
        }

        let result = self
            .client
            .create_table()
            .table_name(&table.table_name)
            .set_key_schema(Some(table.key_schema.clone()))
            .set_attribute_definitions(Some(table.attribute_definitions.clone()))
            .provisioned_throughput(throughput(&table.table_name, capacity)?)
            .set_global_secondary_indexes(if indexes.is_empty() { None } else { Some(indexes) })
            .send()
            .await;

        return create_outcome(&table.table_name, result);
    }

    async fn wait_until_active(&self, table_name: &str) -> Result<(), Error> {
        for _ in 0..ACTIVE_POLL_ATTEMPTS {
            let output = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|err| service_error(table_name, err))?;

            let status = output.table().and_then(|table| table.table_status());
            if status == Some(&TableStatus::Active) {
                return Ok(());
            }

            tracing::debug!(table = table_name, ?status, "waiting for table to become active");
            tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
        }

        return Err(Error::NotActive(table_name.to_string()));
    }

    async fn get_item(&self, table_name: &str, key: Item) -> Result<Option<Item>, Error> {
        let output = self
            .client
            .get_item()
            .table_name(table_name)
            .set_key(Some(key))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| service_error(table_name, err))?;

        return Ok(output.item);
    }

    async fn put_item(&self, table_name: &str, item: Item) -> Result<(), Error> {
        self.client
            .put_item()
            .table_name(table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|err| service_error(table_name, err))?;

        return Ok(());
    }
}
