//! DynamoDB backed control and data plane.
//!
//! Works against the real service and against DynamoDB local alike; the
//! endpoint decides which.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{self as sdk, AttributeValue};
use serde_json::Value;

use crate::client::{ControlPlane, DataPlane, EndpointConfig};
use crate::error::{StoreError, StoreResult};
use crate::model::{
    AttributeType, BillingMode, Item, KeySchemaElement, KeyType, TableDescription, TableSchema,
    WriteOp,
};

type AttributeMap = HashMap<String, AttributeValue>;

#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    pub async fn connect(endpoint: &EndpointConfig) -> Self {
        let credentials = Credentials::new(
            &endpoint.access_key_id,
            &endpoint.secret_access_key,
            None,
            None,
            "dynamo-fixtures",
        );
        let config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(&endpoint.endpoint_url)
            .credentials_provider(credentials)
            .region(Region::new(endpoint.region.clone()))
            .load()
            .await;

        Self::from_client(Client::new(&config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ControlPlane for DynamoStore {
    async fn create_table(&self, schema: &TableSchema) -> StoreResult<()> {
        let (billing_mode, throughput) = match &schema.billing_mode {
            BillingMode::PayPerRequest => (sdk::BillingMode::PayPerRequest, None),
            BillingMode::Provisioned {
                read_capacity_units,
                write_capacity_units,
            } => {
                let throughput = sdk::ProvisionedThroughput::builder()
                    .read_capacity_units(*read_capacity_units)
                    .write_capacity_units(*write_capacity_units)
                    .build()
                    .map_err(build_error)?;
                (sdk::BillingMode::Provisioned, Some(throughput))
            }
        };

        self.client
            .create_table()
            .table_name(&schema.table_name)
            .set_key_schema(Some(key_schema(schema)?))
            .set_attribute_definitions(Some(attribute_definitions(schema)?))
            .billing_mode(billing_mode)
            .set_provisioned_throughput(throughput)
            .send()
            .await
            .map_err(|err| classify(&schema.table_name, err))?;

        log::debug!("Created table {}", schema.table_name);
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> StoreResult<TableDescription> {
        let output = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|err| classify(table, err))?;

        let description = output
            .table()
            .ok_or_else(|| StoreError::ResourceNotFound(table.to_string()))?;

        Ok(TableDescription {
            table_name: description.table_name().unwrap_or(table).to_string(),
            item_count: description.item_count(),
            key_schema: description
                .key_schema()
                .iter()
                .map(|element| KeySchemaElement {
                    attribute_name: element.attribute_name().to_string(),
                    key_type: if *element.key_type() == sdk::KeyType::Hash {
                        KeyType::Hash
                    } else {
                        KeyType::Range
                    },
                })
                .collect(),
        })
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        self.client
            .delete_table()
            .table_name(table)
            .send()
            .await
            .map_err(|err| classify(table, err))?;

        log::debug!("Deleted table {table}");
        Ok(())
    }
}

#[async_trait]
impl DataPlane for DynamoStore {
    async fn put(&self, table: &str, item: Item) -> StoreResult<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_attribute_map(item)?))
            .send()
            .await
            .map_err(|err| classify(table, err))?;
        Ok(())
    }

    async fn update(&self, table: &str, key: Item, changes: Item) -> StoreResult<()> {
        let mut request = self
            .client
            .update_item()
            .table_name(table)
            .set_key(Some(to_attribute_map(key)?));

        if let Some(set) = SetExpression::from_changes(changes)? {
            request = request
                .update_expression(set.expression)
                .set_expression_attribute_names(Some(set.names))
                .set_expression_attribute_values(Some(set.values));
        }

        request.send().await.map_err(|err| classify(table, err))?;
        Ok(())
    }

    async fn delete(&self, table: &str, key: Item) -> StoreResult<()> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(to_attribute_map(key)?))
            .send()
            .await
            .map_err(|err| classify(table, err))?;
        Ok(())
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let tables = tables_of(&ops);
        let mut request_items: HashMap<String, Vec<sdk::WriteRequest>> = HashMap::new();
        for op in ops {
            let (table, request) = write_request(op)?;
            request_items.entry(table).or_default().push(request);
        }

        let output = self
            .client
            .batch_write_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(|err| classify(&tables, err))?;

        let unprocessed = output
            .unprocessed_items()
            .into_iter()
            .flatten()
            .find(|(_, requests)| !requests.is_empty());
        if let Some((table, requests)) = unprocessed {
            return Err(StoreError::Unprocessed {
                table: table.clone(),
                count: requests.len(),
            });
        }
        Ok(())
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let tables = tables_of(&ops);
        let items = ops
            .into_iter()
            .map(transact_item)
            .collect::<StoreResult<Vec<_>>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|err| classify(&tables, err))?;
        Ok(())
    }

    async fn get(&self, table: &str, key: Item) -> StoreResult<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(to_attribute_map(key)?))
            .send()
            .await
            .map_err(|err| classify(table, err))?;

        output.item().map(from_attribute_map).transpose()
    }

    async fn scan(&self, table: &str) -> StoreResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key: Option<AttributeMap> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|err| classify(table, err))?;

            for item in output.items() {
                items.push(from_attribute_map(item)?);
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }
}

fn classify<E, R>(resource: &str, err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some("ResourceNotFoundException") => StoreError::ResourceNotFound(resource.to_string()),
        Some("ResourceInUseException") => StoreError::ResourceInUse(resource.to_string()),
        Some("ValidationException") => {
            StoreError::Validation(err.message().unwrap_or("validation failed").to_string())
        }
        _ => StoreError::Service(DisplayErrorContext(&err).to_string()),
    }
}

fn build_error(err: BuildError) -> StoreError {
    StoreError::Validation(err.to_string())
}

fn tables_of(ops: &[WriteOp]) -> String {
    let mut tables: Vec<&str> = ops.iter().map(WriteOp::table).collect();
    tables.sort_unstable();
    tables.dedup();
    tables.join(",")
}

fn key_schema(schema: &TableSchema) -> StoreResult<Vec<sdk::KeySchemaElement>> {
    schema
        .key_schema
        .iter()
        .map(|element| {
            let key_type = match element.key_type {
                KeyType::Hash => sdk::KeyType::Hash,
                KeyType::Range => sdk::KeyType::Range,
            };
            sdk::KeySchemaElement::builder()
                .attribute_name(&element.attribute_name)
                .key_type(key_type)
                .build()
                .map_err(build_error)
        })
        .collect()
}

fn attribute_definitions(schema: &TableSchema) -> StoreResult<Vec<sdk::AttributeDefinition>> {
    schema
        .attribute_definitions
        .iter()
        .map(|definition| {
            let attribute_type = match definition.attribute_type {
                AttributeType::String => sdk::ScalarAttributeType::S,
                AttributeType::Number => sdk::ScalarAttributeType::N,
                AttributeType::Binary => sdk::ScalarAttributeType::B,
            };
            sdk::AttributeDefinition::builder()
                .attribute_name(&definition.attribute_name)
                .attribute_type(attribute_type)
                .build()
                .map_err(build_error)
        })
        .collect()
}

fn write_request(op: WriteOp) -> StoreResult<(String, sdk::WriteRequest)> {
    match op {
        WriteOp::Put { table, item } => {
            let put = sdk::PutRequest::builder()
                .set_item(Some(to_attribute_map(item)?))
                .build()
                .map_err(build_error)?;
            Ok((
                table,
                sdk::WriteRequest::builder().put_request(put).build(),
            ))
        }
        WriteOp::Delete { table, key } => {
            let delete = sdk::DeleteRequest::builder()
                .set_key(Some(to_attribute_map(key)?))
                .build()
                .map_err(build_error)?;
            Ok((
                table,
                sdk::WriteRequest::builder().delete_request(delete).build(),
            ))
        }
        WriteOp::Update { table, .. } => Err(StoreError::Validation(format!(
            "batch write against {table} only supports put and delete requests"
        ))),
    }
}

fn transact_item(op: WriteOp) -> StoreResult<sdk::TransactWriteItem> {
    let item = match op {
        WriteOp::Put { table, item } => {
            let put = sdk::Put::builder()
                .table_name(table)
                .set_item(Some(to_attribute_map(item)?))
                .build()
                .map_err(build_error)?;
            sdk::TransactWriteItem::builder().put(put).build()
        }
        WriteOp::Update {
            table,
            key,
            changes,
        } => {
            let set = SetExpression::from_changes(changes)?.ok_or_else(|| {
                StoreError::Validation(format!(
                    "transactional update against {table} has no attributes to set"
                ))
            })?;
            let update = sdk::Update::builder()
                .table_name(table)
                .set_key(Some(to_attribute_map(key)?))
                .update_expression(set.expression)
                .set_expression_attribute_names(Some(set.names))
                .set_expression_attribute_values(Some(set.values))
                .build()
                .map_err(build_error)?;
            sdk::TransactWriteItem::builder().update(update).build()
        }
        WriteOp::Delete { table, key } => {
            let delete = sdk::Delete::builder()
                .table_name(table)
                .set_key(Some(to_attribute_map(key)?))
                .build()
                .map_err(build_error)?;
            sdk::TransactWriteItem::builder().delete(delete).build()
        }
    };
    Ok(item)
}

/// `SET #a0 = :v0, ...` expression with placeholder maps.
#[derive(Debug)]
struct SetExpression {
    expression: String,
    names: HashMap<String, String>,
    values: AttributeMap,
}

impl SetExpression {
    fn from_changes(changes: Item) -> StoreResult<Option<Self>> {
        if changes.is_empty() {
            return Ok(None);
        }

        let mut clauses = Vec::with_capacity(changes.len());
        let mut names = HashMap::with_capacity(changes.len());
        let mut values = HashMap::with_capacity(changes.len());
        for (index, (name, value)) in changes.into_iter().enumerate() {
            clauses.push(format!("#a{index} = :v{index}"));
            names.insert(format!("#a{index}"), name);
            values.insert(format!(":v{index}"), to_attribute(value)?);
        }

        Ok(Some(Self {
            expression: format!("SET {}", clauses.join(", ")),
            names,
            values,
        }))
    }
}

fn to_attribute(value: Value) -> StoreResult<AttributeValue> {
    let attribute = match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text),
        Value::Array(values) => AttributeValue::L(
            values
                .into_iter()
                .map(to_attribute)
                .collect::<StoreResult<Vec<_>>>()?,
        ),
        Value::Object(map) => AttributeValue::M(to_attribute_map(map)?),
    };
    Ok(attribute)
}

fn to_attribute_map(item: Item) -> StoreResult<AttributeMap> {
    item.into_iter()
        .map(|(name, value)| Ok((name, to_attribute(value)?)))
        .collect()
}

fn from_attribute(attribute: &AttributeValue) -> StoreResult<Value> {
    match attribute {
        AttributeValue::S(text) => Ok(Value::String(text.clone())),
        AttributeValue::N(number) => parse_number(number),
        AttributeValue::Bool(flag) => Ok(Value::Bool(*flag)),
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::L(values) => values
            .iter()
            .map(from_attribute)
            .collect::<StoreResult<Vec<_>>>()
            .map(Value::Array),
        AttributeValue::M(map) => from_attribute_map(map).map(Value::Object),
        AttributeValue::Ss(values) => Ok(Value::Array(
            values.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(values) => values
            .iter()
            .map(|number| parse_number(number))
            .collect::<StoreResult<Vec<_>>>()
            .map(Value::Array),
        _ => Err(StoreError::Validation(
            "binary attributes are not supported".into(),
        )),
    }
}

fn from_attribute_map(map: &AttributeMap) -> StoreResult<Item> {
    map.iter()
        .map(|(name, value)| Ok((name.clone(), from_attribute(value)?)))
        .collect()
}

fn parse_number(raw: &str) -> StoreResult<Value> {
    match raw.parse::<serde_json::Number>() {
        Ok(number) => Ok(Value::Number(number)),
        Err(err) => Err(StoreError::Validation(format!(
            "invalid number {raw}: {err}"
        ))),
    }
}
