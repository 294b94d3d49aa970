use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Document-style item: attribute name to JSON value.
pub type Item = Map<String, Value>;

/// Convert a JSON value into an [`Item`], rejecting anything but objects.
pub fn to_item(value: Value) -> StoreResult<Item> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Validation(format!(
            "items must be JSON objects, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    Hash,
    Range,
}

/// Scalar types allowed for key attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    #[serde(rename = "S")]
    String,
    #[serde(rename = "N")]
    Number,
    #[serde(rename = "B")]
    Binary,
}

impl AttributeType {
    /// Whether a JSON value is an acceptable key value for this type.
    ///
    /// Binary keys are carried as strings in the JSON representation.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            AttributeType::String | AttributeType::Binary => value.is_string(),
            AttributeType::Number => value.is_number(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    #[default]
    PayPerRequest,
    Provisioned {
        read_capacity_units: i64,
        write_capacity_units: i64,
    },
}

/// Table definition handed through to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    #[serde(default)]
    pub billing_mode: BillingMode,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            key_schema: Vec::new(),
            attribute_definitions: Vec::new(),
            billing_mode: BillingMode::default(),
        }
    }

    pub fn hash_key(
        self,
        attribute_name: impl Into<String>,
        attribute_type: AttributeType,
    ) -> Self {
        self.key(attribute_name.into(), attribute_type, KeyType::Hash)
    }

    pub fn range_key(
        self,
        attribute_name: impl Into<String>,
        attribute_type: AttributeType,
    ) -> Self {
        self.key(attribute_name.into(), attribute_type, KeyType::Range)
    }

    pub fn billing_mode(mut self, billing_mode: BillingMode) -> Self {
        self.billing_mode = billing_mode;
        self
    }

    /// Copy of this schema under another table name.
    pub fn with_table_name(&self, table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..self.clone()
        }
    }

    fn key(
        mut self,
        attribute_name: String,
        attribute_type: AttributeType,
        key_type: KeyType,
    ) -> Self {
        self.key_schema.push(KeySchemaElement {
            attribute_name: attribute_name.clone(),
            key_type,
        });
        self.attribute_definitions.push(AttributeDefinition {
            attribute_name,
            attribute_type,
        });
        self
    }

    pub fn hash_key_name(&self) -> Option<&str> {
        self.key_name(KeyType::Hash)
    }

    pub fn range_key_name(&self) -> Option<&str> {
        self.key_name(KeyType::Range)
    }

    fn key_name(&self, key_type: KeyType) -> Option<&str> {
        self.key_schema
            .iter()
            .find(|element| element.key_type == key_type)
            .map(|element| element.attribute_name.as_str())
    }

    pub fn attribute_type(&self, attribute_name: &str) -> Option<AttributeType> {
        self.attribute_definitions
            .iter()
            .find(|definition| definition.attribute_name == attribute_name)
            .map(|definition| definition.attribute_type)
    }

    /// Checks the key schema the same way the store does on CreateTable.
    pub fn validate(&self) -> StoreResult<()> {
        if self.table_name.is_empty() {
            return Err(StoreError::Validation(
                "table name must not be empty".into(),
            ));
        }

        let count = |key_type| {
            self.key_schema
                .iter()
                .filter(|element| element.key_type == key_type)
                .count()
        };
        if count(KeyType::Hash) != 1 {
            return Err(StoreError::Validation(format!(
                "table {} must declare exactly one HASH key",
                self.table_name
            )));
        }
        if count(KeyType::Range) > 1 {
            return Err(StoreError::Validation(format!(
                "table {} declares more than one RANGE key",
                self.table_name
            )));
        }

        for element in &self.key_schema {
            if self.attribute_type(&element.attribute_name).is_none() {
                return Err(StoreError::Validation(format!(
                    "key attribute {} of table {} has no attribute definition",
                    element.attribute_name, self.table_name
                )));
            }
        }

        Ok(())
    }
}

/// Subset of the store's table description the fixture manager relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    pub table_name: String,
    pub item_count: Option<i64>,
    pub key_schema: Vec<KeySchemaElement>,
}

/// A single write inside a batched or transactional write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put {
        table: String,
        item: Item,
    },
    Update {
        table: String,
        key: Item,
        changes: Item,
    },
    Delete {
        table: String,
        key: Item,
    },
}

impl WriteOp {
    pub fn table(&self) -> &str {
        match self {
            WriteOp::Put { table, .. }
            | WriteOp::Update { table, .. }
            | WriteOp::Delete { table, .. } => table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders() -> TableSchema {
        TableSchema::new("orders")
            .hash_key("id", AttributeType::Number)
            .range_key("created_at", AttributeType::String)
    }

    #[test]
    fn test_builder_collects_keys_and_definitions() {
        let schema = orders();

        assert_eq!(schema.hash_key_name(), Some("id"));
        assert_eq!(schema.range_key_name(), Some("created_at"));
        assert_eq!(schema.attribute_type("id"), Some(AttributeType::Number));
        assert_eq!(schema.billing_mode, BillingMode::PayPerRequest);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_with_table_name_keeps_keys() {
        let copy = orders().with_table_name("orders_copy");
        assert_eq!(copy.table_name, "orders_copy");
        assert_eq!(copy.key_schema, orders().key_schema);
    }

    #[test]
    fn test_validate_requires_hash_key() {
        let schema = TableSchema::new("no_keys");
        assert!(matches!(schema.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_validate_requires_definitions() {
        let mut schema = orders();
        schema.attribute_definitions.pop();
        assert!(matches!(schema.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_to_item_rejects_scalars() {
        assert!(to_item(json!({"id": 1})).is_ok());
        assert!(matches!(to_item(json!(1)), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_schema_deserializes_from_store_notation() {
        let schema: TableSchema = serde_json::from_value(json!({
            "table_name": "fixedName",
            "key_schema": [{"attribute_name": "id", "key_type": "HASH"}],
            "attribute_definitions": [{"attribute_name": "id", "attribute_type": "N"}],
        }))
        .unwrap();

        assert_eq!(schema.hash_key_name(), Some("id"));
        assert_eq!(schema.billing_mode, BillingMode::PayPerRequest);
    }
}
