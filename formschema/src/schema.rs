//! Rendering schema output model.
//!
//! Member names (`ui:*`, `err:*`, `enum`, `enumNames`, `bindBlock`, ...) are
//! the contract with the rendering widget and are serialized verbatim.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::FieldType;

/// Root of a compiled schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaTree {
    pub title: String,
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Always empty, required-ness is tracked per block.
    pub required: Vec<String>,
    pub properties: IndexMap<String, SchemaBlock>,
    #[serde(rename = "ui:options")]
    pub ui_options: Map<String, Value>,
}

impl SchemaTree {
    /// Empty object schema.
    pub fn new(title: impl Into<String>, ui_options: Map<String, Value>) -> Self {
        Self {
            title: title.into(),
            schema_type: "object".to_string(),
            required: Vec::new(),
            properties: IndexMap::new(),
            ui_options,
        }
    }

    /// Look up a block.
    pub fn block(&self, key: &str) -> Option<&SchemaBlock> {
        self.properties.get(key)
    }

    /// Look up a field inside a block.
    pub fn field(&self, block: &str, field: &str) -> Option<&SchemaField> {
        self.block(block)?.properties.get(field)
    }

    /// Mutable access to a field inside a block.
    pub fn field_mut(&mut self, block: &str, field: &str) -> Option<&mut SchemaField> {
        self.properties.get_mut(block)?.properties.get_mut(field)
    }

    /// Serialize to a JSON value.
    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Serialize to pretty-printed JSON text.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One block of the compiled schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaBlock {
    pub title: String,
    /// Required field names in visiting order.
    pub required: Vec<String>,
    pub properties: IndexMap<String, SchemaField>,
    #[serde(
        rename = "ui:options",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ui_options: Option<Map<String, Value>>,
    /// Pass-through block attributes.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Item schema of an array field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemsSchema {
    #[serde(rename = "type")]
    pub item_type: String,
}

/// Widget options of a field (`ui:options`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiOptions {
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(
        rename = "err:pattern",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub pattern_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_class: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_types: Option<String>,
}

/// One field of the compiled schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub title: String,
    #[serde(rename = "ui:emptyValue")]
    pub empty_value: Value,
    #[serde(rename = "ui:hidden", default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(rename = "uniqueItems", default, skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_codes: Option<Vec<Value>>,
    #[serde(rename = "enumNames", default, skip_serializing_if = "Option::is_none")]
    pub enum_names: Option<Vec<String>>,
    #[serde(rename = "minItems", default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(rename = "maxItems", default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsSchema>,
    #[serde(rename = "ui:options")]
    pub ui_options: UiOptions,
    #[serde(rename = "ui:widget", default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<String>,
    #[serde(rename = "bindBlock", default, skip_serializing_if = "Option::is_none")]
    pub bind_block: Option<String>,
    #[serde(rename = "bindCode", default, skip_serializing_if = "Option::is_none")]
    pub bind_code: Option<String>,
    /// Reserved for structured extension data, always emitted.
    #[serde(rename = "extProperties", default)]
    pub ext_properties: Map<String, Value>,
    #[serde(rename = "err:required", default, skip_serializing_if = "Option::is_none")]
    pub required_message: Option<String>,
    /// Pass-through attributes copied by name.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl SchemaField {
    /// Whether the field renders as a choice field.
    pub fn is_choice(&self) -> bool {
        self.enum_codes.is_some()
    }

    /// Whether the field is hidden.
    pub fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }
}
