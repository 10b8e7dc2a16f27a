use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{is_truthy, lenient};

/// Value type of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum FieldType {
    /// Text value.
    #[default]
    String,
    /// Numeric value.
    Number,
    /// List value, used by the upload widget.
    Array,
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "number" => Ok(FieldType::Number),
            "array" => Ok(FieldType::Array),
            other => Err(format!(
                "unknown field type `{other}`, expected string, number or array"
            )),
        }
    }
}

impl TryFrom<String> for FieldType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Array => "array",
        };
        f.write_str(s)
    }
}

/// One selectable option, as written in configs, dictionaries and lookup
/// responses.
///
/// The code is read from `code` or `value`, the label from `name` or `label`;
/// the first truthy member wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,
}

impl EnumOption {
    /// Build an option from an arbitrary entry.
    ///
    /// Entries that are not objects yield an option with a null code and an
    /// empty label.
    pub fn from_value(entry: &Value) -> Self {
        serde_json::from_value(entry.clone()).unwrap_or_default()
    }

    /// Option code.
    pub fn code(&self) -> Value {
        first_truthy(&self.code, &self.value)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Option label.
    pub fn label(&self) -> String {
        match first_truthy(&self.name, &self.label) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

fn first_truthy<'a>(a: &'a Option<Value>, b: &'a Option<Value>) -> Option<&'a Value> {
    a.as_ref()
        .filter(|v| is_truthy(v))
        .or_else(|| b.as_ref().filter(|v| is_truthy(v)))
}

/// Where a choice field takes its options from.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumSource<'a> {
    /// Inline `enums` list.
    Static(&'a [EnumOption]),
    /// Dotted path into the dictionary table.
    Dictionary(&'a str),
    /// Dotted path into the lookup-function table plus call arguments.
    Remote { path: &'a str, params: Value },
}

/// Declaration of a single form field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDescriptor {
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub title: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient::field_type")]
    pub field_type: Option<FieldType>,
    pub empty_value: Option<Value>,
    #[serde(deserialize_with = "lenient::truthy")]
    pub required: bool,
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub required_message: Option<String>,
    #[serde(deserialize_with = "lenient::truthy")]
    pub disabled: bool,
    #[serde(deserialize_with = "lenient::truthy")]
    pub hidden: bool,
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub placeholder: Option<String>,

    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub pattern: Option<String>,
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub pattern_message: Option<String>,
    #[serde(deserialize_with = "lenient::positive_u64")]
    pub max_length: Option<u64>,

    pub enums: Option<Vec<EnumOption>>,
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub enum_dict: Option<String>,
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub enum_api: Option<String>,
    pub enum_api_params: Option<Value>,

    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub widget: Option<String>,
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub bind_block: Option<String>,
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub bind_code: Option<String>,

    // upload widget
    #[serde(deserialize_with = "lenient::positive_u64")]
    pub max_count: Option<u64>,
    #[serde(deserialize_with = "lenient::positive_u64")]
    pub max_size: Option<u64>,
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub file_types: Option<String>,
    pub field_class: Option<Value>,

    /// Every attribute not listed above, in declaration order.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl FieldDescriptor {
    /// Resolved type, `string` when unset.
    pub fn kind(&self) -> FieldType {
        self.field_type.unwrap_or_default()
    }

    /// Whether any option source is declared, used or not.
    pub fn has_enum_source(&self) -> bool {
        self.enums.is_some() || self.enum_dict.is_some() || self.enum_api.is_some()
    }

    /// The option source in effect: `enums` > `enumDict` > `enumApi`.
    pub fn enum_source(&self) -> Option<EnumSource<'_>> {
        if let Some(enums) = self.enums.as_deref().filter(|e| !e.is_empty()) {
            return Some(EnumSource::Static(enums));
        }
        if let Some(path) = &self.enum_dict {
            return Some(EnumSource::Dictionary(path));
        }
        self.enum_api.as_deref().map(|path| EnumSource::Remote {
            path,
            params: self
                .enum_api_params
                .clone()
                .unwrap_or_else(|| Value::Object(Map::new())),
        })
    }

    /// Companion key when this is a bound field, i.e. both `bindBlock` and
    /// `bindCode` are set.
    pub fn bound_companion(&self) -> Option<&str> {
        self.bind_block.as_ref()?;
        self.bind_code.as_deref()
    }

    /// Pass-through attributes whose names start with `prefix`.
    pub fn extensions<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        self.attributes
            .iter()
            .filter(move |(name, _)| name.starts_with(prefix))
    }

    /// Whether the field uses the given widget.
    pub fn uses_widget(&self, widget: &str) -> bool {
        self.widget.as_deref() == Some(widget)
    }
}
