//! Form configuration model and document loading.
//!
//! A form document has the shape
//!
//! ```json
//! {
//!   "config": {
//!     "title": "表单",
//!     "BLOCK01": {
//!       "title": "",
//!       "properties": {
//!         "name": { "title": "姓名", "type": "string", "required": true }
//!       },
//!       "canBeFolded": true,
//!       "hrBlockType": "0"
//!     }
//!   }
//! }
//! ```
//!
//! Every key of `config` except `title` names a block. Blocks and fields keep
//! the order in which they were declared.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Field descriptors and option entries.
pub mod field;

pub use field::{EnumOption, EnumSource, FieldDescriptor, FieldType};

/// Reserved key of the `config` object holding the form title.
pub const TITLE_KEY: &str = "title";

/// A named group of fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockDescriptor {
    #[serde(deserialize_with = "lenient::non_empty_string")]
    pub title: Option<String>,
    pub properties: IndexMap<String, FieldDescriptor>,
    #[serde(deserialize_with = "lenient::optional_truthy")]
    pub can_be_folded: Option<bool>,
    /// Every other block attribute, in declaration order.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl BlockDescriptor {
    /// Pass-through attributes whose names start with `prefix`.
    pub fn extensions<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        self.attributes
            .iter()
            .filter(move |(name, _)| name.starts_with(prefix))
    }
}

/// The parsed `config` object of a form document.
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    /// Form title.
    pub title: Option<String>,
    /// Blocks in declaration order.
    pub blocks: IndexMap<String, BlockDescriptor>,
}

impl ConfigTree {
    /// Parse the `config` object of a form document.
    ///
    /// Blocks without a `properties` object are skipped. A field that cannot
    /// be read at all is skipped with a warning; the rest of the form is
    /// kept.
    pub fn from_value(config: &Value) -> Result<Self, ConfigError> {
        let Some(map) = config.as_object() else {
            return Err(ConfigError::MissingConfig);
        };

        let mut tree = ConfigTree::default();
        for (key, value) in map {
            if key == TITLE_KEY {
                tree.title = value.as_str().filter(|s| !s.is_empty()).map(str::to_string);
                continue;
            }
            let Some(Value::Object(fields)) = value.get("properties") else {
                debug!("skip block `{key}`: no properties");
                continue;
            };

            let mut attributes = value.clone();
            if let Value::Object(attrs) = &mut attributes {
                attrs.remove("properties");
            }
            let mut block = match BlockDescriptor::deserialize(&attributes) {
                Ok(block) => block,
                Err(source) => {
                    warn!(
                        "{}",
                        ConfigError::InvalidBlock {
                            block: key.clone(),
                            source,
                        }
                    );
                    BlockDescriptor::default()
                }
            };

            for (name, field) in fields {
                match FieldDescriptor::deserialize(field) {
                    Ok(field) => {
                        block.properties.insert(name.clone(), field);
                    }
                    Err(source) => warn!(
                        "{}",
                        ConfigError::InvalidField {
                            block: key.clone(),
                            field: name.clone(),
                            source,
                        }
                    ),
                }
            }
            tree.blocks.insert(key.clone(), block);
        }
        Ok(tree)
    }

    /// Parse a whole `{ "config": ... }` document.
    pub fn from_document(document: &Value) -> Result<Self, ConfigError> {
        let config = document
            .get("config")
            .filter(|c| c.is_object())
            .ok_or(ConfigError::MissingConfig)?;
        Self::from_value(config)
    }
}

/// Parse document text according to a file extension (`json` or `toml`).
pub fn parse_document(content: &str, ext: &str) -> Result<Value, ConfigError> {
    let value = match ext {
        "json" => serde_json::from_str(content)?,
        "toml" => {
            let v: toml::Value = toml::from_str(content)?;
            serde_json::to_value(v)?
        }
        ext => return Err(ConfigError::UnsupportedExtension(ext.to_string())),
    };
    Ok(value)
}

/// Read a JSON or TOML document from disk.
pub async fn load_document(path: impl AsRef<Path>) -> Result<Value, ConfigError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_document(&content, &ext)
}

/// JavaScript truthiness, which the hand-written configs rely on for
/// defaulting.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Forgiving deserializers: empty strings and nulls count as unset, and
/// values of the wrong shape are coerced or dropped with a warning.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{FieldType, is_truthy};

    pub fn truthy<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(is_truthy(&Value::deserialize(d)?))
    }

    pub fn optional_truthy<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            other => Ok(Some(is_truthy(&other))),
        }
    }

    pub fn non_empty_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => {
                warn!("ignoring non-text value {other}");
                None
            }
        })
    }

    pub fn positive_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::Number(n) => n.as_u64().filter(|n| *n > 0),
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => match s.trim().parse::<u64>() {
                Ok(n) => Some(n).filter(|n| *n > 0),
                Err(_) => {
                    warn!("ignoring non-numeric value {s:?}");
                    None
                }
            },
            other => {
                warn!("ignoring non-numeric value {other}");
                None
            }
        })
    }

    pub fn field_type<'de, D: Deserializer<'de>>(d: D) -> Result<Option<FieldType>, D::Error> {
        Ok(non_empty_string(d)?.and_then(|s| match s.parse::<FieldType>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                warn!("{e}, using string");
                None
            }
        }))
    }
}
