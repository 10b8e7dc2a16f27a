//! Bound-field expansion.
//!
//! A field declaring both `bindBlock` and `bindCode` expands into two schema
//! fields: the visible primary, and a hidden companion that carries the code
//! of the chosen option. The companion lives in the block named by
//! `bindBlock` under the key named by `bindCode`, and points back at the
//! primary through its own `bindBlock`/`bindCode`.

use serde_json::Value;

use super::field::{display_title, synthesize};
use crate::{
    config::{EnumSource, FieldDescriptor, FieldType},
    options::CompilerOptions,
    resolver::EnumOptions,
    schema::{SchemaField, UiOptions},
};

/// The two schema fields produced by a bound field.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundPair {
    pub primary: SchemaField,
    /// Block receiving the companion.
    pub target_block: String,
    pub companion_key: String,
    pub companion: SchemaField,
}

/// Expands bound fields into their primary and companion.
pub struct BindFieldExpander<'a> {
    options: &'a CompilerOptions,
}

impl<'a> BindFieldExpander<'a> {
    pub fn new(options: &'a CompilerOptions) -> Self {
        Self { options }
    }

    /// Expand `field`, declared as `field_key` in `block_key`.
    ///
    /// Returns `None` when the field is not bound. Only inline `enums` are
    /// resolved for the primary; dictionary and lookup sources are ignored.
    pub fn expand(&self, block_key: &str, field_key: &str, field: &FieldDescriptor) -> Option<BoundPair> {
        let companion_key = field.bound_companion()?.to_string();
        let target_block = field.bind_block.clone().unwrap_or_default();

        let mut primary = synthesize(field, self.options);
        primary.hidden = Some(field.hidden);
        match field.enum_source() {
            Some(EnumSource::Static(options)) => EnumOptions::from_options(options).apply_to(&mut primary),
            Some(_) => debug!("`{block_key}.{field_key}`: bound fields only take inline options"),
            None => {}
        }

        let companion = SchemaField {
            field_type: FieldType::String,
            title: format!("{}Code", display_title(field, self.options)),
            empty_value: Value::String(String::new()),
            hidden: Some(true),
            ui_options: UiOptions {
                disabled: field.disabled,
                ..Default::default()
            },
            bind_block: Some(block_key.to_string()),
            bind_code: Some(field_key.to_string()),
            required_message: Some(String::new()),
            ..Default::default()
        };

        Some(BoundPair {
            primary,
            target_block,
            companion_key,
            companion,
        })
    }
}
