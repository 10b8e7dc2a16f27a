//! Direct property synthesis: one field descriptor to one schema field.

use serde_json::Value;

use crate::{
    config::{FieldDescriptor, FieldType, is_truthy},
    options::{AREA_WIDGET, CompilerOptions, UPLOAD_WIDGET},
    schema::{ItemsSchema, SchemaField, UiOptions},
};

/// Build the schema field for a descriptor.
///
/// Options are not resolved here; see [`EnumOptions`](crate::EnumOptions).
pub fn synthesize(field: &FieldDescriptor, options: &CompilerOptions) -> SchemaField {
    let prompt = options.prompt(is_choice(field));

    let mut property = SchemaField {
        field_type: field.kind(),
        title: field.title.clone().unwrap_or_default(),
        empty_value: field
            .empty_value
            .clone()
            .filter(is_truthy)
            .unwrap_or_else(|| Value::String(String::new())),
        hidden: field.hidden.then_some(true),
        ui_options: UiOptions {
            disabled: field.disabled,
            placeholder: Some(
                field
                    .placeholder
                    .clone()
                    .unwrap_or_else(|| prompt.to_string()),
            ),
            ..Default::default()
        },
        bind_block: field.bind_block.clone(),
        bind_code: field.bind_code.clone(),
        required_message: Some(
            field
                .required_message
                .clone()
                .unwrap_or_else(|| format!("{prompt}{}", display_title(field, options))),
        ),
        ..Default::default()
    };

    property.attributes.extend(
        field
            .extensions(&options.extension_prefix)
            .map(|(name, value)| (name.clone(), value.clone())),
    );

    if let Some(pattern) = &field.pattern {
        property.ui_options.pattern = Some(pattern.clone());
        property.ui_options.pattern_message = Some(
            field
                .pattern_message
                .clone()
                .unwrap_or_else(|| options.pattern_message.clone()),
        );
    }
    property.ui_options.max_length = field.max_length;

    if field.kind() == FieldType::Array && field.uses_widget(UPLOAD_WIDGET) {
        apply_upload(&mut property, field, options);
    }

    if let Some(widget) = &field.widget
        && widget != UPLOAD_WIDGET
    {
        property.widget = Some(widget.clone());
    }

    property
}

/// Title used in generated messages; area selectors fall back to a default.
pub(crate) fn display_title(field: &FieldDescriptor, options: &CompilerOptions) -> String {
    match &field.title {
        Some(title) => title.clone(),
        None if field.uses_widget(AREA_WIDGET) => options.area_title.clone(),
        None => String::new(),
    }
}

fn is_choice(field: &FieldDescriptor) -> bool {
    field.has_enum_source() || field.uses_widget(AREA_WIDGET)
}

fn apply_upload(property: &mut SchemaField, field: &FieldDescriptor, options: &CompilerOptions) {
    let defaults = &options.upload;
    let max_count = field.max_count.unwrap_or(defaults.max_count);

    property.min_items = Some(0);
    property.max_items = Some(max_count);
    property.items = Some(ItemsSchema {
        item_type: "object".to_string(),
    });
    property.widget = Some(UPLOAD_WIDGET.to_string());

    let ui = &mut property.ui_options;
    ui.max_count = Some(max_count);
    ui.max_size = Some(field.max_size.unwrap_or(defaults.max_size));
    ui.file_types = Some(
        field
            .file_types
            .clone()
            .unwrap_or_else(|| defaults.file_types.clone()),
    );
    ui.field_class = field.field_class.clone();
}
