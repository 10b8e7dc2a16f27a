//! Compiler wording and defaults.
//!
//! The defaults reproduce what the rendering widget expects; override them
//! only when the widget is configured differently.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Widget name of the province/city/district selector.
pub const AREA_WIDGET: &str = "AreaWidget";

/// Widget name of the file upload control.
pub const UPLOAD_WIDGET: &str = "uploadWidget";

/// Defaults applied to upload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadDefaults {
    pub max_count: u64,
    pub max_size: u64,
    pub file_types: String,
}

impl Default for UploadDefaults {
    fn default() -> Self {
        Self {
            max_count: 50,
            max_size: 20 * 1024 * 1024,
            file_types: "jpeg,jpg,png".to_string(),
        }
    }
}

/// Wording and defaults used while compiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    /// Schema title when the config has none.
    pub default_title: String,
    /// Prompt for choice fields, also prefixed to their required message.
    pub select_prompt: String,
    /// Prompt for free-input fields, also prefixed to their required message.
    pub input_prompt: String,
    /// Message shown when a pattern does not match and none is configured.
    pub pattern_message: String,
    /// Title used by area-widget fields that declare none.
    pub area_title: String,
    /// Name prefix of pass-through attributes.
    pub extension_prefix: String,
    /// Top-level `ui:options` of the schema.
    pub ui_options: Map<String, Value>,
    pub upload: UploadDefaults,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        let mut ui_options = Map::new();
        ui_options.insert("canBeFolded".to_string(), json!(true));
        ui_options.insert("hrBlockType".to_string(), json!("0"));

        Self {
            default_title: "title".to_string(),
            select_prompt: "请选择".to_string(),
            input_prompt: "请输入".to_string(),
            pattern_message: "格式不正确".to_string(),
            area_title: "省市区".to_string(),
            extension_prefix: "hr".to_string(),
            ui_options,
            upload: UploadDefaults::default(),
        }
    }
}

impl CompilerOptions {
    /// Prompt for a field, depending on whether it is a choice field.
    pub fn prompt(&self, choice: bool) -> &str {
        if choice {
            &self.select_prompt
        } else {
            &self.input_prompt
        }
    }
}
