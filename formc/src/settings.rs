//! Settings file types.
//!
//! Settings are read from `.formc.toml` in the working directory unless a
//! path is given on the command line.
//!
//! # Settings File Format
//!
//! ```toml
//! dictionaries = ["dict/common.json"]
//!
//! [prompts]
//! select = "Please select "
//! input = "Please input "
//!
//! [lookups."api.queryDict"]
//! url = "https://example.com/dict/query"
//! headers = { Authorization = "Bearer ${env:DICT_TOKEN}" }
//! timeout_secs = 10
//! ```

use std::{collections::BTreeMap, path::PathBuf};

use formschema::CompilerOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Root of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Wording overrides for generated prompts and messages.
    pub prompts: PromptSettings,
    /// Dictionary files, tried in order before the ones given on the
    /// command line. Relative paths start at the working directory.
    pub dictionaries: Vec<PathBuf>,
    /// HTTP lookup endpoints keyed by the dotted path fields use in
    /// `enumApi`.
    pub lookups: BTreeMap<String, HttpEndpoint>,
}

/// Wording overrides. Unset entries keep the compiler defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PromptSettings {
    /// Prompt of choice fields, e.g. "请选择".
    pub select: Option<String>,
    /// Prompt of free-input fields, e.g. "请输入".
    pub input: Option<String>,
    /// Message used when a pattern has no message of its own.
    pub pattern_message: Option<String>,
    /// Schema title when the form declares none.
    pub default_title: Option<String>,
    /// Title of area selector fields that declare none.
    pub area_title: Option<String>,
}

/// A remote lookup reached over HTTP.
///
/// The field's `enumApiParams` are POSTed as the JSON body and the JSON
/// response body is handed back to the compiler unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct HttpEndpoint {
    /// Endpoint URL. `${env:VAR}` placeholders are expanded.
    pub url: String,
    /// Extra request headers. `${env:VAR}` placeholders in values are
    /// expanded.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// Parse settings text, TOML or JSON by extension.
    pub fn parse(content: &str, ext: &str) -> anyhow::Result<Self> {
        let settings = match ext {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => bail!("unsupported settings file extension: {ext:?}"),
        };
        Ok(settings)
    }

    /// Compiler options with the prompt overrides applied.
    pub fn compiler_options(&self) -> CompilerOptions {
        let mut options = CompilerOptions::default();
        let p = &self.prompts;

        let overrides = [
            (&p.select, &mut options.select_prompt),
            (&p.input, &mut options.input_prompt),
            (&p.pattern_message, &mut options.pattern_message),
            (&p.default_title, &mut options.default_title),
            (&p.area_title, &mut options.area_title),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }
        options
    }

    /// Pretty JSON Schema of the settings file.
    pub fn schema_json() -> anyhow::Result<String> {
        let schema = schemars::schema_for!(Settings);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}
