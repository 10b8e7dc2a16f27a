//! Choice-field option resolution.
//!
//! Each option source resolves in isolation: a failing dictionary or lookup
//! only affects the field that asked for it, which ends up with empty option
//! lists.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    config::{EnumOption, EnumSource, FieldDescriptor},
    error::ResolveError,
    lookup::LookupNode,
    module_cache::{ModuleCache, get_nested_value},
    schema::SchemaField,
};

/// Parallel code and label lists of a choice field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumOptions {
    pub codes: Vec<Value>,
    pub labels: Vec<String>,
}

impl EnumOptions {
    /// No options at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Options from typed entries, in order.
    pub fn from_options(options: &[EnumOption]) -> Self {
        options.iter().fold(Self::empty(), |mut acc, opt| {
            acc.codes.push(opt.code());
            acc.labels.push(opt.label());
            acc
        })
    }

    /// Options from raw dictionary or response entries, in order.
    pub fn from_entries(entries: &[Value]) -> Self {
        entries.iter().fold(Self::empty(), |mut acc, entry| {
            let opt = EnumOption::from_value(entry);
            acc.codes.push(opt.code());
            acc.labels.push(opt.label());
            acc
        })
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Write `enum`/`enumNames` into a field and mark it as a clearable
    /// choice field that allows duplicates.
    pub fn apply_to(self, field: &mut SchemaField) {
        field.enum_codes = Some(self.codes);
        field.enum_names = Some(self.labels);
        field.unique_items = Some(false);
        field.ui_options.clearable = Some(true);
    }
}

/// Resolves the options of one field from its configured source.
#[derive(Clone)]
pub struct EnumResolver {
    cache: Arc<ModuleCache>,
}

impl EnumResolver {
    pub fn new(cache: Arc<ModuleCache>) -> Self {
        Self { cache }
    }

    /// The support table cache this resolver reads from.
    pub fn cache(&self) -> &Arc<ModuleCache> {
        &self.cache
    }

    /// Options of a field, or `None` when it is not a choice field.
    pub async fn resolve_options(&self, field: &FieldDescriptor) -> Option<EnumOptions> {
        let source = field.enum_source()?;
        Some(self.resolve_source(source).await)
    }

    /// Options from one source. Failures are logged and yield empty lists.
    pub async fn resolve_source(&self, source: EnumSource<'_>) -> EnumOptions {
        let (path, result) = match source {
            EnumSource::Static(options) => return EnumOptions::from_options(options),
            EnumSource::Dictionary(path) => (path, self.dictionary_options(path).await),
            EnumSource::Remote { path, params } => (path, self.lookup_options(path, params).await),
        };

        match result {
            Ok(options) => {
                debug!("`{path}` resolved to {} options", options.len());
                options
            }
            Err(e) => {
                warn!("options of `{path}` degraded to empty: {e}");
                EnumOptions::empty()
            }
        }
    }

    async fn dictionary_options(&self, path: &str) -> Result<EnumOptions, ResolveError> {
        let table = self.cache.dictionaries().await.map_err(ResolveError::Module)?;

        match get_nested_value(Some(&*table), path) {
            Some(Value::Array(entries)) => Ok(EnumOptions::from_entries(entries)),
            _ => Err(ResolveError::MissingDictionary(path.to_string())),
        }
    }

    async fn lookup_options(&self, path: &str, params: Value) -> Result<EnumOptions, ResolveError> {
        let table = self.cache.lookups().await.map_err(ResolveError::Module)?;

        let Some(LookupNode::Function(func)) = get_nested_value(Some(table.root()), path) else {
            return Err(ResolveError::InvalidLookupTarget(path.to_string()));
        };
        let func = func.clone();

        debug!("calling lookup `{path}` with {params}");
        let response = func
            .call(params)
            .await
            .map_err(|error| ResolveError::LookupFailed {
                path: path.to_string(),
                error,
            })?;

        parse_response(path, response)
    }
}

/// Accept only `{ "code": 0, "data": [...] }`.
fn parse_response(path: &str, response: Value) -> Result<EnumOptions, ResolveError> {
    let ok = response.get("code").and_then(Value::as_f64) == Some(0.0);
    match response.get("data") {
        Some(Value::Array(entries)) if ok => Ok(EnumOptions::from_entries(entries)),
        _ => Err(ResolveError::MalformedResponse {
            path: path.to_string(),
            response,
        }),
    }
}
