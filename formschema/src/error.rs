use std::{fmt, path::PathBuf, sync::Arc};

use serde_json::Value;

use crate::module_cache::TableId;

/// Errors raised while reading or parsing a form configuration.
///
/// The compiler never raises these to its caller: an unusable document makes
/// [`SchemaCompiler::compile`](crate::SchemaCompiler::compile) return `None`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document has no `config` object.
    #[error("form document has no `config` object")]
    MissingConfig,

    /// A block could not be parsed into a [`BlockDescriptor`](crate::BlockDescriptor).
    #[error("block `{block}` is malformed: {source}")]
    InvalidBlock {
        block: String,
        #[source]
        source: serde_json::Error,
    },

    /// A field could not be read; only that field is dropped.
    #[error("field `{block}.{field}` is malformed: {source}")]
    InvalidField {
        block: String,
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// The file extension does not name a supported format.
    #[error("unsupported config file extension: {0:?}")]
    UnsupportedExtension(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// One failed load strategy.
#[derive(Debug)]
pub struct StrategyFailure {
    /// Name of the strategy that failed.
    pub strategy: String,
    /// What went wrong.
    pub error: anyhow::Error,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:#}", self.strategy, self.error)
    }
}

/// Errors raised by the support table cache.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("no load strategy registered for the {0} table")]
    NoSources(TableId),

    /// Every registered strategy failed; all failures are kept in order.
    #[error("{table} table unavailable, all load strategies failed: {}", join_failures(.failures))]
    Unavailable {
        table: TableId,
        failures: Vec<StrategyFailure>,
    },
}

fn join_failures(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reasons a dictionary or remote option source produced nothing usable.
///
/// These are contained to the field being resolved and end up as empty
/// option lists.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{0}")]
    Module(Arc<ModuleError>),

    #[error("dictionary entry `{0}` is missing or not a list")]
    MissingDictionary(String),

    #[error("lookup target `{0}` is not callable")]
    InvalidLookupTarget(String),

    #[error("lookup `{path}` failed: {error:#}")]
    LookupFailed { path: String, error: anyhow::Error },

    #[error("lookup `{path}` returned an unusable response: {response}")]
    MalformedResponse { path: String, response: Value },
}
