//! # formschema
//!
//! Compiles hand-authored form configurations into the rendering schema
//! consumed by a generic form-rendering widget.
//!
//! A form configuration is a tree of named blocks, each holding named field
//! descriptors. The compiler walks that tree once, emits one schema field per
//! descriptor (two for bound fields), and resolves choice-field options from
//! one of three sources:
//!
//! - a static `enums` list on the descriptor,
//! - a dictionary table addressed by dotted path (`enumDict`),
//! - a remote lookup function addressed by dotted path (`enumApi`).
//!
//! Dictionary and remote resolutions run as independent futures that are
//! joined before the schema is returned. A failed resolution leaves the field
//! with empty option lists instead of failing the compile.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use formschema::{ModuleCache, SchemaCompiler, StaticSource};
//! use serde_json::json;
//!
//! # async fn example() {
//! let cache = ModuleCache::new().with_dictionary_source(StaticSource::new(
//!     "inline",
//!     json!({ "sexDict": [{ "code": "1", "name": "男" }, { "code": "2", "name": "女" }] }),
//! ));
//! let compiler = SchemaCompiler::new(Arc::new(cache));
//!
//! let document = json!({
//!     "config": {
//!         "title": "表单",
//!         "BLOCK01": {
//!             "properties": {
//!                 "sex": { "title": "性别", "type": "string", "required": true, "enumDict": "sexDict" }
//!             }
//!         }
//!     }
//! });
//!
//! let schema = compiler.compile(&document).await.unwrap();
//! println!("{}", schema.to_json_pretty().unwrap());
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Form configuration model and document loading
//! - [`schema`] - Rendering schema output model
//! - [`compiler`] - Schema compiler and bound-field expansion
//! - [`resolver`] - Choice-field option resolution
//! - [`module_cache`] - Lazily loaded dictionary and lookup tables
//! - [`lookup`] - Remote lookup functions and their table
//! - [`options`] - Compiler wording and defaults

#[macro_use]
extern crate log;

/// Schema compiler and bound-field expansion.
pub mod compiler;

/// Form configuration model and document loading.
///
/// Parses the `{ "config": { ... } }` document into blocks and field
/// descriptors while keeping declaration order.
pub mod config;

/// Error types for configuration, table loading and option resolution.
pub mod error;

/// Remote lookup functions and the table they are addressed through.
pub mod lookup;

/// Lazily loaded, process-lifetime cache of support tables.
pub mod module_cache;

/// Compiler wording and defaults.
pub mod options;

/// Choice-field option resolution.
pub mod resolver;

/// Rendering schema output model.
pub mod schema;

pub use compiler::{BindFieldExpander, BoundPair, SchemaCompiler};
pub use config::{BlockDescriptor, ConfigTree, EnumOption, FieldDescriptor, FieldType};
pub use error::{ConfigError, ModuleError, ResolveError};
pub use lookup::{LookupFn, LookupNode, LookupTable};
pub use module_cache::{FnSource, JsonFileSource, ModuleCache, StaticSource, TableId, TableSource};
pub use options::CompilerOptions;
pub use resolver::{EnumOptions, EnumResolver};
pub use schema::{SchemaBlock, SchemaField, SchemaTree, UiOptions};
pub use serde_json::Value;
