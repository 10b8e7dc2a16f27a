//! # formc
//!
//! Command line front end for [`formschema`].
//!
//! `formc` reads a form document (JSON or TOML), wires file backed
//! dictionaries and HTTP backed lookup functions into the module cache,
//! compiles the document and writes the rendering schema.
//!
//! ## Modules
//!
//! - [`ctx`] - Application context: settings, table wiring, compile and write
//! - [`lookup`] - HTTP lookup functions and endpoint tables
//! - [`settings`] - Settings file types
//! - [`utils`] - Common utilities and helper functions

/// Application context and state management.
pub mod ctx;

/// HTTP lookup functions and the tables built from endpoint definitions.
pub mod lookup;

/// Settings file types.
///
/// The settings file carries wording overrides, default dictionary files
/// and HTTP lookup endpoints.
pub mod settings;

/// Common utilities and helper functions.
pub mod utils;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
