//! Application context and state management.
//!
//! [`AppContext`] holds the working directory and the loaded settings, and
//! wires them into a [`ModuleCache`] and a [`SchemaCompiler`].

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use colored::Colorize;
use formschema::{
    JsonFileSource, ModuleCache, SchemaCompiler, SchemaTree, StaticSource, config::load_document,
};
use reqwest::Client;
use tokio::fs;

use crate::{
    lookup::{EndpointFileSource, table_from_endpoints},
    settings::Settings,
    utils::{extension, resolve_path},
};

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = ".formc.toml";

/// Support table files given for one run.
#[derive(Debug, Default, Clone)]
pub struct TableFiles {
    /// Dictionary files, tried in order after the configured ones.
    pub dictionaries: Vec<PathBuf>,
    /// Lookup endpoint file, tried after the configured endpoints.
    pub lookups: Option<PathBuf>,
}

/// The main application context holding all state.
#[derive(Debug, Default, Clone)]
pub struct AppContext {
    /// Directory relative paths are resolved against.
    pub workdir: PathBuf,
    /// Loaded settings.
    pub settings: Settings,
    /// Path the settings were loaded from, if any.
    pub settings_path: Option<PathBuf>,
}

impl AppContext {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            ..Default::default()
        }
    }

    /// Loads the settings file.
    ///
    /// Without an explicit path, `.formc.toml` in the working directory is
    /// used if it exists, and defaults apply otherwise. An explicit path
    /// must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn prepare_settings(&mut self, path: Option<PathBuf>) -> anyhow::Result<&Settings> {
        let path = match path {
            Some(path) => resolve_path(&self.workdir, &path),
            None => {
                let default = self.workdir.join(SETTINGS_FILE);
                if !fs::try_exists(&default).await.unwrap_or(false) {
                    debug!("no {SETTINGS_FILE} in {}, using defaults", self.workdir.display());
                    return Ok(&self.settings);
                }
                default
            }
        };

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow!("can not open settings file {}: {e}", path.display()))?;
        let ext = match extension(&path) {
            "" => "toml",
            ext => ext,
        };
        self.settings = Settings::parse(&content, ext)
            .map_err(|e| anyhow!("invalid settings file {}: {e}", path.display()))?;
        info!("settings loaded from {}", path.display());
        self.settings_path = Some(path);
        Ok(&self.settings)
    }

    /// Builds the support table cache.
    ///
    /// Dictionary strategies: configured files, then `files.dictionaries`.
    /// Lookup strategies: configured endpoints, then `files.lookups`.
    pub fn module_cache(&self, files: &TableFiles) -> anyhow::Result<ModuleCache> {
        let mut cache = ModuleCache::new();

        for path in self.settings.dictionaries.iter().chain(&files.dictionaries) {
            cache = cache.with_dictionary_source(JsonFileSource::new(resolve_path(&self.workdir, path)));
        }

        let client = Client::new();
        if !self.settings.lookups.is_empty() {
            let table = table_from_endpoints(&client, &self.settings.lookups)?;
            cache = cache.with_lookup_source(StaticSource::new("settings", table));
        }
        if let Some(path) = &files.lookups {
            cache = cache.with_lookup_source(EndpointFileSource::new(
                resolve_path(&self.workdir, path),
                client,
            ));
        }

        Ok(cache)
    }

    /// Compiler configured from the settings.
    pub fn compiler(&self, cache: Arc<ModuleCache>) -> SchemaCompiler {
        SchemaCompiler::new(cache).with_options(self.settings.compiler_options())
    }

    /// Loads and compiles one form document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or has no usable
    /// form config.
    pub async fn compile_file(
        &self,
        form: &Path,
        compiler: &SchemaCompiler,
    ) -> anyhow::Result<SchemaTree> {
        let path = resolve_path(&self.workdir, form);
        let document = load_document(&path).await?;

        let Some(schema) = compiler.compile(&document).await else {
            bail!("{} has no usable form config", path.display());
        };

        let fields: usize = schema.properties.values().map(|b| b.properties.len()).sum();
        info!(
            "compiled {}: {} blocks, {} fields",
            path.display(),
            schema.properties.len(),
            fields
        );
        Ok(schema)
    }

    /// Writes the schema to `out`, or to stdout when `out` is `None`.
    pub async fn write_schema(&self, schema: &SchemaTree, out: Option<&Path>) -> anyhow::Result<()> {
        let text = schema.to_json_pretty()?;
        match out {
            Some(out) => {
                let out = resolve_path(&self.workdir, out);
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(&out, text + "\n").await?;
                eprintln!("{} {}", "Schema written to".green(), out.display());
            }
            None => println!("{text}"),
        }
        Ok(())
    }
}
