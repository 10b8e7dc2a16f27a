//! Lookup-function tables backed by HTTP endpoints.
//!
//! Endpoints come from the settings file or from a separate endpoint file.
//! An endpoint file is a nested JSON/TOML document: objects with a `url`
//! member become HTTP lookups, other objects become namespaces, and every
//! other value is kept as non-callable data.
//!
//! ```json
//! { "api": { "queryDict": { "url": "https://example.com/dict/query" } } }
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use formschema::{LookupNode, LookupTable, TableSource, config::load_document};
use futures::future::BoxFuture;
use indexmap::IndexMap;
use reqwest::Client;
use serde_json::Value;

use crate::settings::HttpEndpoint;

mod http;

pub use http::HttpLookup;

/// Build a table from endpoints keyed by dotted path.
pub fn table_from_endpoints(
    client: &Client,
    endpoints: &BTreeMap<String, HttpEndpoint>,
) -> anyhow::Result<LookupTable> {
    let mut table = LookupTable::new();
    for (path, endpoint) in endpoints {
        table.insert(path, function_node(client, endpoint)?);
    }
    Ok(table)
}

/// Build a table from a nested endpoint document.
pub fn table_from_value(client: &Client, value: &Value) -> anyhow::Result<LookupTable> {
    let Value::Object(map) = value else {
        bail!("lookup document must be an object, got {value}");
    };
    let mut table = LookupTable::new();
    for (key, child) in map {
        table.insert(key, node_from_value(client, child)?);
    }
    Ok(table)
}

fn node_from_value(client: &Client, value: &Value) -> anyhow::Result<LookupNode> {
    let Value::Object(map) = value else {
        return Ok(LookupNode::Value(value.clone()));
    };
    if map.get("url").is_some_and(Value::is_string) {
        let endpoint: HttpEndpoint = serde_json::from_value(value.clone())?;
        return function_node(client, &endpoint);
    }

    let mut children = IndexMap::new();
    for (key, child) in map {
        children.insert(key.clone(), node_from_value(client, child)?);
    }
    Ok(LookupNode::Namespace(children))
}

fn function_node(client: &Client, endpoint: &HttpEndpoint) -> anyhow::Result<LookupNode> {
    let lookup = HttpLookup::new(client.clone(), endpoint)?;
    debug!("lookup endpoint {}", lookup.url());
    let func = move |params: Value| lookup.request(params);
    Ok(LookupNode::Function(Arc::new(func)))
}

/// Loads the lookup table from an endpoint file.
pub struct EndpointFileSource {
    name: String,
    path: PathBuf,
    client: Client,
}

impl EndpointFileSource {
    pub fn new(path: impl AsRef<Path>, client: Client) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("file:{}", path.display()),
            path,
            client,
        }
    }
}

impl TableSource<LookupTable> for EndpointFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> BoxFuture<'_, anyhow::Result<LookupTable>> {
        Box::pin(async move {
            let value = load_document(&self.path).await?;
            table_from_value(&self.client, &value)
        })
    }
}
