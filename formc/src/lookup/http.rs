use std::{future::Future, time::Duration};

use anyhow::Context;
use reqwest::Client;
use serde_json::Value;

use crate::{settings::HttpEndpoint, utils::replace_env_placeholders};

/// A lookup function backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpLookup {
    client: Client,
    url: String,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl HttpLookup {
    /// Prepare a lookup, expanding `${env:VAR}` in the URL and header values.
    pub fn new(client: Client, endpoint: &HttpEndpoint) -> anyhow::Result<Self> {
        let url = replace_env_placeholders(&endpoint.url)?;
        let headers = endpoint
            .headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), replace_env_placeholders(value)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            client,
            url,
            headers,
            timeout: endpoint.timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `params` as JSON and return the JSON response body.
    pub fn request(&self, params: Value) -> impl Future<Output = anyhow::Result<Value>> + Send + 'static + use<> {
        let mut req = self.client.post(&self.url).json(&params);
        for (name, value) in &self.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let url = self.url.clone();

        async move {
            debug!("POST {url} {params}");
            let resp = req
                .send()
                .await
                .with_context(|| format!("POST {url} failed"))?
                .error_for_status()?;
            let body = resp
                .json::<Value>()
                .await
                .with_context(|| format!("{url} did not answer with JSON"))?;
            Ok(body)
        }
    }
}
