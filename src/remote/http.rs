//! HTTP record store
//!
//! Documents live at `{base}/{collection}/{id}`: `GET` returns the JSON
//! document (404 when absent), `PUT` replaces it.

use super::RecordStore;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

pub struct HttpRecordStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRecordStore {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let url = self.document_url(collection, id);
        debug!("GET {url}");

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let document = response
                    .json::<Value>()
                    .await
                    .with_context(|| format!("Invalid JSON document at {url}"))?;
                Ok(Some(document))
            }
            status => Err(anyhow!("GET {url} returned {status}")),
        }
    }

    async fn put(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        let url = self.document_url(collection, id);
        debug!("PUT {url}");

        let response = self
            .authorize(self.client.put(&url).json(&document))
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        if !response.status().is_success() {
            return Err(anyhow!("PUT {url} returned {}", response.status()));
        }
        Ok(())
    }
}
