//! Catalog API client (types, categories, assets, files)

use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::types::AssetFiles;
use crate::http::HttpClient;

pub const DEFAULT_API_URL: &str = "https://api.polyhaven.com";

/// Thin JSON client over the catalog endpoints
#[derive(Clone)]
pub struct CatalogClient {
    http: HttpClient,
    base_url: String,
}

impl CatalogClient {
    pub fn new(http: HttpClient, base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).with_context(|| format!("Invalid API URL: {}", base_url))?;
        Ok(Self { http, base_url })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .http
            .inner()
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("Request failed: {}", url))?;

        response
            .json::<T>()
            .await
            .with_context(|| format!("Invalid JSON from {}", url))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .with_context(|| format!("Invalid endpoint: {}", path))
    }

    /// `GET /types`
    pub async fn asset_types(&self) -> Result<Vec<String>> {
        let value: Value = self.get_json(self.endpoint("/types")?).await?;
        string_list(value).context("Unexpected /types response")
    }

    /// `GET /categories/{type}`
    pub async fn categories(&self, asset_type: &str) -> Result<Vec<String>> {
        let value: Value = self
            .get_json(self.endpoint(&format!("/categories/{}", asset_type))?)
            .await?;
        string_list(value).context("Unexpected /categories response")
    }

    /// `GET /assets?t={type}&c={category}`, returns asset ids in sorted order
    pub async fn assets(&self, asset_type: &str, category: Option<&str>) -> Result<Vec<String>> {
        let base = format!("{}/assets", self.base_url);
        let url = match category {
            Some(c) => Url::parse_with_params(&base, &[("t", asset_type), ("c", c)]),
            None => Url::parse_with_params(&base, &[("t", asset_type)]),
        }
        .context("Invalid asset listing URL")?;

        let value: Value = self.get_json(url).await?;
        let mut ids = match value {
            Value::Object(map) => map.into_iter().map(|(id, _)| id).collect::<Vec<_>>(),
            other => bail!("Unexpected /assets response: expected object, got {}", kind(&other)),
        };
        ids.sort();
        Ok(ids)
    }

    /// `GET /files/{asset}`
    pub async fn files(&self, asset_id: &str) -> Result<AssetFiles> {
        self.get_json(self.endpoint(&format!("/files/{}", asset_id))?)
            .await
            .with_context(|| format!("Failed to fetch file metadata for {}", asset_id))
    }
}

/// Accept either `["a", "b"]` or `{"a": .., "b": ..}`
fn string_list(value: Value) -> Result<Vec<String>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => bail!("expected string, got {}", kind(&other)),
            })
            .collect(),
        Value::Object(map) => Ok(map.into_iter().map(|(k, _)| k).collect()),
        other => bail!("expected list, got {}", kind(&other)),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
