//! Elasticsearch REST client.
//!
//! Covers the handful of endpoints the harvester needs: cluster info, index
//! existence/creation/deletion, `_cat/indices` and `_bulk`. Bulk submission
//! goes through the [`DocumentSink`] trait so the pipeline never depends on
//! this type directly.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use arxiv_harvest_core::{BulkReport, DocumentSink, ItemFailure, UpsertAction};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::config::{Credentials, ElasticsearchConfig, IndexSchema};
use crate::schema::mappings;

pub struct EsClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

/// Subset of `GET /`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cluster_name: String,
    pub version: ClusterVersion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterVersion {
    pub number: String,
}

/// One row of `_cat/indices?format=json`. The cat API reports counts as
/// strings, and omits them for closed indices.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IndexSummary {
    #[serde(rename = "index")]
    pub name: String,
    #[serde(default)]
    pub health: Option<String>,
    #[serde(rename = "docs.count", default)]
    pub docs_count: Option<String>,
    #[serde(rename = "store.size", default)]
    pub store_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    status: u16,
    #[serde(default)]
    error: Option<BulkItemError>,
}

#[derive(Debug, Deserialize)]
struct BulkItemError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    reason: Option<String>,
}

impl EsClient {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let base_url = config.endpoint()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build Elasticsearch HTTP client")?;

        Ok(Self {
            client,
            base_url,
            credentials: config.credentials(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let req = self.client.request(method, url);
        match &self.credentials {
            Credentials::ApiKey(key) => req.header("Authorization", format!("ApiKey {}", key)),
            Credentials::Basic { username, password } => req.basic_auth(username, Some(password)),
            Credentials::Anonymous => req,
        }
    }

    /// `GET /`, used as the connectivity check.
    pub async fn info(&self) -> Result<ClusterInfo> {
        let resp = self
            .request(Method::GET, "/")
            .send()
            .await
            .with_context(|| format!("failed to reach Elasticsearch at {}", self.base_url))?;
        let resp = check_status(resp, "cluster info").await?;
        resp.json().await.context("failed to parse cluster info")
    }

    pub async fn index_exists(&self, name: &str) -> Result<bool> {
        let resp = self
            .request(Method::HEAD, name)
            .send()
            .await
            .with_context(|| format!("failed to check index '{}'", name))?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => bail!("index check for '{}' failed (HTTP {})", name, status),
        }
    }

    pub async fn create_index(&self, name: &str, schema: IndexSchema) -> Result<()> {
        let resp = self
            .request(Method::PUT, name)
            .json(&json!({ "mappings": mappings(schema) }))
            .send()
            .await
            .with_context(|| format!("failed to create index '{}'", name))?;
        check_status(resp, "create index").await?;
        tracing::info!(index = name, schema = schema.as_str(), "created index");
        Ok(())
    }

    /// Create `name` if it is missing. Returns true when it was created.
    pub async fn ensure_index(&self, name: &str, schema: IndexSchema) -> Result<bool> {
        if self.index_exists(name).await? {
            return Ok(false);
        }
        self.create_index(name, schema).await?;
        Ok(true)
    }

    /// Non-system indices, sorted by name.
    pub async fn list_indices(&self) -> Result<Vec<IndexSummary>> {
        let resp = self
            .request(Method::GET, "_cat/indices")
            .query(&[("format", "json")])
            .send()
            .await
            .context("failed to list indices")?;
        let resp = check_status(resp, "list indices").await?;
        let mut rows: Vec<IndexSummary> = resp.json().await.context("failed to parse index list")?;
        rows.retain(|r| !r.name.starts_with('.'));
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    /// Delete `name`. Returns false when it did not exist.
    pub async fn delete_index(&self, name: &str) -> Result<bool> {
        let resp = self
            .request(Method::DELETE, name)
            .send()
            .await
            .with_context(|| format!("failed to delete index '{}'", name))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(resp, "delete index").await?;
        Ok(true)
    }
}

#[async_trait]
impl DocumentSink for EsClient {
    async fn bulk_upsert(&self, actions: &[UpsertAction]) -> Result<BulkReport> {
        if actions.is_empty() {
            return Ok(BulkReport::default());
        }

        let body = ndjson_body(actions)?;
        let resp = self
            .request(Method::POST, "_bulk")
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .context("bulk request failed")?;
        let resp = check_status(resp, "bulk").await?;
        let parsed: BulkResponse = resp.json().await.context("failed to parse bulk response")?;

        Ok(BulkReport {
            submitted: actions.len(),
            failures: if parsed.errors {
                item_failures(parsed.items)
            } else {
                Vec::new()
            },
        })
    }
}

/// One action line plus one source line per document.
fn ndjson_body(actions: &[UpsertAction]) -> Result<String> {
    let mut body = String::new();
    for action in actions {
        let meta = json!({ "index": { "_index": action.index, "_id": action.id } });
        body.push_str(&serde_json::to_string(&meta)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&action.source)?);
        body.push('\n');
    }
    Ok(body)
}

fn item_failures(items: Vec<HashMap<String, BulkItem>>) -> Vec<ItemFailure> {
    items
        .into_iter()
        .flat_map(|item| item.into_values())
        .filter(|item| item.error.is_some() || item.status >= 300)
        .map(|item| {
            let reason = match item.error {
                Some(e) => match e.reason {
                    Some(r) => format!("{}: {}", e.kind, r),
                    None => e.kind,
                },
                None => format!("HTTP {}", item.status),
            };
            ItemFailure {
                id: item.id.unwrap_or_default(),
                status: item.status,
                reason,
            }
        })
        .collect()
}

async fn check_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!(
        "Elasticsearch {} failed (HTTP {}): {}",
        what,
        status,
        body.chars().take(500).collect::<String>()
    )
}
