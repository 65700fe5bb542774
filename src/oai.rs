//! OAI-PMH page fetcher.
//!
//! One call is one `ListRecords` request. A fresh request carries the window
//! and metadata prefix; a continuation request carries only the
//! `resumptionToken`, which the protocol requires to be the sole argument
//! besides the verb. Deletion tombstones are dropped here, before any record
//! reaches the parser.

use std::time::Duration;

use anyhow::Context;
use arxiv_harvest_core::record::OAI_NS;
use arxiv_harvest_core::xml::parse_document;
use arxiv_harvest_core::{HarvestWindow, RawRecord};
use async_trait::async_trait;

use crate::config::OaiConfig;
use crate::error::FetchError;

/// One response page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Live records, tombstones removed.
    pub records: Vec<RawRecord>,
    /// `None` once the window is exhausted.
    pub next_token: Option<String>,
    pub deleted: usize,
    /// `completeListSize` when the server reports it.
    pub complete_list_size: Option<u64>,
}

/// Anything that can serve pages of raw records for a window.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        window: &HarvestWindow,
        token: Option<&str>,
    ) -> Result<Page, FetchError>;
}

pub struct OaiClient {
    client: reqwest::Client,
    base_url: String,
    metadata_prefix: String,
}

impl OaiClient {
    pub fn new(config: &OaiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build OAI HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            metadata_prefix: config.metadata_prefix.clone(),
        })
    }

    fn query<'a>(&'a self, window: &'a HarvestWindow, token: Option<&'a str>) -> Vec<(&'a str, &'a str)> {
        match token {
            Some(t) => vec![("verb", "ListRecords"), ("resumptionToken", t)],
            None => vec![
                ("verb", "ListRecords"),
                ("metadataPrefix", self.metadata_prefix.as_str()),
                ("from", window.from_date()),
                ("until", window.until_date()),
            ],
        }
    }
}

#[async_trait]
impl PageSource for OaiClient {
    async fn fetch_page(
        &self,
        window: &HarvestWindow,
        token: Option<&str>,
    ) -> Result<Page, FetchError> {
        tracing::debug!(window = %window, resumed = token.is_some(), "ListRecords");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&self.query(window, token))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Transport(format!(
                "OAI request failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        let body = resp.bytes().await?;
        let page = parse_page(&body)?;

        if let Some(size) = page.complete_list_size {
            tracing::debug!(complete_list_size = size, "window size reported by server");
        }
        if page.deleted > 0 {
            tracing::debug!(deleted = page.deleted, "skipped deletion tombstones");
        }
        Ok(page)
    }
}

/// Split a `ListRecords` response into live records and the next token.
///
/// An `<error>` envelope fails the whole page before any record is looked at.
pub fn parse_page(body: &[u8]) -> Result<Page, FetchError> {
    let root = parse_document(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    if root.namespace.as_deref() != Some(OAI_NS) || root.name != "OAI-PMH" {
        return Err(FetchError::Malformed(format!(
            "expected an OAI-PMH document, got <{}>",
            root.name
        )));
    }

    if let Some(err) = root.find_ns(OAI_NS, "error") {
        return Err(FetchError::Protocol {
            code: err.attr("code").unwrap_or_default().to_string(),
            message: err.text().unwrap_or_default().to_string(),
        });
    }

    let mut page = Page::default();
    for el in root.find_all_ns(OAI_NS, "record") {
        let record = RawRecord::new(el.clone());
        if record.is_deleted() {
            page.deleted += 1;
            continue;
        }
        page.records.push(record);
    }

    if let Some(rt) = root.find_ns(OAI_NS, "resumptionToken") {
        page.next_token = rt.text().map(str::to_string);
        page.complete_list_size = rt.attr("completeListSize").and_then(|s| s.parse().ok());
    }

    Ok(page)
}
