//! Kontur Elba API client
//!
//! The exact resource layout of the Elba API is not guaranteed, so listings
//! are discovered by endpoint probing: an ordered list of candidate paths is
//! tried and the first one yielding at least one item wins. Each candidate is
//! paginated with `skip`/`limit`; a page shorter than the page size ends it.

use async_stream::stream;
use async_trait::async_trait;
use ebsync_common::config::SourceConfig;
use ebsync_common::{Error, Result};
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde_json::Value;

use crate::models::{extract_items, first_string, ContactPerson, Counterparty};
use crate::types::SourceSystem;

// X-Kontur-ApiKey
const API_KEY_HEADER: &str = "x-kontur-apikey";
const ORGANIZATION_KEYS: &[&str] = &["organizations", "items"];
const COUNTERPARTY_LIST_KEYS: &[&str] = &["items", "counterparties", "contractors"];
const CONTACT_LIST_KEYS: &[&str] = &["items", "contacts"];

/// Elba API client
pub struct ElbaClient {
    http_client: reqwest::Client,
    base_url: Url,
    page_size: usize,
}

impl ElbaClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| Error::Config(format!("Elba API key is not a valid header value: {}", e)))?;
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Elba base URL '{}': {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("Elba base URL '{}' cannot carry a path", config.base_url)));
        }

        Ok(Self {
            http_client,
            base_url,
            page_size: config.page_size,
        })
    }

    /// Base URL with `segments` appended; each segment is percent-encoded
    fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.to_string()
    }

    /// Candidate counterparty listing URLs, highest priority first
    pub fn counterparty_endpoints(&self, organization_id: &str) -> Vec<String> {
        vec![
            self.endpoint(&["organizations", organization_id, "counterparties"]),
            self.endpoint(&["organizations", organization_id, "contractors"]),
            self.endpoint(&["counterparties"]),
            self.endpoint(&["contractors"]),
        ]
    }

    /// Candidate contact listing URLs for one counterparty, highest priority first
    pub fn contact_endpoints(&self, organization_id: &str, counterparty_id: &str) -> Vec<String> {
        vec![
            self.endpoint(&["organizations", organization_id, "counterparties", counterparty_id, "contacts"]),
            self.endpoint(&["organizations", organization_id, "contractors", counterparty_id, "contacts"]),
            self.endpoint(&["counterparties", counterparty_id, "contacts"]),
            self.endpoint(&["contractors", counterparty_id, "contacts"]),
        ]
    }

    async fn get_json(&self, url: &str, query: &[(&str, usize)]) -> Result<Value> {
        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| Error::Parse(format!("{}: {}", url, e)))
    }

    async fn fetch_page(&self, url: &str, skip: usize, item_keys: &[&str]) -> Result<Vec<Value>> {
        let body = self
            .get_json(url, &[("skip", skip), ("limit", self.page_size)])
            .await?;
        Ok(extract_items(&body, item_keys))
    }

    /// All items of one endpoint, page by page.
    ///
    /// A failing page ends the listing with a warning; items already yielded stand.
    fn paginate<'a>(
        &'a self,
        url: String,
        item_keys: &'static [&'static str],
    ) -> impl Stream<Item = Value> + Send + 'a {
        stream! {
            let mut skip = 0;
            loop {
                match self.fetch_page(&url, skip, item_keys).await {
                    Ok(batch) => {
                        let received = batch.len();
                        tracing::debug!(endpoint = %url, skip, received, "Fetched Elba page");
                        for item in batch {
                            yield item;
                        }
                        if received < self.page_size {
                            break;
                        }
                        skip += self.page_size;
                    }
                    Err(e) => {
                        tracing::warn!(endpoint = %url, skip, error = %e, "Elba request failed, stopping pagination");
                        break;
                    }
                }
            }
        }
    }

    /// First candidate endpoint that yields data wins; later candidates are never requested.
    fn probe<'a>(
        &'a self,
        listing: &'static str,
        candidates: Vec<String>,
        item_keys: &'static [&'static str],
    ) -> impl Stream<Item = Value> + Send + 'a {
        stream! {
            for endpoint in candidates {
                let mut items = Box::pin(self.paginate(endpoint.clone(), item_keys));
                let mut received = 0usize;
                while let Some(item) = items.next().await {
                    received += 1;
                    yield item;
                }

                if received > 0 {
                    tracing::info!(listing, endpoint = %endpoint, received, "Elba listing retrieved");
                    return;
                }
                tracing::debug!(listing, endpoint = %endpoint, "Endpoint returned no data, trying next candidate");
            }

            let unavailable = Error::SourceUnavailable(format!(
                "no candidate endpoint returned {}; check the token permissions",
                listing
            ));
            tracing::warn!(listing, error = %unavailable, "Elba listing is empty");
        }
    }
}

#[async_trait]
impl SourceSystem for ElbaClient {
    async fn resolve_organization_id(&self) -> Result<String> {
        let url = self.endpoint(&["organizations"]);
        let body = self.get_json(&url, &[("limit", 1)]).await.map_err(|e| {
            Error::Config(format!("Cannot resolve Elba organization (GET {}): {}", url, e))
        })?;

        let organizations = extract_items(&body, ORGANIZATION_KEYS);
        let first = organizations.first().ok_or_else(|| {
            Error::Config("No own organization found in Elba (GET /organizations)".to_string())
        })?;

        first_string(first, &["id", "organizationId"]).ok_or_else(|| {
            Error::Config("Elba organization record carries no id".to_string())
        })
    }

    fn list_counterparties<'a>(&'a self, organization_id: &'a str) -> BoxStream<'a, Counterparty> {
        self.probe(
            "counterparties",
            self.counterparty_endpoints(organization_id),
            COUNTERPARTY_LIST_KEYS,
        )
        .map(|item| Counterparty::from_json(&item))
        .boxed()
    }

    fn list_contacts<'a>(
        &'a self,
        organization_id: &'a str,
        counterparty_id: &'a str,
    ) -> BoxStream<'a, ContactPerson> {
        self.probe(
            "contacts",
            self.contact_endpoints(organization_id, counterparty_id),
            CONTACT_LIST_KEYS,
        )
        .map(|item| ContactPerson::from_json(&item))
        .boxed()
    }
}
