//! REST platform client
//!
//! Endpoints, relative to the configured base URL:
//! - `GET  spaces/{root}/pages`       list pages (archived included)
//! - `POST spaces/{root}/pages`       create or upsert by `page_key`
//! - `PUT  pages/{id}`                replace title and body
//! - `POST pages/{id}/archive`        tag as archived

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::platform::{PageWrite, RemotePlatform};
use crate::config::PlatformConfig;
use crate::constants::network;
use crate::reconcile::{LivePage, LiveRemoteSnapshot};
use crate::types::{ErrorClassifier, PageKey, Result, SyncError};

const SOURCE: &str = "platform";
const TOKEN_ENV: &str = "WIKISYNC_PLATFORM_TOKEN";

pub struct HttpPlatform {
    base: Url,
    root_key: String,
    token: Option<SecretString>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPlatform")
            .field("base", &self.base.as_str())
            .field("root_key", &self.root_key)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpPlatform {
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let raw = config.base_url.as_deref().ok_or_else(|| {
            SyncError::Config("platform.base_url is required for the http platform".to_string())
        })?;
        let base = Url::parse(&format!("{}/", raw.trim_end_matches('/')))
            .map_err(|e| SyncError::Config(format!("Invalid platform.base_url: {}", e)))?;

        let token = config
            .token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(network::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base,
            root_key: config.root_key.clone(),
            token,
            client,
        })
    }

    /// Base URL extended by `segments`, each percent-encoded as one segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SyncError::Config(format!("platform.base_url cannot take a path: {}", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn pages_url(&self) -> Result<Url> {
        self.endpoint(&["spaces", &self.root_key, "pages"])
    }

    fn page_url(&self, remote_id: &str) -> Result<Url> {
        self.endpoint(&["pages", remote_id])
    }

    fn archive_url(&self, remote_id: &str) -> Result<Url> {
        self.endpoint(&["pages", remote_id, "archive"])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, SOURCE))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(ErrorClassifier::classify_http_status(
            status.as_u16(),
            &format!("{} {}", status, text),
            SOURCE,
        )
        .into())
    }
}

#[async_trait]
impl RemotePlatform for HttpPlatform {
    fn name(&self) -> &str {
        "http"
    }

    async fn snapshot(&self) -> Result<LiveRemoteSnapshot> {
        let response = self.send(self.client.get(self.pages_url()?)).await?;
        let entries: Vec<Value> = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, SOURCE))?;
        Ok(decode_snapshot(entries))
    }

    async fn create(&self, parent_remote_id: Option<&str>, page: &PageWrite) -> Result<String> {
        let body = CreateRequest {
            page_key: &page.page_key,
            parent_id: parent_remote_id,
            title: &page.title,
            body: &page.body,
        };
        let response = self
            .send(self.client.post(self.pages_url()?).json(&body))
            .await?;
        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, SOURCE))?;
        Ok(created.id)
    }

    async fn update(&self, remote_id: &str, page: &PageWrite) -> Result<()> {
        let body = UpdateRequest {
            page_key: &page.page_key,
            title: &page.title,
            body: &page.body,
        };
        self.send(self.client.put(self.page_url(remote_id)?).json(&body))
            .await?;
        Ok(())
    }

    async fn archive(&self, remote_id: &str) -> Result<()> {
        self.send(self.client.post(self.archive_url(remote_id)?))
            .await?;
        Ok(())
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Decode the page listing entry by entry. A bad entry only degrades
/// itself: wrong field types leave a page without a content hash, and an
/// entry without an id is kept as an unidentified key claim.
fn decode_snapshot(entries: Vec<Value>) -> LiveRemoteSnapshot {
    let mut pages = Vec::with_capacity(entries.len());
    let mut unidentified = Vec::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let page_key = entry
            .get("page_key")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .map(PageKey::from);

        let Some(remote_id) = entry.get("id").and_then(wire_id) else {
            match page_key {
                Some(key) => {
                    warn!(index, page_key = %key, "Remote page has no usable id");
                    unidentified.push(key);
                }
                None => warn!(index, "Skipping remote entry with neither id nor page_key"),
            }
            continue;
        };

        let title = optional_string(&entry, "title");
        let body = optional_string(&entry, "body");
        let archived = match entry.get("archived") {
            None | Some(Value::Null) => Some(false),
            Some(value) => value.as_bool(),
        };

        let page = match (title, body, archived) {
            (Some(title), Some(body), Some(archived)) => LivePage {
                remote_id,
                page_key,
                title,
                body,
                archived,
            },
            (_, _, archived) => {
                debug!(remote_id = %remote_id, "Remote page has malformed fields");
                LivePage {
                    remote_id,
                    page_key,
                    title: None,
                    body: None,
                    archived: archived.unwrap_or(false),
                }
            }
        };
        pages.push(page);
    }

    LiveRemoteSnapshot::new(pages).with_unidentified(unidentified)
}

fn wire_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `Some(None)` when absent or null, `None` when present with another type
fn optional_string(entry: &Value, field: &str) -> Option<Option<String>> {
    match entry.get(field) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => None,
    }
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    page_key: &'a PageKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    page_key: &'a PageKey,
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}
