//! Detail and tab fetches.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::host::AjaxEnvelope;
use crate::query::{ListRequest, ListResponse};
use crate::refresh::ListSource;

/// Response to a detail fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailPayload {
    pub title: String,
    /// Tab id to HTML fragment; ids must match the declared tabs
    #[serde(default)]
    pub tabs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DetailPayload {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_tab(mut self, tab: impl Into<String>, html: impl Into<String>) -> Self {
        self.tabs.insert(tab.into(), html.into());
        self
    }

    pub fn with_content(mut self, html: impl Into<String>) -> Self {
        self.content = Some(html.into());
        self
    }
}

/// Response to a lazy tab fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabPayload {
    pub html: String,
}

impl TabPayload {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

/// Identifier of one issued detail fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fetches detail and tab content for a record.
///
/// Controllers drop the returned future when a request is superseded, so
/// implementations must not rely on running to completion.
#[async_trait]
pub trait DetailTransport: Send + Sync {
    /// Fetch the detail payload of one record.
    async fn fetch_detail(&self, entity: &str, record_id: i64) -> Result<DetailPayload>;

    /// Fetch the content of one deferred tab.
    async fn fetch_tab(&self, entity: &str, record_id: i64, tab: &str) -> Result<TabPayload>;
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// The host's ajax endpoint
    pub endpoint: String,
    /// Prefix of every action name (`<prefix>_<entity>_details`)
    pub action_prefix: String,
    /// Anti-forgery token forwarded as `nonce`
    pub nonce: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl HttpTransportConfig {
    pub fn new(endpoint: impl Into<String>, action_prefix: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            action_prefix: action_prefix.into(),
            nonce: None,
            timeout_ms: 30_000,
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }
}

/// Talks to the host's ajax endpoint with form POSTs.
pub struct HttpTransport {
    config: HttpTransportConfig,
    http: Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { config, http })
    }

    /// Full action name for an entity operation.
    pub fn action(&self, entity: &str, operation: &str) -> String {
        format!("{}_{}_{}", self.config.action_prefix, entity, operation)
    }

    async fn post<T: DeserializeOwned>(&self, mut form: Vec<(&str, String)>) -> Result<T> {
        if let Some(nonce) = &self.config.nonce {
            form.push(("nonce", nonce.clone()));
        }

        let response = self
            .http
            .post(&self.config.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::transport(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::transport(format!("endpoint returned {}", status)));
        }

        let envelope: AjaxEnvelope = serde_json::from_str(&body)
            .map_err(|e| Error::protocol(format!("malformed envelope: {}", e)))?;
        envelope.into_result()
    }
}

#[async_trait]
impl DetailTransport for HttpTransport {
    async fn fetch_detail(&self, entity: &str, record_id: i64) -> Result<DetailPayload> {
        self.post(vec![
            ("action", self.action(entity, "details")),
            ("id", record_id.to_string()),
        ])
        .await
    }

    async fn fetch_tab(&self, entity: &str, record_id: i64, tab: &str) -> Result<TabPayload> {
        self.post(vec![
            ("action", self.action(entity, "tab")),
            ("id", record_id.to_string()),
            ("tab", tab.to_string()),
        ])
        .await
    }
}

#[async_trait]
impl ListSource for HttpTransport {
    async fn fetch_list(&self, entity: &str, request: &ListRequest) -> Result<ListResponse> {
        self.post(vec![
            ("action", self.action(entity, "list")),
            ("request", serde_json::to_string(request)?),
        ])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detail_payload_wire_shape() {
        let payload: DetailPayload = serde_json::from_str(
            r#"{"title":"Widget 42","tabs":{"overview":"<p>o</p>"}}"#,
        )
        .unwrap();
        assert_eq!(
            payload,
            DetailPayload::new("Widget 42").with_tab("overview", "<p>o</p>")
        );
        assert_eq!(payload.content, None);
    }

    #[test]
    fn test_action_names() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("http://localhost/ajax", "gp")).unwrap();
        assert_eq!(transport.action("widget", "details"), "gp_widget_details");
        assert_eq!(transport.action("widget", "list"), "gp_widget_list");
    }

    #[test]
    fn test_config_builder() {
        let config = HttpTransportConfig::new("http://localhost/ajax", "gp")
            .with_nonce("abc")
            .with_timeout_ms(500);
        assert_eq!(config.nonce.as_deref(), Some("abc"));
        assert_eq!(config.timeout_ms, 500);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
