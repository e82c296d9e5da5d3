//! The HTTP transport boundary. Kept as a trait so tests never have to
//! reach the real network -- a fake transport returning canned
//! status/body pairs stands in for `unittest.mock.AsyncMock` in the
//! Python original.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::keys::ApiKey;

/// Raw outcome of one transport call, before §4.4 classification.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportResponse {
    /// 2xx with a decoded JSON body.
    Ok(serde_json::Value),
    /// Non-2xx HTTP response with a (possibly empty) decoded JSON body.
    Http { status: u16, body: serde_json::Value },
    /// The request never reached the server (DNS, TLS, connection reset,
    /// timeout). Always classified as transient.
    Network(String),
}

/// A bound-to-one-key HTTP transport for the YouTube Data API v3.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, endpoint: &str, key: &ApiKey, params: &BTreeMap<String, String>) -> TransportResponse;
}

/// `reqwest`-backed transport. One instance is stateless with respect to
/// keys -- the key is passed as a query parameter per call, matching the
/// Data API's auth scheme (spec.md §6).
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
        }
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, endpoint: &str, key: &ApiKey, params: &BTreeMap<String, String>) -> TransportResponse {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.client.get(&url).query(&[("key", key.as_str())]);
        for (k, v) in params {
            request = request.query(&[(k.as_str(), v.as_str())]);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return TransportResponse::Network(e.to_string()),
        };

        let status = response.status().as_u16();
        let body: serde_json::Value = match response.json().await {
            Ok(b) => b,
            Err(_) => serde_json::Value::Null,
        };

        if (200..300).contains(&status) {
            TransportResponse::Ok(body)
        } else {
            TransportResponse::Http { status, body }
        }
    }
}
