//! The API client facade: typed endpoints over the retry pipeline.
//!
//! `YouTubeClient` is the only place transport objects are constructed; a
//! fresh `Transport` is built for every key the retry pipeline hands it,
//! mirroring `build_youtube_client`/`_build_service` in the original
//! implementation always constructing a new service object per key.

mod transport;
pub mod mock;

pub use transport::HttpTransport;
pub use transport::Transport;
pub use transport::TransportResponse;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::instrument;

use crate::error::ApiError;
use crate::error::PipelineError;
use crate::keys::ApiKey;
use crate::retry::Pipeline;

/// Quota error reasons recognized in the YouTube Data API's
/// `error.errors[*].reason` field.
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded", "userRateLimitExceeded"];

/// Decoded JSON response body from any of the three endpoints.
pub type ApiResponse = serde_json::Value;

/// Typed facade over `channels.list`, `playlistItems.list` and
/// `videos.list`, each one call through the retry pipeline.
pub struct YouTubeClient<T: Transport> {
    pipeline: Arc<Pipeline>,
    transport: Arc<T>,
}

impl<T: Transport> YouTubeClient<T> {
    pub fn new(pipeline: Arc<Pipeline>, transport: Arc<T>) -> Self {
        Self { pipeline, transport }
    }

    #[instrument(skip(self, params))]
    pub async fn channels_list(
        &self,
        tenant_id: &str,
        params: BTreeMap<String, String>,
    ) -> Result<ApiResponse, PipelineError> {
        self.call(tenant_id, "channels", params).await
    }

    pub async fn playlist_items_list(
        &self,
        tenant_id: &str,
        params: BTreeMap<String, String>,
    ) -> Result<ApiResponse, PipelineError> {
        self.call(tenant_id, "playlistItems", params).await
    }

    pub async fn videos_list(
        &self,
        tenant_id: &str,
        params: BTreeMap<String, String>,
    ) -> Result<ApiResponse, PipelineError> {
        self.call(tenant_id, "videos", params).await
    }

    async fn call(
        &self,
        tenant_id: &str,
        endpoint: &str,
        params: BTreeMap<String, String>,
    ) -> Result<ApiResponse, PipelineError> {
        let transport = self.transport.clone();
        let endpoint = endpoint.to_string();
        self.pipeline
            .execute(tenant_id, move |key: ApiKey| {
                let transport = transport.clone();
                let endpoint = endpoint.clone();
                let params = params.clone();
                async move {
                    let response = transport.get(&endpoint, &key, &params).await;
                    classify(response)
                }
            })
            .await
    }
}

/// Classifies a raw transport response into success or the §4.4 error
/// taxonomy (QUOTA / TRANSIENT / FATAL_CLIENT).
fn classify(response: TransportResponse) -> Result<ApiResponse, ApiError> {
    match response {
        TransportResponse::Ok(body) => Ok(body),
        TransportResponse::Http { status, body } => {
            let reasons = extract_reasons(&body);
            if status == 403 && reasons.iter().any(|r| QUOTA_REASONS.contains(&r.as_str())) {
                return Err(ApiError::Quota);
            }
            if status == 429 || status >= 500 {
                return Err(ApiError::Transient(format!("HTTP {status}")));
            }
            Err(ApiError::FatalClient(format!("HTTP {status}: {body}")))
        }
        TransportResponse::Network(message) => Err(ApiError::Transient(message)),
    }
}

fn extract_reasons(body: &serde_json::Value) -> Vec<String> {
    body.get("error")
        .and_then(|e| e.get("errors"))
        .and_then(|errors| errors.as_array())
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("reason").and_then(|r| r.as_str()).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
