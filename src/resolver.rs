//! Pure input classification: decides, for one input string, whether it
//! resolves cheaply (no quota), via a cheap API lookup, or must be
//! deferred to an expensive search. At most one API call per input.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::error::CollectorError;
use crate::youtube::Transport;
use crate::youtube::YouTubeClient;

static RE_CHANNEL_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"UC[A-Za-z0-9_-]{22}").unwrap());
static RE_USER_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"/user/([A-Za-z0-9_-]+)").unwrap());
static RE_HANDLE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"/@([A-Za-z0-9_.\-]+)").unwrap());
static RE_CUSTOM_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"/c/([A-Za-z0-9_-]+)").unwrap());
static RE_RAW_HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@?[A-Za-z0-9_.\-]+$").unwrap());

const MAX_RAW_HANDLE_LEN: usize = 70;

/// Which rule in §4.6 matched. Tracked only for diagnostics (log lines,
/// not externally visible behavior) -- mirrors `ResolveResult.input_type`
/// in the reference resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    ChannelId,
    UserUrl,
    Handle,
    CustomUrl,
    RawHandle,
    Unrecognized,
}

/// The outcome of classifying one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved { channel_id: String, input_kind: InputKind },
    NeedsSearchFallback { reason: String },
    Failed { reason: String },
}

/// Classifies `input` and, when a cheap API lookup is warranted, issues at
/// most one call against `client` on behalf of `tenant_id`. A business-level
/// miss (user/handle not found, unrecognized format) comes back as
/// `Ok(ResolveOutcome::Failed)`; a genuine API fault (quota exhausted past
/// its retries, fatal HTTP error, no keys available) propagates as `Err`
/// for the caller's catch-all handling.
#[instrument(skip(client))]
pub async fn resolve<T: Transport>(
    input: &str,
    tenant_id: &str,
    client: &YouTubeClient<T>,
) -> Result<ResolveOutcome, CollectorError> {
    let input = input.trim();

    if let Some(m) = RE_CHANNEL_ID.find(input) {
        let channel_id = m.as_str().to_string();
        info!(channel_id, "resolved direct channel id");
        return Ok(ResolveOutcome::Resolved {
            channel_id,
            input_kind: InputKind::ChannelId,
        });
    }

    if let Some(caps) = RE_USER_URL.captures(input) {
        let username = caps[1].to_string();
        return Ok(match lookup_by_username(client, tenant_id, &username).await? {
            Some(channel_id) => ResolveOutcome::Resolved {
                channel_id,
                input_kind: InputKind::UserUrl,
            },
            None => ResolveOutcome::Failed {
                reason: format!("user '{username}' not found"),
            },
        });
    }

    if let Some(caps) = RE_HANDLE_URL.captures(input) {
        let handle = caps[1].to_string();
        return Ok(match lookup_by_handle(client, tenant_id, &handle).await? {
            Some(channel_id) => ResolveOutcome::Resolved {
                channel_id,
                input_kind: InputKind::Handle,
            },
            None => ResolveOutcome::Failed {
                reason: format!("handle '@{handle}' not found"),
            },
        });
    }

    if let Some(caps) = RE_CUSTOM_URL.captures(input) {
        let custom_name = caps[1].to_string();
        info!(custom_name, "custom /c/ URL requires search fallback");
        return Ok(ResolveOutcome::NeedsSearchFallback {
            reason: format!("custom URL '/c/{custom_name}' requires a search API call"),
        });
    }

    if RE_RAW_HANDLE.is_match(input) {
        if input.len() > MAX_RAW_HANDLE_LEN || input.contains(char::is_whitespace) {
            return Ok(ResolveOutcome::Failed {
                reason: "unrecognized input format".to_string(),
            });
        }
        let handle = input.trim_start_matches('@').to_string();
        return Ok(match lookup_by_handle(client, tenant_id, &handle).await? {
            Some(channel_id) => ResolveOutcome::Resolved {
                channel_id,
                input_kind: InputKind::RawHandle,
            },
            None => ResolveOutcome::Failed {
                reason: format!("handle '{handle}' not found"),
            },
        });
    }

    warn!(input, "unrecognized input format");
    Ok(ResolveOutcome::Failed {
        reason: "unrecognized input format".to_string(),
    })
}

async fn lookup_by_username<T: Transport>(
    client: &YouTubeClient<T>,
    tenant_id: &str,
    username: &str,
) -> Result<Option<String>, CollectorError> {
    let mut params = BTreeMap::new();
    params.insert("part".to_string(), "id".to_string());
    params.insert("forUsername".to_string(), username.to_string());
    let body = client.channels_list(tenant_id, params).await?;
    Ok(first_channel_id(&body))
}

async fn lookup_by_handle<T: Transport>(
    client: &YouTubeClient<T>,
    tenant_id: &str,
    handle: &str,
) -> Result<Option<String>, CollectorError> {
    let mut params = BTreeMap::new();
    params.insert("part".to_string(), "id".to_string());
    params.insert("forHandle".to_string(), handle.trim_start_matches('@').to_string());
    let body = client.channels_list(tenant_id, params).await?;
    Ok(first_channel_id(&body))
}

fn first_channel_id(body: &serde_json::Value) -> Option<String> {
    body.get("items")?
        .as_array()?
        .first()?
        .get("id")?
        .as_str()
        .map(str::to_string)
}
