//! Telegram Bot API client for sticker pack metadata and file downloads.
//!
//! Stateless request wrapper. Metadata comes from `getStickerSet`; item
//! bytes are a two-step fetch: `getFile` resolves a short-lived path, then
//! the bytes are pulled from the file base URL.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::PackSource;

/// Errors from the remote API
#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential configured; surfaced synchronously, no request is made
    #[error("no bot token configured")]
    MissingToken,

    #[error("pack or file not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed API response: {0}")]
    Malformed(String),
}

/// Response envelope used by every Bot API method
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Pack metadata as returned by `getStickerSet`
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePack {
    /// Canonical identifier
    pub name: String,
    /// Display title
    pub title: String,
    /// Items in pack order
    pub stickers: Vec<RemoteItem>,
}

/// One sticker entry in the remote metadata
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteItem {
    pub file_id: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub is_animated: bool,
}

/// Short-lived download descriptor from `getFile`
#[derive(Debug, Deserialize)]
struct FileDescriptor {
    file_path: String,
}

/// Normalize a raw pack name or a pasted share URL into a canonical
/// identifier. Accepts forms like `t.me/addstickers/Name?startapp=x`.
pub fn normalize_pack_ref(reference: &str) -> String {
    let mut name = reference.trim();
    if let Some(pos) = name.rfind("addstickers/") {
        name = &name[pos + "addstickers/".len()..];
    }
    if let Some(pos) = name.find('?') {
        name = &name[..pos];
    }
    name.trim_matches('/').to_string()
}

/// Telegram Bot API client
pub struct TelegramClient {
    token: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a method URL
    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.token, method)
    }

    /// Build a file download URL from a short-lived descriptor path
    fn file_url(&self, file_path: &str) -> String {
        format!("https://api.telegram.org/file/bot{}/{}", self.token, file_path)
    }

    /// Unwrap the `{ok, result, description}` envelope
    fn unwrap_envelope<T>(response: ApiResponse<T>, what: &str) -> Result<T, ApiError> {
        if !response.ok {
            let description = response.description.unwrap_or_default();
            if description.to_lowercase().contains("not found") {
                return Err(ApiError::NotFound(what.to_string()));
            }
            return Err(ApiError::Malformed(format!("{}: {}", what, description)));
        }
        response
            .result
            .ok_or_else(|| ApiError::Malformed(format!("{}: ok response without result", what)))
    }
}

#[async_trait]
impl PackSource for TelegramClient {
    fn is_configured(&self) -> bool {
        !self.token.trim().is_empty()
    }

    async fn fetch_pack(&self, reference: &str) -> Result<RemotePack, ApiError> {
        if !self.is_configured() {
            return Err(ApiError::MissingToken);
        }

        let name = normalize_pack_ref(reference);
        tracing::info!("Fetching pack metadata for {}", name);

        let response: ApiResponse<RemotePack> = self
            .client
            .get(self.api_url("getStickerSet"))
            .query(&[("name", name.as_str())])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))?;

        Self::unwrap_envelope(response, &name)
    }

    async fn fetch_item_bytes(&self, file_id: &str) -> Result<(Vec<u8>, String), ApiError> {
        if !self.is_configured() {
            return Err(ApiError::MissingToken);
        }

        // Step 1: resolve the short-lived download descriptor
        let response: ApiResponse<FileDescriptor> = self
            .client
            .get(self.api_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))?;

        let descriptor = Self::unwrap_envelope(response, file_id)?;

        // Step 2: fetch the raw bytes
        let bytes_response = self
            .client
            .get(self.file_url(&descriptor.file_path))
            .send()
            .await?;

        if bytes_response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(file_id.to_string()));
        }
        if !bytes_response.status().is_success() {
            return Err(ApiError::Malformed(format!(
                "file fetch returned {}",
                bytes_response.status()
            )));
        }

        let bytes = bytes_response.bytes().await?.to_vec();
        Ok((bytes, descriptor.file_path))
    }
}
