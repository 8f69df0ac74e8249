//! Adapter interfaces for external systems.
//!
//! The remote pack API is consumed through the `PackSource` trait so the
//! ingest pipeline can be driven by a stub in tests.

pub mod telegram;

use async_trait::async_trait;

pub use telegram::{normalize_pack_ref, ApiError, RemoteItem, RemotePack, TelegramClient};

/// Trait for remote pack providers
#[async_trait]
pub trait PackSource: Send + Sync {
    /// Whether a credential is configured. Checked before queueing so a
    /// missing credential fails fast without any network call.
    fn is_configured(&self) -> bool;

    /// Fetch pack metadata by name or pasted share URL
    async fn fetch_pack(&self, reference: &str) -> Result<RemotePack, ApiError>;

    /// Resolve and fetch one item's raw bytes. Returns the bytes and the
    /// remote path they were served from (used for format sniffing).
    async fn fetch_item_bytes(&self, file_id: &str) -> Result<(Vec<u8>, String), ApiError>;
}
