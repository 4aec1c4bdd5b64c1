//! Token and session storage used by the authenticated HTTP client.
//!
//! The client never persists credentials itself; it reads and writes them
//! through a [`CredentialStore`] handed to it at construction time.
//!
//! - [`InMemoryCredentialStore`] keeps everything in process memory
//! - [`FileCredentialStore`] persists a small JSON key-value document on disk

mod file;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::User;

pub use file::FileCredentialStore;
pub use memory::InMemoryCredentialStore;

/// Access/refresh token pair created at login and rotated at refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credential storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential storage is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent holder of the session's tokens and cached user profile.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn access_token(&self) -> Result<Option<String>, StoreError>;

    async fn refresh_token(&self) -> Result<Option<String>, StoreError>;

    async fn save_access_token(&self, token: &str) -> Result<(), StoreError>;

    async fn save_refresh_token(&self, token: &str) -> Result<(), StoreError>;

    async fn save_user(&self, user: &User) -> Result<(), StoreError>;

    async fn user(&self) -> Result<Option<User>, StoreError>;

    /// Removes both tokens and the cached user.
    async fn clear_all(&self) -> Result<(), StoreError>;

    async fn save_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        self.save_access_token(&credential.access_token).await?;
        self.save_refresh_token(&credential.refresh_token).await
    }
}
