use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, trace};
use tokio::fs;
use tokio::sync::Mutex;

use super::{CredentialStore, StoreError};
use crate::api::User;

const ACCESS_TOKEN_KEY: &str = "@epay/access_token";
const REFRESH_TOKEN_KEY: &str = "@epay/refresh_token";
const USER_DATA_KEY: &str = "@epay/user_data";

type Entries = BTreeMap<String, String>;

/// Credential store backed by a JSON key-value document on disk.
///
/// Values are plain strings; the cached user is stored as serialized JSON
/// under its own key. Keys this store does not own are preserved on write.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Entries, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Entries::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, entries: &Entries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        fs::rename(&tmp, &self.path).await?;
        trace!(path:% = self.path.display(), keys = entries.len(); "Credential file written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.get(ACCESS_TOKEN_KEY).await
    }

    async fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.get(REFRESH_TOKEN_KEY).await
    }

    async fn save_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.set(ACCESS_TOKEN_KEY, token.to_string()).await
    }

    async fn save_refresh_token(&self, token: &str) -> Result<(), StoreError> {
        self.set(REFRESH_TOKEN_KEY, token.to_string()).await
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let json = serde_json::to_string(user)?;
        self.set(USER_DATA_KEY, json).await
    }

    async fn user(&self) -> Result<Option<User>, StoreError> {
        match self.get(USER_DATA_KEY).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_DATA_KEY] {
            entries.remove(key);
        }
        self.persist(&entries).await?;
        debug!(path:% = self.path.display(); "Stored credentials cleared");
        Ok(())
    }
}
