use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Credential, CredentialStore, StoreError};
use crate::api::User;

#[derive(Debug, Default)]
struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<User>,
}

/// Process-local credential store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    session: RwLock<Session>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            session: RwLock::new(Session {
                access_token: Some(credential.access_token),
                refresh_token: Some(credential.refresh_token),
                user: None,
            }),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn access_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.session.read().await.access_token.clone())
    }

    async fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.session.read().await.refresh_token.clone())
    }

    async fn save_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.session.write().await.access_token = Some(token.to_string());
        Ok(())
    }

    async fn save_refresh_token(&self, token: &str) -> Result<(), StoreError> {
        self.session.write().await.refresh_token = Some(token.to_string());
        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.session.write().await.user = Some(user.clone());
        Ok(())
    }

    async fn user(&self) -> Result<Option<User>, StoreError> {
        Ok(self.session.read().await.user.clone())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        *self.session.write().await = Session::default();
        Ok(())
    }
}
