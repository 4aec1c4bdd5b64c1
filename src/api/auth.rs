//! Sign-in, registration and session lifecycle.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{Value as JsonValue, json};

use super::endpoints;
use super::error::ServiceError;
use super::types::{ApiResponse, AuthData, LoginCredentials, RegisterData, User};
use crate::credentials::CredentialStore;
use crate::http::{ApiRequest, AuthenticatedHttpClient};
use crate::log::mask_string;
use crate::validation::{validate_email, validate_name, validate_password, validate_phone};

pub struct AuthService {
    client: Arc<AuthenticatedHttpClient>,
}

impl AuthService {
    pub fn new(client: Arc<AuthenticatedHttpClient>) -> Self {
        Self { client }
    }

    fn store(&self) -> &Arc<dyn CredentialStore> {
        self.client.credential_store()
    }

    /// Signs in and, when the server reports success, stores whatever tokens
    /// and profile it returned.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<ApiResponse<AuthData>, ServiceError> {
        validate_email(&credentials.email)?;
        validate_password(&credentials.password)?;

        let response: ApiResponse<AuthData> = self.client.post_json(endpoints::LOGIN, credentials).await?;

        if response.success {
            if let Some(data) = &response.data {
                debug!(
                    has_access_token = data.access_token.is_some(),
                    has_refresh_token = data.refresh_token.is_some(),
                    has_user = data.user.is_some();
                    "Login response received"
                );
                if let Some(access_token) = &data.access_token {
                    self.store().save_access_token(access_token).await?;
                }
                if let Some(refresh_token) = &data.refresh_token {
                    self.store().save_refresh_token(refresh_token).await?;
                }
                if let Some(user) = &data.user {
                    self.store().save_user(user).await?;
                }
            }
            info!(email:% = mask_string(&credentials.email); "Logged in");
        }

        Ok(response)
    }

    /// Creates an account. If the server signs the new user in straight away,
    /// the returned session is stored.
    pub async fn register(&self, data: &RegisterData) -> Result<ApiResponse<AuthData>, ServiceError> {
        validate_name(&data.name)?;
        validate_email(&data.email)?;
        validate_password(&data.password)?;
        validate_phone(&data.phone)?;

        let response: ApiResponse<AuthData> = self.client.post_json(endpoints::REGISTER, data).await?;

        if response.success {
            if let Some(AuthData {
                access_token: Some(access_token),
                refresh_token,
                user,
            }) = &response.data
            {
                self.store().save_access_token(access_token).await?;
                if let Some(refresh_token) = refresh_token {
                    self.store().save_refresh_token(refresh_token).await?;
                }
                if let Some(user) = user {
                    self.store().save_user(user).await?;
                }
                info!(email:% = mask_string(&data.email); "Registered and signed in");
            }
        }

        Ok(response)
    }

    /// Ends the session. The server call is best effort; local credentials are
    /// cleared regardless of its outcome.
    pub async fn logout(&self) -> Result<(), ServiceError> {
        if let Err(e) = self.client.send(ApiRequest::post(endpoints::LOGOUT)).await {
            warn!(error:% = e; "Logout request failed, clearing local session anyway");
        }
        self.store().clear_all().await?;
        info!("Logged out");
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<ApiResponse<JsonValue>, ServiceError> {
        validate_email(email)?;
        Ok(self
            .client
            .post_json(endpoints::RESET_PASSWORD, &json!({ "email": email }))
            .await?)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<ApiResponse<JsonValue>, ServiceError> {
        validate_email(email)?;
        Ok(self
            .client
            .post_json(endpoints::FORGOT_PASSWORD, &json!({ "email": email }))
            .await?)
    }

    pub async fn send_otp(&self, email: &str) -> Result<ApiResponse<JsonValue>, ServiceError> {
        validate_email(email)?;
        Ok(self.client.post_json(endpoints::SEND_OTP, &json!({ "email": email })).await?)
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<ApiResponse<JsonValue>, ServiceError> {
        validate_email(email)?;
        Ok(self
            .client
            .post_json(endpoints::VERIFY_OTP, &json!({ "email": email, "otp": otp }))
            .await?)
    }

    pub async fn is_authenticated(&self) -> Result<bool, ServiceError> {
        Ok(self.store().access_token().await?.is_some())
    }

    pub async fn current_user(&self) -> Result<Option<User>, ServiceError> {
        Ok(self.store().user().await?)
    }
}
