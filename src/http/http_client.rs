use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::auth_middleware::AuthMiddleware;
use super::error::ApiError;
use super::refresh::TokenRefresher;
use super::types::ApiRequest;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh-token";

/// HTTP client for the wallet API that handles credentials on behalf of its
/// callers.
///
/// Every request carries the stored access token in `Authorization`. A 401 is
/// answered with at most one token refresh and one replay of the original
/// request; concurrent requests that hit a 401 share a single refresh call. If
/// the refresh fails, the credential store is cleared and the caller receives
/// [`ApiError::RefreshFailed`].
///
/// The client is cheap to share: wrap it in an `Arc` and use it from as many
/// tasks as needed.
pub struct AuthenticatedHttpClient {
    base_url: Url,
    client: reqwest_middleware::ClientWithMiddleware,
    store: Arc<dyn CredentialStore>,
}

impl AuthenticatedHttpClient {
    /// Creates a client with the default 30 second timeout and refresh endpoint.
    pub fn new(base_url: Url, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Self::with_config(base_url, DEFAULT_TIMEOUT, DEFAULT_REFRESH_PATH, store)
    }

    pub fn from_config(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)?;
        Self::with_config(base_url, config.timeout(), &config.refresh_path, store)
    }

    pub fn with_config(
        base_url: Url,
        timeout: Duration,
        refresh_path: &str,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let base_url = normalize_base(base_url);
        let refresh_url = endpoint_url(&base_url, refresh_path)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let inner_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(ApiError::ClientBuild)?;

        let refresher = Arc::new(TokenRefresher::new(
            inner_client.clone(),
            refresh_url,
            Arc::clone(&store),
        ));

        let client = reqwest_middleware::ClientBuilder::new(inner_client)
            .with(AuthMiddleware::new(Arc::clone(&store), refresher))
            .build();

        Ok(Self {
            base_url,
            client,
            store,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The store this client reads and rotates tokens in.
    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Sends `request` and returns the response body unchanged on 2xx.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Network`] when the server could not be reached
    /// - [`ApiError::Http`] for any non-2xx response that was not recovered,
    ///   including a 401 when no refresh token is stored or the replay was
    ///   rejected again
    /// - [`ApiError::RefreshFailed`] when the refresh call failed; the store
    ///   has been cleared by then
    pub async fn send(&self, request: ApiRequest) -> Result<Vec<u8>, ApiError> {
        let mut url = endpoint_url(&self.base_url, &request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }

        debug!(method:% = request.method, url:% = url; "Sending API request");

        let mut req = self.client.request(request.method, url).headers(request.headers);
        if let Some(body) = request.body {
            req = req.body(serde_json::to_string(&body)?);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let resp_url = resp.url().clone();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".into());
            warn!(status = status.as_u16(), url:% = resp_url; "API request failed");
            return Err(ApiError::Http { status, body });
        }

        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let body = self.send(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::post(path).json(body)?).await
    }
}

/// Ensures the base URL ends with `/` so joining appends to its path.
fn normalize_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

/// Resolves `path` under `base`, keeping any versioned prefix of the base URL.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> Result<Url, ApiError> {
    if Url::parse(path).is_ok() {
        return Err(ApiError::InvalidPath(path.to_string()));
    }
    let base = normalize_base(base.clone());
    Ok(base.join(path.trim_start_matches('/'))?)
}
