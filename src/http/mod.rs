//! Authenticated HTTP client for the ePay wallet API.
//!
//! [`AuthenticatedHttpClient`] wraps a `reqwest` client in a middleware chain
//! that takes care of credentials so call sites never do:
//!
//! - the stored access token is attached verbatim as `Authorization`
//!   (no `Bearer` prefix, the server expects the bare token)
//! - a 401 triggers one token refresh against the refresh endpoint and one
//!   replay of the original request
//! - concurrent 401s share a single in-flight refresh
//! - a failed refresh clears the credential store and surfaces
//!   [`ApiError::RefreshFailed`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use url::Url;
//! use epay::credentials::InMemoryCredentialStore;
//! use epay::http::{ApiRequest, AuthenticatedHttpClient};
//!
//! # async fn example() -> Result<(), anyhow::Error> {
//! let store = Arc::new(InMemoryCredentialStore::new());
//! let client = AuthenticatedHttpClient::new(Url::parse("https://epay-backend.vercel.app/api/v1")?, store)?;
//!
//! let body = client.send(ApiRequest::get("/wallet/me")).await?;
//! println!("{}", String::from_utf8_lossy(&body));
//! # Ok(())
//! # }
//! ```

mod auth_middleware;
mod error;
mod http_client;
mod refresh;
mod types;

pub use error::{ApiError, RefreshError};
pub use http_client::{AuthenticatedHttpClient, DEFAULT_REFRESH_PATH, DEFAULT_TIMEOUT};
pub use types::{ApiRequest, RefreshResult};
