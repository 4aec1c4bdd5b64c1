//! Error types for the authenticated HTTP client.
//!
//! Callers see three families of failure:
//!
//! - **Network**: [`ApiError::Network`], no response reached the client
//! - **Server rejection**: [`ApiError::Http`], the server answered with a non-2xx status
//! - **Session lost**: [`ApiError::RefreshFailed`], a 401 could not be recovered
//!   and the stored credentials were cleared
//!
//! The remaining variants are raised before anything is sent.

use reqwest::StatusCode;
use thiserror::Error;

use crate::credentials::StoreError;

/// Errors returned by [`AuthenticatedHttpClient`](super::AuthenticatedHttpClient).
#[derive(Debug, Error)]
pub enum ApiError {
    /// The transport failed to reach the server (connection refused, DNS,
    /// TLS, or the per-request timeout elapsed).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server returned a non-success status. The body is kept verbatim
    /// so the UI can surface the server's message.
    #[error("Server error {status}: {body}")]
    Http {
        /// The HTTP status code returned by the server.
        status: StatusCode,
        /// The raw response body.
        body: String,
    },

    /// A 401 triggered a token refresh and the refresh itself failed.
    /// Stored credentials have been cleared; the caller should treat the
    /// session as logged out.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    /// The request path was an absolute URL instead of a path under the base URL.
    #[error("Invalid request path: {0}")]
    InvalidPath(String),

    /// A header name or value (including a stored token) is not valid on the wire.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Middleware error: {0}")]
    Middleware(anyhow::Error),
}

impl ApiError {
    /// True when the session is gone and the user has to sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::RefreshFailed(_))
    }

    /// Status code of a server rejection, if that is what this error is.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest_middleware::Error> for ApiError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => ApiError::Network(e),
            reqwest_middleware::Error::Middleware(e) => match e.downcast::<RefreshError>() {
                Ok(refresh) => ApiError::RefreshFailed(refresh),
                Err(e) => match e.downcast::<InvalidToken>() {
                    Ok(InvalidToken(msg)) => ApiError::InvalidHeader(msg),
                    Err(e) => ApiError::Middleware(e),
                },
            },
        }
    }
}

/// Why a token refresh did not produce a new access token.
///
/// `Clone` so one outcome can be handed to every request waiting on the same
/// refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("refresh request did not reach the server: {0}")]
    Network(String),

    #[error("refresh rejected with {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),
}

/// A stored token that cannot be carried in an `Authorization` header.
#[derive(Debug, Error)]
#[error("stored access token is not a valid header value: {0}")]
pub(crate) struct InvalidToken(pub String);
