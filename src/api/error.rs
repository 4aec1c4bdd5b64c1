use thiserror::Error;

use crate::credentials::StoreError;
use crate::http::ApiError;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The server answered 2xx but reported `success: false` or omitted the data.
    #[error("Request was not successful: {message}")]
    Unsuccessful { message: String },
}

impl ServiceError {
    /// True when the session is gone and the user has to sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, ServiceError::Api(e) if e.requires_login())
    }
}
