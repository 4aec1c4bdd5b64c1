pub mod api;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod http;
pub mod log;
pub mod validation;

pub use crate::credentials::{CredentialStore, FileCredentialStore, InMemoryCredentialStore};
pub use crate::http::{ApiError, ApiRequest, AuthenticatedHttpClient};
