use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::ConnectionArgs;
use crate::http::DEFAULT_REFRESH_PATH;

/// Settings for talking to the wallet API, read once at startup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL including the versioned prefix, e.g. `https://host/api/v1`.
    pub base_url: String,
    pub timeout_ms: u64,
    pub refresh_path: String,
    pub credentials_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://epay-backend.vercel.app/api/v1".to_string(),
            timeout_ms: 30_000,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            credentials_path: PathBuf::from("data/credentials.json"),
        }
    }
}

impl ClientConfig {
    pub const KEY: &'static str = "client";

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Applies command line overrides on top of the loaded configuration.
    pub fn apply_args(&mut self, args: &ConnectionArgs) {
        if let Some(base_url) = &args.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(timeout_ms) = args.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if let Some(credentials_file) = &args.credentials_file {
            self.credentials_path = credentials_file.clone();
        }
    }
}
