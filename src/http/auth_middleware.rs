use std::sync::Arc;

use async_trait::async_trait;
use http::Extensions;
use log::{debug, info, warn};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next};

use super::error::InvalidToken;
use super::refresh::TokenRefresher;
use crate::credentials::CredentialStore;
use crate::log::mask_string;

/// Attaches the stored access token to every request and recovers from a
/// single 401 by refreshing the token and replaying the request once.
///
/// The token goes into `Authorization` verbatim, without a `Bearer` scheme;
/// the wallet API expects the bare token.
pub(crate) struct AuthMiddleware {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<TokenRefresher>,
}

impl AuthMiddleware {
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<TokenRefresher>) -> Self {
        Self { store, refresher }
    }

    /// Reads the access token. A storage failure is treated as "no token" so
    /// the request still goes out.
    async fn stored_access_token(&self) -> Option<String> {
        match self.store.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error:% = e; "Could not read access token, sending request without it");
                None
            },
        }
    }

    async fn stored_refresh_token(&self) -> Option<String> {
        match self.store.refresh_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error:% = e; "Could not read refresh token");
                None
            },
        }
    }
}

fn set_authorization(req: &mut Request, token: &str) -> reqwest_middleware::Result<()> {
    let value = HeaderValue::from_str(token)
        .map_err(|e| reqwest_middleware::Error::middleware(InvalidToken(e.to_string())))?;
    req.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let sent_token = self.stored_access_token().await;
        match sent_token.as_deref() {
            Some(token) => {
                set_authorization(&mut req, token)?;
                debug!(url:% = req.url(), token:% = mask_string(token); "Authorization header set");
            },
            None => debug!(url:% = req.url(); "No access token available"),
        }

        // Captured before dispatch so the exact request can be replayed.
        let pending = req.try_clone();

        let response = next.clone().run(req, extensions).await?;
        let status = response.status();
        if status != StatusCode::UNAUTHORIZED {
            debug!(url:% = response.url(), status = status.as_u16(); "API response");
            return Ok(response);
        }

        warn!(url:% = response.url(); "Request rejected with 401");
        let Some(mut pending) = pending else {
            warn!("Request body cannot be replayed, propagating 401");
            return Ok(response);
        };

        let Some(refresh_token) = self.stored_refresh_token().await else {
            info!("No refresh token stored, propagating 401");
            return Ok(response);
        };

        let token = self
            .refresher
            .refresh(sent_token.as_deref(), refresh_token)
            .await
            .map_err(reqwest_middleware::Error::middleware)?;

        // The replay goes straight to the rest of the chain, so it can never
        // trigger a second refresh.
        set_authorization(&mut pending, &token)?;
        info!(url:% = pending.url(); "Replaying request with refreshed token");
        next.run(pending, extensions).await
    }
}
