//! Single-flight access token refresh.
//!
//! Each refresh runs on its own task, so it finishes and releases the
//! in-flight slot even when every request waiting on it has been dropped.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use tokio::sync::Mutex;
use url::Url;

use super::error::RefreshError;
use super::types::{RefreshEnvelope, RefreshRequest};
use crate::credentials::CredentialStore;
use crate::log::mask_string;

type RefreshOutcome = Result<String, RefreshError>;

struct InFlight {
    generation: u64,
    refresh_token: String,
    outcome: Shared<BoxFuture<'static, RefreshOutcome>>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    flight: Option<InFlight>,
}

/// Mints new access tokens from the stored refresh token.
///
/// At most one refresh call is on the wire at a time. A 401 handler that
/// arrives while a refresh of the same refresh token is running awaits that
/// refresh instead of starting its own, and every waiter receives the same
/// outcome. The refresh persists the new tokens (or clears the store on
/// failure) exactly once.
pub(crate) struct TokenRefresher {
    // Plain client: the refresh call must not pass through the auth middleware.
    client: reqwest::Client,
    refresh_url: Url,
    store: Arc<dyn CredentialStore>,
    slot: Arc<Mutex<Slot>>,
}

impl TokenRefresher {
    pub fn new(client: reqwest::Client, refresh_url: Url, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            client,
            refresh_url,
            store,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Returns the access token to replay a rejected request with.
    ///
    /// `sent_access` is the token the rejected request carried. If the store
    /// already holds a different one, a refresh has completed since that
    /// request went out and its token is returned without another call.
    /// Otherwise this joins the refresh in progress or starts one.
    pub async fn refresh(&self, sent_access: Option<&str>, refresh_token: String) -> RefreshOutcome {
        loop {
            let (outcome, own_session) = {
                let mut slot = self.slot.lock().await;
                match slot.flight.as_ref() {
                    Some(flight) if flight.refresh_token == refresh_token => {
                        debug!("Joining in-flight token refresh");
                        (flight.outcome.clone(), true)
                    },
                    Some(flight) => {
                        debug!("Waiting for refresh of a replaced session to finish");
                        (flight.outcome.clone(), false)
                    },
                    None => {
                        if let Some(current) = self.rotated_token(sent_access).await {
                            debug!("Access token already rotated, skipping refresh");
                            return Ok(current);
                        }
                        let outcome = self.start(&mut slot, refresh_token.clone());
                        (outcome, true)
                    },
                }
            };

            let result = outcome.await;
            if own_session {
                return result;
            }
        }
    }

    /// Spawns the refresh task and parks its outcome in `slot`. The task
    /// releases the slot itself once done. The caller holds the lock, so that
    /// cannot happen before the slot is set.
    fn start(&self, slot: &mut Slot, refresh_token: String) -> Shared<BoxFuture<'static, RefreshOutcome>> {
        slot.generation += 1;
        let generation = slot.generation;

        let task_slot = Arc::clone(&self.slot);
        let refresh = run_refresh(
            self.client.clone(),
            self.refresh_url.clone(),
            Arc::clone(&self.store),
            refresh_token.clone(),
        );
        let handle = tokio::spawn(async move {
            let result = refresh.await;
            let mut slot = task_slot.lock().await;
            if slot.flight.as_ref().is_some_and(|f| f.generation == generation) {
                slot.flight = None;
            }
            result
        });
        let outcome = handle
            .map(|joined| joined.unwrap_or_else(|e| Err(RefreshError::Network(format!("refresh task failed: {e}")))))
            .boxed()
            .shared();

        slot.flight = Some(InFlight {
            generation,
            refresh_token,
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn rotated_token(&self, sent_access: Option<&str>) -> Option<String> {
        match self.store.access_token().await {
            Ok(current) => current.filter(|token| Some(token.as_str()) != sent_access),
            Err(e) => {
                warn!(error:% = e; "Could not read access token before refresh");
                None
            },
        }
    }
}

async fn run_refresh(
    client: reqwest::Client,
    refresh_url: Url,
    store: Arc<dyn CredentialStore>,
    refresh_token: String,
) -> RefreshOutcome {
    info!(url:% = refresh_url; "Attempting token refresh");

    let result = request_tokens(&client, refresh_url, &refresh_token).await;

    // A login or logout while the call was out replaced the session this
    // refresh belongs to; its outcome must not touch the new one.
    if session_replaced(store.as_ref(), &refresh_token).await {
        info!("Session changed during token refresh, leaving stored credentials untouched");
        return result.map(|envelope| envelope.data.access_token);
    }

    match result {
        Ok(envelope) => {
            let result = envelope.data;
            if let Err(e) = store.save_access_token(&result.access_token).await {
                warn!(error:% = e; "Could not persist refreshed access token");
            }
            // An absent or empty refresh token keeps the stored one.
            if let Some(new_refresh) = result.refresh_token.as_deref().filter(|t| !t.is_empty()) {
                if let Err(e) = store.save_refresh_token(new_refresh).await {
                    warn!(error:% = e; "Could not persist rotated refresh token");
                }
            }
            info!(token:% = mask_string(&result.access_token); "Token refresh successful");
            Ok(result.access_token)
        },
        Err(err) => {
            warn!(error:% = err; "Token refresh failed, clearing stored credentials");
            if let Err(e) = store.clear_all().await {
                warn!(error:% = e; "Could not clear stored credentials");
            }
            Err(err)
        },
    }
}

async fn session_replaced(store: &dyn CredentialStore, refresh_token: &str) -> bool {
    match store.refresh_token().await {
        Ok(current) => current.as_deref() != Some(refresh_token),
        Err(e) => {
            warn!(error:% = e; "Could not read refresh token after refresh");
            false
        },
    }
}

async fn request_tokens(
    client: &reqwest::Client,
    refresh_url: Url,
    refresh_token: &str,
) -> Result<RefreshEnvelope, RefreshError> {
    let resp = client
        .post(refresh_url)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await
        .map_err(|e| RefreshError::Network(e.to_string()))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| RefreshError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(RefreshError::Rejected { status, body });
    }

    let envelope: RefreshEnvelope =
        serde_json::from_str(&body).map_err(|e| RefreshError::MalformedResponse(e.to_string()))?;
    if envelope.data.access_token.is_empty() {
        return Err(RefreshError::MalformedResponse("empty access token".to_string()));
    }
    Ok(envelope)
}
