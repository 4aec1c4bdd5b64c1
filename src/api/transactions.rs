use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::endpoints;
use super::error::ServiceError;
use super::types::{ApiResponse, Transaction};
use super::wallet::into_data;
use crate::http::AuthenticatedHttpClient;
use crate::validation::validate_identifier;

pub struct TransactionService {
    client: Arc<AuthenticatedHttpClient>,
}

impl TransactionService {
    pub fn new(client: Arc<AuthenticatedHttpClient>) -> Self {
        Self { client }
    }

    /// Transaction history of the signed-in user, newest first as the server
    /// returns it.
    pub async fn my_transactions(&self) -> Result<Vec<Transaction>, ServiceError> {
        let response: ApiResponse<Vec<Transaction>> = self.client.get_json(endpoints::GET_MY_TRANSACTIONS).await?;
        into_data(response)
    }

    pub async fn agent_commission(&self, agent_id: &str) -> Result<ApiResponse<JsonValue>, ServiceError> {
        validate_identifier(agent_id)?;
        Ok(self.client.get_json(&endpoints::agent_commission(agent_id)).await?)
    }
}
