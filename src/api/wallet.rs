use std::sync::Arc;

use log::info;
use serde_json::Value as JsonValue;

use super::endpoints;
use super::error::ServiceError;
use super::types::{AddMoneyData, AgentTransferData, ApiResponse, SendMoneyData, Wallet, WithdrawMoneyData};
use crate::http::AuthenticatedHttpClient;
use crate::log::{mask_amount, mask_string};
use crate::validation::{ValidationError, validate_amount, validate_email, validate_identifier};

/// Balance lookups and money movement. Fees, commissions and the ledger
/// itself are the server's business; this only issues the calls.
pub struct WalletService {
    client: Arc<AuthenticatedHttpClient>,
}

impl WalletService {
    pub fn new(client: Arc<AuthenticatedHttpClient>) -> Self {
        Self { client }
    }

    pub async fn my_wallet(&self) -> Result<Wallet, ServiceError> {
        let response: ApiResponse<Wallet> = self.client.get_json(endpoints::GET_MY_WALLET).await?;
        into_data(response)
    }

    pub async fn add_money(&self, data: &AddMoneyData) -> Result<ApiResponse<JsonValue>, ServiceError> {
        validate_amount(data.amount)?;
        info!(amount:% = mask_amount(data.amount); "Adding money");
        Ok(self.client.post_json(endpoints::ADD_MONEY, data).await?)
    }

    pub async fn withdraw_money(&self, data: &WithdrawMoneyData) -> Result<ApiResponse<JsonValue>, ServiceError> {
        validate_amount(data.amount)?;
        validate_identifier(&data.agent_id)?;
        info!(amount:% = mask_amount(data.amount), agent:% = mask_string(&data.agent_id); "Withdrawing money");
        Ok(self.client.post_json(endpoints::WITHDRAW_MONEY, data).await?)
    }

    pub async fn send_money(&self, data: &SendMoneyData) -> Result<ApiResponse<JsonValue>, ServiceError> {
        validate_amount(data.amount)?;
        match (&data.receiver_email, &data.receiver_email_or_phone) {
            (Some(email), _) => validate_email(email)?,
            (None, Some(receiver)) if !receiver.trim().is_empty() => {},
            _ => return Err(ValidationError::MissingReceiver.into()),
        }
        info!(amount:% = mask_amount(data.amount); "Sending money");
        Ok(self.client.post_json(endpoints::SEND_MONEY, data).await?)
    }

    /// Agent deposits cash into a user's wallet.
    pub async fn cash_in(&self, data: &AgentTransferData) -> Result<ApiResponse<JsonValue>, ServiceError> {
        validate_agent_transfer(data)?;
        info!(user:% = mask_string(&data.user_email), amount:% = mask_amount(data.amount); "Agent cash-in");
        Ok(self.client.post_json(endpoints::CASH_IN, data).await?)
    }

    /// Agent withdraws from a user's wallet and pays out cash.
    pub async fn cash_out(&self, data: &AgentTransferData) -> Result<ApiResponse<JsonValue>, ServiceError> {
        validate_agent_transfer(data)?;
        info!(user:% = mask_string(&data.user_email), amount:% = mask_amount(data.amount); "Agent cash-out");
        Ok(self.client.post_json(endpoints::CASH_OUT, data).await?)
    }
}

fn validate_agent_transfer(data: &AgentTransferData) -> Result<(), ValidationError> {
    validate_email(&data.user_email)?;
    validate_amount(data.amount)
}

/// Unwraps the `data` of a successful envelope.
pub(crate) fn into_data<T>(response: ApiResponse<T>) -> Result<T, ServiceError> {
    match response {
        ApiResponse {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        ApiResponse { message, .. } => Err(ServiceError::Unsuccessful { message }),
    }
}
