//! Typed services over the wallet API.
//!
//! Each service borrows a shared [`AuthenticatedHttpClient`](crate::http::AuthenticatedHttpClient),
//! so token attachment and refresh are handled below them.

mod auth;
pub mod endpoints;
mod error;
mod transactions;
mod types;
mod wallet;

pub use auth::AuthService;
pub use error::ServiceError;
pub use transactions::TransactionService;
pub use types::{
    AddMoneyData, AgentTransferData, ApiResponse, AuthData, LoginCredentials, Party, RegisterData, RegisterRole,
    Transaction, TransactionStatus, TransactionType, User, UserRole, UserStatus, Wallet, WalletStatus,
    WithdrawMoneyData, SendMoneyData,
};
pub use wallet::WalletService;
