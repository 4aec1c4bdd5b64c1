use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{debug, error};

use epay::api::{
    AddMoneyData, AgentTransferData, ApiResponse, AuthData, AuthService, LoginCredentials, RegisterData,
    SendMoneyData, ServiceError, TransactionService, WalletService, WithdrawMoneyData,
};
use epay::cli::{Cli, Commands};
use epay::config::{client_config, load_configuration};
use epay::credentials::{CredentialStore, FileCredentialStore};
use epay::http::AuthenticatedHttpClient;

struct Services {
    auth: AuthService,
    wallet: WalletService,
    transactions: TransactionService,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = epay::log::init_logging() {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ServiceError>() {
                Some(service_error) if service_error.requires_login() => {
                    eprintln!("Your session has expired. Please log in again.");
                },
                _ => eprintln!("Error: {:#}", e),
            }
            error!(error:% = e; "Command failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = load_configuration(&cli.config)?;
    let mut client_cfg = client_config(&cfg)?;
    client_cfg.apply_args(&cli.connection);
    debug!(base_url:% = client_cfg.base_url, timeout_ms = client_cfg.timeout_ms; "Client configuration loaded");

    let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(&client_cfg.credentials_path));
    let client = Arc::new(
        AuthenticatedHttpClient::from_config(&client_cfg, store).context("Could not create API client")?,
    );
    let services = Services {
        auth: AuthService::new(Arc::clone(&client)),
        wallet: WalletService::new(Arc::clone(&client)),
        transactions: TransactionService::new(client),
    };

    execute(cli.command, &services).await
}

async fn execute(command: Commands, services: &Services) -> anyhow::Result<()> {
    match command {
        Commands::Login { email, password } => {
            let response = services.auth.login(&LoginCredentials { email, password }).await?;
            print_auth_outcome("Logged in", &response);
        },
        Commands::Register {
            name,
            email,
            password,
            phone,
            role,
            nid,
        } => {
            let data = RegisterData {
                name,
                email,
                password,
                phone,
                role: role.map(Into::into),
                nid,
            };
            let response = services.auth.register(&data).await?;
            print_auth_outcome("Registered", &response);
        },
        Commands::Logout => {
            services.auth.logout().await?;
            println!("Logged out.");
        },
        Commands::Whoami => match services.auth.current_user().await? {
            Some(user) => println!("{} <{}> role: {:?}, status: {:?}", user.name, user.email, user.role, user.status),
            None if services.auth.is_authenticated().await? => println!("Signed in (no cached profile)."),
            None => println!("Not signed in."),
        },
        Commands::ResetPassword { email } => {
            print_message(&services.auth.reset_password(&email).await?);
        },
        Commands::ForgotPassword { email } => {
            print_message(&services.auth.forgot_password(&email).await?);
        },
        Commands::SendOtp { email } => {
            print_message(&services.auth.send_otp(&email).await?);
        },
        Commands::VerifyOtp { email, otp } => {
            print_message(&services.auth.verify_otp(&email, &otp).await?);
        },
        Commands::Balance => {
            let wallet = services.wallet.my_wallet().await?;
            println!("Balance: {:.2} ({:?})", wallet.balance, wallet.is_active);
        },
        Commands::AddMoney { amount, method } => {
            print_message(&services.wallet.add_money(&AddMoneyData { amount, method }).await?);
        },
        Commands::Withdraw { amount, agent_id } => {
            print_message(
                &services
                    .wallet
                    .withdraw_money(&WithdrawMoneyData { amount, agent_id })
                    .await?,
            );
        },
        Commands::Send { to, amount, pin } => {
            let data = SendMoneyData {
                receiver_email_or_phone: Some(to),
                amount,
                pin,
                ..Default::default()
            };
            print_message(&services.wallet.send_money(&data).await?);
        },
        Commands::CashIn { user_email, amount } => {
            print_message(&services.wallet.cash_in(&AgentTransferData { user_email, amount }).await?);
        },
        Commands::CashOut { user_email, amount } => {
            print_message(&services.wallet.cash_out(&AgentTransferData { user_email, amount }).await?);
        },
        Commands::Transactions { limit } => {
            let transactions = services.transactions.my_transactions().await?;
            if transactions.is_empty() {
                println!("No transactions yet.");
            }
            for tx in transactions.iter().take(limit.unwrap_or(usize::MAX)) {
                let when = tx
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                let counterparty = tx
                    .receiver
                    .as_ref()
                    .or(tx.sender.as_ref())
                    .map(|p| p.name.as_str())
                    .unwrap_or("-");
                println!(
                    "{}  {:<11} {:>10.2}  {:<9} {}",
                    when, tx.kind, tx.amount, tx.status, counterparty
                );
            }
        },
        Commands::Commission { agent_id } => {
            let response = services.transactions.agent_commission(&agent_id).await?;
            println!("{}", serde_json::to_string_pretty(&response.data)?);
        },
    }
    Ok(())
}

fn print_auth_outcome(action: &str, response: &ApiResponse<AuthData>) {
    if !response.success {
        println!("Failed: {}", response.message);
        return;
    }
    match response.data.as_ref().and_then(|d| d.user.as_ref()) {
        Some(user) => println!("{} as {} <{}>", action, user.name, user.email),
        None => println!("{}. {}", action, response.message),
    }
}

fn print_message<T>(response: &ApiResponse<T>) {
    if response.success {
        println!("{}", response.message);
    } else {
        println!("Failed: {}", response.message);
    }
}
