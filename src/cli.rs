use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::api::RegisterRole;

#[derive(Parser)]
#[command(name = "epay")]
#[command(about = "ePay wallet CLI", long_about = None)]
pub struct Cli {
    #[arg(short, long, help = "Path to the configuration file", default_value = "data/config.toml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for values otherwise taken from the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    #[arg(short = 'u', long, global = true, help = "Base URL of the wallet API, including /api/v1")]
    pub base_url: Option<String>,
    #[arg(long, global = true, help = "Request timeout in milliseconds")]
    pub timeout_ms: Option<u64>,
    #[arg(long, global = true, help = "Path to the credentials file")]
    pub credentials_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RoleArg {
    User,
    Agent,
}

impl From<RoleArg> for RegisterRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => RegisterRole::User,
            RoleArg::Agent => RegisterRole::Agent,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Create a new account
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(long, help = "Mobile number, e.g. 01712345678")]
        phone: String,
        #[arg(short, long, value_enum, help = "Register as a regular user or as an agent")]
        role: Option<RoleArg>,
        #[arg(long, help = "National ID number (required for agents)")]
        nid: Option<String>,
    },
    /// Sign out and forget stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Request a password reset
    ResetPassword {
        #[arg(short, long)]
        email: String,
    },
    /// Request a password reset link by email
    ForgotPassword {
        #[arg(short, long)]
        email: String,
    },
    /// Send a one-time password to an email address
    SendOtp {
        #[arg(short, long)]
        email: String,
    },
    /// Verify a one-time password
    VerifyOtp {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        otp: String,
    },
    /// Show wallet balance
    Balance,
    /// Add money to your wallet
    AddMoney {
        #[arg(short, long)]
        amount: f64,
        #[arg(short, long, help = "Funding method, e.g. bank or card")]
        method: Option<String>,
    },
    /// Withdraw money through an agent
    Withdraw {
        #[arg(short, long)]
        amount: f64,
        #[arg(long)]
        agent_id: String,
    },
    /// Send money to another user
    Send {
        #[arg(short, long, help = "Receiver email or phone number")]
        to: String,
        #[arg(short, long)]
        amount: f64,
        #[arg(long)]
        pin: Option<String>,
    },
    /// Agent: deposit cash into a user's wallet
    CashIn {
        #[arg(long)]
        user_email: String,
        #[arg(short, long)]
        amount: f64,
    },
    /// Agent: withdraw from a user's wallet
    CashOut {
        #[arg(long)]
        user_email: String,
        #[arg(short, long)]
        amount: f64,
    },
    /// List your transactions
    Transactions {
        #[arg(short, long, help = "Show at most this many transactions")]
        limit: Option<usize>,
    },
    /// Show commission earned by an agent
    Commission {
        #[arg(long)]
        agent_id: String,
    },
}
