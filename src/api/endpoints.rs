// Paths relative to the configured base URL (which carries the /api/v1 prefix).

pub const LOGIN: &str = "/auth/login";
pub const REGISTER: &str = "/user/register";
pub const LOGOUT: &str = "/auth/logout";
pub const RESET_PASSWORD: &str = "/auth/reset-password";
pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";

pub const SEND_OTP: &str = "/otp/send";
pub const VERIFY_OTP: &str = "/otp/verify";

pub const GET_MY_WALLET: &str = "/wallet/me";
pub const ADD_MONEY: &str = "/wallet/add-money";
pub const WITHDRAW_MONEY: &str = "/wallet/withdraw-money";
pub const SEND_MONEY: &str = "/wallet/send-money";
pub const CASH_IN: &str = "/wallet/cash-in";
pub const CASH_OUT: &str = "/wallet/agent/withdraw-user-money";

pub const GET_MY_TRANSACTIONS: &str = "/transaction/me";
pub const GET_AGENT_COMMISSION: &str = "/transaction/agent/commission";

pub fn agent_commission(agent_id: &str) -> String {
    format!("{}/{}", GET_AGENT_COMMISSION, agent_id)
}
