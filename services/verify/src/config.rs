use chrono::Duration;
use serde::Deserialize;
use url::Url;

use lorehaven_core::config::Config;

use crate::domain::types::{
    EMAIL_TOKEN_TTL_SECS, ISSUE_LIMIT, ISSUE_WINDOW_SECS, OTP_MAX_ATTEMPTS, OTP_TTL_SECS,
    SESSION_ABANDON_SECS, VerificationPolicy,
};

/// Verify service configuration loaded from environment variables.
#[derive(Debug, Deserialize)]
pub struct VerifyConfig {
    /// PostgreSQL connection URL. Env var: `DATABASE_URL`.
    pub database_url: String,
    /// Redis connection URL for issuance counters. Env var: `REDIS_URL`.
    pub redis_url: String,
    /// Origin the email links point at (e.g. "https://lorehaven.example").
    pub public_base_url: Url,
    /// TCP port to listen on (default 3120). Env var: `VERIFY_PORT`.
    #[serde(default = "default_port")]
    pub verify_port: u16,
    #[serde(default = "default_email_token_ttl")]
    pub email_token_ttl_secs: i64,
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_secs: i64,
    #[serde(default = "default_otp_max_attempts")]
    pub otp_max_attempts: i32,
    #[serde(default = "default_issue_limit")]
    pub issue_limit: u64,
    #[serde(default = "default_issue_window")]
    pub issue_window_secs: u64,
    #[serde(default = "default_session_abandon")]
    pub session_abandon_secs: i64,
}

impl Config for VerifyConfig {}

fn default_port() -> u16 {
    3120
}

fn default_email_token_ttl() -> i64 {
    EMAIL_TOKEN_TTL_SECS
}

fn default_otp_ttl() -> i64 {
    OTP_TTL_SECS
}

fn default_otp_max_attempts() -> i32 {
    OTP_MAX_ATTEMPTS
}

fn default_issue_limit() -> u64 {
    ISSUE_LIMIT
}

fn default_issue_window() -> u64 {
    ISSUE_WINDOW_SECS
}

fn default_session_abandon() -> i64 {
    SESSION_ABANDON_SECS
}

impl VerifyConfig {
    pub fn policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            email_token_ttl: Duration::seconds(self.email_token_ttl_secs),
            otp_ttl: Duration::seconds(self.otp_ttl_secs),
            otp_max_attempts: self.otp_max_attempts,
            issue_limit: self.issue_limit,
            issue_window_secs: self.issue_window_secs,
            session_abandon_after: Duration::seconds(self.session_abandon_secs),
        }
    }
}
