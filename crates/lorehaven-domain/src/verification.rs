//! Verification vocabulary: the states a user's identity proof moves through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Progress of a user through the email-link and OTP stages.
///
/// Wire/storage format: snake_case string (`"email_pending"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    Unverified,
    EmailPending,
    EmailVerified,
    OtpPending,
    OtpVerified,
    /// The email link's TTL elapsed before it was clicked.
    Expired,
    /// The session stopped progressing after the email stage.
    Abandoned,
}

impl VerificationState {
    pub const ALL: [Self; 7] = [
        Self::Unverified,
        Self::EmailPending,
        Self::EmailVerified,
        Self::OtpPending,
        Self::OtpVerified,
        Self::Expired,
        Self::Abandoned,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::EmailPending => "email_pending",
            Self::EmailVerified => "email_verified",
            Self::OtpPending => "otp_pending",
            Self::OtpVerified => "otp_verified",
            Self::Expired => "expired",
            Self::Abandoned => "abandoned",
        }
    }

    /// Waiting on the user to present a secret.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::EmailPending | Self::EmailVerified | Self::OtpPending)
    }

    /// No further progress without starting over.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::OtpVerified | Self::Expired | Self::Abandoned)
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verification state: {0}")]
pub struct UnknownState(pub String);

impl FromStr for VerificationState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_owned()))
    }
}

/// Why an email verification was requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPurpose {
    #[default]
    SignUp,
    ForgotPassword,
}

impl VerificationPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignUp => "sign_up",
            Self::ForgotPassword => "forgot_password",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verification purpose: {0}")]
pub struct UnknownPurpose(pub String);

impl FromStr for VerificationPurpose {
    type Err = UnknownPurpose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::SignUp, Self::ForgotPassword]
            .into_iter()
            .find(|purpose| purpose.as_str() == s)
            .ok_or_else(|| UnknownPurpose(s.to_owned()))
    }
}
