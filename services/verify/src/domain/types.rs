use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lorehaven_domain::id::UserId;
use lorehaven_domain::verification::{VerificationPurpose, VerificationState};

/// The slice of a user record this service needs to address secrets.
#[derive(Debug, Clone)]
pub struct VerifyUser {
    pub id: UserId,
    pub email: String,
}

/// Single-use email link token. Only the SHA-256 of the token value is stored.
#[derive(Debug, Clone)]
pub struct VerificationToken {
    pub id: Uuid,
    pub user_id: UserId,
    pub token_hash: Vec<u8>,
    pub purpose: VerificationPurpose,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl VerificationToken {
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A freshly issued token together with the raw value that goes into the link.
/// The raw value exists only here and in the outbox payload.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: VerificationToken,
    pub value: String,
}

/// 6-digit one-time code bound to a user with a bounded number of guesses.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub id: Uuid,
    pub user_id: UserId,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts_remaining: i32,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl OtpChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_remaining <= 0
    }
}

/// Persisted progress of one user through verification.
///
/// `expires_at` is the deadline of the current pending stage; expiry is
/// evaluated lazily by [`VerificationSession::effective_state`]. `version`
/// increments on every transition and guards compare-and-set updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationSession {
    pub user_id: UserId,
    pub state: VerificationState,
    pub expires_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationSession {
    /// A user with no session row yet.
    pub fn unverified(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            state: VerificationState::Unverified,
            expires_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// State after applying lazy expiry at `now`.
    pub fn effective_state(&self, now: DateTime<Utc>) -> VerificationState {
        let overdue = self.expires_at.is_some_and(|deadline| deadline <= now);
        match self.state {
            VerificationState::EmailPending if overdue => VerificationState::Expired,
            VerificationState::EmailVerified | VerificationState::OtpPending if overdue => {
                VerificationState::Abandoned
            }
            state => state,
        }
    }

    /// The session as it should look after moving to `to`.
    pub fn advance(
        &self,
        to: VerificationState,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: self.user_id,
            state: to,
            expires_at,
            version: self.version + 1,
            created_at: self.created_at,
            updated_at: now,
        }
    }
}

/// The single-use secret a session transition spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpentSecret {
    Token(Uuid),
    Otp(Uuid),
}

/// Outbox event for async delivery of a secret (email link or code).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
}

pub const EMAIL_VERIFICATION_REQUESTED: &str = "email_verification_requested";
pub const OTP_CHALLENGE_ISSUED: &str = "otp_challenge_issued";

/// Email link token lifetime in seconds (24h).
pub const EMAIL_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// OTP challenge lifetime in seconds (10 min).
pub const OTP_TTL_SECS: i64 = 10 * 60;

/// Wrong guesses allowed per OTP challenge.
pub const OTP_MAX_ATTEMPTS: i32 = 5;

/// Random bytes in an email token before base64url encoding.
pub const TOKEN_BYTES: usize = 32;

/// Secret issues allowed per user and kind within one rate window.
pub const ISSUE_LIMIT: u64 = 5;

/// Rate window in seconds (15 min).
pub const ISSUE_WINDOW_SECS: u64 = 15 * 60;

/// Time after email confirmation within which the OTP stage must finish (24h).
pub const SESSION_ABANDON_SECS: i64 = 24 * 60 * 60;

/// Tunable limits of the verification flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub email_token_ttl: Duration,
    pub otp_ttl: Duration,
    pub otp_max_attempts: i32,
    pub issue_limit: u64,
    pub issue_window_secs: u64,
    pub session_abandon_after: Duration,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            email_token_ttl: Duration::seconds(EMAIL_TOKEN_TTL_SECS),
            otp_ttl: Duration::seconds(OTP_TTL_SECS),
            otp_max_attempts: OTP_MAX_ATTEMPTS,
            issue_limit: ISSUE_LIMIT,
            issue_window_secs: ISSUE_WINDOW_SECS,
            session_abandon_after: Duration::seconds(SESSION_ABANDON_SECS),
        }
    }
}

/// Which secret an issuance counter tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    Email,
    Otp,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Otp => "otp",
        }
    }
}
