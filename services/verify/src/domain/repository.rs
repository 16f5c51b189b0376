#![allow(async_fn_in_trait)]

use uuid::Uuid;

use lorehaven_domain::id::UserId;

use crate::domain::types::{
    IssueKind, OtpChallenge, OutboxEvent, SpentSecret, VerificationSession, VerificationToken,
    VerifyUser,
};
use crate::error::VerifyServiceError;

/// Read access to user records owned by the account service.
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<VerifyUser>, VerifyServiceError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<VerifyUser>, VerifyServiceError>;
}

/// Repository for email verification tokens.
pub trait TokenRepository: Send + Sync {
    /// Delete the user's unconsumed tokens, insert `token` and the outbox event,
    /// all in one transaction.
    async fn replace_with_outbox(
        &self,
        token: &VerificationToken,
        event: &OutboxEvent,
    ) -> Result<(), VerifyServiceError>;

    async fn find_by_hash(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<VerificationToken>, VerifyServiceError>;

    /// Set `consumed_at` if still unset. Returns `true` only for the caller
    /// that performed the transition.
    async fn mark_consumed(&self, id: Uuid) -> Result<bool, VerifyServiceError>;
}

/// Repository for OTP challenges.
pub trait OtpRepository: Send + Sync {
    /// Delete the user's unconsumed challenges, insert `challenge` and the
    /// outbox event, all in one transaction.
    async fn replace_with_outbox(
        &self,
        challenge: &OtpChallenge,
        event: &OutboxEvent,
    ) -> Result<(), VerifyServiceError>;

    /// Most recently issued challenge of the user, consumed or not.
    async fn find_latest(&self, user_id: UserId)
    -> Result<Option<OtpChallenge>, VerifyServiceError>;

    /// Decrement `attempts_remaining` if it is positive and the challenge is
    /// unconsumed. Returns whether a decrement happened.
    async fn record_failed_attempt(&self, id: Uuid) -> Result<bool, VerifyServiceError>;

    /// Set `consumed_at` if unset and attempts remain. Returns whether this
    /// caller consumed it.
    async fn mark_consumed(&self, id: Uuid) -> Result<bool, VerifyServiceError>;

    /// Zero the remaining attempts so the challenge can never match again.
    async fn invalidate(&self, id: Uuid) -> Result<(), VerifyServiceError>;
}

/// Repository for per-user verification sessions.
pub trait SessionRepository: Send + Sync {
    async fn find(&self, user_id: UserId)
    -> Result<Option<VerificationSession>, VerifyServiceError>;

    /// Insert a brand-new session. Returns `false` if one already exists.
    async fn insert(&self, session: &VerificationSession) -> Result<bool, VerifyServiceError>;

    /// Store `next` only if the stored row still has `expected_version`.
    async fn compare_and_set(
        &self,
        next: &VerificationSession,
        expected_version: i32,
    ) -> Result<bool, VerifyServiceError>;

    /// Store `next` and consume `secret` in one transaction. Nothing is
    /// written unless the row still has `expected_version` and the secret is
    /// still spendable.
    async fn advance_spending(
        &self,
        next: &VerificationSession,
        expected_version: i32,
        secret: SpentSecret,
    ) -> Result<bool, VerifyServiceError>;
}

/// Fixed-window counter guarding secret issuance.
pub trait IssueLimiter: Send + Sync {
    /// Count one issue for `(kind, user)` and return the count in the current window.
    async fn hit(
        &self,
        kind: IssueKind,
        user_id: UserId,
        window_secs: u64,
    ) -> Result<u64, VerifyServiceError>;
}
