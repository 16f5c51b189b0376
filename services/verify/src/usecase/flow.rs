//! The verification state machine.
//!
//! ```text
//! unverified -> email_pending -> email_verified -> otp_pending -> otp_verified
//!                    |                  \______________/
//!                 expired                  abandoned
//! ```
//!
//! Every transition is a compare-and-set on the session's version, so two
//! racing requests cannot both move the same session. Confirmations spend
//! their secret in the same transaction as the transition: a lost race
//! leaves the link or code usable.

use chrono::Utc;
use tracing::{info, warn};
use url::Url;

use lorehaven_domain::id::UserId;
use lorehaven_domain::verification::{VerificationPurpose, VerificationState};

use crate::domain::repository::{
    IssueLimiter, OtpRepository, SessionRepository, TokenRepository, UserRepository,
};
use crate::domain::types::{
    IssueKind, SpentSecret, VerificationPolicy, VerificationSession, VerifyUser,
};
use crate::error::VerifyServiceError;
use crate::usecase::otp::OtpService;
use crate::usecase::token::TokenService;

pub struct VerificationFlow<U, S, T, O, L>
where
    U: UserRepository,
    S: SessionRepository,
    T: TokenRepository,
    O: OtpRepository,
    L: IssueLimiter,
{
    pub users: U,
    pub sessions: S,
    pub tokens: TokenService<T>,
    pub otps: OtpService<O>,
    pub limiter: L,
    pub policy: VerificationPolicy,
    /// Public origin the email link points at.
    pub link_base: Url,
}

/// A session plus whether it already has a row.
struct Loaded {
    session: VerificationSession,
    stored: bool,
}

impl<U, S, T, O, L> VerificationFlow<U, S, T, O, L>
where
    U: UserRepository,
    S: SessionRepository,
    T: TokenRepository,
    O: OtpRepository,
    L: IssueLimiter,
{
    /// Current session with lazy expiry applied. Users without a row read as unverified.
    pub async fn status(&self, user_id: UserId) -> Result<VerificationSession, VerifyServiceError> {
        let now = Utc::now();
        let mut session = self.load(user_id).await?.session;
        session.state = session.effective_state(now);
        Ok(session)
    }

    /// `unverified | email_pending | expired | abandoned -> email_pending`.
    ///
    /// A forgot-password request may also restart an unfinished verification.
    /// For an `otp_verified` user it only sends a reset link; the session is
    /// left as is.
    pub async fn request_email_verification(
        &self,
        user_id: UserId,
        purpose: VerificationPurpose,
    ) -> Result<VerificationSession, VerifyServiceError> {
        let user = self.user(user_id).await?;
        self.start_email_verification(&user, purpose).await
    }

    /// Forgot-password entry point. Unknown emails yield `None` so callers can
    /// answer identically for registered and unregistered addresses.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<VerificationSession>, VerifyServiceError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(None);
        };
        self.start_email_verification(&user, VerificationPurpose::ForgotPassword)
            .await
            .map(Some)
    }

    /// `email_pending -> email_verified` when the link's token is consumed.
    ///
    /// A password reset link of an `otp_verified` user is consumed without
    /// touching the session.
    pub async fn confirm_email(
        &self,
        token_value: &str,
    ) -> Result<VerificationSession, VerifyServiceError> {
        let now = Utc::now();
        let token = self.tokens.inspect(token_value, now).await?;

        let loaded = self.load(token.user_id).await?;
        let state = loaded.session.effective_state(now);
        if token.purpose == VerificationPurpose::ForgotPassword
            && state == VerificationState::OtpVerified
        {
            self.tokens.consume(token_value, now).await?;
            info!(user_id = %token.user_id, "password reset link confirmed");
            return Ok(loaded.session);
        }
        if state != VerificationState::EmailPending {
            return Err(VerifyServiceError::InvalidState {
                action: "confirm email",
                state,
            });
        }

        let next = loaded.session.advance(
            VerificationState::EmailVerified,
            Some(now + self.policy.session_abandon_after),
            now,
        );
        if !self
            .advance_spending(&loaded, &next, SpentSecret::Token(token.id), "confirm email")
            .await?
        {
            // Report a spent or replaced token as such; otherwise the session moved.
            self.tokens.inspect(token_value, now).await?;
            return Err(VerifyServiceError::InvalidState {
                action: "confirm email",
                state,
            });
        }
        info!(user_id = %next.user_id, from = %state, to = %next.state, "email verified");
        Ok(next)
    }

    /// `email_verified | otp_pending -> otp_pending` with a fresh challenge.
    /// Re-requesting while pending replaces an expired or exhausted code.
    pub async fn request_otp(&self, user_id: UserId) -> Result<VerificationSession, VerifyServiceError> {
        let now = Utc::now();
        let user = self.user(user_id).await?;
        let loaded = self.load(user_id).await?;
        let state = loaded.session.effective_state(now);
        if !matches!(
            state,
            VerificationState::EmailVerified | VerificationState::OtpPending
        ) {
            return Err(VerifyServiceError::InvalidState {
                action: "request code",
                state,
            });
        }

        self.throttle(IssueKind::Otp, user_id).await?;
        // The abandonment deadline runs from email confirmation; reissuing does not extend it.
        let next = loaded.session.advance(
            VerificationState::OtpPending,
            loaded.session.expires_at,
            now,
        );
        self.store(&loaded, &next, "request code").await?;
        self.otps.issue(&user, now).await?;
        info!(user_id = %user_id, from = %state, to = %next.state, "otp requested");
        Ok(next)
    }

    /// `otp_pending -> otp_verified` when the code matches.
    pub async fn confirm_otp(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<VerificationSession, VerifyServiceError> {
        let now = Utc::now();
        let loaded = self.load(user_id).await?;
        let state = loaded.session.effective_state(now);
        if state != VerificationState::OtpPending {
            return Err(VerifyServiceError::InvalidState {
                action: "confirm code",
                state,
            });
        }

        let challenge = self.otps.verify(user_id, code, now).await?;
        let next = loaded
            .session
            .advance(VerificationState::OtpVerified, None, now);
        if !self
            .advance_spending(&loaded, &next, SpentSecret::Otp(challenge.id), "confirm code")
            .await?
        {
            if let Some(err) = self.otps.spend_failure(&challenge).await? {
                return Err(err.into());
            }
            return Err(VerifyServiceError::InvalidState {
                action: "confirm code",
                state,
            });
        }
        info!(user_id = %user_id, from = %state, to = %next.state, "otp verified");
        Ok(next)
    }

    async fn start_email_verification(
        &self,
        user: &VerifyUser,
        purpose: VerificationPurpose,
    ) -> Result<VerificationSession, VerifyServiceError> {
        let now = Utc::now();
        let loaded = self.load(user.id).await?;
        let state = loaded.session.effective_state(now);
        if state == VerificationState::OtpVerified
            && purpose == VerificationPurpose::ForgotPassword
        {
            self.throttle(IssueKind::Email, user.id).await?;
            self.tokens
                .issue(user, purpose, &self.link_base, now)
                .await?;
            info!(user_id = %user.id, "password reset link requested for verified user");
            return Ok(loaded.session);
        }
        let restartable = matches!(
            state,
            VerificationState::Unverified
                | VerificationState::EmailPending
                | VerificationState::Expired
                | VerificationState::Abandoned
        );
        if !restartable && purpose != VerificationPurpose::ForgotPassword {
            return Err(VerifyServiceError::InvalidState {
                action: "request email verification",
                state,
            });
        }

        self.throttle(IssueKind::Email, user.id).await?;
        let next = loaded.session.advance(
            VerificationState::EmailPending,
            Some(now + self.policy.email_token_ttl),
            now,
        );
        self.store(&loaded, &next, "request email verification")
            .await?;
        self.tokens
            .issue(user, purpose, &self.link_base, now)
            .await?;
        info!(
            user_id = %user.id,
            purpose = purpose.as_str(),
            from = %state,
            to = %next.state,
            "email verification requested"
        );
        Ok(next)
    }

    async fn user(&self, user_id: UserId) -> Result<VerifyUser, VerifyServiceError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(VerifyServiceError::UserNotFound)
    }

    async fn load(&self, user_id: UserId) -> Result<Loaded, VerifyServiceError> {
        Ok(match self.sessions.find(user_id).await? {
            Some(session) => Loaded {
                session,
                stored: true,
            },
            None => Loaded {
                session: VerificationSession::unverified(user_id, Utc::now()),
                stored: false,
            },
        })
    }

    async fn store(
        &self,
        current: &Loaded,
        next: &VerificationSession,
        action: &'static str,
    ) -> Result<(), VerifyServiceError> {
        let written = if current.stored {
            self.sessions
                .compare_and_set(next, current.session.version)
                .await?
        } else {
            self.sessions.insert(next).await?
        };
        if !written {
            warn!(user_id = %next.user_id, action, "lost verification session race");
            return Err(VerifyServiceError::InvalidState {
                action,
                state: current.session.state,
            });
        }
        Ok(())
    }

    /// Move a stored session and spend `secret`, both or neither.
    async fn advance_spending(
        &self,
        current: &Loaded,
        next: &VerificationSession,
        secret: SpentSecret,
        action: &'static str,
    ) -> Result<bool, VerifyServiceError> {
        let advanced = self
            .sessions
            .advance_spending(next, current.session.version, secret)
            .await?;
        if !advanced {
            warn!(user_id = %next.user_id, action, ?secret, "lost verification session race");
        }
        Ok(advanced)
    }

    async fn throttle(&self, kind: IssueKind, user_id: UserId) -> Result<(), VerifyServiceError> {
        let count = self
            .limiter
            .hit(kind, user_id, self.policy.issue_window_secs)
            .await?;
        if count > self.policy.issue_limit {
            warn!(%user_id, kind = kind.as_str(), count, "issue rate limit exceeded");
            return Err(VerifyServiceError::TooManyRequests);
        }
        Ok(())
    }
}
