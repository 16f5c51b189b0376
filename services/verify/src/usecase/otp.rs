use chrono::{DateTime, Utc};
use rand::RngExt;
use serde_json::json;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use lorehaven_domain::id::UserId;

use crate::domain::repository::OtpRepository;
use crate::domain::types::{
    OTP_CHALLENGE_ISSUED, OtpChallenge, OutboxEvent, VerificationPolicy, VerifyUser,
};
use crate::error::{OtpError, VerifyServiceError};

/// Uniformly random code in `000000..=999999`.
pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:06}")
}

/// Constant-time comparison; differing lengths compare unequal.
fn codes_match(expected: &str, submitted: &str) -> bool {
    expected.as_bytes().ct_eq(submitted.as_bytes()).into()
}

/// Issues and checks 6-digit one-time codes.
pub struct OtpService<O>
where
    O: OtpRepository,
{
    pub challenges: O,
    pub policy: VerificationPolicy,
}

impl<O> OtpService<O>
where
    O: OtpRepository,
{
    /// Issue a fresh challenge for `user`, superseding any live one, and
    /// queue the code for delivery.
    pub async fn issue(
        &self,
        user: &VerifyUser,
        now: DateTime<Utc>,
    ) -> Result<OtpChallenge, VerifyServiceError> {
        let challenge = OtpChallenge {
            id: Uuid::now_v7(),
            user_id: user.id,
            code: generate_code(),
            issued_at: now,
            expires_at: now + self.policy.otp_ttl,
            attempts_remaining: self.policy.otp_max_attempts,
            consumed_at: None,
        };

        let event = OutboxEvent {
            id: Uuid::now_v7(),
            kind: OTP_CHALLENGE_ISSUED.to_owned(),
            payload: json!({
                "user_id": user.id,
                "email": user.email,
                "code": challenge.code,
                "expires_at": challenge.expires_at,
            }),
            idempotency_key: format!("{OTP_CHALLENGE_ISSUED}:{}", challenge.id),
        };

        self.challenges.replace_with_outbox(&challenge, &event).await?;
        Ok(challenge)
    }

    /// Check a submitted code against the user's live challenge and consume it.
    pub async fn check(
        &self,
        user_id: UserId,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VerifyServiceError> {
        let challenge = self.verify(user_id, submitted, now).await?;
        if self.challenges.mark_consumed(challenge.id).await? {
            return Ok(());
        }
        let err = self
            .spend_failure(&challenge)
            .await?
            .unwrap_or(OtpError::AttemptsExhausted);
        Err(err.into())
    }

    /// Match a submitted code without consuming the challenge.
    ///
    /// Expiry is checked first, then the attempt budget, then the code itself.
    /// A mismatch burns one attempt.
    pub async fn verify(
        &self,
        user_id: UserId,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpChallenge, VerifyServiceError> {
        let challenge = self
            .challenges
            .find_latest(user_id)
            .await?
            .filter(|c| c.consumed_at.is_none())
            .ok_or(OtpError::NotFound)?;

        if challenge.is_expired(now) {
            if !challenge.is_exhausted() {
                self.challenges.invalidate(challenge.id).await?;
            }
            return Err(OtpError::Expired.into());
        }
        if challenge.is_exhausted() {
            return Err(OtpError::AttemptsExhausted.into());
        }

        if !codes_match(&challenge.code, submitted) {
            if !self.challenges.record_failed_attempt(challenge.id).await? {
                // Concurrent guesses drained the budget first.
                return Err(OtpError::AttemptsExhausted.into());
            }
            tracing::debug!(%user_id, remaining = challenge.attempts_remaining - 1, "otp mismatch");
            return Err(OtpError::Mismatch.into());
        }
        Ok(challenge)
    }

    /// Why a matched challenge can no longer be consumed, or `None` while it
    /// still can. Someone else may have consumed or replaced it, or burned
    /// its last attempt.
    pub async fn spend_failure(
        &self,
        matched: &OtpChallenge,
    ) -> Result<Option<OtpError>, VerifyServiceError> {
        let latest = self.challenges.find_latest(matched.user_id).await?;
        Ok(match latest {
            Some(c) if c.id == matched.id && c.consumed_at.is_none() => {
                c.is_exhausted().then_some(OtpError::AttemptsExhausted)
            }
            _ => Some(OtpError::NotFound),
        })
    }
}
