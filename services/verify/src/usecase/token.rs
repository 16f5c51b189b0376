use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::RngExt;
use serde_json::json;
use sha2::{Digest, Sha256};
use url::Url;
use uuid::Uuid;

use lorehaven_domain::verification::VerificationPurpose;

use crate::domain::repository::TokenRepository;
use crate::domain::types::{
    EMAIL_VERIFICATION_REQUESTED, IssuedToken, OutboxEvent, TOKEN_BYTES, VerificationPolicy,
    VerificationToken, VerifyUser,
};
use crate::error::{TokenError, VerifyServiceError};

/// 32 random bytes, base64url without padding (43 URL-safe characters).
pub fn generate_token_value() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Tokens are looked up by hash so a database leak does not leak live links.
pub fn hash_token(value: &str) -> Vec<u8> {
    Sha256::digest(value.as_bytes()).to_vec()
}

/// `{base}/verify/email/{token}`, tolerating a trailing slash on `base`.
pub fn build_verify_url(base: &Url, token: &str) -> Result<Url, VerifyServiceError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| anyhow::anyhow!("public base url cannot carry a path: {base}"))?
        .pop_if_empty()
        .extend(["verify", "email", token]);
    Ok(url)
}

/// Issues and consumes single-use email verification tokens.
pub struct TokenService<T>
where
    T: TokenRepository,
{
    pub tokens: T,
    pub policy: VerificationPolicy,
}

impl<T> TokenService<T>
where
    T: TokenRepository,
{
    /// Issue a fresh token for `user`, superseding any unconsumed one, and
    /// queue the link for delivery.
    pub async fn issue(
        &self,
        user: &VerifyUser,
        purpose: VerificationPurpose,
        link_base: &Url,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, VerifyServiceError> {
        let value = generate_token_value();
        let token = VerificationToken {
            id: Uuid::now_v7(),
            user_id: user.id,
            token_hash: hash_token(&value),
            purpose,
            issued_at: now,
            expires_at: now + self.policy.email_token_ttl,
            consumed_at: None,
        };
        let verify_url = build_verify_url(link_base, &value)?;

        let event = OutboxEvent {
            id: Uuid::now_v7(),
            kind: EMAIL_VERIFICATION_REQUESTED.to_owned(),
            payload: json!({
                "user_id": user.id,
                "email": user.email,
                "purpose": purpose.as_str(),
                "verify_url": verify_url.as_str(),
                "expires_at": token.expires_at,
            }),
            idempotency_key: format!("{EMAIL_VERIFICATION_REQUESTED}:{}", token.id),
        };

        self.tokens.replace_with_outbox(&token, &event).await?;
        Ok(IssuedToken { token, value })
    }

    /// Classify a token value without consuming it.
    pub async fn inspect(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationToken, VerifyServiceError> {
        let token = self
            .tokens
            .find_by_hash(&hash_token(value))
            .await?
            .ok_or(TokenError::NotFound)?;

        // A used token stays "used" after its TTL passes: replays must read as replays.
        if token.is_consumed() {
            return Err(TokenError::AlreadyConsumed.into());
        }
        if token.is_expired(now) {
            return Err(TokenError::Expired.into());
        }
        Ok(token)
    }

    /// Consume a token. Of any number of concurrent callers exactly one
    /// succeeds; the rest observe `AlreadyConsumed`.
    pub async fn consume(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationToken, VerifyServiceError> {
        let token = self.inspect(value, now).await?;
        if !self.tokens.mark_consumed(token.id).await? {
            return Err(TokenError::AlreadyConsumed.into());
        }
        Ok(VerificationToken {
            consumed_at: Some(now),
            ..token
        })
    }
}
