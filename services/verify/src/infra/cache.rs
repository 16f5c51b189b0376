use deadpool_redis::Pool;
use deadpool_redis::redis::AsyncCommands;

use lorehaven_domain::id::UserId;

use crate::domain::repository::IssueLimiter;
use crate::domain::types::IssueKind;
use crate::error::VerifyServiceError;

/// Fixed-window issue counter: `INCR`, and `EXPIRE` on the first hit of a window.
#[derive(Clone)]
pub struct RedisIssueLimiter {
    pub pool: Pool,
}

fn issue_key(kind: IssueKind, user_id: UserId) -> String {
    format!("verify_issue:{}:{}", kind.as_str(), user_id)
}

impl IssueLimiter for RedisIssueLimiter {
    async fn hit(
        &self,
        kind: IssueKind,
        user_id: UserId,
        window_secs: u64,
    ) -> Result<u64, VerifyServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| VerifyServiceError::Internal(e.into()))?;
        let key = issue_key(kind, user_id);
        let count: u64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e: deadpool_redis::redis::RedisError| VerifyServiceError::Internal(e.into()))?;
        if count == 1 {
            let window = i64::try_from(window_secs).unwrap_or(i64::MAX);
            let (): () = conn
                .expire(&key, window)
                .await
                .map_err(|e: deadpool_redis::redis::RedisError| {
                    VerifyServiceError::Internal(e.into())
                })?;
        }
        Ok(count)
    }
}
