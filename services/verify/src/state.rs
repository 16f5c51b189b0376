use deadpool_redis::Pool as RedisPool;
use sea_orm::DatabaseConnection;
use url::Url;

use crate::domain::types::VerificationPolicy;
use crate::infra::cache::RedisIssueLimiter;
use crate::infra::db::{
    DbOtpRepository, DbSessionRepository, DbTokenRepository, DbUserRepository,
};
use crate::usecase::flow::VerificationFlow;
use crate::usecase::otp::OtpService;
use crate::usecase::token::TokenService;

/// The state machine wired to Postgres and Redis.
pub type DbVerificationFlow = VerificationFlow<
    DbUserRepository,
    DbSessionRepository,
    DbTokenRepository,
    DbOtpRepository,
    RedisIssueLimiter,
>;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: RedisPool,
    pub policy: VerificationPolicy,
    /// Public origin verification links point at.
    pub link_base: Url,
}

impl AppState {
    pub fn user_repo(&self) -> DbUserRepository {
        DbUserRepository {
            db: self.db.clone(),
        }
    }

    pub fn session_repo(&self) -> DbSessionRepository {
        DbSessionRepository {
            db: self.db.clone(),
        }
    }

    pub fn token_repo(&self) -> DbTokenRepository {
        DbTokenRepository {
            db: self.db.clone(),
        }
    }

    pub fn otp_repo(&self) -> DbOtpRepository {
        DbOtpRepository {
            db: self.db.clone(),
        }
    }

    pub fn issue_limiter(&self) -> RedisIssueLimiter {
        RedisIssueLimiter {
            pool: self.redis.clone(),
        }
    }

    pub fn flow(&self) -> DbVerificationFlow {
        VerificationFlow {
            users: self.user_repo(),
            sessions: self.session_repo(),
            tokens: TokenService {
                tokens: self.token_repo(),
                policy: self.policy.clone(),
            },
            otps: OtpService {
                challenges: self.otp_repo(),
                policy: self.policy.clone(),
            },
            limiter: self.issue_limiter(),
            policy: self.policy.clone(),
            link_base: self.link_base.clone(),
        }
    }
}
