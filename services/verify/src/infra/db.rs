use anyhow::Context as _;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use uuid::Uuid;

use lorehaven_domain::id::UserId;
use lorehaven_domain::verification::{VerificationPurpose, VerificationState};
use lorehaven_verify_schema::{
    otp_challenges, outbox_events, users, verification_sessions, verification_tokens,
};

use crate::domain::repository::{
    OtpRepository, SessionRepository, TokenRepository, UserRepository,
};
use crate::domain::types::{
    OtpChallenge, OutboxEvent, SpentSecret, VerificationSession, VerificationToken, VerifyUser,
};
use crate::error::VerifyServiceError;

// ── User repository ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserRepository for DbUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<VerifyUser>, VerifyServiceError> {
        let model = users::Entity::find_by_id(Uuid::from(id))
            .one(&self.db)
            .await
            .context("find user by id")?;
        Ok(model.map(user_from_model))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<VerifyUser>, VerifyServiceError> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .context("find user by email")?;
        Ok(model.map(user_from_model))
    }
}

fn user_from_model(model: users::Model) -> VerifyUser {
    VerifyUser {
        id: UserId(model.id),
        email: model.email,
    }
}

// ── Token repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbTokenRepository {
    pub db: DatabaseConnection,
}

impl TokenRepository for DbTokenRepository {
    async fn replace_with_outbox(
        &self,
        token: &VerificationToken,
        event: &OutboxEvent,
    ) -> Result<(), VerifyServiceError> {
        self.db
            .transaction::<_, (), sea_orm::DbErr>(|txn| {
                let token = token.clone();
                let event = event.clone();
                Box::pin(async move {
                    verification_tokens::Entity::delete_many()
                        .filter(verification_tokens::Column::UserId.eq(Uuid::from(token.user_id)))
                        .filter(verification_tokens::Column::ConsumedAt.is_null())
                        .exec(txn)
                        .await?;
                    insert_token(txn, &token).await?;
                    insert_outbox_event(txn, &event).await?;
                    Ok(())
                })
            })
            .await
            .context("replace verification token with outbox")?;
        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<VerificationToken>, VerifyServiceError> {
        let model = verification_tokens::Entity::find()
            .filter(verification_tokens::Column::TokenHash.eq(token_hash.to_vec()))
            .one(&self.db)
            .await
            .context("find verification token by hash")?;
        model.map(token_from_model).transpose()
    }

    async fn mark_consumed(&self, id: Uuid) -> Result<bool, VerifyServiceError> {
        Ok(consume_token(&self.db, id)
            .await
            .context("mark verification token consumed")?)
    }
}

async fn consume_token<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<bool, DbErr> {
    let result = verification_tokens::Entity::update_many()
        .col_expr(
            verification_tokens::Column::ConsumedAt,
            Expr::value(Some(Utc::now())),
        )
        .filter(verification_tokens::Column::Id.eq(id))
        .filter(verification_tokens::Column::ConsumedAt.is_null())
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn insert_token(
    txn: &DatabaseTransaction,
    token: &VerificationToken,
) -> Result<(), sea_orm::DbErr> {
    verification_tokens::ActiveModel {
        id: Set(token.id),
        user_id: Set(token.user_id.into()),
        token_hash: Set(token.token_hash.clone()),
        purpose: Set(token.purpose.as_str().to_owned()),
        issued_at: Set(token.issued_at),
        expires_at: Set(token.expires_at),
        consumed_at: Set(None),
    }
    .insert(txn)
    .await?;
    Ok(())
}

fn token_from_model(
    model: verification_tokens::Model,
) -> Result<VerificationToken, VerifyServiceError> {
    let purpose: VerificationPurpose = model
        .purpose
        .parse()
        .with_context(|| format!("stored verification token {}", model.id))?;
    Ok(VerificationToken {
        id: model.id,
        user_id: UserId(model.user_id),
        token_hash: model.token_hash,
        purpose,
        issued_at: model.issued_at,
        expires_at: model.expires_at,
        consumed_at: model.consumed_at,
    })
}

// ── OTP repository ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOtpRepository {
    pub db: DatabaseConnection,
}

impl OtpRepository for DbOtpRepository {
    async fn replace_with_outbox(
        &self,
        challenge: &OtpChallenge,
        event: &OutboxEvent,
    ) -> Result<(), VerifyServiceError> {
        self.db
            .transaction::<_, (), sea_orm::DbErr>(|txn| {
                let challenge = challenge.clone();
                let event = event.clone();
                Box::pin(async move {
                    otp_challenges::Entity::delete_many()
                        .filter(otp_challenges::Column::UserId.eq(Uuid::from(challenge.user_id)))
                        .filter(otp_challenges::Column::ConsumedAt.is_null())
                        .exec(txn)
                        .await?;
                    insert_challenge(txn, &challenge).await?;
                    insert_outbox_event(txn, &event).await?;
                    Ok(())
                })
            })
            .await
            .context("replace otp challenge with outbox")?;
        Ok(())
    }

    async fn find_latest(
        &self,
        user_id: UserId,
    ) -> Result<Option<OtpChallenge>, VerifyServiceError> {
        let model = otp_challenges::Entity::find()
            .filter(otp_challenges::Column::UserId.eq(Uuid::from(user_id)))
            .order_by_desc(otp_challenges::Column::IssuedAt)
            .order_by_desc(otp_challenges::Column::Id)
            .one(&self.db)
            .await
            .context("find latest otp challenge")?;
        Ok(model.map(challenge_from_model))
    }

    async fn record_failed_attempt(&self, id: Uuid) -> Result<bool, VerifyServiceError> {
        let result = otp_challenges::Entity::update_many()
            .col_expr(
                otp_challenges::Column::AttemptsRemaining,
                Expr::col(otp_challenges::Column::AttemptsRemaining).sub(1),
            )
            .filter(otp_challenges::Column::Id.eq(id))
            .filter(otp_challenges::Column::ConsumedAt.is_null())
            .filter(otp_challenges::Column::AttemptsRemaining.gt(0))
            .exec(&self.db)
            .await
            .context("record failed otp attempt")?;
        Ok(result.rows_affected == 1)
    }

    async fn mark_consumed(&self, id: Uuid) -> Result<bool, VerifyServiceError> {
        Ok(consume_challenge(&self.db, id)
            .await
            .context("mark otp challenge consumed")?)
    }

    async fn invalidate(&self, id: Uuid) -> Result<(), VerifyServiceError> {
        otp_challenges::Entity::update_many()
            .col_expr(otp_challenges::Column::AttemptsRemaining, Expr::value(0))
            .filter(otp_challenges::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("invalidate otp challenge")?;
        Ok(())
    }
}

async fn consume_challenge<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<bool, DbErr> {
    let result = otp_challenges::Entity::update_many()
        .col_expr(
            otp_challenges::Column::ConsumedAt,
            Expr::value(Some(Utc::now())),
        )
        .filter(otp_challenges::Column::Id.eq(id))
        .filter(otp_challenges::Column::ConsumedAt.is_null())
        .filter(otp_challenges::Column::AttemptsRemaining.gt(0))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn insert_challenge(
    txn: &DatabaseTransaction,
    challenge: &OtpChallenge,
) -> Result<(), sea_orm::DbErr> {
    otp_challenges::ActiveModel {
        id: Set(challenge.id),
        user_id: Set(challenge.user_id.into()),
        code: Set(challenge.code.clone()),
        issued_at: Set(challenge.issued_at),
        expires_at: Set(challenge.expires_at),
        attempts_remaining: Set(challenge.attempts_remaining),
        consumed_at: Set(None),
    }
    .insert(txn)
    .await?;
    Ok(())
}

fn challenge_from_model(model: otp_challenges::Model) -> OtpChallenge {
    OtpChallenge {
        id: model.id,
        user_id: UserId(model.user_id),
        code: model.code,
        issued_at: model.issued_at,
        expires_at: model.expires_at,
        attempts_remaining: model.attempts_remaining,
        consumed_at: model.consumed_at,
    }
}

// ── Session repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSessionRepository {
    pub db: DatabaseConnection,
}

impl SessionRepository for DbSessionRepository {
    async fn find(
        &self,
        user_id: UserId,
    ) -> Result<Option<VerificationSession>, VerifyServiceError> {
        let model = verification_sessions::Entity::find_by_id(Uuid::from(user_id))
            .one(&self.db)
            .await
            .context("find verification session")?;
        model.map(session_from_model).transpose()
    }

    async fn insert(&self, session: &VerificationSession) -> Result<bool, VerifyServiceError> {
        let inserted = verification_sessions::Entity::insert(session_to_active(session))
            .on_conflict(
                OnConflict::column(verification_sessions::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert verification session")?;
        Ok(inserted == 1)
    }

    async fn compare_and_set(
        &self,
        next: &VerificationSession,
        expected_version: i32,
    ) -> Result<bool, VerifyServiceError> {
        Ok(set_session(&self.db, next, expected_version)
            .await
            .context("compare-and-set verification session")?)
    }

    async fn advance_spending(
        &self,
        next: &VerificationSession,
        expected_version: i32,
        secret: SpentSecret,
    ) -> Result<bool, VerifyServiceError> {
        let txn = self
            .db
            .begin()
            .await
            .context("begin session advance")?;
        let spent = match secret {
            SpentSecret::Token(id) => consume_token(&txn, id).await,
            SpentSecret::Otp(id) => consume_challenge(&txn, id).await,
        }
        .context("spend verification secret")?;
        let advanced = spent
            && set_session(&txn, next, expected_version)
                .await
                .context("compare-and-set verification session")?;
        if !advanced {
            txn.rollback().await.context("roll back session advance")?;
            return Ok(false);
        }
        txn.commit().await.context("commit session advance")?;
        Ok(true)
    }
}

async fn set_session<C: ConnectionTrait>(
    conn: &C,
    next: &VerificationSession,
    expected_version: i32,
) -> Result<bool, DbErr> {
    let result = verification_sessions::Entity::update_many()
        .col_expr(
            verification_sessions::Column::State,
            Expr::value(next.state.as_str()),
        )
        .col_expr(
            verification_sessions::Column::ExpiresAt,
            Expr::value(next.expires_at),
        )
        .col_expr(
            verification_sessions::Column::Version,
            Expr::value(next.version),
        )
        .col_expr(
            verification_sessions::Column::UpdatedAt,
            Expr::value(next.updated_at),
        )
        .filter(verification_sessions::Column::UserId.eq(Uuid::from(next.user_id)))
        .filter(verification_sessions::Column::Version.eq(expected_version))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

fn session_to_active(session: &VerificationSession) -> verification_sessions::ActiveModel {
    verification_sessions::ActiveModel {
        user_id: Set(session.user_id.into()),
        state: Set(session.state.as_str().to_owned()),
        expires_at: Set(session.expires_at),
        version: Set(session.version),
        created_at: Set(session.created_at),
        updated_at: Set(session.updated_at),
    }
}

fn session_from_model(
    model: verification_sessions::Model,
) -> Result<VerificationSession, VerifyServiceError> {
    let state: VerificationState = model
        .state
        .parse()
        .with_context(|| format!("stored session of user {}", model.user_id))?;
    Ok(VerificationSession {
        user_id: UserId(model.user_id),
        state,
        expires_at: model.expires_at,
        version: model.version,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Outbox ────────────────────────────────────────────────────────────────────

async fn insert_outbox_event(
    txn: &DatabaseTransaction,
    event: &OutboxEvent,
) -> Result<(), sea_orm::DbErr> {
    let now = Utc::now();
    outbox_events::ActiveModel {
        id: Set(event.id),
        kind: Set(event.kind.clone()),
        payload: Set(event.payload.clone()),
        idempotency_key: Set(event.idempotency_key.clone()),
        attempts: Set(0),
        last_error: Set(None),
        created_at: Set(now),
        next_attempt_at: Set(now),
        processed_at: Set(None),
        failed_at: Set(None),
    }
    .insert(txn)
    .await?;
    Ok(())
}
