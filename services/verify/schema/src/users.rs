use sea_orm::entity::prelude::*;

/// Read model of accounts, replicated from the account service.
/// Holds only what verification needs to address a user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Lower-cased, trimmed.
    #[sea_orm(unique)]
    pub email: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::verification_tokens::Entity")]
    VerificationTokens,
    #[sea_orm(has_many = "super::otp_challenges::Entity")]
    OtpChallenges,
    #[sea_orm(has_one = "super::verification_sessions::Entity")]
    VerificationSession,
}

impl Related<super::verification_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VerificationTokens.def()
    }
}

impl Related<super::otp_challenges::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OtpChallenges.def()
    }
}

impl Related<super::verification_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VerificationSession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
