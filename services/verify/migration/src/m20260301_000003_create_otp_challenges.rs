use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OtpChallenges::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OtpChallenges::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OtpChallenges::UserId).uuid().not_null())
                    .col(ColumnDef::new(OtpChallenges::Code).string_len(6).not_null())
                    .col(
                        ColumnDef::new(OtpChallenges::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OtpChallenges::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OtpChallenges::AttemptsRemaining)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OtpChallenges::ConsumedAt).timestamp_with_time_zone())
                    .check(Expr::col(OtpChallenges::AttemptsRemaining).gte(0))
                    .foreign_key(
                        ForeignKey::create()
                            .from(OtpChallenges::Table, OtpChallenges::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Latest-challenge lookup.
        manager
            .create_index(
                Index::create()
                    .table(OtpChallenges::Table)
                    .col(OtpChallenges::UserId)
                    .col(OtpChallenges::IssuedAt)
                    .name("idx_otp_challenges_user_id_issued_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OtpChallenges::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum OtpChallenges {
    Table,
    Id,
    UserId,
    Code,
    IssuedAt,
    ExpiresAt,
    AttemptsRemaining,
    ConsumedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
