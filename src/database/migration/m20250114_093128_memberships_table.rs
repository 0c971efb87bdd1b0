use sea_orm_migration::prelude::*;

use super::m20250114_091502_players_table::Players;
use super::m20250114_092247_clans_table::Clans;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Memberships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Memberships::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Memberships::GameId).string().not_null())
                    .col(ColumnDef::new(Memberships::ClanId).integer().not_null())
                    .col(ColumnDef::new(Memberships::PlayerId).integer().not_null())
                    .col(
                        ColumnDef::new(Memberships::RequestorId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Memberships::Level).string().not_null())
                    .col(ColumnDef::new(Memberships::Approved).boolean().not_null())
                    .col(ColumnDef::new(Memberships::Denied).boolean().not_null())
                    .col(ColumnDef::new(Memberships::Banned).boolean().not_null())
                    .col(ColumnDef::new(Memberships::Message).string().not_null())
                    .col(
                        ColumnDef::new(Memberships::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Memberships::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Memberships::ApprovedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Memberships::DeniedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Memberships::DeletedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Memberships::DeletedBy).integer())
                    .col(ColumnDef::new(Memberships::ApproverId).integer())
                    .col(ColumnDef::new(Memberships::DenierId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Memberships::Table, Memberships::ClanId)
                            .to(Clans::Table, Clans::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Memberships::Table, Memberships::PlayerId)
                            .to(Players::Table, Players::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-memberships-pair")
                    .table(Memberships::Table)
                    .col(Memberships::ClanId)
                    .col(Memberships::PlayerId)
                    .col(Memberships::DeletedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-memberships-player-state")
                    .table(Memberships::Table)
                    .col(Memberships::PlayerId)
                    .col(Memberships::Approved)
                    .col(Memberships::DeletedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Memberships::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Memberships {
    Table,
    Id,
    GameId,
    ClanId,
    PlayerId,
    RequestorId,
    Level,
    Approved,
    Denied,
    Banned,
    Message,
    CreatedAt,
    UpdatedAt,
    ApprovedAt,
    DeniedAt,
    DeletedAt,
    DeletedBy,
    ApproverId,
    DenierId,
}
