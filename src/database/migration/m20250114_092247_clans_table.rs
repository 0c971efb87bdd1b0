use sea_orm_migration::prelude::*;

use super::m20250114_091502_players_table::Players;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Clans::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Clans::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Clans::GameId).string().not_null())
                    .col(ColumnDef::new(Clans::PublicId).string().not_null())
                    .col(ColumnDef::new(Clans::Name).string().not_null())
                    .col(ColumnDef::new(Clans::NormalizedName).string().not_null())
                    .col(ColumnDef::new(Clans::OwnerId).integer().not_null())
                    .col(ColumnDef::new(Clans::Metadata).json().not_null())
                    .col(ColumnDef::new(Clans::AllowApplication).boolean().not_null())
                    .col(ColumnDef::new(Clans::AutoJoin).boolean().not_null())
                    .col(ColumnDef::new(Clans::MembershipCount).integer().not_null())
                    .col(ColumnDef::new(Clans::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Clans::UpdatedAt).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Clans::Table, Clans::OwnerId)
                            .to(Players::Table, Players::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("idx-clans-game-public-id")
                    .table(Clans::Table)
                    .col(Clans::GameId)
                    .col(Clans::PublicId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-clans-normalized-name")
                    .table(Clans::Table)
                    .col(Clans::GameId)
                    .col(Clans::NormalizedName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-clans-owner")
                    .table(Clans::Table)
                    .col(Clans::OwnerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Clans::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Clans {
    Table,
    Id,
    GameId,
    PublicId,
    Name,
    NormalizedName,
    OwnerId,
    Metadata,
    AllowApplication,
    AutoJoin,
    MembershipCount,
    CreatedAt,
    UpdatedAt,
}
