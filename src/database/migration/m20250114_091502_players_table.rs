use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Players::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Players::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Players::GameId).string().not_null())
                    .col(ColumnDef::new(Players::PublicId).string().not_null())
                    .col(ColumnDef::new(Players::Name).string().not_null())
                    .col(ColumnDef::new(Players::Metadata).json().not_null())
                    .col(ColumnDef::new(Players::OwnershipCount).integer().not_null())
                    .col(
                        ColumnDef::new(Players::MembershipCount)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Players::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Players::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("idx-players-game-public-id")
                    .table(Players::Table)
                    .col(Players::GameId)
                    .col(Players::PublicId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Players::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Players {
    Table,
    Id,
    GameId,
    PublicId,
    Name,
    Metadata,
    OwnershipCount,
    MembershipCount,
    CreatedAt,
    UpdatedAt,
}
