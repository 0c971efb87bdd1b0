use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Hooks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Hooks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Hooks::GameId).string().not_null())
                    .col(ColumnDef::new(Hooks::PublicId).string().not_null())
                    .col(ColumnDef::new(Hooks::EventType).integer().not_null())
                    .col(ColumnDef::new(Hooks::Url).string().not_null())
                    .col(ColumnDef::new(Hooks::CreatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-hooks-game-event")
                    .table(Hooks::Table)
                    .col(Hooks::GameId)
                    .col(Hooks::EventType)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Hooks::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Hooks {
    Table,
    Id,
    GameId,
    PublicId,
    EventType,
    Url,
    CreatedAt,
}
