use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HookEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HookEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HookEvents::GameId).string().not_null())
                    .col(ColumnDef::new(HookEvents::EventType).integer().not_null())
                    .col(ColumnDef::new(HookEvents::Url).string().not_null())
                    .col(ColumnDef::new(HookEvents::Payload).json().not_null())
                    .col(
                        ColumnDef::new(HookEvents::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(HookEvents::Attempts).integer().not_null())
                    .col(
                        ColumnDef::new(HookEvents::DeliveredAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HookEvents::NextAttemptAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(HookEvents::LastError).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-hook-events-pending")
                    .table(HookEvents::Table)
                    .col(HookEvents::DeliveredAt)
                    .col(HookEvents::NextAttemptAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HookEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum HookEvents {
    Table,
    Id,
    GameId,
    EventType,
    Url,
    Payload,
    CreatedAt,
    Attempts,
    DeliveredAt,
    NextAttemptAt,
    LastError,
}
