use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Games::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Games::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Games::PublicId).string().not_null())
                    .col(ColumnDef::new(Games::Name).string().not_null())
                    .col(ColumnDef::new(Games::MembershipLevels).json().not_null())
                    .col(
                        ColumnDef::new(Games::MinMembershipLevel)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Games::MaxMembershipLevel)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Games::MaxClansPerPlayer)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Games::CooldownAfterDeny)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Games::CooldownAfterDelete)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Games::MaxPendingInvites)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Games::AutoApproveApplications)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Games::AutoApproveInvites)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Games::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Games::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("idx-games-public-id")
                    .table(Games::Table)
                    .col(Games::PublicId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Games::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Games {
    Table,
    Id,
    PublicId,
    Name,
    MembershipLevels,
    MinMembershipLevel,
    MaxMembershipLevel,
    MaxClansPerPlayer,
    CooldownAfterDeny,
    CooldownAfterDelete,
    MaxPendingInvites,
    AutoApproveApplications,
    AutoApproveInvites,
    CreatedAt,
    UpdatedAt,
}
