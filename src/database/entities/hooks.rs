use crate::{database::DbResult, utils::clock::now_milli, utils::types::HookID};
use sea_orm::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A webhook binding: events of `event_type` within `game_id` are
/// delivered to `url`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "hooks")]
pub struct Model {
    /// Unique identifier for the hook
    #[sea_orm(primary_key)]
    pub id: HookID,
    /// Public id of the owning game
    pub game_id: String,
    /// External key used to manage the hook
    pub public_id: String,
    pub event_type: HookEvent,
    pub url: String,
    pub created_at: i64,
}

/// The events a hook can be bound to
#[derive(
    Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[repr(i32)]
pub enum HookEvent {
    #[sea_orm(num_value = 0)]
    ClanCreated = 0,
    #[sea_orm(num_value = 1)]
    ClanUpdated = 1,
    #[sea_orm(num_value = 2)]
    ClanDeleted = 2,
    #[sea_orm(num_value = 3)]
    ClanMemberAdded = 3,
    #[sea_orm(num_value = 4)]
    ClanMemberRemoved = 4,
    #[sea_orm(num_value = 5)]
    MembershipApplicationCreated = 5,
    #[sea_orm(num_value = 6)]
    MembershipApplicationDeleted = 6,
    #[sea_orm(num_value = 7)]
    MembershipApproved = 7,
    #[sea_orm(num_value = 8)]
    MembershipDenied = 8,
    #[sea_orm(num_value = 9)]
    MembershipLeft = 9,
    #[sea_orm(num_value = 10)]
    MembershipPromoted = 10,
    #[sea_orm(num_value = 11)]
    MembershipDemoted = 11,
}

impl HookEvent {
    /// The event name carried in outbound payloads
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClanCreated => "ClanCreated",
            Self::ClanUpdated => "ClanUpdated",
            Self::ClanDeleted => "ClanDeleted",
            Self::ClanMemberAdded => "ClanMemberAdded",
            Self::ClanMemberRemoved => "ClanMemberRemoved",
            Self::MembershipApplicationCreated => "MembershipApplicationCreated",
            Self::MembershipApplicationDeleted => "MembershipApplicationDeleted",
            Self::MembershipApproved => "MembershipApproved",
            Self::MembershipDenied => "MembershipDenied",
            Self::MembershipLeft => "MembershipLeft",
            Self::MembershipPromoted => "MembershipPromoted",
            Self::MembershipDemoted => "MembershipDemoted",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Registers a new hook for the game and event type
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        game_id: String,
        event_type: HookEvent,
        url: String,
    ) -> DbResult<Self> {
        ActiveModel {
            game_id: Set(game_id),
            public_id: Set(Uuid::new_v4().to_string()),
            event_type: Set(event_type),
            url: Set(url),
            created_at: Set(now_milli()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// The hooks a transition of `event_type` should fire for the game
    pub async fn by_game_and_event<C: ConnectionTrait>(
        db: &C,
        game_id: &str,
        event_type: HookEvent,
    ) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(
                Column::GameId
                    .eq(game_id)
                    .and(Column::EventType.eq(event_type)),
            )
            .all(db)
            .await
    }

    /// All hooks registered for a game
    pub async fn all_by_game<C: ConnectionTrait>(db: &C, game_id: &str) -> DbResult<Vec<Self>> {
        Entity::find().filter(Column::GameId.eq(game_id)).all(db).await
    }

    /// Removes a hook by its public id, returning whether it existed
    pub async fn delete_by_public_id<C: ConnectionTrait>(
        db: &C,
        game_id: &str,
        public_id: &str,
    ) -> DbResult<bool> {
        let result = Entity::delete_many()
            .filter(
                Column::GameId
                    .eq(game_id)
                    .and(Column::PublicId.eq(public_id)),
            )
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
