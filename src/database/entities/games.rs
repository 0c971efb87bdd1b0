use crate::{database::DbResult, utils::clock::now_milli};
use sea_orm::prelude::*;
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, FromJsonQueryResult, IntoActiveModel, QueryFilter,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A game tenant. Each game carries its own membership-level ladder,
/// quotas and cooldowns which parameterize every clan and membership
/// operation performed under it.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "games")]
pub struct Model {
    /// Unique identifier for the game
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Stable external key used in routes and foreign rows
    pub public_id: String,
    pub name: String,
    /// Mapping from level name to its rank on the ladder
    pub membership_levels: MembershipLevels,
    pub min_membership_level: i32,
    pub max_membership_level: i32,
    /// How many clans a player may own or be approved in at once
    pub max_clans_per_player: i32,
    /// Cooldown in ms before a denied player may re-apply
    pub cooldown_after_deny: i64,
    /// Cooldown in ms before a deleted member may re-apply
    pub cooldown_after_delete: i64,
    /// Cap on pending invites per player, -1 disables the cap
    pub max_pending_invites: i32,
    /// Applications are approved on creation
    pub auto_approve_applications: bool,
    /// Invitations are approved on creation
    pub auto_approve_invites: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The level ladder of a game stored as a JSON column
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct MembershipLevels(pub HashMap<String, i32>);

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// The mutable fields of a game, shared between create and update
#[derive(Clone, Debug)]
pub struct GameParams {
    pub name: String,
    pub membership_levels: MembershipLevels,
    pub min_membership_level: i32,
    pub max_membership_level: i32,
    pub max_clans_per_player: i32,
    pub cooldown_after_deny: i64,
    pub cooldown_after_delete: i64,
    pub max_pending_invites: i32,
    pub auto_approve_applications: bool,
    pub auto_approve_invites: bool,
}

impl Model {
    /// Inserts a new game with the provided public id and parameters
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        public_id: String,
        params: GameParams,
    ) -> DbResult<Self> {
        let now = now_milli();
        ActiveModel {
            public_id: Set(public_id),
            name: Set(params.name),
            membership_levels: Set(params.membership_levels),
            min_membership_level: Set(params.min_membership_level),
            max_membership_level: Set(params.max_membership_level),
            max_clans_per_player: Set(params.max_clans_per_player),
            cooldown_after_deny: Set(params.cooldown_after_deny),
            cooldown_after_delete: Set(params.cooldown_after_delete),
            max_pending_invites: Set(params.max_pending_invites),
            auto_approve_applications: Set(params.auto_approve_applications),
            auto_approve_invites: Set(params.auto_approve_invites),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Attempts to find a game by its public id
    pub async fn by_public_id<C: ConnectionTrait>(
        db: &C,
        public_id: &str,
    ) -> DbResult<Option<Self>> {
        Entity::find()
            .filter(Column::PublicId.eq(public_id))
            .one(db)
            .await
    }

    /// Replaces the mutable fields of this game
    pub async fn update<C: ConnectionTrait>(self, db: &C, params: GameParams) -> DbResult<Self> {
        let mut model = self.into_active_model();
        model.name = Set(params.name);
        model.membership_levels = Set(params.membership_levels);
        model.min_membership_level = Set(params.min_membership_level);
        model.max_membership_level = Set(params.max_membership_level);
        model.max_clans_per_player = Set(params.max_clans_per_player);
        model.cooldown_after_deny = Set(params.cooldown_after_deny);
        model.cooldown_after_delete = Set(params.cooldown_after_delete);
        model.max_pending_invites = Set(params.max_pending_invites);
        model.auto_approve_applications = Set(params.auto_approve_applications);
        model.auto_approve_invites = Set(params.auto_approve_invites);
        model.updated_at = Set(now_milli());
        model.update(db).await
    }
}
