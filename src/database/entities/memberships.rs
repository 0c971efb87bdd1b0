use crate::{
    database::DbResult,
    utils::{
        clock::now_milli,
        types::{ClanID, MembershipID, PlayerID},
    },
};
use sea_orm::prelude::*;
use sea_orm::{
    sea_query::Expr, ActiveValue::Set, ConnectionTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;

/// A (player, clan) relation in one of the states pending-application,
/// pending-invite, approved, denied, banned or deleted.
///
/// At most one row per (player, clan) has `deleted_at = 0`. Denied and
/// banned rows always carry a `deleted_at` timestamp; a fresh row is
/// inserted if the pair is ever re-created after cooldown.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "memberships")]
pub struct Model {
    /// Unique identifier for the membership
    #[sea_orm(primary_key)]
    pub id: MembershipID,
    /// Public id of the owning game
    pub game_id: String,
    pub clan_id: ClanID,
    pub player_id: PlayerID,
    /// The player that created the row: the applicant themselves for an
    /// application, the inviting member for an invitation
    pub requestor_id: PlayerID,
    /// Level name from the game ladder
    pub level: String,
    pub approved: bool,
    pub denied: bool,
    /// Set when the membership was removed by someone other than the
    /// member
    pub banned: bool,
    pub message: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub approved_at: i64,
    pub denied_at: i64,
    /// 0 while the row is live
    pub deleted_at: i64,
    pub deleted_by: Option<PlayerID>,
    pub approver_id: Option<PlayerID>,
    pub denier_id: Option<PlayerID>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::players::Entity",
        from = "Column::PlayerId",
        to = "super::players::Column::Id"
    )]
    Player,
    #[sea_orm(
        belongs_to = "super::clans::Entity",
        from = "Column::ClanId",
        to = "super::clans::Column::Id"
    )]
    Clan,
}

impl Related<super::players::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Player.def()
    }
}

impl Related<super::clans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Fields for inserting a fresh membership row
#[derive(Clone, Debug)]
pub struct NewMembership {
    pub game_id: String,
    pub clan_id: ClanID,
    pub player_id: PlayerID,
    pub requestor_id: PlayerID,
    pub level: String,
    pub message: String,
    pub approved: bool,
    /// Overrides `created_at` when synthesizing history rows, otherwise
    /// the current time is used
    pub created_at: Option<i64>,
}

impl Model {
    /// Inserts a new membership row. Auto-approved rows record the
    /// requestor as approver.
    pub async fn create<C: ConnectionTrait>(db: &C, new: NewMembership) -> DbResult<Self> {
        let now = now_milli();
        ActiveModel {
            game_id: Set(new.game_id),
            clan_id: Set(new.clan_id),
            player_id: Set(new.player_id),
            requestor_id: Set(new.requestor_id),
            level: Set(new.level),
            message: Set(new.message),
            approved: Set(new.approved),
            denied: Set(false),
            banned: Set(false),
            created_at: Set(new.created_at.unwrap_or(now)),
            updated_at: Set(now),
            approved_at: Set(if new.approved { now } else { 0 }),
            denied_at: Set(0),
            deleted_at: Set(0),
            deleted_by: Set(None),
            approver_id: Set(new.approved.then_some(new.requestor_id)),
            denier_id: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Attempts to find a membership with the provided ID
    pub async fn by_id<C: ConnectionTrait>(db: &C, id: MembershipID) -> DbResult<Option<Self>> {
        Entity::find_by_id(id).one(db).await
    }

    /// The live (non-deleted) row for the pair, if any, taking a
    /// row-level update lock
    pub async fn lock_live<C: ConnectionTrait>(
        db: &C,
        clan_id: ClanID,
        player_id: PlayerID,
    ) -> DbResult<Option<Self>> {
        Entity::find()
            .filter(
                Column::ClanId
                    .eq(clan_id)
                    .and(Column::PlayerId.eq(player_id))
                    .and(Column::DeletedAt.eq(0i64)),
            )
            .lock_exclusive()
            .one(db)
            .await
    }

    /// The most recent row for the pair regardless of state. Used for
    /// cooldown and ban checks on re-application.
    pub async fn latest_for_pair<C: ConnectionTrait>(
        db: &C,
        clan_id: ClanID,
        player_id: PlayerID,
    ) -> DbResult<Option<Self>> {
        Entity::find()
            .filter(Column::ClanId.eq(clan_id).and(Column::PlayerId.eq(player_id)))
            .order_by_desc(Column::Id)
            .one(db)
            .await
    }

    /// The live approved membership of the player in the clan
    pub async fn approved_for_pair<C: ConnectionTrait>(
        db: &C,
        clan_id: ClanID,
        player_id: PlayerID,
    ) -> DbResult<Option<Self>> {
        Entity::find()
            .filter(
                Column::ClanId
                    .eq(clan_id)
                    .and(Column::PlayerId.eq(player_id))
                    .and(Column::Approved.eq(true))
                    .and(Column::DeletedAt.eq(0i64)),
            )
            .one(db)
            .await
    }

    /// All approved live memberships of a clan ordered by tenure
    /// (creation time, ties by player id). The head of this list is the
    /// successor when the owner leaves.
    pub async fn approved_by_clan<C: ConnectionTrait>(
        db: &C,
        clan_id: ClanID,
    ) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(
                Column::ClanId
                    .eq(clan_id)
                    .and(Column::Approved.eq(true))
                    .and(Column::DeletedAt.eq(0i64)),
            )
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::PlayerId)
            .all(db)
            .await
    }

    /// Every membership row of a clan, including denied and banned
    /// history rows. Used by the clan details query.
    pub async fn all_by_clan<C: ConnectionTrait>(db: &C, clan_id: ClanID) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(Column::ClanId.eq(clan_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Every membership row of a player within a game
    pub async fn all_by_player<C: ConnectionTrait>(
        db: &C,
        game_id: &str,
        player_id: PlayerID,
    ) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(Column::GameId.eq(game_id).and(Column::PlayerId.eq(player_id)))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Number of live pending invitations for the player across the game
    pub async fn pending_invite_count<C: ConnectionTrait>(
        db: &C,
        game_id: &str,
        player_id: PlayerID,
    ) -> DbResult<u64> {
        Entity::find()
            .filter(
                Column::GameId
                    .eq(game_id)
                    .and(Column::PlayerId.eq(player_id))
                    .and(Column::Approved.eq(false))
                    .and(Column::Denied.eq(false))
                    .and(Column::DeletedAt.eq(0i64))
                    .and(Expr::col(Column::RequestorId).ne(Expr::col(Column::PlayerId))),
            )
            .count(db)
            .await
    }

    /// Whether the row is awaiting approval or denial
    pub fn is_pending(&self) -> bool {
        !self.approved && !self.denied && self.deleted_at == 0
    }

    /// Whether the row was created by someone other than the player
    pub fn is_invite(&self) -> bool {
        self.requestor_id != self.player_id
    }

    /// Marks the membership approved by the provided player
    pub async fn approve<C: ConnectionTrait>(self, db: &C, approver: PlayerID) -> DbResult<Self> {
        let now = now_milli();
        let mut model = self.into_active_model();
        model.approved = Set(true);
        model.approved_at = Set(now);
        model.approver_id = Set(Some(approver));
        model.updated_at = Set(now);
        model.update(db).await
    }

    /// Marks the membership denied by the provided player. Denied rows
    /// are terminal and also carry the deletion timestamp.
    pub async fn deny<C: ConnectionTrait>(self, db: &C, denier: PlayerID) -> DbResult<Self> {
        let now = now_milli();
        let mut model = self.into_active_model();
        model.denied = Set(true);
        model.denied_at = Set(now);
        model.denier_id = Set(Some(denier));
        model.deleted_at = Set(now);
        model.deleted_by = Set(Some(denier));
        model.updated_at = Set(now);
        model.update(db).await
    }

    /// Marks the membership deleted. Removal by anyone other than the
    /// member records a ban.
    pub async fn mark_deleted<C: ConnectionTrait>(
        self,
        db: &C,
        deleted_by: PlayerID,
    ) -> DbResult<Self> {
        let now = now_milli();
        let banned = deleted_by != self.player_id;
        let mut model = self.into_active_model();
        model.banned = Set(banned);
        model.deleted_at = Set(now);
        model.deleted_by = Set(Some(deleted_by));
        model.updated_at = Set(now);
        model.update(db).await
    }

    /// Moves the membership to a new level on the ladder
    pub async fn set_level<C: ConnectionTrait>(self, db: &C, level: String) -> DbResult<Self> {
        let mut model = self.into_active_model();
        model.level = Set(level);
        model.updated_at = Set(now_milli());
        model.update(db).await
    }
}
