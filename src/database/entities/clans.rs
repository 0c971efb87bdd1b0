use crate::{
    database::{
        entities::{memberships, Metadata},
        DbResult,
    },
    utils::{
        clock::now_milli,
        search,
        types::{ClanID, PlayerID},
    },
};
use sea_orm::prelude::*;
use sea_orm::{
    sea_query::Expr, ActiveValue::Set, ConnectionTrait, DbErr, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;

/// A clan within a single game. Exactly one player owns the clan and the
/// owner is not represented by a membership row while owning.
/// `membership_count` counts the owner plus approved non-deleted members
/// and is recomputed from the membership table, never adjusted by deltas.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "clans")]
pub struct Model {
    /// Unique identifier for the clan
    #[sea_orm(primary_key)]
    pub id: ClanID,
    /// Public id of the owning game
    pub game_id: String,
    /// External key, unique within the game
    pub public_id: String,
    pub name: String,
    /// Lowercased, accent-folded form of `name` used for search
    #[serde(skip)]
    pub normalized_name: String,
    pub owner_id: PlayerID,
    pub metadata: Metadata,
    /// Players may apply for membership
    pub allow_application: bool,
    /// Applications are approved on creation
    pub auto_join: bool,
    pub membership_count: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::memberships::Entity")]
    Memberships,
}

impl Related<super::memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Inserts a new clan owned by the provided player
    #[allow(clippy::too_many_arguments)]
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        game_id: String,
        public_id: String,
        name: String,
        owner_id: PlayerID,
        metadata: Metadata,
        allow_application: bool,
        auto_join: bool,
    ) -> DbResult<Self> {
        let now = now_milli();
        ActiveModel {
            game_id: Set(game_id),
            normalized_name: Set(search::normalize(&name)),
            public_id: Set(public_id),
            name: Set(name),
            owner_id: Set(owner_id),
            metadata: Set(metadata),
            allow_application: Set(allow_application),
            auto_join: Set(auto_join),
            membership_count: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Attempts to find a clan with the provided ID
    pub async fn by_id<C: ConnectionTrait>(db: &C, id: ClanID) -> DbResult<Option<Self>> {
        Entity::find_by_id(id).one(db).await
    }

    /// Attempts to find a clan by game and public id
    pub async fn by_public_id<C: ConnectionTrait>(
        db: &C,
        game_id: &str,
        public_id: &str,
    ) -> DbResult<Option<Self>> {
        Entity::find()
            .filter(
                Column::GameId
                    .eq(game_id)
                    .and(Column::PublicId.eq(public_id)),
            )
            .one(db)
            .await
    }

    /// Same as [Self::by_public_id] but takes a row-level update lock so
    /// concurrent membership transitions against the clan serialize.
    /// Locking order is always clan first, memberships after.
    pub async fn lock_by_public_id<C: ConnectionTrait>(
        db: &C,
        game_id: &str,
        public_id: &str,
    ) -> DbResult<Option<Self>> {
        Entity::find()
            .filter(
                Column::GameId
                    .eq(game_id)
                    .and(Column::PublicId.eq(public_id)),
            )
            .lock_exclusive()
            .one(db)
            .await
    }

    /// Attempts to find a clan by game, public id and owner. Used by
    /// owner-only operations so a non-owner cannot distinguish a clan
    /// they don't control from a missing one.
    pub async fn by_public_id_and_owner<C: ConnectionTrait>(
        db: &C,
        game_id: &str,
        public_id: &str,
        owner_id: PlayerID,
    ) -> DbResult<Option<Self>> {
        Entity::find()
            .filter(
                Column::GameId
                    .eq(game_id)
                    .and(Column::PublicId.eq(public_id))
                    .and(Column::OwnerId.eq(owner_id)),
            )
            .one(db)
            .await
    }

    /// Loads the subset of the requested public ids that exist, ordered
    /// by name
    pub async fn by_public_ids<C: ConnectionTrait>(
        db: &C,
        game_id: &str,
        public_ids: &[String],
    ) -> DbResult<Vec<Self>> {
        if public_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(
                Column::GameId
                    .eq(game_id)
                    .and(Column::PublicId.is_in(public_ids.iter().map(String::as_str))),
            )
            .order_by_asc(Column::Name)
            .all(db)
            .await
    }

    /// All clans of a game ordered by name
    pub async fn all_by_game<C: ConnectionTrait>(db: &C, game_id: &str) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(Column::GameId.eq(game_id))
            .order_by_asc(Column::Name)
            .all(db)
            .await
    }

    /// Clans owned by the provided player
    pub async fn owned_by<C: ConnectionTrait>(
        db: &C,
        game_id: &str,
        owner_id: PlayerID,
    ) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(Column::GameId.eq(game_id).and(Column::OwnerId.eq(owner_id)))
            .order_by_asc(Column::Name)
            .all(db)
            .await
    }

    /// Prefix search over the normalized name, ordered by name
    pub async fn search<C: ConnectionTrait>(
        db: &C,
        game_id: &str,
        term: &str,
    ) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(
                Column::GameId
                    .eq(game_id)
                    .and(Column::NormalizedName.like(search::prefix_pattern(term))),
            )
            .order_by_asc(Column::Name)
            .all(db)
            .await
    }

    /// Updates the mutable clan fields, keeping the normalized search
    /// column in sync with the name
    pub async fn update<C: ConnectionTrait>(
        self,
        db: &C,
        name: String,
        metadata: Metadata,
        allow_application: bool,
        auto_join: bool,
    ) -> DbResult<Self> {
        let mut model = self.into_active_model();
        model.normalized_name = Set(search::normalize(&name));
        model.name = Set(name);
        model.metadata = Set(metadata);
        model.allow_application = Set(allow_application);
        model.auto_join = Set(auto_join);
        model.updated_at = Set(now_milli());
        model.update(db).await
    }

    /// Reassigns clan ownership to the provided player
    pub async fn set_owner<C: ConnectionTrait>(
        self,
        db: &C,
        owner_id: PlayerID,
    ) -> DbResult<Self> {
        let mut model = self.into_active_model();
        model.owner_id = Set(owner_id);
        model.updated_at = Set(now_milli());
        model.update(db).await
    }

    /// Removes the clan row entirely. Used when the owner leaves a clan
    /// that has no remaining members.
    pub async fn destroy<C: ConnectionTrait>(self, db: &C) -> DbResult<()> {
        let model = self.into_active_model();
        model.delete(db).await?;
        Ok(())
    }

    /// Recomputes the membership count (owner included) from the
    /// membership table and stores it. Safe to call repeatedly.
    pub async fn refresh_membership_count<C: ConnectionTrait>(
        db: &C,
        clan_id: ClanID,
    ) -> DbResult<i32> {
        let members = memberships::Entity::find()
            .filter(
                memberships::Column::ClanId
                    .eq(clan_id)
                    .and(memberships::Column::Approved.eq(true))
                    .and(memberships::Column::DeletedAt.eq(0i64)),
            )
            .count(db)
            .await? as i32;

        let count = members + 1;
        Entity::update_many()
            .col_expr(Column::MembershipCount, Expr::value(count))
            .filter(Column::Id.eq(clan_id))
            .exec(db)
            .await?;
        Ok(count)
    }

    /// Adjusts the stored membership count by a delta. Kept for
    /// administrative repair; the state machine recomputes counts
    /// instead of trusting deltas.
    pub async fn increment_membership_count<C: ConnectionTrait>(
        db: &C,
        clan_id: ClanID,
        delta: i32,
    ) -> DbResult<()> {
        let result = Entity::update_many()
            .col_expr(
                Column::MembershipCount,
                Expr::col(Column::MembershipCount).add(delta),
            )
            .filter(Column::Id.eq(clan_id))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(DbErr::RecordNotFound(format!(
                "Clan was not found with id: {clan_id}"
            )));
        }
        Ok(())
    }
}
