use crate::{
    database::{
        entities::{clans, memberships, Metadata},
        DbResult,
    },
    utils::{
        clock::now_milli,
        codec::{CodecError, NameCodec},
        types::PlayerID,
    },
};
use sea_orm::prelude::*;
use sea_orm::{
    sea_query::Expr, ActiveValue::Set, ConnectionTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter,
};
use serde::Serialize;

/// A player within a single game. The stored `name` is the encrypted
/// form; use [Model::decrypted_name] before exposing it. The two count
/// columns are caches recomputed from the membership and clan tables
/// after every transition that can change them.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "players")]
pub struct Model {
    /// Unique identifier for the player
    #[sea_orm(primary_key)]
    pub id: PlayerID,
    /// Public id of the owning game
    pub game_id: String,
    /// External key, unique within the game
    pub public_id: String,
    /// Player name, encrypted at rest
    #[serde(skip)]
    pub name: String,
    pub metadata: Metadata,
    /// Count of clans this player currently owns
    pub ownership_count: i32,
    /// Count of approved non-deleted memberships
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
    /// Creates a new player, storing the name through the codec
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        codec: &NameCodec,
        game_id: String,
        public_id: String,
        name: &str,
        metadata: Metadata,
    ) -> DbResult<Self> {
        let now = now_milli();
        ActiveModel {
            game_id: Set(game_id),
            public_id: Set(public_id),
            name: Set(codec.encrypt(name)),
            metadata: Set(metadata),
            ownership_count: Set(0),
            membership_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Attempts to find a player with the provided ID
    pub async fn by_id<C: ConnectionTrait>(db: &C, id: PlayerID) -> DbResult<Option<Self>> {
        Entity::find_by_id(id).one(db).await
    }

    /// Attempts to find a player by game and public id
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

    /// Loads many players by id in one query
    pub async fn by_ids<C: ConnectionTrait>(db: &C, ids: Vec<PlayerID>) -> DbResult<Vec<Self>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find().filter(Column::Id.is_in(ids)).all(db).await
    }

    /// Decrypts the stored name for presentation
    pub fn decrypted_name(&self, codec: &NameCodec) -> Result<String, CodecError> {
        codec.decrypt(&self.name)
    }

    /// Updates name and/or metadata of this player
    pub async fn update<C: ConnectionTrait>(
        self,
        db: &C,
        codec: &NameCodec,
        name: Option<&str>,
        metadata: Option<Metadata>,
    ) -> DbResult<Self> {
        let mut model = self.into_active_model();
        if let Some(name) = name {
            model.name = Set(codec.encrypt(name));
        }
        if let Some(metadata) = metadata {
            model.metadata = Set(metadata);
        }
        model.updated_at = Set(now_milli());
        model.update(db).await
    }

    /// Recomputes the membership count of the player from the membership
    /// table and stores it. Safe to call repeatedly.
    pub async fn refresh_membership_count<C: ConnectionTrait>(
        db: &C,
        player_id: PlayerID,
    ) -> DbResult<i32> {
        let count = memberships::Entity::find()
            .filter(
                memberships::Column::PlayerId
                    .eq(player_id)
                    .and(memberships::Column::Approved.eq(true))
                    .and(memberships::Column::DeletedAt.eq(0i64)),
            )
            .count(db)
            .await? as i32;

        Entity::update_many()
            .col_expr(Column::MembershipCount, Expr::value(count))
            .filter(Column::Id.eq(player_id))
            .exec(db)
            .await?;
        Ok(count)
    }

    /// Recomputes the ownership count of the player from the clan table
    /// and stores it. Safe to call repeatedly.
    pub async fn refresh_ownership_count<C: ConnectionTrait>(
        db: &C,
        player_id: PlayerID,
    ) -> DbResult<i32> {
        let count = clans::Entity::find()
            .filter(clans::Column::OwnerId.eq(player_id))
            .count(db)
            .await? as i32;

        Entity::update_many()
            .col_expr(Column::OwnershipCount, Expr::value(count))
            .filter(Column::Id.eq(player_id))
            .exec(db)
            .await?;
        Ok(count)
    }
}
