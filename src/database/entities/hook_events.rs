use crate::{
    database::{entities::hooks::HookEvent, DbResult},
    utils::clock::now_milli,
};
use sea_orm::prelude::*;
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, FromJsonQueryResult, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

/// Outbox row for a webhook event.
///
/// Rows are inserted inside the same transaction as the state change
/// they describe, so an event exists if and only if its transition
/// committed. The delivery worker polls committed rows and POSTs them,
/// which makes delivery at-least-once.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "hook_events")]
pub struct Model {
    /// Unique identifier for the event
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Public id of the owning game
    pub game_id: String,
    pub event_type: HookEvent,
    /// Destination resolved from the hook binding at enqueue time
    pub url: String,
    pub payload: Payload,
    pub created_at: i64,
    /// Delivery attempts made so far
    pub attempts: i32,
    /// 0 = pending, -1 = given up, otherwise delivery time
    pub delivered_at: i64,
    /// Earliest time of the next delivery attempt
    pub next_attempt_at: i64,
    pub last_error: Option<String>,
}

/// Materialized event body stored as a JSON column
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Payload(pub serde_json::Value);

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Writes a pending event row. Must be called on the transaction of
    /// the state change that triggered the event.
    pub async fn enqueue<C: ConnectionTrait>(
        db: &C,
        game_id: String,
        event_type: HookEvent,
        url: String,
        payload: serde_json::Value,
    ) -> DbResult<Self> {
        let now = now_milli();
        ActiveModel {
            game_id: Set(game_id),
            event_type: Set(event_type),
            url: Set(url),
            payload: Set(Payload(payload)),
            created_at: Set(now),
            attempts: Set(0),
            delivered_at: Set(0),
            next_attempt_at: Set(now),
            last_error: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Pending events whose next attempt is due, oldest first
    pub async fn due<C: ConnectionTrait>(db: &C, now: i64, limit: u64) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(
                Column::DeliveredAt
                    .eq(0i64)
                    .and(Column::NextAttemptAt.lte(now)),
            )
            .order_by_asc(Column::Id)
            .limit(limit)
            .all(db)
            .await
    }

    /// Marks the event as delivered
    pub async fn mark_delivered<C: ConnectionTrait>(self, db: &C) -> DbResult<Self> {
        let mut model = self.into_active_model();
        model.delivered_at = Set(now_milli());
        model.update(db).await
    }

    /// Records a failed attempt, scheduling a retry with exponential
    /// backoff or giving the event up once the attempt cap is reached
    pub async fn mark_failed<C: ConnectionTrait>(
        self,
        db: &C,
        error: String,
        base_backoff: i64,
        max_attempts: i32,
    ) -> DbResult<Self> {
        let attempts = self.attempts + 1;
        let now = now_milli();
        let mut model = self.into_active_model();
        model.attempts = Set(attempts);
        model.last_error = Set(Some(error));
        if attempts >= max_attempts {
            model.delivered_at = Set(-1);
        } else {
            let backoff = base_backoff.saturating_mul(1 << attempts.min(16));
            model.next_attempt_at = Set(now + backoff);
        }
        model.update(db).await
    }

    /// All events recorded for a game, oldest first. Used by tests and
    /// the admin surface.
    pub async fn all_by_game<C: ConnectionTrait>(db: &C, game_id: &str) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(Column::GameId.eq(game_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
