//! Webhook dispatch.
//!
//! Transitions call [dispatch] on their open transaction. Hook bindings
//! for the (game, event) pair are resolved and one outbox row per
//! binding is written within the same transaction, so events become
//! visible to the delivery worker exactly when the transition commits
//! and never for rolled back work.

use crate::{
    database::entities::{hook_events, hooks, HookEvent},
    services::error::ServiceResult,
};
use sea_orm::ConnectionTrait;
use serde::Serialize;

pub mod delivery;

/// Materialized body of an outbound event
#[derive(Serialize, Clone, Debug)]
pub struct EventPayload {
    #[serde(rename = "gameID")]
    pub game_id: String,
    #[serde(rename = "clanID")]
    pub clan_id: String,
    #[serde(rename = "playerID", skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(rename = "requestorID", skip_serializing_if = "Option::is_none")]
    pub requestor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "eventType")]
    pub event_type: &'static str,
}

impl EventPayload {
    pub fn new(event: HookEvent, game_id: &str, clan_public_id: &str) -> Self {
        Self {
            game_id: game_id.to_string(),
            clan_id: clan_public_id.to_string(),
            player_id: None,
            requestor_id: None,
            level: None,
            message: None,
            event_type: event.name(),
        }
    }

    pub fn player(mut self, public_id: &str) -> Self {
        self.player_id = Some(public_id.to_string());
        self
    }

    pub fn requestor(mut self, public_id: &str) -> Self {
        self.requestor_id = Some(public_id.to_string());
        self
    }

    pub fn level(mut self, level: &str) -> Self {
        self.level = Some(level.to_string());
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        if !message.is_empty() {
            self.message = Some(message.to_string());
        }
        self
    }
}

/// Enqueues the event for every hook bound to (game, event type).
///
/// Must be called on the transaction of the state change that produced
/// the event; a failure here aborts the whole transition.
pub async fn dispatch<C: ConnectionTrait>(
    db: &C,
    event: HookEvent,
    payload: EventPayload,
) -> ServiceResult<()> {
    let bindings = hooks::Model::by_game_and_event(db, &payload.game_id, event).await?;
    if bindings.is_empty() {
        return Ok(());
    }

    let body = serde_json::to_value(&payload)?;
    for binding in bindings {
        hook_events::Model::enqueue(
            db,
            payload.game_id.clone(),
            event,
            binding.url,
            body.clone(),
        )
        .await?;
    }
    Ok(())
}
