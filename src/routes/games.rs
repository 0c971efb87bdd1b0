use crate::{
    database::entities::games::{GameParams, MembershipLevels},
    services::{error::ServiceResult, games::GameRegistry},
};
use axum::{extract::Path, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};

/// Shared shape of the administrative game payloads
#[derive(Deserialize)]
pub struct GamePayload {
    name: String,
    #[serde(rename = "membershipLevels")]
    membership_levels: HashMap<String, i32>,
    #[serde(rename = "minMembershipLevel")]
    min_membership_level: i32,
    #[serde(rename = "maxMembershipLevel")]
    max_membership_level: i32,
    #[serde(rename = "maxClansPerPlayer")]
    max_clans_per_player: i32,
    #[serde(rename = "cooldownAfterDeny", default)]
    cooldown_after_deny: i64,
    #[serde(rename = "cooldownAfterDelete", default)]
    cooldown_after_delete: i64,
    #[serde(rename = "maxPendingInvites", default = "default_max_pending_invites")]
    max_pending_invites: i32,
    #[serde(rename = "autoApproveApplications", default)]
    auto_approve_applications: bool,
    #[serde(rename = "autoApproveInvites", default)]
    auto_approve_invites: bool,
}

fn default_max_pending_invites() -> i32 {
    -1
}

impl From<GamePayload> for GameParams {
    fn from(payload: GamePayload) -> Self {
        Self {
            name: payload.name,
            membership_levels: MembershipLevels(payload.membership_levels),
            min_membership_level: payload.min_membership_level,
            max_membership_level: payload.max_membership_level,
            max_clans_per_player: payload.max_clans_per_player,
            cooldown_after_deny: payload.cooldown_after_deny,
            cooldown_after_delete: payload.cooldown_after_delete,
            max_pending_invites: payload.max_pending_invites,
            auto_approve_applications: payload.auto_approve_applications,
            auto_approve_invites: payload.auto_approve_invites,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateGameRequest {
    #[serde(rename = "publicID")]
    public_id: String,
    #[serde(flatten)]
    game: GamePayload,
}

/// POST /games
///
/// Administrative route registering a new game tenant
pub async fn create_game(
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<CreateGameRequest>,
) -> ServiceResult<Json<Value>> {
    let game = registry
        .create(&db, req.public_id, GameParams::from(req.game))
        .await?;
    Ok(Json(json!({ "success": true, "publicID": game.public_id })))
}

/// PUT /games/:game_id
///
/// Administrative route updating the ladder, quotas and flags of an
/// existing game
pub async fn update_game(
    Path(game_id): Path<String>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<GamePayload>,
) -> ServiceResult<Json<Value>> {
    registry
        .update(&db, &game_id, GameParams::from(req))
        .await?;
    Ok(Json(json!({ "success": true })))
}
