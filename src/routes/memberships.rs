use crate::services::{
    error::{ServiceError, ServiceResult},
    games::GameRegistry,
    membership::{self, Decision, LadderMove},
};
use axum::{extract::Path, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct ApplyForMembershipRequest {
    level: String,
    #[serde(rename = "playerPublicID")]
    player_public_id: String,
    #[serde(default)]
    message: String,
}

/// POST /games/:game_id/clans/:clan_public_id/memberships/application
///
/// A player applies to join the clan. The response reports whether the
/// membership was auto-approved.
pub async fn apply(
    Path((game_id, clan_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<ApplyForMembershipRequest>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let membership = membership::apply_for_membership(
        &db,
        &game,
        &clan_public_id,
        &req.level,
        &req.player_public_id,
        &req.message,
    )
    .await?;
    Ok(Json(
        json!({ "success": true, "approved": membership.approved }),
    ))
}

#[derive(Deserialize)]
pub struct InviteForMembershipRequest {
    level: String,
    #[serde(rename = "playerPublicID")]
    player_public_id: String,
    #[serde(rename = "requestorPublicID")]
    requestor_public_id: String,
    #[serde(default)]
    message: String,
}

/// POST /games/:game_id/clans/:clan_public_id/memberships/invitation
///
/// The owner or a sufficiently ranked member invites a player
pub async fn invite(
    Path((game_id, clan_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<InviteForMembershipRequest>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    membership::invite_for_membership(
        &db,
        &game,
        &clan_public_id,
        &req.level,
        &req.player_public_id,
        &req.requestor_public_id,
        &req.message,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct DecideApplicationRequest {
    #[serde(rename = "playerPublicID")]
    player_public_id: String,
    #[serde(rename = "requestorPublicID")]
    requestor_public_id: String,
}

fn parse_decision(action: &str) -> ServiceResult<Decision> {
    Decision::from_action(action).ok_or_else(|| {
        ServiceError::Validation(format!(
            "Action {action} is invalid, use approve or deny"
        ))
    })
}

/// POST /games/:game_id/clans/:clan_public_id/memberships/application/:action
///
/// The owner or an outranking member approves or denies a pending
/// application. `action` is `approve` or `deny`.
pub async fn decide_application(
    Path((game_id, clan_public_id, action)): Path<(String, String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<DecideApplicationRequest>,
) -> ServiceResult<Json<Value>> {
    let decision = parse_decision(&action)?;
    let game = registry.get(&db, &game_id).await?;
    membership::approve_or_deny_application(
        &db,
        &game,
        &clan_public_id,
        &req.player_public_id,
        &req.requestor_public_id,
        decision,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct DecideInvitationRequest {
    #[serde(rename = "playerPublicID")]
    player_public_id: String,
}

/// POST /games/:game_id/clans/:clan_public_id/memberships/invitation/:action
///
/// The invited player accepts or refuses their invitation
pub async fn decide_invitation(
    Path((game_id, clan_public_id, action)): Path<(String, String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<DecideInvitationRequest>,
) -> ServiceResult<Json<Value>> {
    let decision = parse_decision(&action)?;
    let game = registry.get(&db, &game_id).await?;
    membership::approve_or_deny_invitation(
        &db,
        &game,
        &clan_public_id,
        &req.player_public_id,
        decision,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct DeleteMembershipRequest {
    #[serde(rename = "playerPublicID")]
    player_public_id: String,
    #[serde(rename = "requestorPublicID")]
    requestor_public_id: String,
}

/// POST /games/:game_id/clans/:clan_public_id/memberships/delete
///
/// A member leaves, or an outranking member removes them (recording a
/// ban on the row)
pub async fn delete(
    Path((game_id, clan_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<DeleteMembershipRequest>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    membership::delete_membership(
        &db,
        &game,
        &clan_public_id,
        &req.player_public_id,
        &req.requestor_public_id,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct PromoteOrDemoteRequest {
    #[serde(rename = "playerPublicID")]
    player_public_id: String,
    #[serde(rename = "requestorPublicID")]
    requestor_public_id: String,
}

/// POST /games/:game_id/clans/:clan_public_id/memberships/promote
///
/// Moves a member one level up the ladder. The new level is reported
/// back.
pub async fn promote(
    path: Path<(String, String)>,
    db: Extension<DatabaseConnection>,
    registry: Extension<Arc<GameRegistry>>,
    req: Json<PromoteOrDemoteRequest>,
) -> ServiceResult<Json<Value>> {
    ladder_move(path, db, registry, req, LadderMove::Promote).await
}

/// POST /games/:game_id/clans/:clan_public_id/memberships/demote
///
/// Moves a member one level down the ladder
pub async fn demote(
    path: Path<(String, String)>,
    db: Extension<DatabaseConnection>,
    registry: Extension<Arc<GameRegistry>>,
    req: Json<PromoteOrDemoteRequest>,
) -> ServiceResult<Json<Value>> {
    ladder_move(path, db, registry, req, LadderMove::Demote).await
}

async fn ladder_move(
    Path((game_id, clan_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<PromoteOrDemoteRequest>,
    ladder_move: LadderMove,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let membership = membership::promote_or_demote_member(
        &db,
        &game,
        &clan_public_id,
        &req.player_public_id,
        &req.requestor_public_id,
        ladder_move,
    )
    .await?;
    Ok(Json(json!({ "success": true, "level": membership.level })))
}
