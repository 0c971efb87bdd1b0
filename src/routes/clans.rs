use crate::{
    database::entities::Metadata,
    services::{
        clans::{self, CreateClanParams, UpdateClanParams},
        error::ServiceResult,
        games::GameRegistry,
        queries,
    },
    utils::codec::NameCodec,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct CreateClanRequest {
    #[serde(rename = "publicID")]
    public_id: String,
    name: String,
    #[serde(rename = "ownerPublicID")]
    owner_public_id: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(rename = "allowApplication", default)]
    allow_application: bool,
    #[serde(rename = "autoJoin", default)]
    auto_join: bool,
}

/// POST /games/:game_id/clans
///
/// Creates a clan owned by the provided player
pub async fn create_clan(
    Path(game_id): Path<String>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<CreateClanRequest>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let clan = clans::create_clan(
        &db,
        &game,
        &CreateClanParams {
            public_id: req.public_id,
            name: req.name,
            owner_public_id: req.owner_public_id,
            metadata: req.metadata,
            allow_application: req.allow_application,
            auto_join: req.auto_join,
        },
    )
    .await?;
    Ok(Json(json!({ "success": true, "publicID": clan.public_id })))
}

#[derive(Deserialize)]
pub struct UpdateClanRequest {
    name: String,
    #[serde(rename = "ownerPublicID")]
    owner_public_id: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(rename = "allowApplication", default)]
    allow_application: bool,
    #[serde(rename = "autoJoin", default)]
    auto_join: bool,
}

/// PUT /games/:game_id/clans/:clan_public_id
///
/// Updates clan fields. Only the current owner may update; everyone
/// else receives the same not-found error as for a missing clan.
pub async fn update_clan(
    Path((game_id, clan_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<UpdateClanRequest>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    clans::update_clan(
        &db,
        &game,
        &clan_public_id,
        &UpdateClanParams {
            owner_public_id: req.owner_public_id,
            name: req.name,
            metadata: req.metadata,
            allow_application: req.allow_application,
            auto_join: req.auto_join,
        },
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /games/:game_id/clans
///
/// All clans of the game as summaries, ordered by name
pub async fn list_clans(
    Path(game_id): Path<String>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let clans = crate::database::entities::Clan::all_by_game(&db, &game.public_id).await?;
    let summaries: Vec<_> = clans
        .into_iter()
        .map(queries::ClanSummary::from)
        .collect();
    Ok(Json(json!({ "success": true, "clans": summaries })))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    term: String,
}

/// GET /games/:game_id/clans/search?term=
///
/// Case- and accent-insensitive prefix search over clan names
pub async fn search_clans(
    Path(game_id): Path<String>,
    Query(query): Query<SearchQuery>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let clans = clans::search_clan(&db, &game.public_id, &query.term).await?;
    let summaries: Vec<_> = clans
        .into_iter()
        .map(queries::ClanSummary::from)
        .collect();
    Ok(Json(json!({ "success": true, "clans": summaries })))
}

#[derive(Deserialize)]
pub struct SummariesQuery {
    /// Comma separated clan public ids
    #[serde(rename = "clanPublicIds", default)]
    clan_public_ids: String,
}

/// GET /games/:game_id/clans/summaries?clanPublicIds=a,b,c
///
/// Summaries for the requested clans. When some ids cannot be resolved
/// the found subset is still returned next to the failure reason.
pub async fn clans_summaries(
    Path(game_id): Path<String>,
    Query(query): Query<SummariesQuery>,
    Extension(db): Extension<DatabaseConnection>,
) -> ServiceResult<Response> {
    let requested: Vec<String> = query
        .clan_public_ids
        .split(',')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();

    let (summaries, missing) = queries::get_clans_summaries(&db, &game_id, &requested).await?;
    if missing.is_empty() {
        return Ok(Json(json!({ "success": true, "clans": summaries })).into_response());
    }

    // Partial miss: report the found subset with the stable reason
    let reason = clans::missing_clans_reason(&game_id, &missing);
    Ok((
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "reason": reason, "clans": summaries })),
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct DetailsQuery {
    #[serde(rename = "maxPendingApplications", default = "default_max_pending")]
    max_pending_applications: usize,
}

fn default_max_pending() -> usize {
    10
}

/// GET /games/:game_id/clans/:clan_public_id
///
/// Full clan details with owner, roster and membership buckets
pub async fn clan_details(
    Path((game_id, clan_public_id)): Path<(String, String)>,
    Query(query): Query<DetailsQuery>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Extension(codec): Extension<NameCodec>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let details = queries::get_clan_details(
        &db,
        &codec,
        &game,
        &clan_public_id,
        query.max_pending_applications,
    )
    .await?;

    let mut body = serde_json::to_value(details)?;
    body["success"] = Value::Bool(true);
    body["publicID"] = Value::String(clan_public_id);
    Ok(Json(body))
}

/// GET /games/:game_id/clans/:clan_public_id/summary
///
/// The six-key clan summary
pub async fn clan_summary(
    Path((game_id, clan_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
) -> ServiceResult<Json<Value>> {
    let summary = queries::get_clan_summary(&db, &game_id, &clan_public_id).await?;
    let mut body = serde_json::to_value(summary)?;
    body["success"] = Value::Bool(true);
    Ok(Json(body))
}

/// POST /games/:game_id/clans/:clan_public_id/leave
///
/// The owner leaves the clan: ownership passes to the longest-tenured
/// member, or the clan dissolves when none remains
pub async fn leave_clan(
    Path((game_id, clan_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let outcome = clans::leave_clan(&db, &game, &clan_public_id).await?;
    Ok(Json(json!({
        "success": true,
        "isDeleted": outcome.new_owner_public_id.is_none(),
        "newOwnerPublicID": outcome.new_owner_public_id,
    })))
}

#[derive(Deserialize)]
pub struct AdjustMembershipCountRequest {
    delta: i32,
}

/// POST /games/:game_id/clans/:clan_public_id/membership-count
///
/// Administrative repair of the stored membership count. Transitions
/// recompute counts from the membership table, so this is only for
/// fixing a row that drifted through outside interference.
pub async fn adjust_membership_count(
    Path((game_id, clan_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<AdjustMembershipCountRequest>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    clans::increment_clan_membership_count(&db, &game.public_id, &clan_public_id, req.delta)
        .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct TransferOwnershipRequest {
    #[serde(rename = "playerPublicID")]
    player_public_id: String,
}

/// POST /games/:game_id/clans/:clan_public_id/transfer-ownership
///
/// Transfers clan ownership to an approved member
pub async fn transfer_ownership(
    Path((game_id, clan_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<TransferOwnershipRequest>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    clans::transfer_clan_ownership(&db, &game, &clan_public_id, &req.player_public_id).await?;
    Ok(Json(json!({ "success": true })))
}
