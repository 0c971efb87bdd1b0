use crate::{
    database::entities::Metadata,
    services::{error::ServiceResult, games::GameRegistry, players, queries},
    utils::codec::NameCodec,
};
use axum::{extract::Path, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct CreatePlayerRequest {
    #[serde(rename = "publicID")]
    public_id: String,
    name: String,
    #[serde(default)]
    metadata: Metadata,
}

/// POST /games/:game_id/players
///
/// Creates a player within the game. The name is stored through the
/// process-wide codec.
pub async fn create_player(
    Path(game_id): Path<String>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Extension(codec): Extension<NameCodec>,
    Json(req): Json<CreatePlayerRequest>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let player = players::create_player(
        &db,
        &codec,
        &game,
        &req.public_id,
        &req.name,
        req.metadata,
    )
    .await?;
    Ok(Json(json!({ "success": true, "publicID": player.public_id })))
}

#[derive(Deserialize)]
pub struct UpdatePlayerRequest {
    name: String,
    #[serde(default)]
    metadata: Metadata,
}

/// PUT /games/:game_id/players/:player_public_id
///
/// Upserts a player: updates name and metadata, creating the player
/// when the public id is unknown
pub async fn update_player(
    Path((game_id, player_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Extension(codec): Extension<NameCodec>,
    Json(req): Json<UpdatePlayerRequest>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let player = players::update_player(
        &db,
        &codec,
        &game,
        &player_public_id,
        &req.name,
        req.metadata,
        true,
    )
    .await?;
    Ok(Json(json!({ "success": true, "publicID": player.public_id })))
}

/// GET /games/:game_id/players/:player_public_id
///
/// Full player details with memberships and clans partitioned by state
pub async fn get_player(
    Path((game_id, player_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Extension(codec): Extension<NameCodec>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let details = queries::get_player_details(&db, &codec, &game, &player_public_id).await?;

    let mut body = serde_json::to_value(details)?;
    body["success"] = Value::Bool(true);
    Ok(Json(body))
}
