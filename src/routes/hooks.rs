use crate::{
    database::entities::{Hook, HookEvent},
    services::{
        error::{ServiceError, ServiceResult},
        games::GameRegistry,
    },
};
use axum::{extract::Path, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct CreateHookRequest {
    #[serde(rename = "eventType")]
    event_type: HookEvent,
    url: String,
}

/// POST /games/:game_id/hooks
///
/// Binds an outbound webhook to an event type of the game
pub async fn create_hook(
    Path(game_id): Path<String>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
    Json(req): Json<CreateHookRequest>,
) -> ServiceResult<Json<Value>> {
    if req.url.is_empty() {
        return Err(ServiceError::Validation(
            "Hook url is required".to_string(),
        ));
    }

    let game = registry.get(&db, &game_id).await?;
    let hook = Hook::create(&db, game.public_id, req.event_type, req.url).await?;
    Ok(Json(json!({ "success": true, "publicID": hook.public_id })))
}

/// GET /games/:game_id/hooks
///
/// Lists the webhook bindings of the game
pub async fn list_hooks(
    Path(game_id): Path<String>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let hooks = Hook::all_by_game(&db, &game.public_id).await?;
    Ok(Json(json!({ "success": true, "hooks": hooks })))
}

/// DELETE /games/:game_id/hooks/:hook_public_id
///
/// Removes a webhook binding
pub async fn delete_hook(
    Path((game_id, hook_public_id)): Path<(String, String)>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(registry): Extension<Arc<GameRegistry>>,
) -> ServiceResult<Json<Value>> {
    let game = registry.get(&db, &game_id).await?;
    let removed = Hook::delete_by_public_id(&db, &game.public_id, &hook_public_id).await?;
    if !removed {
        return Err(ServiceError::Validation(format!(
            "Hook was not found with id: {hook_public_id}"
        )));
    }
    Ok(Json(json!({ "success": true })))
}
