//! Player store operations.
//!
//! Create and upsert paths plus the lookups used by the HTTP surface.
//! Names pass through the injected codec on the way in and out; derived
//! counts are owned by the entity recompute helpers.

use crate::{
    database::entities::{Game, Metadata, Player},
    services::error::{ServiceError, ServiceResult},
    utils::codec::NameCodec,
};
use sea_orm::DatabaseConnection;

/// Longest accepted player name and public id
const MAX_FIELD_LENGTH: usize = 255;

fn check_field(value: &str, field: &str) -> ServiceResult<()> {
    if value.is_empty() {
        return Err(ServiceError::Validation(format!(
            "Player {field} is required"
        )));
    }
    if value.len() > MAX_FIELD_LENGTH {
        return Err(ServiceError::Validation(format!(
            "Player {field} cannot exceed {MAX_FIELD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Creates a new player within the game
pub async fn create_player(
    db: &DatabaseConnection,
    codec: &NameCodec,
    game: &Game,
    public_id: &str,
    name: &str,
    metadata: Metadata,
) -> ServiceResult<Player> {
    check_field(public_id, "public id")?;
    check_field(name, "name")?;

    if Player::by_public_id(db, &game.public_id, public_id)
        .await?
        .is_some()
    {
        return Err(ServiceError::Conflict(format!(
            "Player with public id {} already exists for game {}",
            public_id, game.public_id
        )));
    }

    Ok(Player::create(
        db,
        codec,
        game.public_id.clone(),
        public_id.to_string(),
        name,
        metadata,
    )
    .await?)
}

/// Updates a player, creating it when `upsert` is set and the public id
/// is unknown
pub async fn update_player(
    db: &DatabaseConnection,
    codec: &NameCodec,
    game: &Game,
    public_id: &str,
    name: &str,
    metadata: Metadata,
    upsert: bool,
) -> ServiceResult<Player> {
    check_field(public_id, "public id")?;
    check_field(name, "name")?;

    match Player::by_public_id(db, &game.public_id, public_id).await? {
        Some(player) => Ok(player.update(db, codec, Some(name), Some(metadata)).await?),
        None if upsert => Ok(Player::create(
            db,
            codec,
            game.public_id.clone(),
            public_id.to_string(),
            name,
            metadata,
        )
        .await?),
        None => Err(ServiceError::PlayerNotFound(public_id.to_string())),
    }
}

/// Loads a player by public id
pub async fn get_player(
    db: &DatabaseConnection,
    game_id: &str,
    public_id: &str,
) -> ServiceResult<Player> {
    Player::by_public_id(db, game_id, public_id)
        .await?
        .ok_or_else(|| ServiceError::PlayerNotFound(public_id.to_string()))
}

#[cfg(test)]
mod test {
    use super::{create_player, update_player, ServiceError};
    use crate::database::connect_test;
    use crate::database::entities::games::{GameParams, MembershipLevels};
    use crate::database::entities::{Game, Metadata, Player};
    use crate::utils::codec::NameCodec;
    use sea_orm::DatabaseConnection;
    use std::collections::HashMap;

    async fn seed_game(db: &DatabaseConnection) -> Game {
        let mut levels = HashMap::new();
        levels.insert("Member".to_string(), 0);
        Game::create(
            db,
            "player-store-game".to_string(),
            GameParams {
                name: "Player Store Game".to_string(),
                membership_levels: MembershipLevels(levels),
                min_membership_level: 0,
                max_membership_level: 0,
                max_clans_per_player: 3,
                cooldown_after_deny: 0,
                cooldown_after_delete: 0,
                max_pending_invites: -1,
                auto_approve_applications: false,
                auto_approve_invites: false,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_stores_encrypted_name() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db).await;

        let player = create_player(&db, &codec, &game, "player-1", "Shep", Metadata::default())
            .await
            .unwrap();
        assert_ne!(player.name, "Shep");
        assert_eq!(player.decrypted_name(&codec).unwrap(), "Shep");

        let stored = Player::by_public_id(&db, &game.public_id, "player-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.decrypted_name(&codec).unwrap(), "Shep");
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db).await;

        create_player(&db, &codec, &game, "player-1", "Shep", Metadata::default())
            .await
            .unwrap();
        let err = create_player(&db, &codec, &game, "player-1", "Shep", Metadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_upsert() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db).await;

        // Without upsert an unknown player errors
        let err = update_player(
            &db,
            &codec,
            &game,
            "player-2",
            "Tali",
            Metadata::default(),
            false,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Player was not found with id: player-2");

        // With upsert the player is created, then updated in place
        let created = update_player(
            &db,
            &codec,
            &game,
            "player-2",
            "Tali",
            Metadata::default(),
            true,
        )
        .await
        .unwrap();
        let updated = update_player(
            &db,
            &codec,
            &game,
            "player-2",
            "Tali'Zorah",
            Metadata::default(),
            true,
        )
        .await
        .unwrap();
        assert_eq!(created.id, updated.id);
        assert_eq!(updated.decrypted_name(&codec).unwrap(), "Tali'Zorah");
    }

    #[tokio::test]
    async fn test_validation() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db).await;

        let long_name = "a".repeat(256);
        let err = create_player(&db, &codec, &game, "player-3", &long_name, Metadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
