//! Game registry.
//!
//! Games are the tenants of the service and change rarely, so reads go
//! through a per-process TTL cache. Serving a slightly stale snapshot
//! is acceptable: quotas and ladders are re-validated by the next
//! write.

use crate::{
    database::entities::{games::GameParams, Game},
    services::error::{ServiceError, ServiceResult},
    utils::clock::now_milli,
};
use log::debug;
use parking_lot::RwLock;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;

/// Longest accepted game name and public id
const MAX_FIELD_LENGTH: usize = 255;

struct CachedGame {
    game: Game,
    fetched_at: i64,
}

/// Read-mostly catalog of games with a TTL cache keyed by public id
pub struct GameRegistry {
    cache: RwLock<HashMap<String, CachedGame>>,
    /// How long a snapshot may be served, in ms
    ttl: i64,
}

impl GameRegistry {
    pub fn new(ttl: i64) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// The game snapshot for the provided public id, served from cache
    /// while fresh
    pub async fn get(&self, db: &DatabaseConnection, public_id: &str) -> ServiceResult<Game> {
        let now = now_milli();
        if let Some(cached) = self.cache.read().get(public_id) {
            if now - cached.fetched_at < self.ttl {
                return Ok(cached.game.clone());
            }
        }

        let game = Game::by_public_id(db, public_id)
            .await?
            .ok_or_else(|| ServiceError::GameNotFound(public_id.to_string()))?;

        debug!("Refreshed game cache entry for {public_id}");
        self.cache.write().insert(
            public_id.to_string(),
            CachedGame {
                game: game.clone(),
                fetched_at: now,
            },
        );
        Ok(game)
    }

    /// Drops the cached snapshot after an administrative update
    pub fn invalidate(&self, public_id: &str) {
        self.cache.write().remove(public_id);
    }

    /// Creates a game after validating its ladder and quotas
    pub async fn create(
        &self,
        db: &DatabaseConnection,
        public_id: String,
        params: GameParams,
    ) -> ServiceResult<Game> {
        if public_id.is_empty() || public_id.len() > MAX_FIELD_LENGTH {
            return Err(ServiceError::Validation(format!(
                "Game public id must be between 1 and {MAX_FIELD_LENGTH} characters"
            )));
        }
        validate_params(&params)?;

        if Game::by_public_id(db, &public_id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Game with public id {public_id} already exists"
            )));
        }

        Ok(Game::create(db, public_id, params).await?)
    }

    /// Updates a game and invalidates its cached snapshot
    pub async fn update(
        &self,
        db: &DatabaseConnection,
        public_id: &str,
        params: GameParams,
    ) -> ServiceResult<Game> {
        validate_params(&params)?;

        let game = Game::by_public_id(db, public_id)
            .await?
            .ok_or_else(|| ServiceError::GameNotFound(public_id.to_string()))?;
        let updated = game.update(db, params).await?;

        self.invalidate(public_id);
        Ok(updated)
    }
}

fn validate_params(params: &GameParams) -> ServiceResult<()> {
    if params.name.is_empty() || params.name.len() > MAX_FIELD_LENGTH {
        return Err(ServiceError::Validation(format!(
            "Game name must be between 1 and {MAX_FIELD_LENGTH} characters"
        )));
    }
    if params.membership_levels.0.is_empty() {
        return Err(ServiceError::Validation(
            "Game requires at least one membership level".to_string(),
        ));
    }
    if params.min_membership_level > params.max_membership_level {
        return Err(ServiceError::Validation(
            "Game minMembershipLevel cannot exceed maxMembershipLevel".to_string(),
        ));
    }
    for (name, rank) in &params.membership_levels.0 {
        if *rank < params.min_membership_level || *rank > params.max_membership_level {
            return Err(ServiceError::Validation(format!(
                "Membership level {name} is outside the game level bounds"
            )));
        }
    }
    if params.max_clans_per_player < 1 {
        return Err(ServiceError::Validation(
            "Game maxClansPerPlayer must be at least 1".to_string(),
        ));
    }
    if params.cooldown_after_deny < 0 || params.cooldown_after_delete < 0 {
        return Err(ServiceError::Validation(
            "Game cooldowns cannot be negative".to_string(),
        ));
    }
    if params.max_pending_invites < -1 {
        return Err(ServiceError::Validation(
            "Game maxPendingInvites must be -1 or greater".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{GameRegistry, ServiceError};
    use crate::database::connect_test;
    use crate::database::entities::games::{GameParams, MembershipLevels};
    use std::collections::HashMap;

    fn valid_params() -> GameParams {
        let mut levels = HashMap::new();
        levels.insert("Member".to_string(), 0);
        levels.insert("Elder".to_string(), 1);
        GameParams {
            name: "Test Game".to_string(),
            membership_levels: MembershipLevels(levels),
            min_membership_level: 0,
            max_membership_level: 1,
            max_clans_per_player: 3,
            cooldown_after_deny: 1000,
            cooldown_after_delete: 1000,
            max_pending_invites: -1,
            auto_approve_applications: false,
            auto_approve_invites: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = connect_test().await;
        let registry = GameRegistry::new(60_000);

        let created = registry
            .create(&db, "game-1".to_string(), valid_params())
            .await
            .unwrap();
        let fetched = registry.get(&db, "game-1").await.unwrap();
        assert_eq!(created, fetched);

        // Second get is served from cache
        let cached = registry.get(&db, "game-1").await.unwrap();
        assert_eq!(created, cached);
    }

    #[tokio::test]
    async fn test_missing_game() {
        let db = connect_test().await;
        let registry = GameRegistry::new(60_000);
        let err = registry.get(&db, "missing").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Game was not found with id: missing"
        );
    }

    #[tokio::test]
    async fn test_validation() {
        let db = connect_test().await;
        let registry = GameRegistry::new(60_000);

        let mut params = valid_params();
        params.membership_levels = MembershipLevels(HashMap::new());
        let err = registry
            .create(&db, "game-2".to_string(), params)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut params = valid_params();
        params.min_membership_level = 5;
        assert!(matches!(
            registry.create(&db, "game-3".to_string(), params).await,
            Err(ServiceError::Validation(_))
        ));

        let mut params = valid_params();
        params.max_clans_per_player = 0;
        assert!(matches!(
            registry.create(&db, "game-4".to_string(), params).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_invalidates_cache() {
        let db = connect_test().await;
        let registry = GameRegistry::new(60_000);

        registry
            .create(&db, "game-5".to_string(), valid_params())
            .await
            .unwrap();
        registry.get(&db, "game-5").await.unwrap();

        let mut params = valid_params();
        params.name = "Renamed".to_string();
        registry.update(&db, "game-5", params).await.unwrap();

        let fetched = registry.get(&db, "game-5").await.unwrap();
        assert_eq!(fetched.name, "Renamed");
    }
}
