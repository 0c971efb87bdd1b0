//! Seed helpers shared by the service test modules.

use crate::{
    database::entities::{
        games::{GameParams, MembershipLevels},
        hook_events,
        memberships::NewMembership,
        Clan, Game, Hook, HookEvent, Membership, Metadata, Player,
    },
    utils::codec::NameCodec,
};
use sea_orm::DatabaseConnection;
use std::collections::HashMap;

/// Ladder used by most tests: Member(0) < Elder(1) < CoLeader(2)
pub fn default_params() -> GameParams {
    let mut levels = HashMap::new();
    levels.insert("Member".to_string(), 0);
    levels.insert("Elder".to_string(), 1);
    levels.insert("CoLeader".to_string(), 2);
    GameParams {
        name: "Test Game".to_string(),
        membership_levels: MembershipLevels(levels),
        min_membership_level: 0,
        max_membership_level: 2,
        max_clans_per_player: 5,
        cooldown_after_deny: 3_600_000,
        cooldown_after_delete: 0,
        max_pending_invites: -1,
        auto_approve_applications: false,
        auto_approve_invites: false,
    }
}

pub async fn seed_game(db: &DatabaseConnection, public_id: &str) -> Game {
    seed_game_with(db, public_id, |_| {}).await
}

pub async fn seed_game_with(
    db: &DatabaseConnection,
    public_id: &str,
    tweak: impl FnOnce(&mut GameParams),
) -> Game {
    let mut params = default_params();
    tweak(&mut params);
    Game::create(db, public_id.to_string(), params)
        .await
        .expect("Failed to seed game")
}

pub async fn seed_player(
    db: &DatabaseConnection,
    codec: &NameCodec,
    game: &Game,
    public_id: &str,
) -> Player {
    Player::create(
        db,
        codec,
        game.public_id.clone(),
        public_id.to_string(),
        &format!("name of {public_id}"),
        Metadata::default(),
    )
    .await
    .expect("Failed to seed player")
}

pub async fn seed_clan(
    db: &DatabaseConnection,
    game: &Game,
    owner: &Player,
    public_id: &str,
    allow_application: bool,
    auto_join: bool,
) -> Clan {
    let clan = Clan::create(
        db,
        game.public_id.clone(),
        public_id.to_string(),
        format!("Clan {public_id}"),
        owner.id,
        Metadata::default(),
        allow_application,
        auto_join,
    )
    .await
    .expect("Failed to seed clan");
    Player::refresh_ownership_count(db, owner.id)
        .await
        .expect("Failed to refresh seeded owner count");
    clan
}

/// Inserts an already approved membership and refreshes the counts the
/// way the state machine would have
pub async fn seed_member(
    db: &DatabaseConnection,
    game: &Game,
    clan: &Clan,
    player: &Player,
    level: &str,
) -> Membership {
    let membership = Membership::create(
        db,
        NewMembership {
            game_id: game.public_id.clone(),
            clan_id: clan.id,
            player_id: player.id,
            requestor_id: clan.owner_id,
            level: level.to_string(),
            message: String::new(),
            approved: true,
            created_at: None,
        },
    )
    .await
    .expect("Failed to seed membership");
    Clan::refresh_membership_count(db, clan.id)
        .await
        .expect("Failed to refresh seeded clan count");
    Player::refresh_membership_count(db, player.id)
        .await
        .expect("Failed to refresh seeded player count");
    membership
}

pub async fn register_hook(db: &DatabaseConnection, game: &Game, event: HookEvent) -> Hook {
    Hook::create(
        db,
        game.public_id.clone(),
        event,
        "http://localhost:9999/events".to_string(),
    )
    .await
    .expect("Failed to register hook")
}

/// All outbox rows recorded for the game so far
pub async fn recorded_events(db: &DatabaseConnection, game: &Game) -> Vec<hook_events::Model> {
    hook_events::Model::all_by_game(db, &game.public_id)
        .await
        .expect("Failed to list outbox events")
}
