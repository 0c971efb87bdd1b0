//! Clan lifecycle operations.
//!
//! Creation, owner-only updates, owner departure with successor
//! election and the ownership transfer protocol. Everything that spans
//! multiple rows runs through the same retried transaction wrapper as
//! the membership transitions.

use crate::{
    database::entities::{
        memberships::NewMembership, Clan, Game, HookEvent, Membership, Metadata, Player,
    },
    services::{
        error::{ServiceError, ServiceResult},
        hooks::{self, EventPayload},
        membership::{
            check_clan_quota, levels::Ladder, require_clan, require_player, run_transaction,
        },
    },
};
use sea_orm::{DatabaseConnection, DatabaseTransaction};

/// Longest accepted clan name and public id
const MAX_FIELD_LENGTH: usize = 255;

/// Fields accepted when creating a clan
#[derive(Clone, Debug)]
pub struct CreateClanParams {
    pub public_id: String,
    pub name: String,
    pub owner_public_id: String,
    pub metadata: Metadata,
    pub allow_application: bool,
    pub auto_join: bool,
}

/// Fields accepted when updating a clan. The requestor must be the
/// current owner.
#[derive(Clone, Debug)]
pub struct UpdateClanParams {
    pub owner_public_id: String,
    pub name: String,
    pub metadata: Metadata,
    pub allow_application: bool,
    pub auto_join: bool,
}

/// Result of the owner leaving their clan
#[derive(Clone, Debug)]
pub struct LeaveOutcome {
    /// Public id of the elected successor, None when the clan dissolved
    pub new_owner_public_id: Option<String>,
}

fn check_field(value: &str, field: &str) -> ServiceResult<()> {
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("Clan {field} is required")));
    }
    if value.len() > MAX_FIELD_LENGTH {
        return Err(ServiceError::Validation(format!(
            "Clan {field} cannot exceed {MAX_FIELD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Creates a clan owned by the provided player, counting the new clan
/// against the owner's quota
pub async fn create_clan(
    db: &DatabaseConnection,
    game: &Game,
    params: &CreateClanParams,
) -> ServiceResult<Clan> {
    check_field(&params.public_id, "public id")?;
    check_field(&params.name, "name")?;

    run_transaction(db, |tx| async move {
        let result = create_in_tx(&tx, game, params).await;
        (tx, result)
    })
    .await
}

async fn create_in_tx(
    tx: &DatabaseTransaction,
    game: &Game,
    params: &CreateClanParams,
) -> ServiceResult<Clan> {
    let owner = require_player(tx, &game.public_id, &params.owner_public_id).await?;
    check_clan_quota(game, &owner)?;

    if Clan::by_public_id(tx, &game.public_id, &params.public_id)
        .await?
        .is_some()
    {
        return Err(ServiceError::Conflict(format!(
            "Clan with public id {} already exists for game {}",
            params.public_id, game.public_id
        )));
    }

    let clan = Clan::create(
        tx,
        game.public_id.clone(),
        params.public_id.clone(),
        params.name.clone(),
        owner.id,
        params.metadata.clone(),
        params.allow_application,
        params.auto_join,
    )
    .await?;
    Player::refresh_ownership_count(tx, owner.id).await?;

    hooks::dispatch(
        tx,
        HookEvent::ClanCreated,
        EventPayload::new(HookEvent::ClanCreated, &game.public_id, &clan.public_id)
            .player(&params.owner_public_id),
    )
    .await?;

    Ok(clan)
}

/// Updates clan fields. Requestors that don't own the clan get the
/// same not-found error as a missing clan so they cannot probe for
/// existence.
pub async fn update_clan(
    db: &DatabaseConnection,
    game: &Game,
    clan_public_id: &str,
    params: &UpdateClanParams,
) -> ServiceResult<Clan> {
    check_field(&params.name, "name")?;

    run_transaction(db, |tx| async move {
        let result = update_in_tx(&tx, game, clan_public_id, params).await;
        (tx, result)
    })
    .await
}

async fn update_in_tx(
    tx: &DatabaseTransaction,
    game: &Game,
    clan_public_id: &str,
    params: &UpdateClanParams,
) -> ServiceResult<Clan> {
    let owner = require_player(tx, &game.public_id, &params.owner_public_id).await?;
    let clan = Clan::by_public_id_and_owner(tx, &game.public_id, clan_public_id, owner.id)
        .await?
        .ok_or_else(|| ServiceError::ClanNotFound(clan_public_id.to_string()))?;

    let updated = clan
        .update(
            tx,
            params.name.clone(),
            params.metadata.clone(),
            params.allow_application,
            params.auto_join,
        )
        .await?;

    hooks::dispatch(
        tx,
        HookEvent::ClanUpdated,
        EventPayload::new(HookEvent::ClanUpdated, &game.public_id, clan_public_id)
            .player(&params.owner_public_id),
    )
    .await?;

    Ok(updated)
}

/// The owner leaves their clan. When other approved members remain the
/// longest-tenured one becomes the new owner, otherwise the clan is
/// destroyed.
pub async fn leave_clan(
    db: &DatabaseConnection,
    game: &Game,
    clan_public_id: &str,
) -> ServiceResult<LeaveOutcome> {
    run_transaction(db, |tx| async move {
        let result = leave_in_tx(&tx, game, clan_public_id).await;
        (tx, result)
    })
    .await
}

async fn leave_in_tx(
    tx: &DatabaseTransaction,
    game: &Game,
    clan_public_id: &str,
) -> ServiceResult<LeaveOutcome> {
    let clan = require_clan(tx, &game.public_id, clan_public_id).await?;
    let previous_owner_id = clan.owner_id;
    let previous_owner = Player::by_id(tx, previous_owner_id)
        .await?
        .ok_or_else(|| ServiceError::PlayerNotFound(previous_owner_id.to_string()))?;

    let members = Membership::approved_by_clan(tx, clan.id).await?;
    match members.into_iter().next() {
        None => {
            clan.destroy(tx).await?;
            Player::refresh_ownership_count(tx, previous_owner_id).await?;

            hooks::dispatch(
                tx,
                HookEvent::ClanDeleted,
                EventPayload::new(HookEvent::ClanDeleted, &game.public_id, clan_public_id)
                    .player(&previous_owner.public_id),
            )
            .await?;

            Ok(LeaveOutcome {
                new_owner_public_id: None,
            })
        }
        Some(successor) => {
            let new_owner_id = successor.player_id;
            let new_owner = Player::by_id(tx, new_owner_id)
                .await?
                .ok_or_else(|| ServiceError::PlayerNotFound(new_owner_id.to_string()))?;

            successor.mark_deleted(tx, new_owner_id).await?;
            let clan = clan.set_owner(tx, new_owner_id).await?;

            Clan::refresh_membership_count(tx, clan.id).await?;
            Player::refresh_ownership_count(tx, previous_owner_id).await?;
            Player::refresh_ownership_count(tx, new_owner_id).await?;
            Player::refresh_membership_count(tx, new_owner_id).await?;

            hooks::dispatch(
                tx,
                HookEvent::ClanUpdated,
                EventPayload::new(HookEvent::ClanUpdated, &game.public_id, clan_public_id)
                    .player(&new_owner.public_id)
                    .requestor(&previous_owner.public_id),
            )
            .await?;

            Ok(LeaveOutcome {
                new_owner_public_id: Some(new_owner.public_id),
            })
        }
    }
}

/// Transfers ownership to an approved member.
///
/// The new owner's membership row is closed (they are represented by
/// `Clan.owner_id` from now on) and a fresh approved row is synthesized
/// for the former owner at the rank directly below ownership, carrying
/// the clan's creation time so tenure ordering still elects them first.
pub async fn transfer_clan_ownership(
    db: &DatabaseConnection,
    game: &Game,
    clan_public_id: &str,
    new_owner_public_id: &str,
) -> ServiceResult<Clan> {
    run_transaction(db, |tx| async move {
        let result = transfer_in_tx(&tx, game, clan_public_id, new_owner_public_id).await;
        (tx, result)
    })
    .await
}

async fn transfer_in_tx(
    tx: &DatabaseTransaction,
    game: &Game,
    clan_public_id: &str,
    new_owner_public_id: &str,
) -> ServiceResult<Clan> {
    let ladder = Ladder::from_game(game);
    let clan = require_clan(tx, &game.public_id, clan_public_id).await?;

    let previous_owner = Player::by_id(tx, clan.owner_id)
        .await?
        .ok_or_else(|| ServiceError::PlayerNotFound(clan.owner_id.to_string()))?;

    let membership = match Player::by_public_id(tx, &game.public_id, new_owner_public_id).await? {
        Some(player) => Membership::approved_for_pair(tx, clan.id, player.id).await?,
        None => None,
    }
    .ok_or_else(|| ServiceError::MembershipNotFound(new_owner_public_id.to_string()))?;

    let level = ladder
        .transfer_level()
        .ok_or_else(|| {
            ServiceError::Validation(format!(
                "Game {} has no membership levels",
                game.public_id
            ))
        })?
        .to_string();

    let new_owner_id = membership.player_id;
    membership.mark_deleted(tx, new_owner_id).await?;

    Membership::create(
        tx,
        NewMembership {
            game_id: game.public_id.clone(),
            clan_id: clan.id,
            player_id: previous_owner.id,
            requestor_id: previous_owner.id,
            level,
            message: String::new(),
            approved: true,
            created_at: Some(clan.created_at),
        },
    )
    .await?;

    let clan = clan.set_owner(tx, new_owner_id).await?;

    Clan::refresh_membership_count(tx, clan.id).await?;
    Player::refresh_ownership_count(tx, previous_owner.id).await?;
    Player::refresh_membership_count(tx, previous_owner.id).await?;
    Player::refresh_ownership_count(tx, new_owner_id).await?;
    Player::refresh_membership_count(tx, new_owner_id).await?;

    hooks::dispatch(
        tx,
        HookEvent::ClanUpdated,
        EventPayload::new(HookEvent::ClanUpdated, &game.public_id, clan_public_id)
            .player(new_owner_public_id)
            .requestor(&previous_owner.public_id),
    )
    .await?;

    Ok(clan)
}

/// Administrative repair of a clan's stored membership count.
///
/// The state machine recomputes counts from the membership table on
/// every transition; this exists for operators fixing a drifted row by
/// hand and is never called from a transition.
pub async fn increment_clan_membership_count(
    db: &DatabaseConnection,
    game_id: &str,
    clan_public_id: &str,
    delta: i32,
) -> ServiceResult<()> {
    let clan = Clan::by_public_id(db, game_id, clan_public_id)
        .await?
        .ok_or_else(|| ServiceError::ClanNotFound(clan_public_id.to_string()))?;
    Clan::increment_membership_count(db, clan.id, delta).await?;
    Ok(())
}

/// Case- and accent-insensitive prefix search over clan names
pub async fn search_clan(
    db: &DatabaseConnection,
    game_id: &str,
    term: &str,
) -> ServiceResult<Vec<Clan>> {
    if term.trim().is_empty() {
        return Err(ServiceError::Validation(
            "A search term was not provided to find a clan.".to_string(),
        ));
    }
    Ok(Clan::search(db, game_id, term).await?)
}

/// Loads the requested clans, also reporting which public ids were not
/// found so callers can surface the partial miss
pub async fn get_clans_by_public_ids(
    db: &DatabaseConnection,
    game_id: &str,
    public_ids: &[String],
) -> ServiceResult<(Vec<Clan>, Vec<String>)> {
    let found = Clan::by_public_ids(db, game_id, public_ids).await?;
    let missing = public_ids
        .iter()
        .filter(|requested| !found.iter().any(|clan| &clan.public_id == *requested))
        .cloned()
        .collect();
    Ok((found, missing))
}

/// The stable message reported when a clans lookup could not resolve
/// every requested public id
pub fn missing_clans_reason(game_id: &str, missing: &[String]) -> String {
    format!(
        "Could not find all requested clans or the given game. GameId: {}, Missing clans: {}",
        game_id,
        missing.join(", ")
    )
}
