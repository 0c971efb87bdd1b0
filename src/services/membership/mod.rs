//! The membership state machine.
//!
//! Every operation here moves a (player, clan) pair between the states
//! pending-application, pending-invite, approved, denied, banned and
//! deleted, or moves an approved member along the game's level ladder.
//! Each transition runs inside one database transaction: the clan row
//! is locked first, then any membership rows that will change, derived
//! counts are recomputed from the tables before commit and hook events
//! are enqueued on the same transaction. Transactions that hit database
//! contention are retried a bounded number of times with exponential
//! backoff.

use crate::{
    database::entities::{memberships::NewMembership, Clan, Game, HookEvent, Membership, Player},
    services::{
        error::{ServiceError, ServiceResult},
        hooks::{self, EventPayload},
    },
    utils::{clock::now_milli, types::PlayerID},
};
use log::debug;
use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use std::{future::Future, time::Duration};

pub mod levels;

use levels::{Authority, Ladder};

/// Transaction attempts before surfacing a transient failure
const MAX_TRANSACTION_ATTEMPTS: u32 = 3;
/// Backoff before the first retry, doubled each attempt
const INITIAL_BACKOFF: Duration = Duration::from_millis(20);

/// Outcome choice when acting on a pending membership
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny,
}

impl Decision {
    /// Parses the action path segment of approve/deny routes
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "approve" => Some(Self::Approve),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
        }
    }
}

/// Direction of a roster level change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LadderMove {
    Promote,
    Demote,
}

impl LadderMove {
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "promote" => Some(Self::Promote),
            "demote" => Some(Self::Demote),
            _ => None,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::Demote => "demote",
        }
    }
}

/// How a player stands towards a clan. Ownership is not represented by
/// a membership row, so the two shapes are distinct variants rather
/// than a sentinel level.
pub enum ClanRelation {
    Owner,
    Member(Membership),
}

impl ClanRelation {
    /// Resolves the relation of the player towards the clan, None when
    /// the player neither owns the clan nor holds an approved
    /// membership in it
    pub async fn resolve<C: ConnectionTrait>(
        db: &C,
        clan: &Clan,
        player_id: PlayerID,
    ) -> Result<Option<Self>, DbErr> {
        if clan.owner_id == player_id {
            return Ok(Some(Self::Owner));
        }
        Ok(Membership::approved_for_pair(db, clan.id, player_id)
            .await?
            .map(Self::Member))
    }

    /// The effective authority of this relation on the provided ladder
    pub fn authority(&self, ladder: &Ladder) -> Authority {
        match self {
            Self::Owner => Authority::Owner,
            Self::Member(membership) => {
                Authority::Ranked(ladder.rank_of(&membership.level).unwrap_or(i32::MIN))
            }
        }
    }
}

/// Runs the operation inside a transaction, retrying on database
/// contention with exponential backoff. Domain errors abort without
/// retry.
///
/// The factory receives the transaction by value and hands it back
/// next to the result so commit/rollback stay in one place here.
pub(crate) async fn run_transaction<T, F, Fut>(
    db: &DatabaseConnection,
    operation: F,
) -> ServiceResult<T>
where
    F: Fn(DatabaseTransaction) -> Fut,
    Fut: Future<Output = (DatabaseTransaction, ServiceResult<T>)>,
{
    let mut backoff = INITIAL_BACKOFF;
    for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
        let tx = db.begin().await?;
        let (tx, result) = operation(tx).await;
        let error = match result {
            Ok(value) => match tx.commit().await {
                Ok(()) => return Ok(value),
                Err(err) => ServiceError::Database(err),
            },
            Err(err) => {
                let _ = tx.rollback().await;
                err
            }
        };

        match error {
            ServiceError::Database(err) if is_contention(&err) => {
                if attempt == MAX_TRANSACTION_ATTEMPTS {
                    return Err(ServiceError::Transient);
                }
                debug!("Retrying transaction after contention (attempt {attempt}): {err}");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            other => return Err(other),
        }
    }
    Err(ServiceError::Transient)
}

/// Whether the database error is a recoverable lock/serialization
/// conflict worth retrying
fn is_contention(err: &DbErr) -> bool {
    let text = err.to_string();
    text.contains("database is locked")
        || text.contains("deadlock")
        || text.contains("could not serialize")
        || text.contains("serialization failure")
}

/// Locks and returns the clan, erroring with the public id the caller
/// used. Always the first lock taken by a transition.
pub(crate) async fn require_clan(
    tx: &DatabaseTransaction,
    game_id: &str,
    clan_public_id: &str,
) -> ServiceResult<Clan> {
    Clan::lock_by_public_id(tx, game_id, clan_public_id)
        .await?
        .ok_or_else(|| ServiceError::ClanNotFound(clan_public_id.to_string()))
}

pub(crate) async fn require_player(
    tx: &DatabaseTransaction,
    game_id: &str,
    public_id: &str,
) -> ServiceResult<Player> {
    Player::by_public_id(tx, game_id, public_id)
        .await?
        .ok_or_else(|| ServiceError::PlayerNotFound(public_id.to_string()))
}

/// Verifies the player can enter one more approved/owned relation
pub(crate) fn check_clan_quota(game: &Game, player: &Player) -> ServiceResult<()> {
    if player.membership_count + player.ownership_count >= game.max_clans_per_player {
        return Err(ServiceError::Conflict(format!(
            "Player {} reached max clans",
            player.public_id
        )));
    }
    Ok(())
}

fn forbidden(requestor: &str, action: &str, player: &str, clan: &str) -> ServiceError {
    ServiceError::Forbidden(format!(
        "Player {requestor} cannot {action} membership for player {player} and clan {clan}"
    ))
}

/// Validates the level against the ladder and the application bound
fn require_level_rank(game: &Game, ladder: &Ladder, level: &str) -> ServiceResult<i32> {
    ladder
        .rank_of(level)
        .filter(|rank| *rank <= game.max_membership_level && *rank >= game.min_membership_level)
        .ok_or_else(|| {
            ServiceError::Validation(format!(
                "Level {level} is invalid for game {}",
                game.public_id
            ))
        })
}

/// Rejects re-creation while the previous row for the pair is still
/// live, the player is banned, or a cooldown is running
fn check_previous_membership(
    game: &Game,
    previous: &Membership,
    player_public_id: &str,
    clan_public_id: &str,
    enforce_cooldown: bool,
) -> ServiceResult<()> {
    if previous.deleted_at == 0 {
        return Err(ServiceError::Conflict(if previous.approved {
            format!(
                "Membership for player {player_public_id} and clan {clan_public_id} already exists"
            )
        } else {
            format!(
                "Membership for player {player_public_id} and clan {clan_public_id} is still pending"
            )
        }));
    }

    if previous.banned {
        return Err(ServiceError::Forbidden(format!(
            "Player {player_public_id} is banned from clan {clan_public_id}"
        )));
    }

    if enforce_cooldown {
        let cooldown_end = if previous.denied {
            previous.denied_at + game.cooldown_after_deny
        } else {
            previous.deleted_at + game.cooldown_after_delete
        };
        if now_milli() < cooldown_end {
            return Err(ServiceError::Conflict(format!(
                "Player {player_public_id} must wait before creating a membership in clan {clan_public_id}"
            )));
        }
    }

    Ok(())
}

/// Creates a membership in state pending-application, or approved when
/// the clan auto-joins or the game auto-approves applications.
pub async fn apply_for_membership(
    db: &DatabaseConnection,
    game: &Game,
    clan_public_id: &str,
    level: &str,
    player_public_id: &str,
    message: &str,
) -> ServiceResult<Membership> {
    run_transaction(db, |tx| async move {
        let result = apply_in_tx(&tx, game, clan_public_id, level, player_public_id, message).await;
        (tx, result)
    })
    .await
}

async fn apply_in_tx(
    tx: &DatabaseTransaction,
    game: &Game,
    clan_public_id: &str,
    level: &str,
    player_public_id: &str,
    message: &str,
) -> ServiceResult<Membership> {
    let ladder = Ladder::from_game(game);
    let clan = require_clan(tx, &game.public_id, clan_public_id).await?;
    if !clan.allow_application {
        return Err(ServiceError::Forbidden(format!(
            "Clan {clan_public_id} does not accept applications"
        )));
    }
    require_level_rank(game, &ladder, level)?;

    let player = require_player(tx, &game.public_id, player_public_id).await?;
    if clan.owner_id == player.id {
        return Err(ServiceError::Conflict(format!(
            "Membership for player {player_public_id} and clan {clan_public_id} already exists"
        )));
    }

    if let Some(previous) = Membership::latest_for_pair(tx, clan.id, player.id).await? {
        check_previous_membership(game, &previous, player_public_id, clan_public_id, true)?;
    }
    check_clan_quota(game, &player)?;

    let approved = clan.auto_join || game.auto_approve_applications;
    let membership = Membership::create(
        tx,
        NewMembership {
            game_id: game.public_id.clone(),
            clan_id: clan.id,
            player_id: player.id,
            requestor_id: player.id,
            level: level.to_string(),
            message: message.to_string(),
            approved,
            created_at: None,
        },
    )
    .await?;

    if approved {
        Clan::refresh_membership_count(tx, clan.id).await?;
        Player::refresh_membership_count(tx, player.id).await?;
    }

    hooks::dispatch(
        tx,
        HookEvent::MembershipApplicationCreated,
        EventPayload::new(
            HookEvent::MembershipApplicationCreated,
            &game.public_id,
            clan_public_id,
        )
        .player(player_public_id)
        .requestor(player_public_id)
        .level(level)
        .message(message),
    )
    .await?;

    Ok(membership)
}

/// Creates a membership in state pending-invite, or approved when the
/// game auto-approves invitations. The inviter must be the owner or an
/// approved member holding at least the granted rank.
#[allow(clippy::too_many_arguments)]
pub async fn invite_for_membership(
    db: &DatabaseConnection,
    game: &Game,
    clan_public_id: &str,
    level: &str,
    player_public_id: &str,
    requestor_public_id: &str,
    message: &str,
) -> ServiceResult<Membership> {
    run_transaction(db, |tx| async move {
        let result = invite_in_tx(
            &tx,
            game,
            clan_public_id,
            level,
            player_public_id,
            requestor_public_id,
            message,
        )
        .await;
        (tx, result)
    })
    .await
}

async fn invite_in_tx(
    tx: &DatabaseTransaction,
    game: &Game,
    clan_public_id: &str,
    level: &str,
    player_public_id: &str,
    requestor_public_id: &str,
    message: &str,
) -> ServiceResult<Membership> {
    let ladder = Ladder::from_game(game);
    let clan = require_clan(tx, &game.public_id, clan_public_id).await?;
    let rank = require_level_rank(game, &ladder, level)?;

    let player = require_player(tx, &game.public_id, player_public_id).await?;
    let requestor = require_player(tx, &game.public_id, requestor_public_id).await?;

    if player.id == requestor.id {
        return Err(forbidden(
            requestor_public_id,
            "invite",
            player_public_id,
            clan_public_id,
        ));
    }
    if clan.owner_id == player.id {
        return Err(ServiceError::Conflict(format!(
            "Membership for player {player_public_id} and clan {clan_public_id} already exists"
        )));
    }

    let relation = ClanRelation::resolve(tx, &clan, requestor.id)
        .await?
        .ok_or_else(|| {
            forbidden(
                requestor_public_id,
                "invite",
                player_public_id,
                clan_public_id,
            )
        })?;
    if !relation.authority(&ladder).at_least(rank) {
        return Err(forbidden(
            requestor_public_id,
            "invite",
            player_public_id,
            clan_public_id,
        ));
    }

    if let Some(previous) = Membership::latest_for_pair(tx, clan.id, player.id).await? {
        check_previous_membership(game, &previous, player_public_id, clan_public_id, false)?;
    }
    check_clan_quota(game, &player)?;

    if game.max_pending_invites >= 0 {
        let pending = Membership::pending_invite_count(tx, &game.public_id, player.id).await?;
        if pending as i32 >= game.max_pending_invites {
            return Err(ServiceError::Conflict(format!(
                "Player {player_public_id} reached max pending invites"
            )));
        }
    }

    let approved = game.auto_approve_invites;
    let membership = Membership::create(
        tx,
        NewMembership {
            game_id: game.public_id.clone(),
            clan_id: clan.id,
            player_id: player.id,
            requestor_id: requestor.id,
            level: level.to_string(),
            message: message.to_string(),
            approved,
            created_at: None,
        },
    )
    .await?;

    if approved {
        Clan::refresh_membership_count(tx, clan.id).await?;
        Player::refresh_membership_count(tx, player.id).await?;
    }

    hooks::dispatch(
        tx,
        HookEvent::MembershipApplicationCreated,
        EventPayload::new(
            HookEvent::MembershipApplicationCreated,
            &game.public_id,
            clan_public_id,
        )
        .player(player_public_id)
        .requestor(requestor_public_id)
        .level(level)
        .message(message),
    )
    .await?;

    Ok(membership)
}

/// Approves or denies a pending application. The actor must be the
/// owner or an approved member outranking the applied-for level.
pub async fn approve_or_deny_application(
    db: &DatabaseConnection,
    game: &Game,
    clan_public_id: &str,
    player_public_id: &str,
    requestor_public_id: &str,
    decision: Decision,
) -> ServiceResult<Membership> {
    run_transaction(db, |tx| async move {
        let result = application_decision_in_tx(
            &tx,
            game,
            clan_public_id,
            player_public_id,
            requestor_public_id,
            decision,
        )
        .await;
        (tx, result)
    })
    .await
}

async fn application_decision_in_tx(
    tx: &DatabaseTransaction,
    game: &Game,
    clan_public_id: &str,
    player_public_id: &str,
    requestor_public_id: &str,
    decision: Decision,
) -> ServiceResult<Membership> {
    let ladder = Ladder::from_game(game);
    let clan = require_clan(tx, &game.public_id, clan_public_id).await?;
    let player = require_player(tx, &game.public_id, player_public_id).await?;
    let requestor = require_player(tx, &game.public_id, requestor_public_id).await?;

    let membership = Membership::lock_live(tx, clan.id, player.id)
        .await?
        .filter(|membership| membership.is_pending() && !membership.is_invite())
        .ok_or_else(|| ServiceError::MembershipNotFound(player_public_id.to_string()))?;

    let target_rank = ladder
        .rank_of(&membership.level)
        .unwrap_or(game.max_membership_level);
    let relation = ClanRelation::resolve(tx, &clan, requestor.id)
        .await?
        .ok_or_else(|| {
            forbidden(
                requestor_public_id,
                decision.verb(),
                player_public_id,
                clan_public_id,
            )
        })?;
    if !relation.authority(&ladder).outranks(target_rank) {
        return Err(forbidden(
            requestor_public_id,
            decision.verb(),
            player_public_id,
            clan_public_id,
        ));
    }

    let level = membership.level.clone();
    let message = membership.message.clone();

    match decision {
        Decision::Approve => {
            check_clan_quota(game, &player)?;
            let updated = membership.approve(tx, requestor.id).await?;
            Clan::refresh_membership_count(tx, clan.id).await?;
            Player::refresh_membership_count(tx, player.id).await?;

            hooks::dispatch(
                tx,
                HookEvent::MembershipApproved,
                EventPayload::new(
                    HookEvent::MembershipApproved,
                    &game.public_id,
                    clan_public_id,
                )
                .player(player_public_id)
                .requestor(requestor_public_id)
                .level(&level)
                .message(&message),
            )
            .await?;
            hooks::dispatch(
                tx,
                HookEvent::ClanMemberAdded,
                EventPayload::new(HookEvent::ClanMemberAdded, &game.public_id, clan_public_id)
                    .player(player_public_id)
                    .level(&level),
            )
            .await?;
            Ok(updated)
        }
        Decision::Deny => {
            let updated = membership.deny(tx, requestor.id).await?;
            hooks::dispatch(
                tx,
                HookEvent::MembershipDenied,
                EventPayload::new(HookEvent::MembershipDenied, &game.public_id, clan_public_id)
                    .player(player_public_id)
                    .requestor(requestor_public_id)
                    .level(&level)
                    .message(&message),
            )
            .await?;
            Ok(updated)
        }
    }
}

/// Accepts or refuses a pending invitation. Only the invited player
/// may act.
pub async fn approve_or_deny_invitation(
    db: &DatabaseConnection,
    game: &Game,
    clan_public_id: &str,
    player_public_id: &str,
    decision: Decision,
) -> ServiceResult<Membership> {
    run_transaction(db, |tx| async move {
        let result =
            invitation_decision_in_tx(&tx, game, clan_public_id, player_public_id, decision).await;
        (tx, result)
    })
    .await
}

async fn invitation_decision_in_tx(
    tx: &DatabaseTransaction,
    game: &Game,
    clan_public_id: &str,
    player_public_id: &str,
    decision: Decision,
) -> ServiceResult<Membership> {
    let clan = require_clan(tx, &game.public_id, clan_public_id).await?;
    let player = require_player(tx, &game.public_id, player_public_id).await?;

    let membership = Membership::lock_live(tx, clan.id, player.id)
        .await?
        .filter(|membership| membership.is_pending() && membership.is_invite())
        .ok_or_else(|| ServiceError::MembershipNotFound(player_public_id.to_string()))?;

    let level = membership.level.clone();
    let message = membership.message.clone();

    match decision {
        Decision::Approve => {
            check_clan_quota(game, &player)?;
            let updated = membership.approve(tx, player.id).await?;
            Clan::refresh_membership_count(tx, clan.id).await?;
            Player::refresh_membership_count(tx, player.id).await?;

            hooks::dispatch(
                tx,
                HookEvent::MembershipApproved,
                EventPayload::new(
                    HookEvent::MembershipApproved,
                    &game.public_id,
                    clan_public_id,
                )
                .player(player_public_id)
                .requestor(player_public_id)
                .level(&level)
                .message(&message),
            )
            .await?;
            hooks::dispatch(
                tx,
                HookEvent::ClanMemberAdded,
                EventPayload::new(HookEvent::ClanMemberAdded, &game.public_id, clan_public_id)
                    .player(player_public_id)
                    .level(&level),
            )
            .await?;
            Ok(updated)
        }
        Decision::Deny => {
            let updated = membership.deny(tx, player.id).await?;
            hooks::dispatch(
                tx,
                HookEvent::MembershipDenied,
                EventPayload::new(HookEvent::MembershipDenied, &game.public_id, clan_public_id)
                    .player(player_public_id)
                    .requestor(player_public_id)
                    .level(&level)
                    .message(&message),
            )
            .await?;
            Ok(updated)
        }
    }
}

/// Deletes a live membership. Members may always remove themselves;
/// removing someone else requires strictly greater rank and records a
/// ban on the row.
pub async fn delete_membership(
    db: &DatabaseConnection,
    game: &Game,
    clan_public_id: &str,
    player_public_id: &str,
    requestor_public_id: &str,
) -> ServiceResult<Membership> {
    run_transaction(db, |tx| async move {
        let result = delete_in_tx(
            &tx,
            game,
            clan_public_id,
            player_public_id,
            requestor_public_id,
        )
        .await;
        (tx, result)
    })
    .await
}

async fn delete_in_tx(
    tx: &DatabaseTransaction,
    game: &Game,
    clan_public_id: &str,
    player_public_id: &str,
    requestor_public_id: &str,
) -> ServiceResult<Membership> {
    let ladder = Ladder::from_game(game);
    let clan = require_clan(tx, &game.public_id, clan_public_id).await?;
    let player = require_player(tx, &game.public_id, player_public_id).await?;

    let membership = Membership::lock_live(tx, clan.id, player.id)
        .await?
        .ok_or_else(|| ServiceError::MembershipNotFound(player_public_id.to_string()))?;

    let deleted_by = if requestor_public_id == player_public_id {
        player.id
    } else {
        let requestor = require_player(tx, &game.public_id, requestor_public_id).await?;
        let target_rank = ladder
            .rank_of(&membership.level)
            .unwrap_or(game.max_membership_level);
        let relation = ClanRelation::resolve(tx, &clan, requestor.id)
            .await?
            .ok_or_else(|| {
                forbidden(
                    requestor_public_id,
                    "delete",
                    player_public_id,
                    clan_public_id,
                )
            })?;
        if !relation.authority(&ladder).outranks(target_rank) {
            return Err(forbidden(
                requestor_public_id,
                "delete",
                player_public_id,
                clan_public_id,
            ));
        }
        requestor.id
    };

    let was_approved = membership.approved;
    let level = membership.level.clone();
    let updated = membership.mark_deleted(tx, deleted_by).await?;

    Clan::refresh_membership_count(tx, clan.id).await?;
    if was_approved {
        Player::refresh_membership_count(tx, player.id).await?;
    }

    if was_approved {
        hooks::dispatch(
            tx,
            HookEvent::MembershipLeft,
            EventPayload::new(HookEvent::MembershipLeft, &game.public_id, clan_public_id)
                .player(player_public_id)
                .requestor(requestor_public_id)
                .level(&level),
        )
        .await?;
        hooks::dispatch(
            tx,
            HookEvent::ClanMemberRemoved,
            EventPayload::new(
                HookEvent::ClanMemberRemoved,
                &game.public_id,
                clan_public_id,
            )
            .player(player_public_id),
        )
        .await?;
    } else {
        hooks::dispatch(
            tx,
            HookEvent::MembershipApplicationDeleted,
            EventPayload::new(
                HookEvent::MembershipApplicationDeleted,
                &game.public_id,
                clan_public_id,
            )
            .player(player_public_id)
            .requestor(requestor_public_id)
            .level(&level),
        )
        .await?;
    }

    Ok(updated)
}

/// Moves an approved member exactly one step along the ladder. The
/// actor must outrank the member's current level and hold at least the
/// level the member is moving to.
pub async fn promote_or_demote_member(
    db: &DatabaseConnection,
    game: &Game,
    clan_public_id: &str,
    player_public_id: &str,
    requestor_public_id: &str,
    ladder_move: LadderMove,
) -> ServiceResult<Membership> {
    run_transaction(db, |tx| async move {
        let result = ladder_move_in_tx(
            &tx,
            game,
            clan_public_id,
            player_public_id,
            requestor_public_id,
            ladder_move,
        )
        .await;
        (tx, result)
    })
    .await
}

async fn ladder_move_in_tx(
    tx: &DatabaseTransaction,
    game: &Game,
    clan_public_id: &str,
    player_public_id: &str,
    requestor_public_id: &str,
    ladder_move: LadderMove,
) -> ServiceResult<Membership> {
    let ladder = Ladder::from_game(game);
    let clan = require_clan(tx, &game.public_id, clan_public_id).await?;
    let player = require_player(tx, &game.public_id, player_public_id).await?;
    let requestor = require_player(tx, &game.public_id, requestor_public_id).await?;

    if player.id == requestor.id {
        return Err(forbidden(
            requestor_public_id,
            ladder_move.verb(),
            player_public_id,
            clan_public_id,
        ));
    }

    let membership = Membership::lock_live(tx, clan.id, player.id)
        .await?
        .filter(|membership| membership.approved)
        .ok_or_else(|| ServiceError::MembershipNotFound(player_public_id.to_string()))?;

    let current_rank = ladder.rank_of(&membership.level).ok_or_else(|| {
        ServiceError::Validation(format!(
            "Level {} is invalid for game {}",
            membership.level, game.public_id
        ))
    })?;

    let step = match ladder_move {
        LadderMove::Promote => ladder.level_above(current_rank),
        LadderMove::Demote => ladder.level_below(current_rank),
    };
    let (new_level, new_rank) = step
        .filter(|(_, rank)| {
            *rank <= game.max_membership_level && *rank >= game.min_membership_level
        })
        .ok_or_else(|| {
            ServiceError::Conflict(match ladder_move {
                LadderMove::Promote => format!(
                    "Player {player_public_id} is already at the highest level in clan {clan_public_id}"
                ),
                LadderMove::Demote => format!(
                    "Player {player_public_id} is already at the lowest level in clan {clan_public_id}"
                ),
            })
        })?;

    let relation = ClanRelation::resolve(tx, &clan, requestor.id)
        .await?
        .ok_or_else(|| {
            forbidden(
                requestor_public_id,
                ladder_move.verb(),
                player_public_id,
                clan_public_id,
            )
        })?;
    let authority = relation.authority(&ladder);
    if !authority.outranks(current_rank) || !authority.at_least(new_rank) {
        return Err(forbidden(
            requestor_public_id,
            ladder_move.verb(),
            player_public_id,
            clan_public_id,
        ));
    }

    let new_level = new_level.to_string();
    let updated = membership.set_level(tx, new_level.clone()).await?;

    let event = match ladder_move {
        LadderMove::Promote => HookEvent::MembershipPromoted,
        LadderMove::Demote => HookEvent::MembershipDemoted,
    };
    hooks::dispatch(
        tx,
        event,
        EventPayload::new(event, &game.public_id, clan_public_id)
            .player(player_public_id)
            .requestor(requestor_public_id)
            .level(&new_level),
    )
    .await?;

    Ok(updated)
}

#[cfg(test)]
mod test {
    use super::{
        apply_for_membership, approve_or_deny_application, approve_or_deny_invitation,
        delete_membership, invite_for_membership, promote_or_demote_member, Decision, LadderMove,
    };
    use crate::database::connect_test;
    use crate::database::entities::{Clan, HookEvent, Membership, Player};
    use crate::services::error::ServiceError;
    use crate::services::test_utils::{
        recorded_events, register_hook, seed_clan, seed_game, seed_game_with, seed_member,
        seed_player,
    };
    use crate::utils::codec::NameCodec;

    #[tokio::test]
    async fn test_apply_with_auto_join() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let player = seed_player(&db, &codec, &game, "player").await;
        let clan = seed_clan(&db, &game, &owner, "clan", true, true).await;
        register_hook(&db, &game, HookEvent::MembershipApplicationCreated).await;

        let membership =
            apply_for_membership(&db, &game, "clan", "Member", "player", "let me in")
                .await
                .unwrap();
        assert!(membership.approved);
        assert_eq!(membership.requestor_id, player.id);

        let clan = Clan::by_id(&db, clan.id).await.unwrap().unwrap();
        assert_eq!(clan.membership_count, 2);
        let player = Player::by_id(&db, player.id).await.unwrap().unwrap();
        assert_eq!(player.membership_count, 1);

        let events = recorded_events(&db, &game).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, HookEvent::MembershipApplicationCreated);
        assert_eq!(
            events[0].payload.0["eventType"],
            "MembershipApplicationCreated"
        );
        assert_eq!(events[0].payload.0["playerID"], "player");
    }

    #[tokio::test]
    async fn test_apply_requires_allow_application() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        seed_player(&db, &codec, &game, "player").await;
        seed_clan(&db, &game, &owner, "clan", false, false).await;

        let err = apply_for_membership(&db, &game, "clan", "Member", "player", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_apply_invalid_level() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        seed_player(&db, &codec, &game, "player").await;
        seed_clan(&db, &game, &owner, "clan", true, false).await;

        let err = apply_for_membership(&db, &game, "clan", "Warlord", "player", "")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Level Warlord is invalid for game game");
    }

    #[tokio::test]
    async fn test_apply_then_approve() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let player = seed_player(&db, &codec, &game, "player").await;
        let clan = seed_clan(&db, &game, &owner, "clan", true, false).await;
        register_hook(&db, &game, HookEvent::MembershipApproved).await;
        register_hook(&db, &game, HookEvent::ClanMemberAdded).await;

        let membership = apply_for_membership(&db, &game, "clan", "Member", "player", "")
            .await
            .unwrap();
        assert!(!membership.approved);

        // Counts unchanged while the application is pending
        let clan_row = Clan::by_id(&db, clan.id).await.unwrap().unwrap();
        assert_eq!(clan_row.membership_count, 1);

        let approved =
            approve_or_deny_application(&db, &game, "clan", "player", "owner", Decision::Approve)
                .await
                .unwrap();
        assert!(approved.approved);
        assert_eq!(approved.approver_id, Some(owner.id));
        assert!(approved.approved_at > 0);

        let clan_row = Clan::by_id(&db, clan.id).await.unwrap().unwrap();
        assert_eq!(clan_row.membership_count, 2);
        let player_row = Player::by_id(&db, player.id).await.unwrap().unwrap();
        assert_eq!(player_row.membership_count, 1);

        let events = recorded_events(&db, &game).await;
        let types: Vec<_> = events.iter().map(|event| event.event_type).collect();
        assert_eq!(
            types,
            vec![HookEvent::MembershipApproved, HookEvent::ClanMemberAdded]
        );
    }

    #[tokio::test]
    async fn test_approval_requires_authority() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let member = seed_player(&db, &codec, &game, "member").await;
        seed_player(&db, &codec, &game, "applicant").await;
        let clan = seed_clan(&db, &game, &owner, "clan", true, false).await;
        seed_member(&db, &game, &clan, &member, "Member").await;

        apply_for_membership(&db, &game, "clan", "Member", "applicant", "")
            .await
            .unwrap();

        // A rank-0 member cannot act on a rank-0 application
        let err = approve_or_deny_application(
            &db,
            &game,
            "clan",
            "applicant",
            "member",
            Decision::Approve,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Player member cannot approve membership for player applicant and clan clan"
        );
    }

    #[tokio::test]
    async fn test_deny_then_reapply_within_cooldown() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        seed_player(&db, &codec, &game, "player").await;
        seed_clan(&db, &game, &owner, "clan", true, false).await;

        apply_for_membership(&db, &game, "clan", "Member", "player", "")
            .await
            .unwrap();
        let denied =
            approve_or_deny_application(&db, &game, "clan", "player", "owner", Decision::Deny)
                .await
                .unwrap();
        assert!(denied.denied);
        assert!(denied.deleted_at > 0);
        assert_eq!(denied.denier_id, Some(owner.id));

        let err = apply_for_membership(&db, &game, "clan", "Member", "player", "")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Player player must wait before creating a membership in clan clan"
        );
    }

    #[tokio::test]
    async fn test_reapply_after_self_leave() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        // No cooldown after a voluntary leave in this game
        let game = seed_game_with(&db, "game", |params| {
            params.cooldown_after_delete = 0;
        })
        .await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let player = seed_player(&db, &codec, &game, "player").await;
        let clan = seed_clan(&db, &game, &owner, "clan", true, true).await;

        apply_for_membership(&db, &game, "clan", "Member", "player", "")
            .await
            .unwrap();
        let deleted = delete_membership(&db, &game, "clan", "player", "player")
            .await
            .unwrap();
        assert!(!deleted.banned);
        assert_eq!(deleted.deleted_by, Some(player.id));

        // A fresh row is created, the old one stays as history
        let second = apply_for_membership(&db, &game, "clan", "Member", "player", "")
            .await
            .unwrap();
        assert_ne!(second.id, deleted.id);

        let live = Membership::lock_live(&db, clan.id, player.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.id, second.id);
    }

    #[tokio::test]
    async fn test_kick_records_ban() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let target = seed_player(&db, &codec, &game, "target").await;
        let peer = seed_player(&db, &codec, &game, "peer").await;
        let clan = seed_clan(&db, &game, &owner, "clan", true, false).await;
        seed_member(&db, &game, &clan, &target, "Member").await;
        seed_member(&db, &game, &clan, &peer, "Member").await;

        // Equal rank cannot remove
        let err = delete_membership(&db, &game, "clan", "target", "peer")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // The owner can, and the removal is recorded as a ban
        let deleted = delete_membership(&db, &game, "clan", "target", "owner")
            .await
            .unwrap();
        assert!(deleted.banned);
        assert_eq!(deleted.deleted_by, Some(owner.id));

        let clan_row = Clan::by_id(&db, clan.id).await.unwrap().unwrap();
        assert_eq!(clan_row.membership_count, 2);
        let target_row = Player::by_id(&db, target.id).await.unwrap().unwrap();
        assert_eq!(target_row.membership_count, 0);

        // Banned players cannot come back
        let err = apply_for_membership(&db, &game, "clan", "Member", "target", "")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Player target is banned from clan clan");
    }

    #[tokio::test]
    async fn test_promote_authority() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let member_a = seed_player(&db, &codec, &game, "a").await;
        let member_b = seed_player(&db, &codec, &game, "b").await;
        let clan = seed_clan(&db, &game, &owner, "clan", true, false).await;
        seed_member(&db, &game, &clan, &member_a, "Member").await;
        seed_member(&db, &game, &clan, &member_b, "Elder").await;

        // An Elder may lift a Member up to their own level
        let promoted = promote_or_demote_member(&db, &game, "clan", "a", "b", LadderMove::Promote)
            .await
            .unwrap();
        assert_eq!(promoted.level, "Elder");

        // But cannot push anyone above themselves
        let err = promote_or_demote_member(&db, &game, "clan", "b", "a", LadderMove::Promote)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Player a cannot promote membership for player b and clan clan"
        );

        // The owner can
        let promoted =
            promote_or_demote_member(&db, &game, "clan", "b", "owner", LadderMove::Promote)
                .await
                .unwrap();
        assert_eq!(promoted.level, "CoLeader");

        // And nothing exists above the top of the ladder
        let err = promote_or_demote_member(&db, &game, "clan", "b", "owner", LadderMove::Promote)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Player b is already at the highest level in clan clan"
        );
    }

    #[tokio::test]
    async fn test_demote() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let member = seed_player(&db, &codec, &game, "member").await;
        let clan = seed_clan(&db, &game, &owner, "clan", true, false).await;
        seed_member(&db, &game, &clan, &member, "Elder").await;

        let demoted =
            promote_or_demote_member(&db, &game, "clan", "member", "owner", LadderMove::Demote)
                .await
                .unwrap();
        assert_eq!(demoted.level, "Member");

        let err =
            promote_or_demote_member(&db, &game, "clan", "member", "owner", LadderMove::Demote)
                .await
                .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Player member is already at the lowest level in clan clan"
        );
    }

    #[tokio::test]
    async fn test_invite_flow() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let elder = seed_player(&db, &codec, &game, "elder").await;
        let invitee = seed_player(&db, &codec, &game, "invitee").await;
        let clan = seed_clan(&db, &game, &owner, "clan", false, false).await;
        seed_member(&db, &game, &clan, &elder, "Elder").await;

        // An Elder may invite at their own level but not above
        let invited =
            invite_for_membership(&db, &game, "clan", "Member", "invitee", "elder", "join us")
                .await
                .unwrap();
        assert!(!invited.approved);
        assert!(invited.is_invite());
        assert_eq!(invited.requestor_id, elder.id);

        // Only the invited player may decide; counts move on acceptance
        let accepted =
            approve_or_deny_invitation(&db, &game, "clan", "invitee", Decision::Approve)
                .await
                .unwrap();
        assert!(accepted.approved);
        assert_eq!(accepted.approver_id, Some(invitee.id));

        let clan_row = Clan::by_id(&db, clan.id).await.unwrap().unwrap();
        assert_eq!(clan_row.membership_count, 3);
    }

    #[tokio::test]
    async fn test_invite_requires_rank() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let member = seed_player(&db, &codec, &game, "member").await;
        seed_player(&db, &codec, &game, "invitee").await;
        let clan = seed_clan(&db, &game, &owner, "clan", false, false).await;
        seed_member(&db, &game, &clan, &member, "Member").await;

        // A rank-0 member cannot hand out an Elder invitation
        let err = invite_for_membership(&db, &game, "clan", "Elder", "invitee", "member", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // Outsiders cannot invite at all
        let err = invite_for_membership(&db, &game, "clan", "Member", "invitee", "invitee", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_max_clans_quota() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game_with(&db, "game", |params| {
            params.max_clans_per_player = 1;
        })
        .await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let player = seed_player(&db, &codec, &game, "player").await;
        seed_clan(&db, &game, &owner, "clan", true, true).await;
        // The player already owns a clan of their own
        seed_clan(&db, &game, &player, "players-clan", false, false).await;

        let err = apply_for_membership(&db, &game, "clan", "Member", "player", "")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Player player reached max clans");
    }

    #[tokio::test]
    async fn test_max_pending_invites() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game_with(&db, "game", |params| {
            params.max_pending_invites = 1;
        })
        .await;
        let owner_a = seed_player(&db, &codec, &game, "owner-a").await;
        let owner_b = seed_player(&db, &codec, &game, "owner-b").await;
        seed_player(&db, &codec, &game, "popular").await;
        seed_clan(&db, &game, &owner_a, "clan-a", false, false).await;
        seed_clan(&db, &game, &owner_b, "clan-b", false, false).await;

        invite_for_membership(&db, &game, "clan-a", "Member", "popular", "owner-a", "")
            .await
            .unwrap();
        let err = invite_for_membership(&db, &game, "clan-b", "Member", "popular", "owner-b", "")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Player popular reached max pending invites"
        );
    }

    #[tokio::test]
    async fn test_no_events_for_failed_operations() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        seed_clan(&db, &game, &owner, "clan", false, false).await;
        register_hook(&db, &game, HookEvent::MembershipApplicationCreated).await;

        // Application rejected before any row is written
        let _ = apply_for_membership(&db, &game, "clan", "Member", "owner", "").await;
        let _ = apply_for_membership(&db, &game, "missing-clan", "Member", "owner", "").await;

        assert!(recorded_events(&db, &game).await.is_empty());
    }

    #[tokio::test]
    async fn test_count_refresh_is_idempotent() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let player = seed_player(&db, &codec, &game, "player").await;
        let clan = seed_clan(&db, &game, &owner, "clan", true, true).await;

        apply_for_membership(&db, &game, "clan", "Member", "player", "")
            .await
            .unwrap();

        let first = Player::refresh_membership_count(&db, player.id).await.unwrap();
        let second = Player::refresh_membership_count(&db, player.id).await.unwrap();
        assert_eq!(first, second);

        let first = Clan::refresh_membership_count(&db, clan.id).await.unwrap();
        let second = Clan::refresh_membership_count(&db, clan.id).await.unwrap();
        assert_eq!(first, second);

        let first = Player::refresh_ownership_count(&db, owner.id).await.unwrap();
        let second = Player::refresh_ownership_count(&db, owner.id).await.unwrap();
        assert_eq!(first, second);
    }
}
