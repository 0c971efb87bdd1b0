//! Read-only aggregators.
//!
//! Shape the domain rows into the response dictionaries of the API:
//! clan details with the full roster and pending/banned/denied buckets,
//! the fixed six-key clan summary, and per-player details with
//! memberships and clans partitioned by state.

use crate::{
    database::entities::{Clan, Game, Membership, Metadata, Player},
    services::error::{ServiceError, ServiceResult},
    utils::{codec::NameCodec, types::PlayerID},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Minimal reference to a player inside nested structures
#[derive(Serialize, Clone, Debug)]
pub struct PlayerRef {
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub name: String,
}

/// Player block of a roster or bucket entry
#[derive(Serialize, Clone, Debug)]
pub struct MemberPlayer {
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub name: String,
    pub metadata: Metadata,
    pub approver: Option<PlayerRef>,
    pub denier: Option<PlayerRef>,
}

/// One entry of the roster or of a membership bucket. The level is
/// absent for banned and denied entries.
#[derive(Serialize, Clone, Debug)]
pub struct MemberEntry {
    pub level: Option<String>,
    pub player: MemberPlayer,
}

/// The non-roster membership buckets of a clan
#[derive(Serialize, Clone, Debug)]
pub struct MembershipBuckets {
    #[serde(rename = "pendingApplications")]
    pub pending_applications: Vec<MemberEntry>,
    #[serde(rename = "pendingInvites")]
    pub pending_invites: Vec<MemberEntry>,
    pub banned: Vec<MemberEntry>,
    pub denied: Vec<MemberEntry>,
}

#[derive(Serialize, Clone, Debug)]
pub struct ClanOwner {
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub name: String,
    pub metadata: Metadata,
}

/// Full clan details response
#[derive(Serialize, Clone, Debug)]
pub struct ClanDetails {
    pub name: String,
    pub metadata: Metadata,
    #[serde(rename = "membershipCount")]
    pub membership_count: i32,
    #[serde(rename = "allowApplication")]
    pub allow_application: bool,
    #[serde(rename = "autoJoin")]
    pub auto_join: bool,
    pub owner: ClanOwner,
    pub roster: Vec<MemberEntry>,
    pub memberships: MembershipBuckets,
}

/// The six-key clan summary
#[derive(Serialize, Clone, Debug)]
pub struct ClanSummary {
    #[serde(rename = "membershipCount")]
    pub membership_count: i32,
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub metadata: Metadata,
    pub name: String,
    #[serde(rename = "allowApplication")]
    pub allow_application: bool,
    #[serde(rename = "autoJoin")]
    pub auto_join: bool,
}

impl From<Clan> for ClanSummary {
    fn from(clan: Clan) -> Self {
        Self {
            membership_count: clan.membership_count,
            public_id: clan.public_id,
            metadata: clan.metadata,
            name: clan.name,
            allow_application: clan.allow_application,
            auto_join: clan.auto_join,
        }
    }
}

/// Minimal reference to a clan inside player details
#[derive(Serialize, Clone, Debug)]
pub struct ClanRef {
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub name: String,
    #[serde(rename = "membershipCount")]
    pub membership_count: i32,
    pub metadata: Metadata,
}

impl From<&Clan> for ClanRef {
    fn from(clan: &Clan) -> Self {
        Self {
            public_id: clan.public_id.clone(),
            name: clan.name.clone(),
            membership_count: clan.membership_count,
            metadata: clan.metadata.clone(),
        }
    }
}

/// One membership of the player details list
#[derive(Serialize, Clone, Debug)]
pub struct PlayerMembershipEntry {
    pub level: Option<String>,
    pub approved: bool,
    pub denied: bool,
    pub banned: bool,
    pub clan: ClanRef,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub requestor: Option<PlayerRef>,
    pub approver: Option<PlayerRef>,
    pub denier: Option<PlayerRef>,
}

/// Clans of a player partitioned by relation state
#[derive(Serialize, Clone, Debug)]
pub struct PlayerClans {
    pub owned: Vec<ClanRef>,
    pub approved: Vec<ClanRef>,
    pub denied: Vec<ClanRef>,
    pub banned: Vec<ClanRef>,
    #[serde(rename = "pendingApplications")]
    pub pending_applications: Vec<ClanRef>,
    #[serde(rename = "pendingInvites")]
    pub pending_invites: Vec<ClanRef>,
}

/// Full player details response
#[derive(Serialize, Clone, Debug)]
pub struct PlayerDetails {
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub name: String,
    pub metadata: Metadata,
    #[serde(rename = "ownershipCount")]
    pub ownership_count: i32,
    #[serde(rename = "membershipCount")]
    pub membership_count: i32,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
    pub memberships: Vec<PlayerMembershipEntry>,
    pub clans: PlayerClans,
}

struct PlayerDisplay {
    public_id: String,
    name: String,
    metadata: Metadata,
}

impl PlayerDisplay {
    fn player_ref(&self) -> PlayerRef {
        PlayerRef {
            public_id: self.public_id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Loads and decrypts every referenced player in one query
async fn load_displays(
    db: &DatabaseConnection,
    codec: &NameCodec,
    ids: HashSet<PlayerID>,
) -> ServiceResult<HashMap<PlayerID, PlayerDisplay>> {
    let players = Player::by_ids(db, ids.into_iter().collect()).await?;
    let mut displays = HashMap::with_capacity(players.len());
    for player in players {
        let name = player.decrypted_name(codec)?;
        displays.insert(
            player.id,
            PlayerDisplay {
                public_id: player.public_id,
                name,
                metadata: player.metadata,
            },
        );
    }
    Ok(displays)
}

fn member_entry(
    membership: &Membership,
    with_level: bool,
    displays: &HashMap<PlayerID, PlayerDisplay>,
) -> Option<MemberEntry> {
    let player = displays.get(&membership.player_id)?;
    let approver = membership
        .approver_id
        .and_then(|id| displays.get(&id))
        .map(PlayerDisplay::player_ref);
    let denier = membership
        .denier_id
        .and_then(|id| displays.get(&id))
        .map(PlayerDisplay::player_ref);

    Some(MemberEntry {
        level: with_level.then(|| membership.level.clone()),
        player: MemberPlayer {
            public_id: player.public_id.clone(),
            name: player.name.clone(),
            metadata: player.metadata.clone(),
            approver: membership.approved.then_some(approver).flatten(),
            denier: membership.denied.then_some(denier).flatten(),
        },
    })
}

/// Builds the clan details dictionary: owner, roster and the pending,
/// banned and denied buckets. The pending applications list is capped
/// at `max_pending_applications`, most recent first.
pub async fn get_clan_details(
    db: &DatabaseConnection,
    codec: &NameCodec,
    game: &Game,
    clan_public_id: &str,
    max_pending_applications: usize,
) -> ServiceResult<ClanDetails> {
    let clan = Clan::by_public_id(db, &game.public_id, clan_public_id)
        .await?
        .ok_or_else(|| ServiceError::ClanNotFound(clan_public_id.to_string()))?;

    let memberships = Membership::all_by_clan(db, clan.id).await?;

    let mut ids: HashSet<PlayerID> = HashSet::new();
    ids.insert(clan.owner_id);
    for membership in &memberships {
        ids.insert(membership.player_id);
        ids.extend(membership.approver_id);
        ids.extend(membership.denier_id);
    }
    let displays = load_displays(db, codec, ids).await?;

    let owner = displays
        .get(&clan.owner_id)
        .ok_or_else(|| ServiceError::PlayerNotFound(clan.owner_id.to_string()))?;

    let mut roster = Vec::new();
    let mut pending_applications = Vec::new();
    let mut pending_invites = Vec::new();
    let mut banned = Vec::new();
    let mut denied = Vec::new();

    for membership in &memberships {
        if membership.banned {
            banned.extend(member_entry(membership, false, &displays));
        } else if membership.denied {
            denied.extend(member_entry(membership, false, &displays));
        } else if membership.deleted_at > 0 {
            // Self-left members and transfer history are not reported
        } else if membership.approved {
            roster.extend(member_entry(membership, true, &displays));
        } else if membership.is_invite() {
            pending_invites.extend(member_entry(membership, true, &displays));
        } else {
            pending_applications.push(membership);
        }
    }

    pending_applications.sort_by_key(|membership| std::cmp::Reverse(membership.created_at));
    let pending_applications = pending_applications
        .into_iter()
        .take(max_pending_applications)
        .filter_map(|membership| member_entry(membership, true, &displays))
        .collect();

    Ok(ClanDetails {
        name: clan.name,
        metadata: clan.metadata,
        membership_count: clan.membership_count,
        allow_application: clan.allow_application,
        auto_join: clan.auto_join,
        owner: ClanOwner {
            public_id: owner.public_id.clone(),
            name: owner.name.clone(),
            metadata: owner.metadata.clone(),
        },
        roster,
        memberships: MembershipBuckets {
            pending_applications,
            pending_invites,
            banned,
            denied,
        },
    })
}

/// The six-key summary for one clan
pub async fn get_clan_summary(
    db: &DatabaseConnection,
    game_id: &str,
    clan_public_id: &str,
) -> ServiceResult<ClanSummary> {
    let clan = Clan::by_public_id(db, game_id, clan_public_id)
        .await?
        .ok_or_else(|| ServiceError::ClanNotFound(clan_public_id.to_string()))?;
    Ok(ClanSummary::from(clan))
}

/// Summaries for the requested clans together with the public ids that
/// could not be resolved
pub async fn get_clans_summaries(
    db: &DatabaseConnection,
    game_id: &str,
    public_ids: &[String],
) -> ServiceResult<(Vec<ClanSummary>, Vec<String>)> {
    let (found, missing) =
        super::clans::get_clans_by_public_ids(db, game_id, public_ids).await?;
    let summaries = found.into_iter().map(ClanSummary::from).collect();
    Ok((summaries, missing))
}

/// Builds the player details dictionary. The memberships list orders
/// approved, denied, banned then pending invites; the player's own
/// pending applications are only reflected in the clans partition to
/// keep the list bounded.
pub async fn get_player_details(
    db: &DatabaseConnection,
    codec: &NameCodec,
    game: &Game,
    player_public_id: &str,
) -> ServiceResult<PlayerDetails> {
    let player = Player::by_public_id(db, &game.public_id, player_public_id)
        .await?
        .ok_or_else(|| ServiceError::PlayerNotFound(player_public_id.to_string()))?;

    let memberships = Membership::all_by_player(db, &game.public_id, player.id).await?;
    let owned_clans = Clan::owned_by(db, &game.public_id, player.id).await?;

    // Resolve every clan and every referenced player in two queries
    let clan_ids: Vec<_> = memberships
        .iter()
        .map(|membership| membership.clan_id)
        .collect();
    let mut clans: HashMap<_, _> = HashMap::new();
    for clan_id in clan_ids {
        if let std::collections::hash_map::Entry::Vacant(entry) = clans.entry(clan_id) {
            if let Some(clan) = Clan::by_id(db, clan_id).await? {
                entry.insert(clan);
            }
        }
    }

    let mut ids: HashSet<PlayerID> = HashSet::new();
    for membership in &memberships {
        ids.insert(membership.requestor_id);
        ids.extend(membership.approver_id);
        ids.extend(membership.denier_id);
    }
    let displays = load_displays(db, codec, ids).await?;

    let mut approved = Vec::new();
    let mut denied = Vec::new();
    let mut banned = Vec::new();
    let mut pending_invites = Vec::new();
    let mut pending_applications = Vec::new();

    for membership in &memberships {
        let Some(clan) = clans.get(&membership.clan_id) else {
            continue;
        };
        let clan_ref = ClanRef::from(clan);
        let with_level = !membership.banned && !membership.denied;
        let entry = PlayerMembershipEntry {
            level: with_level.then(|| membership.level.clone()),
            approved: membership.approved,
            denied: membership.denied,
            banned: membership.banned,
            clan: clan_ref,
            created_at: membership.created_at,
            updated_at: membership.updated_at,
            message: (!membership.message.is_empty()).then(|| membership.message.clone()),
            requestor: displays
                .get(&membership.requestor_id)
                .map(PlayerDisplay::player_ref),
            approver: membership
                .approver_id
                .and_then(|id| displays.get(&id))
                .map(PlayerDisplay::player_ref),
            denier: membership
                .denier_id
                .and_then(|id| displays.get(&id))
                .map(PlayerDisplay::player_ref),
        };

        if membership.banned {
            banned.push(entry);
        } else if membership.denied {
            denied.push(entry);
        } else if membership.deleted_at > 0 {
            // Self-left rows and transfer history are not reported
        } else if membership.approved {
            approved.push(entry);
        } else if membership.is_invite() {
            pending_invites.push(entry);
        } else {
            pending_applications.push(entry);
        }
    }

    let clans_partition = PlayerClans {
        owned: owned_clans.iter().map(ClanRef::from).collect(),
        approved: approved.iter().map(|entry| entry.clan.clone()).collect(),
        denied: denied.iter().map(|entry| entry.clan.clone()).collect(),
        banned: banned.iter().map(|entry| entry.clan.clone()).collect(),
        pending_applications: pending_applications
            .iter()
            .map(|entry| entry.clan.clone())
            .collect(),
        pending_invites: pending_invites
            .iter()
            .map(|entry| entry.clan.clone())
            .collect(),
    };

    let mut ordered = approved;
    ordered.append(&mut denied);
    ordered.append(&mut banned);
    ordered.append(&mut pending_invites);

    Ok(PlayerDetails {
        public_id: player.public_id.clone(),
        name: player.decrypted_name(codec)?,
        metadata: player.metadata.clone(),
        ownership_count: player.ownership_count,
        membership_count: player.membership_count,
        created_at: player.created_at,
        updated_at: player.updated_at,
        memberships: ordered,
        clans: clans_partition,
    })
}

#[cfg(test)]
mod test {
    use super::{get_clan_details, get_clan_summary, get_clans_summaries, get_player_details};
    use crate::database::connect_test;
    use crate::services::membership::{
        apply_for_membership, approve_or_deny_application, delete_membership,
        invite_for_membership, Decision,
    };
    use crate::services::test_utils::{seed_clan, seed_game, seed_member, seed_player};
    use crate::utils::codec::NameCodec;

    #[tokio::test]
    async fn test_clan_summary_has_exactly_six_keys() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        seed_clan(&db, &game, &owner, "clan", true, false).await;

        let summary = get_clan_summary(&db, "game", "clan").await.unwrap();
        let value = serde_json::to_value(&summary).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 6);
        for key in [
            "membershipCount",
            "publicID",
            "metadata",
            "name",
            "allowApplication",
            "autoJoin",
        ] {
            assert!(object.contains_key(key), "missing key {key}");
        }

        let err = get_clan_summary(&db, "game", "missing").await.unwrap_err();
        assert_eq!(err.to_string(), "Clan was not found with id: missing");
    }

    #[tokio::test]
    async fn test_clans_summaries_reports_missing() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        seed_clan(&db, &game, &owner, "clan", true, false).await;

        let requested = vec!["clan".to_string(), "ghost".to_string()];
        let (summaries, missing) = get_clans_summaries(&db, "game", &requested).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(missing, vec!["ghost".to_string()]);
    }

    #[tokio::test]
    async fn test_clan_details_buckets() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let member = seed_player(&db, &codec, &game, "member").await;
        seed_player(&db, &codec, &game, "applicant").await;
        seed_player(&db, &codec, &game, "invited").await;
        seed_player(&db, &codec, &game, "rejected").await;
        seed_player(&db, &codec, &game, "kicked").await;
        let clan = seed_clan(&db, &game, &owner, "clan", true, false).await;
        seed_member(&db, &game, &clan, &member, "Elder").await;

        apply_for_membership(&db, &game, "clan", "Member", "applicant", "hi")
            .await
            .unwrap();
        invite_for_membership(&db, &game, "clan", "Member", "invited", "owner", "")
            .await
            .unwrap();
        apply_for_membership(&db, &game, "clan", "Member", "rejected", "")
            .await
            .unwrap();
        approve_or_deny_application(&db, &game, "clan", "rejected", "owner", Decision::Deny)
            .await
            .unwrap();
        apply_for_membership(&db, &game, "clan", "Member", "kicked", "")
            .await
            .unwrap();
        approve_or_deny_application(&db, &game, "clan", "kicked", "owner", Decision::Approve)
            .await
            .unwrap();
        delete_membership(&db, &game, "clan", "kicked", "owner")
            .await
            .unwrap();

        let details = get_clan_details(&db, &codec, &game, "clan", 10).await.unwrap();
        assert_eq!(details.owner.public_id, "owner");
        assert_eq!(details.owner.name, "name of owner");
        assert_eq!(details.membership_count, 2);

        assert_eq!(details.roster.len(), 1);
        let roster_entry = &details.roster[0];
        assert_eq!(roster_entry.level.as_deref(), Some("Elder"));
        assert_eq!(roster_entry.player.public_id, "member");
        assert!(roster_entry.player.approver.is_some());
        assert!(roster_entry.player.denier.is_none());

        assert_eq!(details.memberships.pending_applications.len(), 1);
        assert_eq!(
            details.memberships.pending_applications[0].player.public_id,
            "applicant"
        );
        assert_eq!(details.memberships.pending_invites.len(), 1);
        assert_eq!(
            details.memberships.pending_invites[0].level.as_deref(),
            Some("Member")
        );

        let denied = &details.memberships.denied;
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].player.public_id, "rejected");
        assert!(denied[0].level.is_none());
        let denier = denied[0].player.denier.as_ref().unwrap();
        assert_eq!(denier.public_id, "owner");
        assert!(denied[0].player.approver.is_none());

        let banned = &details.memberships.banned;
        assert_eq!(banned.len(), 1);
        assert_eq!(banned[0].player.public_id, "kicked");
        assert!(banned[0].level.is_none());
    }

    #[tokio::test]
    async fn test_clan_details_caps_pending_applications() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        seed_clan(&db, &game, &owner, "clan", true, false).await;

        for index in 0..5 {
            let public_id = format!("applicant-{index}");
            seed_player(&db, &codec, &game, &public_id).await;
            apply_for_membership(&db, &game, "clan", "Member", &public_id, "")
                .await
                .unwrap();
        }

        let details = get_clan_details(&db, &codec, &game, "clan", 2).await.unwrap();
        assert_eq!(details.memberships.pending_applications.len(), 2);
    }

    #[tokio::test]
    async fn test_player_details_partitions() {
        let db = connect_test().await;
        let codec = NameCodec::generate();
        let game = seed_game(&db, "game").await;
        let owner = seed_player(&db, &codec, &game, "owner").await;
        let player = seed_player(&db, &codec, &game, "player").await;
        seed_clan(&db, &game, &owner, "clan-a", true, true).await;
        seed_clan(&db, &game, &owner, "clan-b", true, false).await;
        seed_clan(&db, &game, &owner, "clan-c", false, false).await;
        // The player owns a clan of their own
        seed_clan(&db, &game, &player, "own-clan", false, false).await;

        // Approved in clan-a via auto join
        apply_for_membership(&db, &game, "clan-a", "Member", "player", "")
            .await
            .unwrap();
        // Pending application in clan-b
        apply_for_membership(&db, &game, "clan-b", "Member", "player", "")
            .await
            .unwrap();
        // Pending invitation into clan-c
        invite_for_membership(&db, &game, "clan-c", "Member", "player", "owner", "")
            .await
            .unwrap();

        let details = get_player_details(&db, &codec, &game, "player").await.unwrap();
        assert_eq!(details.public_id, "player");
        assert_eq!(details.name, "name of player");
        assert_eq!(details.ownership_count, 1);
        assert_eq!(details.membership_count, 1);

        // Owned clans are always present
        assert_eq!(details.clans.owned.len(), 1);
        assert_eq!(details.clans.owned[0].public_id, "own-clan");
        assert_eq!(details.clans.approved.len(), 1);
        assert_eq!(details.clans.approved[0].public_id, "clan-a");
        assert_eq!(details.clans.pending_applications.len(), 1);
        assert_eq!(details.clans.pending_applications[0].public_id, "clan-b");
        assert_eq!(details.clans.pending_invites.len(), 1);
        assert_eq!(details.clans.pending_invites[0].public_id, "clan-c");

        // The memberships list orders approved first and omits the
        // player's own pending applications
        assert_eq!(details.memberships.len(), 2);
        assert!(details.memberships[0].approved);
        assert_eq!(details.memberships[0].clan.public_id, "clan-a");
        assert!(!details.memberships[1].approved);
        assert_eq!(details.memberships[1].clan.public_id, "clan-c");
    }
}
