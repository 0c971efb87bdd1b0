//! Level ladder math.
//!
//! Every game defines a mapping from level names to signed ranks. Ranks
//! order members for authority checks and promotion steps. The clan
//! owner sits above the entire ladder and is not a named level.

use crate::database::entities::Game;

/// Level name conventionally given to a former owner after an ownership
/// transfer, when the ladder defines it
pub const TRANSFER_LEVEL: &str = "CoLeader";

/// A game's level ladder ordered by rank ascending
pub struct Ladder {
    levels: Vec<(String, i32)>,
}

impl Ladder {
    pub fn from_game(game: &Game) -> Self {
        let mut levels: Vec<(String, i32)> = game
            .membership_levels
            .0
            .iter()
            .map(|(name, rank)| (name.clone(), *rank))
            .collect();
        levels.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Self { levels }
    }

    /// The rank of the provided level name
    pub fn rank_of(&self, level: &str) -> Option<i32> {
        self.levels
            .iter()
            .find(|(name, _)| name == level)
            .map(|(_, rank)| *rank)
    }

    /// The closest level strictly above the provided rank. Ladders may
    /// have rank gaps, the next existing rank is chosen.
    pub fn level_above(&self, rank: i32) -> Option<(&str, i32)> {
        self.levels
            .iter()
            .find(|(_, other)| *other > rank)
            .map(|(name, other)| (name.as_str(), *other))
    }

    /// The closest level strictly below the provided rank
    pub fn level_below(&self, rank: i32) -> Option<(&str, i32)> {
        self.levels
            .iter()
            .rev()
            .find(|(_, other)| *other < rank)
            .map(|(name, other)| (name.as_str(), *other))
    }

    /// The highest non-owner level of the ladder
    pub fn highest(&self) -> Option<(&str, i32)> {
        self.levels
            .last()
            .map(|(name, rank)| (name.as_str(), *rank))
    }

    /// The level granted to a former owner on ownership transfer:
    /// the conventional name when the ladder defines it, otherwise the
    /// highest level by rank
    pub fn transfer_level(&self) -> Option<&str> {
        if self.rank_of(TRANSFER_LEVEL).is_some() {
            return Some(TRANSFER_LEVEL);
        }
        self.highest().map(|(name, _)| name)
    }
}

/// The effective standing of an actor within a clan. The owner outranks
/// every ladder rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authority {
    Owner,
    Ranked(i32),
}

impl Authority {
    /// Whether the actor ranks strictly above the provided rank
    pub fn outranks(&self, rank: i32) -> bool {
        match self {
            Self::Owner => true,
            Self::Ranked(own) => *own > rank,
        }
    }

    /// Whether the actor ranks at or above the provided rank
    pub fn at_least(&self, rank: i32) -> bool {
        match self {
            Self::Owner => true,
            Self::Ranked(own) => *own >= rank,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Authority, Ladder};
    use crate::database::entities::games::MembershipLevels;
    use crate::database::entities::Game;
    use std::collections::HashMap;

    fn game_with_levels(levels: &[(&str, i32)]) -> Game {
        let membership_levels = MembershipLevels(
            levels
                .iter()
                .map(|(name, rank)| (name.to_string(), *rank))
                .collect::<HashMap<_, _>>(),
        );
        Game {
            id: 1,
            public_id: "test-game".to_string(),
            name: "Test Game".to_string(),
            membership_levels,
            min_membership_level: 0,
            max_membership_level: 10,
            max_clans_per_player: 5,
            cooldown_after_deny: 0,
            cooldown_after_delete: 0,
            max_pending_invites: -1,
            auto_approve_applications: false,
            auto_approve_invites: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_rank_lookup() {
        let ladder = Ladder::from_game(&game_with_levels(&[
            ("Member", 0),
            ("Elder", 1),
            ("CoLeader", 2),
        ]));
        assert_eq!(ladder.rank_of("Elder"), Some(1));
        assert_eq!(ladder.rank_of("Leader"), None);
    }

    #[test]
    fn test_steps_skip_gaps() {
        let ladder = Ladder::from_game(&game_with_levels(&[
            ("Member", 0),
            ("Veteran", 3),
            ("CoLeader", 7),
        ]));
        assert_eq!(ladder.level_above(0), Some(("Veteran", 3)));
        assert_eq!(ladder.level_above(3), Some(("CoLeader", 7)));
        assert_eq!(ladder.level_above(7), None);
        assert_eq!(ladder.level_below(3), Some(("Member", 0)));
        assert_eq!(ladder.level_below(0), None);
    }

    #[test]
    fn test_transfer_level() {
        let with_coleader =
            Ladder::from_game(&game_with_levels(&[("Member", 0), ("CoLeader", 2)]));
        assert_eq!(with_coleader.transfer_level(), Some("CoLeader"));

        let without = Ladder::from_game(&game_with_levels(&[("Member", 0), ("Veteran", 4)]));
        assert_eq!(without.transfer_level(), Some("Veteran"));
    }

    #[test]
    fn test_authority() {
        assert!(Authority::Owner.outranks(i32::MAX));
        assert!(Authority::Ranked(2).outranks(1));
        assert!(!Authority::Ranked(2).outranks(2));
        assert!(Authority::Ranked(2).at_least(2));
        assert!(!Authority::Ranked(1).at_least(2));
    }
}
