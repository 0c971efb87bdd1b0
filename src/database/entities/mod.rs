use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

pub mod clans;
pub mod games;
pub mod hook_events;
pub mod hooks;
pub mod memberships;
pub mod players;

pub type Game = games::Model;
pub type Player = players::Model;
pub type Clan = clans::Model;
pub type Membership = memberships::Model;
pub type Hook = hooks::Model;
pub use hooks::HookEvent;

/// Opaque JSON metadata attached to players and clans
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Metadata(pub serde_json::Value);
