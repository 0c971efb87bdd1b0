//! Module for type aliases that help to better identify field types

pub type PlayerID = i32;
pub type ClanID = i32;
pub type MembershipID = i64;
pub type HookID = i32;
