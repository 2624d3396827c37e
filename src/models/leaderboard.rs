use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DrinkCategory;

/// Trailing window a leaderboard counts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    Week,
    Month,
    Year,
}

/// Actor attribute events are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDimension {
    #[default]
    Campus,
    City,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedGroupEntry {
    pub group_name: String,
    pub event_count: u64,
    pub distinct_actor_count: u64,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedActorEntry {
    pub actor_id: Uuid,
    pub display_name: String,
    pub event_count: u64,
    pub rank: u32,
}

/// Why a ranking came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// Nothing was fetched at all (or the fetch failed).
    NoEvents,
    /// Every event predates the window.
    OutsideWindow,
    /// Events exist in the window, none of the requested category.
    CategoryMismatch,
    /// Every qualifying event belongs to an actor without a group.
    NoGroupedActors,
    /// The drill-down group has no actor with a qualifying event.
    NoActorsInGroup,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardParams {
    #[serde(default)]
    pub period: Period,
    #[serde(default)]
    pub dimension: GroupDimension,
    pub category: Option<DrinkCategory>,
    /// Identifies the requesting client for stale-response detection.
    pub client_id: Option<String>,
    /// Optional client-issued sequence number, strictly increasing.
    pub seq: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorLeaderboardParams {
    #[serde(default)]
    pub period: Period,
    pub city: Option<String>,
    pub category: Option<DrinkCategory>,
    pub client_id: Option<String>,
    pub seq: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct GroupLeaderboardResponse {
    pub period: Period,
    pub dimension: GroupDimension,
    pub category: Option<DrinkCategory>,
    pub since: DateTime<FixedOffset>,
    pub generation: Option<u64>,
    pub entries: Vec<RankedGroupEntry>,
    pub empty_reason: Option<EmptyReason>,
}

#[derive(Debug, Serialize)]
pub struct ActorLeaderboardResponse {
    pub period: Period,
    pub group_name: Option<String>,
    pub category: Option<DrinkCategory>,
    pub since: DateTime<FixedOffset>,
    pub generation: Option<u64>,
    pub entries: Vec<RankedActorEntry>,
    pub empty_reason: Option<EmptyReason>,
}
