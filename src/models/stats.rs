use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DrinkCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    Today,
    Week,
    AllTime,
}

impl StatsPeriod {
    pub fn title(&self) -> &'static str {
        match self {
            StatsPeriod::Today => "Today's Breakdown",
            StatsPeriod::Week => "This Week's Breakdown",
            StatsPeriod::AllTime => "All Time Breakdown",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BreakdownParams {
    pub period: Option<StatsPeriod>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorStats {
    pub actor_id: Uuid,
    pub today: i64,
    pub week: i64,
    pub all_time: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountedLabel {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct BreakdownResponse {
    pub title: String,
    pub by_type: Vec<(DrinkCategory, i64)>,
    pub by_brand: Vec<CountedLabel>,
    pub by_product: Vec<CountedLabel>,
}
