use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::Validate;

use super::ActorSummary;

/// Drink category a check-in is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrinkCategory {
    EnergyDrink,
    ProteinShake,
    Coffee,
    PreWorkout,
    Supplements,
    Electrolytes,
    Other,
}

impl DrinkCategory {
    pub const ALL: [DrinkCategory; 7] = [
        DrinkCategory::EnergyDrink,
        DrinkCategory::ProteinShake,
        DrinkCategory::Coffee,
        DrinkCategory::PreWorkout,
        DrinkCategory::Supplements,
        DrinkCategory::Electrolytes,
        DrinkCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DrinkCategory::EnergyDrink => "energy_drink",
            DrinkCategory::ProteinShake => "protein_shake",
            DrinkCategory::Coffee => "coffee",
            DrinkCategory::PreWorkout => "pre_workout",
            DrinkCategory::Supplements => "supplements",
            DrinkCategory::Electrolytes => "electrolytes",
            DrinkCategory::Other => "other",
        }
    }
}

impl fmt::Display for DrinkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown drink category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for DrinkCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DrinkCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

// Lets sqlx decode the TEXT column straight into the enum.
impl TryFrom<String> for DrinkCategory {
    type Error = UnknownCategory;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

/// One logged consumption. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckIn {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub drink_name: String,
    #[sqlx(try_from = "String")]
    pub category: DrinkCategory,
    pub brand: Option<String>,
    pub product: Option<String>,
    pub flavor: Option<String>,
    pub caption: Option<String>,
    pub photo_url: Option<String>,
    pub rating: Option<i16>,
    pub city: Option<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl CheckIn {
    pub fn visibility(&self) -> Visibility {
        if self.is_private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

/// Row handed to a store for insertion. The store assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewCheckIn {
    pub actor_id: Uuid,
    pub drink_name: String,
    pub category: DrinkCategory,
    pub brand: Option<String>,
    pub product: Option<String>,
    pub flavor: Option<String>,
    pub caption: Option<String>,
    pub photo_url: Option<String>,
    pub rating: Option<i16>,
    pub city: Option<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCheckInRequest {
    pub actor_id: Uuid,
    pub category: DrinkCategory,
    #[validate(length(min = 1, max = 80))]
    pub brand: String,
    #[validate(length(max = 120))]
    pub product: Option<String>,
    #[validate(length(max = 120))]
    pub flavor: Option<String>,
    #[validate(length(max = 500))]
    pub caption: Option<String>,
    #[validate(url)]
    pub photo_url: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i16>,
    #[serde(default)]
    pub is_private: bool,
}

impl CreateCheckInRequest {
    /// "Product - Flavor", falling back to the product or the brand alone.
    pub fn drink_name(&self) -> String {
        let product = non_blank(self.product.as_deref());
        let flavor = non_blank(self.flavor.as_deref());
        match (product, flavor) {
            (Some(p), Some(f)) => format!("{} - {}", p, f),
            (Some(p), None) => p.to_string(),
            _ => self.brand.trim().to_string(),
        }
    }

    pub fn into_new_check_in(self, city: Option<String>, created_at: DateTime<Utc>) -> NewCheckIn {
        let drink_name = self.drink_name();
        NewCheckIn {
            actor_id: self.actor_id,
            drink_name,
            category: self.category,
            brand: Some(self.brand.trim().to_string()),
            product: non_blank(self.product.as_deref()).map(str::to_string),
            flavor: non_blank(self.flavor.as_deref()).map(str::to_string),
            caption: non_blank(self.caption.as_deref()).map(str::to_string),
            photo_url: self.photo_url,
            rating: self.rating,
            city,
            is_private: self.is_private,
            created_at,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Selection pushed down to the store.
#[derive(Debug, Clone, Default)]
pub struct CheckInQuery {
    pub actor_ids: Option<Vec<Uuid>>,
    pub since: Option<DateTime<Utc>>,
    pub category: Option<DrinkCategory>,
    pub public_only: bool,
    pub newest_first: bool,
    pub limit: Option<i64>,
}

impl CheckInQuery {
    pub fn matches(&self, check_in: &CheckIn) -> bool {
        if let Some(ids) = &self.actor_ids {
            if !ids.contains(&check_in.actor_id) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if check_in.created_at < since {
                return false;
            }
        }
        if let Some(category) = self.category {
            if check_in.category != category {
                return false;
            }
        }
        !(self.public_only && check_in.is_private)
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub viewer_id: Option<Uuid>,
    pub mode: Option<FeedMode>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    Everyone,
    Following,
}

#[derive(Debug, Serialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub check_in: CheckIn,
    pub author: ActorSummary,
    pub like_count: i64,
    pub liked_by_viewer: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckInCreatedResponse {
    pub check_in: CheckIn,
    pub new_badges: Vec<super::Badge>,
}
