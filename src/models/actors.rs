use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A user of the app. Campus and city are the two leaderboard group keys.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Actor {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub campus: Option<String>,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Actor {
    /// Name shown on leaderboards and in notifications.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }

    pub fn summary(&self) -> ActorSummary {
        ActorSummary {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSummary {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ActorSummary {
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            username: "unknown".to_string(),
            display_name: None,
            avatar_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewActor {
    pub username: String,
    pub display_name: Option<String>,
    pub campus: Option<String>,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateActorRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(length(max = 64))]
    pub display_name: Option<String>,
    #[validate(length(max = 80))]
    pub campus: Option<String>,
    #[validate(length(max = 80))]
    pub city: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCampusRequest {
    #[validate(length(min = 1, max = 80))]
    pub campus: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActorSearchParams {
    pub q: String,
    pub exclude: Option<Uuid>,
}
