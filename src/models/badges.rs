use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A milestone granted to an actor. `(actor_id, badge_type, badge_name)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Badge {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub badge_type: String,
    pub badge_name: String,
    pub metadata: serde_json::Value,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBadge {
    pub actor_id: Uuid,
    pub badge_type: String,
    pub badge_name: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct BadgeEvaluationResponse {
    pub actor_id: Uuid,
    pub longest_streak: u32,
    pub granted: Vec<Badge>,
}
