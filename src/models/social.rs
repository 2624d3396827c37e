use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Like {
    pub actor_id: Uuid,
    pub check_in_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient.
    pub actor_id: Uuid,
    pub from_actor_id: Option<Uuid>,
    pub message: String,
    pub kind: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub actor_id: Uuid,
    pub from_actor_id: Option<Uuid>,
    pub message: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct NotificationParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub actor_id: Uuid,
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    /// Whether the relation exists after the call.
    pub active: bool,
    /// Whether the call changed anything.
    pub changed: bool,
}
