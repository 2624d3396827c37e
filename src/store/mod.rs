//! Persistence seam. Handlers and services only see [`Store`]; the backend
//! is picked at startup from `STORE_BACKEND`.

mod memory;
mod postgres;
mod rest;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use rest::RestStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{
    Actor, Badge, CheckIn, CheckInQuery, Like, NewActor, NewBadge, NewCheckIn, NewNotification,
    Notification,
};

#[async_trait]
pub trait Store: Send + Sync {
    /// Short name for logs and the health endpoint.
    fn backend_name(&self) -> &'static str;

    // Actors

    /// Fails with `Conflict` when the username is taken.
    async fn create_actor(&self, actor: NewActor) -> Result<Actor>;
    async fn get_actor(&self, id: Uuid) -> Result<Option<Actor>>;
    /// All actors, or only those in `ids`.
    async fn list_actors(&self, ids: Option<&[Uuid]>) -> Result<Vec<Actor>>;
    /// Case-insensitive substring match on username or display name.
    async fn search_actors(&self, query: &str, exclude: Option<Uuid>, limit: i64) -> Result<Vec<Actor>>;
    async fn update_location(
        &self,
        id: Uuid,
        campus: Option<String>,
        city: Option<String>,
    ) -> Result<Option<Actor>>;

    // Check-ins

    async fn insert_check_in(&self, check_in: NewCheckIn) -> Result<CheckIn>;
    async fn get_check_in(&self, id: Uuid) -> Result<Option<CheckIn>>;
    async fn list_check_ins(&self, query: &CheckInQuery) -> Result<Vec<CheckIn>>;

    // Milestones

    async fn list_badges(&self, actor_id: Uuid) -> Result<Vec<Badge>>;
    /// Insert-if-absent on `(actor_id, badge_type, badge_name)`. Returns the
    /// new row, or `None` when the badge was already held.
    async fn grant_badge(&self, badge: NewBadge) -> Result<Option<Badge>>;

    // Follows

    /// Returns whether a new edge was created.
    async fn follow(&self, follower: Uuid, target: Uuid) -> Result<bool>;
    async fn unfollow(&self, follower: Uuid, target: Uuid) -> Result<bool>;
    async fn following_ids(&self, actor_id: Uuid) -> Result<Vec<Uuid>>;
    async fn follower_ids(&self, actor_id: Uuid) -> Result<Vec<Uuid>>;

    // Likes

    async fn like(&self, actor_id: Uuid, check_in_id: Uuid) -> Result<bool>;
    async fn unlike(&self, actor_id: Uuid, check_in_id: Uuid) -> Result<bool>;
    async fn likes_for(&self, check_in_ids: &[Uuid]) -> Result<Vec<Like>>;

    // Notifications

    async fn insert_notifications(&self, notifications: Vec<NewNotification>) -> Result<usize>;
    async fn list_notifications(&self, actor_id: Uuid, limit: i64) -> Result<Vec<Notification>>;
    async fn unread_count(&self, actor_id: Uuid) -> Result<i64>;
    /// Returns how many notifications were flipped to read.
    async fn mark_all_read(&self, actor_id: Uuid) -> Result<u64>;
}
