use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::errors::{AppError, Result};
use crate::models::{
    Actor, Badge, CheckIn, CheckInQuery, Like, NewActor, NewBadge, NewCheckIn, NewNotification,
    Notification,
};

#[derive(Default)]
struct Tables {
    actors: HashMap<Uuid, Actor>,
    check_ins: Vec<CheckIn>,
    badges: Vec<Badge>,
    follows: HashSet<(Uuid, Uuid)>,
    likes: Vec<Like>,
    notifications: Vec<Notification>,
}

/// In-process store for development and tests. One lock over all tables,
/// so every operation is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a check-in as is, keeping its id and timestamp. Used to seed
    /// historical data.
    pub async fn seed_check_in(&self, check_in: CheckIn) {
        self.tables.write().await.check_ins.push(check_in);
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create_actor(&self, actor: NewActor) -> Result<Actor> {
        let mut tables = self.tables.write().await;
        if tables.actors.values().any(|a| a.username == actor.username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken",
                actor.username
            )));
        }

        let created = Actor {
            id: Uuid::new_v4(),
            username: actor.username,
            display_name: actor.display_name,
            campus: actor.campus,
            city: actor.city,
            avatar_url: actor.avatar_url,
            created_at: Utc::now(),
        };
        tables.actors.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_actor(&self, id: Uuid) -> Result<Option<Actor>> {
        Ok(self.tables.read().await.actors.get(&id).cloned())
    }

    async fn list_actors(&self, ids: Option<&[Uuid]>) -> Result<Vec<Actor>> {
        let tables = self.tables.read().await;
        let mut actors: Vec<Actor> = match ids {
            Some(ids) => ids.iter().filter_map(|id| tables.actors.get(id).cloned()).collect(),
            None => tables.actors.values().cloned().collect(),
        };
        actors.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(actors)
    }

    async fn search_actors(&self, query: &str, exclude: Option<Uuid>, limit: i64) -> Result<Vec<Actor>> {
        let needle = query.to_lowercase();
        let tables = self.tables.read().await;
        let mut found: Vec<Actor> = tables
            .actors
            .values()
            .filter(|a| Some(a.id) != exclude)
            .filter(|a| {
                a.username.to_lowercase().contains(&needle)
                    || a.display_name
                        .as_deref()
                        .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn update_location(
        &self,
        id: Uuid,
        campus: Option<String>,
        city: Option<String>,
    ) -> Result<Option<Actor>> {
        let mut tables = self.tables.write().await;
        Ok(tables.actors.get_mut(&id).map(|actor| {
            actor.campus = campus;
            actor.city = city;
            actor.clone()
        }))
    }

    async fn insert_check_in(&self, check_in: NewCheckIn) -> Result<CheckIn> {
        let stored = CheckIn {
            id: Uuid::new_v4(),
            actor_id: check_in.actor_id,
            drink_name: check_in.drink_name,
            category: check_in.category,
            brand: check_in.brand,
            product: check_in.product,
            flavor: check_in.flavor,
            caption: check_in.caption,
            photo_url: check_in.photo_url,
            rating: check_in.rating,
            city: check_in.city,
            is_private: check_in.is_private,
            created_at: check_in.created_at,
        };
        self.tables.write().await.check_ins.push(stored.clone());
        Ok(stored)
    }

    async fn get_check_in(&self, id: Uuid) -> Result<Option<CheckIn>> {
        let tables = self.tables.read().await;
        Ok(tables.check_ins.iter().find(|c| c.id == id).cloned())
    }

    async fn list_check_ins(&self, query: &CheckInQuery) -> Result<Vec<CheckIn>> {
        let tables = self.tables.read().await;
        let mut found: Vec<CheckIn> = tables
            .check_ins
            .iter()
            .filter(|c| query.matches(c))
            .cloned()
            .collect();

        if query.newest_first {
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        } else {
            found.sort_by_key(|c| c.created_at);
        }
        if let Some(limit) = query.limit {
            found.truncate(limit.max(0) as usize);
        }
        Ok(found)
    }

    async fn list_badges(&self, actor_id: Uuid) -> Result<Vec<Badge>> {
        let tables = self.tables.read().await;
        let mut badges: Vec<Badge> = tables
            .badges
            .iter()
            .filter(|b| b.actor_id == actor_id)
            .cloned()
            .collect();
        badges.sort_by(|a, b| b.earned_at.cmp(&a.earned_at));
        Ok(badges)
    }

    async fn grant_badge(&self, badge: NewBadge) -> Result<Option<Badge>> {
        let mut tables = self.tables.write().await;
        let held = tables.badges.iter().any(|b| {
            b.actor_id == badge.actor_id
                && b.badge_type == badge.badge_type
                && b.badge_name == badge.badge_name
        });
        if held {
            return Ok(None);
        }

        let granted = Badge {
            id: Uuid::new_v4(),
            actor_id: badge.actor_id,
            badge_type: badge.badge_type,
            badge_name: badge.badge_name,
            metadata: badge.metadata,
            earned_at: Utc::now(),
        };
        tables.badges.push(granted.clone());
        Ok(Some(granted))
    }

    async fn follow(&self, follower: Uuid, target: Uuid) -> Result<bool> {
        if follower == target {
            return Err(AppError::BadRequest("Actors cannot follow themselves".to_string()));
        }
        Ok(self.tables.write().await.follows.insert((follower, target)))
    }

    async fn unfollow(&self, follower: Uuid, target: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.follows.remove(&(follower, target)))
    }

    async fn following_ids(&self, actor_id: Uuid) -> Result<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|(follower, _)| *follower == actor_id)
            .map(|(_, target)| *target)
            .collect())
    }

    async fn follower_ids(&self, actor_id: Uuid) -> Result<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|(_, target)| *target == actor_id)
            .map(|(follower, _)| *follower)
            .collect())
    }

    async fn like(&self, actor_id: Uuid, check_in_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables
            .likes
            .iter()
            .any(|l| l.actor_id == actor_id && l.check_in_id == check_in_id)
        {
            return Ok(false);
        }
        tables.likes.push(Like {
            actor_id,
            check_in_id,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn unlike(&self, actor_id: Uuid, check_in_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.likes.len();
        tables
            .likes
            .retain(|l| !(l.actor_id == actor_id && l.check_in_id == check_in_id));
        Ok(tables.likes.len() < before)
    }

    async fn likes_for(&self, check_in_ids: &[Uuid]) -> Result<Vec<Like>> {
        let tables = self.tables.read().await;
        Ok(tables
            .likes
            .iter()
            .filter(|l| check_in_ids.contains(&l.check_in_id))
            .cloned()
            .collect())
    }

    async fn insert_notifications(&self, notifications: Vec<NewNotification>) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let count = notifications.len();
        let now = Utc::now();
        tables
            .notifications
            .extend(notifications.into_iter().map(|n| Notification {
                id: Uuid::new_v4(),
                actor_id: n.actor_id,
                from_actor_id: n.from_actor_id,
                message: n.message,
                kind: n.kind,
                read: false,
                created_at: now,
            }));
        Ok(count)
    }

    async fn list_notifications(&self, actor_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.actor_id == actor_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn unread_count(&self, actor_id: Uuid) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .filter(|n| n.actor_id == actor_id && !n.read)
            .count() as i64)
    }

    async fn mark_all_read(&self, actor_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut flipped = 0;
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|n| n.actor_id == actor_id && !n.read)
        {
            notification.read = true;
            flipped += 1;
        }
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_actor(username: &str) -> NewActor {
        NewActor {
            username: username.to_string(),
            display_name: None,
            campus: None,
            city: None,
            avatar_url: None,
        }
    }

    fn badge(actor_id: Uuid) -> NewBadge {
        NewBadge {
            actor_id,
            badge_type: "streak".to_string(),
            badge_name: "3-Day Streak".to_string(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.create_actor(new_actor("buzz")).await.unwrap();
        assert!(matches!(
            store.create_actor(new_actor("buzz")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_grants_insert_once() {
        let store = Arc::new(MemoryStore::new());
        let actor = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.grant_badge(badge(actor)).await.unwrap() })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
        assert_eq!(store.list_badges(actor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn follow_is_idempotent() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(store.follow(a, b).await.unwrap());
        assert!(!store.follow(a, b).await.unwrap());
        assert_eq!(store.follower_ids(b).await.unwrap(), vec![a]);
        assert!(store.follow(a, a).await.is_err());
        assert!(store.unfollow(a, b).await.unwrap());
        assert!(store.following_ids(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_all_read_clears_unread() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        let note = || NewNotification {
            actor_id: actor,
            from_actor_id: None,
            message: "hi".to_string(),
            kind: "smack_talk".to_string(),
        };
        store.insert_notifications(vec![note(), note()]).await.unwrap();

        assert_eq!(store.unread_count(actor).await.unwrap(), 2);
        assert_eq!(store.mark_all_read(actor).await.unwrap(), 2);
        assert_eq!(store.unread_count(actor).await.unwrap(), 0);
    }
}
