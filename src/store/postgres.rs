use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::Store;
use crate::errors::{AppError, Result};
use crate::models::{
    Actor, Badge, CheckIn, CheckInQuery, Like, NewActor, NewBadge, NewCheckIn, NewNotification,
    Notification,
};

const ACTOR_COLUMNS: &str = "id, username, display_name, campus, city, avatar_url, created_at";
const CHECK_IN_COLUMNS: &str = "id, actor_id, drink_name, category, brand, product, flavor, \
     caption, photo_url, rating, city, is_private, created_at";

/// Postgres backend over the `bc_*` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the WHERE clause for a check-in selection.
fn push_check_in_filters<'a>(query_builder: &mut QueryBuilder<'a, Postgres>, query: &'a CheckInQuery) {
    query_builder.push(" WHERE TRUE");

    if let Some(ids) = &query.actor_ids {
        query_builder.push(" AND actor_id = ANY(");
        query_builder.push_bind(ids.as_slice());
        query_builder.push(")");
    }
    if let Some(since) = query.since {
        query_builder.push(" AND created_at >= ");
        query_builder.push_bind(since);
    }
    if let Some(category) = query.category {
        query_builder.push(" AND category = ");
        query_builder.push_bind(category.as_str());
    }
    if query.public_only {
        query_builder.push(" AND is_private = FALSE");
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn create_actor(&self, actor: NewActor) -> Result<Actor> {
        let sql = format!(
            "INSERT INTO bc_users (id, username, display_name, campus, city, avatar_url) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (username) DO NOTHING \
             RETURNING {}",
            ACTOR_COLUMNS
        );

        sqlx::query_as::<_, Actor>(&sql)
            .bind(Uuid::new_v4())
            .bind(&actor.username)
            .bind(&actor.display_name)
            .bind(&actor.campus)
            .bind(&actor.city)
            .bind(&actor.avatar_url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("Username '{}' is already taken", actor.username)))
    }

    async fn get_actor(&self, id: Uuid) -> Result<Option<Actor>> {
        let sql = format!("SELECT {} FROM bc_users WHERE id = $1", ACTOR_COLUMNS);
        Ok(sqlx::query_as::<_, Actor>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_actors(&self, ids: Option<&[Uuid]>) -> Result<Vec<Actor>> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM bc_users", ACTOR_COLUMNS));
        if let Some(ids) = ids {
            query_builder.push(" WHERE id = ANY(");
            query_builder.push_bind(ids);
            query_builder.push(")");
        }
        query_builder.push(" ORDER BY username");

        Ok(query_builder
            .build_query_as::<Actor>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn search_actors(&self, query: &str, exclude: Option<Uuid>, limit: i64) -> Result<Vec<Actor>> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let sql = format!(
            "SELECT {} FROM bc_users \
             WHERE (username ILIKE $1 OR display_name ILIKE $1) \
               AND ($2::uuid IS NULL OR id <> $2) \
             ORDER BY username \
             LIMIT $3",
            ACTOR_COLUMNS
        );

        Ok(sqlx::query_as::<_, Actor>(&sql)
            .bind(pattern)
            .bind(exclude)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_location(
        &self,
        id: Uuid,
        campus: Option<String>,
        city: Option<String>,
    ) -> Result<Option<Actor>> {
        let sql = format!(
            "UPDATE bc_users SET campus = $2, city = $3 WHERE id = $1 RETURNING {}",
            ACTOR_COLUMNS
        );
        Ok(sqlx::query_as::<_, Actor>(&sql)
            .bind(id)
            .bind(campus)
            .bind(city)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_check_in(&self, check_in: NewCheckIn) -> Result<CheckIn> {
        let sql = format!(
            "INSERT INTO bc_posts (id, actor_id, drink_name, category, brand, product, flavor, \
                                   caption, photo_url, rating, city, is_private, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {}",
            CHECK_IN_COLUMNS
        );

        Ok(sqlx::query_as::<_, CheckIn>(&sql)
            .bind(Uuid::new_v4())
            .bind(check_in.actor_id)
            .bind(&check_in.drink_name)
            .bind(check_in.category.as_str())
            .bind(&check_in.brand)
            .bind(&check_in.product)
            .bind(&check_in.flavor)
            .bind(&check_in.caption)
            .bind(&check_in.photo_url)
            .bind(check_in.rating)
            .bind(&check_in.city)
            .bind(check_in.is_private)
            .bind(check_in.created_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_check_in(&self, id: Uuid) -> Result<Option<CheckIn>> {
        let sql = format!("SELECT {} FROM bc_posts WHERE id = $1", CHECK_IN_COLUMNS);
        Ok(sqlx::query_as::<_, CheckIn>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_check_ins(&self, query: &CheckInQuery) -> Result<Vec<CheckIn>> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM bc_posts", CHECK_IN_COLUMNS));
        push_check_in_filters(&mut query_builder, query);

        if query.newest_first {
            query_builder.push(" ORDER BY created_at DESC");
        } else {
            query_builder.push(" ORDER BY created_at ASC");
        }
        if let Some(limit) = query.limit {
            query_builder.push(" LIMIT ");
            query_builder.push_bind(limit);
        }

        let check_ins = query_builder
            .build_query_as::<CheckIn>()
            .fetch_all(&self.pool)
            .await?;
        tracing::debug!("📊 Loaded {} check-ins", check_ins.len());
        Ok(check_ins)
    }

    async fn list_badges(&self, actor_id: Uuid) -> Result<Vec<Badge>> {
        Ok(sqlx::query_as::<_, Badge>(
            "SELECT id, actor_id, badge_type, badge_name, metadata, earned_at \
             FROM bc_badges WHERE actor_id = $1 ORDER BY earned_at DESC",
        )
        .bind(actor_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn grant_badge(&self, badge: NewBadge) -> Result<Option<Badge>> {
        Ok(sqlx::query_as::<_, Badge>(
            "INSERT INTO bc_badges (id, actor_id, badge_type, badge_name, metadata) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (actor_id, badge_type, badge_name) DO NOTHING \
             RETURNING id, actor_id, badge_type, badge_name, metadata, earned_at",
        )
        .bind(Uuid::new_v4())
        .bind(badge.actor_id)
        .bind(&badge.badge_type)
        .bind(&badge.badge_name)
        .bind(&badge.metadata)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn follow(&self, follower: Uuid, target: Uuid) -> Result<bool> {
        if follower == target {
            return Err(AppError::BadRequest("Actors cannot follow themselves".to_string()));
        }
        let result = sqlx::query(
            "INSERT INTO bc_follows (follower_id, following_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(follower)
        .bind(target)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, follower: Uuid, target: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bc_follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower)
            .bind(target)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn following_ids(&self, actor_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT following_id FROM bc_follows WHERE follower_id = $1",
        )
        .bind(actor_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn follower_ids(&self, actor_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT follower_id FROM bc_follows WHERE following_id = $1",
        )
        .bind(actor_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn like(&self, actor_id: Uuid, check_in_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO bc_likes (actor_id, check_in_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(actor_id)
        .bind(check_in_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unlike(&self, actor_id: Uuid, check_in_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bc_likes WHERE actor_id = $1 AND check_in_id = $2")
            .bind(actor_id)
            .bind(check_in_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn likes_for(&self, check_in_ids: &[Uuid]) -> Result<Vec<Like>> {
        if check_in_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(sqlx::query_as::<_, Like>(
            "SELECT actor_id, check_in_id, created_at FROM bc_likes WHERE check_in_id = ANY($1)",
        )
        .bind(check_in_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_notifications(&self, notifications: Vec<NewNotification>) -> Result<usize> {
        if notifications.is_empty() {
            return Ok(0);
        }

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO bc_notifications (id, actor_id, from_actor_id, message, kind) ",
        );
        query_builder.push_values(&notifications, |mut row, n| {
            row.push_bind(Uuid::new_v4())
                .push_bind(n.actor_id)
                .push_bind(n.from_actor_id)
                .push_bind(&n.message)
                .push_bind(&n.kind);
        });

        let result = query_builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn list_notifications(&self, actor_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        Ok(sqlx::query_as::<_, Notification>(
            "SELECT id, actor_id, from_actor_id, message, kind, read, created_at \
             FROM bc_notifications WHERE actor_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(actor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn unread_count(&self, actor_id: Uuid) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bc_notifications WHERE actor_id = $1 AND read = FALSE",
        )
        .bind(actor_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn mark_all_read(&self, actor_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE bc_notifications SET read = TRUE WHERE actor_id = $1 AND read = FALSE",
        )
        .bind(actor_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
