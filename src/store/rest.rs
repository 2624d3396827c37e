use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use url::Url;
use uuid::Uuid;

use super::Store;
use crate::errors::{AppError, Result};
use crate::models::{
    Actor, Badge, CheckIn, CheckInQuery, Like, NewActor, NewBadge, NewCheckIn, NewNotification,
    Notification,
};

type Params = Vec<(&'static str, String)>;

/// Rows requested per page. Servers may cap pages lower (max-rows), which
/// the `Content-Range` total accounts for.
const PAGE_SIZE: usize = 1000;

/// One page of rows plus the total from `Content-Range`, when the server
/// reports one.
struct Page<T> {
    rows: Vec<T>,
    total: Option<usize>,
}

/// Client for a PostgREST-style managed backend exposing the `bc_*` tables
/// under `/rest/v1/`.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let base_url = base_url.join("rest/v1/")?;

        let client = Client::builder()
            .user_agent("buzzcheck-backend")
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn request(&self, method: Method, table: &str, params: &[(&str, String)]) -> Result<RequestBuilder> {
        let mut url = self
            .base_url
            .join(table)
            .map_err(|e| AppError::UpstreamStatus(format!("Invalid table URL for {}: {}", table, e)))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }

        Ok(self
            .client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key))
    }

    async fn send(table: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!("❌ {} request failed with {}: {}", table, status, body);
        if status == StatusCode::CONFLICT {
            return Err(AppError::Conflict(format!("{} row already exists", table)));
        }
        Err(AppError::UpstreamStatus(format!("{} returned {}", table, status)))
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, params: Params) -> Result<Vec<T>> {
        let request = self.request(Method::GET, table, &params)?;
        Ok(Self::send(table, request).await?.json().await?)
    }

    /// Every row matching `params`, fetched page by page with
    /// `offset`/`limit`. `params` must carry a total `order`.
    async fn select_all<T: DeserializeOwned>(&self, table: &str, params: Params) -> Result<Vec<T>> {
        fetch_pages(PAGE_SIZE, |offset, limit| {
            let params = page_params(&params, offset, limit);
            async move {
                let request = self
                    .request(Method::GET, table, &params)?
                    .header("Prefer", "count=exact");
                let response = Self::send(table, request).await?;
                let total = response
                    .headers()
                    .get(header::CONTENT_RANGE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(parse_content_range_total)
                    .and_then(|total| usize::try_from(total).ok());
                let rows: Vec<T> = response.json().await?;
                Ok::<_, AppError>(Page { rows, total })
            }
        })
        .await
    }

    async fn select_one<T: DeserializeOwned>(&self, table: &str, mut params: Params) -> Result<Option<T>> {
        params.push(("limit", "1".to_string()));
        Ok(self.select(table, params).await?.into_iter().next())
    }

    /// Inserts and returns the stored rows. With `ignore_duplicates` a row
    /// hitting `on_conflict` is skipped instead of failing the request.
    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
        on_conflict: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut params = Params::new();
        let prefer = match on_conflict {
            Some(columns) => {
                params.push(("on_conflict", columns.to_string()));
                "resolution=ignore-duplicates,return=representation"
            }
            None => "return=representation",
        };

        let request = self
            .request(Method::POST, table, &params)?
            .header("Prefer", prefer)
            .json(body);
        Ok(Self::send(table, request).await?.json().await?)
    }

    /// Runs a PATCH or DELETE and returns the affected rows.
    async fn modify<T: DeserializeOwned>(
        &self,
        method: Method,
        table: &str,
        params: Params,
        body: Option<Value>,
    ) -> Result<Vec<T>> {
        let mut request = self
            .request(method, table, &params)?
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            request = request.json(&body);
        }
        Ok(Self::send(table, request).await?.json().await?)
    }

    async fn count(&self, table: &str, mut params: Params) -> Result<i64> {
        params.push(("select", "*".to_string()));
        let request = self
            .request(Method::HEAD, table, &params)?
            .header("Prefer", "count=exact");
        let response = Self::send(table, request).await?;

        let total = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);
        Ok(total.unwrap_or(0))
    }
}

fn eq(value: impl ToString) -> String {
    format!("eq.{}", value.to_string())
}

fn in_list(ids: &[Uuid]) -> String {
    let joined: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    format!("in.({})", joined.join(","))
}

/// Total from a `Content-Range` header such as `0-24/310` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<i64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

fn page_params(params: &Params, offset: usize, limit: usize) -> Params {
    let mut params = params.clone();
    params.push(("offset", offset.to_string()));
    params.push(("limit", limit.to_string()));
    params
}

/// Pulls pages until the reported total is reached. Without a total, a short
/// page ends the listing; an empty page always does.
async fn fetch_pages<T, F, Fut>(page_size: usize, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut rows = Vec::new();
    loop {
        let page = fetch_page(rows.len(), page_size).await?;
        let fetched = page.rows.len();
        rows.extend(page.rows);

        let done = match page.total {
            Some(total) => rows.len() >= total,
            None => fetched < page_size,
        };
        if fetched == 0 || done {
            break;
        }
        tracing::debug!("📄 Fetched {} rows so far, requesting next page", rows.len());
    }
    Ok(rows)
}

fn check_in_params(query: &CheckInQuery) -> Params {
    let mut params: Params = vec![("select", "*".to_string())];
    if let Some(ids) = &query.actor_ids {
        params.push(("actor_id", in_list(ids)));
    }
    if let Some(since) = query.since {
        params.push(("created_at", format!("gte.{}", since.to_rfc3339())));
    }
    if let Some(category) = query.category {
        params.push(("category", eq(category)));
    }
    if query.public_only {
        params.push(("is_private", eq(false)));
    }
    let direction = if query.newest_first { "desc" } else { "asc" };
    params.push(("order", format!("created_at.{0},id.{0}", direction)));
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    params
}

#[async_trait]
impl Store for RestStore {
    fn backend_name(&self) -> &'static str {
        "rest"
    }

    async fn create_actor(&self, actor: NewActor) -> Result<Actor> {
        let mut row = serde_json::to_value(&actor)
            .map_err(|e| AppError::BadRequest(format!("Invalid actor: {}", e)))?;
        row["id"] = json!(Uuid::new_v4());

        self.insert::<_, Actor>("bc_users", &row, None)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => {
                    AppError::Conflict(format!("Username '{}' is already taken", actor.username))
                }
                other => other,
            })?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::UpstreamStatus("bc_users insert returned no row".to_string()))
    }

    async fn get_actor(&self, id: Uuid) -> Result<Option<Actor>> {
        self.select_one("bc_users", vec![("select", "*".to_string()), ("id", eq(id))])
            .await
    }

    async fn list_actors(&self, ids: Option<&[Uuid]>) -> Result<Vec<Actor>> {
        let mut params: Params = vec![("select", "*".to_string()), ("order", "username.asc".to_string())];
        if let Some(ids) = ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            params.push(("id", in_list(ids)));
        }
        self.select_all("bc_users", params).await
    }

    async fn search_actors(&self, query: &str, exclude: Option<Uuid>, limit: i64) -> Result<Vec<Actor>> {
        // Reserved PostgREST characters would break the or=() filter.
        let needle: String = query
            .chars()
            .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '.'))
            .collect();
        let mut params: Params = vec![
            ("select", "*".to_string()),
            ("or", format!("(username.ilike.*{0}*,display_name.ilike.*{0}*)", needle)),
            ("order", "username.asc".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(exclude) = exclude {
            params.push(("id", format!("neq.{}", exclude)));
        }
        self.select("bc_users", params).await
    }

    async fn update_location(
        &self,
        id: Uuid,
        campus: Option<String>,
        city: Option<String>,
    ) -> Result<Option<Actor>> {
        let rows: Vec<Actor> = self
            .modify(
                Method::PATCH,
                "bc_users",
                vec![("id", eq(id))],
                Some(json!({ "campus": campus, "city": city })),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_check_in(&self, check_in: NewCheckIn) -> Result<CheckIn> {
        let mut row = serde_json::to_value(&check_in)
            .map_err(|e| AppError::BadRequest(format!("Invalid check-in: {}", e)))?;
        row["id"] = json!(Uuid::new_v4());

        self.insert::<_, CheckIn>("bc_posts", &row, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::UpstreamStatus("bc_posts insert returned no row".to_string()))
    }

    async fn get_check_in(&self, id: Uuid) -> Result<Option<CheckIn>> {
        self.select_one("bc_posts", vec![("select", "*".to_string()), ("id", eq(id))])
            .await
    }

    async fn list_check_ins(&self, query: &CheckInQuery) -> Result<Vec<CheckIn>> {
        let params = check_in_params(query);
        if query.limit.is_some() {
            self.select("bc_posts", params).await
        } else {
            self.select_all("bc_posts", params).await
        }
    }

    async fn list_badges(&self, actor_id: Uuid) -> Result<Vec<Badge>> {
        self.select_all(
            "bc_badges",
            vec![
                ("select", "*".to_string()),
                ("actor_id", eq(actor_id)),
                ("order", "earned_at.desc,id.desc".to_string()),
            ],
        )
        .await
    }

    async fn grant_badge(&self, badge: NewBadge) -> Result<Option<Badge>> {
        let mut row = serde_json::to_value(&badge)
            .map_err(|e| AppError::BadRequest(format!("Invalid badge: {}", e)))?;
        row["id"] = json!(Uuid::new_v4());

        let inserted: Vec<Badge> = self
            .insert("bc_badges", &row, Some("actor_id,badge_type,badge_name"))
            .await?;
        Ok(inserted.into_iter().next())
    }

    async fn follow(&self, follower: Uuid, target: Uuid) -> Result<bool> {
        if follower == target {
            return Err(AppError::BadRequest("Actors cannot follow themselves".to_string()));
        }
        let inserted: Vec<Value> = self
            .insert(
                "bc_follows",
                &json!({ "follower_id": follower, "following_id": target }),
                Some("follower_id,following_id"),
            )
            .await?;
        Ok(!inserted.is_empty())
    }

    async fn unfollow(&self, follower: Uuid, target: Uuid) -> Result<bool> {
        let removed: Vec<Value> = self
            .modify(
                Method::DELETE,
                "bc_follows",
                vec![("follower_id", eq(follower)), ("following_id", eq(target))],
                None,
            )
            .await?;
        Ok(!removed.is_empty())
    }

    async fn following_ids(&self, actor_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<Value> = self
            .select_all(
                "bc_follows",
                vec![
                    ("select", "following_id".to_string()),
                    ("follower_id", eq(actor_id)),
                    ("order", "following_id.asc".to_string()),
                ],
            )
            .await?;
        Ok(uuid_column(&rows, "following_id"))
    }

    async fn follower_ids(&self, actor_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<Value> = self
            .select_all(
                "bc_follows",
                vec![
                    ("select", "follower_id".to_string()),
                    ("following_id", eq(actor_id)),
                    ("order", "follower_id.asc".to_string()),
                ],
            )
            .await?;
        Ok(uuid_column(&rows, "follower_id"))
    }

    async fn like(&self, actor_id: Uuid, check_in_id: Uuid) -> Result<bool> {
        let inserted: Vec<Value> = self
            .insert(
                "bc_likes",
                &json!({ "actor_id": actor_id, "check_in_id": check_in_id }),
                Some("actor_id,check_in_id"),
            )
            .await?;
        Ok(!inserted.is_empty())
    }

    async fn unlike(&self, actor_id: Uuid, check_in_id: Uuid) -> Result<bool> {
        let removed: Vec<Value> = self
            .modify(
                Method::DELETE,
                "bc_likes",
                vec![("actor_id", eq(actor_id)), ("check_in_id", eq(check_in_id))],
                None,
            )
            .await?;
        Ok(!removed.is_empty())
    }

    async fn likes_for(&self, check_in_ids: &[Uuid]) -> Result<Vec<Like>> {
        if check_in_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select_all(
            "bc_likes",
            vec![
                ("select", "*".to_string()),
                ("check_in_id", in_list(check_in_ids)),
                ("order", "check_in_id.asc,actor_id.asc".to_string()),
            ],
        )
        .await
    }

    async fn insert_notifications(&self, notifications: Vec<NewNotification>) -> Result<usize> {
        if notifications.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Value> = notifications
            .iter()
            .map(|n| {
                json!({
                    "id": Uuid::new_v4(),
                    "actor_id": n.actor_id,
                    "from_actor_id": n.from_actor_id,
                    "message": n.message,
                    "kind": n.kind,
                })
            })
            .collect();

        let inserted: Vec<Value> = self.insert("bc_notifications", &rows, None).await?;
        Ok(inserted.len())
    }

    async fn list_notifications(&self, actor_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        self.select(
            "bc_notifications",
            vec![
                ("select", "*".to_string()),
                ("actor_id", eq(actor_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn unread_count(&self, actor_id: Uuid) -> Result<i64> {
        self.count(
            "bc_notifications",
            vec![("actor_id", eq(actor_id)), ("read", eq(false))],
        )
        .await
    }

    async fn mark_all_read(&self, actor_id: Uuid) -> Result<u64> {
        let updated: Vec<Value> = self
            .modify(
                Method::PATCH,
                "bc_notifications",
                vec![("actor_id", eq(actor_id)), ("read", eq(false))],
                Some(json!({ "read": true })),
            )
            .await?;
        Ok(updated.len() as u64)
    }
}

fn uuid_column(rows: &[Value], column: &str) -> Vec<Uuid> {
    rows.iter()
        .filter_map(|row| row.get(column)?.as_str()?.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DrinkCategory;

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range_total("0-24/310"), Some(310));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn check_in_filters_use_postgrest_operators() {
        let actor = Uuid::nil();
        let query = CheckInQuery {
            actor_ids: Some(vec![actor]),
            category: Some(DrinkCategory::Coffee),
            public_only: true,
            newest_first: true,
            limit: Some(20),
            ..CheckInQuery::default()
        };

        let params = check_in_params(&query);
        assert!(params.contains(&("actor_id", format!("in.({})", actor))));
        assert!(params.contains(&("category", "eq.coffee".to_string())));
        assert!(params.contains(&("is_private", "eq.false".to_string())));
        assert!(params.contains(&("order", "created_at.desc,id.desc".to_string())));
        assert!(params.contains(&("limit", "20".to_string())));
    }

    #[test]
    fn pages_append_offset_and_limit() {
        let query = CheckInQuery {
            public_only: true,
            ..CheckInQuery::default()
        };
        let base = check_in_params(&query);
        assert!(!base.iter().any(|(k, _)| *k == "limit"));

        let params = page_params(&base, 2000, PAGE_SIZE);
        assert!(params.contains(&("offset", "2000".to_string())));
        assert!(params.contains(&("limit", "1000".to_string())));
        assert!(params.contains(&("order", "created_at.asc,id.asc".to_string())));
    }

    /// Serves `rows` in pages no larger than `cap`, like a server with a
    /// max-rows setting, and records the requested offsets.
    async fn paged(rows: usize, cap: usize, report_total: bool) -> (Vec<usize>, Vec<usize>) {
        let offsets = std::sync::Mutex::new(Vec::new());
        let fetched = fetch_pages(PAGE_SIZE, |offset, limit| {
            offsets.lock().unwrap().push(offset);
            let end = rows.min(offset + limit.min(cap));
            let page = Page {
                rows: (offset..end).collect::<Vec<usize>>(),
                total: report_total.then_some(rows),
            };
            async move { Ok::<_, AppError>(page) }
        })
        .await
        .unwrap();
        (fetched, offsets.into_inner().unwrap())
    }

    #[tokio::test]
    async fn listings_past_one_page_are_complete() {
        let (rows, offsets) = paged(1500, PAGE_SIZE, true).await;
        assert_eq!(rows, (0..1500).collect::<Vec<_>>());
        assert_eq!(offsets, vec![0, 1000]);

        let (rows, offsets) = paged(2000, PAGE_SIZE, false).await;
        assert_eq!(rows.len(), 2000);
        assert_eq!(offsets, vec![0, 1000, 2000]);
    }

    #[tokio::test]
    async fn server_row_cap_below_page_size_still_completes() {
        let (rows, offsets) = paged(1500, 500, true).await;
        assert_eq!(rows, (0..1500).collect::<Vec<_>>());
        assert_eq!(offsets, vec![0, 500, 1000]);
    }

    #[tokio::test]
    async fn page_errors_propagate() {
        let result: Result<Vec<u8>> = fetch_pages(PAGE_SIZE, |_, _| async {
            Err::<Page<u8>, _>(AppError::UpstreamStatus("bc_posts returned 503".to_string()))
        })
        .await;
        assert!(matches!(result, Err(AppError::UpstreamStatus(_))));
    }

    #[test]
    fn base_url_gains_rest_prefix() {
        let store = RestStore::new("https://example.supabase.co", "key").unwrap();
        assert_eq!(store.base_url.as_str(), "https://example.supabase.co/rest/v1/");
        let url = store.base_url.join("bc_posts").unwrap();
        assert_eq!(url.as_str(), "https://example.supabase.co/rest/v1/bc_posts");
    }
}
