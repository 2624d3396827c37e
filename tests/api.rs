use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use buzzcheck_backend::{
    app,
    config::Config,
    errors::{AppError, Result},
    models::{
        Actor, Badge, CheckIn, CheckInQuery, DrinkCategory, Like, NewActor, NewBadge, NewCheckIn,
        NewNotification, Notification,
    },
    store::{MemoryStore, Store},
    AppState,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = Config {
            smack_talk_chance: 0.0,
            ..config
        };
        let router = app(AppState::new(store.clone() as Arc<dyn Store>, config));
        Self { router, store }
    }

    async fn actor(&self, username: &str, display_name: &str, city: Option<&str>) -> Actor {
        self.store
            .create_actor(NewActor {
                username: username.to_string(),
                display_name: Some(display_name.to_string()),
                campus: None,
                city: city.map(str::to_string),
                avatar_url: None,
            })
            .await
            .expect("create actor")
    }

    async fn seed(&self, actor: &Actor, category: DrinkCategory, count: usize, is_private: bool) {
        for i in 0..count {
            self.store
                .seed_check_in(CheckIn {
                    id: Uuid::new_v4(),
                    actor_id: actor.id,
                    drink_name: "Seeded".to_string(),
                    category,
                    brand: None,
                    product: None,
                    flavor: None,
                    caption: None,
                    photo_url: None,
                    rating: None,
                    city: actor.city.clone(),
                    is_private,
                    created_at: Utc::now() - Duration::hours(i as i64 + 1),
                })
                .await;
        }
    }

    async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }
}

fn summarize(entries: &Value, name_key: &str) -> Vec<(String, u64, u64)> {
    entries
        .as_array()
        .expect("entries array")
        .iter()
        .map(|e| {
            (
                e[name_key].as_str().unwrap_or_default().to_string(),
                e["event_count"].as_u64().unwrap_or_default(),
                e["rank"].as_u64().unwrap_or_default(),
            )
        })
        .collect()
}

/// A (Chicago, 5 coffee), B (Chicago, 3 energy), C (Austin, 10 coffee).
async fn scenario() -> (TestApp, Actor, Actor, Actor) {
    let app = TestApp::new();
    let a = app.actor("alpha", "A", Some("Chicago")).await;
    let b = app.actor("bravo", "B", Some("Chicago")).await;
    let c = app.actor("charlie", "C", Some("Austin")).await;
    app.seed(&a, DrinkCategory::Coffee, 5, false).await;
    app.seed(&b, DrinkCategory::EnergyDrink, 3, false).await;
    app.seed(&c, DrinkCategory::Coffee, 10, false).await;
    (app, a, b, c)
}

#[tokio::test]
async fn health_reports_backend() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn city_leaderboard_ranks_groups() {
    let (app, ..) = scenario().await;

    let (status, body) = app.get("/api/leaderboard/groups?period=week&dimension=city").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        summarize(&body["entries"], "group_name"),
        vec![("Austin".into(), 10, 1), ("Chicago".into(), 8, 2)]
    );
    assert_eq!(body["entries"][1]["distinct_actor_count"], 2);
    assert!(body["empty_reason"].is_null());

    let (_, body) = app
        .get("/api/leaderboard/groups?period=week&dimension=city&category=coffee")
        .await;
    assert_eq!(
        summarize(&body["entries"], "group_name"),
        vec![("Austin".into(), 10, 1), ("Chicago".into(), 5, 2)]
    );
}

#[tokio::test]
async fn drill_down_lists_group_members() {
    let (app, a, b, _) = scenario().await;

    let (status, body) = app
        .get("/api/leaderboard/groups/Chicago/actors?period=week&dimension=city")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        summarize(&body["entries"], "display_name"),
        vec![("A".into(), 5, 1), ("B".into(), 3, 2)]
    );
    assert_eq!(body["entries"][0]["actor_id"], a.id.to_string());
    assert_eq!(body["entries"][1]["actor_id"], b.id.to_string());
    assert_eq!(body["group_name"], "Chicago");
}

#[tokio::test]
async fn actor_leaderboard_can_scope_to_city() {
    let (app, ..) = scenario().await;

    let (_, global) = app.get("/api/leaderboard/actors?period=month").await;
    assert_eq!(
        summarize(&global["entries"], "display_name"),
        vec![("C".into(), 10, 1), ("A".into(), 5, 2), ("B".into(), 3, 3)]
    );

    let (_, austin) = app.get("/api/leaderboard/actors?period=month&city=Austin").await;
    assert_eq!(summarize(&austin["entries"], "display_name"), vec![("C".into(), 10, 1)]);
}

#[tokio::test]
async fn empty_leaderboard_explains_itself() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/leaderboard/groups").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"], json!([]));
    assert_eq!(body["empty_reason"], "no_events");

    let (app, ..) = scenario().await;
    let (_, body) = app.get("/api/leaderboard/groups?dimension=city&category=electrolytes").await;
    assert_eq!(body["empty_reason"], "category_mismatch");

    // Nobody in the scenario has a campus.
    let (_, body) = app.get("/api/leaderboard/groups?dimension=campus").await;
    assert_eq!(body["empty_reason"], "no_grouped_actors");
}

#[tokio::test]
async fn private_check_ins_are_not_counted() {
    let (app, _, _, c) = scenario().await;
    app.seed(&c, DrinkCategory::Coffee, 4, true).await;

    let (_, body) = app.get("/api/leaderboard/groups?dimension=city").await;
    assert_eq!(body["entries"][0]["event_count"], 10);
}

#[tokio::test]
async fn private_check_ins_count_when_enabled() {
    let app = TestApp::with_config(Config {
        include_private: true,
        ..Config::default()
    });
    let d = app.actor("delta", "D", Some("Durham, NC")).await;
    app.seed(&d, DrinkCategory::Coffee, 1, false).await;
    app.seed(&d, DrinkCategory::Coffee, 1, true).await;

    let (_, body) = app.get("/api/leaderboard/groups?dimension=city").await;
    assert_eq!(
        summarize(&body["entries"], "group_name"),
        vec![("Durham, NC".into(), 2, 1)]
    );

    let (_, body) = app.get("/api/leaderboard/actors").await;
    assert_eq!(body["entries"][0]["event_count"], 2);
}

#[tokio::test]
async fn superseded_sequence_numbers_are_rejected() {
    let (app, ..) = scenario().await;

    let (status, body) = app
        .get("/api/leaderboard/groups?dimension=city&client_id=phone&seq=2")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generation"], 2);

    let (status, body) = app
        .get("/api/leaderboard/groups?dimension=city&client_id=phone&seq=1")
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "superseded");
    assert_eq!(body["latest"], 2);

    let (status, body) = app.get("/api/leaderboard/groups?dimension=city&client_id=phone").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generation"], 3);
}

#[tokio::test]
async fn boards_sequence_independently_per_client() {
    let (app, ..) = scenario().await;

    let (status, _) = app
        .get("/api/leaderboard/groups?dimension=city&client_id=phone&seq=5")
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .get("/api/leaderboard/groups/Chicago/actors?dimension=city&client_id=phone&seq=1")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generation"], 1);

    let (status, _) = app
        .get("/api/leaderboard/groups/Austin/actors?dimension=city&client_id=phone&seq=1")
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

/// Every call fails, as an unreachable backend would.
struct UnavailableStore;

fn unavailable<T>() -> Result<T> {
    Err(AppError::UpstreamStatus("backend unavailable".to_string()))
}

#[async_trait]
impl Store for UnavailableStore {
    fn backend_name(&self) -> &'static str {
        "unavailable"
    }
    async fn create_actor(&self, _: NewActor) -> Result<Actor> {
        unavailable()
    }
    async fn get_actor(&self, _: Uuid) -> Result<Option<Actor>> {
        unavailable()
    }
    async fn list_actors(&self, _: Option<&[Uuid]>) -> Result<Vec<Actor>> {
        unavailable()
    }
    async fn search_actors(&self, _: &str, _: Option<Uuid>, _: i64) -> Result<Vec<Actor>> {
        unavailable()
    }
    async fn update_location(&self, _: Uuid, _: Option<String>, _: Option<String>) -> Result<Option<Actor>> {
        unavailable()
    }
    async fn insert_check_in(&self, _: NewCheckIn) -> Result<CheckIn> {
        unavailable()
    }
    async fn get_check_in(&self, _: Uuid) -> Result<Option<CheckIn>> {
        unavailable()
    }
    async fn list_check_ins(&self, _: &CheckInQuery) -> Result<Vec<CheckIn>> {
        unavailable()
    }
    async fn list_badges(&self, _: Uuid) -> Result<Vec<Badge>> {
        unavailable()
    }
    async fn grant_badge(&self, _: NewBadge) -> Result<Option<Badge>> {
        unavailable()
    }
    async fn follow(&self, _: Uuid, _: Uuid) -> Result<bool> {
        unavailable()
    }
    async fn unfollow(&self, _: Uuid, _: Uuid) -> Result<bool> {
        unavailable()
    }
    async fn following_ids(&self, _: Uuid) -> Result<Vec<Uuid>> {
        unavailable()
    }
    async fn follower_ids(&self, _: Uuid) -> Result<Vec<Uuid>> {
        unavailable()
    }
    async fn like(&self, _: Uuid, _: Uuid) -> Result<bool> {
        unavailable()
    }
    async fn unlike(&self, _: Uuid, _: Uuid) -> Result<bool> {
        unavailable()
    }
    async fn likes_for(&self, _: &[Uuid]) -> Result<Vec<Like>> {
        unavailable()
    }
    async fn insert_notifications(&self, _: Vec<NewNotification>) -> Result<usize> {
        unavailable()
    }
    async fn list_notifications(&self, _: Uuid, _: i64) -> Result<Vec<Notification>> {
        unavailable()
    }
    async fn unread_count(&self, _: Uuid) -> Result<i64> {
        unavailable()
    }
    async fn mark_all_read(&self, _: Uuid) -> Result<u64> {
        unavailable()
    }
}

#[tokio::test]
async fn leaderboards_degrade_to_empty_when_backend_fails() {
    let router = app(AppState::new(Arc::new(UnavailableStore), Config::default()));
    let get = |uri: &'static str| {
        let router = router.clone();
        async move {
            let request = Request::builder().uri(uri).body(Body::empty()).expect("build request");
            let response = router.oneshot(request).await.expect("response");
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("read body");
            (status, serde_json::from_slice::<Value>(&bytes).expect("json body"))
        }
    };

    for uri in [
        "/api/leaderboard/groups?dimension=city",
        "/api/leaderboard/groups/Chicago/actors?dimension=city",
        "/api/leaderboard/actors",
    ] {
        let (status, body) = get(uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body["entries"], json!([]), "{}", uri);
        assert_eq!(body["empty_reason"], "no_events", "{}", uri);
    }

    // Outside the leaderboards the failure surfaces.
    let (status, _) = get("/api/map/cities").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn check_in_grants_milestones_once() {
    let app = TestApp::new();
    let (status, actor) = app
        .post("/api/actors", json!({ "username": "sipper", "campus": "Duke" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let actor_id = actor["id"].as_str().expect("actor id").to_string();

    let check_in = json!({
        "actor_id": actor_id,
        "category": "coffee",
        "brand": "Stumptown",
        "product": "Cold Brew",
        "flavor": "Original",
        "rating": 5
    });
    let (status, body) = app.post("/api/checkins", check_in.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["check_in"]["drink_name"], "Cold Brew - Original");
    assert_eq!(body["check_in"]["city"], "Durham, NC");
    let names: Vec<&str> = body["new_badges"]
        .as_array()
        .expect("badges")
        .iter()
        .filter_map(|b| b["badge_name"].as_str())
        .collect();
    assert!(names.contains(&"First Coffee"));

    let (_, body) = app.post("/api/checkins", check_in).await;
    let again: Vec<&str> = body["new_badges"]
        .as_array()
        .expect("badges")
        .iter()
        .filter_map(|b| b["badge_name"].as_str())
        .collect();
    assert!(!again.contains(&"First Coffee"));

    let (status, body) = app
        .post(&format!("/api/actors/{}/badges/evaluate", actor_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["granted"], json!([]));
    assert_eq!(body["longest_streak"], 1);

    let (_, badges) = app.get(&format!("/api/actors/{}/badges", actor_id)).await;
    let first_coffee = badges
        .as_array()
        .expect("badges")
        .iter()
        .filter(|b| b["badge_name"] == "First Coffee")
        .count();
    assert_eq!(first_coffee, 1);
}

#[tokio::test]
async fn check_in_validation_and_lookup() {
    let app = TestApp::new();
    let (status, _) = app
        .post(
            "/api/checkins",
            json!({ "actor_id": Uuid::new_v4(), "category": "coffee", "brand": "X" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let actor = app.actor("rater", "Rater", None).await;
    let (status, body) = app
        .post(
            "/api/checkins",
            json!({ "actor_id": actor.id, "category": "coffee", "brand": "X", "rating": 9 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = TestApp::new();
    let (status, _) = app.post("/api/actors", json!({ "username": "taken" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post("/api/actors", json!({ "username": "taken" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn campus_change_moves_actor_between_groups() {
    let (app, a, ..) = scenario().await;

    // Warm the directory cache first.
    let (_, before) = app.get("/api/leaderboard/groups?dimension=city").await;
    assert_eq!(before["entries"][1]["event_count"], 8);

    let (status, updated) = app
        .request(
            "PUT",
            &format!("/api/actors/{}/campus", a.id),
            Some(json!({ "campus": "Stanford", "city": "Austin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["city"], "Austin");

    let (_, after) = app.get("/api/leaderboard/groups?dimension=city").await;
    assert_eq!(
        summarize(&after["entries"], "group_name"),
        vec![("Austin".into(), 15, 1), ("Chicago".into(), 3, 2)]
    );
}

#[tokio::test]
async fn feed_hides_other_actors_private_check_ins() {
    let app = TestApp::new();
    let author = app.actor("author", "Author", Some("Chicago")).await;
    let reader = app.actor("reader", "Reader", Some("Chicago")).await;
    app.seed(&author, DrinkCategory::Coffee, 2, false).await;
    app.seed(&author, DrinkCategory::Coffee, 1, true).await;

    let (_, feed) = app.get(&format!("/api/feed?viewer_id={}", reader.id)).await;
    assert_eq!(feed.as_array().expect("feed").len(), 2);

    let (_, own) = app.get(&format!("/api/feed?viewer_id={}", author.id)).await;
    assert_eq!(own.as_array().expect("feed").len(), 3);
    assert_eq!(own[0]["author"]["username"], "author");

    let check_in_id = feed[0]["id"].as_str().expect("id").to_string();
    let (status, _) = app
        .post(&format!("/api/checkins/{}/like/{}", check_in_id, reader.id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, feed) = app.get(&format!("/api/feed?viewer_id={}", reader.id)).await;
    let liked = feed
        .as_array()
        .expect("feed")
        .iter()
        .find(|item| item["id"] == check_in_id.as_str())
        .expect("liked item");
    assert_eq!(liked["like_count"], 1);
    assert_eq!(liked["liked_by_viewer"], true);
}

#[tokio::test]
async fn following_and_notifications() {
    let app = TestApp::new();
    let fan = app.actor("fan", "Fan", None).await;
    let star = app.actor("star", "Star", None).await;

    let (status, body) = app
        .post(&format!("/api/actors/{}/follow/{}", fan.id, star.id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);

    let (_, followers) = app.get(&format!("/api/actors/{}/followers", star.id)).await;
    assert_eq!(followers[0]["username"], "fan");

    let (status, _) = app
        .post(&format!("/api/actors/{}/follow/{}", fan.id, fan.id), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, unread) = app.get(&format!("/api/actors/{}/notifications/unread", fan.id)).await;
    assert_eq!(unread["unread"], 0);
}
