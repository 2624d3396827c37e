use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    ActorStats, BreakdownParams, BreakdownResponse, CheckIn, CheckInQuery, CountedLabel,
    DrinkCategory, StatsPeriod,
};
use crate::errors::AppError;
use crate::AppState;

const UNKNOWN_BRAND: &str = "Unknown";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id/stats", get(get_actor_stats))
        .route("/:id/stats/breakdown", get(get_breakdown))
}

/// Local midnight of `now`'s day.
fn start_of_day(now: DateTime<FixedOffset>) -> DateTime<Utc> {
    let elapsed = Duration::seconds(i64::from(now.num_seconds_from_midnight()))
        + Duration::nanoseconds(i64::from(now.nanosecond() % 1_000_000_000));
    (now - elapsed).with_timezone(&Utc)
}

fn period_start(period: StatsPeriod, now: DateTime<FixedOffset>) -> Option<DateTime<Utc>> {
    match period {
        StatsPeriod::Today => Some(start_of_day(now)),
        StatsPeriod::Week => Some((now - Duration::days(7)).with_timezone(&Utc)),
        StatsPeriod::AllTime => None,
    }
}

/// Private check-ins count toward the actor's own stats.
async fn actor_check_ins(state: &AppState, id: Uuid) -> Result<Vec<CheckIn>, AppError> {
    if state.store.get_actor(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Actor {} not found", id)));
    }
    Ok(state
        .store
        .list_check_ins(&CheckInQuery {
            actor_ids: Some(vec![id]),
            newest_first: true,
            ..CheckInQuery::default()
        })
        .await?)
}

fn count_since(check_ins: &[CheckIn], since: Option<DateTime<Utc>>) -> i64 {
    check_ins
        .iter()
        .filter(|c| since.map_or(true, |since| c.created_at >= since))
        .count() as i64
}

/// GET /api/actors/:id/stats - Today / last 7 days / all-time check-in counts
pub async fn get_actor_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActorStats>, AppError> {
    let check_ins = actor_check_ins(&state, id).await?;
    let now = state.config.now();

    Ok(Json(ActorStats {
        actor_id: id,
        today: count_since(&check_ins, period_start(StatsPeriod::Today, now)),
        week: count_since(&check_ins, period_start(StatsPeriod::Week, now)),
        all_time: check_ins.len() as i64,
    }))
}

/// Counts grouped by category, brand and drink name, largest first.
pub fn compute_breakdown(check_ins: &[CheckIn], period: StatsPeriod) -> BreakdownResponse {
    let mut by_type: HashMap<DrinkCategory, i64> = HashMap::new();
    let mut by_brand: HashMap<String, i64> = HashMap::new();
    let mut by_product: HashMap<String, i64> = HashMap::new();

    for check_in in check_ins {
        *by_type.entry(check_in.category).or_default() += 1;
        let brand = check_in
            .brand
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(UNKNOWN_BRAND);
        *by_brand.entry(brand.to_string()).or_default() += 1;
        *by_product.entry(check_in.drink_name.clone()).or_default() += 1;
    }

    let mut by_type: Vec<(DrinkCategory, i64)> = by_type.into_iter().collect();
    by_type.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    BreakdownResponse {
        title: period.title().to_string(),
        by_type,
        by_brand: sorted_labels(by_brand),
        by_product: sorted_labels(by_product),
    }
}

fn sorted_labels(counts: HashMap<String, i64>) -> Vec<CountedLabel> {
    let mut labels: Vec<CountedLabel> = counts
        .into_iter()
        .map(|(label, count)| CountedLabel { label, count })
        .collect();
    labels.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    labels
}

/// GET /api/actors/:id/stats/breakdown?period=today|week|all_time
pub async fn get_breakdown(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<BreakdownParams>,
) -> Result<Json<BreakdownResponse>, AppError> {
    let period = params.period.unwrap_or(StatsPeriod::AllTime);
    let since = period_start(period, state.config.now());

    let check_ins: Vec<CheckIn> = actor_check_ins(&state, id)
        .await?
        .into_iter()
        .filter(|c| since.map_or(true, |since| c.created_at >= since))
        .collect();

    Ok(Json(compute_breakdown(&check_ins, period)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn check_in(category: DrinkCategory, brand: Option<&str>, name: &str) -> CheckIn {
        CheckIn {
            id: Uuid::new_v4(),
            actor_id: Uuid::nil(),
            drink_name: name.to_string(),
            category,
            brand: brand.map(str::to_string),
            product: None,
            flavor: None,
            caption: None,
            photo_url: None,
            rating: None,
            city: None,
            is_private: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn breakdown_sorts_largest_first() {
        let check_ins = vec![
            check_in(DrinkCategory::Coffee, Some("Starbucks"), "Latte"),
            check_in(DrinkCategory::Coffee, Some("Starbucks"), "Latte"),
            check_in(DrinkCategory::EnergyDrink, None, "Mystery Can"),
        ];

        let breakdown = compute_breakdown(&check_ins, StatsPeriod::Week);
        assert_eq!(breakdown.title, "This Week's Breakdown");
        assert_eq!(breakdown.by_type[0], (DrinkCategory::Coffee, 2));
        assert_eq!(breakdown.by_brand[0], CountedLabel { label: "Starbucks".into(), count: 2 });
        assert_eq!(breakdown.by_brand[1].label, UNKNOWN_BRAND);
        assert_eq!(breakdown.by_product[0].label, "Latte");
    }

    #[test]
    fn today_starts_at_local_midnight() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2026, 7, 4, 1, 15, 0).unwrap();
        assert_eq!(
            start_of_day(now),
            Utc.with_ymd_and_hms(2026, 7, 3, 22, 0, 0).unwrap()
        );
    }
}
