use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use super::aggregator::{
    actor_group_map, actor_name_map, actors_in_group, compute_since, try_aggregate_by_actor_within_group,
    try_aggregate_by_group,
};
use crate::cache::ACTOR_DIRECTORY_KEY;
use crate::errors::Result;
use crate::models::{
    Actor, ActorLeaderboardParams, ActorLeaderboardResponse, CheckIn, CheckInQuery, DrinkCategory,
    GroupDimension, GroupLeaderboardResponse, LeaderboardParams, Period, RankedActorEntry,
};
use crate::sequencer::{Ticket, View};
use crate::AppState;

/// Actor directory, served from the TTL cache when warm. A failed fetch
/// degrades to an empty directory.
pub async fn load_directory(state: &AppState) -> Vec<Actor> {
    if let Some(actors) = state.cache.get::<Vec<Actor>>(ACTOR_DIRECTORY_KEY) {
        tracing::debug!("📦 Actor directory cache hit ({} actors)", actors.len());
        return actors;
    }

    match state.store.list_actors(None).await {
        Ok(actors) => {
            if let Err(e) = state.cache.set(ACTOR_DIRECTORY_KEY, &actors) {
                tracing::warn!("Failed to cache actor directory: {}", e);
            }
            actors
        }
        Err(e) => {
            tracing::warn!("⚠️ Actor directory unavailable, ranking without groups: {}", e);
            Vec::new()
        }
    }
}

/// Events from `since` on. Private check-ins are left out unless the
/// service is configured to count them; this is the only place that
/// decision is made.
async fn load_events(state: &AppState, since: DateTime<Utc>) -> Vec<CheckIn> {
    let query = CheckInQuery {
        since: Some(since),
        public_only: !state.config.include_private,
        ..CheckInQuery::default()
    };

    match state.store.list_check_ins(&query).await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("⚠️ Check-in fetch failed, returning empty leaderboard: {}", e);
            Vec::new()
        }
    }
}

fn begin(state: &AppState, view: View, client_id: Option<&str>, seq: Option<u64>) -> Result<Option<Ticket>> {
    client_id
        .map(|client| state.sequencer.begin(client, view, seq))
        .transpose()
}

fn finish(state: &AppState, ticket: &Option<Ticket>) -> Result<Option<u64>> {
    match ticket {
        Some(ticket) => {
            state.sequencer.check(ticket)?;
            Ok(Some(ticket.generation))
        }
        None => Ok(None),
    }
}

fn window(state: &AppState, period: Period) -> DateTime<FixedOffset> {
    compute_since(period, state.config.now())
}

pub async fn group_leaderboard(state: &AppState, params: LeaderboardParams) -> Result<GroupLeaderboardResponse> {
    let ticket = begin(state, View::Groups, params.client_id.as_deref(), params.seq)?;
    let since = window(state, params.period);

    let directory = load_directory(state).await;
    let events = load_events(state, since.with_timezone(&Utc)).await;
    let groups = actor_group_map(&directory, params.dimension);

    let (entries, empty_reason) = match try_aggregate_by_group(
        &events,
        &groups,
        since.with_timezone(&Utc),
        params.category,
        state.config.leaderboard_limit,
    ) {
        Ok(entries) => (entries, None),
        Err(reason) => (Vec::new(), Some(reason)),
    };

    let generation = finish(state, &ticket)?;
    tracing::info!(
        period = ?params.period,
        dimension = ?params.dimension,
        category = ?params.category,
        entries = entries.len(),
        "📊 Group leaderboard computed"
    );

    Ok(GroupLeaderboardResponse {
        period: params.period,
        dimension: params.dimension,
        category: params.category,
        since,
        generation,
        entries,
        empty_reason,
    })
}

struct ActorRanking {
    since: DateTime<FixedOffset>,
    entries: Vec<RankedActorEntry>,
    empty_reason: Option<crate::models::EmptyReason>,
}

async fn rank_actors(
    state: &AppState,
    period: Period,
    category: Option<DrinkCategory>,
    scope: Option<(GroupDimension, &str)>,
) -> ActorRanking {
    let since = window(state, period);
    let directory = load_directory(state).await;
    let events = load_events(state, since.with_timezone(&Utc)).await;

    let names = actor_name_map(&directory);
    let members: Option<HashSet<Uuid>> =
        scope.map(|(dimension, group)| actors_in_group(&directory, dimension, group));

    match try_aggregate_by_actor_within_group(
        &events,
        &names,
        members.as_ref(),
        since.with_timezone(&Utc),
        category,
        state.config.leaderboard_limit,
    ) {
        Ok(entries) => ActorRanking { since, entries, empty_reason: None },
        Err(reason) => ActorRanking { since, entries: Vec::new(), empty_reason: Some(reason) },
    }
}

/// Drill-down from a group row to the actors inside it.
pub async fn drill_down(
    state: &AppState,
    group_name: &str,
    params: LeaderboardParams,
) -> Result<ActorLeaderboardResponse> {
    let ticket = begin(state, View::DrillDown, params.client_id.as_deref(), params.seq)?;
    let ranking = rank_actors(
        state,
        params.period,
        params.category,
        Some((params.dimension, group_name)),
    )
    .await;
    let generation = finish(state, &ticket)?;

    tracing::info!(group = group_name, entries = ranking.entries.len(), "📊 Drill-down computed");
    Ok(ActorLeaderboardResponse {
        period: params.period,
        group_name: Some(group_name.to_string()),
        category: params.category,
        since: ranking.since,
        generation,
        entries: ranking.entries,
        empty_reason: ranking.empty_reason,
    })
}

/// Global actor ranking, optionally limited to one city.
pub async fn actor_leaderboard(state: &AppState, params: ActorLeaderboardParams) -> Result<ActorLeaderboardResponse> {
    let ticket = begin(state, View::Actors, params.client_id.as_deref(), params.seq)?;
    let city = params
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let ranking = rank_actors(
        state,
        params.period,
        params.category,
        city.map(|c| (GroupDimension::City, c)),
    )
    .await;
    let generation = finish(state, &ticket)?;

    Ok(ActorLeaderboardResponse {
        period: params.period,
        group_name: city.map(str::to_string),
        category: params.category,
        since: ranking.since,
        generation,
        entries: ranking.entries,
        empty_reason: ranking.empty_reason,
    })
}
