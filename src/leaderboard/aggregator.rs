//! Ranked views over check-in events.
//!
//! Everything here is a pure, synchronous transformation of snapshots the
//! caller already fetched. Nothing fails: actors without a group, unknown
//! names and empty inputs degrade to smaller (or empty) rankings.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::data::cities::city_from_campus;
use crate::models::{
    Actor, CheckIn, DrinkCategory, EmptyReason, GroupDimension, Period, RankedActorEntry,
    RankedGroupEntry,
};

/// Rankings are cut to this many entries unless configured otherwise.
pub const DEFAULT_LIMIT: usize = 50;

/// Label used when an actor has no known name.
pub const UNKNOWN_ACTOR: &str = "?";

/// Start of the window for `period`, relative to `now`.
///
/// `Week` and `Month` are trailing 7 and 30 days. `Year` is January 1,
/// 00:00, in the offset `now` carries.
pub fn compute_since(period: Period, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    match period {
        Period::Week => now - Duration::days(7),
        Period::Month => now - Duration::days(30),
        Period::Year => {
            // Fixed offsets have no DST gaps, so stepping back by the elapsed
            // time of the year always lands on local midnight of Jan 1.
            now - Duration::days(i64::from(now.ordinal0()))
                - Duration::seconds(i64::from(now.num_seconds_from_midnight()))
                - Duration::nanoseconds(i64::from(now.nanosecond() % 1_000_000_000))
        }
    }
}

/// Counts what survived each filter stage, to explain an empty result.
#[derive(Debug, Default)]
struct FilterTrace {
    total: usize,
    in_window: usize,
    in_category: usize,
}

impl FilterTrace {
    fn reason(&self, final_stage: EmptyReason) -> EmptyReason {
        if self.total == 0 {
            EmptyReason::NoEvents
        } else if self.in_window == 0 {
            EmptyReason::OutsideWindow
        } else if self.in_category == 0 {
            EmptyReason::CategoryMismatch
        } else {
            final_stage
        }
    }
}

/// Window and category filtering shared by both rankings.
fn qualifying<'a>(
    events: &'a [CheckIn],
    since: DateTime<Utc>,
    category_filter: Option<DrinkCategory>,
    trace: &mut FilterTrace,
) -> Vec<&'a CheckIn> {
    trace.total = events.len();
    let mut kept = Vec::with_capacity(events.len());
    for event in events {
        if event.created_at < since {
            continue;
        }
        trace.in_window += 1;
        if category_filter.is_some_and(|category| category != event.category) {
            continue;
        }
        trace.in_category += 1;
        kept.push(event);
    }
    kept
}

fn rank_groups(
    events: &[CheckIn],
    actor_group_map: &HashMap<Uuid, String>,
    since: DateTime<Utc>,
    category_filter: Option<DrinkCategory>,
    limit: usize,
) -> (Vec<RankedGroupEntry>, FilterTrace) {
    let mut trace = FilterTrace::default();
    let mut groups: HashMap<&str, (u64, HashSet<Uuid>)> = HashMap::new();

    for event in qualifying(events, since, category_filter, &mut trace) {
        let Some(group) = actor_group_map.get(&event.actor_id) else {
            continue;
        };
        let (count, actors) = groups.entry(group.as_str()).or_default();
        *count += 1;
        actors.insert(event.actor_id);
    }

    let mut entries: Vec<RankedGroupEntry> = groups
        .into_iter()
        .map(|(group_name, (event_count, actors))| RankedGroupEntry {
            group_name: group_name.to_string(),
            event_count,
            distinct_actor_count: actors.len() as u64,
            rank: 0,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.event_count
            .cmp(&a.event_count)
            .then_with(|| a.group_name.cmp(&b.group_name))
    });
    entries.truncate(limit);
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.rank = position as u32 + 1;
    }

    (entries, trace)
}

fn rank_actors(
    events: &[CheckIn],
    actor_name_map: &HashMap<Uuid, String>,
    actors_in_group: Option<&HashSet<Uuid>>,
    since: DateTime<Utc>,
    category_filter: Option<DrinkCategory>,
    limit: usize,
) -> (Vec<RankedActorEntry>, FilterTrace) {
    let mut trace = FilterTrace::default();
    let mut counts: HashMap<Uuid, u64> = HashMap::new();

    for event in qualifying(events, since, category_filter, &mut trace) {
        if actors_in_group.is_some_and(|members| !members.contains(&event.actor_id)) {
            continue;
        }
        *counts.entry(event.actor_id).or_default() += 1;
    }

    let mut entries: Vec<RankedActorEntry> = counts
        .into_iter()
        .map(|(actor_id, event_count)| RankedActorEntry {
            actor_id,
            display_name: actor_name_map
                .get(&actor_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_ACTOR.to_string()),
            event_count,
            rank: 0,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.event_count
            .cmp(&a.event_count)
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.actor_id.cmp(&b.actor_id))
    });
    entries.truncate(limit);
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.rank = position as u32 + 1;
    }

    (entries, trace)
}

/// Totals per group, densely ranked by event count, top 50.
pub fn aggregate_by_group(
    events: &[CheckIn],
    actor_group_map: &HashMap<Uuid, String>,
    since: DateTime<Utc>,
    category_filter: Option<DrinkCategory>,
) -> Vec<RankedGroupEntry> {
    rank_groups(events, actor_group_map, since, category_filter, DEFAULT_LIMIT).0
}

/// Like [`aggregate_by_group`], with an explicit limit and the reason an
/// empty ranking is empty.
pub fn try_aggregate_by_group(
    events: &[CheckIn],
    actor_group_map: &HashMap<Uuid, String>,
    since: DateTime<Utc>,
    category_filter: Option<DrinkCategory>,
    limit: usize,
) -> Result<Vec<RankedGroupEntry>, EmptyReason> {
    let (entries, trace) = rank_groups(events, actor_group_map, since, category_filter, limit);
    if entries.is_empty() {
        Err(trace.reason(EmptyReason::NoGroupedActors))
    } else {
        Ok(entries)
    }
}

/// Drill-down: top actors inside one group.
pub fn aggregate_by_actor_within_group(
    events: &[CheckIn],
    actor_name_map: &HashMap<Uuid, String>,
    group_name: &str,
    actors_in_group: &HashSet<Uuid>,
    since: DateTime<Utc>,
    category_filter: Option<DrinkCategory>,
) -> Vec<RankedActorEntry> {
    tracing::debug!(group = group_name, members = actors_in_group.len(), "ranking actors within group");
    rank_actors(
        events,
        actor_name_map,
        Some(actors_in_group),
        since,
        category_filter,
        DEFAULT_LIMIT,
    )
    .0
}

pub fn try_aggregate_by_actor_within_group(
    events: &[CheckIn],
    actor_name_map: &HashMap<Uuid, String>,
    actors_in_group: Option<&HashSet<Uuid>>,
    since: DateTime<Utc>,
    category_filter: Option<DrinkCategory>,
    limit: usize,
) -> Result<Vec<RankedActorEntry>, EmptyReason> {
    let (entries, trace) = rank_actors(
        events,
        actor_name_map,
        actors_in_group,
        since,
        category_filter,
        limit,
    );
    if entries.is_empty() {
        Err(trace.reason(EmptyReason::NoActorsInGroup))
    } else {
        Ok(entries)
    }
}

/// Group key of an actor along `dimension`. City falls back to the city of
/// the actor's campus when no city was set explicitly.
pub fn group_of(actor: &Actor, dimension: GroupDimension) -> Option<String> {
    let key = match dimension {
        GroupDimension::Campus => actor.campus.as_deref().map(str::trim).map(str::to_string),
        GroupDimension::City => actor
            .city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
            .map(str::to_string)
            .or_else(|| {
                actor
                    .campus
                    .as_deref()
                    .and_then(city_from_campus)
                    .map(str::to_string)
            }),
    };
    key.filter(|k| !k.is_empty())
}

/// Actor id to group name; actors without a group are left out.
pub fn actor_group_map(actors: &[Actor], dimension: GroupDimension) -> HashMap<Uuid, String> {
    actors
        .iter()
        .filter_map(|actor| group_of(actor, dimension).map(|group| (actor.id, group)))
        .collect()
}

pub fn actors_in_group(actors: &[Actor], dimension: GroupDimension, group_name: &str) -> HashSet<Uuid> {
    actors
        .iter()
        .filter(|actor| group_of(actor, dimension).as_deref() == Some(group_name))
        .map(|actor| actor.id)
        .collect()
}

pub fn actor_name_map(actors: &[Actor]) -> HashMap<Uuid, String> {
    actors
        .iter()
        .map(|actor| (actor.id, actor.label().to_string()))
        .collect()
}
