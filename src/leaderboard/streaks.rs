use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::collections::BTreeSet;

use crate::models::{CheckIn, DrinkCategory};

/// Streak lengths that unlock a milestone.
pub const STREAK_THRESHOLDS: [u32; 3] = [3, 7, 30];

/// Distinct local calendar days with at least one event, ascending.
pub fn activity_days<'a, I>(timestamps: I, offset: FixedOffset) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = &'a DateTime<Utc>>,
{
    timestamps
        .into_iter()
        .map(|ts| ts.with_timezone(&offset).date_naive())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Longest run of consecutive days in a sorted, deduplicated day list.
pub fn longest_streak(days: &[NaiveDate]) -> u32 {
    if days.is_empty() {
        return 0;
    }

    let mut longest = 1;
    let mut current = 1;
    for pair in days.windows(2) {
        if (pair[1] - pair[0]).num_days() == 1 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 1;
        }
    }
    longest
}

pub fn longest_streak_for(events: &[CheckIn], offset: FixedOffset) -> u32 {
    longest_streak(&activity_days(events.iter().map(|e| &e.created_at), offset))
}

/// Thresholds reached by a streak of `streak` days.
pub fn reached_thresholds(streak: u32) -> impl Iterator<Item = u32> {
    STREAK_THRESHOLDS.into_iter().filter(move |t| streak >= *t)
}

/// Categories in the order the actor first checked into them.
pub fn first_categories(events: &[CheckIn]) -> Vec<DrinkCategory> {
    let mut sorted: Vec<&CheckIn> = events.iter().collect();
    sorted.sort_by_key(|e| e.created_at);

    let mut seen = Vec::new();
    for event in sorted {
        if !seen.contains(&event.category) {
            seen.push(event.category);
        }
    }
    seen
}
