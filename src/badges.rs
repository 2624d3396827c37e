//! Milestone definitions and the evaluator that grants them.

use chrono::{FixedOffset, Timelike};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::errors::Result;
use crate::leaderboard::streaks::{first_categories, longest_streak_for, reached_thresholds};
use crate::models::{Badge, CheckIn, DrinkCategory, NewBadge};
use crate::store::Store;

const BRAND_EXPLORER_BRANDS: usize = 5;
const EARLY_BIRD_BEFORE_HOUR: u32 = 7;
const NIGHT_OWL_FROM_HOUR: u32 = 23;
const SOCIAL_BUTTERFLY_FOLLOWING: usize = 10;
const TRENDSETTER_LIKES: usize = 10;
const TOP_REVIEWER_CHECK_INS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    FirstCheckIn(DrinkCategory),
    BrandExplorer,
    EarlyBird,
    NightOwl,
    Streak(u32),
    SocialButterfly,
    Trendsetter,
    TopReviewer,
}

impl Milestone {
    pub fn badge_type(&self) -> &'static str {
        match self {
            Milestone::FirstCheckIn(_) => "first_post",
            Milestone::BrandExplorer => "brand_explorer",
            Milestone::EarlyBird | Milestone::NightOwl => "time_based",
            Milestone::Streak(_) => "streak",
            Milestone::SocialButterfly | Milestone::Trendsetter => "social",
            Milestone::TopReviewer => "reviews",
        }
    }

    pub fn badge_name(&self) -> String {
        match self {
            Milestone::FirstCheckIn(category) => {
                let noun = match category {
                    DrinkCategory::EnergyDrink => "Energy",
                    DrinkCategory::ProteinShake => "Protein",
                    DrinkCategory::Coffee => "Coffee",
                    DrinkCategory::PreWorkout => "Pre-Workout",
                    DrinkCategory::Supplements => "Supplements",
                    DrinkCategory::Electrolytes => "Electrolytes",
                    DrinkCategory::Other => "Other",
                };
                format!("First {}", noun)
            }
            Milestone::BrandExplorer => "Brand Explorer".to_string(),
            Milestone::EarlyBird => "Early Bird".to_string(),
            Milestone::NightOwl => "Night Owl".to_string(),
            Milestone::Streak(days) => format!("{}-Day Streak", days),
            Milestone::SocialButterfly => "Social Butterfly".to_string(),
            Milestone::Trendsetter => "Trendsetter".to_string(),
            Milestone::TopReviewer => "Top Reviewer".to_string(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Milestone::FirstCheckIn(category) => {
                format!("First {} check-in", category.as_str().replace('_', " "))
            }
            Milestone::BrandExplorer => "5 different brands in a category".to_string(),
            Milestone::EarlyBird => "Check in before 7 AM".to_string(),
            Milestone::NightOwl => "Check in after 11 PM".to_string(),
            Milestone::Streak(days) => format!("Check in {} days in a row", days),
            Milestone::SocialButterfly => "Follow 10+ people".to_string(),
            Milestone::Trendsetter => "Get 10+ likes on a check-in".to_string(),
            Milestone::TopReviewer => "50+ check-ins".to_string(),
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Milestone::FirstCheckIn(DrinkCategory::EnergyDrink) => "⚡",
            Milestone::FirstCheckIn(DrinkCategory::ProteinShake) => "💪",
            Milestone::FirstCheckIn(DrinkCategory::Coffee) => "☕",
            Milestone::FirstCheckIn(DrinkCategory::PreWorkout) => "🔥",
            Milestone::FirstCheckIn(DrinkCategory::Supplements) => "🥛",
            Milestone::FirstCheckIn(DrinkCategory::Electrolytes) => "💧",
            Milestone::FirstCheckIn(DrinkCategory::Other) => "🥤",
            Milestone::BrandExplorer => "🧭",
            Milestone::EarlyBird => "🌅",
            Milestone::NightOwl => "🦉",
            Milestone::Streak(days) if *days >= 30 => "👑",
            Milestone::Streak(days) if *days >= 7 => "💥",
            Milestone::Streak(_) => "🔥",
            Milestone::SocialButterfly => "🦋",
            Milestone::Trendsetter => "🌟",
            Milestone::TopReviewer => "📝",
        }
    }

    fn to_new_badge(self, actor_id: Uuid) -> NewBadge {
        NewBadge {
            actor_id,
            badge_type: self.badge_type().to_string(),
            badge_name: self.badge_name(),
            metadata: json!({ "desc": self.description(), "emoji": self.emoji() }),
        }
    }
}

/// Everything the milestone rules look at for one actor.
#[derive(Debug, Default)]
pub struct ActivitySnapshot {
    /// All of the actor's check-ins, private ones included.
    pub check_ins: Vec<CheckIn>,
    pub following_count: usize,
    /// Like counts per check-in id.
    pub likes_per_check_in: HashMap<Uuid, usize>,
}

/// Milestones the activity qualifies for, plus the longest streak. Pure;
/// says nothing about what is already held.
pub fn earned_milestones(activity: &ActivitySnapshot, offset: FixedOffset) -> (Vec<Milestone>, u32) {
    let check_ins = &activity.check_ins;
    let mut earned: Vec<Milestone> = first_categories(check_ins)
        .into_iter()
        .map(Milestone::FirstCheckIn)
        .collect();

    let mut brands: HashMap<DrinkCategory, HashSet<String>> = HashMap::new();
    for check_in in check_ins {
        if let Some(brand) = check_in.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            brands
                .entry(check_in.category)
                .or_default()
                .insert(brand.to_lowercase());
        }
    }
    if brands.values().any(|set| set.len() >= BRAND_EXPLORER_BRANDS) {
        earned.push(Milestone::BrandExplorer);
    }

    let hours: Vec<u32> = check_ins
        .iter()
        .map(|c| c.created_at.with_timezone(&offset).hour())
        .collect();
    if hours.iter().any(|h| *h < EARLY_BIRD_BEFORE_HOUR) {
        earned.push(Milestone::EarlyBird);
    }
    if hours.iter().any(|h| *h >= NIGHT_OWL_FROM_HOUR) {
        earned.push(Milestone::NightOwl);
    }

    let streak = longest_streak_for(check_ins, offset);
    earned.extend(reached_thresholds(streak).map(Milestone::Streak));

    if activity.following_count >= SOCIAL_BUTTERFLY_FOLLOWING {
        earned.push(Milestone::SocialButterfly);
    }
    if activity
        .likes_per_check_in
        .values()
        .any(|likes| *likes >= TRENDSETTER_LIKES)
    {
        earned.push(Milestone::Trendsetter);
    }
    if check_ins.len() >= TOP_REVIEWER_CHECK_INS {
        earned.push(Milestone::TopReviewer);
    }

    (earned, streak)
}

/// Loads an actor's activity and grants any milestone not yet held.
pub struct BadgeEvaluator<'a> {
    store: &'a dyn Store,
    offset: FixedOffset,
}

impl<'a> BadgeEvaluator<'a> {
    pub fn new(store: &'a dyn Store, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    pub async fn snapshot(&self, actor_id: Uuid) -> Result<ActivitySnapshot> {
        let check_ins = self
            .store
            .list_check_ins(&crate::models::CheckInQuery {
                actor_ids: Some(vec![actor_id]),
                ..Default::default()
            })
            .await?;
        let following_count = self.store.following_ids(actor_id).await?.len();

        let ids: Vec<Uuid> = check_ins.iter().map(|c| c.id).collect();
        let mut likes_per_check_in: HashMap<Uuid, usize> = HashMap::new();
        for like in self.store.likes_for(&ids).await? {
            *likes_per_check_in.entry(like.check_in_id).or_default() += 1;
        }

        Ok(ActivitySnapshot {
            check_ins,
            following_count,
            likes_per_check_in,
        })
    }

    /// Returns the newly granted badges and the longest streak. Running it
    /// twice on unchanged activity grants nothing the second time.
    pub async fn evaluate(&self, actor_id: Uuid) -> Result<(Vec<Badge>, u32)> {
        let activity = self.snapshot(actor_id).await?;
        let (earned, streak) = earned_milestones(&activity, self.offset);

        let held: HashSet<(String, String)> = self
            .store
            .list_badges(actor_id)
            .await?
            .into_iter()
            .map(|b| (b.badge_type, b.badge_name))
            .collect();

        let mut granted = Vec::new();
        for milestone in earned {
            if held.contains(&(milestone.badge_type().to_string(), milestone.badge_name())) {
                continue;
            }
            // The store insert is the real guard; the held set only saves round trips.
            if let Some(badge) = self.store.grant_badge(milestone.to_new_badge(actor_id)).await? {
                tracing::info!(
                    actor = %actor_id,
                    badge = %badge.badge_name,
                    "🏅 Granted milestone"
                );
                granted.push(badge);
            }
        }

        Ok((granted, streak))
    }
}
