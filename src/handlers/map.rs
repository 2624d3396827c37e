use axum::{extract::State, routing::get, Json, Router};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::{
    data::cities::{coordinates, selectable_cities},
    errors::AppError,
    models::{CheckIn, CheckInQuery, CityDrink, CityPin},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cities", get(city_pins))
        .route("/cities/selectable", get(list_selectable_cities))
}

/// Groups check-ins into pins for cities with known coordinates. Drinks are
/// newest first; pins are busiest first.
pub fn build_pins(check_ins: Vec<CheckIn>, usernames: &HashMap<Uuid, String>) -> Vec<CityPin> {
    let mut pins: HashMap<String, CityPin> = HashMap::new();

    for check_in in check_ins {
        let Some(city) = check_in.city.as_deref() else {
            continue;
        };
        let Some((lat, lng)) = coordinates(city) else {
            continue;
        };

        let pin = pins.entry(city.to_string()).or_insert_with(|| CityPin {
            city: city.to_string(),
            lat,
            lng,
            count: 0,
            drinks: Vec::new(),
        });
        pin.count += 1;
        pin.drinks.push(CityDrink {
            username: usernames
                .get(&check_in.actor_id)
                .cloned()
                .unwrap_or_else(|| "?".to_string()),
            drink_name: check_in.drink_name,
            created_at: check_in.created_at,
            rating: check_in.rating,
        });
    }

    let mut pins: Vec<CityPin> = pins.into_values().collect();
    for pin in &mut pins {
        pin.drinks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
    pins.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.city.cmp(&b.city)));
    pins
}

/// GET /api/map/cities - Public check-ins per city
pub async fn city_pins(State(state): State<AppState>) -> Result<Json<Vec<CityPin>>, AppError> {
    let check_ins = state
        .store
        .list_check_ins(&CheckInQuery {
            public_only: true,
            ..CheckInQuery::default()
        })
        .await?;

    let actor_ids: Vec<Uuid> = check_ins
        .iter()
        .filter(|c| c.city.is_some())
        .map(|c| c.actor_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let usernames: HashMap<Uuid, String> = if actor_ids.is_empty() {
        HashMap::new()
    } else {
        state
            .store
            .list_actors(Some(&actor_ids))
            .await?
            .into_iter()
            .map(|a| (a.id, a.username))
            .collect()
    };

    Ok(Json(build_pins(check_ins, &usernames)))
}

/// GET /api/map/cities/selectable - Cities an actor can pick
pub async fn list_selectable_cities() -> Json<Vec<&'static str>> {
    Json(selectable_cities())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DrinkCategory;
    use chrono::{Duration, Utc};

    fn at(city: Option<&str>, actor_id: Uuid, minutes_ago: i64) -> CheckIn {
        CheckIn {
            id: Uuid::new_v4(),
            actor_id,
            drink_name: format!("drink-{}", minutes_ago),
            category: DrinkCategory::Coffee,
            brand: None,
            product: None,
            flavor: None,
            caption: None,
            photo_url: None,
            rating: Some(4),
            city: city.map(str::to_string),
            is_private: false,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn pins_group_known_cities_only() {
        let actor = Uuid::new_v4();
        let names = HashMap::from([(actor, "buzz".to_string())]);
        let pins = build_pins(
            vec![
                at(Some("Chicago, IL"), actor, 30),
                at(Some("Chicago, IL"), actor, 5),
                at(Some("Durham, NC"), Uuid::new_v4(), 10),
                at(Some("Atlantis"), actor, 1),
                at(None, actor, 1),
            ],
            &names,
        );

        assert_eq!(pins.len(), 2);
        assert_eq!(pins[0].city, "Chicago, IL");
        assert_eq!(pins[0].count, 2);
        assert_eq!(pins[0].drinks[0].drink_name, "drink-5");
        assert_eq!(pins[0].drinks[0].username, "buzz");
        assert_eq!(pins[1].drinks[0].username, "?");
    }
}
