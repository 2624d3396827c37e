use chrono::{DateTime, Utc};
use serde::Serialize;

/// A map pin: every check-in recorded in one known city.
#[derive(Debug, Serialize)]
pub struct CityPin {
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub count: u64,
    pub drinks: Vec<CityDrink>,
}

#[derive(Debug, Serialize)]
pub struct CityDrink {
    pub drink_name: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub rating: Option<i16>,
}
