/// Known campuses and the city each one sits in.
const CAMPUS_TO_CITY: &[(&str, &str)] = &[
    ("Boston College", "Chestnut Hill, MA"),
    ("Clemson", "Clemson, SC"),
    ("Duke", "Durham, NC"),
    ("Florida State", "Tallahassee, FL"),
    ("FSU", "Tallahassee, FL"),
    ("Georgia Tech", "Atlanta, GA"),
    ("Louisville", "Louisville, KY"),
    ("Miami", "Coral Gables, FL"),
    ("NC State", "Raleigh, NC"),
    ("Notre Dame", "South Bend, IN"),
    ("Pitt", "Pittsburgh, PA"),
    ("Syracuse", "Syracuse, NY"),
    ("Virginia Tech", "Blacksburg, VA"),
    ("VT", "Blacksburg, VA"),
    ("Wake Forest", "Winston-Salem, NC"),
    ("Cal", "Berkeley, CA"),
    ("SMU", "Dallas, TX"),
    ("Stanford", "Stanford, CA"),
];

/// Map pin coordinates, (city, lat, lng).
const CITY_COORDINATES: &[(&str, f64, f64)] = &[
    ("Chestnut Hill, MA", 42.3355, -71.1685),
    ("Clemson, SC", 34.6834, -82.8374),
    ("Durham, NC", 35.9940, -78.8986),
    ("Tallahassee, FL", 30.4383, -84.2807),
    ("Atlanta, GA", 33.7490, -84.3880),
    ("Louisville, KY", 38.2527, -85.7585),
    ("Coral Gables, FL", 25.7215, -80.2684),
    ("Raleigh, NC", 35.7796, -78.6382),
    ("South Bend, IN", 41.6764, -86.2520),
    ("Pittsburgh, PA", 40.4406, -79.9959),
    ("Syracuse, NY", 43.0481, -76.1474),
    ("Blacksburg, VA", 37.2296, -80.4139),
    ("Winston-Salem, NC", 36.0999, -80.2442),
    ("Berkeley, CA", 37.8716, -122.2727),
    ("Dallas, TX", 32.7767, -96.7970),
    ("Stanford, CA", 37.4275, -122.1697),
    ("San Francisco, CA", 37.7749, -122.4194),
    ("Chicago, IL", 41.8781, -87.6298),
    ("Washington, DC", 38.9072, -77.0369),
];

/// Cities offered to users who are not at a listed campus.
pub const FEATURED_CITIES: &[&str] = &["San Francisco, CA", "Chicago, IL", "Washington, DC"];

/// Resolve a free-text campus to its city: exact match, then
/// case-insensitive match, then substring match in either direction.
pub fn city_from_campus(campus: &str) -> Option<&'static str> {
    let trimmed = campus.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some((_, city)) = CAMPUS_TO_CITY.iter().find(|(key, _)| *key == trimmed) {
        return Some(city);
    }

    let lower = trimmed.to_lowercase();
    if let Some((_, city)) = CAMPUS_TO_CITY
        .iter()
        .find(|(key, _)| key.to_lowercase() == lower)
    {
        return Some(city);
    }

    CAMPUS_TO_CITY
        .iter()
        .find(|(key, _)| {
            let key = key.to_lowercase();
            lower.contains(&key) || key.contains(&lower)
        })
        .map(|(_, city)| *city)
}

pub fn coordinates(city: &str) -> Option<(f64, f64)> {
    CITY_COORDINATES
        .iter()
        .find(|(name, _, _)| *name == city)
        .map(|(_, lat, lng)| (*lat, *lng))
}

/// Every selectable city, sorted and deduplicated.
pub fn selectable_cities() -> Vec<&'static str> {
    let mut cities: Vec<&'static str> = FEATURED_CITIES
        .iter()
        .copied()
        .chain(CAMPUS_TO_CITY.iter().map(|(_, city)| *city))
        .collect();
    cities.sort_unstable();
    cities.dedup();
    cities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campus_lookup_is_forgiving() {
        assert_eq!(city_from_campus("Duke"), Some("Durham, NC"));
        assert_eq!(city_from_campus("  georgia tech "), Some("Atlanta, GA"));
        assert_eq!(city_from_campus("Stanford University"), Some("Stanford, CA"));
        assert_eq!(city_from_campus(""), None);
    }

    #[test]
    fn every_campus_city_has_coordinates() {
        for city in selectable_cities() {
            assert!(coordinates(city).is_some(), "missing coordinates for {}", city);
        }
    }
}
