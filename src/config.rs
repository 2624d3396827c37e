use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::{env, fmt::Display, str::FromStr, time::Duration};
use tracing::{info, warn};

use crate::leaderboard::aggregator::DEFAULT_LIMIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Rest,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "rest" => Ok(StoreBackend::Rest),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub rest_url: Option<String>,
    pub rest_api_key: Option<String>,
    pub skip_migrations: bool,
    pub host: String,
    pub port: u16,
    pub debug_mode: bool,
    pub allowed_origins: Vec<String>,
    /// Offset of the service's local time zone; calendar days and the
    /// start of the year are taken in this offset.
    pub utc_offset: FixedOffset,
    pub leaderboard_limit: usize,
    pub include_private: bool,
    pub directory_cache_ttl: Duration,
    pub smack_talk_chance: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
            rest_url: None,
            rest_api_key: None,
            skip_migrations: false,
            host: "127.0.0.1".to_string(),
            port: 3001,
            debug_mode: false,
            allowed_origins: Vec::new(),
            utc_offset: utc(),
            leaderboard_limit: DEFAULT_LIMIT,
            include_private: false,
            directory_cache_ttl: Duration::from_secs(30),
            smack_talk_chance: 0.1,
        }
    }
}

impl Config {
    /// Reads the environment. Malformed optional values fall back to their
    /// defaults; a backend without its connection settings is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let backend = try_load("STORE_BACKEND", StoreBackend::Postgres);
        let database_url = optional("DATABASE_URL");
        let rest_url = optional("REST_URL");
        let rest_api_key = optional("REST_API_KEY");

        match backend {
            StoreBackend::Postgres if database_url.is_none() => {
                anyhow::bail!("DATABASE_URL must be set when STORE_BACKEND=postgres")
            }
            StoreBackend::Rest if rest_url.is_none() || rest_api_key.is_none() => {
                anyhow::bail!("REST_URL and REST_API_KEY must be set when STORE_BACKEND=rest")
            }
            _ => {}
        }

        let offset_minutes: i32 = try_load("UTC_OFFSET_MINUTES", 0);
        let utc_offset = FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| {
            warn!("UTC_OFFSET_MINUTES={} is out of range, using UTC", offset_minutes);
            utc()
        });

        let leaderboard_limit = match try_load("LEADERBOARD_LIMIT", defaults.leaderboard_limit) {
            0 => {
                warn!("LEADERBOARD_LIMIT must be positive, using {}", DEFAULT_LIMIT);
                DEFAULT_LIMIT
            }
            n => n,
        };

        let smack_talk_chance: f64 = try_load("SMACK_TALK_CHANCE", defaults.smack_talk_chance);
        let smack_talk_chance = if (0.0..=1.0).contains(&smack_talk_chance) {
            smack_talk_chance
        } else {
            warn!("SMACK_TALK_CHANCE={} is not a probability, using default", smack_talk_chance);
            defaults.smack_talk_chance
        };

        let allowed_origins = optional("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            backend,
            database_url,
            rest_url,
            rest_api_key,
            skip_migrations: flag("SKIP_MIGRATIONS"),
            host: try_load("HOST", defaults.host),
            port: try_load("PORT", defaults.port),
            debug_mode: flag("DEBUG_MODE"),
            allowed_origins,
            utc_offset,
            leaderboard_limit,
            include_private: flag("LEADERBOARD_INCLUDE_PRIVATE"),
            directory_cache_ttl: Duration::from_secs(try_load("DIRECTORY_CACHE_TTL_SECS", 30)),
            smack_talk_chance,
        })
    }

    /// Current time in the service offset.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.utc_offset)
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag(key: &str) -> bool {
    optional(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match optional(key) {
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
            default
        }),
    }
}

impl Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Rest => "rest",
            StoreBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn malformed_values_fall_back() {
        assert_eq!(try_load::<u16>("BUZZCHECK_TEST_UNSET_PORT", 3001), 3001);
        std::env::set_var("BUZZCHECK_TEST_BAD_PORT", "not-a-port");
        assert_eq!(try_load::<u16>("BUZZCHECK_TEST_BAD_PORT", 3001), 3001);
        std::env::set_var("BUZZCHECK_TEST_GOOD_PORT", " 8080 ");
        assert_eq!(try_load::<u16>("BUZZCHECK_TEST_GOOD_PORT", 3001), 8080);
    }
}
