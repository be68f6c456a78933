use std::env;

use anyhow::{Context, anyhow};

use crate::calendar::{HourLabel, WeekStart, hour_range};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub db_max_connections: u32,
    pub agenda: AgendaConfig,
}

/// Defaults for the agenda views, overridable per request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgendaConfig {
    pub week_start: WeekStart,
    pub business_hours: Vec<HourLabel>,
}

impl Default for AgendaConfig {
    fn default() -> Self {
        AgendaConfig {
            week_start: WeekStart::Sunday,
            business_hours: hour_range(8, 19),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let session_ttl_hours: i64 = parse_or(&get, "SESSION_TTL_HOURS", 24)?;
        let db_max_connections: u32 = parse_or(&get, "DB_MAX_CONNECTIONS", 10)?;

        let week_start = match get("AGENDA_WEEK_START") {
            Some(s) => s.parse::<WeekStart>().context("invalid AGENDA_WEEK_START")?,
            None => WeekStart::default(),
        };
        let first: u8 = parse_or(&get, "AGENDA_FIRST_HOUR", 8)?;
        let last: u8 = parse_or(&get, "AGENDA_LAST_HOUR", 19)?;
        if first > last || last > 23 {
            return Err(anyhow!(
                "AGENDA_FIRST_HOUR ({first}) and AGENDA_LAST_HOUR ({last}) must satisfy first <= last <= 23"
            ));
        }

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            db_max_connections,
            agenda: AgendaConfig {
                week_start,
                business_hours: hour_range(first, last),
            },
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
