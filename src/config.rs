use anyhow::{Context, Result};
use chrono::FixedOffset;
use std::str::FromStr;
use std::time::Duration;

/// Campus time
pub const DEFAULT_TZ_OFFSET: &str = "+07:00";

/// Start-up configuration, read once from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub brone_ical_url: Option<String>,
    pub brone_sync_interval: Option<Duration>,
    pub tz_offset: FixedOffset,
    pub feed_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| "sqlite:./data/catalyst.db".to_string());

        let port = parse_var::<u16>(&get, "PORT")?.unwrap_or(8080);

        let brone_ical_url = get("BRONE_ICAL_URL")
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let brone_sync_interval = parse_var::<u64>(&get, "BRONE_SYNC_INTERVAL_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let raw_offset = get("BRONE_TZ_OFFSET").unwrap_or_else(|| DEFAULT_TZ_OFFSET.to_string());
        let tz_offset = parse_offset(&raw_offset)
            .with_context(|| format!("Invalid BRONE_TZ_OFFSET: {raw_offset:?}"))?;

        let feed_capacity = parse_var::<usize>(&get, "FEED_CAPACITY")?.unwrap_or(256);
        if feed_capacity == 0 {
            anyhow::bail!("FEED_CAPACITY must be greater than zero");
        }

        Ok(Config {
            database_url,
            port,
            brone_ical_url,
            brone_sync_interval,
            tz_offset,
            feed_capacity,
        })
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid {key}: {raw:?}")),
        None => Ok(None),
    }
}

/// Accepts `+07:00`, `-0530`, `+7` or `Z`
pub fn parse_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).context("zero offset");
    }

    let (sign, rest) = match raw.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => anyhow::bail!("offset must start with + or -"),
    };
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit() || c == ':') {
        anyhow::bail!("offset must be [+-]HH[:MM]");
    }

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().context("offset hours")?;
    let minutes: i32 = minutes.parse().context("offset minutes")?;
    if hours > 14 || minutes > 59 {
        anyhow::bail!("offset out of range");
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).context("offset out of range")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.database_url, "sqlite:./data/catalyst.db");
        assert_eq!(cfg.port, 8080);
        assert!(cfg.brone_ical_url.is_none());
        assert!(cfg.brone_sync_interval.is_none());
        assert_eq!(cfg.tz_offset.local_minus_utc(), 7 * 3600);
        assert_eq!(cfg.feed_capacity, 256);
    }

    #[test]
    fn overrides_are_read() {
        let cfg = config(&[
            ("PORT", "3000"),
            ("BRONE_ICAL_URL", "https://brone.example/export.ics"),
            ("BRONE_SYNC_INTERVAL_SECS", "900"),
            ("BRONE_TZ_OFFSET", "-05:30"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.brone_ical_url.as_deref(), Some("https://brone.example/export.ics"));
        assert_eq!(cfg.brone_sync_interval, Some(Duration::from_secs(900)));
        assert_eq!(cfg.tz_offset.local_minus_utc(), -(5 * 3600 + 30 * 60));
    }

    #[test]
    fn zero_interval_disables_timer() {
        let cfg = config(&[("BRONE_SYNC_INTERVAL_SECS", "0"), ("BRONE_ICAL_URL", " ")]).unwrap();
        assert!(cfg.brone_sync_interval.is_none());
        assert!(cfg.brone_ical_url.is_none());
    }

    #[test]
    fn malformed_value_names_the_variable() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = config(&[("BRONE_TZ_OFFSET", "Asia/Jakarta")]).unwrap_err();
        assert!(err.to_string().contains("BRONE_TZ_OFFSET"));

        assert!(config(&[("FEED_CAPACITY", "0")]).is_err());
    }

    #[test]
    fn offset_forms() {
        assert_eq!(parse_offset("+07:00").unwrap().local_minus_utc(), 25200);
        assert_eq!(parse_offset("+0700").unwrap().local_minus_utc(), 25200);
        assert_eq!(parse_offset("+7").unwrap().local_minus_utc(), 25200);
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("07:00").is_err());
        assert!(parse_offset("+25:00").is_err());
    }
}
