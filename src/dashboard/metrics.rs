//! Values derived on demand from the history window and the wall clock.
//! None of this is stored; callers recompute whenever time or data moves.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::history::ReadingHistory;
use crate::db::models::{Device, SensorReading};

/// A device is online while its last heartbeat is younger than this
pub const DEVICE_ONLINE_WINDOW_MS: i64 = 120_000;
/// The stream is live while the newest reading is younger than this
pub const STREAM_LIVE_WINDOW_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// Absolute percentage change, one decimal
    pub percent_change: f64,
    pub is_positive: bool,
}

impl Trend {
    /// `None` when the change is undefined (previous value of zero or a
    /// non-finite input)
    pub fn between(current: f64, previous: f64) -> Option<Trend> {
        if previous == 0.0 {
            return None;
        }
        let pct = ((current - previous) / previous * 100.0).abs();
        if !pct.is_finite() {
            return None;
        }
        Some(Trend {
            percent_change: (pct * 10.0).round() / 10.0,
            is_positive: current > previous,
        })
    }
}

fn trend_of(history: &ReadingHistory, field: fn(&SensorReading) -> f64) -> Option<Trend> {
    let current = history.latest()?;
    let previous = history.previous()?;
    Trend::between(field(current), field(previous))
}

pub fn temperature_trend(history: &ReadingHistory) -> Option<Trend> {
    trend_of(history, |r| r.temperature)
}

pub fn humidity_trend(history: &ReadingHistory) -> Option<Trend> {
    trend_of(history, |r| r.humidity)
}

pub fn is_device_online(last_seen_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - last_seen_at < Duration::milliseconds(DEVICE_ONLINE_WINDOW_MS)
}

pub fn is_stream_live(recorded_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - recorded_at < Duration::milliseconds(STREAM_LIVE_WINDOW_MS)
}

/// Header badge state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    Offline,
    Online,
    Streaming,
}

/// Everything the header and stat cards show besides raw values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStatus {
    pub device_online: bool,
    pub stream_live: bool,
    pub link: Link,
    pub temperature_trend: Option<Trend>,
    pub humidity_trend: Option<Trend>,
    /// Latest temperature above the configured maximum
    pub temperature_alarm: bool,
}

impl DashboardStatus {
    pub fn compute(
        device: Option<&Device>,
        history: &ReadingHistory,
        temp_max: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let device_online = device.is_some_and(|d| is_device_online(d.last_seen_at, now));
        let stream_live = history
            .latest()
            .is_some_and(|r| is_stream_live(r.recorded_at, now));

        // A fresh reading from a device without a recent heartbeat still counts as offline
        let link = match (device_online, stream_live) {
            (false, _) => Link::Offline,
            (true, false) => Link::Online,
            (true, true) => Link::Streaming,
        };

        DashboardStatus {
            device_online,
            stream_live,
            link,
            temperature_trend: temperature_trend(history),
            humidity_trend: humidity_trend(history),
            temperature_alarm: history.latest().is_some_and(|r| r.temperature > temp_max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ComfortLevel;

    fn reading(id: i64, temperature: f64, humidity: f64, recorded_at: DateTime<Utc>) -> SensorReading {
        SensorReading {
            id,
            device_id: "catalyst-01".into(),
            temperature,
            humidity,
            heat_index: temperature,
            dew_point: 10.0,
            comfort_score: 70.0,
            comfort_lvl: ComfortLevel::Warm,
            recorded_at,
        }
    }

    #[test]
    fn trend_from_twenty_to_twenty_five() {
        let t = Trend::between(25.0, 20.0).unwrap();
        assert_eq!(t.percent_change, 25.0);
        assert!(t.is_positive);
    }

    #[test]
    fn trend_rounds_to_one_decimal_and_handles_drop() {
        let t = Trend::between(20.0, 30.0).unwrap();
        assert_eq!(t.percent_change, 33.3);
        assert!(!t.is_positive);
    }

    #[test]
    fn trend_suppressed_on_zero_or_nan() {
        assert!(Trend::between(25.0, 0.0).is_none());
        assert!(Trend::between(0.0, 0.0).is_none());
        assert!(Trend::between(f64::NAN, 20.0).is_none());
        assert!(Trend::between(f64::INFINITY, 20.0).is_none());
    }

    #[test]
    fn trend_needs_two_readings() {
        let now = Utc::now();
        let mut history = ReadingHistory::default();
        assert!(temperature_trend(&history).is_none());

        history.push(reading(1, 20.0, 40.0, now));
        assert!(temperature_trend(&history).is_none());

        history.push(reading(2, 25.0, 50.0, now));
        assert_eq!(temperature_trend(&history).unwrap().percent_change, 25.0);
        assert_eq!(humidity_trend(&history).unwrap().percent_change, 25.0);
    }

    #[test]
    fn device_online_boundary() {
        let now = Utc::now();
        assert!(!is_device_online(now - Duration::milliseconds(121_000), now));
        assert!(is_device_online(now - Duration::milliseconds(119_000), now));
        assert!(!is_device_online(now - Duration::milliseconds(120_000), now));
    }

    #[test]
    fn stream_live_boundary() {
        let now = Utc::now();
        assert!(is_stream_live(now - Duration::milliseconds(59_000), now));
        assert!(!is_stream_live(now - Duration::milliseconds(61_000), now));
    }

    #[test]
    fn elapsed_time_alone_flips_status() {
        let t0 = Utc::now();
        let mut device = Device::new("catalyst-01".into(), "The Catalyst".into(), String::new());
        device.last_seen_at = t0;
        let mut history = ReadingHistory::default();
        history.push(reading(1, 31.0, 50.0, t0));

        let fresh = DashboardStatus::compute(Some(&device), &history, 30.0, t0);
        assert_eq!(fresh.link, Link::Streaming);
        assert!(fresh.temperature_alarm);

        let later = DashboardStatus::compute(Some(&device), &history, 30.0, t0 + Duration::seconds(90));
        assert_eq!(later.link, Link::Online);

        let much_later = DashboardStatus::compute(Some(&device), &history, 30.0, t0 + Duration::seconds(180));
        assert_eq!(much_later.link, Link::Offline);
        assert!(!much_later.stream_live);
    }

    #[test]
    fn no_device_is_offline() {
        let status = DashboardStatus::compute(None, &ReadingHistory::default(), 30.0, Utc::now());
        assert_eq!(status.link, Link::Offline);
        assert!(!status.temperature_alarm);
        assert!(status.temperature_trend.is_none());
    }
}
