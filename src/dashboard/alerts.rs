use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::toast::ToastKind;
use crate::db::models::SensorReading;
use crate::settings::AlertSettings;

/// Minimum spacing between two alert passes that fire
pub const ALERT_COOLDOWN_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TemperatureHigh,
    TemperatureLow,
    HumidityHigh,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub toast: ToastKind,
    pub title: String,
    pub message: String,
}

impl Alert {
    fn new(kind: AlertKind, value: f64) -> Self {
        let (toast, title, message) = match kind {
            AlertKind::TemperatureHigh => (ToastKind::Warning, "High Temp!", format!("{value}°C is too hot.")),
            AlertKind::TemperatureLow => (ToastKind::Info, "Chilly!", format!("{value}°C is quite cold.")),
            AlertKind::HumidityHigh => (ToastKind::Warning, "High Humidity", format!("{value}% moisture level.")),
        };
        Alert {
            kind,
            toast,
            title: title.to_string(),
            message,
        }
    }
}

/// Threshold rules behind one shared rate limiter.
///
/// The limiter is checked once per pass. A closed limiter suppresses the
/// whole pass; an open one lets every matching rule fire together (a
/// temperature rule and the humidity rule may co-fire) and then closes for
/// the cooldown.
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    last_fired: Option<DateTime<Utc>>,
    cooldown: Duration,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        AlertEvaluator {
            last_fired: None,
            cooldown: Duration::milliseconds(ALERT_COOLDOWN_MS),
        }
    }
}

impl AlertEvaluator {
    pub fn evaluate(
        &mut self,
        reading: &SensorReading,
        settings: &AlertSettings,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        if !settings.notifications_enabled {
            return Vec::new();
        }
        if let Some(last) = self.last_fired {
            if now - last < self.cooldown {
                return Vec::new();
            }
        }

        let mut fired = Vec::new();
        if reading.temperature > settings.temp_max {
            fired.push(Alert::new(AlertKind::TemperatureHigh, reading.temperature));
        } else if reading.temperature < settings.temp_min {
            fired.push(Alert::new(AlertKind::TemperatureLow, reading.temperature));
        }
        if reading.humidity > settings.humid_max {
            fired.push(Alert::new(AlertKind::HumidityHigh, reading.humidity));
        }

        if !fired.is_empty() {
            self.last_fired = Some(now);
            tracing::info!("Alert pass fired {} notification(s) for reading {}", fired.len(), reading.id);
        }
        fired
    }

    #[cfg(test)]
    pub fn last_fired(&self) -> Option<DateTime<Utc>> {
        self.last_fired
    }
}
