use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::queries;

/// Storage slot holding the serialized thresholds
pub const SETTINGS_KEY: &str = "catalyst_settings";

/// User thresholds for alerts. Stored as camelCase JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSettings {
    pub temp_min: f64,
    pub temp_max: f64,
    pub humid_min: f64,
    pub humid_max: f64,
    pub notifications_enabled: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        AlertSettings {
            temp_min: 18.0,
            temp_max: 30.0,
            humid_min: 30.0,
            humid_max: 70.0,
            notifications_enabled: true,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    #[error("{min} must not exceed {max}")]
    InvertedRange { min: &'static str, max: &'static str },
}

impl AlertSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, value) in [
            ("tempMin", self.temp_min),
            ("tempMax", self.temp_max),
            ("humidMin", self.humid_min),
            ("humidMax", self.humid_max),
        ] {
            if !value.is_finite() {
                return Err(SettingsError::NotFinite(name));
            }
        }
        if self.temp_min > self.temp_max {
            return Err(SettingsError::InvertedRange { min: "tempMin", max: "tempMax" });
        }
        if self.humid_min > self.humid_max {
            return Err(SettingsError::InvertedRange { min: "humidMin", max: "humidMax" });
        }
        Ok(())
    }
}

/// Write-through persistence for [`AlertSettings`]
#[derive(Debug, Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsStore { pool }
    }

    /// Never fails: a missing, unreadable or corrupt slot yields the defaults
    pub async fn load(&self) -> AlertSettings {
        let raw = match queries::get_setting(&self.pool, SETTINGS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return AlertSettings::default(),
            Err(e) => {
                tracing::warn!("Could not read alert settings, using defaults: {}", e);
                return AlertSettings::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("Stored alert settings are not valid JSON, using defaults: {}", e);
            AlertSettings::default()
        })
    }

    pub async fn save(&self, settings: &AlertSettings) -> anyhow::Result<()> {
        let raw = serde_json::to_string(settings)?;
        queries::set_setting(&self.pool, SETTINGS_KEY, &raw).await?;
        tracing::debug!("Alert settings saved: {}", raw);
        Ok(())
    }
}
