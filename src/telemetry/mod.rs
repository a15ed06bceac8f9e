use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::models::{Device, HeartbeatPatch, NewReading, SensorReading};
use crate::db::queries;
use crate::feed::{ChangeFeed, FeedEvent};

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Payload rejected before touching the store
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Telemetry service: stores what the device sends and announces each
/// committed row on the change feed
pub struct TelemetryService {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl TelemetryService {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        TelemetryService { pool, feed }
    }

    /// Store one reading and publish the insert
    pub async fn record_reading(&self, reading: NewReading) -> Result<SensorReading, TelemetryError> {
        validate_reading(&reading)?;

        let recorded_at = reading.recorded_at.unwrap_or_else(Utc::now);
        let stored = queries::insert_reading(&self.pool, &reading, recorded_at).await?;

        tracing::debug!(
            "Reading {} from {}: {:.1}°C {:.1}%",
            stored.id,
            stored.device_id,
            stored.temperature,
            stored.humidity
        );
        self.feed.publish(FeedEvent::ReadingInserted {
            reading: stored.clone(),
        });
        Ok(stored)
    }

    /// Device check-in: registers unknown devices, refreshes `last_seen_at`
    /// and publishes the updated row
    pub async fn heartbeat(
        &self,
        device_id: &str,
        patch: HeartbeatPatch,
    ) -> Result<Device, TelemetryError> {
        if device_id.trim().is_empty() {
            return Err(TelemetryError::Invalid("device id must not be empty".into()));
        }

        let device = queries::upsert_heartbeat(&self.pool, device_id, &patch, Utc::now()).await?;
        tracing::debug!("Heartbeat from {} ({:?})", device.id, device.status);

        self.feed.publish(FeedEvent::DeviceUpdated {
            device: device.clone(),
        });
        Ok(device)
    }
}

fn validate_reading(r: &NewReading) -> Result<(), TelemetryError> {
    if r.device_id.trim().is_empty() {
        return Err(TelemetryError::Invalid("device_id must not be empty".into()));
    }
    for (name, value) in [
        ("temperature", r.temperature),
        ("humidity", r.humidity),
        ("heat_index", r.heat_index),
        ("dew_point", r.dew_point),
        ("comfort_score", r.comfort_score),
    ] {
        if !value.is_finite() {
            return Err(TelemetryError::Invalid(format!("{} must be a finite number", name)));
        }
    }
    if !(0.0..=100.0).contains(&r.comfort_score) {
        return Err(TelemetryError::Invalid(format!(
            "comfort_score {} is outside 0..=100",
            r.comfort_score
        )));
    }
    Ok(())
}
