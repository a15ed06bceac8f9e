use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Device ─────────────────────────────────────────────────────────────────

/// Lifecycle status reported by the device heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    Maintenance,
    Error,
    Provisioning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: String,
    pub device_name: String,
    pub mac_address: String,
    pub status: DeviceStatus,
    pub ip_address: Option<String>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    #[cfg(test)]
    pub fn new(id: String, device_name: String, mac_address: String) -> Self {
        let now = Utc::now();
        Device {
            id,
            device_name,
            mac_address,
            status: DeviceStatus::Provisioning,
            ip_address: None,
            last_seen_at: now,
            created_at: now,
        }
    }
}

/// Fields a heartbeat may overwrite; `None` keeps the stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeartbeatPatch {
    pub device_name: Option<String>,
    pub mac_address: Option<String>,
    pub ip_address: Option<String>,
    pub status: Option<DeviceStatus>,
}

// ─── Sensor readings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ComfortLevel {
    Freezing,
    Cold,
    Cool,
    Comfortable,
    Warm,
    Hot,
    Extreme,
}

/// One telemetry row. Heat index, dew point and comfort are computed by the
/// device firmware and stored as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorReading {
    pub id: i64,
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub heat_index: f64,
    pub dew_point: f64,
    pub comfort_score: f64,
    pub comfort_lvl: ComfortLevel,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReading {
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub heat_index: f64,
    pub dew_point: f64,
    pub comfort_score: f64,
    pub comfort_lvl: ComfortLevel,
    /// Server time is used when the device has no clock
    pub recorded_at: Option<DateTime<Utc>>,
}

// ─── Brone tasks ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BroneTask {
    pub id: String,
    pub course_name: String,
    pub task_title: String,
    pub deadline: DateTime<Utc>,
    pub status: TaskStatus,
    pub updated_at: DateTime<Utc>,
}

impl BroneTask {
    /// Due within the next 24 hours and not yet past
    pub fn is_urgent(&self, now: DateTime<Utc>) -> bool {
        self.deadline > now && self.deadline - now < Duration::hours(24)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline <= now
    }
}

/// Task row produced by the calendar sync. Status is owned by the store:
/// `pending` on insert, untouched on conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBroneTask {
    pub course_name: String,
    pub task_title: String,
    pub deadline: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewBroneTask {
    pub fn row_id() -> String {
        Uuid::new_v4().to_string()
    }
}

// ─── Class schedule ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClassSchedule {
    pub id: String,
    pub day_of_week: String,
    pub subject: String,
    pub start_time: String,
    pub end_time: String,
    pub room: String,
    pub created_at: DateTime<Utc>,
}

// ─── Setting ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
}
