use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::{
    BroneTask, ClassSchedule, Device, DeviceStatus, HeartbeatPatch, NewBroneTask, NewReading,
    SensorReading, Setting,
};

// ─── Device queries ──────────────────────────────────────────────────────────

/// The dashboard tracks a single device
pub async fn first_device(pool: &SqlitePool) -> Result<Option<Device>> {
    let device = sqlx::query_as::<_, Device>("SELECT * FROM devices ORDER BY created_at ASC LIMIT 1")
        .fetch_optional(pool)
        .await?;
    Ok(device)
}

pub async fn get_device(pool: &SqlitePool, id: &str) -> Result<Option<Device>> {
    let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(device)
}

/// Insert the device on its first heartbeat, otherwise apply the patch.
/// `last_seen_at` is always moved to `now`.
pub async fn upsert_heartbeat(
    pool: &SqlitePool,
    id: &str,
    patch: &HeartbeatPatch,
    now: DateTime<Utc>,
) -> Result<Device> {
    let status = patch.status.unwrap_or(DeviceStatus::Online);

    sqlx::query(
        "INSERT INTO devices (id, device_name, mac_address, status, ip_address, last_seen_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           device_name = COALESCE(?, devices.device_name),
           mac_address = COALESCE(?, devices.mac_address),
           ip_address = COALESCE(?, devices.ip_address),
           status = excluded.status,
           last_seen_at = excluded.last_seen_at",
    )
    .bind(id)
    .bind(patch.device_name.as_deref().unwrap_or(id))
    .bind(patch.mac_address.as_deref().unwrap_or(""))
    .bind(status)
    .bind(&patch.ip_address)
    .bind(now)
    .bind(now)
    .bind(&patch.device_name)
    .bind(&patch.mac_address)
    .bind(&patch.ip_address)
    .execute(pool)
    .await?;

    get_device(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Device vanished after heartbeat: {}", id))
}

// ─── Sensor reading queries ──────────────────────────────────────────────────

pub async fn recent_readings(pool: &SqlitePool, limit: i64) -> Result<Vec<SensorReading>> {
    let readings = sqlx::query_as::<_, SensorReading>(
        "SELECT * FROM sensor_readings ORDER BY recorded_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(readings)
}

pub async fn insert_reading(
    pool: &SqlitePool,
    r: &NewReading,
    recorded_at: DateTime<Utc>,
) -> Result<SensorReading> {
    let reading = sqlx::query_as::<_, SensorReading>(
        "INSERT INTO sensor_readings (device_id, temperature, humidity, heat_index, dew_point, comfort_score, comfort_lvl, recorded_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING *",
    )
    .bind(&r.device_id)
    .bind(r.temperature)
    .bind(r.humidity)
    .bind(r.heat_index)
    .bind(r.dew_point)
    .bind(r.comfort_score)
    .bind(r.comfort_lvl)
    .bind(recorded_at)
    .fetch_one(pool)
    .await?;
    Ok(reading)
}

// ─── Brone task queries ──────────────────────────────────────────────────────

/// Upsert a whole calendar batch in one transaction.
/// Conflict key is (task_title, deadline); status is never touched on update.
pub async fn sync_brone_tasks(pool: &SqlitePool, tasks: &[NewBroneTask]) -> Result<usize> {
    let mut tx = pool.begin().await?;

    for t in tasks {
        sqlx::query(
            "INSERT INTO brone_tasks (id, course_name, task_title, deadline, status, updated_at)
             VALUES (?, ?, ?, ?, 'pending', ?)
             ON CONFLICT(task_title, deadline) DO UPDATE SET
               course_name = excluded.course_name,
               updated_at = excluded.updated_at",
        )
        .bind(NewBroneTask::row_id())
        .bind(&t.course_name)
        .bind(&t.task_title)
        .bind(t.deadline)
        .bind(t.updated_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(tasks.len())
}

pub async fn pending_tasks(pool: &SqlitePool) -> Result<Vec<BroneTask>> {
    let tasks = sqlx::query_as::<_, BroneTask>(
        "SELECT * FROM brone_tasks WHERE status = 'pending' ORDER BY deadline ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(tasks)
}

/// Returns false when no task has this id
pub async fn complete_task(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query("UPDATE brone_tasks SET status = 'completed', updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ─── Class schedule queries ──────────────────────────────────────────────────

pub async fn list_schedule(pool: &SqlitePool) -> Result<Vec<ClassSchedule>> {
    let rows = sqlx::query_as::<_, ClassSchedule>(
        "SELECT * FROM class_schedule ORDER BY start_time ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─── Settings queries ─────────────────────────────────────────────────────────

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row = sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|s| s.value))
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
