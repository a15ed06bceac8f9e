//! Assignment sync: calendar export in, normalized task rows out.
//!
//! One run = fetch the feed, turn every VEVENT into a task, hand the whole
//! batch to the store in a single upsert. The run is all-or-nothing and keeps
//! no state of its own between invocations.

pub mod ical;
pub mod transform;

use async_trait::async_trait;
use axum::{http::StatusCode, Json};
use chrono::{FixedOffset, Utc};
use reqwest::Client;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::db::{models::NewBroneTask, queries};
use ical::IcalError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("calendar fetch failed: {0}")]
    Fetch(anyhow::Error),
    #[error("calendar parse failed: {0}")]
    Parse(#[from] IcalError),
    #[error("event {0} has neither DTSTART nor DTEND")]
    MissingTimestamp(String),
    #[error("task upsert failed: {0}")]
    Upsert(anyhow::Error),
    #[error("calendar sync is not configured (BRONE_ICAL_URL unset)")]
    NotConfigured,
}

// ─── Collaborators ────────────────────────────────────────────────────────────

/// Where the iCalendar document comes from
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<String>;
}

/// Server-side idempotent upsert of a task batch.
/// Conflict resolution is the store's business; see `queries::sync_brone_tasks`.
#[async_trait]
pub trait TaskSink: Send + Sync {
    async fn upsert(&self, tasks: &[NewBroneTask]) -> anyhow::Result<usize>;
}

/// Calendar export over HTTP; credentials travel in the URL query
pub struct HttpCalendar {
    url: String,
    client: Client,
}

impl HttpCalendar {
    pub fn new(url: String) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(HttpCalendar { url, client })
    }
}

#[async_trait]
impl CalendarSource for HttpCalendar {
    async fn fetch(&self) -> anyhow::Result<String> {
        // The export URL carries the user's token; keep it out of errors
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?
            .error_for_status()
            .map_err(reqwest::Error::without_url)?
            .text()
            .await
            .map_err(reqwest::Error::without_url)?;
        Ok(body)
    }
}

pub struct SqliteTaskSink {
    pool: SqlitePool,
}

impl SqliteTaskSink {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteTaskSink { pool }
    }
}

#[async_trait]
impl TaskSink for SqliteTaskSink {
    async fn upsert(&self, tasks: &[NewBroneTask]) -> anyhow::Result<usize> {
        queries::sync_brone_tasks(&self.pool, tasks).await
    }
}

// ─── Engine ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SyncResponse {
    Ok { message: String, count: usize },
    Failed { error: String },
}

pub struct BroneSync {
    source: Arc<dyn CalendarSource>,
    sink: Arc<dyn TaskSink>,
    local_offset: FixedOffset,
}

impl BroneSync {
    pub fn new(
        source: Arc<dyn CalendarSource>,
        sink: Arc<dyn TaskSink>,
        local_offset: FixedOffset,
    ) -> Self {
        BroneSync {
            source,
            sink,
            local_offset,
        }
    }

    /// Fetch, parse and upsert. Returns how many tasks were submitted.
    pub async fn run(&self) -> Result<usize, SyncError> {
        tracing::info!("Brone sync started");
        let processed_at = Utc::now();

        let document = self.source.fetch().await.map_err(SyncError::Fetch)?;
        let events = ical::parse_events(&document, self.local_offset)?;

        let tasks = events
            .iter()
            .map(|ev| {
                transform::event_to_task(ev, processed_at).ok_or_else(|| {
                    SyncError::MissingTimestamp(ev.uid.clone().unwrap_or_else(|| "<no uid>".into()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!("Parsed {} tasks from calendar", tasks.len());

        if !tasks.is_empty() {
            self.sink.upsert(&tasks).await.map_err(SyncError::Upsert)?;
            tracing::info!("Task upsert committed");
        }
        Ok(tasks.len())
    }

    /// Run once and shape the outcome for the HTTP entry point
    pub async fn run_to_response(&self) -> (StatusCode, Json<SyncResponse>) {
        respond(self.run().await)
    }
}

pub fn respond(result: Result<usize, SyncError>) -> (StatusCode, Json<SyncResponse>) {
    match result {
        Ok(count) => (
            StatusCode::OK,
            Json(SyncResponse::Ok {
                message: "Sync successful".into(),
                count,
            }),
        ),
        Err(e) => {
            tracing::error!("Sync failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SyncResponse::Failed { error: e.to_string() }),
            )
        }
    }
}

/// Periodic runs for deployments without an external scheduler
pub fn spawn_schedule(sync: Arc<BroneSync>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match sync.run().await {
                Ok(count) => tracing::info!("Scheduled sync stored {} tasks", count),
                Err(e) => tracing::error!("Scheduled sync failed: {}", e),
            }
        }
    });
}
