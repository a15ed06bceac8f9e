mod api;
mod brone;
mod config;
mod dashboard;
mod db;
mod feed;
mod schedule;
mod settings;
mod telemetry;
mod ws;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use chrono::FixedOffset;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::brone::{BroneSync, HttpCalendar, SqliteTaskSink};
use crate::config::Config;
use crate::feed::ChangeFeed;
use crate::settings::{AlertSettings, SettingsStore};

// ─── App State ───────────────────────────────────────────────────────────────

pub struct AppState {
    pub pool: SqlitePool,
    pub feed: ChangeFeed,
    pub settings: SettingsStore,
    /// Latest saved thresholds; every dashboard session holds a receiver
    pub settings_tx: watch::Sender<AlertSettings>,
    /// `None` when no calendar URL is configured
    pub brone: Option<Arc<BroneSync>>,
    pub tz_offset: FixedOffset,
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalyst_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("=== Catalyst dashboard backend starting ===");

    let config = Config::from_env()?;

    // Database
    let pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database ready");

    // Change feed shared by writers and dashboard sessions
    let feed = ChangeFeed::new(config.feed_capacity);

    // Alert thresholds
    let settings = SettingsStore::new(pool.clone());
    let (settings_tx, _) = watch::channel(settings.load().await);

    // Calendar sync
    let brone = match &config.brone_ical_url {
        Some(url) => {
            let engine = Arc::new(BroneSync::new(
                Arc::new(HttpCalendar::new(url.clone())?),
                Arc::new(SqliteTaskSink::new(pool.clone())),
                config.tz_offset,
            ));
            if let Some(every) = config.brone_sync_interval {
                tracing::info!("Brone sync scheduled every {}s", every.as_secs());
                brone::spawn_schedule(engine.clone(), every);
            }
            Some(engine)
        }
        None => {
            tracing::warn!("BRONE_ICAL_URL not set, assignment sync disabled");
            None
        }
    };

    // App state
    let state = Arc::new(AppState {
        pool,
        feed,
        settings,
        settings_tx,
        brone,
        tz_offset: config.tz_offset,
    });

    // Build router
    let app = build_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/ws", get(api::ws_handler::ws_handler))
        // Device + telemetry
        .route("/api/device", get(api::devices::get_device))
        .route("/api/devices/:id/heartbeat", post(api::devices::heartbeat))
        .route("/api/readings", get(api::readings::list_readings))
        .route("/api/readings", post(api::readings::create_reading))
        // Alert thresholds
        .route(
            "/api/settings/alerts",
            get(api::settings::get_alert_settings).put(api::settings::update_alert_settings),
        )
        // Assignments
        .route("/api/tasks", get(api::tasks::list_tasks))
        .route("/api/tasks/:id/complete", post(api::tasks::complete_task))
        .route("/api/brone/sync", post(api::brone::sync))
        // Class schedule
        .route("/api/schedule", get(api::schedule::get_schedule))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_state() -> Arc<AppState> {
        let pool = db::memory_pool().await;
        let (settings_tx, _) = watch::channel(AlertSettings::default());
        Arc::new(AppState {
            settings: SettingsStore::new(pool.clone()),
            pool,
            feed: ChangeFeed::new(16),
            settings_tx,
            brone: None,
            tz_offset: FixedOffset::east_opt(7 * 3600).unwrap(),
        })
    }

    async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = build_router(state.clone())
            .oneshot(req.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn reading_body(temperature: f64, comfort_score: f64) -> Value {
        json!({
            "device_id": "catalyst-01",
            "temperature": temperature,
            "humidity": 55.0,
            "heat_index": temperature + 1.0,
            "dew_point": 16.2,
            "comfort_score": comfort_score,
            "comfort_lvl": "comfortable"
        })
    }

    #[tokio::test]
    async fn readings_round_trip_newest_first() {
        let state = test_state().await;

        let (status, first) = call(&state, "POST", "/api/readings", Some(reading_body(24.0, 80.0))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, second) = call(&state, "POST", "/api/readings", Some(reading_body(25.5, 78.0))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(second["id"].as_i64() > first["id"].as_i64());

        let (status, body) = call(&state, "GET", "/api/readings?limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        let readings = body["readings"].as_array().unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0]["temperature"], 25.5);
    }

    #[tokio::test]
    async fn out_of_range_comfort_score_is_rejected() {
        let state = test_state().await;
        let (status, body) = call(&state, "POST", "/api/readings", Some(reading_body(24.0, 101.0))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("comfort_score"));
    }

    #[tokio::test]
    async fn heartbeat_registers_the_device() {
        let state = test_state().await;

        let (status, _) = call(&state, "GET", "/api/device", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, device) = call(&state, "POST", "/api/devices/catalyst-01/heartbeat", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(device["status"], "online");

        let (status, device) = call(
            &state,
            "POST",
            "/api/devices/catalyst-01/heartbeat",
            Some(json!({ "ip_address": "192.168.1.40" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(device["ip_address"], "192.168.1.40");

        let (_, device) = call(&state, "GET", "/api/device", None).await;
        assert_eq!(device["id"], "catalyst-01");
    }

    #[tokio::test]
    async fn alert_settings_save_and_broadcast() {
        let state = test_state().await;
        let mut rx = state.settings_tx.subscribe();

        let (status, body) = call(&state, "GET", "/api/settings/alerts", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tempMax"], 30.0);

        let update = json!({
            "tempMin": 16.0,
            "tempMax": 28.0,
            "humidMin": 35.0,
            "humidMax": 65.0,
            "notificationsEnabled": false
        });
        let (status, _) = call(&state, "PUT", "/api/settings/alerts", Some(update)).await;
        assert_eq!(status, StatusCode::OK);

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().temp_max, 28.0);
        assert_eq!(state.settings.load().await.temp_max, 28.0);

        let (_, body) = call(&state, "GET", "/api/settings/alerts", None).await;
        assert_eq!(body["notificationsEnabled"], false);
    }

    #[tokio::test]
    async fn inverted_thresholds_are_a_400() {
        let state = test_state().await;
        let bad = json!({
            "tempMin": 35.0,
            "tempMax": 20.0,
            "humidMin": 30.0,
            "humidMax": 70.0,
            "notificationsEnabled": true
        });
        let (status, body) = call(&state, "PUT", "/api/settings/alerts", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("tempMin"));
        assert_eq!(state.settings_tx.borrow().temp_max, 30.0);
    }

    #[tokio::test]
    async fn sync_without_calendar_url_is_a_500() {
        let state = test_state().await;
        let (status, body) = call(&state, "POST", "/api/brone/sync", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("BRONE_ICAL_URL"));
    }

    #[tokio::test]
    async fn tasks_list_and_complete() {
        let state = test_state().await;
        let now = chrono::Utc::now();
        db::queries::sync_brone_tasks(
            &state.pool,
            &[
                db::models::NewBroneTask {
                    course_name: "CS101".into(),
                    task_title: "Assignment 2".into(),
                    deadline: now + chrono::Duration::hours(3),
                    updated_at: now,
                },
                db::models::NewBroneTask {
                    course_name: "Statistika".into(),
                    task_title: "Kuis".into(),
                    deadline: now + chrono::Duration::days(4),
                    updated_at: now,
                },
            ],
        )
        .await
        .unwrap();

        let (status, body) = call(&state, "GET", "/api/tasks", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pending"], 2);
        let tasks = body["tasks"].as_array().unwrap();
        assert_eq!(tasks[0]["task_title"], "Assignment 2");
        assert_eq!(tasks[0]["is_urgent"], true);
        assert_eq!(tasks[1]["is_urgent"], false);

        let id = tasks[0]["id"].as_str().unwrap().to_string();
        let (status, _) = call(&state, "POST", &format!("/api/tasks/{id}/complete"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&state, "GET", "/api/tasks", None).await;
        assert_eq!(body["pending"], 1);

        let (status, _) = call(&state, "POST", "/api/tasks/nope/complete", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn schedule_for_requested_day() {
        let state = test_state().await;
        for (id, day, subject, start) in [
            ("c1", "Rabu", "Jaringan Komputer", "10:00:00"),
            ("c2", "Rabu", "Basis Data", "07:30:00"),
            ("c3", "Sabtu", "Praktikum Fisika", "09:00:00"),
        ] {
            sqlx::query(
                "INSERT INTO class_schedule (id, day_of_week, subject, start_time, end_time, room, created_at)
                 VALUES (?, ?, ?, ?, '12:00:00', 'B201', ?)",
            )
            .bind(id)
            .bind(day)
            .bind(subject)
            .bind(start)
            .bind(chrono::Utc::now())
            .execute(&state.pool)
            .await
            .unwrap();
        }

        let (status, body) = call(&state, "GET", "/api/schedule?day=rabu", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["day"], "Rabu");
        assert_eq!(body["days"], json!(["Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu"]));
        let subjects: Vec<_> = body["classes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["subject"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(subjects, vec!["Basis Data", "Jaringan Komputer"]);

        let (status, _) = call(&state, "GET", "/api/schedule?day=Monday", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&state, "GET", "/api/schedule", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(schedule::normalize_day(body["day"].as_str().unwrap()).is_some());
    }
}
