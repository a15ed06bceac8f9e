//! Per-view dashboard session.
//!
//! A session owns the chart window, the alert limiter and the toast stack for
//! one connected browser. Everything is mutated on the session's own task, so
//! feed events, timer ticks and client commands are handled strictly one at a
//! time.

pub mod alerts;
pub mod history;
pub mod metrics;
pub mod toast;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};

use crate::db::{models::Device, queries};
use crate::feed::{ChangeFeed, FeedEvent, Subscription};
use crate::settings::AlertSettings;
use crate::ws::{ClientMessage, WsEvent};
use alerts::AlertEvaluator;
use history::{ReadingHistory, HISTORY_CAPACITY};
use metrics::DashboardStatus;
use toast::ToastQueue;

/// Liveness is re-derived this often even when nothing arrives
pub const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Owner-side handle; the session stops on [`SessionHandle::teardown`] or
/// when the handle is dropped.
pub struct SessionHandle {
    commands: mpsc::Sender<ClientMessage>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Forward a client message. False once the session has ended.
    pub async fn send(&self, msg: ClientMessage) -> bool {
        self.commands.send(msg).await.is_ok()
    }

    /// Stop the session and wait until its subscriptions and timers are gone
    pub async fn teardown(self) {
        let SessionHandle { shutdown, task, .. } = self;
        let _ = shutdown.send(());
        if let Err(e) = task.await {
            tracing::warn!("Dashboard session ended abnormally: {}", e);
        }
    }
}

pub struct DashboardSession {
    pool: SqlitePool,
    feed: Subscription,
    settings: AlertSettings,
    settings_rx: watch::Receiver<AlertSettings>,
    history: ReadingHistory,
    device: Option<Device>,
    alerts: AlertEvaluator,
    toasts: ToastQueue,
    expired_rx: mpsc::UnboundedReceiver<String>,
    out: mpsc::Sender<WsEvent>,
}

impl DashboardSession {
    /// Subscribe to the feed and spawn the session task. Events for the
    /// browser are written to `out`.
    pub fn start(
        pool: SqlitePool,
        feed: &ChangeFeed,
        mut settings_rx: watch::Receiver<AlertSettings>,
        out: mpsc::Sender<WsEvent>,
    ) -> SessionHandle {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let settings = settings_rx.borrow_and_update().clone();

        let session = DashboardSession {
            pool,
            feed: feed.subscribe(),
            settings,
            settings_rx,
            history: ReadingHistory::default(),
            device: None,
            alerts: AlertEvaluator::default(),
            toasts: ToastQueue::new(expired_tx),
            expired_rx,
            out,
        };

        let task = tokio::spawn(session.run(commands_rx, shutdown_rx));
        SessionHandle {
            commands: commands_tx,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ClientMessage>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        tracing::debug!("Dashboard session started");
        self.refresh().await;

        let mut ticker = interval_at(Instant::now() + STATUS_INTERVAL, STATUS_INTERVAL);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(event) = self.feed.next() => self.on_feed(event).await,
                Some(id) = self.expired_rx.recv() => {
                    if self.toasts.expire(&id) {
                        self.emit(WsEvent::ToastDismissed { id }).await;
                    }
                }
                Ok(()) = self.settings_rx.changed() => {
                    self.settings = self.settings_rx.borrow_and_update().clone();
                    tracing::debug!("Session picked up new alert settings");
                    self.emit(WsEvent::SettingsChanged { settings: self.settings.clone() }).await;
                }
                _ = ticker.tick() => {
                    let status = self.status();
                    self.emit(WsEvent::Status { status }).await;
                }
                msg = commands.recv() => match msg {
                    Some(msg) => self.on_command(msg).await,
                    None => break,
                },
            }
        }

        self.feed.close();
        self.toasts.clear();
        tracing::debug!("Dashboard session torn down");
    }

    /// Initial bulk fetch. A failed read leaves the previous state in place.
    async fn refresh(&mut self) {
        match queries::first_device(&self.pool).await {
            Ok(device) => {
                if let Some(d) = &device {
                    let age = (Utc::now() - d.last_seen_at).num_milliseconds() as f64 / 60_000.0;
                    tracing::debug!("Device {} last seen {:.2}m ago", d.id, age);
                }
                self.device = device;
            }
            Err(e) => tracing::warn!("Device fetch failed, keeping stale state: {}", e),
        }

        match queries::recent_readings(&self.pool, HISTORY_CAPACITY as i64).await {
            Ok(readings) if !readings.is_empty() => self.history.initialize(readings),
            Ok(_) => {}
            Err(e) => tracing::warn!("Reading fetch failed, keeping stale state: {}", e),
        }
        if self.history.is_empty() {
            tracing::debug!("No readings yet, charts start empty");
        } else {
            tracing::debug!("Chart window holds {} readings", self.history.len());
        }

        let status = self.status();
        self.emit(WsEvent::Snapshot {
            device: self.device.clone(),
            readings: self.history.to_vec(),
            settings: self.settings.clone(),
            status,
            toasts: self.toasts.visible(),
        })
        .await;
    }

    async fn on_feed(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::ReadingInserted { reading } => {
                if !self.history.push(reading.clone()) {
                    return;
                }
                let status = self.status();
                self.emit(WsEvent::Reading {
                    reading: reading.clone(),
                    status,
                })
                .await;

                for alert in self.alerts.evaluate(&reading, &self.settings, Utc::now()) {
                    let toast = self.toasts.push(alert.toast, alert.title, Some(alert.message));
                    self.emit(WsEvent::Toast { toast }).await;
                }
            }
            FeedEvent::DeviceUpdated { device } => {
                self.device = Some(device.clone());
                let status = self.status();
                self.emit(WsEvent::DeviceUpdated { device, status }).await;
            }
        }
    }

    async fn on_command(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::DismissToast { id } => {
                if self.toasts.dismiss(&id) {
                    tracing::debug!("Toast {} dismissed, {} still visible", id, self.toasts.len());
                    self.emit(WsEvent::ToastDismissed { id }).await;
                }
            }
            ClientMessage::Refresh => self.refresh().await,
        }
    }

    fn status(&self) -> DashboardStatus {
        DashboardStatus::compute(
            self.device.as_ref(),
            &self.history,
            self.settings.temp_max,
            Utc::now(),
        )
    }

    async fn emit(&self, event: WsEvent) {
        if self.out.send(event).await.is_err() {
            tracing::debug!("Dashboard output closed, dropping event");
        }
    }
}
