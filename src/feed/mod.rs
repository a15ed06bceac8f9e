//! In-process change feed: row-level insert/update notifications from the
//! store to every open dashboard session.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::db::models::{Device, SensorReading};

/// A committed row change, carrying the full new row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// Insert on `sensor_readings`
    ReadingInserted { reading: SensorReading },
    /// Update on `devices`
    DeviceUpdated { device: Device },
}

/// The two logical channels a dashboard listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    SensorUpdates,
    DeviceStatus,
}

impl Channel {
    fn name(self) -> &'static str {
        match self {
            Channel::SensorUpdates => "sensor-updates",
            Channel::DeviceStatus => "device-status",
        }
    }

    fn accepts(self, event: &FeedEvent) -> bool {
        matches!(
            (self, event),
            (Channel::SensorUpdates, FeedEvent::ReadingInserted { .. })
                | (Channel::DeviceStatus, FeedEvent::DeviceUpdated { .. })
        )
    }
}

/// Publishing side, cloned into every writer
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<FeedEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        ChangeFeed { tx }
    }

    /// Fire and forget; having no subscribers is not an error
    pub fn publish(&self, event: FeedEvent) {
        let _ = self.tx.send(event);
    }

    /// Open both channels for one consumer
    pub fn subscribe(&self) -> Subscription {
        let (fwd_tx, rx) = mpsc::channel(64);
        let tasks = [Channel::SensorUpdates, Channel::DeviceStatus]
            .into_iter()
            .map(|channel| spawn_channel(channel, self.tx.subscribe(), fwd_tx.clone()))
            .collect();

        Subscription {
            rx,
            tasks,
            closed: false,
        }
    }
}

fn spawn_channel(
    channel: Channel,
    rx: broadcast::Receiver<FeedEvent>,
    fwd: mpsc::Sender<FeedEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(rx);
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) if channel.accepts(&event) => {
                    if fwd.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!("{}: subscriber lagged, {} events dropped", channel.name(), skipped);
                }
            }
        }
        tracing::debug!("{}: channel closed", channel.name());
    })
}

/// Both channels of one dashboard, merged. Ordering holds within a channel
/// but not across them.
pub struct Subscription {
    rx: mpsc::Receiver<FeedEvent>,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
}

impl Subscription {
    /// Next event, or `None` once closed
    pub async fn next(&mut self) -> Option<FeedEvent> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Tear down both channels. Nothing is delivered after this returns,
    /// including events already queued.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for task in &self.tasks {
            task.abort();
        }
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ComfortLevel, DeviceStatus};
    use chrono::Utc;
    use std::time::Duration;

    fn reading(id: i64, temperature: f64) -> SensorReading {
        SensorReading {
            id,
            device_id: "catalyst-01".into(),
            temperature,
            humidity: 50.0,
            heat_index: temperature,
            dew_point: 10.0,
            comfort_score: 75.0,
            comfort_lvl: ComfortLevel::Comfortable,
            recorded_at: Utc::now(),
        }
    }

    fn device(status: DeviceStatus) -> Device {
        let mut d = Device::new("catalyst-01".into(), "The Catalyst".into(), String::new());
        d.status = status;
        d
    }

    #[tokio::test]
    async fn delivers_both_channels_in_order() {
        let feed = ChangeFeed::new(16);
        let mut sub = feed.subscribe();

        feed.publish(FeedEvent::ReadingInserted { reading: reading(1, 20.0) });
        feed.publish(FeedEvent::DeviceUpdated { device: device(DeviceStatus::Online) });
        feed.publish(FeedEvent::ReadingInserted { reading: reading(2, 21.0) });

        let mut reading_ids = Vec::new();
        let mut device_updates = 0;
        for _ in 0..3 {
            match tokio::time::timeout(Duration::from_secs(1), sub.next()).await.unwrap() {
                Some(FeedEvent::ReadingInserted { reading }) => reading_ids.push(reading.id),
                Some(FeedEvent::DeviceUpdated { .. }) => device_updates += 1,
                None => panic!("subscription ended early"),
            }
        }
        assert_eq!(reading_ids, [1, 2]);
        assert_eq!(device_updates, 1);
    }

    #[tokio::test]
    async fn nothing_delivered_after_close() {
        let feed = ChangeFeed::new(16);
        let mut sub = feed.subscribe();

        feed.publish(FeedEvent::ReadingInserted { reading: reading(1, 20.0) });
        tokio::task::yield_now().await;
        sub.close();
        feed.publish(FeedEvent::ReadingInserted { reading: reading(2, 20.0) });

        assert!(sub.is_closed());
        assert!(sub.next().await.is_none());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn subscribers_are_independent() {
        let feed = ChangeFeed::new(16);
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();
        a.close();

        feed.publish(FeedEvent::ReadingInserted { reading: reading(7, 20.0) });
        let got = tokio::time::timeout(Duration::from_secs(1), b.next()).await.unwrap();
        assert!(matches!(got, Some(FeedEvent::ReadingInserted { reading }) if reading.id == 7));
        assert!(a.next().await.is_none());
    }
}
