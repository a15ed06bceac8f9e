use serde::{Deserialize, Serialize};

use crate::dashboard::{metrics::DashboardStatus, toast::Toast};
use crate::db::models::{Device, SensorReading};
use crate::settings::AlertSettings;

/// All WebSocket events sent to a connected dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    /// Full state after the initial fetch or a refresh
    Snapshot {
        device: Option<Device>,
        readings: Vec<SensorReading>,
        settings: AlertSettings,
        status: DashboardStatus,
        /// Notifications still on screen
        toasts: Vec<Toast>,
    },
    /// A new reading entered the chart window
    Reading {
        reading: SensorReading,
        status: DashboardStatus,
    },
    /// Device row changed upstream
    DeviceUpdated {
        device: Device,
        status: DashboardStatus,
    },
    /// Periodic liveness refresh
    Status { status: DashboardStatus },
    /// Show a notification
    Toast { toast: Toast },
    /// Remove a notification (expired or dismissed)
    ToastDismissed { id: String },
    /// Thresholds were saved
    SettingsChanged { settings: AlertSettings },
}

/// Messages a dashboard may send back
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    DismissToast { id: String },
    Refresh,
}
