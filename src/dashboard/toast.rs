use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use uuid::Uuid;

/// How long a toast stays up without user action
pub const TOAST_DISPLAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toast {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ToastKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

struct LiveToast {
    toast: Toast,
    timer: JoinHandle<()>,
}

/// Visible toasts, each owning the timer that retires it.
///
/// Timers report their id on `expired`; the owner then calls [`ToastQueue::expire`].
/// Dismissing early aborts the timer, so no late removal ever arrives.
pub struct ToastQueue {
    live: Vec<LiveToast>,
    expired: mpsc::UnboundedSender<String>,
    display: Duration,
}

impl ToastQueue {
    pub fn new(expired: mpsc::UnboundedSender<String>) -> Self {
        Self::with_display(expired, TOAST_DISPLAY)
    }

    pub fn with_display(expired: mpsc::UnboundedSender<String>, display: Duration) -> Self {
        ToastQueue {
            live: Vec::new(),
            expired,
            display,
        }
    }

    pub fn push(&mut self, kind: ToastKind, title: impl Into<String>, message: Option<String>) -> Toast {
        let id = Uuid::new_v4().simple().to_string()[..7].to_string();
        let toast = Toast {
            id: id.clone(),
            kind,
            title: title.into(),
            message,
        };

        let tx = self.expired.clone();
        let display = self.display;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(display).await;
            let _ = tx.send(id);
        });

        self.live.push(LiveToast {
            toast: toast.clone(),
            timer,
        });
        toast
    }

    /// User closed the toast. Returns false if it was already gone.
    pub fn dismiss(&mut self, id: &str) -> bool {
        match self.take(id) {
            Some(entry) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Timer fired. Returns false for an id dismissed in the meantime.
    pub fn expire(&mut self, id: &str) -> bool {
        self.take(id).is_some()
    }

    /// Abort every pending timer
    pub fn clear(&mut self) {
        for entry in self.live.drain(..) {
            entry.timer.abort();
        }
    }

    pub fn visible(&self) -> Vec<Toast> {
        self.live.iter().map(|e| e.toast.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    fn take(&mut self, id: &str) -> Option<LiveToast> {
        let pos = self.live.iter().position(|e| e.toast.id == id)?;
        Some(self.live.remove(pos))
    }
}

impl Drop for ToastQueue {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn toast_expires_after_display_time() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut queue = ToastQueue::new(tx);

        let toast = queue.push(ToastKind::Warning, "High Temp!", Some("31°C is too hot.".into()));
        assert_eq!(queue.len(), 1);

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let id = rx.recv().await.unwrap();
        assert_eq!(id, toast.id);
        assert!(queue.expire(&id));
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn early_dismiss_cancels_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut queue = ToastQueue::new(tx);

        let toast = queue.push(ToastKind::Info, "Chilly!", None);
        assert!(queue.dismiss(&toast.id));
        assert!(!queue.dismiss(&toast.id));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn toasts_expire_independently() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut queue = ToastQueue::new(tx);

        let first = queue.push(ToastKind::Success, "Saved", None);
        tokio::time::sleep(Duration::from_secs(2)).await;
        let second = queue.push(ToastKind::Error, "Failed", Some("try again".into()));

        assert_eq!(rx.recv().await.unwrap(), first.id);
        queue.expire(&first.id);
        assert_eq!(queue.visible(), vec![second.clone()]);

        assert_eq!(rx.recv().await.unwrap(), second.id);
        queue.expire(&second.id);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_aborts_all_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut queue = ToastQueue::new(tx);
        queue.push(ToastKind::Warning, "a", None);
        queue.push(ToastKind::Warning, "b", None);

        queue.clear();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn toast_serializes_type_field() {
        let toast = Toast {
            id: "abc1234".into(),
            kind: ToastKind::Warning,
            title: "High Humidity".into(),
            message: None,
        };
        let json = serde_json::to_value(&toast).unwrap();
        assert_eq!(json["type"], "warning");
        assert!(json.get("message").is_none());
    }
}
