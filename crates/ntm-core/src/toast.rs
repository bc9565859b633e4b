//! Transient user notifications.
//!
//! A toast lives in the queue until its duration elapses or it is dismissed.
//! Expiry runs on the ambient tokio runtime; outside a runtime toasts stay
//! queued until dismissed or cleared.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, warn};

/// Default lifetime of a toast.
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(3000);

// Ids are unique for the whole process, across every `Toaster`.
static NEXT_TOAST_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Error,
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToastKind::Info => write!(f, "info"),
            ToastKind::Success => write!(f, "success"),
            ToastKind::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub kind: ToastKind,
}

/// Ordered queue of live toasts. Clones share the same queue.
#[derive(Clone)]
pub struct Toaster {
    toasts: Arc<watch::Sender<Vec<Toast>>>,
    default_duration: Duration,
}

impl Default for Toaster {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_DURATION)
    }
}

impl Toaster {
    pub fn new(default_duration: Duration) -> Self {
        let (toasts, _rx) = watch::channel(Vec::new());
        Self {
            toasts: Arc::new(toasts),
            default_duration,
        }
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    /// Live toasts in insertion order.
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.toasts.subscribe()
    }

    /// Queues a toast for the default duration and returns its id.
    pub fn notify(&self, message: impl Into<String>, kind: ToastKind) -> u64 {
        self.notify_for(message, kind, self.default_duration)
    }

    /// Queues a toast that expires after `duration`.
    pub fn notify_for(
        &self,
        message: impl Into<String>,
        kind: ToastKind,
        duration: Duration,
    ) -> u64 {
        let id = NEXT_TOAST_ID.fetch_add(1, Ordering::Relaxed);
        let toast = Toast {
            id,
            message: message.into(),
            kind,
        };
        debug!(id, %kind, "toast");
        self.toasts.send_modify(|toasts| toasts.push(toast));
        self.schedule_expiry(id, duration);
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.notify(message, ToastKind::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.notify(message, ToastKind::Error)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.notify(message, ToastKind::Info)
    }

    pub fn success_for(&self, message: impl Into<String>, duration: Duration) -> u64 {
        self.notify_for(message, ToastKind::Success, duration)
    }

    pub fn error_for(&self, message: impl Into<String>, duration: Duration) -> u64 {
        self.notify_for(message, ToastKind::Error, duration)
    }

    pub fn info_for(&self, message: impl Into<String>, duration: Duration) -> u64 {
        self.notify_for(message, ToastKind::Info, duration)
    }

    /// Removes the toast with `id`. Unknown ids are ignored.
    pub fn dismiss(&self, id: u64) -> bool {
        remove(&self.toasts, id)
    }

    pub fn clear(&self) {
        self.toasts.send_if_modified(|toasts| {
            let changed = !toasts.is_empty();
            toasts.clear();
            changed
        });
    }

    fn schedule_expiry(&self, id: u64, duration: Duration) {
        let Ok(handle) = Handle::try_current() else {
            warn!(id, "no async runtime, toast will not expire on its own");
            return;
        };
        let toasts = Arc::clone(&self.toasts);
        handle.spawn(async move {
            time::sleep(duration).await;
            remove(&toasts, id);
        });
    }
}

fn remove(toasts: &watch::Sender<Vec<Toast>>, id: u64) -> bool {
    toasts.send_if_modified(|toasts| {
        let before = toasts.len();
        toasts.retain(|toast| toast.id != id);
        toasts.len() != before
    })
}
