//! Renders toasts on stderr as they are queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ntm_core::toast::{Toast, ToastKind, Toaster};
use tokio::task::JoinHandle;

/// Prints every toast exactly once, in id order.
pub struct ToastPrinter {
    toaster: Toaster,
    last_shown: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl ToastPrinter {
    /// Starts watching `toaster`. Must be called inside a tokio runtime.
    pub fn start(toaster: &Toaster) -> Self {
        let last_shown = Arc::new(AtomicU64::new(0));
        let mut rx = toaster.subscribe();
        let shown = Arc::clone(&last_shown);
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let toasts = rx.borrow_and_update().clone();
                print_new(&toasts, &shown);
            }
        });

        Self {
            toaster: toaster.clone(),
            last_shown,
            task,
        }
    }

    /// Stops watching and prints whatever is still unseen.
    pub fn finish(self) {
        self.task.abort();
        print_new(&self.toaster.toasts(), &self.last_shown);
    }
}

fn print_new(toasts: &[Toast], last_shown: &AtomicU64) {
    for toast in toasts {
        if last_shown.fetch_max(toast.id, Ordering::SeqCst) < toast.id {
            eprintln!("{}", render(toast));
        }
    }
}

fn render(toast: &Toast) -> String {
    let marker = match toast.kind {
        ToastKind::Success => "✓",
        ToastKind::Error => "✗",
        ToastKind::Info => "•",
    };
    format!("{marker} {}", toast.message)
}
