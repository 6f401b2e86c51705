//! Cooperative cancellation
//!
//! A [`ShutdownToken`] is a cheap, cloneable flag backed by a watch channel.
//! Cancelling a token cancels every child derived from it; cancelling a child
//! leaves the parent untouched.

use std::sync::{Arc, Mutex, Weak};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

struct Inner {
    tx: watch::Sender<bool>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new(cancelled: bool) -> Self {
        let (tx, _) = watch::channel(cancelled);
        Self {
            tx,
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self) {
        if self.tx.send_replace(true) {
            return;
        }
        let children = std::mem::take(
            &mut *self.children.lock().unwrap_or_else(|e| e.into_inner()),
        );
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Token for observing and requesting shutdown from async tasks
#[derive(Clone)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new(false)),
        }
    }

    /// Request shutdown; repeated calls are no-ops
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.tx.borrow()
    }

    /// Resolves once the token (or an ancestor) is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.inner.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // The sender lives as long as `self`, so this only fails if it was dropped
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Token cancelled together with this one, but cancellable on its own
    pub fn child(&self) -> ShutdownToken {
        let child = Arc::new(Inner::new(self.is_cancelled()));
        {
            let mut children = self.inner.children.lock().unwrap_or_else(|e| e.into_inner());
            children.retain(|w| w.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        // Parent may have been cancelled between the read above and the push
        if self.is_cancelled() {
            child.cancel();
        }
        ShutdownToken { inner: child }
    }
}

/// Wait for SIGINT or SIGTERM
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let name = tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    info!("Received {}", name);
    name
}
