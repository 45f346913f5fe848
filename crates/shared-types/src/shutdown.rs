//! # Shutdown Signal
//!
//! Process-wide cancellation built on a `tokio::sync::watch` channel. The
//! supervisor owns the [`ShutdownSignal`]; every task holds a cloned
//! [`Shutdown`] and checks it at each suspension point.

use std::sync::Arc;

use tokio::sync::watch;

/// Sending half. Triggering is idempotent.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

/// Receiving half, cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
    // Keeps the channel open for `Shutdown::never()`.
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

impl ShutdownSignal {
    /// New signal together with its first listener.
    pub fn new() -> (Self, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (
            Self { tx: Arc::new(tx) },
            Shutdown {
                rx,
                _keepalive: None,
            },
        )
    }

    /// Request shutdown of every listener.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Another listener for this signal.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
            _keepalive: None,
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Shutdown {
    /// A listener that is never triggered.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(Arc::new(tx)),
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested. Pending forever if the signal is
    /// dropped without being triggered.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
