// Caller-driven cancellation of lock acquisition
// A CancelHandle flips a watch channel; every CancelSignal cloned from it observes the flip

use std::time::Instant;

use tokio::sync::watch;

/// Owner side of a cancellation signal
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// A signal to pass into `LockOptions`
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side of a cancellation signal
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle is dropped first.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Why an in-flight operation was interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Cancelled,
    Deadline,
}

impl Interrupt {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Interrupt::Cancelled => "cancelled",
            Interrupt::Deadline => "deadline",
        }
    }
}

/// Resolves when either the signal fires or the deadline passes
pub(crate) async fn interrupted(
    cancel: Option<&CancelSignal>,
    deadline: Option<Instant>,
) -> Interrupt {
    let on_cancel = async {
        match cancel {
            Some(signal) => signal.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };
    let on_deadline = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = on_cancel => Interrupt::Cancelled,
        _ = on_deadline => Interrupt::Deadline,
    }
}
