use std::sync::Arc;

use tokio::sync::watch;

/// A handle which closes a connection or broker.
///
/// Closing is idempotent and may be done from any task.
///
/// # Examples
///
/// ```
/// # #[tokio::main] async fn main() {
/// use tokio_dbus_wire::CloseHandle;
///
/// let handle = CloseHandle::new();
/// let other = handle.clone();
///
/// assert!(!handle.is_closed());
/// other.close();
/// other.close();
///
/// handle.closed().await;
/// assert!(handle.is_closed());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    /// Construct a new open handle.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the associated resource.
    pub fn close(&self) {
        self.tx.send_if_modified(|closed| !std::mem::replace(closed, true));
    }

    /// Test if the handle has been closed.
    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the handle is closed.
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for CloseHandle {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
