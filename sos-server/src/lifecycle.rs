//! C7: paused/stopped flags shared between the accept loop and whatever
//! triggers pause/stop. `pause()`/`stop()` open a loopback connection to
//! unblock a pending `accept()`, porting `make_sure_exiting_accept_block`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tracing::warn;

#[derive(Debug, Default)]
pub struct Lifecycle {
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Whether the accept loop should take its normal, unpaused path.
    pub fn is_running(&self) -> bool {
        !self.is_paused() && !self.is_stopped()
    }

    pub async fn pause(&self, listen_addr: SocketAddr) {
        self.paused.store(true, Ordering::SeqCst);
        self.wake_accept_loop(listen_addr).await;
    }

    pub async fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub async fn stop(&self, listen_addr: SocketAddr) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake_accept_loop(listen_addr).await;
    }

    async fn wake_accept_loop(&self, listen_addr: SocketAddr) {
        if let Err(err) = TcpStream::connect(listen_addr).await {
            warn!(%err, "failed to open dummy connection to unblock accept loop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_requires_neither_paused_nor_stopped() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.is_running());

        lifecycle.paused.store(true, Ordering::SeqCst);
        assert!(!lifecycle.is_running());

        lifecycle.paused.store(false, Ordering::SeqCst);
        lifecycle.stopped.store(true, Ordering::SeqCst);
        assert!(!lifecycle.is_running());
    }
}
