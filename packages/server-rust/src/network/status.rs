//! Server phase and in-flight request accounting.
//!
//! The phase is swapped lock-free through `ArcSwap`; in-flight requests are
//! counted by RAII guards, and the last guard dropped during a drain wakes
//! the waiter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Notify;

/// Server phase: `Starting -> Ready -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    Starting,
    Ready,
    Draining,
    Stopped,
}

impl ServerPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }

    /// Whether new requests are accepted in this phase.
    #[must_use]
    pub fn accepts_requests(self) -> bool {
        matches!(self, Self::Starting | Self::Ready)
    }
}

#[derive(Debug)]
struct Counter {
    active: AtomicUsize,
    idle: Notify,
}

/// Shared phase and in-flight counter.
#[derive(Debug)]
pub struct ServerStatus {
    phase: ArcSwap<ServerPhase>,
    counter: Arc<Counter>,
}

impl ServerStatus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: ArcSwap::from_pointee(ServerPhase::Starting),
            counter: Arc::new(Counter {
                active: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    #[must_use]
    pub fn phase(&self) -> ServerPhase {
        **self.phase.load()
    }

    pub fn mark_ready(&self) {
        self.phase.store(Arc::new(ServerPhase::Ready));
    }

    /// Stops accepting requests. In-flight requests keep running.
    pub fn begin_drain(&self) {
        self.phase.store(Arc::new(ServerPhase::Draining));
    }

    /// Counts a request until the returned guard is dropped.
    #[must_use]
    pub fn track(&self) -> InFlight {
        self.counter.active.fetch_add(1, Ordering::AcqRel);
        InFlight {
            counter: Arc::clone(&self.counter),
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.counter.active.load(Ordering::Acquire)
    }

    /// Waits until no request is in flight, up to `timeout`.
    ///
    /// Moves to `Stopped` and returns `true` once drained; returns `false`
    /// and stays `Draining` on timeout.
    pub async fn drained(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.counter.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_err() {
            return false;
        }
        self.phase.store(Arc::new(ServerPhase::Stopped));
        true
    }
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight request guard. Decrements on drop, including during unwinding.
#[derive(Debug)]
pub struct InFlight {
    counter: Arc<Counter>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.counter.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.counter.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance() {
        let status = ServerStatus::new();
        assert_eq!(status.phase(), ServerPhase::Starting);
        status.mark_ready();
        assert_eq!(status.phase(), ServerPhase::Ready);
        assert!(status.phase().accepts_requests());
        status.begin_drain();
        assert_eq!(status.phase(), ServerPhase::Draining);
        assert!(!status.phase().accepts_requests());
    }

    #[test]
    fn guards_count_in_flight_requests() {
        let status = ServerStatus::new();
        let a = status.track();
        let b = status.track();
        assert_eq!(status.in_flight(), 2);
        drop(a);
        assert_eq!(status.in_flight(), 1);
        drop(b);
        assert_eq!(status.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_completes_when_the_last_request_finishes() {
        let status = Arc::new(ServerStatus::new());
        status.mark_ready();
        let guard = status.track();
        status.begin_drain();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(guard);
        });

        assert!(status.drained(Duration::from_secs(2)).await);
        assert_eq!(status.phase(), ServerPhase::Stopped);
        release.await.unwrap();
    }

    #[tokio::test]
    async fn drain_times_out_with_requests_outstanding() {
        let status = ServerStatus::new();
        let _guard = status.track();
        status.begin_drain();
        assert!(!status.drained(Duration::from_millis(20)).await);
        assert_eq!(status.phase(), ServerPhase::Draining);
    }
}
