//! Lazily opened, time-bounded warehouse session.
//!
//! Warehouse logins expire server-side, so a session older than the
//! configured TTL is discarded and reopened before the next statement.

use crate::error::{WarehouseError, WarehouseResult};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info};

/// Default session lifetime, matching the warehouse auth token expiry.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1800;

struct OpenSession<S> {
    session: S,
    opened_at: Instant,
}

/// Holds at most one open session of type `S`.
///
/// Access is exclusive: the guard returned by [`acquire`](Self::acquire)
/// serializes statements on the session.
pub struct SessionCell<S> {
    ttl: Duration,
    slot: Mutex<Option<OpenSession<S>>>,
}

impl<S> SessionCell<S> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Borrow the session, opening it with `open` when absent or expired.
    pub async fn acquire<F, Fut>(&self, open: F) -> WarehouseResult<MappedMutexGuard<'_, S>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = WarehouseResult<S>>,
    {
        let mut slot = self.slot.lock().await;

        let expired = slot
            .as_ref()
            .is_none_or(|open| open.opened_at.elapsed() >= self.ttl);
        if expired {
            if slot.is_some() {
                info!(ttl_secs = self.ttl.as_secs(), "Session expired, reconnecting");
            } else {
                debug!("Opening warehouse session");
            }
            // Drop the stale session before logging in again
            *slot = None;
            let session = open().await?;
            *slot = Some(OpenSession {
                session,
                opened_at: Instant::now(),
            });
        }

        MutexGuard::try_map(slot, |slot| slot.as_mut().map(|open| &mut open.session))
            .map_err(|_| WarehouseError::internal("Warehouse session unavailable"))
    }

    /// Forget the current session so the next `acquire` reconnects.
    pub async fn invalidate(&self) {
        if self.slot.lock().await.take().is_some() {
            debug!("Warehouse session invalidated");
        }
    }

    pub async fn is_open(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Remove and return the open session, if any.
    pub async fn take(&self) -> Option<S> {
        self.slot.lock().await.take().map(|open| open.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn open_counting(counter: &AtomicUsize) -> WarehouseResult<usize> {
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[tokio::test]
    async fn test_session_opened_once_within_ttl() {
        let cell = SessionCell::new(Duration::from_secs(60));
        let opened = AtomicUsize::new(0);

        for _ in 0..3 {
            let session = cell.acquire(|| open_counting(&opened)).await.unwrap();
            assert_eq!(*session, 1);
        }
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_session_reopened() {
        let cell = SessionCell::new(Duration::ZERO);
        let opened = AtomicUsize::new(0);

        let first = *cell.acquire(|| open_counting(&opened)).await.unwrap();
        let second = *cell.acquire(|| open_counting(&opened)).await.unwrap();
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reconnect() {
        let cell = SessionCell::new(Duration::from_secs(60));
        let opened = AtomicUsize::new(0);

        drop(cell.acquire(|| open_counting(&opened)).await.unwrap());
        assert!(cell.is_open().await);
        cell.invalidate().await;
        assert!(!cell.is_open().await);
        assert_eq!(*cell.acquire(|| open_counting(&opened)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_cell_empty() {
        let cell: SessionCell<usize> = SessionCell::new(Duration::from_secs(60));
        let err = cell
            .acquire(|| async { Err(WarehouseError::connection("down", "retry")) })
            .await
            .err()
            .unwrap();
        assert!(err.is_connection_error());
        assert!(!cell.is_open().await);
    }
}
