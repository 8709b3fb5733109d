//! Cancellable background tasks for timers and frame loops.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Handle to a spawned task. Dropping the guard cancels the task.
#[derive(Debug)]
pub struct TaskGuard {
    token: CancellationToken,
}

impl TaskGuard {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawn `future` on the current runtime; it stops at its next await point
/// once the guard is cancelled or dropped.
pub fn spawn_cancellable<F>(future: F) -> TaskGuard
where
    F: Future<Output = ()> + Send + 'static,
{
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = child.cancelled() => {}
            _ = future => {}
        }
    });
    TaskGuard { token }
}

/// Call `tick` every `period` (first call after one period) until it returns
/// `false` or the guard goes away.
pub fn every<F>(period: Duration, mut tick: F) -> TaskGuard
where
    F: FnMut() -> bool + Send + 'static,
{
    spawn_cancellable(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if !tick() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_every_ticks_until_dropped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let guard = every(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        drop(guard);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_stops_when_callback_declines() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let _guard = every(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst) < 1
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_marks_guard() {
        let guard = spawn_cancellable(std::future::pending::<()>());
        assert!(!guard.is_cancelled());
        guard.cancel();
        assert!(guard.is_cancelled());
    }
}
