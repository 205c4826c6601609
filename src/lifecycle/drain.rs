//! In-flight request accounting

use std::sync::Arc;

use tokio::sync::watch;

/// Counts requests that have been accepted but not finished.
#[derive(Debug, Clone)]
pub struct InFlightTracker {
    count: Arc<watch::Sender<usize>>,
}

/// Held for the duration of one request; decrements on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    count: Arc<watch::Sender<usize>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);

        Self {
            count: Arc::new(count),
        }
    }

    pub fn enter(&self) -> InFlightGuard {
        self.count.send_modify(|n| *n += 1);

        InFlightGuard {
            count: self.count.clone(),
        }
    }

    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolves once no request is in flight
    pub async fn wait_idle(&self) {
        let mut count = self.count.subscribe();
        let _ = count.wait_for(|n| *n == 0).await;
    }
}

impl Default for InFlightTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| {
            debug_assert!(*n > 0, "in-flight counter underflow");
            *n = n.saturating_sub(1);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_counts_guards() {
        let tracker = InFlightTracker::new();
        assert_eq!(tracker.count(), 0);

        let a = tracker.enter();
        let b = tracker.enter();
        assert_eq!(tracker.count(), 2);

        drop(a);
        assert_eq!(tracker.count(), 1);
        drop(b);
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_empty() {
        let tracker = InFlightTracker::new();

        tokio::time::timeout(Duration::from_millis(100), tracker.wait_idle())
            .await
            .expect("should not wait");
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_every_guard() {
        let tracker = InFlightTracker::new();
        let guards: Vec<_> = (0..5).map(|_| tracker.enter()).collect();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_idle().await })
        };

        for guard in guards {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(!waiter.is_finished());
            drop(guard);
        }

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[tokio::test]
    async fn test_guard_released_on_panic() {
        let tracker = InFlightTracker::new();

        let task = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                let _guard = tracker.enter();
                panic!("handler blew up");
            })
        };

        assert!(task.await.is_err());
        assert_eq!(tracker.count(), 0);
    }
}
