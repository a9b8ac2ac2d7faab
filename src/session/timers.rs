//! Restartable one-shot timers backing the quiet periods.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// A debounce timer: every `restart` replaces the previously scheduled action.
///
/// The action runs synchronously when the timer fires. Long-running work
/// must be spawned from it so a later restart cannot abort it.
pub struct DebounceTimer {
    name: &'static str,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: Mutex::new(None),
        }
    }

    /// Schedule `action` after `delay`, cancelling anything already scheduled.
    pub fn restart<F>(&self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let name = self.name;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!("[session] {} timer fired", name);
            action();
        });
        if let Some(previous) = self.handle.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the scheduled action. Returns whether one was still pending.
    pub fn cancel(&self) -> bool {
        match self.handle.lock().take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous() {
        let timer = DebounceTimer::new("test");
        let fired = Arc::new(AtomicUsize::new(0));

        for value in 1..=3 {
            let fired = fired.clone();
            timer.restart(Duration::from_millis(100), move || {
                fired.store(value, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let timer = DebounceTimer::new("test");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        timer.restart(Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(timer.cancel());
        assert!(!timer.cancel());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
