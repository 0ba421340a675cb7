//! Call Scheduler (spec §4.4): a keyed one-shot timer service. Each key
//! (a `connection_id`) holds at most one pending call; scheduling under
//! an occupied key cancels the previous one first.
//!
//! The wall clock is only consulted once, to compute the initial delay;
//! firing itself rides on `tokio::time`'s monotonic clock, so a backward
//! clock jump after scheduling cannot make a call fire early or late
//! relative to other pending calls (spec §9).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Entry {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct CallScheduler {
    pending: Arc<DashMap<String, Entry>>,
    next_generation: AtomicU64,
}

impl Default for CallScheduler {
    fn default() -> Self {
        CallScheduler {
            pending: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }
}

impl CallScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any existing call under `key`, then posts `task` to fire
    /// at `when`. If `when <= now` the call fires on the next scheduler
    /// tick rather than being run inline.
    pub fn schedule<F>(&self, key: impl Into<String>, when: DateTime<Utc>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        self.cancel(&key);

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let delay = (when - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        let pending = self.pending.clone();
        let cleanup_key = key.clone();
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task.await;
            if let Some(entry) = pending.get(&cleanup_key) {
                if entry.generation != generation {
                    return;
                }
            } else {
                return;
            }
            pending.remove(&cleanup_key);
        });

        self.pending.insert(key, Entry { generation, handle });
    }

    /// Removes a pending call; no error if none is pending.
    pub fn cancel(&self, key: &str) {
        if let Some((_, entry)) = self.pending.remove(key) {
            entry.handle.abort();
        }
    }

    pub fn has_pending(&self, key: &str) -> bool {
        self.pending
            .get(key)
            .map(|entry| !entry.handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancels every pending call; used during shutdown (spec §5).
    pub fn cancel_all(&self) {
        for entry in self.pending.iter() {
            entry.value().handle.abort();
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn fires_after_delay() {
        let scheduler = CallScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        scheduler.schedule(
            "conn-1",
            Utc::now() + chrono::Duration::milliseconds(20),
            async move {
                fired_clone.store(true, Ordering::SeqCst);
            },
        );
        assert!(scheduler.has_pending("conn-1"));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(!scheduler.has_pending("conn-1"));
    }

    #[tokio::test]
    async fn fires_immediately_when_when_is_in_the_past() {
        let scheduler = CallScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        scheduler.schedule(
            "conn-1",
            Utc::now() - chrono::Duration::seconds(5),
            async move {
                fired_clone.store(true, Ordering::SeqCst);
            },
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn replacing_a_call_cancels_the_original() {
        let scheduler = CallScheduler::new();
        let first_fired = Arc::new(AtomicBool::new(false));
        let second_fired = Arc::new(AtomicBool::new(false));

        let ff = first_fired.clone();
        scheduler.schedule("conn-1", Utc::now() + chrono::Duration::milliseconds(20), async move {
            ff.store(true, Ordering::SeqCst);
        });

        let sf = second_fired.clone();
        scheduler.schedule("conn-1", Utc::now() + chrono::Duration::milliseconds(40), async move {
            sf.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!first_fired.load(Ordering::SeqCst), "replaced call must not double-fire");
        assert!(second_fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let scheduler = CallScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        scheduler.schedule("conn-1", Utc::now() + chrono::Duration::milliseconds(20), async move {
            fired_clone.store(true, Ordering::SeqCst);
        });
        scheduler.cancel("conn-1");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_all_stops_everything() {
        let scheduler = CallScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        scheduler.schedule("a", Utc::now() + chrono::Duration::milliseconds(20), async move {
            fired_clone.store(true, Ordering::SeqCst);
        });
        scheduler.schedule("b", Utc::now() + chrono::Duration::milliseconds(20), async {});
        scheduler.cancel_all();
        assert!(!scheduler.has_pending("a"));
        assert!(!scheduler.has_pending("b"));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_of_missing_key_is_a_noop() {
        let scheduler = CallScheduler::new();
        scheduler.cancel("does-not-exist");
    }
}
