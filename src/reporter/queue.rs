//! Rate-limited work queue for pod-update processing.
//!
//! Provides the queue semantics the reporter's processing loop depends on:
//!
//! - keys queued while already pending are deduplicated
//! - a key is never handed to two workers simultaneously; a key re-added
//!   while in flight is re-queued when the in-flight worker calls [`done`]
//! - failed keys can be re-queued with per-key exponential backoff
//! - shutdown lets workers drain the queue, then hands out `None`
//!
//! [`done`]: RateLimitedQueue::done

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

/// Exponential backoff schedule for failed keys.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap for exponential growth.
    pub max_delay: Duration,

    /// Growth factor per attempt.
    pub multiplier: f64,
}

impl BackoffConfig {
    /// Fast-start/slow-cap defaults for controller-style requeues.
    pub const DEFAULT: Self = Self {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_secs(30),
        multiplier: 2.0,
    };

    /// Computes the delay for the given retry attempt (1-indexed: the first
    /// failure of a key is attempt 1).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.multiplier.powi(exponent as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<String>,

    /// Keys awaiting processing (queued, or re-queue requested while in
    /// flight).
    dirty: HashSet<String>,

    /// Keys currently handed to a worker.
    processing: HashSet<String>,

    /// Failure counts, cleared by `forget`.
    requeues: HashMap<String, u32>,

    shut_down: bool,
}

/// A FIFO queue of string keys with dedup, in-flight gating, and rate-limited
/// re-adds.
#[derive(Debug)]
pub struct RateLimitedQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    backoff: BackoffConfig,
}

impl RateLimitedQueue {
    pub fn new(backoff: BackoffConfig) -> Self {
        RateLimitedQueue {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            backoff,
        }
    }

    /// Enqueues a key for processing.
    ///
    /// No-op if the key is already pending. A key currently in flight is
    /// marked dirty and re-queued when its worker finishes.
    pub fn add(&self, key: impl Into<String>) {
        let key = key.into();
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.shut_down || inner.dirty.contains(&key) {
            return;
        }
        inner.dirty.insert(key.clone());
        if inner.processing.contains(&key) {
            return;
        }
        inner.queue.push_back(key);
        drop(inner);
        self.notify.notify_one();
    }

    /// Waits for the next key. Returns `None` once the queue has been shut
    /// down and drained.
    pub async fn next(&self) -> Option<String> {
        loop {
            // Register interest before checking state so a concurrent add
            // cannot slip between the check and the await.
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().expect("queue lock poisoned");
                if let Some(key) = inner.queue.pop_front() {
                    inner.dirty.remove(&key);
                    inner.processing.insert(key.clone());
                    if !inner.queue.is_empty() {
                        // More work waiting; wake another worker.
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
                if inner.shut_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Marks in-flight processing of a key as finished, re-queueing it if it
    /// was re-added meanwhile.
    pub fn done(&self, key: &str) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.processing.remove(key);
        if inner.dirty.contains(key) && !inner.shut_down {
            inner.queue.push_back(key.to_string());
            drop(inner);
            self.notify.notify_one();
        }
    }

    /// Re-enqueues a failed key after its per-key backoff delay.
    pub fn add_rate_limited(self: &Arc<Self>, key: impl Into<String>) {
        let key = key.into();
        let attempt = {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            if inner.shut_down {
                return;
            }
            let counter = inner.requeues.entry(key.clone()).or_insert(0);
            *counter += 1;
            *counter
        };

        let delay = self.backoff.delay_for_attempt(attempt);
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Number of times the key has been re-queued since it was last
    /// forgotten.
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .requeues
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Clears the failure history of a key.
    pub fn forget(&self, key: &str) {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .requeues
            .remove(key);
    }

    /// Stops accepting new keys; workers drain what is queued and then
    /// receive `None`.
    pub fn shut_down(&self) {
        self.inner.lock().expect("queue lock poisoned").shut_down = true;
        self.notify.notify_waiters();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").queue.len()
    }
}

impl Default for RateLimitedQueue {
    fn default() -> Self {
        Self::new(BackoffConfig::DEFAULT)
    }
}
