//! Token-bucket admission control with a bounded, oldest-first wait queue.
//!
//! Two fixed named buckets (`global`, `public`), each refilled on a periodic
//! tick rather than lazily per-acquire, specifically so the tick can also
//! drain queued waiters in FIFO order as tokens free up instead of rejecting
//! outright once a bucket is empty.

use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    Global,
    Public,
}

impl Policy {
    /// Routes explicitly marked `public` (health, metrics, login-shaped auth
    /// endpoints) get the looser policy; everything else gets `global`.
    pub fn for_route(is_public: bool) -> Self {
        if is_public {
            Policy::Public
        } else {
            Policy::Global
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Policy::Global => "global",
            Policy::Public => "public",
        }
    }

    fn config(&self) -> BucketConfig {
        match self {
            Policy::Global => BucketConfig { capacity: 100.0, refill_per_sec: 50.0, queue_depth: 200 },
            Policy::Public => BucketConfig { capacity: 200.0, refill_per_sec: 100.0, queue_depth: 100 },
        }
    }
}

struct BucketConfig {
    capacity: f64,
    refill_per_sec: f64,
    queue_depth: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("rate limit exceeded")]
pub struct RateLimitRejected {
    pub retry_after_secs: u64,
}

struct Bucket {
    config: BucketConfig,
    tokens: Mutex<f64>,
    last_refill: Mutex<Instant>,
    queue: Mutex<VecDeque<Arc<Notify>>>,
}

impl Bucket {
    fn new(config: BucketConfig) -> Arc<Self> {
        Arc::new(Self {
            tokens: Mutex::new(config.capacity),
            last_refill: Mutex::new(Instant::now()),
            queue: Mutex::new(VecDeque::new()),
            config,
        })
    }

    fn try_take(&self) -> bool {
        let mut tokens = self.tokens.lock().unwrap();
        if *tokens >= 1.0 {
            *tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Adds tokens earned since the last tick, then wakes queued waiters in
    /// FIFO order for as many tokens as are now available.
    fn refill_and_dispatch(&self) {
        let now = Instant::now();
        {
            let mut last = self.last_refill.lock().unwrap();
            let elapsed = now.duration_since(*last).as_secs_f64();
            let mut tokens = self.tokens.lock().unwrap();
            *tokens = (*tokens + elapsed * self.config.refill_per_sec).min(self.config.capacity);
            *last = now;
        }

        let mut tokens = self.tokens.lock().unwrap();
        let mut queue = self.queue.lock().unwrap();
        while *tokens >= 1.0 {
            match queue.pop_front() {
                Some(waiter) => {
                    *tokens -= 1.0;
                    waiter.notify_one();
                }
                None => break,
            }
        }
    }

    fn retry_after_secs(&self, queue_len: usize) -> u64 {
        (((queue_len + 1) as f64) / self.config.refill_per_sec).ceil() as u64
    }
}

/// Admits or rejects requests under one of the two fixed named policies.
/// Owns a background tick task per policy for refill/dispatch, started at
/// construction and running for the process lifetime.
pub struct RateLimiter {
    global: Arc<Bucket>,
    public: Arc<Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        let global = Bucket::new(Policy::Global.config());
        let public = Bucket::new(Policy::Public.config());
        spawn_tick_task(global.clone(), Policy::Global.name());
        spawn_tick_task(public.clone(), Policy::Public.name());
        Self { global, public }
    }

    fn bucket(&self, policy: Policy) -> &Arc<Bucket> {
        match policy {
            Policy::Global => &self.global,
            Policy::Public => &self.public,
        }
    }

    /// Admits a request under `policy`, either immediately (a token was
    /// available) or after waiting in the bounded FIFO queue. Rejects with
    /// [`RateLimitRejected`] only when the queue itself is full.
    pub async fn admit(&self, policy: Policy) -> Result<(), RateLimitRejected> {
        let bucket = self.bucket(policy);

        if bucket.try_take() {
            return Ok(());
        }

        let notify = {
            let mut queue = bucket.queue.lock().unwrap();
            if queue.len() >= bucket.config.queue_depth {
                let retry_after_secs = bucket.retry_after_secs(queue.len());
                return Err(RateLimitRejected { retry_after_secs });
            }
            let notify = Arc::new(Notify::new());
            queue.push_back(notify.clone());
            notify
        };

        notify.notified().await;
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_tick_task(bucket: Arc<Bucket>, policy_name: &'static str) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            interval.tick().await;
            bucket.refill_and_dispatch();
        }
    });
    debug!("rate limiter tick task started for policy '{}'", policy_name);
}
