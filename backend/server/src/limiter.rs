//! # Rate Limiting
//!
//! Sliding window log per client identity.
//!
//! ## Buckets
//! - Keyed by identity string, holds the request instants still inside the trailing window
//! - Created on the first request from an identity
//! - A request is rejected once the window already holds `max_requests` entries
//!
//! ## Housekeeping
//! - A fraction of requests (`gc_probability`) sweeps the whole map
//! - Buckets not cleaned for `housekeeping_interval` are pruned, empty ones are dropped
//! - Keeps memory bounded without a background task
//!
//! ## Notes
//! - Process local. Several server instances each keep their own view, moving the buckets to
//!   Redis counters with expiry is the way out if that ever matters.
//! - Rejected requests are not recorded, so a throttled client is let back in as soon as its
//!   oldest recorded request leaves the window.
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use dashmap::{DashMap, mapref::one::RefMut};
use rand::Rng;
use tracing::debug;

use crate::{config::Config, error::AppError, identity::ClientIdentity};

#[derive(Debug)]
struct Bucket {
    hits: VecDeque<Instant>,
    last_cleanup: Instant,
}

impl Bucket {
    fn new(now: Instant) -> Self {
        Self {
            hits: VecDeque::new(),
            last_cleanup: now,
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.hits.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    max_requests: usize,
    window: Duration,
    housekeeping_interval: Duration,
    gc_probability: f64,
}

impl RateLimiter {
    /// `max_requests = 0` disables the limiter.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            max_requests,
            window,
            housekeeping_interval: Duration::from_secs(300),
            gc_probability: 0.1,
        }
    }

    pub fn with_housekeeping(mut self, interval: Duration, probability: f64) -> Self {
        self.housekeeping_interval = interval;
        self.gc_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn check(&self, key: &str) -> Result<(), AppError> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), AppError> {
        self.maybe_sweep(now);

        if let Some(mut bucket) = self.bucket(key, now) {
            self.admit(&mut bucket, now)?;
            bucket.hits.push_back(now);
        }

        Ok(())
    }

    // Must run before any entry guard is taken, retain locks every shard
    fn maybe_sweep(&self, now: Instant) {
        if self.max_requests > 0
            && self.gc_probability > 0.0
            && rand::rng().random_bool(self.gc_probability)
        {
            self.sweep_at(now);
        }
    }

    /// `None` when the limiter is disabled.
    fn bucket(&self, key: &str, now: Instant) -> Option<RefMut<'_, String, Bucket>> {
        (self.max_requests > 0).then(|| {
            self.buckets
                .entry(key.to_string())
                .or_insert_with(|| Bucket::new(now))
        })
    }

    /// Prunes and tests the bucket without recording anything.
    fn admit(&self, bucket: &mut Bucket, now: Instant) -> Result<(), AppError> {
        bucket.prune(now, self.window);

        if bucket.hits.len() < self.max_requests {
            return Ok(());
        }

        let retry_after = bucket
            .hits
            .front()
            .map(|oldest| {
                self.window
                    .saturating_sub(now.saturating_duration_since(*oldest))
            })
            .unwrap_or(self.window);

        Err(AppError::RateLimited { retry_after })
    }

    pub fn sweep_at(&self, now: Instant) {
        let before = self.buckets.len();

        self.buckets.retain(|_, bucket| {
            if now.saturating_duration_since(bucket.last_cleanup) >= self.housekeeping_interval {
                bucket.prune(now, self.window);
                bucket.last_cleanup = now;
            }

            !bucket.hits.is_empty()
        });

        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!("Rate limiter dropped {removed} idle buckets");
        }
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

/// Limits on two independent signals, a request has to pass both.
#[derive(Debug)]
pub struct ClientLimiter {
    ip: RateLimiter,
    session: RateLimiter,
}

impl ClientLimiter {
    pub fn new(ip: RateLimiter, session: RateLimiter) -> Self {
        Self { ip, session }
    }

    pub fn from_config(config: &Config) -> Self {
        let limiter = |max_requests| {
            RateLimiter::new(max_requests, config.rate_window)
                .with_housekeeping(config.housekeeping_interval, config.gc_probability)
        };

        Self::new(
            limiter(config.ip_rate_limit),
            limiter(config.session_rate_limit),
        )
    }

    pub fn check(&self, identity: &ClientIdentity) -> Result<(), AppError> {
        self.check_at(identity, Instant::now())
    }

    /// IP first, so the IP limit decides when both would reject. Both buckets are tested before
    /// either records, guards are always taken IP then session.
    pub fn check_at(&self, identity: &ClientIdentity, now: Instant) -> Result<(), AppError> {
        self.ip.maybe_sweep(now);
        self.session.maybe_sweep(now);

        let mut ip = self.ip.bucket(&identity.ip, now);
        if let Some(bucket) = ip.as_deref_mut() {
            self.ip.admit(bucket, now)?;
        }

        let mut session = identity
            .session
            .as_deref()
            .and_then(|session| self.session.bucket(session, now));
        if let Some(bucket) = session.as_deref_mut() {
            self.session.admit(bucket, now)?;
        }

        for mut bucket in [ip, session].into_iter().flatten() {
            bucket.hits.push_back(now);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    fn limiter(max_requests: usize) -> RateLimiter {
        RateLimiter::new(max_requests, WINDOW).with_housekeeping(Duration::from_secs(300), 0.0)
    }

    fn identity(ip: &str, session: Option<&str>) -> ClientIdentity {
        ClientIdentity {
            ip: ip.to_string(),
            session: session.map(str::to_string),
        }
    }

    #[test]
    fn test_fourth_request_in_window_rejected() {
        let limiter = limiter(3);
        let start = Instant::now();

        for i in 0..3 {
            assert!(limiter.check_at("1.2.3.4", start + Duration::from_secs(i)).is_ok());
        }

        let err = limiter
            .check_at("1.2.3.4", start + Duration::from_secs(10))
            .unwrap_err();

        match err {
            AppError::RateLimited { retry_after } => assert_eq!(retry_after, Duration::from_secs(50)),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_allowed_after_window_elapses() {
        let limiter = limiter(3);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.check_at("1.2.3.4", start).unwrap();
        }
        assert!(limiter.check_at("1.2.3.4", start + Duration::from_secs(59)).is_err());

        assert!(limiter.check_at("1.2.3.4", start + WINDOW).is_ok());
    }

    #[test]
    fn test_identities_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert!(limiter.check_at("a", now).is_ok());
        assert!(limiter.check_at("a", now).is_err());
        assert!(limiter.check_at("b", now).is_ok());
    }

    #[test]
    fn test_zero_limit_disables() {
        let limiter = limiter(0);
        let now = Instant::now();

        for _ in 0..100 {
            assert!(limiter.check_at("a", now).is_ok());
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_sweep_drops_idle_buckets() {
        let limiter = limiter(5);
        let start = Instant::now();

        limiter.check_at("old", start).unwrap();
        limiter.check_at("fresh", start + Duration::from_secs(299)).unwrap();
        assert_eq!(limiter.tracked(), 2);

        // Not due for cleanup yet
        limiter.sweep_at(start + Duration::from_secs(120));
        assert_eq!(limiter.tracked(), 2);

        // "old" has aged out, "fresh" is still inside its window
        limiter.sweep_at(start + Duration::from_secs(320));
        assert_eq!(limiter.tracked(), 1);
        assert!(limiter.check_at("fresh", start + Duration::from_secs(320)).is_ok());
    }

    #[test]
    fn test_certain_gc_runs_on_request() {
        let limiter = RateLimiter::new(5, WINDOW).with_housekeeping(Duration::from_secs(300), 1.0);
        let start = Instant::now();

        limiter.check_at("old", start).unwrap();
        limiter.check_at("new", start + Duration::from_secs(600)).unwrap();

        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_dual_keys_need_both() {
        let limiter = ClientLimiter::new(limiter(3), limiter(2));
        let now = Instant::now();

        // Same session hopping between addresses trips the session limit
        assert!(limiter.check_at(&identity("1.1.1.1", Some("s1")), now).is_ok());
        assert!(limiter.check_at(&identity("2.2.2.2", Some("s1")), now).is_ok());
        assert!(limiter.check_at(&identity("3.3.3.3", Some("s1")), now).is_err());

        // Fresh sessions from one address trip the IP limit
        assert!(limiter.check_at(&identity("9.9.9.9", Some("a")), now).is_ok());
        assert!(limiter.check_at(&identity("9.9.9.9", Some("b")), now).is_ok());
        assert!(limiter.check_at(&identity("9.9.9.9", Some("c")), now).is_ok());
        assert!(limiter.check_at(&identity("9.9.9.9", Some("d")), now).is_err());
    }

    #[test]
    fn test_missing_session_only_checks_ip() {
        let limiter = ClientLimiter::new(limiter(2), limiter(1));
        let now = Instant::now();

        assert!(limiter.check_at(&identity("1.1.1.1", None), now).is_ok());
        assert!(limiter.check_at(&identity("1.1.1.1", None), now).is_ok());
        assert!(limiter.check_at(&identity("1.1.1.1", None), now).is_err());
    }

    #[test]
    fn test_session_rejection_keeps_ip_quota() {
        let limiter = ClientLimiter::new(limiter(3), limiter(1));
        let now = Instant::now();

        assert!(limiter.check_at(&identity("10.0.0.1", Some("noisy")), now).is_ok());
        assert!(limiter.check_at(&identity("10.0.0.1", Some("noisy")), now).is_err());
        assert!(limiter.check_at(&identity("10.0.0.1", Some("noisy")), now).is_err());

        // Neighbours behind the same address still have two votes left
        assert!(limiter.check_at(&identity("10.0.0.1", None), now).is_ok());
        assert!(limiter.check_at(&identity("10.0.0.1", Some("quiet")), now).is_ok());
        assert!(limiter.check_at(&identity("10.0.0.1", None), now).is_err());
    }

    #[test]
    fn test_ip_rejection_keeps_session_quota() {
        let limiter = ClientLimiter::new(limiter(1), limiter(2));
        let now = Instant::now();

        assert!(limiter.check_at(&identity("1.1.1.1", Some("s1")), now).is_ok());
        assert!(limiter.check_at(&identity("1.1.1.1", Some("s1")), now).is_err());

        // Only one session hit was recorded
        assert!(limiter.check_at(&identity("2.2.2.2", Some("s1")), now).is_ok());
        assert!(limiter.check_at(&identity("3.3.3.3", Some("s1")), now).is_err());
    }

    #[test]
    fn test_concurrent_requests_are_counted_once_each() {
        let limiter = Arc::new(limiter(50));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                thread::spawn(move || {
                    (0..20)
                        .filter(|_| limiter.check_at("shared", now).is_ok())
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(allowed, 50);
    }
}
