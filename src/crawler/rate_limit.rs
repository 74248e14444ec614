//! Shared per-domain rate limiter
//!
//! Every request, retries included, reserves one slot for its domain. The
//! domain table sits behind a std mutex that is released before sleeping, so
//! workers wait on the clock rather than on each other.

use crate::state::DomainState;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Enforces a minimum spacing between requests to the same domain
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    domains: Mutex<HashMap<String, DomainState>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Waits until the next request slot for `domain` opens
    pub async fn acquire(&self, domain: &str) {
        let slot = self.reserve(domain, Instant::now());

        let now = Instant::now();
        if slot > now {
            tracing::trace!(domain, wait_ms = (slot - now).as_millis() as u64, "Waiting for rate limit slot");
            tokio::time::sleep_until(tokio::time::Instant::from_std(slot)).await;
        }
    }

    /// Reserves a slot without waiting and returns when it starts
    pub fn reserve(&self, domain: &str, now: Instant) -> Instant {
        self.lock()
            .entry(domain.to_string())
            .or_default()
            .reserve(now, self.min_delay)
    }

    /// Delays the domain's next slot after an HTTP 429
    pub fn penalize(&self, domain: &str, cooldown: Duration) {
        let mut domains = self.lock();
        let state = domains.entry(domain.to_string()).or_default();
        state.penalize(Instant::now(), cooldown);
        tracing::warn!(
            domain,
            cooldown_ms = cooldown.as_millis() as u64,
            throttled = state.throttle_count,
            "Domain is throttling requests"
        );
    }

    /// Number of slots handed out for `domain`
    pub fn requests_made(&self, domain: &str) -> u32 {
        self.lock()
            .get(domain)
            .map(|state| state.request_count)
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DomainState>> {
        self.domains.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
