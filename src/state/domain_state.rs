use std::time::{Duration, Instant};

/// Tracks request spacing for one domain
///
/// Workers reserve request slots ahead of time: each reservation pushes the
/// next free slot back by the minimum delay, so concurrent workers touching
/// the same domain are serialized without holding a lock while they sleep.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of slots handed out for this domain
    pub request_count: u32,

    /// Earliest instant the next request may start
    pub next_slot: Option<Instant>,

    /// Number of times the domain answered HTTP 429
    pub throttle_count: u32,
}

impl DomainState {
    /// Reserves the next request slot and returns when it starts
    ///
    /// The returned instant is never earlier than `now`. The following slot
    /// is placed `min_delay` after the reserved one.
    pub fn reserve(&mut self, now: Instant, min_delay: Duration) -> Instant {
        let slot = match self.next_slot {
            Some(next) if next > now => next,
            _ => now,
        };

        self.next_slot = Some(slot + min_delay);
        self.request_count += 1;
        slot
    }

    /// Pushes the next slot back after the domain asked us to slow down
    pub fn penalize(&mut self, now: Instant, cooldown: Duration) {
        let until = now + cooldown;
        self.next_slot = Some(match self.next_slot {
            Some(next) if next > until => next,
            _ => until,
        });
        self.throttle_count += 1;
    }
}
