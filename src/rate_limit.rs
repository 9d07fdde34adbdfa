//! Fixed-window rate limiting keyed by caller and action.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Eviction only kicks in once the table holds this many counters, so quiet
/// deployments never pay for it.
const MAX_ENTRIES: usize = 10_000;

/// Identity used when the caller's address is unknown. All anonymous callers
/// share one counter; a documented limitation, not a bug.
pub const UNKNOWN_IDENTITY: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u32,
    window_start: Instant,
}

/// In-process fixed-window request counter.
///
/// A counter resets to 1 once its window has elapsed; within the window the
/// check happens before granting, so a window admits exactly `max_requests`
/// calls. Window reset on expiry allows up to twice the limit across a
/// window boundary (classic fixed-window looseness, kept deliberately).
///
/// State is process-wide and not durable; a restart clears all limits, and
/// multiple instances enforce limits independently.
#[derive(Debug, Default)]
pub struct RateLimiter {
    counters: Mutex<HashMap<String, Counter>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt for `(scope, identity)` and report whether it is
    /// within the window's capacity.
    pub fn allow(
        &self,
        scope: &str,
        identity: Option<&str>,
        window: Duration,
        max_requests: u32,
    ) -> bool {
        self.allow_at(Instant::now(), scope, identity, window, max_requests)
    }

    /// Clock-injected variant of [`allow`](Self::allow) used by tests.
    pub fn allow_at(
        &self,
        now: Instant,
        scope: &str,
        identity: Option<&str>,
        window: Duration,
        max_requests: u32,
    ) -> bool {
        let key = format!("{scope}:{}", identity.unwrap_or(UNKNOWN_IDENTITY));

        let mut counters = self.counters.lock().expect("rate limiter lock poisoned");

        if counters.len() >= MAX_ENTRIES {
            let before = counters.len();
            prune_expired(&mut counters, now, window);
            debug!(
                evicted = before - counters.len(),
                remaining = counters.len(),
                "Pruned stale rate-limit counters"
            );
        }

        match counters.get_mut(&key) {
            Some(counter) if now.duration_since(counter.window_start) < window => {
                if counter.count + 1 > max_requests {
                    return false;
                }
                counter.count += 1;
            }
            _ => {
                counters.insert(
                    key,
                    Counter {
                        count: 1,
                        window_start: now,
                    },
                );
            }
        }

        true
    }
}

/// Drop counters whose window start is more than two windows in the past.
fn prune_expired(counters: &mut HashMap<String, Counter>, now: Instant, window: Duration) {
    counters.retain(|_, counter| now.duration_since(counter.window_start) <= window * 2);
}
