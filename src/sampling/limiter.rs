//! A token-bucket rate limiter, used by both [`super::trace_sampler`] and
//! [`super::span_sampler`] to cap the absolute number of kept
//! traces/spans per second regardless of the configured sampling rate.

use std::sync::Mutex;
use std::time::Instant;

/// Token bucket with a max fill rate of `max_per_second` tokens, refilled
/// continuously based on elapsed wall-clock time. Also tracks a short
/// rolling count of requests vs. grants so callers can report an
/// `effective_rate`, surfaced as `SamplingDecision::limiter_effective_rate`.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_second: f64,
    state: Mutex<LimiterState>,
}

#[derive(Debug)]
struct LimiterState {
    tokens: f64,
    last_refill: Instant,
    requested: u64,
    allowed: u64,
}

impl RateLimiter {
    pub fn new(max_per_second: f64) -> Self {
        RateLimiter {
            max_per_second,
            state: Mutex::new(LimiterState {
                tokens: max_per_second,
                last_refill: Instant::now(),
                requested: 0,
                allowed: 0,
            }),
        }
    }

    pub fn max_per_second(&self) -> f64 {
        self.max_per_second
    }

    /// Attempt to take one token. Returns whether the caller may proceed.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.max_per_second).min(self.max_per_second);
        state.last_refill = now;

        state.requested += 1;
        let allow = state.tokens >= 1.0;
        if allow {
            state.tokens -= 1.0;
            state.allowed += 1;
        }
        allow
    }

    /// The fraction of requests actually allowed so far, used to populate
    /// `limiter_effective_rate` on the decision.
    pub fn effective_rate(&self) -> f64 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.requested == 0 {
            1.0
        } else {
            state.allowed as f64 / state.requested as f64
        }
    }
}
