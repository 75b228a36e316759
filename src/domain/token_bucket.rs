//! Token bucket used by the throttle filter.
//!
//! A bucket holds at most `rate` tokens. Tokens are refilled in whole units
//! at `rate` per second and a batch of N records is admitted only if N tokens
//! are available.

use parking_lot::Mutex;
use std::num::NonZeroU32;
use std::time::Instant;

const MICROS_PER_SEC: u128 = 1_000_000;

/// Decision for one batch of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// The whole batch passes
    Admit,
    /// The whole batch is dropped
    Deny,
}

impl ThrottleDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, ThrottleDecision::Admit)
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, ThrottleDecision::Deny)
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

/// Per-key token bucket guarded by its own lock.
///
/// Invariant: `0 <= tokens <= capacity` at all times.
#[derive(Debug)]
pub struct TokenBucket {
    rate: u64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket whose capacity equals `rate`.
    pub fn new(rate: NonZeroU32, now: Instant) -> Self {
        let rate = u64::from(rate.get());
        Self {
            rate,
            state: Mutex::new(BucketState {
                tokens: rate,
                last_refill: now,
            }),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.rate
    }

    /// Tokens currently available.
    pub fn tokens(&self) -> u64 {
        self.state.lock().tokens
    }

    /// Add the whole tokens earned since the last refill.
    ///
    /// The refill time only advances when at least one token was earned, so
    /// fractional progress is kept for the next call.
    pub fn refill(&self, now: Instant) {
        let mut state = self.state.lock();
        self.refill_locked(&mut state, now);
    }

    /// Take `count` tokens if that many are available.
    pub fn try_consume(&self, count: u64) -> ThrottleDecision {
        let mut state = self.state.lock();
        Self::consume_locked(&mut state, count)
    }

    /// Refill, then try to consume `count` tokens, under one lock acquisition.
    pub fn process(&self, count: u64, now: Instant) -> ThrottleDecision {
        let mut state = self.state.lock();
        self.refill_locked(&mut state, now);
        Self::consume_locked(&mut state, count)
    }

    fn refill_locked(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        let earned = elapsed.as_micros() * u128::from(self.rate) / MICROS_PER_SEC;
        if earned > 0 {
            let earned = u64::try_from(earned).unwrap_or(u64::MAX);
            state.tokens = state.tokens.saturating_add(earned).min(self.rate);
            state.last_refill = now;
        }
    }

    fn consume_locked(state: &mut BucketState, count: u64) -> ThrottleDecision {
        if state.tokens >= count {
            state.tokens -= count;
            ThrottleDecision::Admit
        } else {
            ThrottleDecision::Deny
        }
    }
}
