//! Sample-rate negotiation shared between the graph's notification thread
//! and the session.
//!
//! The first rate wins for the lifetime of the session. Repeating it is
//! fine; any other value is a [`ConfigError::SampleRateConflict`], because
//! running the graph and the device at different rates would need a
//! resampler.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::ConfigError;

/// Outcome of a successful negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    /// This call fixed the session rate; devices must be configured for it.
    Fixed(u32),
    /// The rate was already fixed at this value.
    Unchanged(u32),
}

impl RateDecision {
    pub fn rate(&self) -> u32 {
        match *self {
            RateDecision::Fixed(rate) | RateDecision::Unchanged(rate) => rate,
        }
    }
}

/// Write-once sample rate. Safe to consult from any thread without locking.
#[derive(Debug, Default)]
pub struct SampleRateLock {
    // 0 = not negotiated yet
    rate: AtomicU32,
}

impl SampleRateLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a rate reported by the graph.
    pub fn negotiate(&self, rate: u32) -> Result<RateDecision, ConfigError> {
        if rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        match self.rate.compare_exchange(0, rate, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => Ok(RateDecision::Fixed(rate)),
            Err(fixed) if fixed == rate => Ok(RateDecision::Unchanged(rate)),
            Err(fixed) => Err(ConfigError::SampleRateConflict {
                fixed,
                requested: rate,
            }),
        }
    }

    /// The negotiated rate, if any.
    pub fn get(&self) -> Option<u32> {
        match self.rate.load(Ordering::Acquire) {
            0 => None,
            rate => Some(rate),
        }
    }
}
