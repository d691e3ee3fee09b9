//! Shared simulation clock.
//!
//! A component owns one clock and hands clones to the delay lines and
//! filters it creates, so their once-per-tick bookkeeping sees the same
//! time the component is stepping at. Clones share storage.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Debug, Default)]
pub struct SimClock {
    bits: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new(t: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(t.to_bits())),
        }
    }

    #[inline]
    pub fn time(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, t: f64) {
        self.bits.store(t.to_bits(), Ordering::Relaxed);
    }

    /// True when both handles refer to the same clock.
    pub fn same_as(&self, other: &SimClock) -> bool {
        Arc::ptr_eq(&self.bits, &other.bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = SimClock::new(0.5);
        let view = clock.clone();
        clock.set(1.25);
        assert_eq!(view.time(), 1.25);
        assert!(view.same_as(&clock));
        assert!(!view.same_as(&SimClock::new(1.25)));
    }
}
