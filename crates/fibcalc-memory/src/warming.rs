//! Single-flight warm-up latch.
//!
//! Pool pre-warming is bucketed into size tiers. For each tier the warming
//! closure runs at most once per latch; concurrent callers for the same tier
//! block until the first one finishes and then return without repeating it.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Once;

/// Size tier of an expected calculation, derived from the target index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WarmTier {
    /// 10^3 ≤ n < 10^5.
    Small,
    /// 10^5 ≤ n < 10^6.
    Medium,
    /// 10^6 ≤ n < 10^7.
    Large,
    /// n ≥ 10^7.
    Huge,
}

impl WarmTier {
    /// Indices below this are too small to be worth warming for.
    pub const MIN_INDEX: u64 = 1_000;

    /// All tiers in ascending order.
    pub const ALL: [Self; 4] = [Self::Small, Self::Medium, Self::Large, Self::Huge];

    /// Tier for an expected Fibonacci index, or `None` when warming is pointless.
    #[must_use]
    pub fn for_index(n: u64) -> Option<Self> {
        match n {
            0..Self::MIN_INDEX => None,
            Self::MIN_INDEX..100_000 => Some(Self::Small),
            100_000..1_000_000 => Some(Self::Medium),
            1_000_000..10_000_000 => Some(Self::Large),
            _ => Some(Self::Huge),
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Small => 0,
            Self::Medium => 1,
            Self::Large => 2,
            Self::Huge => 3,
        }
    }
}

/// One `Once` per tier plus a counter of executed warm-ups.
pub struct WarmupLatch {
    tiers: [Once; 4],
    runs: AtomicUsize,
}

impl WarmupLatch {
    /// A latch with every tier still pending.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tiers: [Once::new(), Once::new(), Once::new(), Once::new()],
            runs: AtomicUsize::new(0),
        }
    }

    /// Run `warm` for `tier` unless it already ran. Returns `true` if this
    /// call did the work.
    pub fn run_once(&self, tier: WarmTier, warm: impl FnOnce()) -> bool {
        let mut ran = false;
        self.tiers[tier.slot()].call_once(|| {
            warm();
            ran = true;
        });
        if ran {
            self.runs.fetch_add(1, Ordering::Relaxed);
        }
        ran
    }

    /// Whether `tier` has been warmed.
    #[must_use]
    pub fn is_done(&self, tier: WarmTier) -> bool {
        self.tiers[tier.slot()].state().done()
    }

    /// Total warm-ups executed through this latch.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::Relaxed)
    }
}

impl Default for WarmupLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn tier_boundaries() {
        assert_eq!(WarmTier::for_index(999), None);
        assert_eq!(WarmTier::for_index(1_000), Some(WarmTier::Small));
        assert_eq!(WarmTier::for_index(100_000), Some(WarmTier::Medium));
        assert_eq!(WarmTier::for_index(9_999_999), Some(WarmTier::Large));
        assert_eq!(WarmTier::for_index(u64::MAX), Some(WarmTier::Huge));
    }

    #[test]
    fn runs_once_per_tier() {
        let latch = WarmupLatch::new();
        assert!(latch.run_once(WarmTier::Small, || {}));
        assert!(!latch.run_once(WarmTier::Small, || panic!("must not rerun")));
        assert!(latch.run_once(WarmTier::Large, || {}));
        assert!(latch.is_done(WarmTier::Small));
        assert!(!latch.is_done(WarmTier::Medium));
        assert_eq!(latch.runs(), 2);
    }

    #[test]
    fn concurrent_callers_single_flight() {
        let latch = Arc::new(WarmupLatch::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let latch = Arc::clone(&latch);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    latch.run_once(WarmTier::Huge, || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(5));
                    });
                    assert!(latch.is_done(WarmTier::Huge));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(latch.runs(), 1);
    }
}
