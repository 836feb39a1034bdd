//! Concrete observer implementations.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::constants::PROGRESS_REPORT_THRESHOLD;
use crate::observer::{FrozenObserver, ProgressObserver};
use crate::progress::ProgressUpdate;

/// Observer that forwards updates through a bounded channel.
///
/// Sends never block: when the receiver falls behind, updates are dropped.
pub struct ChannelObserver {
    sender: Sender<ProgressUpdate>,
    last_reported: AtomicU64,
    dropped: AtomicU64,
}

impl ChannelObserver {
    /// Create a new channel observer.
    #[must_use]
    pub fn new(sender: Sender<ProgressUpdate>) -> Self {
        Self {
            sender,
            last_reported: AtomicU64::new(0f64.to_bits()),
            dropped: AtomicU64::new(0),
        }
    }

    /// Updates lost because the channel was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        let last = f64::from_bits(self.last_reported.load(Ordering::Relaxed));
        if update.done || (update.progress - last) >= PROGRESS_REPORT_THRESHOLD {
            if self.sender.try_send(update.clone()).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            self.last_reported
                .store(update.progress.to_bits(), Ordering::Relaxed);
        }
    }

    fn freeze(&self) -> FrozenObserver {
        FrozenObserver::new(PROGRESS_REPORT_THRESHOLD)
    }
}

/// Observer that logs progress through `tracing` with temporal throttling.
pub struct LoggingObserver {
    origin: Instant,
    started: AtomicBool,
    last_reported: AtomicU64,
    last_time_ms: AtomicU64,
    min_interval_ms: u64,
}

impl LoggingObserver {
    /// Create a new logging observer with the given minimum interval.
    #[must_use]
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            origin: Instant::now(),
            started: AtomicBool::new(false),
            last_reported: AtomicU64::new(0f64.to_bits()),
            last_time_ms: AtomicU64::new(0),
            min_interval_ms,
        }
    }
}

impl ProgressObserver for LoggingObserver {
    #[allow(clippy::cast_possible_truncation)]
    fn on_progress(&self, update: &ProgressUpdate) {
        if !self.started.swap(true, Ordering::Relaxed) {
            info!(
                algorithm = update.algorithm,
                calc = update.calc_index,
                total_steps = update.total_steps,
                "Calculation started"
            );
        }
        if update.done {
            info!(
                algorithm = update.algorithm,
                calc = update.calc_index,
                elapsed_ms = self.origin.elapsed().as_millis() as u64,
                "Calculation complete"
            );
            return;
        }

        let now = self.origin.elapsed().as_millis() as u64;
        let last_time = self.last_time_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last_time) < self.min_interval_ms && last_time != 0 {
            return;
        }

        let last = f64::from_bits(self.last_reported.load(Ordering::Relaxed));
        if (update.progress - last) >= PROGRESS_REPORT_THRESHOLD {
            debug!(
                algorithm = update.algorithm,
                progress = format!("{:.1}%", update.progress * 100.0),
                step = update.current_step,
                total = update.total_steps,
                "Progress update"
            );
            self.last_reported
                .store(update.progress.to_bits(), Ordering::Relaxed);
            self.last_time_ms.store(now.max(1), Ordering::Relaxed);
        }
    }

    fn freeze(&self) -> FrozenObserver {
        FrozenObserver::new(PROGRESS_REPORT_THRESHOLD)
    }
}

/// Null object pattern: discards every update.
pub struct NoOpObserver;

impl NoOpObserver {
    /// Create a new no-op observer that discards all progress updates.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoOpObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for NoOpObserver {
    fn on_progress(&self, _update: &ProgressUpdate) {}

    fn freeze(&self) -> FrozenObserver {
        FrozenObserver::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_observer_sends() {
        let (tx, rx) = crossbeam_channel::bounded(10);
        let observer = ChannelObserver::new(tx);

        observer.on_progress(&ProgressUpdate::new(0, "test", 0.5, 1, 2));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.algorithm, "test");
    }

    #[test]
    fn channel_observer_throttles() {
        let (tx, rx) = crossbeam_channel::bounded(10);
        let observer = ChannelObserver::new(tx);

        observer.on_progress(&ProgressUpdate::new(0, "test", 0.015, 1, 200));
        assert!(rx.try_recv().is_ok());

        // 0.015 -> 0.02 is under 1%
        observer.on_progress(&ProgressUpdate::new(0, "test", 0.02, 2, 200));
        assert!(rx.try_recv().is_err());

        observer.on_progress(&ProgressUpdate::new(0, "test", 0.03, 4, 200));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn channel_observer_always_sends_done() {
        let (tx, rx) = crossbeam_channel::bounded(10);
        let observer = ChannelObserver::new(tx);

        observer.on_progress(&ProgressUpdate::new(0, "test", 0.995, 99, 100));
        let _ = rx.try_recv();

        observer.on_progress(&ProgressUpdate::done(0, "test"));
        assert!(rx.try_recv().unwrap().done);
    }

    #[test]
    fn channel_observer_full_channel_drops() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let observer = ChannelObserver::new(tx);

        observer.on_progress(&ProgressUpdate::new(0, "test", 0.02, 1, 100));
        observer.on_progress(&ProgressUpdate::new(0, "test", 0.05, 5, 100));
        assert_eq!(observer.dropped(), 1);
        assert!((rx.try_recv().unwrap().progress - 0.02).abs() < f64::EPSILON);
    }

    #[test]
    fn channel_observer_closed_receiver_is_harmless() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        drop(rx);
        let observer = ChannelObserver::new(tx);
        observer.on_progress(&ProgressUpdate::done(0, "test"));
        assert_eq!(observer.dropped(), 1);
    }

    #[test]
    fn logging_observer_handles_lifecycle() {
        let observer = LoggingObserver::new(60_000);
        observer.on_progress(&ProgressUpdate::new(0, "test", 0.05, 5, 100));
        observer.on_progress(&ProgressUpdate::new(0, "test", 0.10, 10, 100));
        observer.on_progress(&ProgressUpdate::done(0, "test"));
        assert!(observer.started.load(Ordering::Relaxed));
    }

    #[test]
    fn logging_observer_progress_threshold() {
        let observer = LoggingObserver::new(0);
        observer.on_progress(&ProgressUpdate::new(0, "test", 0.015, 1, 100));
        let first = f64::from_bits(observer.last_reported.load(Ordering::Relaxed));
        observer.on_progress(&ProgressUpdate::new(0, "test", 0.016, 2, 100));
        let second = f64::from_bits(observer.last_reported.load(Ordering::Relaxed));
        assert!((first - 0.015).abs() < f64::EPSILON);
        assert!((second - first).abs() < f64::EPSILON);
    }

    #[test]
    fn noop_observer_freeze_never_reports() {
        let observer = NoOpObserver::default();
        observer.on_progress(&ProgressUpdate::new(0, "test", 0.5, 1, 2));
        let frozen = observer.freeze();
        assert!(!frozen.should_report(0.5));
        assert!(!frozen.should_report(0.99));
        assert!(frozen.should_report(1.0));
    }
}
