//! Observer pattern for progress tracking.
//!
//! Loops call [`ProgressObserver::freeze`] once and then consult the
//! returned [`FrozenObserver`] on every iteration, so the hot path only
//! touches an atomic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::constants::PROGRESS_REPORT_THRESHOLD;
use crate::progress::{work_progress, ProgressUpdate};

/// Observer trait for receiving progress updates.
pub trait ProgressObserver: Send + Sync {
    /// Receive a progress update.
    fn on_progress(&self, update: &ProgressUpdate);

    /// Create a frozen snapshot for lock-free access in hot loops.
    fn freeze(&self) -> FrozenObserver;
}

/// Throttle for hot loops: tracks the last reported value.
pub struct FrozenObserver {
    progress: AtomicU64,
    threshold: f64,
}

impl FrozenObserver {
    /// Create a new frozen observer with the given reporting threshold.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            progress: AtomicU64::new(0f64.to_bits()),
            threshold,
        }
    }

    /// Check if progress has changed enough to warrant reporting.
    #[inline]
    #[must_use]
    pub fn should_report(&self, new_progress: f64) -> bool {
        (new_progress - self.current()) >= self.threshold
    }

    /// Reporting rule of the calculation loops: the first and last steps
    /// always report, others only after a full threshold of progress.
    #[inline]
    #[must_use]
    pub fn should_report_step(&self, new_progress: f64, first: bool, last: bool) -> bool {
        first || last || self.should_report(new_progress)
    }

    /// Update the stored progress value.
    pub fn update(&self, new_progress: f64) {
        self.progress
            .store(new_progress.to_bits(), Ordering::Relaxed);
    }

    /// Get the current progress value.
    #[must_use]
    pub fn current(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }
}

impl Default for FrozenObserver {
    fn default() -> Self {
        Self::new(PROGRESS_REPORT_THRESHOLD)
    }
}

/// Per-loop progress reporting over the bits of the index.
pub struct StepReporter<'a> {
    observer: &'a dyn ProgressObserver,
    frozen: FrozenObserver,
    calc_index: usize,
    algorithm: &'static str,
    total: u32,
}

impl<'a> StepReporter<'a> {
    /// Reporter for a loop of `total` steps.
    #[must_use]
    pub fn new(
        observer: &'a dyn ProgressObserver,
        calc_index: usize,
        algorithm: &'static str,
        total: u32,
    ) -> Self {
        Self {
            observer,
            frozen: observer.freeze(),
            calc_index,
            algorithm,
            total,
        }
    }

    /// Record that `done` steps have finished.
    pub fn step(&self, done: u32) {
        let progress = work_progress(done, self.total);
        if self
            .frozen
            .should_report_step(progress, done == 1, done >= self.total)
        {
            self.frozen.update(progress);
            self.observer.on_progress(&ProgressUpdate::new(
                self.calc_index,
                self.algorithm,
                progress,
                u64::from(done),
                u64::from(self.total),
            ));
        }
    }
}

/// Fans each update out to every registered observer.
pub struct ProgressSubject {
    observers: RwLock<Vec<Arc<dyn ProgressObserver>>>,
}

impl ProgressSubject {
    /// Create a new subject with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register an observer.
    pub fn register(&self, observer: Arc<dyn ProgressObserver>) {
        self.observers.write().push(observer);
    }

    /// Unregister all observers.
    pub fn clear(&self) {
        self.observers.write().clear();
    }

    /// Notify all observers of a progress update.
    pub fn notify(&self, update: &ProgressUpdate) {
        let observers = self.observers.read();
        for observer in observers.iter() {
            observer.on_progress(update);
        }
    }

    /// Get the number of registered observers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for ProgressSubject {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressSubject {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.notify(update);
    }

    fn freeze(&self) -> FrozenObserver {
        FrozenObserver::new(PROGRESS_REPORT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingObserver {
        count: AtomicUsize,
    }

    impl CountingObserver {
        fn new() -> Self {
            Self {
                count: AtomicUsize::new(0),
            }
        }
    }

    impl ProgressObserver for CountingObserver {
        fn on_progress(&self, _update: &ProgressUpdate) {
            self.count.fetch_add(1, Ordering::Relaxed);
        }

        fn freeze(&self) -> FrozenObserver {
            FrozenObserver::default()
        }
    }

    #[test]
    fn frozen_observer_should_report() {
        let frozen = FrozenObserver::new(PROGRESS_REPORT_THRESHOLD);
        assert!(frozen.should_report(0.02));
        frozen.update(0.02);
        assert!(!frozen.should_report(0.025));
        assert!(frozen.should_report(0.04));
    }

    #[test]
    fn frozen_observer_initial_progress_is_zero() {
        let frozen = FrozenObserver::new(0.05);
        assert!((frozen.current() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn frozen_observer_should_report_exact_threshold() {
        let frozen = FrozenObserver::new(0.1);
        assert!(frozen.should_report(0.1));
        frozen.update(0.1);
        assert!(!frozen.should_report(0.15));
        assert!(frozen.should_report(0.2));
    }

    #[test]
    fn first_and_last_steps_always_report() {
        let frozen = FrozenObserver::new(PROGRESS_REPORT_THRESHOLD);
        assert!(frozen.should_report_step(0.000_001, true, false));
        frozen.update(0.995);
        assert!(!frozen.should_report_step(0.999, false, false));
        assert!(frozen.should_report_step(0.999, false, true));
    }

    #[derive(Default)]
    struct Recording(parking_lot::Mutex<Vec<f64>>);

    impl ProgressObserver for Recording {
        fn on_progress(&self, update: &ProgressUpdate) {
            self.0.lock().push(update.progress);
        }

        fn freeze(&self) -> FrozenObserver {
            FrozenObserver::default()
        }
    }

    #[test]
    fn step_reporter_is_monotone_and_finishes() {
        let obs = Recording::default();
        let reporter = StepReporter::new(&obs, 0, "test", 40);
        for done in 1..=40 {
            reporter.step(done);
        }
        let seen = obs.0.lock();
        assert!(seen.len() >= 2);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!((seen[seen.len() - 1] - 1.0).abs() < f64::EPSILON);
        // Early steps carry almost no work but the first one still reports.
        assert!(seen[0] < 1e-12);
    }

    #[test]
    fn step_reporter_throttles() {
        let obs = Recording::default();
        let reporter = StepReporter::new(&obs, 0, "test", 30);
        for done in 1..=30 {
            reporter.step(done);
        }
        // 30 steps, but the first ~20 each move progress by far less than 1%.
        assert!(obs.0.lock().len() < 15);
    }

    #[test]
    fn subject_register_and_clear() {
        let subject = ProgressSubject::new();
        assert_eq!(subject.count(), 0);
        subject.register(Arc::new(CountingObserver::new()));
        subject.register(Arc::new(CountingObserver::new()));
        assert_eq!(subject.count(), 2);
        subject.clear();
        assert_eq!(subject.count(), 0);
    }

    #[test]
    fn subject_notify_calls_all_observers() {
        let subject = ProgressSubject::new();
        let obs1 = Arc::new(CountingObserver::new());
        let obs2 = Arc::new(CountingObserver::new());

        subject.register(obs1.clone());
        subject.register(obs2.clone());

        let update = ProgressUpdate::new(0, "test", 0.5, 1, 2);
        subject.notify(&update);
        subject.on_progress(&update);

        assert_eq!(obs1.count.load(Ordering::Relaxed), 2);
        assert_eq!(obs2.count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn subject_notify_empty_does_not_panic() {
        let subject = ProgressSubject::default();
        subject.notify(&ProgressUpdate::new(0, "test", 0.5, 1, 2));
    }
}
