//! Progress tracking, observation and cancellation for extraction runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Observer notified after each committed progress snapshot.
///
/// Called on the worker's execution context; implementations should hand
/// the snapshot off rather than block.
pub trait ProgressObserver: Send + Sync {
    /// A new snapshot became visible
    fn progress_changed(&self, snapshot: &ProgressSnapshot);
}

/// Phases an extraction run moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionPhase {
    /// Checking input and output locations
    Validating,
    /// Reading video metadata
    Probing,
    /// Deriving the output resolution and frame rate
    Planning,
    /// The extraction subprocess is running
    Extracting,
    /// Terminal: all frames written
    Completed,
    /// Terminal: cancellation honored
    Cancelled,
    /// Terminal: the run failed
    Failed,
}

/// A point-in-time view of extraction progress.
///
/// The pair `(numerator, denominator)` is `(-1, 1)` while the total amount
/// of work is not yet known; otherwise `numerator / denominator` is a
/// fraction in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Current phase
    pub phase: ExtractionPhase,
    /// Work completed, or -1 when indeterminate
    pub numerator: i64,
    /// Total work, or 1 when indeterminate
    pub denominator: i64,
    /// Free-text status, updated at each phase transition and progress line
    pub message: String,
}

impl ProgressSnapshot {
    /// Snapshot for a phase whose total work is not yet known
    pub fn indeterminate<M: Into<String>>(phase: ExtractionPhase, message: M) -> Self {
        Self {
            phase,
            numerator: -1,
            denominator: 1,
            message: message.into(),
        }
    }

    /// Snapshot with a known completed/total work pair
    pub fn ratio<M: Into<String>>(
        phase: ExtractionPhase,
        numerator: i64,
        denominator: i64,
        message: M,
    ) -> Self {
        Self {
            phase,
            numerator,
            denominator,
            message: message.into(),
        }
    }

    /// Whether the total amount of work is still unknown
    pub fn is_indeterminate(&self) -> bool {
        self.numerator < 0
    }

    /// Fraction complete in `[0, 1]`, or `None` when indeterminate
    pub fn fraction(&self) -> Option<f64> {
        if self.is_indeterminate() || self.denominator <= 0 {
            return None;
        }
        Some((self.numerator as f64 / self.denominator as f64).clamp(0.0, 1.0))
    }
}

/// Thread-safe progress state shared between one extraction worker and any
/// number of observers.
///
/// Snapshots are written whole under a single lock, so a reader always sees
/// a complete update (last-write-wins). Cancellation is a monotonic flag
/// set from an observer's context and polled by the worker.
#[derive(Clone)]
pub struct ProgressTracker {
    snapshot: Arc<Mutex<ProgressSnapshot>>,
    observers: Arc<Mutex<Vec<Arc<dyn ProgressObserver>>>>,
    cancel_requested: Arc<AtomicBool>,
}

impl ProgressTracker {
    /// Create a tracker in the initial indeterminate state
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(ProgressSnapshot::indeterminate(
                ExtractionPhase::Validating,
                "Starting process",
            ))),
            observers: Arc::new(Mutex::new(Vec::new())),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe an observer to future snapshots
    pub fn subscribe(&self, observer: Arc<dyn ProgressObserver>) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(observer);
        }
    }

    /// Request cooperative cancellation of the running extraction.
    ///
    /// The worker polls this flag before reading each subprocess line, so
    /// latency is bounded by the time to read one more line of output.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// The most recently committed snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot
            .lock()
            .map(|snapshot| snapshot.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Commit a snapshot and notify observers
    pub(crate) fn update(&self, snapshot: ProgressSnapshot) {
        if let Ok(mut current) = self.snapshot.lock() {
            *current = snapshot.clone();
        }
        if let Ok(observers) = self.observers.lock() {
            for observer in observers.iter() {
                observer.progress_changed(&snapshot);
            }
        }
    }

    /// Commit an indeterminate snapshot
    pub(crate) fn set_indeterminate<M: Into<String>>(&self, phase: ExtractionPhase, message: M) {
        self.update(ProgressSnapshot::indeterminate(phase, message));
    }

    /// Commit a determinate snapshot
    pub(crate) fn set_ratio<M: Into<String>>(
        &self,
        phase: ExtractionPhase,
        numerator: i64,
        denominator: i64,
        message: M,
    ) {
        self.update(ProgressSnapshot::ratio(phase, numerator, denominator, message));
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_indeterminate() {
        let tracker = ProgressTracker::new();
        let snapshot = tracker.snapshot();
        assert!(snapshot.is_indeterminate());
        assert_eq!((snapshot.numerator, snapshot.denominator), (-1, 1));
        assert_eq!(snapshot.message, "Starting process");
    }

    #[test]
    fn fraction_is_clamped_and_absent_when_indeterminate() {
        let determinate =
            ProgressSnapshot::ratio(ExtractionPhase::Extracting, 4_000, 60_000, "Extracting");
        assert!((determinate.fraction().unwrap() - 4_000.0 / 60_000.0).abs() < 1e-9);

        let indeterminate =
            ProgressSnapshot::indeterminate(ExtractionPhase::Probing, "Getting video information");
        assert_eq!(indeterminate.fraction(), None);
    }

    #[test]
    fn cancellation_flag_is_monotonic_and_shared_between_clones() {
        let tracker = ProgressTracker::new();
        let observer_side = tracker.clone();

        assert!(!tracker.is_cancel_requested());
        observer_side.request_cancel();
        assert!(tracker.is_cancel_requested());
    }

    #[test]
    fn observers_see_each_committed_snapshot() {
        use std::sync::Mutex as StdMutex;

        struct Recording(StdMutex<Vec<String>>);
        impl ProgressObserver for Recording {
            fn progress_changed(&self, snapshot: &ProgressSnapshot) {
                self.0.lock().unwrap().push(snapshot.message.clone());
            }
        }

        let tracker = ProgressTracker::new();
        let recording = Arc::new(Recording(StdMutex::new(Vec::new())));
        tracker.subscribe(recording.clone());

        tracker.set_indeterminate(ExtractionPhase::Probing, "Getting video information");
        tracker.set_ratio(ExtractionPhase::Extracting, 0, 100, "Extracting frames");

        let seen = recording.0.lock().unwrap();
        assert_eq!(
            *seen,
            vec!["Getting video information", "Extracting frames"]
        );
    }
}
