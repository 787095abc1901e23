//! Global numeric settings shared by every open function.
//!
//! Coefficients depend on the integration interval count, so a change has to
//! reach every live rotor manager. Observers register explicitly and stay
//! registered for as long as they hold the returned [`SettingsSubscription`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

pub const DEFAULT_INTEGRATION_INTERVALS: usize = 2048;
pub const MIN_INTEGRATION_INTERVALS: usize = 16;

pub trait PrecisionObserver: Send + Sync {
    fn on_precision_changed(&self, intervals: usize);
}

type ObserverList = Vec<(u64, Arc<dyn PrecisionObserver>)>;

struct SettingsInner {
    intervals: Arc<AtomicUsize>,
    observers: Mutex<ObserverList>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct NumericSettings {
    inner: Arc<SettingsInner>,
}

impl NumericSettings {
    pub fn new(intervals: usize) -> Self {
        Self {
            inner: Arc::new(SettingsInner {
                intervals: Arc::new(AtomicUsize::new(intervals.max(MIN_INTEGRATION_INTERVALS))),
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn integration_intervals(&self) -> usize {
        self.inner.intervals.load(Ordering::Acquire)
    }

    /// Read-only handle for evaluators that integrate with the current precision.
    pub fn precision(&self) -> IntegrationPrecision {
        IntegrationPrecision(Arc::clone(&self.inner.intervals))
    }

    /// Stores a new interval count and notifies observers when it changed.
    /// Returns whether a change happened.
    pub fn set_integration_intervals(&self, intervals: usize) -> bool {
        let intervals = intervals.max(MIN_INTEGRATION_INTERVALS);
        let previous = self.inner.intervals.swap(intervals, Ordering::AcqRel);
        if previous == intervals {
            return false;
        }
        debug!(previous, intervals, "integration precision changed");
        let observers: Vec<Arc<dyn PrecisionObserver>> = {
            let guard = self
                .inner
                .observers
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|(_, o)| Arc::clone(o)).collect()
        };
        for observer in observers {
            observer.on_precision_changed(intervals);
        }
        true
    }

    #[must_use = "the observer is removed when the subscription is dropped"]
    pub fn subscribe(&self, observer: Arc<dyn PrecisionObserver>) -> SettingsSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, observer));
        SettingsSubscription {
            inner: Arc::clone(&self.inner),
            id,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for NumericSettings {
    fn default() -> Self {
        Self::new(DEFAULT_INTEGRATION_INTERVALS)
    }
}

pub struct SettingsSubscription {
    inner: Arc<SettingsInner>,
    id: u64,
}

impl Drop for SettingsSubscription {
    fn drop(&mut self) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(id, _)| *id != self.id);
    }
}

#[derive(Clone, Debug)]
pub struct IntegrationPrecision(Arc<AtomicUsize>);

impl IntegrationPrecision {
    /// Fixed precision not tied to any settings object.
    pub fn fixed(intervals: usize) -> Self {
        Self(Arc::new(AtomicUsize::new(intervals.max(MIN_INTEGRATION_INTERVALS))))
    }

    pub fn intervals(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Mutex<Vec<usize>>);

    impl PrecisionObserver for Recorder {
        fn on_precision_changed(&self, intervals: usize) {
            self.0.lock().unwrap().push(intervals);
        }
    }

    #[test]
    fn observers_see_changes_until_unsubscribed() {
        let settings = NumericSettings::new(256);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let sub = settings.subscribe(recorder.clone());

        assert!(settings.set_integration_intervals(512));
        assert!(!settings.set_integration_intervals(512));
        assert_eq!(settings.precision().intervals(), 512);

        drop(sub);
        assert_eq!(settings.observer_count(), 0);
        assert!(settings.set_integration_intervals(1024));
        assert_eq!(*recorder.0.lock().unwrap(), vec![512]);
    }

    #[test]
    fn precision_is_clamped() {
        let settings = NumericSettings::new(1);
        assert_eq!(settings.integration_intervals(), MIN_INTEGRATION_INTERVALS);
        assert_eq!(IntegrationPrecision::fixed(0).intervals(), MIN_INTEGRATION_INTERVALS);
    }
}
