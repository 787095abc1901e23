//! Thread-safe frequency -> rotor state store.
//!
//! Misses are computed at most once per frequency: the first caller marks the
//! key in flight and computes outside the lock, later callers for the same key
//! wait on the condvar. Different frequencies compute in parallel.

use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard};

use super::rotor_state::{FrequencyKey, RotorState};
use crate::function::PeriodicFunction;

#[derive(Default)]
struct CacheInner {
    states: HashMap<FrequencyKey, RotorState>,
    in_flight: HashSet<FrequencyKey>,
    // Bumped by `clear`; results computed before a clear are not stored.
    epoch: u64,
}

#[derive(Default)]
pub struct RotorStateCache {
    inner: Mutex<CacheInner>,
    ready: Condvar,
}

/// How a lookup was satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    Hit,
    Computed,
}

impl RotorStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, frequency: f64) -> bool {
        self.lock().states.contains_key(&FrequencyKey::new(frequency))
    }

    pub fn get(&self, frequency: f64) -> Option<RotorState> {
        self.lock().states.get(&FrequencyKey::new(frequency)).copied()
    }

    /// Cached state, else whatever the function already knows for `frequency`.
    pub fn get_or_known(&self, function: &dyn PeriodicFunction, frequency: f64) -> Option<RotorState> {
        self.get(frequency)
            .or_else(|| function.known_rotor_state(frequency))
    }

    /// Returns the cached state for `frequency`, computing and inserting it on
    /// a miss. Concurrent callers for the same frequency share one computation.
    pub fn get_or_compute(
        &self,
        function: &dyn PeriodicFunction,
        frequency: f64,
    ) -> (RotorState, Lookup) {
        let key = FrequencyKey::new(frequency);
        let epoch = {
            let mut inner = self.lock();
            loop {
                if let Some(state) = inner.states.get(&key) {
                    return (*state, Lookup::Hit);
                }
                if inner.in_flight.insert(key) {
                    break inner.epoch;
                }
                inner = self.ready.wait(inner).unwrap_or_else(|e| e.into_inner());
            }
        };

        let _claim = InFlightClaim { cache: self, key };
        let state = function
            .known_rotor_state(frequency)
            .unwrap_or_else(|| RotorState::new(frequency, function.coefficient(frequency)));
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return (state, Lookup::Computed);
        }
        let stored = *inner.states.entry(key).or_insert(state);
        (stored, Lookup::Computed)
    }

    /// Inserts externally supplied states. Returns how many keys were new.
    pub fn insert_all<I>(&self, states: I) -> usize
    where
        I: IntoIterator<Item = RotorState>,
    {
        let mut inner = self.lock();
        let mut added = 0;
        for state in states {
            if inner.states.insert(state.key(), state).is_none() {
                added += 1;
            }
        }
        added
    }

    /// Drops every entry. Computations already running when this is called
    /// will not write their results back.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.states.clear();
        inner.epoch = inner.epoch.wrapping_add(1);
    }

    /// Keeps only the entries whose key satisfies `keep`. Returns how many were removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(FrequencyKey) -> bool,
    {
        let mut inner = self.lock();
        let before = inner.states.len();
        inner.states.retain(|key, _| keep(*key));
        before - inner.states.len()
    }

    /// Copy of every cached state, unordered.
    pub fn snapshot(&self) -> Vec<RotorState> {
        self.lock().states.values().copied().collect()
    }

    /// Copy of every cached state ordered by frequency.
    pub fn snapshot_ordered(&self) -> Vec<RotorState> {
        let mut states = self.snapshot();
        states.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
        states
    }
}

/// Releases the in-flight mark even when the evaluator panics, so waiters
/// retry instead of blocking forever.
struct InFlightClaim<'a> {
    cache: &'a RotorStateCache,
    key: FrequencyKey,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.cache.lock().in_flight.remove(&self.key);
        self.cache.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::EvaluatorFunction;
    use rustfft::num_complex::Complex64;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn counting(calls: Arc<AtomicUsize>) -> impl PeriodicFunction {
        EvaluatorFunction::new("counting", move |f: f64| {
            calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            Complex64::new(f, -f)
        })
    }

    #[test]
    fn second_lookup_is_a_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let f = counting(calls.clone());
        let cache = RotorStateCache::new();

        let (first, how) = cache.get_or_compute(&f, 3.0);
        assert_eq!(how, Lookup::Computed);
        let (second, how) = cache.get_or_compute(&f, 3.0);
        assert_eq!(how, Lookup::Hit);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(3.0));
    }

    #[test]
    fn racing_threads_compute_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let f = counting(calls.clone());
        let cache = RotorStateCache::new();

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let (state, _) = cache.get_or_compute(&f, 1.5);
                    assert_eq!(state.coefficient, Complex64::new(1.5, -1.5));
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn insert_all_counts_new_keys() {
        let cache = RotorStateCache::new();
        let states = [
            RotorState::new(0.0, Complex64::new(1.0, 0.0)),
            RotorState::new(1.0, Complex64::new(0.5, 0.0)),
        ];
        assert_eq!(cache.insert_all(states), 2);
        assert_eq!(cache.insert_all([RotorState::new(-0.0, Complex64::new(2.0, 0.0))]), 0);
        assert_eq!(cache.get(0.0).map(|s| s.coefficient.re), Some(2.0));
    }

    #[test]
    fn retain_and_ordered_snapshot() {
        let cache = RotorStateCache::new();
        cache.insert_all(
            [2.0, -1.0, 0.0, 5.0]
                .into_iter()
                .map(|f| RotorState::new(f, Complex64::new(f, 0.0))),
        );
        let ordered: Vec<f64> = cache.snapshot_ordered().iter().map(|s| s.frequency).collect();
        assert_eq!(ordered, vec![-1.0, 0.0, 2.0, 5.0]);

        let removed = cache.retain(|key| key.frequency() >= 0.0);
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 3);
        cache.clear();
        assert!(cache.is_empty());
    }
}
