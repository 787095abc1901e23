//! A closed path `t in [0, 1) -> z`, integrated with the midpoint rule.
//!
//! c(f) = 1/M * sum_m z(t_m) * exp(-2 pi i f t_m), t_m = (m + 0.5) / M

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::{Arc, Mutex};

use rustfft::num_complex::Complex64;

use super::{CoefficientEvaluator, PeriodicFunction};
use crate::core::frequency::FrequencyStrategy;
use crate::core::rotor_state::{FrequencyKey, RotorState};
use crate::settings::IntegrationPrecision;

type PathFn = dyn Fn(f64) -> Complex64 + Send + Sync;

pub struct SampledFunction {
    name: String,
    path: Box<PathFn>,
    precision: IntegrationPrecision,
    default_strategy: FrequencyStrategy,
    known: HashMap<FrequencyKey, Complex64>,
    // Path samples for the interval count they were taken at.
    samples: Mutex<Option<(usize, Arc<[Complex64]>)>>,
}

impl SampledFunction {
    pub fn new<P>(name: impl Into<String>, path: P, precision: IntegrationPrecision) -> Self
    where
        P: Fn(f64) -> Complex64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            path: Box::new(path),
            precision,
            default_strategy: FrequencyStrategy::default(),
            known: HashMap::new(),
            samples: Mutex::new(None),
        }
    }

    pub fn with_default_strategy(mut self, strategy: FrequencyStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Coefficients known in closed form; returned without integrating.
    pub fn with_known_coefficients<I>(mut self, coefficients: I) -> Self
    where
        I: IntoIterator<Item = (f64, Complex64)>,
    {
        self.known
            .extend(coefficients.into_iter().map(|(f, c)| (FrequencyKey::new(f), c)));
        self
    }

    pub fn sample(&self, t: f64) -> Complex64 {
        (self.path)(t)
    }

    fn samples(&self) -> Arc<[Complex64]> {
        let intervals = self.precision.intervals();
        let mut slot = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((n, samples)) = slot.as_ref() {
            if *n == intervals {
                return Arc::clone(samples);
            }
        }
        let inv = 1.0 / intervals as f64;
        let samples: Arc<[Complex64]> = (0..intervals)
            .map(|m| (self.path)((m as f64 + 0.5) * inv))
            .collect();
        *slot = Some((intervals, Arc::clone(&samples)));
        samples
    }
}

impl CoefficientEvaluator for SampledFunction {
    fn coefficient(&self, frequency: f64) -> Complex64 {
        let samples = self.samples();
        let inv = 1.0 / samples.len() as f64;
        let mut acc = Complex64::new(0.0, 0.0);
        for (m, z) in samples.iter().enumerate() {
            let t = (m as f64 + 0.5) * inv;
            acc += z * Complex64::from_polar(1.0, -TAU * frequency * t);
        }
        acc * inv
    }
}

impl PeriodicFunction for SampledFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn known_rotor_state(&self, frequency: f64) -> Option<RotorState> {
        self.known
            .get(&FrequencyKey::new(frequency))
            .map(|c| RotorState::new(frequency, *c))
    }

    fn default_frequency_strategy(&self) -> FrequencyStrategy {
        self.default_strategy.clone()
    }
}
