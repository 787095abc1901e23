//! Periodic functions the rotor engine approximates.
//!
//! The engine only needs a coefficient per frequency; how that coefficient is
//! integrated is up to the implementor.

pub mod sampled;
pub mod shapes;

use crate::core::frequency::FrequencyStrategy;
use crate::core::rotor_state::RotorState;
use rustfft::num_complex::Complex64;

pub use sampled::SampledFunction;
pub use shapes::Shape;

/// Produces the Fourier coefficient for a frequency. Must be deterministic.
pub trait CoefficientEvaluator: Send + Sync {
    fn coefficient(&self, frequency: f64) -> Complex64;
}

impl<F> CoefficientEvaluator for F
where
    F: Fn(f64) -> Complex64 + Send + Sync,
{
    fn coefficient(&self, frequency: f64) -> Complex64 {
        self(frequency)
    }
}

/// A function bound to a rotor manager.
pub trait PeriodicFunction: CoefficientEvaluator {
    fn name(&self) -> &str;

    /// A coefficient the function already knows without integrating.
    fn known_rotor_state(&self, _frequency: f64) -> Option<RotorState> {
        None
    }

    fn default_frequency_strategy(&self) -> FrequencyStrategy {
        FrequencyStrategy::default()
    }
}

/// Wraps a bare evaluator with a name and a default strategy.
pub struct EvaluatorFunction<E> {
    name: String,
    evaluator: E,
    default_strategy: FrequencyStrategy,
}

impl<E: CoefficientEvaluator> EvaluatorFunction<E> {
    pub fn new(name: impl Into<String>, evaluator: E) -> Self {
        Self {
            name: name.into(),
            evaluator,
            default_strategy: FrequencyStrategy::default(),
        }
    }

    pub fn with_default_strategy(mut self, strategy: FrequencyStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }
}

impl<E: CoefficientEvaluator> CoefficientEvaluator for EvaluatorFunction<E> {
    fn coefficient(&self, frequency: f64) -> Complex64 {
        self.evaluator.coefficient(frequency)
    }
}

impl<E: CoefficientEvaluator> PeriodicFunction for EvaluatorFunction<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_frequency_strategy(&self) -> FrequencyStrategy {
        self.default_strategy.clone()
    }
}

/// Metadata handed over by the persistence layer when a function is opened.
#[derive(Clone, Debug, Default)]
pub struct FunctionMeta {
    pub name: String,
    /// Caller-chosen strategy overriding the function's default.
    pub frequency_strategy: Option<FrequencyStrategy>,
    pub initial_rotor_count: Option<usize>,
    /// States restored from a snapshot; seeded into the cache at construction.
    pub preloaded: Vec<RotorState>,
}

impl FunctionMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_evaluators() {
        let f = EvaluatorFunction::new("inverse", |freq: f64| Complex64::new(1.0 / freq, 0.0));
        assert_eq!(f.name(), "inverse");
        assert_eq!(f.coefficient(4.0), Complex64::new(0.25, 0.0));
        assert!(f.known_rotor_state(4.0).is_none());
        assert_eq!(f.default_frequency_strategy(), FrequencyStrategy::default());
    }
}
