use rustfft::num_complex::Complex64;

/// One term of the truncated Fourier series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotorState {
    pub frequency: f64,
    pub coefficient: Complex64,
}

impl RotorState {
    pub fn new(frequency: f64, coefficient: Complex64) -> Self {
        Self {
            frequency,
            coefficient,
        }
    }

    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.coefficient.norm()
    }

    /// Phase in radians, in (-PI, PI].
    #[inline]
    pub fn phase(&self) -> f64 {
        self.coefficient.arg()
    }

    #[inline]
    pub fn key(&self) -> FrequencyKey {
        FrequencyKey::new(self.frequency)
    }
}

/// Bit-exact cache key for a frequency.
///
/// `-0.0` folds onto `0.0` so the DC term has a single slot; every other value
/// keys on its exact bit pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrequencyKey(u64);

impl FrequencyKey {
    #[inline]
    pub fn new(frequency: f64) -> Self {
        let normalized = if frequency == 0.0 { 0.0 } else { frequency };
        Self(normalized.to_bits())
    }

    #[inline]
    pub fn frequency(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl From<f64> for FrequencyKey {
    fn from(frequency: f64) -> Self {
        Self::new(frequency)
    }
}

/// Weighted sum used for display-scale normalization: the first magnitude
/// counts twice.
pub fn magnitude_scale_sum<I>(magnitudes: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    magnitudes
        .into_iter()
        .enumerate()
        .map(|(i, m)| if i == 0 { 2.0 * m } else { m })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn negative_zero_shares_dc_slot() {
        assert_eq!(FrequencyKey::new(-0.0), FrequencyKey::new(0.0));
        assert_ne!(FrequencyKey::new(1.0), FrequencyKey::new(-1.0));
        assert_eq!(FrequencyKey::new(2.5).frequency(), 2.5);
    }

    #[test]
    fn magnitude_and_phase() {
        let state = RotorState::new(3.0, Complex64::new(0.0, 2.0));
        assert_relative_eq!(state.magnitude(), 2.0);
        assert_relative_eq!(state.phase(), std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn scale_sum_doubles_first_term() {
        assert_relative_eq!(magnitude_scale_sum([1.0, 2.0, 3.0]), 7.0);
        assert_eq!(magnitude_scale_sum(std::iter::empty()), 0.0);
    }
}
