//! Trace sampling policy.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Decides whether an operation is traced.
///
/// The rate is stored atomically so it can be changed on a shared sampler
/// (config reload) without a lock.
#[derive(Debug)]
pub struct TraceSampler {
    rate_bits: AtomicU64,
    always_sample_errors: bool,
}

impl TraceSampler {
    /// Create a sampler. Rates outside `[0, 1]` are clamped; NaN becomes 0.
    pub fn new(sample_rate: f64, always_sample_errors: bool) -> Self {
        Self {
            rate_bits: AtomicU64::new(clamp_rate(sample_rate).to_bits()),
            always_sample_errors,
        }
    }

    /// Returns true for failures when errors are always sampled, otherwise
    /// true with probability `sample_rate`.
    pub fn should_sample(&self, is_error: bool) -> bool {
        if is_error && self.always_sample_errors {
            return true;
        }
        let rate = self.sample_rate();
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        rand::thread_rng().gen::<f64>() < rate
    }

    pub fn set_sample_rate(&self, sample_rate: f64) {
        self.rate_bits
            .store(clamp_rate(sample_rate).to_bits(), Ordering::Relaxed);
    }

    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    pub fn always_sample_errors(&self) -> bool {
        self.always_sample_errors
    }
}

impl Default for TraceSampler {
    fn default() -> Self {
        Self::new(1.0, true)
    }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_still_samples_errors() {
        let sampler = TraceSampler::new(0.0, true);
        for _ in 0..1000 {
            assert!(sampler.should_sample(true));
            assert!(!sampler.should_sample(false));
        }
    }

    #[test]
    fn test_errors_not_forced_when_disabled() {
        let sampler = TraceSampler::new(0.0, false);
        for _ in 0..100 {
            assert!(!sampler.should_sample(true));
        }
    }

    #[test]
    fn test_full_rate_always_samples() {
        let sampler = TraceSampler::new(1.0, false);
        for _ in 0..1000 {
            assert!(sampler.should_sample(false));
        }
    }

    #[test]
    fn test_rate_is_clamped() {
        let sampler = TraceSampler::default();
        sampler.set_sample_rate(1.5);
        assert_eq!(sampler.sample_rate(), 1.0);

        sampler.set_sample_rate(-0.5);
        assert_eq!(sampler.sample_rate(), 0.0);

        sampler.set_sample_rate(f64::NAN);
        assert_eq!(sampler.sample_rate(), 0.0);

        assert_eq!(TraceSampler::new(7.0, true).sample_rate(), 1.0);
    }

    #[test]
    fn test_partial_rate_is_roughly_proportional() {
        let sampler = TraceSampler::new(0.5, false);
        let hits = (0..10_000).filter(|_| sampler.should_sample(false)).count();
        assert!((3_000..7_000).contains(&hits), "hits = {}", hits);
    }
}
