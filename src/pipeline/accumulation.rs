//! Progressive accumulation: sample counting and the blend law.
//!
//! `draw` folds each sample into the running estimate as
//! `accum = accum * (1 - mul) + sample * mul` with `mul = 1 / n` for the
//! n-th sample since the last clear. The first sample replaces whatever the
//! buffer held.

use crate::util::Vec3;

/// Index used for the blend weight after `samples` completed samples.
pub fn effective_sample_index(samples: u32) -> u32 {
    samples.max(1)
}

/// Blend weight of the `n`-th sample.
pub fn blend_weight(n: u32) -> f32 {
    1.0 / effective_sample_index(n) as f32
}

/// Host mirror of the `draw` blend.
pub fn blend(accum: Vec3, sample: Vec3, mul: f32) -> Vec3 {
    accum * (1.0 - mul) + sample * mul
}

/// Host mirror of the `draw` tone curve.
pub fn tonemap(c: Vec3) -> Vec3 {
    let mapped = c / (Vec3::ONE + c);
    mapped.powf(1.0 / 2.2)
}

/// Samples accumulated since the last clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCounter {
    samples: u32,
}

impl SampleCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.samples
    }

    /// Count one more sample and return its blend weight.
    pub fn advance(&mut self) -> f32 {
        self.samples = self.samples.saturating_add(1);
        blend_weight(self.samples)
    }

    pub fn reset(&mut self) {
        self.samples = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_weights() {
        let mut counter = SampleCounter::new();
        let weights: Vec<f32> = (0..5).map(|_| counter.advance()).collect();
        assert_eq!(weights, vec![1.0, 0.5, 1.0 / 3.0, 0.25, 0.2]);
        assert_eq!(counter.count(), 5);

        counter.reset();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.advance(), 1.0);
    }

    #[test]
    fn test_blend_is_running_mean() {
        let samples = [Vec3::splat(1.0), Vec3::splat(3.0), Vec3::splat(5.0), Vec3::splat(7.0)];
        let mut accum = Vec3::splat(100.0);
        for (n, s) in samples.iter().enumerate() {
            accum = blend(accum, *s, blend_weight(n as u32 + 1));
        }
        assert!((accum - Vec3::splat(4.0)).abs().max_element() < 1e-5);
    }

    #[test]
    fn test_tonemap_range() {
        assert_eq!(tonemap(Vec3::ZERO), Vec3::ZERO);
        let t = tonemap(Vec3::splat(1.0e6));
        assert!(t.max_element() <= 1.0 && t.min_element() > 0.99);
    }
}
