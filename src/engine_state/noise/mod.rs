//! # Noise
//!
//! Deterministic scalar fields used by the terrain generator.
//!
//! ## Key Components
//! - `Noise`: a small multiply-with-carry random stream seeded by an integer
//! - `PerlinNoise`: gradient noise over an N-dimensional wrapping lattice
//! - `TranslatedNoise` / `ScaledNoise`: coordinate adaptors around another field
//! - `FractalNoise`: octave sum of base fields with geometric frequency and amplitude
//! - `LinearMap`: affine remapping used to normalize noise output through its interval
//!
//! Every field is immutable after construction and implements `Send + Sync`, so a
//! single instance can be shared between generation workers behind an `Arc`.

mod fractal;
mod perlin;
mod random;

use std::fmt::Debug;
use std::sync::Arc;

pub use fractal::{FractalNoise, ScaledNoise, TranslatedNoise};
pub use perlin::PerlinNoise;
pub use random::Noise;

use crate::error::{EngineError, EngineResult};

/// A deterministic scalar field over N-dimensional coordinates.
pub trait NoiseField: Debug + Send + Sync {
    /// Number of coordinate components the field expects.
    fn dimensions(&self) -> usize;

    /// Samples the field without checking the coordinate length.
    ///
    /// Callers that cannot guarantee `point.len() == self.dimensions()` should use
    /// [`NoiseField::get`] instead.
    fn sample(&self, point: &[f64]) -> f64;

    /// Static bounds of every value the field can produce, as `(min, max)`.
    fn interval(&self) -> (f64, f64);

    /// Samples the field after validating the coordinate length.
    fn get(&self, point: &[f64]) -> EngineResult<f64> {
        check_dimensions(self.dimensions(), point.len())?;
        Ok(self.sample(point))
    }

    /// Builds a map from this field's interval onto `[out_min, out_max]`.
    fn mapper(&self, out_min: f64, out_max: f64) -> LinearMap {
        let (min, max) = self.interval();
        LinearMap::new(min, max, out_min, out_max)
    }
}

/// Shared handle to any noise field.
pub type SharedNoise = Arc<dyn NoiseField>;

pub(crate) fn check_dimensions(expected: usize, actual: usize) -> EngineResult<()> {
    if expected != actual {
        return Err(EngineError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Affine map sending `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// Values outside the input range are extrapolated, not clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearMap {
    multiplier: f64,
    increment: f64,
}

impl LinearMap {
    /// Creates the map.
    ///
    /// # Arguments
    /// * `in_min`, `in_max` - Source range
    /// * `out_min`, `out_max` - Target range
    pub fn new(in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> Self {
        let multiplier = (out_max - out_min) / (in_max - in_min);
        Self {
            multiplier,
            increment: out_min - in_min * multiplier,
        }
    }

    /// Maps a single value.
    pub fn apply(&self, value: f64) -> f64 {
        value * self.multiplier + self.increment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_map_hits_both_ends() {
        let map = LinearMap::new(-0.75, 0.75, 0.0, 1.0);
        assert!((map.apply(-0.75) - 0.0).abs() < 1e-12);
        assert!((map.apply(0.75) - 1.0).abs() < 1e-12);
        assert!((map.apply(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn linear_map_extrapolates() {
        // Tree height map: threshold 0.998 -> 3, 1.0 -> 7
        let map = LinearMap::new(0.998, 1.0, 3.0, 7.0);
        assert!((map.apply(0.999) - 5.0).abs() < 1e-9);
        assert!(map.apply(1.001) > 7.0);
    }

    #[test]
    fn get_rejects_wrong_length() {
        let perlin = PerlinNoise::new(7, &[8, 8]).unwrap();
        assert!(matches!(
            perlin.get(&[0.5]),
            Err(EngineError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(perlin.get(&[0.5, 0.25]).is_ok());
    }
}
