use super::{check_dimensions, NoiseField, SharedNoise};
use crate::error::{EngineError, EngineResult};

/// Shifts coordinates by a fixed vector before sampling the wrapped field.
#[derive(Debug, Clone)]
pub struct TranslatedNoise {
    noise: SharedNoise,
    translation: Vec<f64>,
}

impl TranslatedNoise {
    /// Wraps `noise`, failing when `translation` does not match its dimensionality.
    pub fn new(noise: SharedNoise, translation: &[f64]) -> EngineResult<Self> {
        check_dimensions(noise.dimensions(), translation.len())?;
        Ok(Self {
            noise,
            translation: translation.to_vec(),
        })
    }
}

impl NoiseField for TranslatedNoise {
    fn dimensions(&self) -> usize {
        self.translation.len()
    }

    fn sample(&self, point: &[f64]) -> f64 {
        let shifted: Vec<f64> = point
            .iter()
            .zip(&self.translation)
            .map(|(p, t)| p + t)
            .collect();
        self.noise.sample(&shifted)
    }

    fn interval(&self) -> (f64, f64) {
        self.noise.interval()
    }
}

/// Multiplies coordinates component-wise before sampling the wrapped field.
#[derive(Debug, Clone)]
pub struct ScaledNoise {
    noise: SharedNoise,
    scale: Vec<f64>,
}

impl ScaledNoise {
    /// Wraps `noise`, failing when `scale` does not match its dimensionality.
    pub fn new(noise: SharedNoise, scale: &[f64]) -> EngineResult<Self> {
        check_dimensions(noise.dimensions(), scale.len())?;
        Ok(Self {
            noise,
            scale: scale.to_vec(),
        })
    }
}

impl NoiseField for ScaledNoise {
    fn dimensions(&self) -> usize {
        self.scale.len()
    }

    fn sample(&self, point: &[f64]) -> f64 {
        let scaled: Vec<f64> = point.iter().zip(&self.scale).map(|(p, s)| p * s).collect();
        self.noise.sample(&scaled)
    }

    fn interval(&self) -> (f64, f64) {
        self.noise.interval()
    }
}

/// One octave of a fractal sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Octave {
    /// Coordinate multiplier.
    pub frequency: f64,
    /// Output multiplier.
    pub amplitude: f64,
}

/// Weighted sum of base fields sampled at geometrically increasing frequencies.
///
/// Octave `i` samples base field `i % len` at `lacunarity^i` times the input
/// coordinates and weights it by `persistence^(i + 1)`.
#[derive(Debug, Clone)]
pub struct FractalNoise {
    noises: Vec<SharedNoise>,
    octaves: Vec<Octave>,
    interval: (f64, f64),
}

impl FractalNoise {
    /// Default frequency growth per octave.
    pub const LACUNARITY: f64 = 2.0;
    /// Default amplitude decay per octave.
    pub const PERSISTENCE: f64 = 0.5;

    /// Builds a fractal with the default lacunarity and persistence.
    ///
    /// A single base field gets four octaves; several base fields get one octave each.
    pub fn new(noises: Vec<SharedNoise>) -> EngineResult<Self> {
        let octaves = if noises.len() == 1 { 4 } else { noises.len() };
        Self::with_parameters(noises, Self::LACUNARITY, Self::PERSISTENCE, octaves)
    }

    /// Builds a fractal with explicit parameters.
    ///
    /// # Arguments
    /// * `noises` - Base fields, cycled through by octave index
    /// * `lacunarity` - Frequency ratio between consecutive octaves
    /// * `persistence` - Amplitude ratio between consecutive octaves
    /// * `octaves` - Number of octaves to sum
    ///
    /// # Returns
    /// An error if `noises` is empty or the base fields disagree on dimensionality.
    pub fn with_parameters(
        noises: Vec<SharedNoise>,
        lacunarity: f64,
        persistence: f64,
        octaves: usize,
    ) -> EngineResult<Self> {
        let first = noises.first().ok_or(EngineError::EmptyFractal)?;
        let dimensions = first.dimensions();
        for noise in &noises {
            check_dimensions(dimensions, noise.dimensions())?;
        }

        let octaves: Vec<Octave> = (0..octaves)
            .map(|i| Octave {
                frequency: lacunarity.powi(i as i32),
                amplitude: persistence.powi(i as i32 + 1),
            })
            .collect();

        let mut interval = (0.0, 0.0);
        for (i, octave) in octaves.iter().enumerate() {
            let (min, max) = noises[i % noises.len()].interval();
            interval.0 += min * octave.amplitude;
            interval.1 += max * octave.amplitude;
        }

        Ok(Self {
            noises,
            octaves,
            interval,
        })
    }

    /// Octaves in summation order.
    pub fn octaves(&self) -> &[Octave] {
        &self.octaves
    }
}

impl NoiseField for FractalNoise {
    fn dimensions(&self) -> usize {
        self.noises[0].dimensions()
    }

    fn sample(&self, point: &[f64]) -> f64 {
        let mut scaled = vec![0.0; point.len()];
        self.octaves
            .iter()
            .enumerate()
            .map(|(i, octave)| {
                for (target, value) in scaled.iter_mut().zip(point) {
                    *target = value * octave.frequency;
                }
                self.noises[i % self.noises.len()].sample(&scaled) * octave.amplitude
            })
            .sum()
    }

    fn interval(&self) -> (f64, f64) {
        self.interval
    }
}
