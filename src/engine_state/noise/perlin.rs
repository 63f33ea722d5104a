use std::f64::consts::PI;

use super::{NoiseField, Noise};
use crate::error::{EngineError, EngineResult};

/// Highest dimensionality accepted. Gradient noise is bounded by `sqrt(D) / 2`, which
/// stays within `[-1, 1]` up to four dimensions.
const MAX_DIMENSIONS: usize = 4;

/// Gradient noise over a wrapping lattice of unit vectors.
///
/// Lattice coordinates wrap modulo the lattice size per dimension, so the field is
/// defined everywhere and tiles with that period.
#[derive(Debug)]
pub struct PerlinNoise {
    lattice: Vec<usize>,
    strides: Vec<usize>,
    gradients: Vec<f64>,
}

impl PerlinNoise {
    /// Builds a field whose gradients are drawn from a `Noise` stream seeded with `seed`.
    ///
    /// # Arguments
    /// * `seed` - Seed of the gradient stream
    /// * `lattice` - Number of lattice points per dimension
    ///
    /// # Returns
    /// An error if `lattice` is empty, has a zero-sized dimension or more than
    /// four dimensions.
    pub fn new(seed: u32, lattice: &[usize]) -> EngineResult<Self> {
        if lattice.is_empty() || lattice.len() > MAX_DIMENSIONS {
            return Err(EngineError::InvalidLattice(format!(
                "expected 1 to {MAX_DIMENSIONS} dimensions, got {}",
                lattice.len()
            )));
        }
        if lattice.contains(&0) {
            return Err(EngineError::InvalidLattice(format!(
                "zero-sized dimension in {lattice:?}"
            )));
        }

        let mut stream = Noise::new(seed);
        let dimensions = lattice.len();
        let mut strides = vec![1usize; dimensions];
        for i in (0..dimensions - 1).rev() {
            strides[i] = strides[i + 1] * lattice[i + 1];
        }
        let points = strides[0] * lattice[0];

        // Row-major, last dimension fastest
        let mut gradients = Vec::with_capacity(points * dimensions);
        let mut gradient = vec![0.0; dimensions];
        for _ in 0..points {
            let mut squared = 0.0;
            for component in gradient.iter_mut() {
                *component = stream.next_float() * 2.0 - 1.0;
                squared += *component * *component;
            }
            if squared > 0.0 {
                let inverse = 1.0 / squared.sqrt();
                gradients.extend(gradient.iter().map(|c| c * inverse));
            } else {
                gradients.push(1.0);
                gradients.extend(std::iter::repeat(0.0).take(dimensions - 1));
            }
        }

        Ok(Self {
            lattice: lattice.to_vec(),
            strides,
            gradients,
        })
    }

    fn gradient_at(&self, cell: &[f64], corner: usize) -> &[f64] {
        let dimensions = self.lattice.len();
        let mut index = 0;
        for i in 0..dimensions {
            let coordinate = cell[i] as i64 + ((corner >> i) & 1) as i64;
            let wrapped = coordinate.rem_euclid(self.lattice[i] as i64) as usize;
            index += wrapped * self.strides[i];
        }
        &self.gradients[index * dimensions..(index + 1) * dimensions]
    }
}

/// Interpolates with a half cosine wave so the curve is flat at both ends.
fn cosine_lerp(a: f64, b: f64, t: f64) -> f64 {
    let t = (1.0 - (t * PI).cos()) * 0.5;
    a + (b - a) * t
}

impl NoiseField for PerlinNoise {
    fn dimensions(&self) -> usize {
        self.lattice.len()
    }

    fn sample(&self, point: &[f64]) -> f64 {
        let dimensions = self.lattice.len();
        let cell: Vec<f64> = point.iter().map(|v| v.floor()).collect();

        // Bit i of a corner index selects +1 along dimension i
        let mut products: Vec<f64> = (0..1usize << dimensions)
            .map(|corner| {
                self.gradient_at(&cell, corner)
                    .iter()
                    .enumerate()
                    .map(|(i, g)| {
                        let corner_coordinate = cell[i] + ((corner >> i) & 1) as f64;
                        g * (point[i] - corner_coordinate)
                    })
                    .sum()
            })
            .collect();

        for i in 0..dimensions {
            let t = point[i] - cell[i];
            let half = products.len() / 2;
            for k in 0..half {
                products[k] = cosine_lerp(products[2 * k], products[2 * k + 1], t);
            }
            products.truncate(half);
        }

        products[0]
    }

    fn interval(&self) -> (f64, f64) {
        (-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_lattices() {
        assert!(PerlinNoise::new(1, &[]).is_err());
        assert!(PerlinNoise::new(1, &[16, 0]).is_err());
        assert!(PerlinNoise::new(1, &[2; 5]).is_err());
        assert!(PerlinNoise::new(1, &[2; 4]).is_ok());
    }

    #[test]
    fn gradients_are_unit_length() {
        let noise = PerlinNoise::new(3, &[4, 5, 6]).unwrap();
        for gradient in noise.gradients.chunks(3) {
            let length: f64 = gradient.iter().map(|c| c * c).sum::<f64>().sqrt();
            assert!((length - 1.0).abs() < 1e-9);
        }
        assert_eq!(noise.gradients.len(), 4 * 5 * 6 * 3);
    }

    #[test]
    fn zero_on_lattice_points() {
        let noise = PerlinNoise::new(11, &[16, 16]).unwrap();
        for x in -3..3 {
            for z in -3..3 {
                let value = noise.sample(&[x as f64, z as f64]);
                assert!(value.abs() < 1e-12, "lattice point ({x}, {z}) gave {value}");
            }
        }
    }

    #[test]
    fn wraps_with_lattice_period() {
        let noise = PerlinNoise::new(5, &[8, 4]).unwrap();
        let base = noise.sample(&[1.3, 2.7]);
        assert!((noise.sample(&[1.3 + 8.0, 2.7]) - base).abs() < 1e-9);
        assert!((noise.sample(&[1.3, 2.7 - 4.0]) - base).abs() < 1e-9);
        assert!((noise.sample(&[1.3 - 16.0, 2.7 + 12.0]) - base).abs() < 1e-9);
    }

    #[test]
    fn stays_inside_interval_under_fuzzing() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for dimensions in 1..=MAX_DIMENSIONS {
            let lattice = vec![16; dimensions];
            let noise = PerlinNoise::new(rng.u32(..), &lattice).unwrap();
            let (min, max) = noise.interval();
            for _ in 0..2_000 {
                let point: Vec<f64> = (0..dimensions)
                    .map(|_| (rng.f64() - 0.5) * 2_000.0)
                    .collect();
                let value = noise.sample(&point);
                assert!(
                    value >= min && value <= max,
                    "{value} outside [{min}, {max}] at {point:?}"
                );
            }
        }
    }
}
