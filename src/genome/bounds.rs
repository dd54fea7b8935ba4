//! Bounds for genome values
//!
//! Per-gene search limits used to sample fresh genomes and to clip genes
//! after variation.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenomeError;

/// Bounds for a single gene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (inclusive)
    pub max: f64,
}

impl Bounds {
    /// Create new bounds
    ///
    /// # Panics
    /// Panics if min > max
    pub fn new(min: f64, max: f64) -> Self {
        assert!(
            min <= max,
            "Invalid bounds: min ({}) must be <= max ({})",
            min,
            max
        );
        Self { min, max }
    }

    /// Create bounds, rejecting an inverted or non-finite interval
    pub fn try_new(min: f64, max: f64) -> Result<Self, GenomeError> {
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(GenomeError::InvalidStructure(format!(
                "invalid gene bounds [{min}, {max}]"
            )));
        }
        Ok(Self { min, max })
    }

    /// Create symmetric bounds centered at 0
    pub fn symmetric(half_width: f64) -> Self {
        Self::new(-half_width, half_width)
    }

    /// Get the range (max - min)
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Check if a value is within bounds
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp a value to be within bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Draw a value uniformly from the closed interval
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.min == self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::symmetric(5.12)
    }
}

/// Per-gene bounds for a whole genome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiBounds {
    /// Bounds for each gene
    pub bounds: Vec<Bounds>,
}

impl MultiBounds {
    /// Create new multi-dimensional bounds
    pub fn new(bounds: Vec<Bounds>) -> Self {
        Self { bounds }
    }

    /// Create uniform bounds for all genes
    pub fn uniform(bound: Bounds, dimension: usize) -> Self {
        Self {
            bounds: vec![bound; dimension],
        }
    }

    /// Create symmetric bounds for all genes
    pub fn symmetric(half_width: f64, dimension: usize) -> Self {
        Self::uniform(Bounds::symmetric(half_width), dimension)
    }

    /// Build bounds from separate lower and upper vectors.
    ///
    /// A single-element vector is broadcast to `dimension` genes.
    pub fn from_limits(lower: &[f64], upper: &[f64], dimension: usize) -> Result<Self, GenomeError> {
        let expand = |values: &[f64]| -> Result<Vec<f64>, GenomeError> {
            match values.len() {
                1 => Ok(vec![values[0]; dimension]),
                n if n == dimension => Ok(values.to_vec()),
                n => Err(GenomeError::DimensionMismatch {
                    expected: dimension,
                    actual: n,
                }),
            }
        };
        let lower = expand(lower)?;
        let upper = expand(upper)?;
        lower
            .into_iter()
            .zip(upper)
            .map(|(min, max)| Bounds::try_new(min, max))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Get number of genes
    pub fn dimension(&self) -> usize {
        self.bounds.len()
    }

    /// Get bounds for a specific gene
    pub fn get(&self, index: usize) -> Option<&Bounds> {
        self.bounds.get(index)
    }

    /// Lower limits, one per gene
    pub fn lower(&self) -> Vec<f64> {
        self.bounds.iter().map(|b| b.min).collect()
    }

    /// Upper limits, one per gene
    pub fn upper(&self) -> Vec<f64> {
        self.bounds.iter().map(|b| b.max).collect()
    }

    /// Clamp a vector to be within bounds
    pub fn clamp_vec(&self, values: &mut [f64]) {
        for (value, b) in values.iter_mut().zip(&self.bounds) {
            *value = b.clamp(*value);
        }
    }

    /// Check if all values are within bounds
    pub fn contains_vec(&self, values: &[f64]) -> bool {
        values.len() == self.bounds.len()
            && values.iter().zip(&self.bounds).all(|(&v, b)| b.contains(v))
    }

    /// Draw one value per gene uniformly
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        self.bounds.iter().map(|b| b.sample(rng)).collect()
    }
}

impl FromIterator<(f64, f64)> for MultiBounds {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        Self {
            bounds: iter
                .into_iter()
                .map(|(min, max)| Bounds::new(min, max))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    #[should_panic(expected = "Invalid bounds")]
    fn test_bounds_invalid() {
        Bounds::new(5.0, -5.0);
    }

    #[test]
    fn test_try_new_rejects_inverted() {
        assert!(Bounds::try_new(1.0, 0.0).is_err());
        assert!(Bounds::try_new(0.0, f64::NAN).is_err());
        assert!(Bounds::try_new(-1.0, 1.0).is_ok());
    }

    #[test]
    fn test_bounds_clamp() {
        let b = Bounds::new(-5.0, 5.0);
        assert_eq!(b.clamp(0.0), 0.0);
        assert_eq!(b.clamp(-10.0), -5.0);
        assert_eq!(b.clamp(10.0), 5.0);
    }

    #[test]
    fn test_degenerate_bounds_sample() {
        let mut rng = StdRng::seed_from_u64(42);
        let b = Bounds::new(2.0, 2.0);
        assert_eq!(b.sample(&mut rng), 2.0);
    }

    #[test]
    fn test_from_limits_broadcast() {
        let mb = MultiBounds::from_limits(&[-1.0], &[1.0], 3).unwrap();
        assert_eq!(mb.dimension(), 3);
        assert_eq!(mb.lower(), vec![-1.0; 3]);
        assert_eq!(mb.upper(), vec![1.0; 3]);
    }

    #[test]
    fn test_from_limits_per_gene() {
        let mb = MultiBounds::from_limits(&[0.0, -2.0], &[1.0, 2.0], 2).unwrap();
        assert_eq!(mb.get(1), Some(&Bounds::new(-2.0, 2.0)));
    }

    #[test]
    fn test_from_limits_dimension_mismatch() {
        let err = MultiBounds::from_limits(&[0.0, 0.0], &[1.0], 3).unwrap_err();
        assert_eq!(
            err,
            GenomeError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_multi_bounds_sample_within() {
        let mut rng = StdRng::seed_from_u64(42);
        let mb: MultiBounds = vec![(0.0, 1.0), (-10.0, 10.0)].into_iter().collect();
        for _ in 0..100 {
            assert!(mb.contains_vec(&mb.sample(&mut rng)));
        }
    }

    #[test]
    fn test_multi_bounds_clamp_vec() {
        let mb = MultiBounds::symmetric(5.0, 3);
        let mut values = vec![-10.0, 0.0, 10.0];
        mb.clamp_vec(&mut values);
        assert_eq!(values, vec![-5.0, 0.0, 5.0]);
    }
}
