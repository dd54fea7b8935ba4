//! Real-valued vector genome
//!
//! Fixed-length vector of genes shared by every island of a run. Migration
//! copies genomes by value and flattens them to plain `f64` slices on the wire.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenomeError;
use crate::genome::bounds::MultiBounds;

/// Fixed-length real-valued vector genome
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealVector {
    genes: Vec<f64>,
}

impl RealVector {
    /// Create a new real vector with the given genes
    pub fn new(genes: Vec<f64>) -> Self {
        Self { genes }
    }

    /// Create a zero-filled vector of the given dimension
    pub fn zeros(dimension: usize) -> Self {
        Self {
            genes: vec![0.0; dimension],
        }
    }

    /// Sample every gene uniformly from its bounds
    pub fn generate<R: Rng>(rng: &mut R, bounds: &MultiBounds) -> Self {
        Self {
            genes: bounds.sample(rng),
        }
    }

    /// Rebuild a genome from a wire slice, checking its length
    pub fn from_slice(genes: &[f64], dimension: usize) -> Result<Self, GenomeError> {
        if genes.len() != dimension {
            return Err(GenomeError::DimensionMismatch {
                expected: dimension,
                actual: genes.len(),
            });
        }
        Ok(Self {
            genes: genes.to_vec(),
        })
    }

    /// Number of genes
    pub fn dimension(&self) -> usize {
        self.genes.len()
    }

    /// Get a reference to the genes
    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    /// Get a mutable reference to the genes
    pub fn genes_mut(&mut self) -> &mut [f64] {
        &mut self.genes
    }

    /// Calculate Euclidean norm
    pub fn norm(&self) -> f64 {
        self.genes.iter().map(|x| x * x).sum::<f64>().sqrt()
    }
}

impl std::ops::Index<usize> for RealVector {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.genes[index]
    }
}

impl std::ops::IndexMut<usize> for RealVector {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.genes[index]
    }
}
