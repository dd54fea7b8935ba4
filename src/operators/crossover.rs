//! Crossover operators
//!
//! Every operator produces a single child from two equal-length parents.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{OperatorError, OperatorResult};
use crate::genome::real_vector::RealVector;
use crate::operators::traits::CrossoverOperator;

fn check_parents(parent1: &RealVector, parent2: &RealVector) -> Result<usize, OperatorError> {
    if parent1.dimension() != parent2.dimension() {
        return Err(OperatorError::CrossoverFailed(format!(
            "parent dimensions do not match ({} vs {})",
            parent1.dimension(),
            parent2.dimension()
        )));
    }
    Ok(parent1.dimension())
}

/// One-point crossover
///
/// Genes before a random cut come from the first parent, the rest from the second.
#[derive(Clone, Debug, Default)]
pub struct OnePointCrossover;

impl CrossoverOperator for OnePointCrossover {
    fn crossover<R: Rng>(
        &self,
        parent1: &RealVector,
        parent2: &RealVector,
        rng: &mut R,
    ) -> OperatorResult<RealVector> {
        let n = match check_parents(parent1, parent2) {
            Ok(n) => n,
            Err(e) => return OperatorResult::Failed(e),
        };
        if n < 2 {
            return OperatorResult::Success(parent1.clone());
        }

        let cut = rng.gen_range(1..n);
        let genes = parent1.genes()[..cut]
            .iter()
            .chain(&parent2.genes()[cut..])
            .copied()
            .collect();
        OperatorResult::Success(RealVector::new(genes))
    }
}

/// Two-point crossover
///
/// The segment between two random cuts comes from the second parent.
#[derive(Clone, Debug, Default)]
pub struct TwoPointCrossover;

impl CrossoverOperator for TwoPointCrossover {
    fn crossover<R: Rng>(
        &self,
        parent1: &RealVector,
        parent2: &RealVector,
        rng: &mut R,
    ) -> OperatorResult<RealVector> {
        let n = match check_parents(parent1, parent2) {
            Ok(n) => n,
            Err(e) => return OperatorResult::Failed(e),
        };
        if n < 3 {
            return OnePointCrossover.crossover(parent1, parent2, rng);
        }

        let mut a = rng.gen_range(1..n);
        let mut b = rng.gen_range(1..n);
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }

        let mut child = parent1.clone();
        child.genes_mut()[a..b].copy_from_slice(&parent2.genes()[a..b]);
        OperatorResult::Success(child)
    }
}

/// Uniform crossover
///
/// Each gene is independently taken from the first parent with probability `bias`.
#[derive(Clone, Debug)]
pub struct UniformCrossover {
    /// Probability of choosing from parent1 (default: 0.5)
    pub bias: f64,
}

impl Default for UniformCrossover {
    fn default() -> Self {
        Self { bias: 0.5 }
    }
}

impl CrossoverOperator for UniformCrossover {
    fn crossover<R: Rng>(
        &self,
        parent1: &RealVector,
        parent2: &RealVector,
        rng: &mut R,
    ) -> OperatorResult<RealVector> {
        if let Err(e) = check_parents(parent1, parent2) {
            return OperatorResult::Failed(e);
        }

        let genes = parent1
            .genes()
            .iter()
            .zip(parent2.genes())
            .map(|(&a, &b)| if rng.gen::<f64>() < self.bias { a } else { b })
            .collect();
        OperatorResult::Success(RealVector::new(genes))
    }
}

/// Flat crossover (BLX-0)
///
/// Each gene is drawn uniformly between the two parental values.
#[derive(Clone, Debug, Default)]
pub struct FlatCrossover;

impl CrossoverOperator for FlatCrossover {
    fn crossover<R: Rng>(
        &self,
        parent1: &RealVector,
        parent2: &RealVector,
        rng: &mut R,
    ) -> OperatorResult<RealVector> {
        if let Err(e) = check_parents(parent1, parent2) {
            return OperatorResult::Failed(e);
        }

        let genes = parent1
            .genes()
            .iter()
            .zip(parent2.genes())
            .map(|(&a, &b)| {
                let (low, high) = if a <= b { (a, b) } else { (b, a) };
                if low == high {
                    low
                } else {
                    rng.gen_range(low..=high)
                }
            })
            .collect();
        OperatorResult::Success(RealVector::new(genes))
    }
}

/// Arithmetic crossover
///
/// The child is a random convex combination of the parents.
#[derive(Clone, Debug, Default)]
pub struct ArithmeticCrossover;

impl CrossoverOperator for ArithmeticCrossover {
    fn crossover<R: Rng>(
        &self,
        parent1: &RealVector,
        parent2: &RealVector,
        rng: &mut R,
    ) -> OperatorResult<RealVector> {
        if let Err(e) = check_parents(parent1, parent2) {
            return OperatorResult::Failed(e);
        }

        let w: f64 = rng.gen();
        let genes = parent1
            .genes()
            .iter()
            .zip(parent2.genes())
            .map(|(&a, &b)| w * a + (1.0 - w) * b)
            .collect();
        OperatorResult::Success(RealVector::new(genes))
    }
}

/// Crossover operator named in an experiment file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CrossoverMethod {
    OnePoint,
    TwoPoint,
    Uniform {
        #[serde(default = "default_bias")]
        bias: f64,
    },
    Flat,
    Arithmetic,
}

fn default_bias() -> f64 {
    0.5
}

impl Default for CrossoverMethod {
    fn default() -> Self {
        Self::OnePoint
    }
}

impl CrossoverOperator for CrossoverMethod {
    fn crossover<R: Rng>(
        &self,
        parent1: &RealVector,
        parent2: &RealVector,
        rng: &mut R,
    ) -> OperatorResult<RealVector> {
        match self {
            Self::OnePoint => OnePointCrossover.crossover(parent1, parent2, rng),
            Self::TwoPoint => TwoPointCrossover.crossover(parent1, parent2, rng),
            Self::Uniform { bias } => UniformCrossover { bias: *bias }.crossover(parent1, parent2, rng),
            Self::Flat => FlatCrossover.crossover(parent1, parent2, rng),
            Self::Arithmetic => ArithmeticCrossover.crossover(parent1, parent2, rng),
        }
    }
}
