//! Individual wrapper type
//!
//! An individual is owned by exactly one island's population at a time.
//! Migration moves copies, never references.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::genome::bounds::MultiBounds;
use crate::genome::real_vector::RealVector;

/// An individual in a population
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Slot index inside the owning population
    pub id: usize,
    /// The genome of this individual
    pub genome: RealVector,
    /// The fitness value (None if not yet evaluated)
    pub fitness: Option<f64>,
    /// Whether a selection operator has picked this individual as a parent
    pub selected: bool,
    /// Optional per-gene clipping limits
    pub limits: Option<MultiBounds>,
}

impl Individual {
    /// Create a new individual with an unevaluated genome
    pub fn new(id: usize, genome: RealVector) -> Self {
        Self {
            id,
            genome,
            fitness: None,
            selected: false,
            limits: None,
        }
    }

    /// Create a new individual with a known fitness
    pub fn with_fitness(id: usize, genome: RealVector, fitness: f64) -> Self {
        Self {
            fitness: Some(fitness),
            ..Self::new(id, genome)
        }
    }

    /// Check if this individual has been evaluated
    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Fitness for ranking; unevaluated individuals rank lowest
    pub fn rank_value(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }

    /// Set the fitness value
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    /// Replace the genome, dropping the now stale fitness
    pub fn set_genome(&mut self, genome: RealVector) {
        self.genome = genome;
        self.fitness = None;
    }

    /// Clip genes to this individual's own limits, if it has any
    pub fn clip(&mut self) {
        if let Some(limits) = &self.limits {
            limits.clamp_vec(self.genome.genes_mut());
        }
    }

    /// Ascending fitness order, unevaluated first
    pub fn cmp_fitness(&self, other: &Self) -> Ordering {
        self.rank_value()
            .partial_cmp(&other.rank_value())
            .unwrap_or(Ordering::Equal)
    }

    /// Check if this individual is better than another
    pub fn is_better_than(&self, other: &Self) -> bool {
        self.cmp_fitness(other) == Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_individual_new() {
        let individual = Individual::new(3, RealVector::new(vec![1.0, 2.0, 3.0]));
        assert_eq!(individual.id, 3);
        assert!(!individual.is_evaluated());
        assert!(!individual.selected);
        assert_eq!(individual.rank_value(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_set_genome_clears_fitness() {
        let mut individual = Individual::with_fitness(0, RealVector::new(vec![1.0]), 5.0);
        individual.set_genome(RealVector::new(vec![2.0]));
        assert!(!individual.is_evaluated());
    }

    #[test]
    fn test_individual_is_better_than() {
        let a = Individual::with_fitness(0, RealVector::new(vec![1.0]), 100.0);
        let b = Individual::with_fitness(1, RealVector::new(vec![2.0]), 50.0);
        let c = Individual::new(2, RealVector::new(vec![3.0]));

        assert!(a.is_better_than(&b));
        assert!(!b.is_better_than(&a));
        assert!(b.is_better_than(&c));
    }

    #[test]
    fn test_clip_uses_own_limits() {
        let mut individual = Individual::new(0, RealVector::new(vec![-3.0, 0.5, 9.0]));
        individual.clip();
        assert_eq!(individual.genome.genes(), &[-3.0, 0.5, 9.0]);

        individual.limits = Some(MultiBounds::symmetric(1.0, 3));
        individual.clip();
        assert_eq!(individual.genome.genes(), &[-1.0, 0.5, 1.0]);
    }
}
