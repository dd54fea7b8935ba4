//! Operator traits
//!
//! This module defines the core operator traits for the genetic algorithm
//! that evolves each island.

use rand::Rng;

use crate::error::OperatorResult;
use crate::genome::bounds::MultiBounds;
use crate::genome::real_vector::RealVector;

/// Selection operator trait
///
/// Selects individuals from a population for reproduction.
pub trait SelectionOperator: Send + Sync {
    /// Select a single individual given the fitness of every slot
    ///
    /// Returns the slot index of the selected individual.
    fn select<R: Rng>(&self, fitness: &[f64], rng: &mut R) -> usize;
}

/// Crossover operator trait
///
/// Combines genetic material from two parents into one child.
pub trait CrossoverOperator: Send + Sync {
    /// Apply crossover to two parents
    fn crossover<R: Rng>(
        &self,
        parent1: &RealVector,
        parent2: &RealVector,
        rng: &mut R,
    ) -> OperatorResult<RealVector>;
}

/// What a mutation may know about the run it is part of
#[derive(Clone, Copy, Debug)]
pub struct MutationContext<'a> {
    /// Search bounds of the island
    pub bounds: &'a MultiBounds,
    /// Zero-based generation being produced
    pub generation: usize,
    /// Total generations of the run
    pub max_generations: usize,
}

impl MutationContext<'_> {
    /// Fraction of the run already elapsed, in [0, 1]
    pub fn progress(&self) -> f64 {
        if self.max_generations == 0 {
            1.0
        } else {
            (self.generation as f64 / self.max_generations as f64).min(1.0)
        }
    }
}

/// Mutation operator trait
///
/// Applies random changes to a genome in place.
pub trait MutationOperator: Send + Sync {
    /// Apply mutation to a genome in place
    fn mutate<R: Rng>(&self, genome: &mut RealVector, context: &MutationContext<'_>, rng: &mut R);
}
