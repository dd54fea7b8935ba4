//! Evolutionary engine interface
//!
//! The coordinator treats the single-population optimizer as an opaque
//! engine: it can evolve one generation, expose its population, score a
//! genome and report its bounds. Everything else stays inside the engine.

use crate::error::EvoResult;
use crate::fitness::traits::{Fitness, SharedFitness};
use crate::genome::bounds::MultiBounds;
use crate::genome::real_vector::RealVector;
use crate::population::individual::Individual;
use crate::population::population::Population;

/// Mutable access to what the migration policies touch, borrowed all at once
pub struct MigrationView<'a> {
    /// The island's resident population
    pub population: &'a mut Population,
    /// Fitness callback used to re-evaluate overwritten slots
    pub fitness: &'a dyn Fitness,
    /// Bounds used to sample replacement genomes
    pub bounds: &'a MultiBounds,
}

/// A single-population evolutionary engine driven by an island worker
pub trait IslandEngine: Send {
    /// Evaluate every individual that has no fitness yet
    fn evaluate_population(&mut self);

    /// Run exactly one generation
    fn evolve_one_generation(&mut self) -> EvoResult<()>;

    /// Copy of the population in ascending fitness order
    fn sorted_population(&self) -> Vec<Individual>;

    /// Swap the fitness callback; every cached fitness becomes stale
    fn set_fitness(&mut self, fitness: SharedFitness);

    /// The fitness callback
    fn fitness(&self) -> &dyn Fitness;

    /// Per-gene search bounds
    fn bounds(&self) -> &MultiBounds;

    /// The resident population
    fn population(&self) -> &Population;

    /// Split borrow for migration policies
    fn migration_view(&mut self) -> MigrationView<'_>;

    /// Best-so-far fitness, one entry per completed generation
    fn bsf(&self) -> &[f64];

    /// Mean population fitness, one entry per completed generation
    fn average_fitness(&self) -> &[f64];

    /// Best genome seen so far
    fn best_genome(&self) -> Option<&RealVector>;

    /// Number of completed generations
    fn generation(&self) -> usize;
}
