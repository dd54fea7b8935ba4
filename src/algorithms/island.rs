//! Island state
//!
//! An island pairs an evolutionary engine with its outbound immigrant buffer
//! and the RNG used by the migration policies. The coordinator drives it
//! through the phase protocol; nothing here knows how immigrants travel.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::algorithms::engine::IslandEngine;
use crate::algorithms::generational::GeneticAlgorithm;
use crate::error::{EvoResult, EvolutionError};
use crate::genome::real_vector::RealVector;
use crate::migration::policy::MigrationPlan;
use crate::population::individual::Individual;
use crate::results::IslandOutcome;

/// State of a single island
pub struct Island<E: IslandEngine = GeneticAlgorithm> {
    id: usize,
    engine: E,
    immigrants: Vec<Individual>,
    rng: StdRng,
}

impl<E: IslandEngine> Island<E> {
    /// Create an island around an engine
    pub fn new(id: usize, engine: E, seed: u64) -> Self {
        Self {
            id,
            engine,
            immigrants: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Island index
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Individuals most recently picked for emigration
    pub fn immigrants(&self) -> &[Individual] {
        &self.immigrants
    }

    /// Refill the immigrant buffer according to the plan's pickup policy.
    ///
    /// The previous contents are discarded. Vacated population slots are
    /// refilled with fresh, evaluated genomes.
    pub fn pick_emigrants(&mut self, plan: &MigrationPlan) -> &[Individual] {
        self.immigrants.clear();
        let picked = plan
            .pickup
            .pickup(self.engine.migration_view(), plan.immigrants, &mut self.rng);
        self.immigrants.extend(picked);
        &self.immigrants
    }

    /// Overwrite residents with one source's immigrants
    pub fn absorb(&mut self, plan: &MigrationPlan, genomes: &[RealVector]) -> usize {
        plan.replacement
            .replace(self.engine.migration_view(), genomes, &mut self.rng)
    }

    /// Snapshot of what this island reports at the end of a run
    pub fn outcome(&self) -> EvoResult<IslandOutcome> {
        let best_genome = self
            .engine
            .best_genome()
            .cloned()
            .or_else(|| self.engine.population().best().map(|b| b.genome.clone()))
            .ok_or(EvolutionError::EmptyPopulation)?;

        Ok(IslandOutcome {
            island: self.id,
            bsf: self.engine.bsf().to_vec(),
            average_fitness: self.engine.average_fitness().to_vec(),
            best_genome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::benchmarks::Benchmark;
    use crate::fitness::traits::shared;
    use crate::genome::bounds::MultiBounds;
    use crate::migration::policy::{PickupPolicy, ReplacementPolicy};
    use crate::operators::crossover::CrossoverMethod;
    use crate::operators::mutation::MutationMethod;
    use crate::operators::selection::SelectionMethod;

    fn island(id: usize) -> Island {
        let engine = GeneticAlgorithm::builder()
            .population_size(12)
            .offspring(6)
            .replacement(4)
            .max_generations(5)
            .bounds(MultiBounds::symmetric(5.12, 3))
            .fitness(shared(Benchmark::Sphere))
            .selection(SelectionMethod::Tournament { size: 2 })
            .crossover(CrossoverMethod::Uniform { bias: 0.5 })
            .mutation(MutationMethod::default())
            .seed(id as u64)
            .build()
            .unwrap();
        Island::new(id, engine, 100 + id as u64)
    }

    fn plan() -> MigrationPlan {
        MigrationPlan {
            pickup: PickupPolicy::Elite,
            replacement: ReplacementPolicy::Poor,
            immigrants: 2,
            interval: 1,
        }
    }

    #[test]
    fn test_pick_emigrants_clears_previous_buffer() {
        let mut island = island(0);
        island.engine_mut().evaluate_population();

        assert_eq!(island.pick_emigrants(&plan()).len(), 2);
        assert_eq!(island.pick_emigrants(&plan()).len(), 2);
        assert_eq!(island.immigrants().len(), 2);
        assert_eq!(island.engine().population().len(), 12);
        assert!(island.engine().population().all_evaluated());
    }

    #[test]
    fn test_absorb_overwrites_residents() {
        let mut island = island(1);
        island.engine_mut().evaluate_population();
        let origin = RealVector::zeros(3);

        let replaced = island.absorb(&plan(), &[origin.clone()]);
        assert_eq!(replaced, 1);
        let best = island.engine().population().best().unwrap();
        assert_eq!(best.genome, origin);
        assert_eq!(best.fitness, Some(0.0));
    }

    #[test]
    fn test_outcome_before_and_after_evolution() {
        let mut island = island(2);
        island.engine_mut().evaluate_population();
        let outcome = island.outcome().unwrap();
        assert!(outcome.bsf.is_empty());
        assert_eq!(outcome.best_genome.dimension(), 3);

        island.engine_mut().evolve_one_generation().unwrap();
        let outcome = island.outcome().unwrap();
        assert_eq!(outcome.island, 2);
        assert_eq!(outcome.bsf.len(), 1);
        assert_eq!(outcome.average_fitness.len(), 1);
    }
}
