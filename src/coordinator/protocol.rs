//! The phase protocol
//!
//! Written once and parameterized by a [`Transport`]. Every island runs
//! [`run_island`] concurrently with its peers:
//!
//! 1. evolve one generation
//! 2. rendezvous
//! 3. on migration generations: pick emigrants and publish them, rendezvous,
//!    collect every source's batch and apply the replacement policy,
//!    rendezvous
//!
//! After the last generation there is a final rendezvous, then the island
//! reports through the shared reporter.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use crate::algorithms::engine::IslandEngine;
use crate::algorithms::island::Island;
use crate::error::{EvoResult, EvolutionError, TransportError};
use crate::genome::real_vector::RealVector;
use crate::migration::policy::MigrationPlan;
use crate::population::individual::Individual;
use crate::report::{PrintOptions, Reporter};
use crate::results::IslandOutcome;

/// Synchronization points of one generation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Every island finished evolving
    Evolved,
    /// Every island published its emigrants
    Published,
    /// Every island applied its immigrants
    Committed,
    /// Every island finished the run
    Finished,
}

/// One source island's emigrants as seen by the receiver
#[derive(Clone, Debug, PartialEq)]
pub struct Immigrants {
    pub source: usize,
    pub genomes: Vec<RealVector>,
}

/// How immigrants move between islands
pub trait Transport {
    /// Block until the participants of this transport reach the same phase
    fn rendezvous(&mut self, phase: Phase) -> Result<(), TransportError>;

    /// Make this island's emigrants available to its destinations
    fn broadcast_to_neighbors(
        &mut self,
        generation: usize,
        emigrants: &[Individual],
    ) -> Result<(), TransportError>;

    /// One batch per source, in the graph's source order
    fn collect_from_neighbors(&mut self, generation: usize) -> Result<Vec<Immigrants>, TransportError>;
}

/// Run parameters shared by every island
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub generations: usize,
    pub plan: MigrationPlan,
    pub print: PrintOptions,
}

impl RunSettings {
    /// An island must hold at least as many individuals as it emits each epoch
    pub(crate) fn check_island<E: IslandEngine>(&self, island: &Island<E>) -> EvoResult<()> {
        let size = island.engine().population().len();
        if self.plan.immigrants > size {
            return Err(EvolutionError::Configuration(format!(
                "island {} holds {size} individuals but emits {} per epoch",
                island.id(),
                self.plan.immigrants
            )));
        }
        Ok(())
    }
}

/// Drive one island through the whole run
pub fn run_island<E, T, R>(
    island: &mut Island<E>,
    transport: &mut T,
    settings: &RunSettings,
    reporter: &Mutex<R>,
) -> EvoResult<IslandOutcome>
where
    E: IslandEngine,
    T: Transport,
    R: Reporter + ?Sized,
{
    let id = island.id();
    island.engine_mut().evaluate_population();

    for generation in 0..settings.generations {
        island.engine_mut().evolve_one_generation()?;
        transport.rendezvous(Phase::Evolved)?;

        if settings.plan.is_migration_generation(generation) {
            let emigrants = island.pick_emigrants(&settings.plan);
            transport.broadcast_to_neighbors(generation, emigrants)?;
            transport.rendezvous(Phase::Published)?;

            for batch in transport.collect_from_neighbors(generation)? {
                let replaced = island.absorb(&settings.plan, &batch.genomes);
                debug!(island = id, source = batch.source, generation, replaced, "migration");
            }
            transport.rendezvous(Phase::Committed)?;
        }
    }

    transport.rendezvous(Phase::Finished)?;

    let sorted = island.engine().sorted_population();
    let outcome = island.outcome()?;
    {
        let mut reporter = reporter.lock().unwrap_or_else(PoisonError::into_inner);
        settings.print.emit(&mut *reporter, &sorted, &outcome)?;
    }
    info!(island = id, bsf = ?outcome.final_bsf(), "island finished");
    Ok(outcome)
}

/// Whether an error is only the echo of another island's failure
fn is_secondary(err: &EvolutionError) -> bool {
    matches!(
        err,
        EvolutionError::Transport(TransportError::Aborted | TransportError::Disconnected { .. })
    )
}

/// Outcomes in island order, or the root-cause error if any island failed
pub(crate) fn gather_outcomes(results: Vec<EvoResult<IslandOutcome>>) -> EvoResult<Vec<IslandOutcome>> {
    let mut outcomes = Vec::with_capacity(results.len());
    let mut failure = None;
    let mut secondary = None;
    for result in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) if is_secondary(&err) => {
                secondary.get_or_insert(err);
            }
            Err(err) => {
                failure.get_or_insert(err);
            }
        }
    }
    match failure.or(secondary) {
        Some(err) => Err(err),
        None => Ok(outcomes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(island: usize) -> IslandOutcome {
        IslandOutcome {
            island,
            bsf: Vec::new(),
            average_fitness: Vec::new(),
            best_genome: RealVector::zeros(1),
        }
    }

    #[test]
    fn test_gather_prefers_root_cause() {
        let results = vec![
            Err(TransportError::Aborted.into()),
            Ok(outcome(1)),
            Err(EvolutionError::EmptyPopulation),
            Err(TransportError::Disconnected { peer: 2 }.into()),
        ];
        assert!(matches!(
            gather_outcomes(results),
            Err(EvolutionError::EmptyPopulation)
        ));
    }

    #[test]
    fn test_gather_keeps_order() {
        let outcomes = gather_outcomes(vec![Ok(outcome(0)), Ok(outcome(1))]).unwrap();
        let ids: Vec<usize> = outcomes.iter().map(|o| o.island).collect();
        assert_eq!(ids, vec![0, 1]);

        assert!(matches!(
            gather_outcomes(vec![Ok(outcome(0)), Err(TransportError::Aborted.into())]),
            Err(EvolutionError::Transport(TransportError::Aborted))
        ));
    }
}
