//! Independent runs without migration
//!
//! Each run owns a fresh engine and executes on the rayon pool. Results are
//! reported as soon as a run completes, so console output from concurrent
//! runs never interleaves within a block.

use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;
use tracing::info;

use crate::algorithms::engine::IslandEngine;
use crate::algorithms::island::Island;
use crate::error::EvoResult;
use crate::report::{PrintOptions, Reporter};
use crate::results::IslandOutcome;

/// Execute `runs` complete runs of `generations` generations.
///
/// `build(run)` creates the engine for run `run`; outcomes come back in run
/// order and carry the run index as their island id.
pub fn run_independent<E, F, R>(
    runs: usize,
    generations: usize,
    print: &PrintOptions,
    reporter: &Mutex<R>,
    build: F,
) -> EvoResult<Vec<IslandOutcome>>
where
    E: IslandEngine,
    F: Fn(usize) -> EvoResult<Island<E>> + Sync,
    R: Reporter,
{
    info!(runs, generations, "starting independent runs");
    (0..runs)
        .into_par_iter()
        .map(|run| {
            let mut island = build(run)?;
            let engine = island.engine_mut();
            engine.evaluate_population();
            for _ in 0..generations {
                engine.evolve_one_generation()?;
            }

            let sorted = island.engine().sorted_population();
            let outcome = island.outcome()?;
            {
                let mut reporter = reporter.lock().unwrap_or_else(PoisonError::into_inner);
                print.emit(&mut *reporter, &sorted, &outcome)?;
            }
            info!(run, bsf = ?outcome.final_bsf(), "run finished");
            Ok(outcome)
        })
        .collect()
}
