//! Shared-memory island coordinator
//!
//! One named OS thread per island inside a `std::thread::scope`. All
//! islands meet at a single process-wide barrier, whatever the graph says,
//! and exchange emigrants through one mutex-guarded table of buffers.
//! Only that table is locked: pickup and replacement touch nothing but the
//! island's own population and run outside the mutex, ordered by the
//! barrier phases.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;

use tracing::{error, info};

use crate::algorithms::engine::IslandEngine;
use crate::algorithms::island::Island;
use crate::coordinator::protocol::{
    gather_outcomes, run_island, Immigrants, Phase, RunSettings, Transport,
};
use crate::error::{EvoResult, EvolutionError, TransportError};
use crate::genome::real_vector::RealVector;
use crate::population::individual::Individual;
use crate::report::{Reporter, ResultWriter};
use crate::results::IslandOutcome;
use crate::topology::graph::ConnectivityGraph;

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    epoch: u64,
    aborted: bool,
}

/// Reusable barrier that a failing participant can tear down.
///
/// `std::sync::Barrier` would leave the survivors blocked forever when one
/// island errors out, so waiting here returns `TransportError::Aborted`
/// instead.
#[derive(Debug)]
pub struct PhaseBarrier {
    participants: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl PhaseBarrier {
    pub fn new(participants: usize) -> Self {
        Self {
            participants,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
        }
    }

    /// Block until every participant arrives. Returns `true` for the last
    /// arrival.
    pub fn wait(&self) -> Result<bool, TransportError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.aborted {
            return Err(TransportError::Aborted);
        }

        let epoch = state.epoch;
        state.arrived += 1;
        if state.arrived == self.participants {
            state.arrived = 0;
            state.epoch += 1;
            self.cvar.notify_all();
            return Ok(true);
        }

        let state = self
            .cvar
            .wait_while(state, |s| s.epoch == epoch && !s.aborted)
            .unwrap_or_else(PoisonError::into_inner);
        if state.epoch == epoch {
            Err(TransportError::Aborted)
        } else {
            Ok(false)
        }
    }

    /// Release every current and future waiter with an error
    pub fn abort(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.aborted = true;
        self.cvar.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .aborted
    }
}

/// Owns everything the island threads share
pub struct SharedMemoryCoordinator<R: Reporter = ResultWriter> {
    graph: ConnectivityGraph,
    settings: RunSettings,
    barrier: PhaseBarrier,
    buffers: Mutex<Vec<Vec<RealVector>>>,
    reporter: Mutex<R>,
}

impl<R: Reporter> SharedMemoryCoordinator<R> {
    pub fn new(graph: ConnectivityGraph, settings: RunSettings, reporter: R) -> Self {
        let islands = graph.vertex_count();
        Self {
            graph,
            settings,
            barrier: PhaseBarrier::new(islands),
            buffers: Mutex::new(vec![Vec::new(); islands]),
            reporter: Mutex::new(reporter),
        }
    }

    pub fn graph(&self) -> &ConnectivityGraph {
        &self.graph
    }

    /// Recover the reporter after a run
    pub fn into_reporter(self) -> R {
        self.reporter
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run every island to completion.
    ///
    /// Island `i` must sit at index `i`. Outcomes come back in island order.
    /// If any island fails, the others are released from the barrier and the
    /// first real error is returned.
    pub fn run<E: IslandEngine>(&mut self, islands: &mut [Island<E>]) -> EvoResult<Vec<IslandOutcome>> {
        let count = self.graph.vertex_count();
        if islands.len() != count {
            return Err(EvolutionError::Configuration(format!(
                "{} islands for a graph of {count} vertices",
                islands.len()
            )));
        }
        if let Some(misplaced) = islands.iter().enumerate().find(|(i, island)| island.id() != *i) {
            return Err(EvolutionError::Configuration(format!(
                "island {} sits at index {}",
                misplaced.1.id(),
                misplaced.0
            )));
        }
        for island in islands.iter() {
            self.settings.check_island(island)?;
        }

        self.barrier = PhaseBarrier::new(count);
        self.buffers = Mutex::new(vec![Vec::new(); count]);
        info!(islands = count, generations = self.settings.generations, "starting shared-memory run");

        let this = &*self;
        let results: Vec<EvoResult<IslandOutcome>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(count);
            let mut results = Vec::with_capacity(count);

            for island in islands.iter_mut() {
                let id = island.id();
                let spawned = thread::Builder::new()
                    .name(format!("island-{id}"))
                    .spawn_scoped(scope, move || this.work(island));
                match spawned {
                    Ok(handle) => handles.push((id, handle)),
                    Err(err) => {
                        this.barrier.abort();
                        results.push(Err(EvolutionError::from(err)));
                        break;
                    }
                }
            }

            for (id, handle) in handles {
                let result = handle
                    .join()
                    .unwrap_or(Err(EvolutionError::WorkerPanicked { island: id }));
                results.push(result);
            }
            results
        });

        gather_outcomes(results)
    }

    fn work<E: IslandEngine>(&self, island: &mut Island<E>) -> EvoResult<IslandOutcome> {
        let id = island.id();
        let mut transport = SharedMemoryTransport {
            coordinator: self,
            island: id,
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            run_island(island, &mut transport, &self.settings, &self.reporter)
        }))
        .unwrap_or(Err(EvolutionError::WorkerPanicked { island: id }));

        if let Err(err) = &result {
            if !matches!(err, EvolutionError::Transport(TransportError::Aborted)) {
                error!(island = id, error = %err, "island failed, aborting run");
            }
            self.barrier.abort();
        }
        result
    }
}

/// One island's handle on the shared coordinator
struct SharedMemoryTransport<'a, R: Reporter> {
    coordinator: &'a SharedMemoryCoordinator<R>,
    island: usize,
}

impl<R: Reporter> Transport for SharedMemoryTransport<'_, R> {
    fn rendezvous(&mut self, _phase: Phase) -> Result<(), TransportError> {
        self.coordinator.barrier.wait().map(|_| ())
    }

    fn broadcast_to_neighbors(
        &mut self,
        _generation: usize,
        emigrants: &[Individual],
    ) -> Result<(), TransportError> {
        let mut buffers = self
            .coordinator
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let own = &mut buffers[self.island];
        own.clear();
        own.extend(emigrants.iter().map(|e| e.genome.clone()));
        Ok(())
    }

    fn collect_from_neighbors(&mut self, _generation: usize) -> Result<Vec<Immigrants>, TransportError> {
        let buffers = self
            .coordinator
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(self
            .coordinator
            .graph
            .sources(self.island)
            .iter()
            .map(|&source| Immigrants {
                source,
                genomes: buffers[source].clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_barrier_releases_all() {
        let barrier = PhaseBarrier::new(4);
        let leaders = AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..3 {
                        if barrier.wait().unwrap() {
                            leaders.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });
        assert_eq!(leaders.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_barrier_abort_wakes_waiters() {
        let barrier = Arc::new(PhaseBarrier::new(3));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait())
        };
        thread::sleep(Duration::from_millis(20));
        barrier.abort();
        assert!(matches!(waiter.join().unwrap(), Err(TransportError::Aborted)));
        assert!(barrier.is_aborted());
        assert!(matches!(barrier.wait(), Err(TransportError::Aborted)));
    }

    #[test]
    fn test_single_participant_never_blocks() {
        let barrier = PhaseBarrier::new(1);
        assert!(barrier.wait().unwrap());
        assert!(barrier.wait().unwrap());
    }
}
