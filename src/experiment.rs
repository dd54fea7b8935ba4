//! Experiment execution
//!
//! Ties a validated [`ExperimentConfig`] to a fitness callback and a master
//! seed, then runs it as independent runs, as an in-process island model or
//! as one rank of a multi-process island model.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::algorithms::independent::run_independent;
use crate::config::ExperimentConfig;
use crate::coordinator::distributed::DistributedCoordinator;
use crate::coordinator::shared::SharedMemoryCoordinator;
use crate::coordinator::tcp::TcpWire;
use crate::error::{EvoResult, EvolutionError};
use crate::fitness::traits::{shared, SharedFitness};
use crate::report::ResultWriter;
use crate::results::{select_best, IslandOutcome, SelectionMode};

/// How islands of an in-process island model are connected
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Threads meeting at one barrier and sharing emigrant buffers
    #[default]
    SharedMemory,
    /// Threads exchanging frames over in-process channels
    MessagePassing,
}

/// Every outcome of an experiment plus the canonical one
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub outcomes: Vec<IslandOutcome>,
    pub mode: SelectionMode,
    /// Index into `outcomes`
    pub selected: usize,
}

impl Summary {
    /// Reduce outcomes with `select_best`
    pub fn new(outcomes: Vec<IslandOutcome>, mode: SelectionMode, seed: u64) -> EvoResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let selected = select_best(&outcomes, mode, &mut rng)
            .and_then(|best| outcomes.iter().position(|o| std::ptr::eq(o, best)))
            .ok_or(EvolutionError::EmptyPopulation)?;
        Ok(Self {
            outcomes,
            mode,
            selected,
        })
    }

    /// The canonical result
    pub fn best(&self) -> &IslandOutcome {
        &self.outcomes[self.selected]
    }
}

/// A configured experiment ready to run
pub struct Experiment {
    config: ExperimentConfig,
    fitness: SharedFitness,
    seed: u64,
}

impl Experiment {
    /// Use the benchmark named in the configuration
    pub fn new(config: ExperimentConfig, seed: Option<u64>) -> Self {
        let fitness = shared(config.evolution.fitness);
        Self::with_fitness(config, fitness, seed)
    }

    /// Use a caller-supplied fitness callback
    pub fn with_fitness(config: ExperimentConfig, fitness: SharedFitness, seed: Option<u64>) -> Self {
        let seed = config.master_seed(seed);
        Self {
            config,
            fitness,
            seed,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Run the island model when enabled, independent runs otherwise
    pub fn run(&self) -> EvoResult<Summary> {
        let outcomes = if self.config.island_model.enabled {
            self.run_island_model(Backend::SharedMemory)?
        } else {
            self.run_independent()?
        };
        self.summarize(outcomes)
    }

    /// All runs of a migration-free experiment
    pub fn run_independent(&self) -> EvoResult<Vec<IslandOutcome>> {
        let evo = &self.config.evolution;
        let reporter = Mutex::new(ResultWriter::stdout(self.config.print.destination.clone()));
        run_independent(evo.runs, evo.generations, &self.config.print, &reporter, |run| {
            self.config.build_island(run, self.fitness.clone(), self.seed)
        })
    }

    /// Every island of the graph inside this process
    pub fn run_island_model(&self, backend: Backend) -> EvoResult<Vec<IslandOutcome>> {
        let graph = self.config.load_graph()?;
        let count = graph.reconcile_island_count(self.config.island_model.islands);
        let settings = self.config.run_settings()?;
        let mut islands = self.config.build_islands(count, self.fitness.clone(), self.seed)?;
        let reporter = ResultWriter::stdout(self.config.print.destination.clone());
        info!(name = %self.config.name, islands = count, ?backend, seed = self.seed, "running island model");

        match backend {
            Backend::SharedMemory => {
                SharedMemoryCoordinator::new(graph, settings, reporter).run(&mut islands)
            }
            Backend::MessagePassing => DistributedCoordinator::new(graph, settings)
                .run_local(&mut islands, reporter)
                .map(|(outcomes, _)| outcomes),
        }
    }

    /// The island owned by `rank`, connected to its neighbors over TCP.
    ///
    /// `peers[i]` is the listening address of rank `i`; every rank of the
    /// graph needs an entry.
    pub fn run_node(&self, rank: usize, peers: &[SocketAddr], timeout: Duration) -> EvoResult<IslandOutcome> {
        let graph = self.config.load_graph()?;
        let count = graph.reconcile_island_count(self.config.island_model.islands);
        if peers.len() != count {
            return Err(EvolutionError::Configuration(format!(
                "{} peer addresses for {count} ranks",
                peers.len()
            )));
        }
        if rank >= count {
            return Err(EvolutionError::Configuration(format!(
                "rank {rank} is outside [0, {count})"
            )));
        }

        let settings = self.config.run_settings()?;
        let mut island = self.config.build_island(rank, self.fitness.clone(), self.seed)?;
        let wire = TcpWire::connect(rank, peers, &graph.neighbors(rank), timeout)?;
        let reporter = Mutex::new(ResultWriter::stdout(self.config.print.destination.clone()));
        DistributedCoordinator::new(graph, settings).run_rank(&mut island, wire, &reporter)
    }

    /// Pick the canonical outcome with the configured mode
    pub fn summarize(&self, outcomes: Vec<IslandOutcome>) -> EvoResult<Summary> {
        let summary = Summary::new(outcomes, self.config.island_model.select_best, self.seed)?;
        let best = summary.best();
        info!(
            island = best.island,
            norm = best.norm(),
            bsf = ?best.final_bsf(),
            mode = ?summary.mode,
            "selected canonical result"
        );
        Ok(summary)
    }
}
