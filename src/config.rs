//! Experiment configuration
//!
//! An experiment is a JSON document with one section per concern:
//!
//! ```json
//! {
//!   "name": "sphere-ring",
//!   "evolution": {
//!     "generations": 200, "population_size": 40, "offspring": 20,
//!     "replacement": 10, "genome_size": 8,
//!     "lower": [-5.12], "upper": [5.12], "fitness": "sphere"
//!   },
//!   "selection": { "method": "tournament", "size": 3 },
//!   "crossover": { "method": "flat" },
//!   "mutation": { "method": "delta", "rate": 0.1, "sigma": 0.5 },
//!   "print": { "bsf": true, "where_to_write": "stdout" },
//!   "island_model": {
//!     "enabled": true, "immigrants": 2, "migration_interval": 10,
//!     "islands": 4, "graph_file": "ring.dat",
//!     "pickup": "elite", "replace": "poor"
//!   }
//! }
//! ```
//!
//! Policy names are parsed once, in [`ExperimentConfig::migration_plan`].

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::algorithms::generational::{Clipping, GaConfig, GeneticAlgorithm};
use crate::algorithms::island::Island;
use crate::coordinator::protocol::RunSettings;
use crate::error::{EvoResult, EvolutionError};
use crate::fitness::benchmarks::Benchmark;
use crate::fitness::traits::SharedFitness;
use crate::genome::bounds::MultiBounds;
use crate::migration::policy::{MigrationPlan, PickupPolicy, ReplacementPolicy};
use crate::operators::crossover::CrossoverMethod;
use crate::operators::mutation::MutationMethod;
use crate::operators::selection::SelectionMethod;
use crate::report::{Destination, PrintOptions};
use crate::results::SelectionMode;
use crate::topology::generators::TopologyKind;
use crate::topology::graph::{ConnectivityGraph, GraphForm};

fn default_name() -> String {
    "experiment".to_string()
}

fn default_runs() -> usize {
    1
}

/// Engine parameters shared by every island
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub generations: usize,
    #[serde(default = "default_runs")]
    pub runs: usize,
    pub population_size: usize,
    pub offspring: usize,
    pub genome_size: usize,
    pub replacement: usize,
    /// One value per gene, or a single value for all genes
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    #[serde(default)]
    pub clipping: Clipping,
    pub fitness: Benchmark,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub parallel_evaluation: bool,
}

/// Island model parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IslandModelConfig {
    pub enabled: bool,
    pub immigrants: usize,
    pub migration_interval: usize,
    pub islands: usize,
    /// Ring of `islands` vertices when absent
    pub graph_file: Option<PathBuf>,
    pub graph_form: GraphForm,
    pub pickup: String,
    pub replace: String,
    pub select_best: SelectionMode,
}

impl Default for IslandModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            immigrants: 1,
            migration_interval: 10,
            islands: 4,
            graph_file: None,
            graph_form: GraphForm::Simple,
            pickup: "elite".to_string(),
            replace: "poor".to_string(),
            select_best: SelectionMode::Maximum,
        }
    }
}

/// A complete experiment description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub selection: SelectionMethod,
    #[serde(default)]
    pub crossover: CrossoverMethod,
    #[serde(default)]
    pub mutation: MutationMethod,
    #[serde(default)]
    pub print: PrintOptions,
    #[serde(default)]
    pub island_model: IslandModelConfig,
}

impl ExperimentConfig {
    /// Read, validate and prepare an experiment file
    pub fn load(path: impl AsRef<Path>) -> EvoResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            EvolutionError::Configuration(format!("unable to open {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        config.prepare_output()?;
        info!(name = %config.name, path = %path.display(), "loaded experiment");
        Ok(config)
    }

    /// Parse an experiment from JSON text and validate it
    pub fn from_json(text: &str) -> EvoResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every cross-field constraint
    pub fn validate(&self) -> EvoResult<()> {
        let evo = &self.evolution;
        if evo.population_size < 2 {
            return Err(EvolutionError::Configuration(
                "population_size must be at least 2".to_string(),
            ));
        }
        if evo.offspring < 2 {
            return Err(EvolutionError::Configuration(
                "offspring must be at least 2".to_string(),
            ));
        }
        if evo.replacement > evo.offspring {
            return Err(EvolutionError::Configuration(format!(
                "replacement ({}) cannot exceed offspring ({})",
                evo.replacement, evo.offspring
            )));
        }
        if evo.runs == 0 {
            return Err(EvolutionError::Configuration(
                "runs must be at least 1".to_string(),
            ));
        }
        self.bounds()?;

        let im = &self.island_model;
        if im.enabled {
            self.migration_plan()?;
            if im.immigrants > evo.population_size {
                return Err(EvolutionError::Configuration(format!(
                    "{} immigrants exceed the population size {}",
                    im.immigrants, evo.population_size
                )));
            }
            if evo.runs > 1 {
                return Err(EvolutionError::Configuration(
                    "the island model runs once; set runs to 1".to_string(),
                ));
            }
            if im.islands == 0 && im.graph_file.is_none() {
                return Err(EvolutionError::Configuration(
                    "islands must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Create the output directory if results go to files
    pub fn prepare_output(&self) -> EvoResult<()> {
        if let Destination::Directory(dir) = &self.print.destination {
            if !dir.is_dir() {
                fs::create_dir_all(dir)?;
                info!(directory = %dir.display(), "created output directory");
            }
        }
        Ok(())
    }

    /// Per-gene search bounds
    pub fn bounds(&self) -> EvoResult<MultiBounds> {
        let evo = &self.evolution;
        if evo.genome_size == 0 {
            return Err(EvolutionError::Configuration(
                "genome_size must be at least 1".to_string(),
            ));
        }
        Ok(MultiBounds::from_limits(&evo.lower, &evo.upper, evo.genome_size)?)
    }

    /// Parse the policy names and check the interval
    pub fn migration_plan(&self) -> EvoResult<MigrationPlan> {
        let im = &self.island_model;
        let plan = MigrationPlan {
            pickup: im.pickup.parse::<PickupPolicy>()?,
            replacement: im.replace.parse::<ReplacementPolicy>()?,
            immigrants: im.immigrants,
            interval: im.migration_interval,
        };
        plan.validate(self.evolution.generations)?;
        Ok(plan)
    }

    /// Everything the coordinator needs besides the graph and islands
    pub fn run_settings(&self) -> EvoResult<RunSettings> {
        Ok(RunSettings {
            generations: self.evolution.generations,
            plan: self.migration_plan()?,
            print: self.print.clone(),
        })
    }

    /// The connectivity graph, read from the configured file or a ring
    pub fn load_graph(&self) -> EvoResult<ConnectivityGraph> {
        let im = &self.island_model;
        match &im.graph_file {
            Some(path) => Ok(ConnectivityGraph::parse(path, im.graph_form)?),
            None => {
                info!(islands = im.islands, "no graph file, using a ring");
                Ok(TopologyKind::Ring.build(im.islands)?)
            }
        }
    }

    /// Master seed: explicit override, then the file, then entropy
    pub fn master_seed(&self, explicit: Option<u64>) -> u64 {
        explicit
            .or(self.evolution.seed)
            .unwrap_or_else(rand::random)
    }

    /// A fresh engine for one island or run
    pub fn build_engine(&self, fitness: SharedFitness, seed: u64) -> EvoResult<GeneticAlgorithm> {
        let evo = &self.evolution;
        GeneticAlgorithm::builder()
            .config(GaConfig {
                population_size: evo.population_size,
                offspring: evo.offspring,
                replacement: evo.replacement,
                max_generations: evo.generations,
                parallel_evaluation: evo.parallel_evaluation,
                clipping: evo.clipping.clone(),
            })
            .bounds(self.bounds()?)
            .fitness(fitness)
            .selection(self.selection.clone())
            .crossover(self.crossover.clone())
            .mutation(self.mutation.clone())
            .seed(seed)
            .build()
    }

    /// Island `id`, seeded the same way in every process
    pub fn build_island(&self, id: usize, fitness: SharedFitness, master_seed: u64) -> EvoResult<Island> {
        let seed = island_seed(master_seed, id);
        let engine = self.build_engine(fitness, seed)?;
        Ok(Island::new(id, engine, seed.rotate_left(17)))
    }

    /// Islands `0..count`
    pub fn build_islands(&self, count: usize, fitness: SharedFitness, master_seed: u64) -> EvoResult<Vec<Island>> {
        (0..count)
            .map(|id| self.build_island(id, fitness.clone(), master_seed))
            .collect()
    }
}

/// Seed for island or run `id`
pub fn island_seed(master_seed: u64, id: usize) -> u64 {
    master_seed.wrapping_add((id as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
