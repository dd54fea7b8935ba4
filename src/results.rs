//! Canonical result selection
//!
//! Every island (or independent run) finishes with an [`IslandOutcome`].
//! One of them is chosen as the run's result by the Euclidean norm of its
//! best genome.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EvoResult, EvolutionError};
use crate::genome::real_vector::RealVector;

/// How the canonical outcome is chosen
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Smallest best-genome norm
    Minimum,
    /// Largest best-genome norm
    #[default]
    Maximum,
    /// Any island, uniformly
    Random,
}

impl FromStr for SelectionMode {
    type Err = EvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimum" | "min" => Ok(Self::Minimum),
            "maximum" | "max" => Ok(Self::Maximum),
            "random" => Ok(Self::Random),
            other => Err(EvolutionError::Configuration(format!(
                "unknown select_best mode '{other}'"
            ))),
        }
    }
}

/// What one island reports at the end of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IslandOutcome {
    /// Island id, or run index for independent runs
    pub island: usize,
    /// Best-so-far fitness per generation
    pub bsf: Vec<f64>,
    /// Mean population fitness per generation
    pub average_fitness: Vec<f64>,
    /// Best genome found
    pub best_genome: RealVector,
}

impl IslandOutcome {
    /// Euclidean norm of the best genome
    pub fn norm(&self) -> f64 {
        self.best_genome.norm()
    }

    /// Final best-so-far fitness, if any generation completed
    pub fn final_bsf(&self) -> Option<f64> {
        self.bsf.last().copied()
    }

    /// Save as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> EvoResult<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Load from JSON
    pub fn load(path: impl AsRef<Path>) -> EvoResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Pick the canonical outcome; `None` only when `outcomes` is empty
pub fn select_best<'a, R: Rng>(
    outcomes: &'a [IslandOutcome],
    mode: SelectionMode,
    rng: &mut R,
) -> Option<&'a IslandOutcome> {
    let by_norm = |a: &&IslandOutcome, b: &&IslandOutcome| a.norm().total_cmp(&b.norm());
    match mode {
        SelectionMode::Minimum => outcomes.iter().min_by(by_norm),
        SelectionMode::Maximum => outcomes.iter().max_by(by_norm),
        SelectionMode::Random => outcomes.choose(rng),
    }
}
