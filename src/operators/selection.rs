//! Selection operators
//!
//! Parent selection over the fitness values of a population.

use rand::seq::index;
use rand::Rng;
use rand_distr::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::operators::traits::SelectionOperator;

/// Tournament selection operator
///
/// Selects the best individual from a random subset of the population.
#[derive(Clone, Debug)]
pub struct TournamentSelection {
    /// Tournament size (number of individuals competing)
    pub tournament_size: usize,
}

impl TournamentSelection {
    /// Create a new tournament selection with the given size
    pub fn new(tournament_size: usize) -> Self {
        Self {
            tournament_size: tournament_size.max(1),
        }
    }
}

impl SelectionOperator for TournamentSelection {
    fn select<R: Rng>(&self, fitness: &[f64], rng: &mut R) -> usize {
        let size = self.tournament_size.min(fitness.len());
        index::sample(rng, fitness.len(), size)
            .into_iter()
            .max_by(|&a, &b| {
                fitness[a]
                    .partial_cmp(&fitness[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0)
    }
}

/// Roulette wheel selection (fitness proportionate)
///
/// Fitness is shifted so that the worst individual keeps a small weight.
#[derive(Clone, Debug, Default)]
pub struct RouletteSelection;

impl SelectionOperator for RouletteSelection {
    fn select<R: Rng>(&self, fitness: &[f64], rng: &mut R) -> usize {
        let min_fitness = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let offset = if min_fitness < 0.0 { 1.0 - min_fitness } else { 0.0 };
        let weights: Vec<f64> = fitness.iter().map(|f| f + offset).collect();

        match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.gen_range(0..fitness.len()),
        }
    }
}

/// Truncation selection
///
/// Selects uniformly from the top fraction of the population.
#[derive(Clone, Debug)]
pub struct TruncationSelection {
    /// Fraction of population to select from (0.0 to 1.0]
    pub truncation_ratio: f64,
}

impl TruncationSelection {
    /// Create a new truncation selection
    pub fn new(truncation_ratio: f64) -> Self {
        Self {
            truncation_ratio: truncation_ratio.clamp(f64::EPSILON, 1.0),
        }
    }
}

impl SelectionOperator for TruncationSelection {
    fn select<R: Rng>(&self, fitness: &[f64], rng: &mut R) -> usize {
        let mut indices: Vec<usize> = (0..fitness.len()).collect();
        indices.sort_by(|&a, &b| {
            fitness[b]
                .partial_cmp(&fitness[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let cutoff = ((fitness.len() as f64) * self.truncation_ratio).ceil() as usize;
        indices[rng.gen_range(0..cutoff.clamp(1, fitness.len()))]
    }
}

/// Random selection (uniform)
#[derive(Clone, Debug, Default)]
pub struct RandomSelection;

impl SelectionOperator for RandomSelection {
    fn select<R: Rng>(&self, fitness: &[f64], rng: &mut R) -> usize {
        rng.gen_range(0..fitness.len())
    }
}

/// Selection operator named in an experiment file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SelectionMethod {
    /// k-tournament
    Tournament { size: usize },
    /// Uniform draw from the best `ratio` of the population
    Truncation { ratio: f64 },
    /// Fitness proportionate
    Roulette,
    /// Uniform draw
    Random,
}

impl Default for SelectionMethod {
    fn default() -> Self {
        Self::Tournament { size: 3 }
    }
}

impl SelectionOperator for SelectionMethod {
    fn select<R: Rng>(&self, fitness: &[f64], rng: &mut R) -> usize {
        match self {
            Self::Tournament { size } => TournamentSelection::new(*size).select(fitness, rng),
            Self::Truncation { ratio } => TruncationSelection::new(*ratio).select(fitness, rng),
            Self::Roulette => RouletteSelection.select(fitness, rng),
            Self::Random => RandomSelection.select(fitness, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fitness(size: usize) -> Vec<f64> {
        (0..size).map(|i| i as f64).collect()
    }

    #[test]
    fn test_tournament_selection_selects_valid_index() {
        let mut rng = StdRng::seed_from_u64(42);
        let fitness = fitness(10);
        let selection = TournamentSelection::new(3);

        for _ in 0..100 {
            assert!(selection.select(&fitness, &mut rng) < fitness.len());
        }
    }

    #[test]
    fn test_full_tournament_picks_best() {
        let mut rng = StdRng::seed_from_u64(42);
        let fitness = vec![-3.0, 7.0, 1.0, 2.0];
        let selection = TournamentSelection::new(4);
        assert_eq!(selection.select(&fitness, &mut rng), 1);
    }

    #[test]
    fn test_truncation_stays_in_top_fraction() {
        let mut rng = StdRng::seed_from_u64(42);
        let fitness = fitness(10);
        let selection = TruncationSelection::new(0.2);
        for _ in 0..100 {
            assert!(selection.select(&fitness, &mut rng) >= 8);
        }
    }

    #[test]
    fn test_roulette_handles_negative_fitness() {
        let mut rng = StdRng::seed_from_u64(42);
        let fitness = vec![-100.0, -50.0, -1.0];
        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            counts[RouletteSelection.select(&fitness, &mut rng)] += 1;
        }
        assert!(counts[2] > counts[0]);
    }

    #[test]
    fn test_selection_method_deserialize() {
        let method: SelectionMethod =
            serde_json::from_str(r#"{"method": "tournament", "size": 5}"#).unwrap();
        assert_eq!(method, SelectionMethod::Tournament { size: 5 });

        let method: SelectionMethod = serde_json::from_str(r#"{"method": "roulette"}"#).unwrap();
        assert_eq!(method, SelectionMethod::Roulette);
    }
}
