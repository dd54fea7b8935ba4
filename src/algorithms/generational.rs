//! Generational genetic algorithm
//!
//! The engine each island runs. Every generation it produces a batch of
//! offspring by selection, crossover and mutation, then overwrites the
//! worst residents with the best offspring. The population size never
//! changes.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithms::engine::{IslandEngine, MigrationView};
use crate::error::{EvoResult, EvolutionError, OperatorResult};
use crate::fitness::traits::{Fitness, SharedFitness};
use crate::genome::bounds::{Bounds, MultiBounds};
use crate::genome::real_vector::RealVector;
use crate::operators::crossover::CrossoverMethod;
use crate::operators::mutation::MutationMethod;
use crate::operators::selection::SelectionMethod;
use crate::operators::traits::{
    CrossoverOperator, MutationContext, MutationOperator, SelectionOperator,
};
use crate::population::individual::Individual;
use crate::population::population::Population;

/// How genes are kept inside their limits after variation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clipping {
    /// Clamp every child to the engine bounds
    #[default]
    Universal,
    /// Every slot carries its own copy of the engine bounds
    Individual,
    /// Per-slot limits read from a file
    File(PathBuf),
}

/// Configuration for the genetic algorithm
#[derive(Clone, Debug)]
pub struct GaConfig {
    /// Population size (mu)
    pub population_size: usize,
    /// Offspring produced per generation (lambda)
    pub offspring: usize,
    /// Residents overwritten by the best offspring each generation
    pub replacement: usize,
    /// Planned run length, used by time-dependent mutation
    pub max_generations: usize,
    /// Whether to evaluate offspring on the rayon pool
    pub parallel_evaluation: bool,
    /// Clipping mode
    pub clipping: Clipping,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            offspring: 20,
            replacement: 10,
            max_generations: 100,
            parallel_evaluation: false,
            clipping: Clipping::Universal,
        }
    }
}

/// Read per-slot clipping limits.
///
/// For every slot the file holds `dimension` lower limits followed by
/// `dimension` upper limits, whitespace separated.
pub fn read_clipping_file(
    path: &Path,
    population_size: usize,
    dimension: usize,
) -> EvoResult<Vec<MultiBounds>> {
    let text = fs::read_to_string(path).map_err(|e| {
        EvolutionError::Configuration(format!(
            "unable to open clipping file {}: {e}",
            path.display()
        ))
    })?;
    let values = text
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                EvolutionError::Configuration(format!(
                    "invalid value '{token}' in clipping file {}",
                    path.display()
                ))
            })
        })
        .collect::<EvoResult<Vec<f64>>>()?;

    let needed = population_size * dimension * 2;
    if values.len() < needed {
        return Err(EvolutionError::Configuration(format!(
            "clipping file {} holds {} values, {needed} needed",
            path.display(),
            values.len()
        )));
    }

    values
        .chunks_exact(dimension * 2)
        .take(population_size)
        .map(|record| {
            let (lower, upper) = record.split_at(dimension);
            lower
                .iter()
                .zip(upper)
                .map(|(&min, &max)| Bounds::try_new(min, max))
                .collect::<Result<Vec<_>, _>>()
                .map(MultiBounds::new)
                .map_err(EvolutionError::from)
        })
        .collect()
}

/// Builder for GeneticAlgorithm
pub struct GeneticAlgorithmBuilder<S, C, M> {
    config: GaConfig,
    bounds: Option<MultiBounds>,
    selection: Option<S>,
    crossover: Option<C>,
    mutation: Option<M>,
    fitness: Option<SharedFitness>,
    seed: Option<u64>,
}

impl GeneticAlgorithmBuilder<(), (), ()> {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: GaConfig::default(),
            bounds: None,
            selection: None,
            crossover: None,
            mutation: None,
            fitness: None,
            seed: None,
        }
    }
}

impl Default for GeneticAlgorithmBuilder<(), (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, C, M> GeneticAlgorithmBuilder<S, C, M> {
    /// Replace the whole configuration
    pub fn config(mut self, config: GaConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the population size
    pub fn population_size(mut self, size: usize) -> Self {
        self.config.population_size = size;
        self
    }

    /// Set the number of offspring per generation
    pub fn offspring(mut self, count: usize) -> Self {
        self.config.offspring = count;
        self
    }

    /// Set how many residents the offspring replace
    pub fn replacement(mut self, count: usize) -> Self {
        self.config.replacement = count;
        self
    }

    /// Set the planned number of generations
    pub fn max_generations(mut self, generations: usize) -> Self {
        self.config.max_generations = generations;
        self
    }

    /// Set the clipping mode
    pub fn clipping(mut self, clipping: Clipping) -> Self {
        self.config.clipping = clipping;
        self
    }

    /// Set the search space bounds
    pub fn bounds(mut self, bounds: MultiBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Set the fitness callback
    pub fn fitness(mut self, fitness: SharedFitness) -> Self {
        self.fitness = Some(fitness);
        self
    }

    /// Seed the engine's random number generator
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the selection operator
    pub fn selection<NewS: SelectionOperator>(self, selection: NewS) -> GeneticAlgorithmBuilder<NewS, C, M> {
        GeneticAlgorithmBuilder {
            config: self.config,
            bounds: self.bounds,
            selection: Some(selection),
            crossover: self.crossover,
            mutation: self.mutation,
            fitness: self.fitness,
            seed: self.seed,
        }
    }

    /// Set the crossover operator
    pub fn crossover<NewC: CrossoverOperator>(self, crossover: NewC) -> GeneticAlgorithmBuilder<S, NewC, M> {
        GeneticAlgorithmBuilder {
            config: self.config,
            bounds: self.bounds,
            selection: self.selection,
            crossover: Some(crossover),
            mutation: self.mutation,
            fitness: self.fitness,
            seed: self.seed,
        }
    }

    /// Set the mutation operator
    pub fn mutation<NewM: MutationOperator>(self, mutation: NewM) -> GeneticAlgorithmBuilder<S, C, NewM> {
        GeneticAlgorithmBuilder {
            config: self.config,
            bounds: self.bounds,
            selection: self.selection,
            crossover: self.crossover,
            mutation: Some(mutation),
            fitness: self.fitness,
            seed: self.seed,
        }
    }
}

impl<S, C, M> GeneticAlgorithmBuilder<S, C, M>
where
    S: SelectionOperator,
    C: CrossoverOperator,
    M: MutationOperator,
{
    /// Build the GeneticAlgorithm instance
    pub fn build(self) -> EvoResult<GeneticAlgorithm<S, C, M>> {
        let bounds = self
            .bounds
            .ok_or_else(|| EvolutionError::Configuration("Bounds must be specified".to_string()))?;

        let selection = self.selection.ok_or_else(|| {
            EvolutionError::Configuration("Selection operator must be specified".to_string())
        })?;

        let crossover = self.crossover.ok_or_else(|| {
            EvolutionError::Configuration("Crossover operator must be specified".to_string())
        })?;

        let mutation = self.mutation.ok_or_else(|| {
            EvolutionError::Configuration("Mutation operator must be specified".to_string())
        })?;

        let fitness = self.fitness.ok_or_else(|| {
            EvolutionError::Configuration("Fitness function must be specified".to_string())
        })?;

        let config = self.config;
        if config.population_size < 2 {
            return Err(EvolutionError::Configuration(
                "population size must be at least 2".to_string(),
            ));
        }
        if config.offspring == 0 {
            return Err(EvolutionError::Configuration(
                "at least one offspring per generation is required".to_string(),
            ));
        }
        if config.replacement > config.offspring || config.replacement > config.population_size {
            return Err(EvolutionError::Configuration(format!(
                "cannot replace {} residents with {} offspring in a population of {}",
                config.replacement, config.offspring, config.population_size
            )));
        }
        if bounds.dimension() == 0 {
            return Err(EvolutionError::Configuration(
                "genome size must be at least 1".to_string(),
            ));
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut population = Population::random(config.population_size, &bounds, &mut rng);

        match &config.clipping {
            Clipping::Universal => {}
            Clipping::Individual => {
                for individual in population.iter_mut() {
                    individual.limits = Some(bounds.clone());
                }
            }
            Clipping::File(path) => {
                let limits = read_clipping_file(path, config.population_size, bounds.dimension())?;
                for (individual, limits) in population.iter_mut().zip(limits) {
                    individual.limits = Some(limits);
                }
            }
        }

        Ok(GeneticAlgorithm {
            config,
            bounds,
            selection,
            crossover,
            mutation,
            fitness,
            population,
            bsf: Vec::new(),
            average_fitness: Vec::new(),
            best: None,
            generation: 0,
            rng,
        })
    }
}

/// Generational genetic algorithm
///
/// Operators default to the configuration-file enums.
pub struct GeneticAlgorithm<S = SelectionMethod, C = CrossoverMethod, M = MutationMethod> {
    config: GaConfig,
    bounds: MultiBounds,
    selection: S,
    crossover: C,
    mutation: M,
    fitness: SharedFitness,
    population: Population,
    bsf: Vec<f64>,
    average_fitness: Vec<f64>,
    best: Option<Individual>,
    generation: usize,
    rng: StdRng,
}

impl GeneticAlgorithm {
    /// Create a builder for GeneticAlgorithm
    pub fn builder() -> GeneticAlgorithmBuilder<(), (), ()> {
        GeneticAlgorithmBuilder::new()
    }
}

impl<S, C, M> GeneticAlgorithm<S, C, M>
where
    S: SelectionOperator,
    C: CrossoverOperator,
    M: MutationOperator,
{
    /// The engine configuration
    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    /// Evaluate, then evolve for the configured number of generations
    pub fn run(&mut self) -> EvoResult<()> {
        self.evaluate_population();
        for _ in 0..self.config.max_generations {
            self.evolve_one_generation()?;
        }
        Ok(())
    }

    fn record_statistics(&mut self) -> EvoResult<()> {
        let current = self.population.best().ok_or(EvolutionError::EmptyPopulation)?;
        let improved = self
            .best
            .as_ref()
            .map_or(true, |best| current.is_better_than(best));
        if improved {
            self.best = Some(current.clone());
        }

        let best_so_far = self
            .best
            .as_ref()
            .map_or(f64::NEG_INFINITY, Individual::rank_value);
        self.bsf.push(best_so_far);
        self.average_fitness
            .push(self.population.mean_fitness().unwrap_or(f64::NEG_INFINITY));
        Ok(())
    }

    fn breed(&mut self) -> Vec<Individual> {
        let fitness_values = self.population.fitness_values();
        let context = MutationContext {
            bounds: &self.bounds,
            generation: self.generation,
            max_generations: self.config.max_generations,
        };

        let mut offspring = Vec::with_capacity(self.config.offspring);
        for k in 0..self.config.offspring {
            let i1 = self.selection.select(&fitness_values, &mut self.rng);
            let i2 = self.selection.select(&fitness_values, &mut self.rng);
            self.population[i1].selected = true;
            self.population[i2].selected = true;

            let parent1 = &self.population[i1].genome;
            let parent2 = &self.population[i2].genome;
            let mut child = match self.crossover.crossover(parent1, parent2, &mut self.rng) {
                OperatorResult::Success(child) => child,
                OperatorResult::Failed(err) => {
                    debug!(error = %err, "crossover failed, cloning first parent");
                    parent1.clone()
                }
            };

            self.mutation.mutate(&mut child, &context, &mut self.rng);
            if self.config.clipping == Clipping::Universal {
                self.bounds.clamp_vec(child.genes_mut());
            }
            offspring.push(Individual::new(k, child));
        }
        offspring
    }

    fn replace_worst(&mut self, offspring: Vec<Individual>) {
        let mut offspring = Population::from_individuals(offspring);
        if self.config.parallel_evaluation {
            offspring.evaluate_parallel(self.fitness.as_ref());
        } else {
            offspring.evaluate(self.fitness.as_ref());
        }

        let ranked = offspring.sorted();
        let order = self.population.ascending_order();
        for (&slot, child) in order
            .iter()
            .zip(ranked.iter().rev())
            .take(self.config.replacement)
        {
            self.population
                .overwrite(slot, child.genome.clone(), child.rank_value());

            let individual = &mut self.population[slot];
            let outside = individual
                .limits
                .as_ref()
                .is_some_and(|limits| !limits.contains_vec(individual.genome.genes()));
            if outside {
                individual.clip();
                let f = self.fitness.evaluate(individual.genome.genes());
                individual.set_fitness(f);
            }
        }
    }
}

impl<S, C, M> IslandEngine for GeneticAlgorithm<S, C, M>
where
    S: SelectionOperator,
    C: CrossoverOperator,
    M: MutationOperator,
{
    fn evaluate_population(&mut self) {
        if self.config.parallel_evaluation {
            self.population.evaluate_parallel(self.fitness.as_ref());
        } else {
            self.population.evaluate(self.fitness.as_ref());
        }
    }

    fn evolve_one_generation(&mut self) -> EvoResult<()> {
        if self.population.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }
        self.evaluate_population();
        self.record_statistics()?;

        let offspring = self.breed();
        self.replace_worst(offspring);
        self.population.reset_selection_flags();

        self.generation += 1;
        Ok(())
    }

    fn sorted_population(&self) -> Vec<Individual> {
        self.population.sorted()
    }

    fn set_fitness(&mut self, fitness: SharedFitness) {
        self.fitness = fitness;
        for individual in self.population.iter_mut() {
            individual.fitness = None;
        }
        self.best = None;
    }

    fn fitness(&self) -> &dyn Fitness {
        self.fitness.as_ref()
    }

    fn bounds(&self) -> &MultiBounds {
        &self.bounds
    }

    fn population(&self) -> &Population {
        &self.population
    }

    fn migration_view(&mut self) -> MigrationView<'_> {
        MigrationView {
            population: &mut self.population,
            fitness: self.fitness.as_ref(),
            bounds: &self.bounds,
        }
    }

    fn bsf(&self) -> &[f64] {
        &self.bsf
    }

    fn average_fitness(&self) -> &[f64] {
        &self.average_fitness
    }

    fn best_genome(&self) -> Option<&RealVector> {
        self.best.as_ref().map(|best| &best.genome)
    }

    fn generation(&self) -> usize {
        self.generation
    }
}
