//! Population type
//!
//! A fixed-size container of individuals. Slot `i` always holds the
//! individual whose `id` is `i`, so a sorted view can refer back to the
//! slot it came from.

use rand::Rng;
use rayon::prelude::*;

use crate::fitness::traits::Fitness;
use crate::genome::bounds::MultiBounds;
use crate::genome::real_vector::RealVector;
use crate::population::individual::Individual;

/// A population of individuals
#[derive(Clone, Debug, Default)]
pub struct Population {
    individuals: Vec<Individual>,
}

impl Population {
    /// Create a population from individuals, renumbering their ids by slot
    pub fn from_individuals(mut individuals: Vec<Individual>) -> Self {
        for (slot, individual) in individuals.iter_mut().enumerate() {
            individual.id = slot;
        }
        Self { individuals }
    }

    /// Create a random population
    pub fn random<R: Rng>(size: usize, bounds: &MultiBounds, rng: &mut R) -> Self {
        let individuals = (0..size)
            .map(|id| Individual::new(id, RealVector::generate(rng, bounds)))
            .collect();
        Self { individuals }
    }

    /// Get the population size
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// Check if the population is empty
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Get an individual by slot
    pub fn get(&self, index: usize) -> Option<&Individual> {
        self.individuals.get(index)
    }

    /// Get an iterator over the individuals
    pub fn iter(&self) -> impl Iterator<Item = &Individual> {
        self.individuals.iter()
    }

    /// Get a mutable iterator over the individuals
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Individual> {
        self.individuals.iter_mut()
    }

    /// Get the underlying slice of individuals
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// Overwrite the genome in `slot` and store its freshly computed fitness
    pub fn overwrite(&mut self, slot: usize, genome: RealVector, fitness: f64) {
        let individual = &mut self.individuals[slot];
        individual.genome = genome;
        individual.fitness = Some(fitness);
    }

    /// Slot indices ordered by ascending fitness (worst first)
    pub fn ascending_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.individuals.len()).collect();
        order.sort_by(|&a, &b| self.individuals[a].cmp_fitness(&self.individuals[b]));
        order
    }

    /// A copy of the population sorted by ascending fitness
    pub fn sorted(&self) -> Vec<Individual> {
        let mut sorted = self.individuals.clone();
        sorted.sort_by(Individual::cmp_fitness);
        sorted
    }

    /// Get the best individual (by fitness)
    pub fn best(&self) -> Option<&Individual> {
        self.individuals
            .iter()
            .filter(|i| i.is_evaluated())
            .max_by(|a, b| a.cmp_fitness(b))
    }

    /// Get the worst individual (by fitness)
    pub fn worst(&self) -> Option<&Individual> {
        self.individuals
            .iter()
            .filter(|i| i.is_evaluated())
            .min_by(|a, b| a.cmp_fitness(b))
    }

    /// Check if all individuals have been evaluated
    pub fn all_evaluated(&self) -> bool {
        self.individuals.iter().all(|i| i.is_evaluated())
    }

    /// Fitness of every slot, unevaluated slots ranking lowest
    pub fn fitness_values(&self) -> Vec<f64> {
        self.individuals.iter().map(Individual::rank_value).collect()
    }

    /// Evaluate every unevaluated individual
    pub fn evaluate(&mut self, fitness: &dyn Fitness) {
        for individual in &mut self.individuals {
            if !individual.is_evaluated() {
                let f = fitness.evaluate(individual.genome.genes());
                individual.set_fitness(f);
            }
        }
    }

    /// Evaluate every unevaluated individual on the rayon pool
    pub fn evaluate_parallel(&mut self, fitness: &dyn Fitness) {
        self.individuals
            .par_iter_mut()
            .filter(|i| !i.is_evaluated())
            .for_each(|individual| {
                let f = fitness.evaluate(individual.genome.genes());
                individual.set_fitness(f);
            });
    }

    /// Clear every parent-selection flag
    pub fn reset_selection_flags(&mut self) {
        for individual in &mut self.individuals {
            individual.selected = false;
        }
    }

    /// Compute mean fitness
    pub fn mean_fitness(&self) -> Option<f64> {
        let evaluated: Vec<f64> = self.individuals.iter().filter_map(|i| i.fitness).collect();

        if evaluated.is_empty() {
            None
        } else {
            Some(evaluated.iter().sum::<f64>() / evaluated.len() as f64)
        }
    }
}

impl std::ops::Index<usize> for Population {
    type Output = Individual;

    fn index(&self, index: usize) -> &Self::Output {
        &self.individuals[index]
    }
}

impl std::ops::IndexMut<usize> for Population {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.individuals[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::benchmarks::Benchmark;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn create_test_population() -> Population {
        let individuals = [30.0, 10.0, 50.0, 20.0, 40.0]
            .iter()
            .enumerate()
            .map(|(i, &f)| Individual::with_fitness(i, RealVector::new(vec![i as f64]), f))
            .collect();
        Population::from_individuals(individuals)
    }

    #[test]
    fn test_population_random() {
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = MultiBounds::symmetric(5.0, 3);
        let pop = Population::random(10, &bounds, &mut rng);

        assert_eq!(pop.len(), 10);
        assert!(!pop.all_evaluated());
        assert!(pop.iter().enumerate().all(|(slot, i)| i.id == slot));
    }

    #[test]
    fn test_population_best_worst() {
        let pop = create_test_population();
        assert_eq!(pop.best().unwrap().fitness, Some(50.0));
        assert_eq!(pop.worst().unwrap().fitness, Some(10.0));
    }

    #[test]
    fn test_ascending_order_points_at_slots() {
        let pop = create_test_population();
        assert_eq!(pop.ascending_order(), vec![1, 3, 0, 4, 2]);

        let sorted: Vec<f64> = pop.sorted().iter().map(|i| i.rank_value()).collect();
        assert_eq!(sorted, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(pop.sorted()[0].id, 1);
    }

    #[test]
    fn test_population_mean_fitness() {
        let pop = create_test_population();
        assert_eq!(pop.mean_fitness(), Some(30.0));
    }

    #[test]
    fn test_population_evaluate() {
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = MultiBounds::symmetric(5.0, 3);
        let mut pop = Population::random(5, &bounds, &mut rng);

        pop.evaluate(&Benchmark::Sphere);
        assert!(pop.all_evaluated());
        assert!(pop.iter().all(|i| i.rank_value() <= 0.0));
    }

    #[test]
    fn test_population_evaluate_parallel() {
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = MultiBounds::symmetric(5.0, 3);
        let mut pop = Population::random(100, &bounds, &mut rng);

        pop.evaluate_parallel(&Benchmark::Rastrigin);
        assert!(pop.all_evaluated());
    }

    #[test]
    fn test_overwrite_keeps_slot_id() {
        let mut pop = create_test_population();
        pop.overwrite(2, RealVector::new(vec![9.0]), -1.0);
        assert_eq!(pop[2].id, 2);
        assert_eq!(pop[2].fitness, Some(-1.0));
        assert_eq!(pop.len(), 5);
    }
}
