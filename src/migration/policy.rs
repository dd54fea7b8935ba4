//! Pickup and replacement policies
//!
//! Both axes offer the same three strategies. Names are parsed once when the
//! experiment is configured; the hot path only matches on the enum.

use std::fmt;
use std::str::FromStr;

use rand::seq::index;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithms::engine::MigrationView;
use crate::error::{EvoResult, EvolutionError};
use crate::genome::real_vector::RealVector;
use crate::population::individual::Individual;
use crate::population::population::Population;

/// Which residents leave as emigrants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupPolicy {
    /// Uniformly random residents
    Random,
    /// The highest-fitness residents
    Elite,
    /// The lowest-fitness residents
    Poor,
}

/// Which residents immigrants overwrite
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementPolicy {
    /// Uniformly random residents
    Random,
    /// The highest-fitness residents
    Elite,
    /// The lowest-fitness residents
    Poor,
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl FromStr for PickupPolicy {
    type Err = EvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "random" => Ok(Self::Random),
            "elite" | "elit" => Ok(Self::Elite),
            "poor" => Ok(Self::Poor),
            _ => Err(EvolutionError::UnknownPolicy {
                axis: "pickup",
                name: s.to_string(),
            }),
        }
    }
}

impl FromStr for ReplacementPolicy {
    type Err = EvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "random" => Ok(Self::Random),
            "elite" | "elit" => Ok(Self::Elite),
            "poor" => Ok(Self::Poor),
            _ => Err(EvolutionError::UnknownPolicy {
                axis: "replacement",
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for PickupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Random => "random",
            Self::Elite => "elite",
            Self::Poor => "poor",
        })
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Random => "random",
            Self::Elite => "elite",
            Self::Poor => "poor",
        })
    }
}

/// The `count` best slots, best first
fn best_slots(population: &Population, count: usize) -> Vec<usize> {
    population
        .ascending_order()
        .into_iter()
        .rev()
        .take(count)
        .collect()
}

/// The `count` worst slots, worst first
fn worst_slots(population: &Population, count: usize) -> Vec<usize> {
    population.ascending_order().into_iter().take(count).collect()
}

impl PickupPolicy {
    /// Copy `count` residents out as emigrants.
    ///
    /// Each vacated slot is refilled with a genome drawn uniformly from the
    /// bounds and re-evaluated, so the population size is unchanged.
    pub fn pickup<R: Rng>(
        &self,
        view: MigrationView<'_>,
        count: usize,
        rng: &mut R,
    ) -> Vec<Individual> {
        let MigrationView {
            population,
            fitness,
            bounds,
        } = view;
        let count = count.min(population.len());

        let slots = match self {
            Self::Random => {
                let mut slots: Vec<usize> = (0..population.len()).collect();
                slots.shuffle(rng);
                slots.truncate(count);
                slots
            }
            Self::Elite => best_slots(population, count),
            Self::Poor => worst_slots(population, count),
        };

        let emigrants: Vec<Individual> = slots.iter().map(|&slot| population[slot].clone()).collect();

        for &slot in &slots {
            let genome = RealVector::generate(rng, bounds);
            let f = fitness.evaluate(genome.genes());
            population.overwrite(slot, genome, f);
        }

        debug!(policy = %self, count, "picked up emigrants");
        emigrants
    }
}

impl ReplacementPolicy {
    /// Overwrite residents with the immigrant genomes and re-evaluate them.
    ///
    /// Returns the number of residents overwritten.
    pub fn replace<R: Rng>(
        &self,
        view: MigrationView<'_>,
        immigrants: &[RealVector],
        rng: &mut R,
    ) -> usize {
        let MigrationView {
            population,
            fitness,
            ..
        } = view;
        let count = immigrants.len().min(population.len());

        let slots = match self {
            Self::Random => index::sample(rng, population.len(), count).into_vec(),
            Self::Elite => best_slots(population, count),
            Self::Poor => worst_slots(population, count),
        };

        for (&slot, genome) in slots.iter().zip(immigrants) {
            let f = fitness.evaluate(genome.genes());
            population.overwrite(slot, genome.clone(), f);
        }

        debug!(policy = %self, count, "replaced residents");
        count
    }
}

/// Everything an island needs to know about migration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MigrationPlan {
    pub pickup: PickupPolicy,
    pub replacement: ReplacementPolicy,
    /// Emigrants per island per migration
    pub immigrants: usize,
    /// Generations between migrations
    pub interval: usize,
}

impl MigrationPlan {
    /// Check the plan against the run length
    pub fn validate(&self, generations: usize) -> EvoResult<()> {
        if self.interval == 0 {
            return Err(EvolutionError::Configuration(
                "migration interval must be at least 1".to_string(),
            ));
        }
        if self.interval > generations {
            return Err(EvolutionError::MigrationInterval {
                interval: self.interval,
                generations,
            });
        }
        Ok(())
    }

    /// Whether generation `g` ends with a migration
    pub fn is_migration_generation(&self, generation: usize) -> bool {
        self.interval != 0 && generation % self.interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::traits::Fitness;
    use crate::genome::bounds::MultiBounds;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn first_gene(genes: &[f64]) -> f64 {
        genes[0]
    }

    /// Slot `i` holds genome `[i, i]` with fitness `i`
    fn ladder(size: usize) -> Population {
        Population::from_individuals(
            (0..size)
                .map(|i| {
                    let x = i as f64;
                    Individual::with_fitness(i, RealVector::new(vec![x, x]), x)
                })
                .collect(),
        )
    }

    fn view<'a>(
        population: &'a mut Population,
        fitness: &'a dyn Fitness,
        bounds: &'a MultiBounds,
    ) -> MigrationView<'a> {
        MigrationView {
            population,
            fitness,
            bounds,
        }
    }

    #[test]
    fn test_policy_names() {
        assert_eq!("elite".parse::<PickupPolicy>().unwrap(), PickupPolicy::Elite);
        assert_eq!("elit".parse::<PickupPolicy>().unwrap(), PickupPolicy::Elite);
        assert_eq!("Poor".parse::<ReplacementPolicy>().unwrap(), ReplacementPolicy::Poor);
        assert_eq!("random".parse::<ReplacementPolicy>().unwrap(), ReplacementPolicy::Random);

        let err = "best".parse::<ReplacementPolicy>().unwrap_err();
        assert!(matches!(
            err,
            EvolutionError::UnknownPolicy { axis: "replacement", .. }
        ));
    }

    #[test]
    fn test_elite_pickup_takes_best_and_refills() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut population = ladder(10);
        let bounds = MultiBounds::symmetric(100.0, 2);

        let emigrants = PickupPolicy::Elite.pickup(
            view(&mut population, &first_gene, &bounds),
            2,
            &mut rng,
        );

        assert_eq!(population.len(), 10);
        let fitness: Vec<f64> = emigrants.iter().map(Individual::rank_value).collect();
        assert_eq!(fitness, vec![9.0, 8.0]);

        for slot in [8, 9] {
            let resident = &population[slot];
            assert_eq!(resident.fitness, Some(resident.genome[0]));
            assert_ne!(resident.genome.genes(), &[slot as f64, slot as f64]);
        }
    }

    #[test]
    fn test_poor_pickup_takes_worst() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut population = ladder(6);
        let bounds = MultiBounds::symmetric(1.0, 2);

        let emigrants = PickupPolicy::Poor.pickup(
            view(&mut population, &first_gene, &bounds),
            3,
            &mut rng,
        );
        let ids: Vec<usize> = emigrants.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(population.len(), 6);
    }

    #[test]
    fn test_random_pickup_distinct_slots() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut population = ladder(8);
        let bounds = MultiBounds::symmetric(1.0, 2);

        let emigrants = PickupPolicy::Random.pickup(
            view(&mut population, &first_gene, &bounds),
            4,
            &mut rng,
        );
        let mut ids: Vec<usize> = emigrants.iter().map(|i| i.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_pickup_count_is_capped() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut population = ladder(3);
        let bounds = MultiBounds::symmetric(1.0, 2);
        let emigrants = PickupPolicy::Elite.pickup(
            view(&mut population, &first_gene, &bounds),
            10,
            &mut rng,
        );
        assert_eq!(emigrants.len(), 3);
        assert_eq!(population.len(), 3);
    }

    #[test]
    fn test_poor_replacement_overwrites_worst() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut population = ladder(5);
        let bounds = MultiBounds::symmetric(1.0, 2);
        let immigrants = vec![RealVector::new(vec![50.0, 0.0]), RealVector::new(vec![60.0, 0.0])];

        let replaced = ReplacementPolicy::Poor.replace(
            view(&mut population, &first_gene, &bounds),
            &immigrants,
            &mut rng,
        );

        assert_eq!(replaced, 2);
        assert_eq!(population[0].fitness, Some(50.0));
        assert_eq!(population[1].fitness, Some(60.0));
        assert_eq!(population[4].fitness, Some(4.0));
    }

    #[test]
    fn test_elite_replacement_overwrites_best() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut population = ladder(5);
        let bounds = MultiBounds::symmetric(1.0, 2);
        let immigrants = vec![RealVector::new(vec![-1.0, -1.0])];

        ReplacementPolicy::Elite.replace(
            view(&mut population, &first_gene, &bounds),
            &immigrants,
            &mut rng,
        );

        assert_eq!(population[4].genome.genes(), &[-1.0, -1.0]);
        assert_eq!(population[4].fitness, Some(-1.0));
        assert_eq!(population.best().map(|i| i.id), Some(3));
    }

    #[test]
    fn test_random_replacement_keeps_size() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut population = ladder(5);
        let bounds = MultiBounds::symmetric(1.0, 2);
        let immigrants = vec![RealVector::new(vec![7.5, 7.5]); 3];

        ReplacementPolicy::Random.replace(
            view(&mut population, &first_gene, &bounds),
            &immigrants,
            &mut rng,
        );

        assert_eq!(population.len(), 5);
        let arrived = population.iter().filter(|i| i.fitness == Some(7.5)).count();
        assert_eq!(arrived, 3);
    }

    #[test]
    fn test_plan_validation() {
        let plan = MigrationPlan {
            pickup: PickupPolicy::Elite,
            replacement: ReplacementPolicy::Poor,
            immigrants: 1,
            interval: 10,
        };
        assert!(plan.validate(10).is_ok());
        assert!(matches!(
            plan.validate(9),
            Err(EvolutionError::MigrationInterval {
                interval: 10,
                generations: 9
            })
        ));
        assert!(plan.is_migration_generation(0));
        assert!(plan.is_migration_generation(20));
        assert!(!plan.is_migration_generation(5));
    }
}
