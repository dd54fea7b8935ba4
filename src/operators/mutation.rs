//! Mutation operators
//!
//! In-place perturbations of a real-valued genome.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::genome::real_vector::RealVector;
use crate::operators::traits::{MutationContext, MutationOperator};

/// Delta mutation
///
/// Adds zero-mean Gaussian noise to each gene with probability `rate`.
#[derive(Clone, Debug)]
pub struct DeltaMutation {
    /// Per-gene mutation probability
    pub rate: f64,
    /// Standard deviation of the Gaussian noise
    pub sigma: f64,
}

impl MutationOperator for DeltaMutation {
    fn mutate<R: Rng>(&self, genome: &mut RealVector, _context: &MutationContext<'_>, rng: &mut R) {
        let Ok(normal) = Normal::new(0.0, self.sigma) else {
            return;
        };
        for gene in genome.genes_mut() {
            if rng.gen::<f64>() < self.rate {
                *gene += normal.sample(rng);
            }
        }
    }
}

/// Random reset mutation
///
/// With probability `rate`, one randomly chosen gene is redrawn uniformly
/// from its bounds.
#[derive(Clone, Debug)]
pub struct RandomResetMutation {
    /// Probability that the genome is touched at all
    pub rate: f64,
}

impl MutationOperator for RandomResetMutation {
    fn mutate<R: Rng>(&self, genome: &mut RealVector, context: &MutationContext<'_>, rng: &mut R) {
        if genome.dimension() == 0 || rng.gen::<f64>() >= self.rate {
            return;
        }
        let i = rng.gen_range(0..genome.dimension());
        if let Some(b) = context.bounds.get(i) {
            genome[i] = b.sample(rng);
        }
    }
}

/// Non-uniform mutation
///
/// Moves every gene toward one of its bounds by a step that shrinks as the
/// run progresses; `order` controls how fast it shrinks.
#[derive(Clone, Debug)]
pub struct NonUniformMutation {
    /// Decay exponent
    pub order: u32,
}

impl NonUniformMutation {
    fn delta<R: Rng>(&self, span: f64, progress: f64, rng: &mut R) -> f64 {
        let l: f64 = rng.gen();
        span * (1.0 - l.powf((1.0 - progress).powi(self.order as i32)))
    }
}

impl MutationOperator for NonUniformMutation {
    fn mutate<R: Rng>(&self, genome: &mut RealVector, context: &MutationContext<'_>, rng: &mut R) {
        let progress = context.progress();
        let upward = rng.gen_bool(0.5);
        for (gene, b) in genome.genes_mut().iter_mut().zip(&context.bounds.bounds) {
            if upward {
                *gene += self.delta((b.max - *gene).max(0.0), progress, rng);
            } else {
                *gene -= self.delta((*gene - b.min).max(0.0), progress, rng);
            }
        }
    }
}

/// Mutation operator named in an experiment file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MutationMethod {
    Delta { rate: f64, sigma: f64 },
    Random { rate: f64 },
    NonUniform { order: u32 },
}

impl Default for MutationMethod {
    fn default() -> Self {
        Self::Delta {
            rate: 0.1,
            sigma: 0.5,
        }
    }
}

impl MutationOperator for MutationMethod {
    fn mutate<R: Rng>(&self, genome: &mut RealVector, context: &MutationContext<'_>, rng: &mut R) {
        match self {
            Self::Delta { rate, sigma } => DeltaMutation {
                rate: *rate,
                sigma: *sigma,
            }
            .mutate(genome, context, rng),
            Self::Random { rate } => RandomResetMutation { rate: *rate }.mutate(genome, context, rng),
            Self::NonUniform { order } => {
                NonUniformMutation { order: *order }.mutate(genome, context, rng)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::bounds::MultiBounds;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn context(bounds: &MultiBounds, generation: usize) -> MutationContext<'_> {
        MutationContext {
            bounds,
            generation,
            max_generations: 100,
        }
    }

    #[test]
    fn test_delta_zero_rate_is_identity() {
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = MultiBounds::symmetric(1.0, 4);
        let mut genome = RealVector::new(vec![0.1, 0.2, 0.3, 0.4]);
        DeltaMutation { rate: 0.0, sigma: 1.0 }.mutate(&mut genome, &context(&bounds, 0), &mut rng);
        assert_eq!(genome.genes(), &[0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_delta_full_rate_changes_genes() {
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = MultiBounds::symmetric(1.0, 4);
        let mut genome = RealVector::zeros(4);
        DeltaMutation { rate: 1.0, sigma: 1.0 }.mutate(&mut genome, &context(&bounds, 0), &mut rng);
        assert!(genome.genes().iter().all(|&g| g != 0.0));
    }

    #[test]
    fn test_random_reset_touches_at_most_one_gene() {
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = MultiBounds::symmetric(10.0, 5);
        let mut genome = RealVector::zeros(5);
        RandomResetMutation { rate: 1.0 }.mutate(&mut genome, &context(&bounds, 0), &mut rng);
        assert!(genome.genes().iter().filter(|&&g| g != 0.0).count() <= 1);
        assert!(bounds.contains_vec(genome.genes()));
    }

    #[test]
    fn test_non_uniform_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = MultiBounds::symmetric(2.0, 6);
        for generation in [0, 50, 99] {
            let mut genome = RealVector::new(vec![0.5; 6]);
            NonUniformMutation { order: 2 }.mutate(&mut genome, &context(&bounds, generation), &mut rng);
            assert!(bounds.contains_vec(genome.genes()));
        }
    }

    #[test]
    fn test_non_uniform_vanishes_at_end_of_run() {
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = MultiBounds::symmetric(2.0, 3);
        let mut genome = RealVector::new(vec![0.5; 3]);
        NonUniformMutation { order: 1 }.mutate(&mut genome, &context(&bounds, 100), &mut rng);
        assert_eq!(genome.genes(), &[0.5; 3]);
    }
}
