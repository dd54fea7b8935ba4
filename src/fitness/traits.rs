//! Fitness traits
//!
//! The fitness callback maps a genome to a scalar. Higher values are better;
//! minimisation problems are negated before they reach the engine.

use std::sync::Arc;

/// Fitness callback shared by every island of a run
pub trait Fitness: Send + Sync {
    /// Score a genome
    fn evaluate(&self, genes: &[f64]) -> f64;
}

impl<F> Fitness for F
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn evaluate(&self, genes: &[f64]) -> f64 {
        self(genes)
    }
}

/// Shared handle to a fitness callback
pub type SharedFitness = Arc<dyn Fitness>;

/// Wrap any fitness callback in a shareable handle
pub fn shared<F: Fitness + 'static>(fitness: F) -> SharedFitness {
    Arc::new(fitness)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_fitness() {
        let f = shared(|genes: &[f64]| genes.iter().sum::<f64>());
        assert_eq!(f.evaluate(&[1.0, 2.0, 3.0]), 6.0);
    }
}
