//! Benchmark fitness functions
//!
//! Classic real-valued test problems, selectable by name from a config file.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EvolutionError;
use crate::fitness::traits::Fitness;

/// Named benchmark problem.
///
/// `evaluate_raw` is the textbook value to minimise; the `Fitness` impl
/// negates it so that higher is better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Benchmark {
    /// f(x) = Σxᵢ²
    Sphere,
    /// f(x) = 10n + Σ(xᵢ² - 10cos(2πxᵢ))
    Rastrigin,
    /// f(x) = 418.9829n - Σxᵢ sin(√|xᵢ|)
    Schwefel,
    /// f(x) = 1 + Σxᵢ²/4000 - Πcos(xᵢ/√i)
    Griewank,
}

impl Benchmark {
    /// Name of the benchmark function
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sphere => "sphere",
            Self::Rastrigin => "rastrigin",
            Self::Schwefel => "schwefel",
            Self::Griewank => "griewank",
        }
    }

    /// Conventional search interval for every gene
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Self::Sphere | Self::Rastrigin => (-5.12, 5.12),
            Self::Schwefel => (-500.0, 500.0),
            Self::Griewank => (-600.0, 600.0),
        }
    }

    /// Evaluate the function (value to be MINIMIZED)
    pub fn evaluate_raw(&self, x: &[f64]) -> f64 {
        let n = x.len() as f64;
        match self {
            Self::Sphere => x.iter().map(|xi| xi * xi).sum(),
            Self::Rastrigin => {
                10.0 * n
                    + x.iter()
                        .map(|xi| xi * xi - 10.0 * (2.0 * PI * xi).cos())
                        .sum::<f64>()
            }
            Self::Schwefel => {
                418.9829 * n - x.iter().map(|xi| xi * xi.abs().sqrt().sin()).sum::<f64>()
            }
            Self::Griewank => {
                let sum_sq = x.iter().map(|xi| xi * xi).sum::<f64>() / 4000.0;
                let prod_cos: f64 = x
                    .iter()
                    .enumerate()
                    .map(|(i, xi)| (xi / ((i + 1) as f64).sqrt()).cos())
                    .product();
                1.0 + sum_sq - prod_cos
            }
        }
    }
}

impl Fitness for Benchmark {
    fn evaluate(&self, genes: &[f64]) -> f64 {
        -self.evaluate_raw(genes)
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Benchmark {
    type Err = EvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sphere" => Ok(Self::Sphere),
            "rastrigin" => Ok(Self::Rastrigin),
            "schwefel" => Ok(Self::Schwefel),
            "griewank" => Ok(Self::Griewank),
            other => Err(EvolutionError::Configuration(format!(
                "unknown benchmark function '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_at_optimum() {
        assert_relative_eq!(Benchmark::Sphere.evaluate(&[0.0; 5]), 0.0);
        assert_relative_eq!(Benchmark::Sphere.evaluate(&[1.0, 2.0]), -5.0);
    }

    #[test]
    fn test_rastrigin_at_optimum() {
        assert_relative_eq!(Benchmark::Rastrigin.evaluate_raw(&[0.0; 4]), 0.0, epsilon = 1e-12);
        assert!(Benchmark::Rastrigin.evaluate_raw(&[0.5, 0.5]) > 0.0);
    }

    #[test]
    fn test_schwefel_near_optimum() {
        let x = [420.9687; 3];
        assert!(Benchmark::Schwefel.evaluate_raw(&x).abs() < 1e-3);
    }

    #[test]
    fn test_griewank_at_optimum() {
        assert_relative_eq!(Benchmark::Griewank.evaluate_raw(&[0.0; 6]), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Sphere".parse::<Benchmark>().unwrap(), Benchmark::Sphere);
        assert_eq!(" griewank ".parse::<Benchmark>().unwrap(), Benchmark::Griewank);
        assert!("ackley".parse::<Benchmark>().is_err());
    }
}
