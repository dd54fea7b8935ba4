//! Genome representation
//!
//! Every island evolves fixed-length real-valued genomes drawn from the
//! same per-gene bounds.

pub mod bounds;
pub mod real_vector;

pub mod prelude {
    pub use super::bounds::*;
    pub use super::real_vector::*;
}
