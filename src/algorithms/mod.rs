//! Evolutionary engines
//!
//! The generational GA that runs on every island, the island wrapper that
//! adds emigrant buffers, and the driver for migration-free runs.

pub mod engine;
pub mod generational;
pub mod independent;
pub mod island;

pub mod prelude {
    pub use super::engine::*;
    pub use super::generational::*;
    pub use super::independent::*;
    pub use super::island::*;
}
