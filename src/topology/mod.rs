//! Island connectivity
//!
//! A directed graph over island ids, parsed from a file or generated from a
//! standard shape. Read-only once built.

pub mod generators;
pub mod graph;

pub mod prelude {
    pub use super::generators::*;
    pub use super::graph::*;
}
