//! Migration policies
//!
//! Pure selection and displacement rules applied to one island's population.
//! They know nothing about threads, processes or the graph.

pub mod policy;

pub mod prelude {
    pub use super::policy::*;
}
