//! # archipelago
//!
//! Island-model evolutionary optimization over real-valued genomes.
//!
//! Several populations ("islands") evolve concurrently with a generational
//! genetic algorithm. Every `migration_interval` generations each island
//! picks emigrants with a pickup policy, sends them along the edges of a
//! connectivity graph, and absorbs what its sources sent with a replacement
//! policy. The same phase protocol runs over two coordinators:
//!
//! - **shared memory**: one thread per island, one global barrier
//! - **message passing**: one rank per island, neighbor-only rendezvous over
//!   in-process channels or TCP
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use archipelago::prelude::*;
//!
//! let config = ExperimentConfig::load("experiment.json")?;
//! let summary = Experiment::new(config, Some(42)).run()?;
//! println!("island {} wins", summary.best().island);
//! ```

pub mod algorithms;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod experiment;
pub mod fitness;
pub mod genome;
pub mod migration;
pub mod operators;
pub mod population;
pub mod report;
pub mod results;
pub mod topology;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::algorithms::prelude::*;
    pub use crate::config::*;
    pub use crate::coordinator::prelude::*;
    pub use crate::error::*;
    pub use crate::experiment::*;
    pub use crate::fitness::prelude::*;
    pub use crate::genome::prelude::*;
    pub use crate::migration::prelude::*;
    pub use crate::operators::prelude::*;
    pub use crate::population::prelude::*;
    pub use crate::report::*;
    pub use crate::results::*;
    pub use crate::topology::prelude::*;
}
