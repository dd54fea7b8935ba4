//! Standard migration topologies

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TopologyError;
use crate::topology::graph::ConnectivityGraph;

/// Migration topology determines which islands exchange individuals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    /// Ring topology: each island sends to the next
    #[default]
    Ring,
    /// Fully connected: every island sends to every other
    FullyConnected,
    /// Star: all islands send to/receive from a central hub
    Star { hub: usize },
}

impl FromStr for TopologyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ring" => Ok(Self::Ring),
            "full" | "fully_connected" => Ok(Self::FullyConnected),
            "star" => Ok(Self::Star { hub: 0 }),
            other => Err(format!("unknown topology '{other}'")),
        }
    }
}

impl TopologyKind {
    /// Get the target islands for migration from a given source island
    pub fn targets(&self, source: usize, num_islands: usize) -> Vec<usize> {
        if num_islands < 2 {
            return Vec::new();
        }
        match self {
            Self::Ring => vec![(source + 1) % num_islands],
            Self::FullyConnected => (0..num_islands).filter(|&i| i != source).collect(),
            Self::Star { hub } => {
                if source == *hub {
                    (0..num_islands).filter(|&i| i != source).collect()
                } else {
                    vec![*hub]
                }
            }
        }
    }

    /// Build the connectivity graph for `num_islands` islands
    pub fn build(&self, num_islands: usize) -> Result<ConnectivityGraph, TopologyError> {
        if let Self::Star { hub } = self {
            if *hub >= num_islands {
                return Err(TopologyError::VertexOutOfRange {
                    vertex: *hub,
                    count: num_islands,
                });
            }
        }

        let mut sources = vec![Vec::new(); num_islands];
        for source in 0..num_islands {
            for target in self.targets(source, num_islands) {
                sources[target].push(source);
            }
        }
        ConnectivityGraph::from_sources(sources)
    }
}
