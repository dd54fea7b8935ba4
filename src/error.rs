//! Error types for archipelago
//!
//! This module defines all error types used throughout the library.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for genome operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenomeError {
    /// Invalid genome structure
    #[error("Invalid genome structure: {0}")]
    InvalidStructure(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Error type for operator failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperatorError {
    /// Crossover operation failed
    #[error("Crossover failed: {0}")]
    CrossoverFailed(String),

    /// Mutation operation failed
    #[error("Mutation failed: {0}")]
    MutationFailed(String),

    /// Selection operation failed
    #[error("Selection failed: {0}")]
    SelectionFailed(String),

    /// Invalid operator configuration
    #[error("Invalid operator configuration: {0}")]
    InvalidConfiguration(String),
}

/// Error type for connectivity graph files
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The graph file could not be read
    #[error("Unable to read graph file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file ended before all declared records were read
    #[error("Unexpected end of graph data: expected {expected}")]
    UnexpectedEnd { expected: String },

    /// A token could not be parsed as a non-negative integer
    #[error("Invalid token '{token}' where {expected} was expected")]
    InvalidToken { token: String, expected: String },

    /// A record names a vertex outside [0, V)
    #[error("Vertex {vertex} is outside [0, {count})")]
    VertexOutOfRange { vertex: usize, count: usize },

    /// An edge endpoint is outside [0, V)
    #[error("Vertex {vertex} has an edge to {endpoint}, outside [0, {count})")]
    EndpointOutOfRange {
        vertex: usize,
        endpoint: usize,
        count: usize,
    },

    /// The same vertex has two records
    #[error("Vertex {0} is declared more than once")]
    DuplicateVertex(usize),

    /// Tokens remain after the last declared record
    #[error("Unexpected trailing data after the last record: '{0}'")]
    TrailingData(String),

    /// The graph declares zero vertices
    #[error("Graph declares no vertices")]
    EmptyGraph,

    /// A full-form edge is listed by one endpoint only
    #[error("Edge {from} -> {to} is not listed by both endpoints")]
    AsymmetricEdge { from: usize, to: usize },
}

/// Error type for moving immigrants between islands
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket or channel I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding or decoding failed
    #[error("Frame encoding error: {0}")]
    Encoding(String),

    /// The peer went away mid-run
    #[error("Peer {peer} disconnected")]
    Disconnected { peer: usize },

    /// The peer sent a frame out of protocol order
    #[error("Unexpected frame from peer {peer}: expected {expected}, found {found}")]
    UnexpectedFrame {
        peer: usize,
        expected: String,
        found: String,
    },

    /// An immigrant payload had the wrong number of scalars
    #[error("Payload from peer {peer} has {actual} values, expected {expected}")]
    PayloadSize {
        peer: usize,
        expected: usize,
        actual: usize,
    },

    /// Another participant failed and the rendezvous was torn down
    #[error("Rendezvous aborted by another island")]
    Aborted,

    /// Connections could not be established
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),
}

impl From<bincode::Error> for TransportError {
    fn from(err: bincode::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Top-level error type for evolution operations
#[derive(Debug, Error)]
pub enum EvolutionError {
    /// Genome error
    #[error("Genome error: {0}")]
    Genome(#[from] GenomeError),

    /// Operator error
    #[error("Operator error: {0}")]
    Operator(#[from] OperatorError),

    /// Connectivity graph error
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Migration transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A pickup or replacement policy name was not recognised
    #[error("Unknown {axis} policy '{name}'")]
    UnknownPolicy { axis: &'static str, name: String },

    /// Migration interval larger than the run
    #[error("Migration interval {interval} exceeds the number of generations {generations}")]
    MigrationInterval { interval: usize, generations: usize },

    /// Empty population
    #[error("Empty population")]
    EmptyPopulation,

    /// File IO outside the graph parser
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An island worker thread panicked
    #[error("Island {island} worker panicked")]
    WorkerPanicked { island: usize },
}

impl From<serde_json::Error> for EvolutionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for evolution operations
pub type EvoResult<T> = Result<T, EvolutionError>;

/// Result of an operator application
#[derive(Debug, Clone)]
pub enum OperatorResult<G> {
    /// Operation succeeded
    Success(G),
    /// Operation failed unrecoverably
    Failed(OperatorError),
}

impl<G> OperatorResult<G> {
    /// Returns the genome if successful, None if failed
    pub fn genome(self) -> Option<G> {
        match self {
            Self::Success(g) => Some(g),
            Self::Failed(_) => None,
        }
    }

    /// Returns true if the operation was successful
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
