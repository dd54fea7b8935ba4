//! Point-to-point links between ranks
//!
//! A [`Wire`] moves [`Frame`]s between one rank and each of its graph
//! neighbors. Sends are posted and return a [`SendHandle`] that is waited on
//! later; receives block until the next frame from that peer arrives.
//! Frames from one peer are delivered in the order they were sent.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::topology::graph::ConnectivityGraph;

/// Message exchanged between ranks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// First frame on a freshly dialed connection
    Hello { rank: usize },
    /// Neighbor-scoped rendezvous token
    Rendezvous { epoch: u64 },
    /// Flattened emigrant genomes, `immigrants * genome_size` values
    Emigrants { generation: usize, genes: Vec<f64> },
}

impl Frame {
    /// Short name used in protocol errors
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Rendezvous { .. } => "rendezvous",
            Self::Emigrants { .. } => "emigrants",
        }
    }

    /// Serialize frame to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransportError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize frame from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransportError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Completion of a posted send
#[derive(Debug)]
pub enum SendHandle {
    /// The frame was handed off synchronously
    Complete,
    /// A writer thread reports completion later
    Pending {
        peer: usize,
        done: Receiver<Result<(), TransportError>>,
    },
}

impl SendHandle {
    /// Block until the frame has left this rank
    pub fn wait(self) -> Result<(), TransportError> {
        match self {
            Self::Complete => Ok(()),
            Self::Pending { peer, done } => done
                .recv()
                .unwrap_or(Err(TransportError::Disconnected { peer })),
        }
    }
}

/// Links from one rank to each of its neighbors
pub trait Wire: Send {
    /// This rank
    fn rank(&self) -> usize;

    /// Queue a frame for `peer` without waiting for delivery
    fn post_send(&mut self, peer: usize, frame: Frame) -> Result<SendHandle, TransportError>;

    /// Next frame from `peer`
    fn recv_from(&mut self, peer: usize) -> Result<Frame, TransportError>;
}

/// In-process wire backed by one channel per directed neighbor pair
pub struct LocalWire {
    rank: usize,
    outgoing: BTreeMap<usize, Sender<Frame>>,
    incoming: BTreeMap<usize, Receiver<Frame>>,
}

impl Wire for LocalWire {
    fn rank(&self) -> usize {
        self.rank
    }

    fn post_send(&mut self, peer: usize, frame: Frame) -> Result<SendHandle, TransportError> {
        let link = self
            .outgoing
            .get(&peer)
            .ok_or(TransportError::Disconnected { peer })?;
        link.send(frame)
            .map_err(|_| TransportError::Disconnected { peer })?;
        Ok(SendHandle::Complete)
    }

    fn recv_from(&mut self, peer: usize) -> Result<Frame, TransportError> {
        let link = self
            .incoming
            .get(&peer)
            .ok_or(TransportError::Disconnected { peer })?;
        link.recv().map_err(|_| TransportError::Disconnected { peer })
    }
}

/// Builds the in-process wires for a whole graph
pub struct LocalNetwork;

impl LocalNetwork {
    /// One wire per vertex, connected to that vertex's neighbors
    pub fn build(graph: &ConnectivityGraph) -> Vec<LocalWire> {
        let count = graph.vertex_count();
        let mut wires: Vec<LocalWire> = (0..count)
            .map(|rank| LocalWire {
                rank,
                outgoing: BTreeMap::new(),
                incoming: BTreeMap::new(),
            })
            .collect();

        for from in 0..count {
            for to in graph.neighbors(from) {
                let (tx, rx) = mpsc::channel();
                wires[from].outgoing.insert(to, tx);
                wires[to].incoming.insert(from, rx);
            }
        }
        wires
    }
}
