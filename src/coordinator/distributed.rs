//! Message-passing island coordinator
//!
//! Every rank owns one island and shares nothing with the others. Emigrants
//! travel as flattened `f64` payloads over a [`Wire`], and each rendezvous
//! only involves the rank's graph neighbors. A rank with no edges never
//! communicates.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{error, info, trace};

use crate::algorithms::engine::IslandEngine;
use crate::algorithms::island::Island;
use crate::coordinator::protocol::{
    gather_outcomes, run_island, Immigrants, Phase, RunSettings, Transport,
};
use crate::coordinator::wire::{Frame, LocalNetwork, SendHandle, Wire};
use crate::error::{EvoResult, EvolutionError, TransportError};
use crate::genome::real_vector::RealVector;
use crate::population::individual::Individual;
use crate::report::Reporter;
use crate::results::IslandOutcome;
use crate::topology::graph::ConnectivityGraph;

/// Transport over explicit sends and receives to graph neighbors
pub struct MessagePassingTransport<W: Wire> {
    wire: W,
    rank: usize,
    sources: Vec<usize>,
    destinations: Vec<usize>,
    neighbors: Vec<usize>,
    genome_size: usize,
    payload_len: usize,
    outbox: Vec<f64>,
    inboxes: Vec<Vec<f64>>,
    arrived: Vec<Option<usize>>,
    pending: Vec<SendHandle>,
    epoch: u64,
}

impl<W: Wire> MessagePassingTransport<W> {
    /// Buffers are sized here once and reused for every migration
    pub fn new(wire: W, graph: &ConnectivityGraph, genome_size: usize, immigrants: usize) -> Self {
        let rank = wire.rank();
        let sources = graph.sources(rank).to_vec();
        let payload_len = immigrants * genome_size;
        Self {
            rank,
            destinations: graph.destinations(rank).to_vec(),
            neighbors: graph.neighbors(rank),
            genome_size,
            payload_len,
            outbox: Vec::with_capacity(payload_len),
            inboxes: vec![Vec::with_capacity(payload_len); sources.len()],
            arrived: vec![None; sources.len()],
            pending: Vec::new(),
            epoch: 0,
            sources,
            wire,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Store an emigrant payload in the first empty inbox for `peer`
    fn stash(&mut self, peer: usize, generation: usize, genes: &[f64]) -> Result<(), TransportError> {
        if genes.len() != self.payload_len {
            return Err(TransportError::PayloadSize {
                peer,
                expected: self.payload_len,
                actual: genes.len(),
            });
        }
        let slot = (0..self.sources.len())
            .find(|&i| self.sources[i] == peer && self.arrived[i].is_none())
            .ok_or_else(|| TransportError::UnexpectedFrame {
                peer,
                expected: "rendezvous".to_string(),
                found: "emigrants".to_string(),
            })?;
        let inbox = &mut self.inboxes[slot];
        inbox.clear();
        inbox.extend_from_slice(genes);
        self.arrived[slot] = Some(generation);
        Ok(())
    }

    fn wait_pending(&mut self) -> Result<(), TransportError> {
        for handle in self.pending.drain(..) {
            handle.wait()?;
        }
        Ok(())
    }
}

impl<W: Wire> Transport for MessagePassingTransport<W> {
    fn rendezvous(&mut self, phase: Phase) -> Result<(), TransportError> {
        if self.neighbors.is_empty() {
            return Ok(());
        }
        self.epoch += 1;
        let epoch = self.epoch;
        trace!(rank = self.rank, epoch, ?phase, "rendezvous");

        for &peer in &self.neighbors {
            let handle = self.wire.post_send(peer, Frame::Rendezvous { epoch })?;
            self.pending.push(handle);
        }

        for k in 0..self.neighbors.len() {
            let peer = self.neighbors[k];
            loop {
                match self.wire.recv_from(peer)? {
                    Frame::Rendezvous { epoch: e } if e == epoch => break,
                    Frame::Emigrants { generation, genes } => self.stash(peer, generation, &genes)?,
                    other => {
                        return Err(TransportError::UnexpectedFrame {
                            peer,
                            expected: format!("rendezvous {epoch}"),
                            found: other.kind().to_string(),
                        })
                    }
                }
            }
        }
        self.wait_pending()
    }

    fn broadcast_to_neighbors(
        &mut self,
        generation: usize,
        emigrants: &[Individual],
    ) -> Result<(), TransportError> {
        self.outbox.clear();
        for emigrant in emigrants {
            self.outbox.extend_from_slice(emigrant.genome.genes());
        }

        for k in 0..self.destinations.len() {
            let peer = self.destinations[k];
            if peer == self.rank {
                continue;
            }
            let frame = Frame::Emigrants {
                generation,
                genes: self.outbox.clone(),
            };
            let handle = self.wire.post_send(peer, frame)?;
            self.pending.push(handle);
        }
        Ok(())
    }

    fn collect_from_neighbors(&mut self, generation: usize) -> Result<Vec<Immigrants>, TransportError> {
        for slot in 0..self.sources.len() {
            if self.arrived[slot].is_some() {
                continue;
            }
            let peer = self.sources[slot];
            if peer == self.rank {
                let own = std::mem::take(&mut self.outbox);
                let stashed = self.stash(peer, generation, &own);
                self.outbox = own;
                stashed?;
                continue;
            }
            match self.wire.recv_from(peer)? {
                Frame::Emigrants { generation: g, genes } => self.stash(peer, g, &genes)?,
                other => {
                    return Err(TransportError::UnexpectedFrame {
                        peer,
                        expected: "emigrants".to_string(),
                        found: other.kind().to_string(),
                    })
                }
            }
        }
        self.wait_pending()?;

        let mut batches = Vec::with_capacity(self.sources.len());
        for slot in 0..self.sources.len() {
            let source = self.sources[slot];
            if self.arrived[slot].take() != Some(generation) {
                return Err(TransportError::UnexpectedFrame {
                    peer: source,
                    expected: format!("emigrants of generation {generation}"),
                    found: "emigrants of another generation".to_string(),
                });
            }
            let genomes = self.inboxes[slot]
                .chunks_exact(self.genome_size.max(1))
                .map(|genes| RealVector::new(genes.to_vec()))
                .collect();
            batches.push(Immigrants { source, genomes });
        }
        Ok(batches)
    }
}

/// Runs islands as message-passing ranks
pub struct DistributedCoordinator {
    graph: ConnectivityGraph,
    settings: RunSettings,
}

impl DistributedCoordinator {
    pub fn new(graph: ConnectivityGraph, settings: RunSettings) -> Self {
        Self { graph, settings }
    }

    pub fn graph(&self) -> &ConnectivityGraph {
        &self.graph
    }

    /// Run the island owned by this rank over an established wire
    pub fn run_rank<E, W, R>(
        &self,
        island: &mut Island<E>,
        wire: W,
        reporter: &Mutex<R>,
    ) -> EvoResult<IslandOutcome>
    where
        E: IslandEngine,
        W: Wire,
        R: Reporter + ?Sized,
    {
        if wire.rank() != island.id() || island.id() >= self.graph.vertex_count() {
            return Err(EvolutionError::Configuration(format!(
                "rank {} cannot run island {} of a {}-vertex graph",
                wire.rank(),
                island.id(),
                self.graph.vertex_count()
            )));
        }
        self.settings.check_island(island)?;
        let genome_size = island.engine().bounds().dimension();
        let mut transport =
            MessagePassingTransport::new(wire, &self.graph, genome_size, self.settings.plan.immigrants);
        info!(
            rank = transport.rank(),
            sources = ?self.graph.sources(island.id()),
            destinations = ?self.graph.destinations(island.id()),
            "starting rank"
        );
        run_island(island, &mut transport, &self.settings, reporter)
    }

    /// Run every rank as a thread of this process, linked by in-process
    /// channels. Outcomes come back in island order.
    pub fn run_local<E, R>(&self, islands: &mut [Island<E>], reporter: R) -> EvoResult<(Vec<IslandOutcome>, R)>
    where
        E: IslandEngine,
        R: Reporter,
    {
        let count = self.graph.vertex_count();
        if islands.len() != count {
            return Err(EvolutionError::Configuration(format!(
                "{} islands for a graph of {count} vertices",
                islands.len()
            )));
        }

        let reporter = Mutex::new(reporter);
        let wires = LocalNetwork::build(&self.graph);
        info!(ranks = count, edges = self.graph.edge_count(), "starting local message-passing run");

        let results: Vec<EvoResult<IslandOutcome>> = thread::scope(|scope| {
            let reporter = &reporter;
            let mut handles = Vec::with_capacity(count);
            let mut results = Vec::with_capacity(count);

            for (island, wire) in islands.iter_mut().zip(wires) {
                let id = island.id();
                let spawned = thread::Builder::new()
                    .name(format!("rank-{id}"))
                    .spawn_scoped(scope, move || {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            self.run_rank(island, wire, reporter)
                        }))
                        .unwrap_or(Err(EvolutionError::WorkerPanicked { island: id }));
                        if let Err(err) = &result {
                            error!(rank = id, error = %err, "rank failed");
                        }
                        result
                    });
                match spawned {
                    Ok(handle) => handles.push((id, handle)),
                    Err(err) => {
                        // Unspawned wires drop here, which disconnects the ranks waiting on them.
                        results.push(Err(EvolutionError::from(err)));
                        break;
                    }
                }
            }

            for (id, handle) in handles {
                results.push(
                    handle
                        .join()
                        .unwrap_or(Err(EvolutionError::WorkerPanicked { island: id })),
                );
            }
            results
        });

        let outcomes = gather_outcomes(results)?;
        Ok((outcomes, reporter.into_inner().unwrap_or_else(PoisonError::into_inner)))
    }
}
