//! Connectivity graph files
//!
//! The first token is the vertex count `V`, followed by exactly `V` records.
//!
//! Simple form, one record per vertex listing the islands it pulls from:
//!
//! ```text
//! <id> <count> <src_1> ... <src_count>
//! ```
//!
//! Full form, with both directions spelled out:
//!
//! ```text
//! <id> <in_degree> <out_degree> <src_1> ... <src_in> <dst_1> ... <dst_out>
//! ```
//!
//! Both forms produce the same [`ConnectivityGraph`]. The simple form derives
//! destinations by inverting the source lists; the full form must agree with
//! itself on every edge.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TopologyError;

/// On-disk shape of a graph file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphForm {
    /// `<id> <count> <sources...>`
    #[default]
    Simple,
    /// `<id> <in> <out> <sources...> <destinations...>`
    Full,
}

impl FromStr for GraphForm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown graph form '{other}'")),
        }
    }
}

/// Incoming and outgoing edges of one vertex, in file order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexLinks {
    /// Islands whose emigrants this vertex receives
    pub sources: Vec<usize>,
    /// Islands that receive this vertex's emigrants
    pub destinations: Vec<usize>,
}

/// Immutable island adjacency
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityGraph {
    links: Vec<VertexLinks>,
}

struct Tokens<'a> {
    inner: SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
        }
    }

    fn next_usize(&mut self, expected: impl Fn() -> String) -> Result<usize, TopologyError> {
        let token = self
            .inner
            .next()
            .ok_or_else(|| TopologyError::UnexpectedEnd {
                expected: expected(),
            })?;
        token.parse().map_err(|_| TopologyError::InvalidToken {
            token: token.to_string(),
            expected: expected(),
        })
    }

    fn endpoints(
        &mut self,
        vertex: usize,
        count: usize,
        total: usize,
        what: &str,
    ) -> Result<Vec<usize>, TopologyError> {
        (0..count)
            .map(|k| {
                let endpoint = self.next_usize(|| format!("{what} {k} of vertex {vertex}"))?;
                if endpoint >= total {
                    return Err(TopologyError::EndpointOutOfRange {
                        vertex,
                        endpoint,
                        count: total,
                    });
                }
                Ok(endpoint)
            })
            .collect()
    }

    fn finish(mut self) -> Result<(), TopologyError> {
        match self.inner.next() {
            Some(token) => Err(TopologyError::TrailingData(token.to_string())),
            None => Ok(()),
        }
    }
}

impl ConnectivityGraph {
    /// Read and parse a graph file
    pub fn parse(path: &Path, form: GraphForm) -> Result<Self, TopologyError> {
        let text = fs::read_to_string(path).map_err(|source| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&text, form)
    }

    /// Parse graph text
    pub fn parse_str(text: &str, form: GraphForm) -> Result<Self, TopologyError> {
        let mut tokens = Tokens::new(text);
        let total = tokens.next_usize(|| "vertex count".to_string())?;
        if total == 0 {
            return Err(TopologyError::EmptyGraph);
        }

        let mut records: Vec<Option<VertexLinks>> = vec![None; total];
        for record in 0..total {
            let vertex = tokens.next_usize(|| format!("vertex id of record {record}"))?;
            if vertex >= total {
                return Err(TopologyError::VertexOutOfRange {
                    vertex,
                    count: total,
                });
            }
            if records[vertex].is_some() {
                return Err(TopologyError::DuplicateVertex(vertex));
            }

            let links = match form {
                GraphForm::Simple => {
                    let count = tokens.next_usize(|| format!("edge count of vertex {vertex}"))?;
                    VertexLinks {
                        sources: tokens.endpoints(vertex, count, total, "source")?,
                        destinations: Vec::new(),
                    }
                }
                GraphForm::Full => {
                    let in_degree = tokens.next_usize(|| format!("in-degree of vertex {vertex}"))?;
                    let out_degree =
                        tokens.next_usize(|| format!("out-degree of vertex {vertex}"))?;
                    VertexLinks {
                        sources: tokens.endpoints(vertex, in_degree, total, "source")?,
                        destinations: tokens.endpoints(vertex, out_degree, total, "destination")?,
                    }
                }
            };
            records[vertex] = Some(links);
        }
        tokens.finish()?;

        // Every slot is filled: `total` distinct ids in [0, total).
        let links: Vec<VertexLinks> = records.into_iter().flatten().collect();
        match form {
            GraphForm::Simple => Self::from_sources(links.into_iter().map(|l| l.sources).collect()),
            GraphForm::Full => {
                let graph = Self { links };
                graph.check_symmetry()?;
                Ok(graph)
            }
        }
    }

    /// Build a graph from per-vertex source lists, deriving destinations
    pub fn from_sources(sources: Vec<Vec<usize>>) -> Result<Self, TopologyError> {
        let total = sources.len();
        if total == 0 {
            return Err(TopologyError::EmptyGraph);
        }

        let mut links: Vec<VertexLinks> = sources
            .into_iter()
            .map(|sources| VertexLinks {
                sources,
                destinations: Vec::new(),
            })
            .collect();

        for vertex in 0..total {
            for k in 0..links[vertex].sources.len() {
                let source = links[vertex].sources[k];
                if source >= total {
                    return Err(TopologyError::EndpointOutOfRange {
                        vertex,
                        endpoint: source,
                        count: total,
                    });
                }
                links[source].destinations.push(vertex);
            }
        }
        Ok(Self { links })
    }

    /// Every directed edge must be listed the same number of times by both
    /// endpoints
    fn check_symmetry(&self) -> Result<(), TopologyError> {
        let count = |list: &[usize], vertex: usize| list.iter().filter(|&&v| v == vertex).count();
        for (vertex, links) in self.links.iter().enumerate() {
            for &to in &links.destinations {
                if count(&links.destinations, to) != count(&self.links[to].sources, vertex) {
                    return Err(TopologyError::AsymmetricEdge { from: vertex, to });
                }
            }
            for &from in &links.sources {
                if count(&links.sources, from) != count(&self.links[from].destinations, vertex) {
                    return Err(TopologyError::AsymmetricEdge { from, to: vertex });
                }
            }
        }
        Ok(())
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.links.len()
    }

    /// Total number of directed edges
    pub fn edge_count(&self) -> usize {
        self.links.iter().map(|l| l.sources.len()).sum()
    }

    pub fn links(&self, vertex: usize) -> &VertexLinks {
        &self.links[vertex]
    }

    /// Islands whose emigrants `vertex` receives
    pub fn sources(&self, vertex: usize) -> &[usize] {
        &self.links[vertex].sources
    }

    /// Islands that receive `vertex`'s emigrants
    pub fn destinations(&self, vertex: usize) -> &[usize] {
        &self.links[vertex].destinations
    }

    pub fn in_degree(&self, vertex: usize) -> usize {
        self.links[vertex].sources.len()
    }

    pub fn out_degree(&self, vertex: usize) -> usize {
        self.links[vertex].destinations.len()
    }

    /// Sources and destinations merged, sorted, without duplicates or self
    pub fn neighbors(&self, vertex: usize) -> Vec<usize> {
        let links = &self.links[vertex];
        let mut neighbors: Vec<usize> = links
            .sources
            .iter()
            .chain(&links.destinations)
            .copied()
            .filter(|&n| n != vertex)
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    /// Settle the island count against the graph.
    ///
    /// The graph wins; a mismatch is logged and corrected.
    pub fn reconcile_island_count(&self, configured: usize) -> usize {
        let vertices = self.vertex_count();
        if configured != vertices {
            warn!(
                configured,
                vertices, "island count differs from the connectivity graph, using the graph"
            );
        }
        vertices
    }

    /// Render the graph in the requested file form
    pub fn render(&self, form: GraphForm) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{}", self.vertex_count());
        for (vertex, links) in self.links.iter().enumerate() {
            let _ = write!(out, "{vertex}");
            match form {
                GraphForm::Simple => {
                    let _ = write!(out, " {}", links.sources.len());
                    for s in &links.sources {
                        let _ = write!(out, " {s}");
                    }
                }
                GraphForm::Full => {
                    let _ = write!(
                        out,
                        " {} {}",
                        links.sources.len(),
                        links.destinations.len()
                    );
                    for n in links.sources.iter().chain(&links.destinations) {
                        let _ = write!(out, " {n}");
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for ConnectivityGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(GraphForm::Simple))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RING: &str = "4\n0 1 3\n1 1 0\n2 1 1\n3 1 2\n";

    #[test]
    fn test_parse_simple_ring() {
        let graph = ConnectivityGraph::parse_str(RING, GraphForm::Simple).unwrap();
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.sources(0), &[3]);
        assert_eq!(graph.destinations(0), &[1]);
        assert_eq!(graph.destinations(3), &[0]);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.neighbors(2), vec![1, 3]);
    }

    #[test]
    fn test_records_in_any_order() {
        let text = "3\n2 1 0\n0 0\n1 2 0 2\n";
        let graph = ConnectivityGraph::parse_str(text, GraphForm::Simple).unwrap();
        assert_eq!(graph.sources(1), &[0, 2]);
        assert_eq!(graph.destinations(0), &[1, 2]);
        assert_eq!(graph.in_degree(0), 0);
    }

    #[test]
    fn test_parse_full_form() {
        let text = "3\n0 2 2 1 2 1 2\n1 1 1 0 0\n2 1 1 0 0\n";
        let graph = ConnectivityGraph::parse_str(text, GraphForm::Full).unwrap();
        assert_eq!(graph.in_degree(0), 2);
        assert_eq!(graph.out_degree(1), 1);
        assert_eq!(graph.destinations(0), &[1, 2]);
    }

    #[test]
    fn test_full_form_must_be_symmetric() {
        let text = "2\n0 0 1 1\n1 0 0\n";
        let err = ConnectivityGraph::parse_str(text, GraphForm::Full).unwrap_err();
        assert!(matches!(err, TopologyError::AsymmetricEdge { from: 0, to: 1 }));
    }

    #[test]
    fn test_full_form_edge_multiplicity_must_match() {
        let text = "2\n0 1 2 1 1 1\n1 1 1 0 0\n";
        let err = ConnectivityGraph::parse_str(text, GraphForm::Full).unwrap_err();
        assert!(matches!(err, TopologyError::AsymmetricEdge { from: 0, to: 1 }));

        let doubled = "2\n0 0 2 1 1\n1 2 0 0 0\n";
        let graph = ConnectivityGraph::parse_str(doubled, GraphForm::Full).unwrap();
        assert_eq!(graph.sources(1), &[0, 0]);
        assert_eq!(graph.destinations(0), &[1, 1]);
    }

    #[test]
    fn test_endpoint_out_of_range() {
        let err = ConnectivityGraph::parse_str("2\n0 1 5\n1 0\n", GraphForm::Simple).unwrap_err();
        assert!(matches!(
            err,
            TopologyError::EndpointOutOfRange {
                vertex: 0,
                endpoint: 5,
                count: 2
            }
        ));
    }

    #[test]
    fn test_truncated_file() {
        let err = ConnectivityGraph::parse_str("4\n0 1 1\n1 1 0\n", GraphForm::Simple).unwrap_err();
        assert!(matches!(err, TopologyError::UnexpectedEnd { .. }));
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(
            ConnectivityGraph::parse_str("", GraphForm::Simple),
            Err(TopologyError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            ConnectivityGraph::parse_str("0", GraphForm::Simple),
            Err(TopologyError::EmptyGraph)
        ));
        assert!(matches!(
            ConnectivityGraph::parse_str("2\n0 x\n", GraphForm::Simple),
            Err(TopologyError::InvalidToken { .. })
        ));
        assert!(matches!(
            ConnectivityGraph::parse_str("2\n0 0\n0 0\n", GraphForm::Simple),
            Err(TopologyError::DuplicateVertex(0))
        ));
        assert!(matches!(
            ConnectivityGraph::parse_str("2\n0 0\n7 0\n", GraphForm::Simple),
            Err(TopologyError::VertexOutOfRange { vertex: 7, count: 2 })
        ));
        assert!(matches!(
            ConnectivityGraph::parse_str("1\n0 0\n9\n", GraphForm::Simple),
            Err(TopologyError::TrailingData(_))
        ));
    }

    #[test]
    fn test_render_round_trip() {
        let graph = ConnectivityGraph::parse_str(RING, GraphForm::Simple).unwrap();
        for form in [GraphForm::Simple, GraphForm::Full] {
            let text = graph.render(form);
            assert_eq!(ConnectivityGraph::parse_str(&text, form).unwrap(), graph);
        }
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{RING}").unwrap();
        let graph = ConnectivityGraph::parse(file.path(), GraphForm::Simple).unwrap();
        assert_eq!(graph.vertex_count(), 4);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            ConnectivityGraph::parse(&missing, GraphForm::Simple),
            Err(TopologyError::Io { .. })
        ));
    }

    #[test]
    fn test_reconcile_island_count() {
        let graph = ConnectivityGraph::parse_str(RING, GraphForm::Simple).unwrap();
        assert_eq!(graph.reconcile_island_count(6), 4);
        assert_eq!(graph.reconcile_island_count(2), 4);
        assert_eq!(graph.reconcile_island_count(4), 4);
    }
}
