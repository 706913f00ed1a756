use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::error::{Error, Result};
use crate::misc::FullHashMap;

/// Undirected edge with its endpoints in canonical (ascending) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge(pub NodeIndex, pub NodeIndex);

impl Edge {
    pub fn new(u: NodeIndex, v: NodeIndex) -> Self {
        if u <= v {
            Edge(u, v)
        } else {
            Edge(v, u)
        }
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.0.index(), self.1.index())
    }
}

/// Steiner tree as a set of canonical edges.
///
/// Two trees are equal iff their edge sets are equal; the edges are kept sorted
/// and deduplicated so the derived `Hash`/`Ord` follow the set semantics.
/// Cloning shares the edge storage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tree {
    edges: Arc<[Edge]>,
}

impl Tree {
    pub fn new(edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut edges: Vec<Edge> = edges.into_iter().collect();
        edges.sort_unstable();
        edges.dedup();
        Tree { edges: edges.into() }
    }

    /// Placeholder returned when a pricing model could not be solved
    pub fn empty() -> Self {
        Tree::new(std::iter::empty())
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, edge: &Edge) -> bool {
        self.edges.binary_search(edge).is_ok()
    }

    /// Nodes touched by at least one edge
    pub fn nodes(&self) -> BTreeSet<NodeIndex> {
        self.edges.iter().flat_map(|e| [e.0, e.1]).collect()
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.edges.iter().join(", "))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeData {
    pub weight: f64,
    /// Only needed by the delay constrained pricing oracle
    pub delay: Option<f64>,
}

impl Default for EdgeData {
    fn default() -> Self {
        EdgeData { weight: 1.0, delay: None }
    }
}

pub type NetworkGraph = UnGraph<(), EdgeData>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MulticastRequest {
    pub source: NodeIndex,
    pub recipients: BTreeSet<NodeIndex>,
}

impl MulticastRequest {
    pub fn new(source: NodeIndex, recipients: impl IntoIterator<Item = NodeIndex>) -> Self {
        MulticastRequest {
            source,
            recipients: recipients.into_iter().collect(),
        }
    }

    pub fn from_indices(source: usize, recipients: &[usize]) -> Self {
        MulticastRequest::new(NodeIndex::new(source), recipients.iter().map(|r| NodeIndex::new(*r)))
    }

    /// Recipients together with the source
    pub fn multicast_group(&self) -> BTreeSet<NodeIndex> {
        let mut group = self.recipients.clone();
        group.insert(self.source);
        group
    }
}

/// Graph and multicast requests. Read only once constructed.
#[derive(Clone, Debug)]
pub struct MulticastPackingInstance {
    graph: NetworkGraph,
    requests: Vec<MulticastRequest>,
    delay_budget: Option<f64>,
    edges: Vec<Edge>,
    edge_lookup: FullHashMap<Edge, usize>,
}

impl MulticastPackingInstance {
    pub fn new(graph: NetworkGraph, requests: Vec<MulticastRequest>) -> Result<Self> {
        let mut edges = Vec::with_capacity(graph.edge_count());
        let mut edge_lookup = FullHashMap::default();

        for edge_ref in graph.edge_references() {
            let (u, v) = (edge_ref.source(), edge_ref.target());
            if u == v {
                return Err(Error::InvalidInstance(format!("self loop at node {}", u.index())));
            }
            let data = edge_ref.weight();
            if !data.weight.is_finite() || data.weight < 0.0 {
                let weight = data.weight;
                return Err(Error::InvalidInstance(format!("edge ({}, {}) has weight {weight}", u.index(), v.index())));
            }
            if let Some(delay) = data.delay {
                if !delay.is_finite() || delay < 0.0 {
                    return Err(Error::InvalidInstance(format!("edge ({}, {}) has delay {delay}", u.index(), v.index())));
                }
            }

            let edge = Edge::new(u, v);
            if edge_lookup.insert(edge, edges.len()).is_some() {
                return Err(Error::InvalidInstance(format!("parallel edges between {} and {}", u.index(), v.index())));
            }
            edges.push(edge);
        }

        for (i, request) in requests.iter().enumerate() {
            if let Some(node) = request.multicast_group().into_iter().find(|n| n.index() >= graph.node_count()) {
                return Err(Error::InvalidInstance(format!("request {i} references unknown node {}", node.index())));
            }
        }

        Ok(MulticastPackingInstance {
            graph,
            requests,
            delay_budget: None,
            edges,
            edge_lookup,
        })
    }

    /// Builds an instance with unit edge weights and no delays
    pub fn from_edge_list(num_nodes: usize, edges: &[(usize, usize)], requests: Vec<MulticastRequest>) -> Result<Self> {
        let weighted: Vec<_> = edges.iter().map(|(u, v)| (*u, *v, EdgeData::default())).collect();
        MulticastPackingInstance::from_weighted_edge_list(num_nodes, &weighted, requests)
    }

    pub fn from_weighted_edge_list(
        num_nodes: usize,
        edges: &[(usize, usize, EdgeData)],
        requests: Vec<MulticastRequest>,
    ) -> Result<Self> {
        let mut graph = NetworkGraph::with_capacity(num_nodes, edges.len());
        for _ in 0..num_nodes {
            graph.add_node(());
        }
        for (u, v, data) in edges {
            if *u >= num_nodes || *v >= num_nodes {
                return Err(Error::InvalidInstance(format!("edge ({u}, {v}) references unknown node")));
            }
            graph.add_edge(NodeIndex::new(*u), NodeIndex::new(*v), *data);
        }
        MulticastPackingInstance::new(graph, requests)
    }

    /// Delay budget every recipient's path must respect in the delay constrained oracle
    pub fn with_delay_budget(mut self, budget: f64) -> Self {
        self.delay_budget = Some(budget);
        self
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn requests(&self) -> &[MulticastRequest] {
        &self.requests
    }

    pub fn request(&self, i: usize) -> &MulticastRequest {
        &self.requests[i]
    }

    pub fn num_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Edges in dense index order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_index(&self, edge: &Edge) -> Option<usize> {
        self.edge_lookup.get(edge).copied()
    }

    pub fn edge_data(&self, edge: &Edge) -> Option<&EdgeData> {
        self.graph.find_edge(edge.0, edge.1).and_then(|e| self.graph.edge_weight(e))
    }

    pub fn delay_budget(&self) -> Option<f64> {
        self.delay_budget
    }
}
