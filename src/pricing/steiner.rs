use std::collections::BTreeSet;

use binary_heap_plus::BinaryHeap;
use petgraph::algo::min_spanning_tree;
use petgraph::data::Element;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::error::{Error, Result};
use crate::instance::{Edge, NetworkGraph, Tree};
use crate::misc::FullHashMap;
use crate::pricing::Prices;

/// Single source shortest path tree
pub(crate) struct ShortestPaths {
    dist: Vec<f64>,
    pred: Vec<Option<NodeIndex>>,
}

impl ShortestPaths {
    pub fn dist(&self, target: NodeIndex) -> f64 {
        self.dist[target.index()]
    }

    /// Edges of the shortest path from the source to `target`
    pub fn path_to(&self, target: NodeIndex) -> Vec<Edge> {
        let mut path = Vec::new();
        let mut current = target;
        while let Some(prev) = self.pred[current.index()] {
            path.push(Edge::new(prev, current));
            current = prev;
        }
        path
    }
}

fn checked_price(prices: &Prices, u: NodeIndex, v: NodeIndex) -> Result<f64> {
    let price = prices.price(u, v)?;
    if price.is_nan() {
        return Err(Error::NonFinite("edge price"));
    }
    if price < 0.0 {
        return Err(Error::NegativePrice { u: u.index(), v: v.index(), price });
    }
    Ok(price)
}

/// Dijkstra from `source`, edge lengths are taken from `prices`
pub(crate) fn shortest_paths(graph: &NetworkGraph, prices: &Prices, source: NodeIndex) -> Result<ShortestPaths> {
    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut pred = vec![None; n];

    // min heap on tentative distance
    let mut heap = BinaryHeap::new_by(|a: &(f64, NodeIndex), b: &(f64, NodeIndex)| b.0.total_cmp(&a.0));

    dist[source.index()] = 0.0;
    heap.push((0.0, source));

    while let Some((d, u)) = heap.pop() {
        if d > dist[u.index()] {
            continue;
        }
        for edge in graph.edges(u) {
            let v = if edge.source() == u { edge.target() } else { edge.source() };
            let candidate = d + checked_price(prices, u, v)?;
            if candidate < dist[v.index()] {
                dist[v.index()] = candidate;
                pred[v.index()] = Some(u);
                heap.push((candidate, v));
            }
        }
    }

    Ok(ShortestPaths { dist, pred })
}

/// Metric closure heuristic, at most twice the cost of a minimum Steiner tree.
///
/// Shortest paths between all terminals form the closure graph. Its minimum
/// spanning tree is expanded back into graph paths, and the union is reduced
/// by [`prune_to_tree`].
pub(crate) fn approximate_steiner_tree(
    graph: &NetworkGraph,
    prices: &Prices,
    terminals: &BTreeSet<NodeIndex>,
) -> Result<Tree> {
    if terminals.len() <= 1 {
        return Ok(Tree::empty());
    }

    let terminals: Vec<NodeIndex> = terminals.iter().copied().collect();
    let paths = terminals
        .iter()
        .map(|t| shortest_paths(graph, prices, *t))
        .collect::<Result<Vec<_>>>()?;

    let k = terminals.len();
    let mut closure = UnGraph::<NodeIndex, f64>::with_capacity(k, k * (k - 1) / 2);
    let closure_nodes: Vec<_> = terminals.iter().map(|t| closure.add_node(*t)).collect();
    for a in 0..k {
        for b in a + 1..k {
            let d = paths[a].dist(terminals[b]);
            if !d.is_finite() {
                return Err(Error::UnreachableTerminal {
                    terminal: terminals[b].index(),
                    source_node: terminals[a].index(),
                });
            }
            closure.add_edge(closure_nodes[a], closure_nodes[b], d);
        }
    }

    // closure node indices coincide with positions in `terminals`
    let mut expanded = BTreeSet::new();
    for element in min_spanning_tree(&closure) {
        if let Element::Edge { source, target, .. } = element {
            expanded.extend(paths[source].path_to(terminals[target]));
        }
    }

    prune_to_tree(expanded, &terminals.into_iter().collect(), prices)
}

/// Minimum spanning forest of `edges` under `prices`, with non-terminal
/// leaves removed until every leaf is a terminal.
pub(crate) fn prune_to_tree(
    edges: impl IntoIterator<Item = Edge>,
    terminals: &BTreeSet<NodeIndex>,
    prices: &Prices,
) -> Result<Tree> {
    let mut subgraph = UnGraph::<NodeIndex, f64>::default();
    let mut local: FullHashMap<NodeIndex, NodeIndex> = FullHashMap::default();
    for edge in edges {
        let a = *local.entry(edge.0).or_insert_with(|| subgraph.add_node(edge.0));
        let b = *local.entry(edge.1).or_insert_with(|| subgraph.add_node(edge.1));
        subgraph.add_edge(a, b, checked_price(prices, edge.0, edge.1)?);
    }

    let mut tree_edges: BTreeSet<Edge> = min_spanning_tree(&subgraph)
        .filter_map(|element| match element {
            Element::Edge { source, target, .. } => {
                Some(Edge::new(subgraph[NodeIndex::new(source)], subgraph[NodeIndex::new(target)]))
            }
            Element::Node { .. } => None,
        })
        .collect();

    loop {
        let mut degree: FullHashMap<NodeIndex, usize> = FullHashMap::default();
        for edge in &tree_edges {
            *degree.entry(edge.0).or_default() += 1;
            *degree.entry(edge.1).or_default() += 1;
        }
        let is_loose = |node: &NodeIndex| degree[node] == 1 && !terminals.contains(node);

        let before = tree_edges.len();
        tree_edges.retain(|edge| !is_loose(&edge.0) && !is_loose(&edge.1));
        if tree_edges.len() == before {
            break;
        }
    }

    Ok(Tree::new(tree_edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::EdgeData;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn graph(num_nodes: usize, edges: &[(usize, usize)]) -> NetworkGraph {
        let mut graph = NetworkGraph::default();
        for _ in 0..num_nodes {
            graph.add_node(());
        }
        for (u, v) in edges {
            graph.add_edge(n(*u), n(*v), EdgeData::default());
        }
        graph
    }

    #[test]
    fn dijkstra_follows_cheap_detour() {
        // 0-1 expensive, 0-2-1 cheap
        let g = graph(3, &[(0, 1), (0, 2), (2, 1)]);
        let prices = Prices::from_pairs([((0, 1), 5.0), ((0, 2), 1.0), ((1, 2), 1.0)]);
        let paths = shortest_paths(&g, &prices, n(0)).unwrap();
        assert_eq!(paths.dist(n(1)), 2.0);
        assert_eq!(paths.path_to(n(1)).len(), 2);
    }

    #[test]
    fn negative_price_is_rejected() {
        let g = graph(2, &[(0, 1)]);
        let result = shortest_paths(&g, &Prices::Uniform(-1.0), n(0));
        assert!(matches!(result, Err(Error::NegativePrice { .. })));
    }

    #[test]
    fn star_connects_all_terminals() {
        // hub 0 with leaves 1..=3, plus an expensive ring between leaves
        let g = graph(4, &[(0, 1), (0, 2), (0, 3), (1, 2), (2, 3)]);
        let prices = Prices::from_pairs([((0, 1), 1.0), ((0, 2), 1.0), ((0, 3), 1.0), ((1, 2), 3.0), ((2, 3), 3.0)]);
        let terminals = [n(1), n(2), n(3)].into_iter().collect();
        let tree = approximate_steiner_tree(&g, &prices, &terminals).unwrap();
        assert_eq!(tree.len(), 3);
        assert!(tree.nodes().contains(&n(0)));
        assert_eq!(prices.cost(&tree).unwrap(), 3.0);
    }

    #[test]
    fn pruning_drops_dangling_branches() {
        let prices = Prices::Uniform(1.0);
        let terminals = [n(0), n(2)].into_iter().collect();
        let edges = [Edge::new(n(0), n(1)), Edge::new(n(1), n(2)), Edge::new(n(1), n(3)), Edge::new(n(3), n(4))];
        let tree = prune_to_tree(edges, &terminals, &prices).unwrap();
        assert_eq!(tree, Tree::new([Edge::new(n(0), n(1)), Edge::new(n(1), n(2))]));
    }

    #[test]
    fn unreachable_terminal_is_an_error() {
        let g = graph(4, &[(0, 1), (2, 3)]);
        let terminals = [n(0), n(3)].into_iter().collect();
        let result = approximate_steiner_tree(&g, &Prices::Uniform(1.0), &terminals);
        assert!(matches!(result, Err(Error::UnreachableTerminal { .. })));
    }
}
