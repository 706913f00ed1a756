use std::sync::Arc;

use petgraph::graph::NodeIndex;

use crate::error::{Error, Result};
use crate::instance::{MulticastPackingInstance, Tree};
use crate::master_relaxation::column_pool::ColumnId;
use crate::misc::FullHashMap;
use crate::solvers::LPEnv;
use crate::ui::UISender;

mod approx;
mod exact;
pub(crate) mod steiner;

pub use approx::ApproxOracle;
pub use exact::ExactOracle;

/// Edge prices handed to a pricing oracle
#[derive(Clone, Debug, PartialEq)]
pub enum Prices {
    /// Same price on every edge
    Uniform(f64),
    /// Price per node pair. A pair is looked up in both orientations.
    PerEdge(FullHashMap<(NodeIndex, NodeIndex), f64>),
}

impl Prices {
    pub fn price(&self, u: NodeIndex, v: NodeIndex) -> Result<f64> {
        match self {
            Prices::Uniform(price) => Ok(*price),
            Prices::PerEdge(map) => map
                .get(&(u, v))
                .or_else(|| map.get(&(v, u)))
                .copied()
                .ok_or(Error::MissingPrice(u.index(), v.index())),
        }
    }

    /// Per edge prices from a dense vector in the instance's edge order
    pub fn from_edge_values(instance: &MulticastPackingInstance, values: &[f64]) -> Self {
        debug_assert_eq!(instance.num_edges(), values.len());
        Prices::PerEdge(
            instance
                .edges()
                .iter()
                .zip(values)
                .map(|(e, value)| ((e.0, e.1), *value))
                .collect(),
        )
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = ((usize, usize), f64)>) -> Self {
        Prices::PerEdge(
            pairs
                .into_iter()
                .map(|((u, v), price)| ((NodeIndex::new(u), NodeIndex::new(v)), price))
                .collect(),
        )
    }

    /// Sum of the prices of the tree's edges
    pub fn cost(&self, tree: &Tree) -> Result<f64> {
        tree.edges().iter().map(|e| self.price(e.0, e.1)).sum()
    }
}

/// Receives the trees a pricing oracle produced
pub trait ColumnSink {
    fn add_column(&mut self, request: usize, tree: &Tree) -> ColumnId;

    /// True if a column of `request` must contain at least one edge
    fn needs_edges(&self, request: usize) -> bool;
}

/// Column generator: one Steiner tree per request under given edge prices
pub trait PricingOracle {
    fn name(&self) -> &str;

    fn num_requests(&self) -> usize;

    fn generate_tree(&mut self, request: usize, prices: &Prices) -> Result<Tree>;

    /// Generates a tree for every request and registers them with `sink`.
    /// Trees are registered even if an identical column exists already.
    /// An empty tree for a request that needs edges comes from a failed
    /// pricing model and is returned but not registered.
    /// Nothing is registered if any request fails.
    fn generate_new_trees(&mut self, sink: &mut dyn ColumnSink, prices: &Prices) -> Result<Vec<Tree>> {
        let trees = (0..self.num_requests())
            .map(|i| self.generate_tree(i, prices))
            .collect::<Result<Vec<_>>>()?;

        for (i, tree) in trees.iter().enumerate() {
            if tree.is_empty() && sink.needs_edges(i) {
                continue;
            }
            sink.add_column(i, tree);
        }

        Ok(trees)
    }
}

/// Selects the pricing oracle a solver starts with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PricingKind {
    #[default]
    TwoApprox,
    Exact,
    ExactWithDelay,
}

impl PricingKind {
    pub fn build<E: LPEnv>(
        self,
        instance: &Arc<MulticastPackingInstance>,
        env: &mut E,
        ui: &UISender,
    ) -> Result<Box<dyn PricingOracle>> {
        Ok(match self {
            PricingKind::TwoApprox => Box::new(ApproxOracle::new(instance.clone())),
            PricingKind::Exact => Box::new(ExactOracle::new(instance.clone(), env, ui.clone())),
            PricingKind::ExactWithDelay => Box::new(ExactOracle::with_delay(instance.clone(), env, ui.clone())?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Edge;

    #[test]
    fn price_lookup_falls_back_to_reverse_orientation() {
        let prices = Prices::from_pairs([((0, 1), 2.5)]);
        assert_eq!(prices.price(NodeIndex::new(1), NodeIndex::new(0)), Ok(2.5));
        assert_eq!(prices.price(NodeIndex::new(1), NodeIndex::new(2)), Err(Error::MissingPrice(1, 2)));
    }

    #[test]
    fn cost_sums_edge_prices() {
        let prices = Prices::from_pairs([((1, 0), 2.0), ((2, 1), 0.5)]);
        let n = NodeIndex::new;
        let tree = Tree::new([Edge::new(n(0), n(1)), Edge::new(n(1), n(2))]);
        assert_eq!(prices.cost(&tree), Ok(2.5));
        assert_eq!(Prices::Uniform(3.0).cost(&tree), Ok(6.0));
        assert_eq!(prices.cost(&Tree::empty()), Ok(0.0));
    }
}
