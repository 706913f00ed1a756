use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use itertools::Itertools;

use crate::instance::{MulticastPackingInstance, Tree};
use crate::misc::FullHashMap;

/// Fractional solution: per request, a weight in `(0, 1]` for each chosen tree.
///
/// Used as a value type. Equality and hashing look at the exact bits of the
/// weights, so two solutions only share memoised potentials if they are
/// identical.
#[derive(Clone, Debug)]
pub struct Solution {
    trees: Vec<BTreeMap<Tree, f64>>,
}

impl Solution {
    pub fn new(trees: Vec<BTreeMap<Tree, f64>>) -> Self {
        Solution { trees }
    }

    /// Every request fully assigned to the given tree
    pub fn from_trees(trees: &[Tree]) -> Self {
        Solution {
            trees: trees.iter().map(|t| BTreeMap::from([(t.clone(), 1.0)])).collect(),
        }
    }

    pub fn num_requests(&self) -> usize {
        self.trees.len()
    }

    pub fn request(&self, i: usize) -> &BTreeMap<Tree, f64> {
        &self.trees[i]
    }

    pub fn requests(&self) -> &[BTreeMap<Tree, f64>] {
        &self.trees
    }

    pub fn num_trees(&self) -> usize {
        self.trees.iter().map(BTreeMap::len).sum()
    }

    /// `f_e(x)`: sum of the weights of all trees using edge `e`, in dense edge order
    pub fn edge_loads(&self, instance: &MulticastPackingInstance) -> Vec<f64> {
        let mut loads = vec![0.0; instance.num_edges()];
        for (tree, weight) in self.trees.iter().flatten() {
            for edge in tree.edges() {
                if let Some(k) = instance.edge_index(edge) {
                    loads[k] += weight;
                }
            }
        }
        loads
    }

    /// `(1 - step) * self + step * new_trees`, new trees enter with weight one
    pub fn convex_step(&self, new_trees: &[Tree], step: f64) -> Solution {
        let trees = self
            .trees
            .iter()
            .zip(new_trees)
            .map(|(current, new_tree)| {
                let mut next: BTreeMap<Tree, f64> = current.iter().map(|(t, w)| (t.clone(), (1.0 - step) * w)).collect();
                *next.entry(new_tree.clone()).or_insert(0.0) += step;
                next.retain(|_, w| *w > 0.0);
                next
            })
            .collect();
        Solution { trees }
    }
}

impl PartialEq for Solution {
    fn eq(&self, other: &Self) -> bool {
        self.trees.len() == other.trees.len()
            && self.trees.iter().zip(&other.trees).all(|(a, b)| {
                a.len() == b.len() && a.iter().zip(b).all(|((ta, wa), (tb, wb))| ta == tb && wa.to_bits() == wb.to_bits())
            })
    }
}

impl Eq for Solution {}

impl Hash for Solution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.trees.len());
        for request in &self.trees {
            state.write_usize(request.len());
            for (tree, weight) in request {
                tree.hash(state);
                state.write_u64(weight.to_bits());
            }
        }
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, request) in self.trees.iter().enumerate() {
            writeln!(f, "request {i}: {}", request.iter().map(|(t, w)| format!("{w:.4} {t}")).join(" + "))?;
        }
        Ok(())
    }
}

/// Surrogate key of an interned solution
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SolutionId(pub u32);

impl Hash for SolutionId {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0)
    }
}

impl nohash_hasher::IsEnabled for SolutionId {}

/// Scaling parameter `t` as a cache key, compared by bits
#[derive(Clone, Copy, Debug)]
pub struct Scale(pub f64);

impl Scale {
    /// Variants without a scaling parameter
    pub const NONE: Scale = Scale(0.0);
}

impl PartialEq for Scale {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Scale {}

impl Hash for Scale {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.to_bits());
    }
}

/// Interns solutions so that caches can be keyed by a `SolutionId`.
/// Structural hashing happens once per interned solution.
#[derive(Default)]
pub struct SolutionArena {
    solutions: Vec<Arc<Solution>>,
    index: FullHashMap<Arc<Solution>, SolutionId>,
}

impl SolutionArena {
    pub fn intern(&mut self, solution: Solution) -> SolutionId {
        if let Some(id) = self.index.get(&solution) {
            return *id;
        }
        let id = SolutionId(self.solutions.len() as u32);
        let solution = Arc::new(solution);
        self.solutions.push(solution.clone());
        self.index.insert(solution, id);
        id
    }

    pub fn get(&self, id: SolutionId) -> &Arc<Solution> {
        &self.solutions[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Edge, MulticastRequest};
    use petgraph::graph::NodeIndex;

    fn path(nodes: &[usize]) -> Tree {
        Tree::new(nodes.windows(2).map(|w| Edge::new(NodeIndex::new(w[0]), NodeIndex::new(w[1]))))
    }

    #[test]
    fn interning_deduplicates_equal_solutions() {
        let mut arena = SolutionArena::default();
        let a = arena.intern(Solution::from_trees(&[path(&[0, 1, 2])]));
        let b = arena.intern(Solution::from_trees(&[path(&[2, 1, 0])]));
        let c = arena.intern(Solution::from_trees(&[path(&[0, 3, 2])]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn loads_sum_weights_of_trees_using_each_edge() {
        let instance = MulticastPackingInstance::from_edge_list(
            4,
            &[(0, 1), (1, 2), (2, 3), (3, 0)],
            vec![MulticastRequest::from_indices(0, &[2]), MulticastRequest::from_indices(1, &[3])],
        )
        .unwrap();
        let x = Solution::new(vec![
            BTreeMap::from([(path(&[0, 1, 2]), 0.25), (path(&[0, 3, 2]), 0.75)]),
            BTreeMap::from([(path(&[1, 0, 3]), 1.0)]),
        ]);

        let loads = x.edge_loads(&instance);
        for (k, edge) in instance.edges().iter().enumerate() {
            let expected: f64 = x
                .requests()
                .iter()
                .flatten()
                .filter(|(t, _)| t.contains(edge))
                .map(|(_, w)| *w)
                .sum();
            assert!((loads[k] - expected).abs() < 1e-12);
        }
        assert_eq!(loads, vec![1.25, 0.25, 0.75, 1.75]);
    }

    #[test]
    fn convex_step_moves_mass_to_new_trees() {
        let x = Solution::new(vec![BTreeMap::from([(path(&[0, 1, 2]), 1.0)])]);
        let next = x.convex_step(&[path(&[0, 3, 2])], 0.25);
        assert_eq!(next.request(0)[&path(&[0, 1, 2])], 0.75);
        assert_eq!(next.request(0)[&path(&[0, 3, 2])], 0.25);

        let same = x.convex_step(&[path(&[0, 1, 2])], 0.25);
        assert_eq!(same.request(0)[&path(&[0, 1, 2])], 1.0);
    }
}
