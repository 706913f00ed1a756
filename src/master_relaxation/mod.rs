use std::sync::Arc;

use crate::error::{Error, Result};
use crate::instance::{MulticastPackingInstance, Tree};
use crate::pricing::ColumnSink;
use crate::solvers::{ConstrId, ConstrSense, LPEnv, LPModel, ModelStatus, ObjSense, VarId, VarKind};
use crate::ui::{LPSolveIterationUIState, UISender, UIUserMessage};

pub mod column_pool;

use column_pool::{Column, ColumnId, ColumnPool, TreeColumn};

/// Snapshot of the last optimal master solve
#[derive(Clone, Debug, PartialEq)]
pub struct MasterSolution {
    pub objective: f64,
    /// indexed by `ColumnId`
    pub column_values: Vec<f64>,
    /// per edge in the instance's dense edge order
    pub edge_duals: Vec<f64>,
    /// `congestion - load` per edge
    pub edge_slacks: Vec<f64>,
    /// per request
    pub selection_duals: Vec<f64>,
    pub runtime: f64,
}

/// Restricted master problem of the multicast packing LP.
///
/// ```text
/// min  congestion
/// s.t. congestion - sum_{T uses e} x_T >= 0     for every edge e
///      sum_{T of request i} x_T         = 1     for every request i
/// ```
///
/// Starts without columns, so the selection rows read `0 = 1` until the
/// first tree of each request arrives.
pub struct MasterRelaxation {
    instance: Arc<MulticastPackingInstance>,
    model: Box<dyn LPModel>,
    congestion: VarId,
    edge_constrs: Vec<ConstrId>,
    selection_constrs: Vec<ConstrId>,
    pool: ColumnPool<TreeColumn>,
    column_vars: Vec<VarId>,
    var_kind: VarKind,
    last: Option<MasterSolution>,
    ui: UISender,
}

impl MasterRelaxation {
    pub fn new<E: LPEnv>(instance: Arc<MulticastPackingInstance>, env: &mut E, ui: UISender) -> Self {
        let mut model = env.new_model("Multicast Packing Model - Reduced");

        let congestion = model.add_var("lambda", VarKind::Continuous, 1.0, 0.0, f64::INFINITY, &[]);
        model.set_objective(&[(congestion, 1.0)], ObjSense::Minimize);

        let edge_constrs = instance
            .edges()
            .iter()
            .map(|e| model.add_constr(&format!("{e} congestion"), &[(congestion, 1.0)], ConstrSense::Greater, 0.0))
            .collect();
        let selection_constrs = (0..instance.num_requests())
            .map(|i| model.add_constr(&format!("Tree Selection for {i}"), &[], ConstrSense::Equal, 1.0))
            .collect();

        MasterRelaxation {
            instance,
            model,
            congestion,
            edge_constrs,
            selection_constrs,
            pool: ColumnPool::new(),
            column_vars: Vec::new(),
            var_kind: VarKind::Continuous,
            last: None,
            ui,
        }
    }

    /// Adds `tree` as a new column of request `request`, duplicates included
    pub fn add_column(&mut self, request: usize, tree: &Tree) -> ColumnId {
        let id = self.pool.add_column(TreeColumn {
            request,
            tree: tree.clone(),
        });

        let mut column: Vec<(ConstrId, f64)> = tree
            .edges()
            .iter()
            .filter_map(|e| self.instance.edge_index(e))
            .map(|k| (self.edge_constrs[k], -1.0))
            .collect();
        column.push((self.selection_constrs[request], 1.0));

        let var = self.model.add_var(
            &format!("x[{request}] column {}", id.0),
            self.var_kind,
            0.0,
            0.0,
            f64::INFINITY,
            &column,
        );
        self.column_vars.push(var);

        debug_assert_eq!(self.column_vars.len(), self.pool.count());
        id
    }

    /// Declares the congestion and every present and future column variable integral
    pub fn set_integer(&mut self) {
        self.var_kind = VarKind::Integer;
        self.model.set_var_kind(self.congestion, VarKind::Integer);
        for var in &self.column_vars {
            self.model.set_var_kind(*var, VarKind::Integer);
        }
        self.ui.send(UIUserMessage::LogS("master switched to integer columns"));
    }

    pub fn is_integer(&self) -> bool {
        self.var_kind != VarKind::Continuous
    }

    pub fn solve(&mut self) -> Result<&MasterSolution> {
        let status = self.model.optimize();
        if status != ModelStatus::Optimal {
            return Err(Error::SolverNonOptimal {
                model: self.model.name().to_string(),
                status: status.to_string(),
            });
        }

        let solution = MasterSolution {
            objective: self.model.get_objective(),
            column_values: self.model.get_x_list(&self.column_vars),
            edge_duals: self.model.get_dual_list(&self.edge_constrs),
            edge_slacks: self.model.get_slack_list(&self.edge_constrs),
            selection_duals: self.model.get_dual_list(&self.selection_constrs),
            runtime: self.model.get_runtime(),
        };

        self.ui.send(UIUserMessage::LPSolveIterationFinish(LPSolveIterationUIState {
            obj: solution.objective,
            lp_runtime: solution.runtime,
            num_columns: self.pool.count(),
        }));

        Ok(self.last.insert(solution))
    }

    pub fn last_solution(&self) -> Result<&MasterSolution> {
        self.last.as_ref().ok_or(Error::MasterNotSolved)
    }

    pub fn pool(&self) -> &ColumnPool<TreeColumn> {
        &self.pool
    }

    pub fn num_columns(&self) -> usize {
        self.pool.count()
    }

    pub fn columns_for(&self, request: usize) -> impl Iterator<Item = &Column<TreeColumn>> {
        self.pool.columns_for(request)
    }
}

impl ColumnSink for MasterRelaxation {
    fn add_column(&mut self, request: usize, tree: &Tree) -> ColumnId {
        MasterRelaxation::add_column(self, request, tree)
    }

    fn needs_edges(&self, request: usize) -> bool {
        self.instance.request(request).multicast_group().len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Edge, MulticastRequest};
    use crate::solvers::highs::HighsEnv;
    use crate::ui::UI;
    use petgraph::graph::NodeIndex;

    fn cycle() -> Arc<MulticastPackingInstance> {
        Arc::new(
            MulticastPackingInstance::from_edge_list(
                4,
                &[(0, 1), (1, 2), (2, 3), (3, 0)],
                vec![MulticastRequest::from_indices(0, &[2])],
            )
            .unwrap(),
        )
    }

    fn path(nodes: &[usize]) -> Tree {
        Tree::new(nodes.windows(2).map(|w| Edge::new(NodeIndex::new(w[0]), NodeIndex::new(w[1]))))
    }

    #[test]
    fn unseeded_master_is_infeasible() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let mut master = MasterRelaxation::new(cycle(), &mut env, ui.get_sender());
        assert!(matches!(master.solve(), Err(Error::SolverNonOptimal { .. })));
        assert_eq!(master.last_solution(), Err(Error::MasterNotSolved));
    }

    #[test]
    fn single_column_carries_full_load() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let instance = cycle();
        let mut master = MasterRelaxation::new(instance.clone(), &mut env, ui.get_sender());
        master.add_column(0, &path(&[0, 1, 2]));

        let solution = master.solve().unwrap().clone();
        assert!((solution.objective - 1.0).abs() < 1e-9);
        assert!((solution.selection_duals[0] - 1.0).abs() < 1e-9);
        assert!((solution.edge_duals.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let loads: Vec<f64> = solution.edge_slacks.iter().map(|s| solution.objective - s).collect();
        for (e, load) in instance.edges().iter().zip(loads) {
            let expected = if path(&[0, 1, 2]).contains(e) { 1.0 } else { 0.0 };
            assert!((load - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn two_paths_split_the_load() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let mut master = MasterRelaxation::new(cycle(), &mut env, ui.get_sender());
        master.add_column(0, &path(&[0, 1, 2]));
        master.add_column(0, &path(&[0, 3, 2]));

        let solution = master.solve().unwrap();
        assert!((solution.objective - 0.5).abs() < 1e-9);
        assert!((solution.selection_duals[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn integer_master_picks_one_path() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let mut master = MasterRelaxation::new(cycle(), &mut env, ui.get_sender());
        master.add_column(0, &path(&[0, 1, 2]));
        master.set_integer();
        master.add_column(0, &path(&[0, 3, 2]));
        assert!(master.is_integer());

        let solution = master.solve().unwrap();
        assert!((solution.objective - 1.0).abs() < 1e-9);
        assert!((solution.column_values.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_trees_become_parallel_columns() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let mut master = MasterRelaxation::new(cycle(), &mut env, ui.get_sender());
        let a = master.add_column(0, &path(&[0, 1, 2]));
        let b = master.add_column(0, &path(&[2, 1, 0]));

        assert_ne!(a, b);
        assert_eq!(master.columns_for(0).count(), 2);
        let solution = master.solve().unwrap();
        assert!((solution.column_values.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
