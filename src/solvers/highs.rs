use std::time::Instant;

use highs::{HighsModelStatus, RowProblem, Sense};

use crate::misc::FullHashMap;
use crate::solvers::{ConstrId, ConstrSense, LPEnv, LPModel, ModelStatus, ObjSense, VarId, VarKind};

/// Environment for HiGHS models: the seed and time limit every model inherits.
/// Models always run single threaded and quiet.
pub struct HighsEnv {
    seed: i32,
    time_limit: Option<f64>,
}

impl LPEnv for HighsEnv {
    fn new_with_seed(seed: i32) -> Self {
        HighsEnv { seed, time_limit: None }
    }

    fn set_time_limit(&mut self, seconds: f64) {
        self.time_limit = Some(seconds);
    }

    fn new_model(&mut self, name: &str) -> Box<dyn LPModel> {
        Box::new(HighsModel::new(name, self))
    }
}

struct VarData {
    name: String,
    kind: VarKind,
    obj: f64,
    lb: f64,
    ub: f64,
}

struct ConstrData {
    name: String,
    sense: ConstrSense,
    rhs: f64,
    coefficients: Vec<(VarId, f64)>,
}

struct SolveResult {
    objective: f64,
    columns: Vec<f64>,
    dual_rows: Vec<f64>,
    runtime: f64,
}

/// In-memory model description that is handed to HiGHS on every `optimize`.
///
/// HiGHS itself is stateless between solves here: the rows, columns and
/// objective live in this struct, so a caller that only swaps the objective
/// keeps all of its constraint structure.
pub struct HighsModel {
    name: String,
    seed: i32,
    time_limit: Option<f64>,
    vars: Vec<VarData>,
    constrs: Vec<ConstrData>,
    constr_by_name: FullHashMap<String, ConstrId>,
    objective_sense: ObjSense,
    last: SolveResult,
}

impl HighsModel {
    pub fn new(name: &str, env: &HighsEnv) -> Self {
        HighsModel {
            name: name.to_string(),
            seed: env.seed,
            time_limit: env.time_limit,
            vars: Vec::new(),
            constrs: Vec::new(),
            constr_by_name: FullHashMap::default(),
            objective_sense: ObjSense::Minimize,
            last: SolveResult {
                objective: f64::NAN,
                columns: Vec::new(),
                dual_rows: Vec::new(),
                runtime: 0.0,
            },
        }
    }

    fn is_mip(&self) -> bool {
        self.vars.iter().any(|v| v.kind != VarKind::Continuous)
    }

    fn value(&self, var: VarId) -> f64 {
        self.last.columns.get(var.0 as usize).copied().unwrap_or(0.0)
    }
}

impl LPModel for HighsModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_var(
        &mut self,
        name: &str,
        kind: VarKind,
        obj: f64,
        lb: f64,
        ub: f64,
        column: &[(ConstrId, f64)],
    ) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(VarData { name: name.to_string(), kind, obj, lb, ub });
        for (constr, coefficient) in column {
            self.constrs[constr.0 as usize].coefficients.push((id, *coefficient));
        }
        id
    }

    fn add_constr(&mut self, name: &str, expr: &[(VarId, f64)], sense: ConstrSense, rhs: f64) -> ConstrId {
        let id = ConstrId(self.constrs.len() as u32);
        self.constrs.push(ConstrData {
            name: name.to_string(),
            sense,
            rhs,
            coefficients: expr.to_vec(),
        });
        self.constr_by_name.insert(name.to_string(), id);
        id
    }

    fn get_constr_by_name(&self, name: &str) -> Option<ConstrId> {
        self.constr_by_name.get(name).copied()
    }

    fn set_objective(&mut self, expr: &[(VarId, f64)], sense: ObjSense) {
        for var in &mut self.vars {
            var.obj = 0.0;
        }
        for (var, coefficient) in expr {
            self.vars[var.0 as usize].obj += coefficient;
        }
        self.objective_sense = sense;
    }

    fn set_var_kind(&mut self, var: VarId, kind: VarKind) {
        self.vars[var.0 as usize].kind = kind;
    }

    fn optimize(&mut self) -> ModelStatus {
        let start = Instant::now();

        let mut problem = RowProblem::default();
        let cols: Vec<_> = self
            .vars
            .iter()
            .map(|var| match var.kind {
                VarKind::Continuous => problem.add_column(var.obj, var.lb..=var.ub),
                VarKind::Binary => problem.add_integer_column(var.obj, var.lb.max(0.0)..=var.ub.min(1.0)),
                VarKind::Integer => problem.add_integer_column(var.obj, var.lb..=var.ub),
            })
            .collect();

        for constr in &self.constrs {
            let factors: Vec<_> = constr
                .coefficients
                .iter()
                .map(|(var, coefficient)| (cols[var.0 as usize], *coefficient))
                .collect();
            match constr.sense {
                ConstrSense::Equal => problem.add_row(constr.rhs..=constr.rhs, factors),
                ConstrSense::Greater => problem.add_row(constr.rhs.., factors),
                ConstrSense::Less => problem.add_row(..=constr.rhs, factors),
            };
        }

        let mut model = problem.optimise(match self.objective_sense {
            ObjSense::Minimize => Sense::Minimise,
            ObjSense::Maximize => Sense::Maximise,
        });
        model.make_quiet();
        model.set_option("random_seed", self.seed);
        if let Some(limit) = self.time_limit {
            model.set_option("time_limit", limit);
        }

        let solved = model.solve();
        let status = match solved.status() {
            HighsModelStatus::Optimal => ModelStatus::Optimal,
            HighsModelStatus::Infeasible => ModelStatus::Infeasible,
            other => ModelStatus::Other(format!("{other:?}")),
        };

        if status == ModelStatus::Optimal {
            let solution = solved.get_solution();
            let columns = solution.columns().to_vec();
            let dual_rows = if self.is_mip() {
                vec![0.0; self.constrs.len()]
            } else {
                solution.dual_rows().to_vec()
            };
            let objective = self.vars.iter().zip(columns.iter()).map(|(var, x)| var.obj * x).sum();

            self.last = SolveResult {
                objective,
                columns,
                dual_rows,
                runtime: start.elapsed().as_secs_f64(),
            };
        } else {
            self.last = SolveResult {
                objective: f64::NAN,
                columns: Vec::new(),
                dual_rows: Vec::new(),
                runtime: start.elapsed().as_secs_f64(),
            };
        }

        status
    }

    fn get_objective(&self) -> f64 {
        self.last.objective
    }

    fn get_x_list(&self, vars: &[VarId]) -> Vec<f64> {
        vars.iter().map(|var| self.value(*var)).collect()
    }

    fn get_dual_list(&self, constrs: &[ConstrId]) -> Vec<f64> {
        constrs
            .iter()
            .map(|constr| self.last.dual_rows.get(constr.0 as usize).copied().unwrap_or(0.0))
            .collect()
    }

    fn get_slack_list(&self, constrs: &[ConstrId]) -> Vec<f64> {
        constrs
            .iter()
            .map(|constr| {
                let data = &self.constrs[constr.0 as usize];
                let activity: f64 = data.coefficients.iter().map(|(var, a)| a * self.value(*var)).sum();
                activity - data.rhs
            })
            .collect()
    }

    fn get_runtime(&self) -> f64 {
        self.last.runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_of_binding_lower_bound_row_is_non_negative() {
        // min x  s.t.  x >= 2
        let mut env = HighsEnv::new_with_seed(0);
        let mut model = env.new_model("dual sign");
        let x = model.add_var("x", VarKind::Continuous, 1.0, 0.0, f64::INFINITY, &[]);
        let row = model.add_constr("x lower", &[(x, 1.0)], ConstrSense::Greater, 2.0);

        assert_eq!(model.optimize(), ModelStatus::Optimal);
        assert!((model.get_objective() - 2.0).abs() < 1e-9);
        assert!((model.get_dual_list(&[row])[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn slack_is_activity_minus_rhs() {
        // congestion row: lambda - load >= 0 with a fixed load of 0.25
        let mut env = HighsEnv::new_with_seed(0);
        let mut model = env.new_model("slack sign");
        let lambda = model.add_var("lambda", VarKind::Continuous, 1.0, 0.0, f64::INFINITY, &[]);
        let row = model.add_constr("edge", &[(lambda, 1.0)], ConstrSense::Greater, 0.0);
        let other = model.add_constr("other", &[(lambda, 1.0)], ConstrSense::Greater, 1.0);
        let load = model.add_var("load", VarKind::Continuous, 0.0, 0.25, 0.25, &[(row, -1.0)]);

        assert_eq!(model.optimize(), ModelStatus::Optimal);
        let lamb = model.get_objective();
        assert!((lamb - 1.0).abs() < 1e-9);
        let slack = model.get_slack_list(&[row])[0];
        // load is recovered as lamb - slack
        assert!((lamb - slack - model.get_x_list(&[load])[0]).abs() < 1e-9);
        assert!(model.get_slack_list(&[other])[0].abs() < 1e-9);
    }

    #[test]
    fn columns_can_be_added_into_existing_rows() {
        let mut env = HighsEnv::new_with_seed(0);
        let mut model = env.new_model("columns");
        let row = model.add_constr("cover", &[], ConstrSense::Equal, 1.0);
        assert_eq!(model.optimize(), ModelStatus::Infeasible);

        let y = model.add_var("y", VarKind::Continuous, 3.0, 0.0, f64::INFINITY, &[(row, 1.0)]);
        assert_eq!(model.optimize(), ModelStatus::Optimal);
        assert!((model.get_x_list(&[y])[0] - 1.0).abs() < 1e-9);
        assert_eq!(model.get_constr_by_name("cover"), Some(row));
    }

    #[test]
    fn binary_program_solves_and_reports_zero_duals() {
        // min -a - b  s.t.  a + b <= 1, binaries
        let mut env = HighsEnv::new_with_seed(0);
        let mut model = env.new_model("mip");
        let a = model.add_var("a", VarKind::Binary, -1.0, 0.0, 1.0, &[]);
        let b = model.add_var("b", VarKind::Binary, -1.0, 0.0, 1.0, &[]);
        let row = model.add_constr("pick one", &[(a, 1.0), (b, 1.0)], ConstrSense::Less, 1.0);

        assert_eq!(model.optimize(), ModelStatus::Optimal);
        assert!((model.get_objective() + 1.0).abs() < 1e-9);
        assert_eq!(model.get_dual_list(&[row]), vec![0.0]);
    }
}
