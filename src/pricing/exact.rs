use std::sync::Arc;

use petgraph::graph::NodeIndex;

use crate::error::{Error, Result};
use crate::instance::{EdgeData, MulticastPackingInstance, NetworkGraph, Tree};
use crate::pricing::steiner::shortest_paths;
use crate::pricing::{PricingOracle, Prices};
use crate::solvers::{ConstrSense, LPEnv, LPModel, ModelStatus, ObjSense, VarId, VarKind};
use crate::ui::{UISender, UIUserMessage};

struct DirectedArc {
    tail: NodeIndex,
    head: NodeIndex,
    /// dense index of the underlying undirected edge
    edge: usize,
    selection: VarId,
}

struct RequestModel {
    model: Box<dyn LPModel>,
    arcs: Vec<DirectedArc>,
    /// per recipient, flow variables parallel to `arcs`
    flows: Vec<Vec<VarId>>,
}

/// Exact Steiner tree oracle based on a multi commodity flow formulation.
///
/// Every request owns one binary program, built once: arc selection variables,
/// a unit flow from the source to every recipient, and flow only on selected
/// arcs. Optionally the delay along each recipient's flow is bounded by the
/// instance's delay budget. A pricing call only replaces the objective.
pub struct ExactOracle {
    instance: Arc<MulticastPackingInstance>,
    models: Vec<RequestModel>,
    /// per edge length used to cut the flow support down to a tree
    lengths: Vec<f64>,
    ui: UISender,
    name: &'static str,
}

impl ExactOracle {
    pub fn new<E: LPEnv>(instance: Arc<MulticastPackingInstance>, env: &mut E, ui: UISender) -> Self {
        let models = (0..instance.num_requests())
            .map(|i| build_request_model(&instance, i, env, None))
            .collect();

        let lengths = vec![1.0; instance.num_edges()];
        ExactOracle {
            instance,
            models,
            lengths,
            ui,
            name: "exact steiner (mcf)",
        }
    }

    /// Fails if the instance has no delay budget or some edge has no delay
    pub fn with_delay<E: LPEnv>(
        instance: Arc<MulticastPackingInstance>,
        env: &mut E,
        ui: UISender,
    ) -> Result<Self> {
        let budget = instance
            .delay_budget()
            .ok_or_else(|| Error::InvalidInstance("delay constrained pricing needs a delay budget".to_string()))?;
        let delays = instance
            .edges()
            .iter()
            .map(|e| {
                instance
                    .edge_data(e)
                    .and_then(|data| data.delay)
                    .ok_or_else(|| Error::InvalidInstance(format!("edge {e} has no delay")))
            })
            .collect::<Result<Vec<f64>>>()?;

        let models = (0..instance.num_requests())
            .map(|i| build_request_model(&instance, i, env, Some((delays.as_slice(), budget))))
            .collect();

        Ok(ExactOracle {
            instance,
            models,
            lengths: delays,
            ui,
            name: "exact steiner (mcf, delay)",
        })
    }
}

fn build_request_model<E: LPEnv>(
    instance: &MulticastPackingInstance,
    i: usize,
    env: &mut E,
    delay: Option<(&[f64], f64)>,
) -> RequestModel {
    let request = instance.request(i);
    let mut model = env.new_model(&format!("Steiner Tree IP (MCF) for Request {i}"));

    let mut arcs = Vec::with_capacity(2 * instance.num_edges());
    let mut recipient_flows = Vec::with_capacity(request.recipients.len());
    for (edge, e) in instance.edges().iter().enumerate() {
        for (tail, head) in [(e.0, e.1), (e.1, e.0)] {
            let selection = model.add_var(
                &format!("({}, {}) selection", tail.index(), head.index()),
                VarKind::Binary,
                0.0,
                0.0,
                1.0,
                &[],
            );
            arcs.push(DirectedArc { tail, head, edge, selection });
        }
    }

    for r in request.recipients.iter().filter(|r| **r != request.source) {
        let flows: Vec<VarId> = arcs
            .iter()
            .map(|a| {
                model.add_var(
                    &format!("({}, {}) flow to {}", a.tail.index(), a.head.index(), r.index()),
                    VarKind::Binary,
                    0.0,
                    0.0,
                    1.0,
                    &[],
                )
            })
            .collect();

        for v in instance.graph().node_indices() {
            let expr: Vec<(VarId, f64)> = arcs
                .iter()
                .zip(&flows)
                .filter_map(|(a, f)| {
                    if a.head == v {
                        Some((*f, 1.0))
                    } else if a.tail == v {
                        Some((*f, -1.0))
                    } else {
                        None
                    }
                })
                .collect();
            let netflow = if v == request.source {
                -1.0
            } else if v == *r {
                1.0
            } else {
                0.0
            };
            model.add_constr(
                &format!("{}-flow conservation for {}", r.index(), v.index()),
                &expr,
                ConstrSense::Equal,
                netflow,
            );
        }

        for (a, f) in arcs.iter().zip(&flows) {
            model.add_constr(
                &format!("({}, {}) availability for {}-flow", a.tail.index(), a.head.index(), r.index()),
                &[(*f, 1.0), (a.selection, -1.0)],
                ConstrSense::Less,
                0.0,
            );
        }

        if let Some((delays, budget)) = delay {
            let expr: Vec<(VarId, f64)> = arcs.iter().zip(&flows).map(|(a, f)| (*f, delays[a.edge])).collect();
            model.add_constr(&format!("Delay constraint for {}-flow", r.index()), &expr, ConstrSense::Less, budget);
        }

        recipient_flows.push(flows);
    }

    RequestModel {
        model,
        arcs,
        flows: recipient_flows,
    }
}

/// Shortest path tree from the source inside the edges that carry flow.
///
/// Every recipient's own flow path lies in that support, so its tree path is
/// no longer under `lengths` and never costs more under non-negative prices.
fn flow_support_tree(
    instance: &MulticastPackingInstance,
    request: usize,
    carries_flow: &[bool],
    lengths: &[f64],
) -> Result<Tree> {
    let request = instance.request(request);
    let num_nodes = instance.graph().node_count();

    let mut support = NetworkGraph::with_capacity(num_nodes, carries_flow.len());
    for _ in 0..num_nodes {
        support.add_node(());
    }
    let mut support_lengths = Vec::new();
    for (k, e) in instance.edges().iter().enumerate().filter(|(k, _)| carries_flow[*k]) {
        support.add_edge(e.0, e.1, EdgeData::default());
        support_lengths.push(((e.0.index(), e.1.index()), lengths[k]));
    }

    let paths = shortest_paths(&support, &Prices::from_pairs(support_lengths), request.source)?;
    let mut edges = Vec::new();
    for r in request.recipients.iter().filter(|r| **r != request.source) {
        if !paths.dist(*r).is_finite() {
            return Err(Error::UnreachableTerminal {
                terminal: r.index(),
                source_node: request.source.index(),
            });
        }
        edges.extend(paths.path_to(*r));
    }
    Ok(Tree::new(edges))
}

impl PricingOracle for ExactOracle {
    fn name(&self) -> &str {
        self.name
    }

    fn num_requests(&self) -> usize {
        self.instance.num_requests()
    }

    fn generate_tree(&mut self, request: usize, prices: &Prices) -> Result<Tree> {
        let request_model = &mut self.models[request];

        let objective = request_model
            .arcs
            .iter()
            .map(|a| Ok((a.selection, prices.price(a.tail, a.head)?)))
            .collect::<Result<Vec<_>>>()?;
        request_model.model.set_objective(&objective, ObjSense::Minimize);

        let status = request_model.model.optimize();
        if status != ModelStatus::Optimal {
            self.ui.send(UIUserMessage::PricingFailure {
                model: request_model.model.name().to_string(),
                status: status.to_string(),
            });
            return Ok(Tree::empty());
        }

        // zero priced arcs may be selected without carrying flow, so read the flows
        let mut carries_flow = vec![false; self.instance.num_edges()];
        for flows in &request_model.flows {
            let values = request_model.model.get_x_list(flows);
            for (a, x) in request_model.arcs.iter().zip(values) {
                if x > 0.5 {
                    carries_flow[a.edge] = true;
                }
            }
        }

        flow_support_tree(&self.instance, request, &carries_flow, &self.lengths)
    }
}
