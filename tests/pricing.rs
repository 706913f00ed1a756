#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use multicast_packing::instance::{Edge, EdgeData, MulticastPackingInstance, MulticastRequest, Tree};
    use multicast_packing::pricing::{ApproxOracle, ExactOracle, PricingKind, PricingOracle, Prices};
    use multicast_packing::solvers::highs::HighsEnv;
    use multicast_packing::solvers::LPEnv;
    use multicast_packing::{Error, UI};
    use petgraph::graph::NodeIndex;
    use petgraph::visit::EdgeRef;

    const A: usize = 0;
    const B: usize = 1;
    const C: usize = 2;
    const D: usize = 3;

    fn path(nodes: &[usize]) -> Tree {
        Tree::new(nodes.windows(2).map(|w| Edge::new(NodeIndex::new(w[0]), NodeIndex::new(w[1]))))
    }

    fn square(requests: Vec<MulticastRequest>) -> Arc<MulticastPackingInstance> {
        Arc::new(MulticastPackingInstance::from_edge_list(4, &[(A, B), (B, C), (C, D), (D, A)], requests).unwrap())
    }

    fn delayed_square(budget: f64) -> Arc<MulticastPackingInstance> {
        let edge = |u, v, delay| (u, v, EdgeData { weight: 1.0, delay: Some(delay) });
        Arc::new(
            MulticastPackingInstance::from_weighted_edge_list(
                4,
                &[edge(A, B, 1.0), edge(B, C, 1.0), edge(C, D, 5.0), edge(D, A, 5.0)],
                vec![MulticastRequest::from_indices(A, &[C])],
            )
            .unwrap()
            .with_delay_budget(budget),
        )
    }

    fn is_two_edge_path_a_to_c(tree: &Tree) -> bool {
        *tree == path(&[A, B, C]) || *tree == path(&[A, D, C])
    }

    #[test]
    fn both_oracles_route_around_the_square() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let instance = square(vec![MulticastRequest::from_indices(A, &[C])]);

        let mut approx = ApproxOracle::new(instance.clone());
        let mut exact = ExactOracle::new(instance.clone(), &mut env, ui.get_sender());

        for prices in [Prices::Uniform(1.0), Prices::from_pairs([((A, B), 0.5), ((B, C), 0.5), ((C, D), 0.0), ((D, A), 0.0)])] {
            let t1 = approx.generate_tree(0, &prices).unwrap();
            let t2 = exact.generate_tree(0, &prices).unwrap();
            assert!(is_two_edge_path_a_to_c(&t1), "2-approx returned {t1}");
            assert!(is_two_edge_path_a_to_c(&t2), "exact returned {t2}");
            assert_eq!(t1.len(), 2);
            assert_eq!(t2.len(), 2);
        }

        let cheap_detour = Prices::from_pairs([((A, B), 3.0), ((B, C), 3.0), ((C, D), 1.0), ((D, A), 1.0)]);
        assert_eq!(approx.generate_tree(0, &cheap_detour).unwrap(), path(&[A, D, C]));
        assert_eq!(exact.generate_tree(0, &cheap_detour).unwrap(), path(&[A, D, C]));
    }

    #[test]
    fn approx_oracle_leaves_graph_weights_alone() {
        let weights = [(A, B, 1.5), (B, C, 2.5), (C, D, 3.5), (D, A, 4.5), (A, C, 7.0)];
        let edges: Vec<_> = weights.iter().map(|(u, v, w)| (*u, *v, EdgeData { weight: *w, delay: None })).collect();
        let instance = Arc::new(
            MulticastPackingInstance::from_weighted_edge_list(4, &edges, vec![MulticastRequest::from_indices(A, &[C, D])]).unwrap(),
        );
        let before: Vec<f64> = instance.graph().edge_references().map(|e| e.weight().weight).collect();

        let mut approx = ApproxOracle::new(instance.clone());
        let tree = approx.generate_tree(0, &Prices::Uniform(0.25)).unwrap();
        assert!(!tree.is_empty());
        assert!(approx.generate_tree(0, &Prices::from_pairs([((A, B), 1.0)])).is_err());

        let after: Vec<f64> = instance.graph().edge_references().map(|e| e.weight().weight).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn prices_given_in_one_orientation_serve_both() {
        let instance = square(vec![MulticastRequest::from_indices(C, &[A])]);
        let mut approx = ApproxOracle::new(instance);

        // every pair given against the direction the path is walked in
        let prices = Prices::from_pairs([((B, A), 1.0), ((C, B), 1.0), ((D, C), 5.0), ((A, D), 5.0)]);
        assert_eq!(approx.generate_tree(0, &prices).unwrap(), path(&[C, B, A]));
    }

    #[test]
    fn missing_price_aborts_the_pricing_call() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let instance = square(vec![MulticastRequest::from_indices(A, &[C])]);
        let prices = Prices::from_pairs([((A, B), 1.0), ((B, C), 1.0)]);

        let mut approx = ApproxOracle::new(instance.clone());
        assert!(matches!(approx.generate_tree(0, &prices), Err(Error::MissingPrice(_, _))));

        let mut exact = ExactOracle::new(instance, &mut env, ui.get_sender());
        assert!(matches!(exact.generate_tree(0, &prices), Err(Error::MissingPrice(_, _))));
    }

    #[test]
    fn negative_prices_are_rejected_by_the_heuristic() {
        let instance = square(vec![MulticastRequest::from_indices(A, &[C])]);
        let mut approx = ApproxOracle::new(instance);
        assert!(matches!(approx.generate_tree(0, &Prices::Uniform(-1.0)), Err(Error::NegativePrice { .. })));
    }

    #[test]
    fn single_node_group_is_served_by_the_empty_tree() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let instance = square(vec![MulticastRequest::from_indices(B, &[B])]);

        let mut approx = ApproxOracle::new(instance.clone());
        let mut exact = ExactOracle::new(instance, &mut env, ui.get_sender());
        assert!(approx.generate_tree(0, &Prices::Uniform(1.0)).unwrap().is_empty());
        assert!(exact.generate_tree(0, &Prices::Uniform(1.0)).unwrap().is_empty());
    }

    #[test]
    fn delay_budget_forces_the_expensive_path() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let prices = Prices::from_pairs([((A, B), 10.0), ((B, C), 10.0), ((C, D), 1.0), ((D, A), 1.0)]);

        let mut unconstrained = ExactOracle::new(delayed_square(3.0), &mut env, ui.get_sender());
        assert_eq!(unconstrained.generate_tree(0, &prices).unwrap(), path(&[A, D, C]));

        let mut constrained = ExactOracle::with_delay(delayed_square(3.0), &mut env, ui.get_sender()).unwrap();
        assert_eq!(constrained.generate_tree(0, &prices).unwrap(), path(&[A, B, C]));
    }

    #[test]
    fn free_slow_edges_stay_out_of_the_delay_tree() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let instance = delayed_square(3.0);
        // the slow side costs nothing, so selecting its arcs is free
        let prices = Prices::from_pairs([((A, B), 1.0), ((B, C), 1.0), ((C, D), 0.0), ((D, A), 0.0)]);

        let mut oracle = ExactOracle::with_delay(instance.clone(), &mut env, ui.get_sender()).unwrap();
        let tree = oracle.generate_tree(0, &prices).unwrap();
        assert_eq!(tree, path(&[A, B, C]));

        let delay: f64 = tree.edges().iter().map(|e| instance.edge_data(e).unwrap().delay.unwrap()).sum();
        assert!(delay <= 3.0, "tree {tree} has delay {delay}");
    }

    #[test]
    fn infeasible_pricing_degrades_to_the_empty_tree() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);
        let prices = Prices::Uniform(1.0);

        let mut oracle = ExactOracle::with_delay(delayed_square(0.5), &mut env, ui.get_sender()).unwrap();
        assert_eq!(oracle.generate_tree(0, &prices), Ok(Tree::empty()));
    }

    #[test]
    fn delay_oracle_needs_budget_and_delays() {
        let ui = UI::new();
        let mut env = HighsEnv::new_with_seed(0);

        let no_delays = square(vec![MulticastRequest::from_indices(A, &[C])]);
        let no_delays = Arc::new((*no_delays).clone().with_delay_budget(3.0));
        assert!(matches!(
            PricingKind::ExactWithDelay.build(&no_delays, &mut env, &ui.get_sender()),
            Err(Error::InvalidInstance(_))
        ));

        let no_budget = square(vec![MulticastRequest::from_indices(A, &[C])]);
        assert!(matches!(
            PricingKind::ExactWithDelay.build(&no_budget, &mut env, &ui.get_sender()),
            Err(Error::InvalidInstance(_))
        ));

        let oracle = PricingKind::ExactWithDelay.build(&delayed_square(3.0), &mut env, &ui.get_sender()).unwrap();
        assert_eq!(oracle.num_requests(), 1);
    }
}
