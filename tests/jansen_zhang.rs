#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use multicast_packing::instance::{MulticastPackingInstance, MulticastRequest};
    use multicast_packing::pricing::PricingKind;
    use multicast_packing::solvers::highs::HighsEnv;
    use multicast_packing::solvers::LPEnv;
    use multicast_packing::strategies::JansenZhang;
    use multicast_packing::{MulticastPackingSolver, Scale, SolverSettings, StopFlags, UI};

    const MAX_ITERATIONS: i64 = 5000;

    fn crossing_requests() -> Arc<MulticastPackingInstance> {
        Arc::new(
            MulticastPackingInstance::from_edge_list(
                4,
                &[(0, 1), (1, 2), (2, 3), (3, 0)],
                vec![MulticastRequest::from_indices(0, &[2]), MulticastRequest::from_indices(1, &[3])],
            )
            .unwrap(),
        )
    }

    fn solver(ui: &UI) -> MulticastPackingSolver<JansenZhang> {
        let mut env = HighsEnv::new_with_seed(0);
        let settings = SolverSettings {
            tolerance: 0.3,
            max_iterations: MAX_ITERATIONS,
            sigma0: 1.0,
        };
        let strategy = JansenZhang::new();
        MulticastPackingSolver::new(crossing_requests(), strategy, PricingKind::TwoApprox, &mut env, settings, ui.get_sender())
            .unwrap()
    }

    #[test]
    fn potential_reduction_reaches_the_tolerance() {
        let ui = UI::new();
        let mut solver = solver(&ui);

        // scale each solution of the history was priced with
        let mut scales: Vec<Scale> = Vec::new();
        while solver.stop_flags().is_empty() {
            scales.push(solver.scale());
            solver.perform_iteration().unwrap();
        }

        let flags = solver.stop_flags();
        assert!(flags.contains(StopFlags::TOL_MET), "stopped with {flags}");
        assert!(!flags.contains(StopFlags::MAXITER));

        // sigma 1 -> 1/2 at the end of the bootstrap, -> 1/4 once more, then below the tolerance
        let phases = solver.strategy().phases().to_vec();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].iteration, 0);
        assert_eq!(solver.strategy().sigma(), 0.25);
        assert!(phases[1].lamb <= phases[0].lamb);

        let x = solver.current_solution().unwrap();
        let lamb = solver.lamb(x).unwrap();
        assert!(lamb >= 1.0 - 1e-6, "congestion {lamb} below the optimum");
        assert!(lamb < 1.5, "congestion {lamb} not reduced");
        for request in solver.solution(x).requests() {
            assert!((request.values().sum::<f64>() - 1.0).abs() < 1e-9);
        }

        // within every phase spanning more than one step, the potential goes down
        let history = solver.history().to_vec();
        let mut phase_start = 0;
        while phase_start < history.len() {
            let t = scales[phase_start];
            let phase_end = (phase_start..history.len()).find(|j| scales[*j] != t).unwrap_or(history.len());
            if phase_end - phase_start > 2 {
                let mut decreases = 0;
                for j in phase_start..phase_end - 1 {
                    if solver.phi(history[j + 1], t).unwrap() < solver.phi(history[j], t).unwrap() {
                        decreases += 1;
                    }
                }
                assert!(decreases > 0, "potential never decreased at scale {}", t.0);
            }
            phase_start = phase_end;
        }
    }

    #[test]
    fn entropic_prices_are_a_distribution() {
        let ui = UI::new();
        let mut solver = solver(&ui);

        for _ in 0..25 {
            let t = solver.scale();
            solver.perform_iteration().unwrap();
            let x = solver.current_solution().unwrap();

            let p = solver.p(x, t).unwrap();
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(p.iter().all(|v| *v > 0.0));

            let theta = solver.theta(x, t).unwrap();
            let lamb = solver.lamb(x).unwrap();
            assert!(theta > lamb);
            assert!(theta <= lamb / (1.0 - t.0) + 1e-9);

            let tolerance = solver.tolerance(x, t).unwrap();
            assert!(tolerance <= 1.0);
        }
    }
}
