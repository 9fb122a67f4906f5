//! End-to-end tests of the modelling pipeline and the flux fit on small
//! networks with known solutions.

use approx::assert_relative_eq;
use indexmap::IndexSet;
use nalgebra::DVector;

use mfars_core::emu::Emu;
use mfars_core::metabolic_model::model::{
    InputSubstrate, Labeling, Measurement, ParserResults,
};
use mfars_core::metabolic_model::reaction::{
    ChemicalEquation, Participant, Reaction, ReactionBuilder,
};
use mfars_core::modeller::Modeller;
use mfars_core::optimize::solver::FluxSolver;
use mfars_core::optimize::FitSolution;
use mfars_core::problem::Problem;

fn reaction(
    id: usize,
    name: &str,
    substrates: Vec<(&str, f64, &str)>,
    products: Vec<(&str, f64, &str)>,
) -> ReactionBuilder {
    let mut builder = ReactionBuilder::default();
    builder
        .id(id)
        .name(name.to_string())
        .chemical_equation(ChemicalEquation::new(
            substrates
                .into_iter()
                .map(|(m, c, map)| Participant::new(m, c, map))
                .collect(),
            products
                .into_iter()
                .map(|(m, c, map)| Participant::new(m, c, map))
                .collect(),
        ));
    builder
}

fn single_carbon_substrate(name: &str, heavy_fraction: f64) -> InputSubstrate {
    InputSubstrate {
        name: name.to_string(),
        labelings: vec![
            Labeling {
                pattern: vec![true],
                fraction: heavy_fraction,
            },
            Labeling {
                pattern: vec![false],
                fraction: 1. - heavy_fraction,
            },
        ],
    }
}

fn excluded(names: &[&str]) -> IndexSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn best_solution(solutions: &[FitSolution]) -> &FitSolution {
    solutions
        .iter()
        .min_by(|a, b| a.ssr.total_cmp(&b.ssr))
        .expect("no solutions returned")
}

/// Fully labeled input pushed through a pinned linear chain: the measured
/// MID is reproduced exactly and the fit lands on the pinned flux.
#[test]
fn linear_chain_reaches_zero_ssr() {
    let reactions: Vec<Reaction> = vec![
        reaction(0, "v_in", vec![("A", 1., "a")], vec![("B", 1., "a")])
            .basis(1.)
            .build()
            .unwrap(),
        reaction(1, "v_out", vec![("B", 1., "a")], vec![("C", 1., "a")])
            .lower_bound(0.)
            .upper_bound(10.)
            .build()
            .unwrap(),
    ];
    let measured = Emu::new("C", vec![true]);
    let parser_results = ParserResults {
        reactions,
        measured_isotopes: vec![measured.clone()],
        measurements: vec![Measurement {
            emu: measured,
            mid: vec![0., 1.],
            errors: vec![0.01, 0.01],
        }],
        excluded_metabolites: excluded(&["A", "C"]),
        input_substrates: vec![single_carbon_substrate("A", 1.)],
    };

    let problem = Modeller::new(parser_results).build().unwrap();
    assert_eq!(problem.nullity(), 1);

    let solutions = FluxSolver::new(&problem).solve().unwrap();
    let best = best_solution(&solutions);
    assert!(best.ssr < 1e-6, "SSR {} should vanish", best.ssr);

    let fluxes = problem.fluxes_from_free(&best.free_fluxes);
    assert_relative_eq!(fluxes[0], 1., epsilon = 1e-6);
    assert_relative_eq!(fluxes[1], 1., epsilon = 1e-6);
}

/// A metabolite pool fed by a labeled and an unlabeled source: the fit
/// recovers the mixing ratio hidden in the measured MID, and every restart
/// of the convex problem reaches the same minimum.
fn mixing_problem() -> Problem {
    let reactions: Vec<Reaction> = vec![
        reaction(0, "v_labeled", vec![("L", 1., "a")], vec![("M", 1., "a")])
            .lower_bound(0.)
            .upper_bound(10.)
            .build()
            .unwrap(),
        reaction(1, "v_unlabeled", vec![("U", 1., "a")], vec![("M", 1., "a")])
            .lower_bound(0.)
            .upper_bound(10.)
            .build()
            .unwrap(),
        reaction(2, "v_drain", vec![("M", 1., "a")], vec![("W", 1., "a")])
            .basis(2.)
            .build()
            .unwrap(),
    ];
    let measured = Emu::new("M", vec![true]);
    let parser_results = ParserResults {
        reactions,
        measured_isotopes: vec![measured.clone()],
        measurements: vec![Measurement {
            emu: measured,
            // three quarters of the pool comes from the labeled source
            mid: vec![0.25, 0.75],
            errors: vec![0., 0.],
        }],
        excluded_metabolites: excluded(&["L", "U", "W"]),
        input_substrates: vec![
            single_carbon_substrate("L", 1.),
            single_carbon_substrate("U", 0.),
        ],
    };
    Modeller::new(parser_results).build().unwrap()
}

#[test]
fn branch_ratio_is_recovered() {
    let problem = mixing_problem();
    assert_eq!(problem.nullity(), 2);

    let solutions = FluxSolver::new(&problem).solve().unwrap();
    let best = best_solution(&solutions);
    assert!(best.ssr < 1e-9, "SSR {} should vanish", best.ssr);

    let fluxes = problem.fluxes_from_free(&best.free_fluxes);
    assert_relative_eq!(fluxes[0], 1.5, epsilon = 1e-4);
    assert_relative_eq!(fluxes[1], 0.5, epsilon = 1e-4);
    assert_relative_eq!(fluxes[2], 2., epsilon = 1e-4);
}

#[test]
fn every_restart_reaches_the_global_minimum() {
    let problem = mixing_problem();
    let solutions = FluxSolver::new(&problem).solve().unwrap();
    assert_eq!(solutions.len(), 10);

    let best = best_solution(&solutions);
    for solution in &solutions {
        assert!(
            (solution.ssr - best.ssr).abs() < 1e-6,
            "restart with SSR {} missed the global minimum {}",
            solution.ssr,
            best.ssr
        );
    }
}

/// Condensation of a two-carbon and a one-carbon substrate: the product
/// MID is the convolution of the substrate MIDs.
#[test]
fn condensation_convolves_inputs() {
    let reactions: Vec<Reaction> = vec![
        reaction(
            0,
            "v_join",
            vec![("A", 1., "ab"), ("B", 1., "c")],
            vec![("C", 1., "abc")],
        )
        .basis(1.)
        .build()
        .unwrap(),
        reaction(1, "v_drain", vec![("C", 1., "abc")], vec![("D", 1., "abc")])
            .lower_bound(0.)
            .upper_bound(10.)
            .build()
            .unwrap(),
    ];
    let measured = Emu::new("C", vec![true, true, true]);
    let parser_results = ParserResults {
        reactions,
        measured_isotopes: vec![measured.clone()],
        measurements: vec![Measurement {
            emu: measured,
            mid: vec![0.125, 0.375, 0.375, 0.125],
            errors: vec![0.01; 4],
        }],
        excluded_metabolites: excluded(&["A", "B", "D"]),
        input_substrates: vec![
            InputSubstrate {
                name: "A".to_string(),
                labelings: vec![
                    Labeling {
                        pattern: vec![true, true],
                        fraction: 0.25,
                    },
                    Labeling {
                        pattern: vec![true, false],
                        fraction: 0.25,
                    },
                    Labeling {
                        pattern: vec![false, true],
                        fraction: 0.25,
                    },
                    Labeling {
                        pattern: vec![false, false],
                        fraction: 0.25,
                    },
                ],
            },
            InputSubstrate {
                name: "B".to_string(),
                labelings: vec![
                    Labeling {
                        pattern: vec![true],
                        fraction: 0.5,
                    },
                    Labeling {
                        pattern: vec![false],
                        fraction: 0.5,
                    },
                ],
            },
        ],
    };

    let problem = Modeller::new(parser_results).build().unwrap();
    let solutions = FluxSolver::new(&problem).solve().unwrap();
    let best = best_solution(&solutions);
    assert!(best.ssr < 1e-6, "SSR {} should vanish", best.ssr);
}

/// Any free-flux vector inside the fitted box expands to fluxes inside the
/// flux-variability bounds of every reaction.
#[test]
fn free_fluxes_respect_reaction_bounds() {
    let reactions: Vec<Reaction> = vec![
        reaction(0, "v_in", vec![("A", 1., "a")], vec![("B", 1., "a")])
            .lower_bound(0.)
            .upper_bound(10.)
            .build()
            .unwrap(),
        reaction(1, "v_out", vec![("B", 1., "a")], vec![("C", 1., "a")])
            .lower_bound(0.)
            .upper_bound(10.)
            .build()
            .unwrap(),
    ];
    let measured = Emu::new("C", vec![true]);
    let parser_results = ParserResults {
        reactions,
        measured_isotopes: vec![measured.clone()],
        measurements: vec![Measurement {
            emu: measured,
            mid: vec![0.3, 0.7],
            errors: vec![0.01, 0.01],
        }],
        excluded_metabolites: excluded(&["A", "C"]),
        input_substrates: vec![single_carbon_substrate("A", 0.7)],
    };
    let problem = Modeller::new(parser_results).build().unwrap();

    let (lower, upper) = problem.free_flux_bounds();
    for fraction in [0., 0.25, 0.5, 0.75, 1.] {
        let free = DVector::from_iterator(
            problem.nullity(),
            (0..problem.nullity()).map(|i| lower[i] + fraction * (upper[i] - lower[i])),
        );
        let fluxes = problem.fluxes_from_free(&free);
        for reaction in &problem.reactions {
            let flux = fluxes[reaction.id];
            assert!(
                flux >= reaction.computed_lower_bound - 1e-6
                    && flux <= reaction.computed_upper_bound + 1e-6,
                "flux {} of {} escapes [{}, {}]",
                flux,
                reaction.name,
                reaction.computed_lower_bound,
                reaction.computed_upper_bound
            );
        }
    }
}

/// Doubling the residual weights (1 + error) quarters the SSR at a fixed
/// flux.
#[test]
fn residual_weighting_scales_the_ssr() {
    let build = |error: f64| -> Problem {
        let reactions: Vec<Reaction> = vec![
            reaction(0, "v_in", vec![("A", 1., "a")], vec![("B", 1., "a")])
                .basis(1.)
                .build()
                .unwrap(),
            reaction(1, "v_out", vec![("B", 1., "a")], vec![("C", 1., "a")])
                .lower_bound(0.)
                .upper_bound(10.)
                .build()
                .unwrap(),
        ];
        let measured = Emu::new("C", vec![true]);
        let parser_results = ParserResults {
            reactions,
            measured_isotopes: vec![measured.clone()],
            measurements: vec![Measurement {
                emu: measured,
                // deliberately off the simulated [0, 1]
                mid: vec![0.5, 0.5],
                errors: vec![error, error],
            }],
            excluded_metabolites: excluded(&["A", "C"]),
            input_substrates: vec![single_carbon_substrate("A", 1.)],
        };
        Modeller::new(parser_results).build().unwrap()
    };

    // weights 1 + error of 2 and 4: residuals halve, the SSR quarters
    let narrow = build(1.);
    let wide = build(3.);
    let narrow_best = FluxSolver::new(&narrow).solve().unwrap();
    let wide_best = FluxSolver::new(&wide).solve().unwrap();
    let narrow_ssr = best_solution(&narrow_best).ssr;
    let wide_ssr = best_solution(&wide_best).ssr;

    assert_relative_eq!(narrow_ssr, 0.125, epsilon = 1e-6);
    assert_relative_eq!(wide_ssr, narrow_ssr / 4., epsilon = 1e-6);
}
