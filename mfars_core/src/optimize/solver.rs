//! Multi-start flux-fitting driver
//!
//! One [`FluxSolver`] is constructed per [`Problem`] and holds no global
//! state. Every restart samples a fresh initial point uniformly inside the
//! free-flux box and runs the bounded optimizer to its stopping condition.
//! A restart that fails to simulate records an infinite SSR and the suite
//! moves on; only a fully failed suite is an error.

use log::{info, warn};
use nalgebra::DVector;
use rand::Rng;
use thiserror::Error;

use crate::configuration::CONFIGURATION;
use crate::emu::simulator::{simulate_mids, SimulationError};
use crate::optimize::levenberg::{LmOptimizer, LmOptions, ResidualFunction};
use crate::optimize::FitSolution;
use crate::problem::Problem;

/// Errors from the fitting stage
#[derive(Error, Debug, Clone)]
pub enum FitError {
    #[error("every restart of the flux fit failed")]
    AllRestartsFailed,
}

/// Weighted difference between simulated and measured MIDs
struct FluxResidual<'a> {
    problem: &'a Problem,
}

impl ResidualFunction for FluxResidual<'_> {
    fn residual_count(&self) -> usize {
        self.problem.measurements_count
    }

    fn evaluate(
        &self,
        x: &DVector<f64>,
        residuals: &mut DVector<f64>,
    ) -> Result<(), SimulationError> {
        let fluxes = self.problem.fluxes_from_free(x);
        let simulated = simulate_mids(
            &fluxes,
            &self.problem.networks,
            &self.problem.input_mids,
            &self.problem.measured_isotopes,
        )?;
        let mut offset = 0;
        for (measurement, mid) in self.problem.measurements.iter().zip(simulated.iter()) {
            for (mass_shift, &value) in mid.iter().enumerate() {
                residuals[offset] =
                    (value - measurement.mid[mass_shift]) / (1. + measurement.errors[mass_shift]);
                offset += 1;
            }
        }
        Ok(())
    }
}

/// Multi-start bounded fit of the free fluxes of one [`Problem`]
pub struct FluxSolver<'a> {
    problem: &'a Problem,
    lower_bounds: DVector<f64>,
    upper_bounds: DVector<f64>,
    restart_total: usize,
}

impl<'a> FluxSolver<'a> {
    pub fn new(problem: &'a Problem) -> Self {
        let (lower_bounds, upper_bounds) = problem.free_flux_bounds();
        let restart_total = CONFIGURATION.read().unwrap().restart_total;
        FluxSolver {
            problem,
            lower_bounds,
            upper_bounds,
            restart_total,
        }
    }

    /// Run every restart and return all solutions; the caller selects the
    /// best by SSR
    pub fn solve(&self) -> Result<Vec<FitSolution>, FitError> {
        let residual_function = FluxResidual {
            problem: self.problem,
        };
        let mut optimizer = LmOptimizer::new(
            &residual_function,
            self.lower_bounds.clone(),
            self.upper_bounds.clone(),
            LmOptions::default(),
        );
        let mut rng = rand::thread_rng();
        let nullity = self.problem.nullity();
        let mut solutions = Vec::with_capacity(self.restart_total);
        let mut failures = 0;

        for restart in 0..self.restart_total {
            let initial = self.sample_initial_point(&mut rng, nullity);
            info!(
                "restart {}/{} from {:?}",
                restart + 1,
                self.restart_total,
                initial.as_slice()
            );
            match optimizer.optimize(initial) {
                Ok(report) => {
                    info!(
                        "restart {}/{} finished with SSR {:.6e} after {} iterations",
                        restart + 1,
                        self.restart_total,
                        report.ssr,
                        report.iterations
                    );
                    solutions.push(FitSolution {
                        free_fluxes: report.x,
                        ssr: report.ssr,
                    });
                }
                Err(error) => {
                    warn!("restart {}/{} failed: {}", restart + 1, self.restart_total, error);
                    solutions.push(FitSolution {
                        free_fluxes: DVector::zeros(nullity),
                        ssr: f64::INFINITY,
                    });
                    failures += 1;
                }
            }
        }

        if failures == self.restart_total {
            return Err(FitError::AllRestartsFailed);
        }
        Ok(solutions)
    }

    fn sample_initial_point(&self, rng: &mut impl Rng, nullity: usize) -> DVector<f64> {
        DVector::from_iterator(
            nullity,
            (0..nullity).map(|index| {
                let lower = self.lower_bounds[index];
                let upper = self.upper_bounds[index];
                if upper > lower {
                    rng.gen_range(lower..=upper)
                } else {
                    lower
                }
            }),
        )
    }
}
