//! Bounded Levenberg-Marquardt minimization of a residual vector
//!
//! The Jacobian is numerical: forward differences with a fixed step,
//! flipped to a backward step at the upper bound so probes stay inside the
//! box. Steps are damped normal-equation solves, clamped into the bounds
//! before evaluation. The optimizer owns its workspace and can be
//! restarted from a new initial point without reconstruction.

use nalgebra::{DMatrix, DVector};

use crate::configuration::CONFIGURATION;
use crate::emu::simulator::SimulationError;

const LAMBDA_LIMIT: f64 = 1e12;

/// Interface for residual vectors minimized in the least-squares sense
pub trait ResidualFunction {
    /// Length of the residual vector
    fn residual_count(&self) -> usize;
    /// Evaluate the residuals at `x` into `residuals`
    fn evaluate(
        &self,
        x: &DVector<f64>,
        residuals: &mut DVector<f64>,
    ) -> Result<(), SimulationError>;
}

/// Configuration of [`LmOptimizer`]
pub struct LmOptions {
    /// Forward-difference step for the numerical Jacobian
    pub jacobian_step: f64,
    /// Stop once the infinity norm of an accepted step falls below this
    pub epsilon_step: f64,
    /// Iteration cap
    pub max_iterations: usize,
    /// Starting damping factor
    pub initial_lambda: f64,
    /// Factor applied to the damping on rejection, divided out on success
    pub lambda_scale: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        let configuration = CONFIGURATION.read().unwrap();
        LmOptions {
            jacobian_step: configuration.jacobian_step,
            epsilon_step: configuration.epsilon_step,
            max_iterations: configuration.max_optimizer_iterations,
            initial_lambda: 1e-3,
            lambda_scale: 10.,
        }
    }
}

/// Outcome of one optimizer run
#[derive(Debug, Clone)]
pub struct LmReport {
    /// Minimizer found, inside the bounds
    pub x: DVector<f64>,
    /// Sum of squared residuals at `x`
    pub ssr: f64,
    /// Outer iterations spent
    pub iterations: usize,
}

/// Bounded Levenberg-Marquardt optimizer over a [`ResidualFunction`]
pub struct LmOptimizer<'a, F: ResidualFunction> {
    function: &'a F,
    options: LmOptions,
    lower: DVector<f64>,
    upper: DVector<f64>,
    residuals: DVector<f64>,
    trial_residuals: DVector<f64>,
    step_residuals: DVector<f64>,
    jacobian: DMatrix<f64>,
}

impl<'a, F: ResidualFunction> LmOptimizer<'a, F> {
    pub fn new(
        function: &'a F,
        lower: DVector<f64>,
        upper: DVector<f64>,
        options: LmOptions,
    ) -> Self {
        let residual_total = function.residual_count();
        let dimension = lower.len();
        LmOptimizer {
            function,
            options,
            lower,
            upper,
            residuals: DVector::zeros(residual_total),
            trial_residuals: DVector::zeros(residual_total),
            step_residuals: DVector::zeros(residual_total),
            jacobian: DMatrix::zeros(residual_total, dimension),
        }
    }

    /// Minimize from a fresh initial point, reusing the workspace
    pub fn optimize(&mut self, initial: DVector<f64>) -> Result<LmReport, SimulationError> {
        let mut x = self.clamp(initial);
        self.function.evaluate(&x, &mut self.residuals)?;
        let mut ssr = self.residuals.norm_squared();
        let mut lambda = self.options.initial_lambda;
        let mut iterations = 0;

        while iterations < self.options.max_iterations {
            iterations += 1;
            self.numerical_jacobian(&x)?;
            let gradient = self.jacobian.transpose() * &self.residuals;
            let hessian = self.jacobian.transpose() * &self.jacobian;

            let mut accepted = false;
            let mut step_norm = 0.;
            while lambda <= LAMBDA_LIMIT {
                let mut damped = hessian.clone();
                for index in 0..damped.nrows() {
                    damped[(index, index)] += lambda * damped[(index, index)].max(1e-12);
                }
                if let Some(cholesky) = damped.cholesky() {
                    let descent = -&gradient;
                    let delta = cholesky.solve(&descent);
                    let trial = self.clamp(&x + &delta);
                    let step = &trial - &x;
                    self.function.evaluate(&trial, &mut self.trial_residuals)?;
                    let trial_ssr = self.trial_residuals.norm_squared();
                    if trial_ssr < ssr {
                        x = trial;
                        self.residuals.copy_from(&self.trial_residuals);
                        ssr = trial_ssr;
                        lambda = (lambda / self.options.lambda_scale).max(1e-12);
                        step_norm = step.amax();
                        accepted = true;
                        break;
                    }
                }
                lambda *= self.options.lambda_scale;
            }
            if !accepted || step_norm < self.options.epsilon_step {
                break;
            }
        }

        Ok(LmReport { x, ssr, iterations })
    }

    fn numerical_jacobian(&mut self, x: &DVector<f64>) -> Result<(), SimulationError> {
        let step = self.options.jacobian_step;
        let mut probe = x.clone();
        for column in 0..x.len() {
            let mut h = step;
            if x[column] + h > self.upper[column] {
                h = -step;
            }
            if x[column] + h < self.lower[column] {
                // the bounds pin this variable tighter than one step
                self.jacobian.column_mut(column).fill(0.);
                continue;
            }
            probe[column] = x[column] + h;
            self.function.evaluate(&probe, &mut self.step_residuals)?;
            probe[column] = x[column];
            for row in 0..self.step_residuals.len() {
                self.jacobian[(row, column)] =
                    (self.step_residuals[row] - self.residuals[row]) / h;
            }
        }
        Ok(())
    }

    fn clamp(&self, x: DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            x.len(),
            x.iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .map(|(&value, (&lower, &upper))| value.max(lower).min(upper)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Affine;

    // r(x) = (x0 - 3, x1 + 1)
    impl ResidualFunction for Affine {
        fn residual_count(&self) -> usize {
            2
        }
        fn evaluate(
            &self,
            x: &DVector<f64>,
            residuals: &mut DVector<f64>,
        ) -> Result<(), SimulationError> {
            residuals[0] = x[0] - 3.;
            residuals[1] = x[1] + 1.;
            Ok(())
        }
    }

    struct Rosenbrock;

    // r(x) = (1 - x0, 10 * (x1 - x0^2)), minimum at (1, 1)
    impl ResidualFunction for Rosenbrock {
        fn residual_count(&self) -> usize {
            2
        }
        fn evaluate(
            &self,
            x: &DVector<f64>,
            residuals: &mut DVector<f64>,
        ) -> Result<(), SimulationError> {
            residuals[0] = 1. - x[0];
            residuals[1] = 10. * (x[1] - x[0] * x[0]);
            Ok(())
        }
    }

    fn wide_bounds(dimension: usize) -> (DVector<f64>, DVector<f64>) {
        (
            DVector::from_element(dimension, -10.),
            DVector::from_element(dimension, 10.),
        )
    }

    #[test]
    fn affine_converges_to_root() {
        let function = Affine;
        let (lower, upper) = wide_bounds(2);
        let mut optimizer = LmOptimizer::new(&function, lower, upper, LmOptions::default());
        let report = optimizer
            .optimize(DVector::from_vec(vec![8., -7.]))
            .unwrap();
        assert_relative_eq!(report.x[0], 3., epsilon = 1e-6);
        assert_relative_eq!(report.x[1], -1., epsilon = 1e-6);
        assert!(report.ssr < 1e-10);
    }

    #[test]
    fn bound_becomes_active() {
        let function = Affine;
        let lower = DVector::from_vec(vec![-10., -10.]);
        let upper = DVector::from_vec(vec![2., 10.]);
        let mut optimizer = LmOptimizer::new(&function, lower, upper, LmOptions::default());
        let report = optimizer.optimize(DVector::from_vec(vec![0., 0.])).unwrap();
        // x0 stops at its upper bound, leaving a residual of one
        assert_relative_eq!(report.x[0], 2., epsilon = 1e-6);
        assert_relative_eq!(report.ssr, 1., epsilon = 1e-6);
    }

    #[test]
    fn rosenbrock_valley_is_followed() {
        let function = Rosenbrock;
        let (lower, upper) = wide_bounds(2);
        let mut optimizer = LmOptimizer::new(&function, lower, upper, LmOptions::default());
        let report = optimizer
            .optimize(DVector::from_vec(vec![-1.2, 1.]))
            .unwrap();
        assert_relative_eq!(report.x[0], 1., epsilon = 1e-3);
        assert_relative_eq!(report.x[1], 1., epsilon = 1e-3);
    }

    #[test]
    fn restart_reuses_workspace() {
        let function = Affine;
        let (lower, upper) = wide_bounds(2);
        let mut optimizer = LmOptimizer::new(&function, lower, upper, LmOptions::default());
        let first = optimizer.optimize(DVector::from_vec(vec![9., 9.])).unwrap();
        let second = optimizer
            .optimize(DVector::from_vec(vec![-9., -9.]))
            .unwrap();
        assert_relative_eq!(first.x[0], second.x[0], epsilon = 1e-6);
        assert_relative_eq!(first.x[1], second.x[1], epsilon = 1e-6);
    }
}
