//! Flux fitting by multi-start bounded nonlinear least squares

pub mod levenberg;
pub mod solver;

use nalgebra::DVector;

/// Result of one optimization restart
///
/// The caller picks the best solution by SSR; keeping every restart around
/// supports basin exploration.
#[derive(Debug, Clone)]
pub struct FitSolution {
    /// Free fluxes at the optimum; expand with
    /// [`Problem::fluxes_from_free`](crate::problem::Problem::fluxes_from_free)
    pub free_fluxes: DVector<f64>,
    /// Weighted sum of squared residuals; infinite for a failed restart
    pub ssr: f64,
}
