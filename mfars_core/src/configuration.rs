use std::sync::{LazyLock, RwLock};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

pub struct Configuration {
    /// Default lower flux bound for reactions without an explicit one
    pub lower_bound: f64,
    /// Default upper flux bound for reactions without an explicit one
    pub upper_bound: f64,
    /// Frobenius-norm bound on `S * N` accepted from the nullspace builder
    pub nullspace_tolerance: f64,
    /// Relative residual bound accepted from each EMU network solve
    pub simulation_tolerance: f64,
    /// Forward-difference step used for the numerical Jacobian
    pub jacobian_step: f64,
    /// Optimizer stops once the infinity norm of a step falls below this
    pub epsilon_step: f64,
    /// Iteration cap for a single optimizer run
    pub max_optimizer_iterations: usize,
    /// Number of random restarts per flux fit
    pub restart_total: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            lower_bound: -1000.,
            upper_bound: 1000.,
            nullspace_tolerance: 1e-09,
            simulation_tolerance: 1e-10,
            jacobian_step: 1e-04,
            epsilon_step: 1e-11,
            max_optimizer_iterations: 200,
            restart_total: 10,
        }
    }
}
