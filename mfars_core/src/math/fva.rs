//! Flux-variability analysis
//!
//! For every mass-balance reaction, two linear programs bound its flux
//! under the steady-state constraint `S * v = 0` and the per-reaction
//! bounds (with `basis`/`deviation` pins applied). The results land on the
//! reactions as `computed_lower_bound`/`computed_upper_bound` and later
//! bound the free fluxes of the fit. Each program is built fresh per
//! solve; the problems are small and correctness beats reuse here.

use good_lp::{
    constraint, default_solver, variable, Expression, ObjectiveDirection, ProblemVariables,
    ResolutionError, Solution, SolverModel, Variable,
};
use log::debug;
use nalgebra::DMatrix;
use thiserror::Error;

use crate::math::stoichiometry::mass_balance_reactions;
use crate::metabolic_model::reaction::Reaction;

/// Errors from the linear-programming stage
#[derive(Error, Debug, Clone)]
pub enum FvaError {
    #[error("model has no feasible flux distribution while bounding {reaction}")]
    InfeasibleModel { reaction: String },
    #[error("flux of {reaction} is unbounded")]
    UnboundedFlux { reaction: String },
    #[error("linear solver failed while bounding {reaction}: {message}")]
    Solver { reaction: String, message: String },
}

/// Bound every mass-balance reaction by a min and a max linear program
pub fn compute_flux_bounds(reactions: &mut [Reaction], s: &DMatrix<f64>) -> Result<(), FvaError> {
    let columns: Vec<Reaction> = mass_balance_reactions(reactions)
        .into_iter()
        .cloned()
        .collect();
    let column_refs: Vec<&Reaction> = columns.iter().collect();

    let mut bounds = Vec::with_capacity(column_refs.len());
    for target in 0..column_refs.len() {
        let context = column_refs[target].name.clone();
        let lower = solve_flux_lp(
            &column_refs,
            s,
            ObjectiveDirection::Minimisation,
            &context,
            |flux_vars| flux_vars[target].into(),
        )?[target];
        let upper = solve_flux_lp(
            &column_refs,
            s,
            ObjectiveDirection::Maximisation,
            &context,
            |flux_vars| flux_vars[target].into(),
        )?[target];
        debug!("flux range of {}: [{}, {}]", context, lower, upper);
        bounds.push((column_refs[target].id, lower, upper));
    }

    for (id, lower, upper) in bounds {
        if let Some(reaction) = reactions.iter_mut().find(|reaction| reaction.id == id) {
            reaction.computed_lower_bound = lower;
            reaction.computed_upper_bound = upper;
        }
    }
    Ok(())
}

/// One feasible steady-state flux vector, minimizing total flux
///
/// A cheap feasibility probe of the whole constraint set before the
/// per-reaction sweep; values are in stoichiometry column order.
pub fn initial_fluxes(reactions: &[Reaction], s: &DMatrix<f64>) -> Result<Vec<f64>, FvaError> {
    let columns = mass_balance_reactions(reactions);
    solve_flux_lp(
        &columns,
        s,
        ObjectiveDirection::Minimisation,
        "the whole model",
        |flux_vars| flux_vars.iter().map(|&var| Expression::from(var)).sum(),
    )
}

fn solve_flux_lp(
    columns: &[&Reaction],
    s: &DMatrix<f64>,
    direction: ObjectiveDirection,
    context: &str,
    objective_of: impl FnOnce(&[Variable]) -> Expression,
) -> Result<Vec<f64>, FvaError> {
    let mut vars = ProblemVariables::new();
    let flux_vars: Vec<Variable> = columns
        .iter()
        .map(|reaction| {
            let (lower, upper) = reaction.variable_bounds();
            vars.add(variable().min(lower).max(upper))
        })
        .collect();

    let objective = objective_of(&flux_vars);
    let mut model = vars.optimise(direction, objective).using(default_solver);
    for row in 0..s.nrows() {
        let balance: Expression = flux_vars
            .iter()
            .enumerate()
            .map(|(column, &var)| s[(row, column)] * var)
            .sum();
        model.add_constraint(constraint::eq(balance, 0.));
    }

    let solution = model.solve().map_err(|error| match error {
        ResolutionError::Infeasible => FvaError::InfeasibleModel {
            reaction: context.to_string(),
        },
        ResolutionError::Unbounded => FvaError::UnboundedFlux {
            reaction: context.to_string(),
        },
        other => FvaError::Solver {
            reaction: context.to_string(),
            message: other.to_string(),
        },
    })?;
    Ok(flux_vars.iter().map(|&var| solution.value(var)).collect())
}
