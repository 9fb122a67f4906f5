//! Construction of the stoichiometry matrix
//!
//! Rows are the included metabolites in encounter order, columns the
//! mass-balance reactions in id order; isotopomer-balance pseudo-reactions
//! carry no mass and contribute no columns. `S * v = 0` is the steady-state
//! condition.

use indexmap::IndexMap;
use nalgebra::DMatrix;

use crate::metabolic_model::reaction::{Reaction, ReactionType};

/// Mass-balance reactions in id order
///
/// Their positions define the columns of the stoichiometry matrix and the
/// rows of the nullspace basis.
pub fn mass_balance_reactions(reactions: &[Reaction]) -> Vec<&Reaction> {
    let mut selected: Vec<&Reaction> = reactions
        .iter()
        .filter(|reaction| reaction.reaction_type == ReactionType::MassBalance)
        .collect();
    selected.sort_by_key(|reaction| reaction.id);
    selected
}

/// Build the stoichiometry matrix over the included metabolites
///
/// Entry `(m, r)` is the net coefficient of metabolite `m` in reaction `r`:
/// products count positive, substrates negative, duplicate occurrences sum.
pub fn stoichiometry_matrix(reactions: &[Reaction], included_metabolites: &[String]) -> DMatrix<f64> {
    let row_of: IndexMap<&str, usize> = included_metabolites
        .iter()
        .enumerate()
        .map(|(row, name)| (name.as_str(), row))
        .collect();
    let columns = mass_balance_reactions(reactions);

    let mut matrix = DMatrix::<f64>::zeros(included_metabolites.len(), columns.len());
    for (column, reaction) in columns.iter().enumerate() {
        for participant in &reaction.chemical_equation.substrates {
            if let Some(&row) = row_of.get(participant.metabolite.as_str()) {
                matrix[(row, column)] -= participant.coefficient;
            }
        }
        for participant in &reaction.chemical_equation.products {
            if let Some(&row) = row_of.get(participant.metabolite.as_str()) {
                matrix[(row, column)] += participant.coefficient;
            }
        }
    }
    matrix
}
