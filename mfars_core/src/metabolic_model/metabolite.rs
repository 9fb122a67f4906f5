//! Canonical metabolite ordering for the stoichiometry matrix
//!
//! Metabolites are referenced by name throughout the model; the functions
//! here fix the row ordering of the stoichiometry matrix to the order in
//! which metabolites are first encountered over the reaction list, and
//! remove excluded metabolites (cofactors and boundary species) so their
//! mass balance stays unconstrained.

use indexmap::IndexSet;

use crate::metabolic_model::reaction::Reaction;

/// Union of metabolite names over all chemical equations, in encounter order
pub fn full_metabolite_list(reactions: &[Reaction]) -> Vec<String> {
    let mut metabolites: IndexSet<String> = IndexSet::new();
    for reaction in reactions {
        for participant in reaction
            .chemical_equation
            .substrates
            .iter()
            .chain(reaction.chemical_equation.products.iter())
        {
            metabolites.insert(participant.metabolite.clone());
        }
    }
    metabolites.into_iter().collect()
}

/// Drop excluded metabolites while preserving the encounter order
pub fn included_metabolite_list(
    metabolites: &[String],
    excluded_metabolites: &IndexSet<String>,
) -> Vec<String> {
    metabolites
        .iter()
        .filter(|name| !excluded_metabolites.contains(*name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metabolic_model::reaction::{ChemicalEquation, Participant, ReactionBuilder};

    fn reaction(id: usize, substrate: &str, product: &str) -> Reaction {
        ReactionBuilder::default()
            .id(id)
            .name(format!("v{}", id))
            .chemical_equation(ChemicalEquation::new(
                vec![Participant::new(substrate, 1., "")],
                vec![Participant::new(product, 1., "")],
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn encounter_order_without_duplicates() {
        let reactions = vec![reaction(0, "A", "B"), reaction(1, "B", "C")];
        assert_eq!(full_metabolite_list(&reactions), vec!["A", "B", "C"]);
    }

    #[test]
    fn exclusion_preserves_order() {
        let reactions = vec![reaction(0, "A", "B"), reaction(1, "B", "C")];
        let all = full_metabolite_list(&reactions);
        let excluded: IndexSet<String> = ["B".to_string()].into_iter().collect();
        assert_eq!(included_metabolite_list(&all, &excluded), vec!["A", "C"]);
    }
}
