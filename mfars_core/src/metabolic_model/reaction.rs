//! This module provides a struct for representing reactions
use crate::configuration::CONFIGURATION;
use derive_builder::Builder;

/// Represents a reaction in the metabolic model
///
/// Flux bounds come in two layers: the physical `lower_bound`/`upper_bound`
/// (and the optional `basis`/`deviation` pin), which are inputs, and the
/// `computed_lower_bound`/`computed_upper_bound` pair filled in by
/// flux-variability analysis, which the flux fit uses.
#[derive(Builder, Debug, Clone)]
pub struct Reaction {
    /// Used to identify the reaction; unique and dense over the model
    pub id: usize,
    /// Human-readable reaction name
    pub name: String,
    /// Whether the reaction balances metabolite mass or only isotopomers
    /// (see [`ReactionType`])
    #[builder(default = "ReactionType::MassBalance")]
    pub reaction_type: ReactionType,
    /// Whether the reaction can carry negative flux
    #[builder(default = "false")]
    pub reversible: bool,
    /// Lower flux bound
    #[builder(default = "CONFIGURATION.read().unwrap().lower_bound")]
    pub lower_bound: f64,
    /// Upper flux bound
    #[builder(default = "CONFIGURATION.read().unwrap().upper_bound")]
    pub upper_bound: f64,
    /// Measured flux value pinning the reaction, NaN when absent
    #[builder(default = "f64::NAN")]
    pub basis: f64,
    /// Half-width of the interval around `basis`; NaN collapses the pin to
    /// a point constraint
    #[builder(default = "f64::NAN")]
    pub deviation: f64,
    /// Substrates and products with stoichiometry and atom mappings
    #[builder(default = "ChemicalEquation::default()")]
    pub chemical_equation: ChemicalEquation,
    /// Lower flux bound established by flux-variability analysis
    #[builder(default = "f64::NAN")]
    pub computed_lower_bound: f64,
    /// Upper flux bound established by flux-variability analysis
    #[builder(default = "f64::NAN")]
    pub computed_upper_bound: f64,
}

impl Reaction {
    /// Bounds of the flux variable this reaction contributes to a linear
    /// program
    ///
    /// A finite `basis` overrides the plain bounds with
    /// `[basis - deviation, basis + deviation]`; a NaN `deviation` fixes the
    /// flux at `basis` exactly.
    pub fn variable_bounds(&self) -> (f64, f64) {
        if self.basis.is_nan() {
            (self.lower_bound, self.upper_bound)
        } else {
            let shift = if self.deviation.is_nan() {
                0.0
            } else {
                self.deviation
            };
            (self.basis - shift, self.basis + shift)
        }
    }
}

/// Whether a reaction constrains metabolite mass balance
///
/// Only [`ReactionType::MassBalance`] reactions contribute columns to the
/// stoichiometry matrix and participate in flux-variability analysis;
/// [`ReactionType::IsotopomerBalance`] reactions exist to carry atom
/// mappings and are simulated with a constant unit flux.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReactionType {
    /// The reaction balances metabolite mass at steady state
    MassBalance,
    /// Pseudo-reaction balancing isotopomers only
    IsotopomerBalance,
}

/// One metabolite's participation in a chemical equation
#[derive(Clone, Debug, PartialEq)]
pub struct Participant {
    /// Metabolite name
    pub metabolite: String,
    /// Stoichiometric coefficient, always positive; the side decides the sign
    pub coefficient: f64,
    /// One letter per carbon atom; empty when the metabolite is not tracked
    pub atom_mapping: String,
}

impl Participant {
    pub fn new(metabolite: &str, coefficient: f64, atom_mapping: &str) -> Self {
        Participant {
            metabolite: metabolite.to_string(),
            coefficient,
            atom_mapping: atom_mapping.to_string(),
        }
    }
}

/// Ordered substrates and products of a reaction
///
/// The same letters must appear on both sides of the atom mappings, letter
/// position encoding the carbon index within each metabolite.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChemicalEquation {
    pub substrates: Vec<Participant>,
    pub products: Vec<Participant>,
}

impl ChemicalEquation {
    pub fn new(substrates: Vec<Participant>, products: Vec<Participant>) -> Self {
        ChemicalEquation {
            substrates,
            products,
        }
    }
}
