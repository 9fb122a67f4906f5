//! The immutable handoff between the modeller and the flux solver

use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};

use crate::emu::{Emu, EmuNetwork, Mid};
use crate::math::stoichiometry::mass_balance_reactions;
use crate::metabolic_model::model::Measurement;
use crate::metabolic_model::reaction::Reaction;

/// Everything the flux fit needs, computed once by the modeller
///
/// The solver treats this as read-only; every residual evaluation works on
/// scratch buffers of its own.
#[derive(Debug, Clone)]
pub struct Problem {
    pub reactions: Vec<Reaction>,
    pub measured_isotopes: Vec<Emu>,
    /// Kernel basis of the stoichiometry matrix, identity on its trailing
    /// rows
    pub nullspace: DMatrix<f64>,
    /// Reaction id backing each nullspace column
    pub free_flux_ids: Vec<usize>,
    /// EMU networks in ascending size order
    pub networks: Vec<EmuNetwork>,
    /// MIDs of the input-substrate EMUs seeding each simulation
    pub input_mids: IndexMap<Emu, Mid>,
    pub measurements: Vec<Measurement>,
    /// Total residual length over all measurements
    pub measurements_count: usize,
}

impl Problem {
    /// Degrees of freedom of the steady-state flux space
    pub fn nullity(&self) -> usize {
        self.nullspace.ncols()
    }

    /// Expand free fluxes into the full flux vector, indexed by reaction id
    ///
    /// Mass-balance slots come from `N * f`; isotopomer-balance
    /// pseudo-reactions run at a constant unit flux.
    pub fn fluxes_from_free(&self, free_fluxes: &DVector<f64>) -> Vec<f64> {
        let expanded = &self.nullspace * free_fluxes;
        let mut fluxes = vec![1.0; self.reactions.len()];
        for (row, reaction) in mass_balance_reactions(&self.reactions).iter().enumerate() {
            fluxes[reaction.id] = expanded[row];
        }
        fluxes
    }

    /// Bounds on the free fluxes, from flux-variability analysis
    pub fn free_flux_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        let nullity = self.free_flux_ids.len();
        let mut lower = DVector::zeros(nullity);
        let mut upper = DVector::zeros(nullity);
        for (index, &id) in self.free_flux_ids.iter().enumerate() {
            if let Some(reaction) = self.reactions.iter().find(|reaction| reaction.id == id) {
                lower[index] = reaction.computed_lower_bound;
                upper[index] = reaction.computed_upper_bound;
            }
        }
        (lower, upper)
    }
}
