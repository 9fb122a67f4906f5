//! The modelling pipeline compiling parser output into a [`Problem`]
//!
//! The pipeline is fixed: model check, measurement count, EMU reaction
//! compilation, input EMU discovery, input MIDs, stoichiometry, nullspace,
//! flux-variability bounds, EMU network stratification, packaging. All
//! failures here are fatal; nothing half-compiled reaches the solver.

use indexmap::IndexSet;
use log::{debug, info};
use thiserror::Error;

use crate::emu::compiler::{compile_emu_reactions, emu_networks};
use crate::emu::input::{input_emu_list, input_mids};
use crate::emu::Emu;
use crate::math::fva::{compute_flux_bounds, initial_fluxes, FvaError};
use crate::math::nullspace::{nullspace, NullspaceError};
use crate::math::stoichiometry::{mass_balance_reactions, stoichiometry_matrix};
use crate::metabolic_model::metabolite::{full_metabolite_list, included_metabolite_list};
use crate::metabolic_model::model::{
    check_model, InputSubstrate, Measurement, ModelError, ParserResults,
};
use crate::metabolic_model::reaction::Reaction;
use crate::problem::Problem;

/// Errors surfaced by the modelling stage
#[derive(Error, Debug)]
pub enum ModellerError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Nullspace(#[from] NullspaceError),
    #[error(transparent)]
    Fva(#[from] FvaError),
}

/// Compiles a parsed model into the immutable [`Problem`] handed to the
/// solver
pub struct Modeller {
    reactions: Vec<Reaction>,
    measured_isotopes: Vec<Emu>,
    measurements: Vec<Measurement>,
    excluded_metabolites: IndexSet<String>,
    input_substrates: Vec<InputSubstrate>,
}

impl Modeller {
    pub fn new(parser_results: ParserResults) -> Self {
        Modeller {
            reactions: parser_results.reactions,
            measured_isotopes: parser_results.measured_isotopes,
            measurements: parser_results.measurements,
            excluded_metabolites: parser_results.excluded_metabolites,
            input_substrates: parser_results.input_substrates,
        }
    }

    /// Run the pipeline and package the result
    pub fn build(mut self) -> Result<Problem, ModellerError> {
        check_model(
            &self.reactions,
            &self.measured_isotopes,
            &self.measurements,
            &self.input_substrates,
        )?;
        let measurements_count = self
            .measurements
            .iter()
            .map(|measurement| measurement.mid.len())
            .sum();

        let emu_reactions = compile_emu_reactions(&self.reactions, &self.measured_isotopes);
        info!("compiled {} EMU reactions", emu_reactions.len());
        let input_emus = input_emu_list(&emu_reactions, &self.input_substrates);
        let input_mid_table = input_mids(&self.input_substrates, &input_emus);

        let metabolites = full_metabolite_list(&self.reactions);
        let included = included_metabolite_list(&metabolites, &self.excluded_metabolites);
        let s = stoichiometry_matrix(&self.reactions, &included);
        let kernel = nullspace(&s)?;
        // one whole-model LP catches an infeasible constraint set before
        // the per-reaction sweep
        let feasible = initial_fluxes(&self.reactions, &s)?;
        debug!("feasibility probe found fluxes {:?}", feasible);
        compute_flux_bounds(&mut self.reactions, &s)?;
        let networks = emu_networks(&emu_reactions, &input_emus);
        info!(
            "stratified {} EMU networks over nullity {}",
            networks.len(),
            kernel.ncols()
        );

        let columns = mass_balance_reactions(&self.reactions);
        let nullity = kernel.ncols();
        let free_flux_ids: Vec<usize> = columns[columns.len() - nullity..]
            .iter()
            .map(|reaction| reaction.id)
            .collect();

        Ok(Problem {
            reactions: self.reactions,
            measured_isotopes: self.measured_isotopes,
            nullspace: kernel,
            free_flux_ids,
            networks,
            input_mids: input_mid_table,
            measurements: self.measurements,
            measurements_count,
        })
    }
}
