//! Core rust implementation of Mfars, a crate for 13C metabolic flux analysis.
//!
//! The crate takes a stoichiometric reaction network with carbon atom
//! mappings, a labeled input substrate, and measured mass-isotopomer
//! distributions (MIDs), and estimates the intracellular fluxes that best
//! reproduce the measurements. The pipeline is split between a
//! [`modeller::Modeller`], which compiles the network into an immutable
//! [`problem::Problem`] (stoichiometry, nullspace, flux bounds, EMU
//! networks, input MIDs), and an [`optimize::solver::FluxSolver`], which
//! runs a multi-start bounded Levenberg-Marquardt fit over the free fluxes.

pub mod configuration;
pub mod emu;
pub mod math;
pub mod metabolic_model;
pub mod modeller;
pub mod optimize;
pub mod problem;
