//! This module provides the input contract of the modelling pipeline and
//! the model validation run before any compilation step.

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::emu::Emu;
use crate::metabolic_model::metabolite::full_metabolite_list;
use crate::metabolic_model::reaction::{Participant, Reaction};

/// Everything the upstream parser hands to the modeller
///
/// Reaction ids are expected to be unique and dense in `[0, reactions.len())`,
/// with all [`MassBalance`](crate::metabolic_model::reaction::ReactionType::MassBalance)
/// reactions ordered before the isotopomer-balance pseudo-reactions; the last
/// nullity-many mass-balance reactions become the free fluxes.
#[derive(Debug, Clone)]
pub struct ParserResults {
    pub reactions: Vec<Reaction>,
    pub measured_isotopes: Vec<Emu>,
    pub measurements: Vec<Measurement>,
    pub excluded_metabolites: IndexSet<String>,
    pub input_substrates: Vec<InputSubstrate>,
}

/// A measured mass-isotopomer distribution for one EMU
#[derive(Debug, Clone)]
pub struct Measurement {
    pub emu: Emu,
    pub mid: Vec<f64>,
    pub errors: Vec<f64>,
}

/// Labeling composition of an input substrate
#[derive(Debug, Clone)]
pub struct InputSubstrate {
    pub name: String,
    pub labelings: Vec<Labeling>,
}

/// One discrete labeling state of an input substrate
#[derive(Debug, Clone)]
pub struct Labeling {
    /// Heavy-atom flag per carbon
    pub pattern: Vec<bool>,
    /// Fraction of the substrate pool in this state
    pub fraction: f64,
}

/// Errors detected while validating the parsed model
///
/// All of these are fatal; the pipeline refuses to compile a model that
/// fails any check.
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    #[error("reaction ids are not unique and dense: reaction {name} has id {id} in a model of {total} reactions")]
    BadReactionId { name: String, id: usize, total: usize },
    #[error("atom mapping of reaction {reaction} is invalid: {detail}")]
    InvalidAtomMapping { reaction: String, detail: String },
    #[error("metabolite {metabolite} appears with {found} atoms in reaction {reaction} but {expected} elsewhere")]
    InconsistentAtomCount {
        metabolite: String,
        reaction: String,
        expected: usize,
        found: usize,
    },
    #[error("unknown metabolite {name} referenced by {referrer}")]
    UnknownMetabolite { name: String, referrer: String },
    #[error("measurement of {metabolite} has {found} mass shifts but its EMU has {expected}")]
    MeasurementLength {
        metabolite: String,
        expected: usize,
        found: usize,
    },
    #[error("measurement of {metabolite} contains abundance {value} outside [0, 1]")]
    MeasurementRange { metabolite: String, value: f64 },
    #[error("measurement MID of {metabolite} sums to {sum}, expected 1")]
    MeasurementSum { metabolite: String, sum: f64 },
    #[error("measurement {index} does not match the measured isotope at the same position")]
    MeasurementMismatch { index: usize },
    #[error("input substrate {substrate} labeling fractions sum to {sum}, expected 1")]
    LabelingSum { substrate: String, sum: f64 },
    #[error("input substrate {substrate} labeling pattern has {found} atoms, expected {expected}")]
    LabelingLength {
        substrate: String,
        expected: usize,
        found: usize,
    },
}

/// Validate the parsed model before compilation
///
/// Checks reaction id density, atom-mapping consistency (unique letters per
/// side, every product atom traceable to exactly one substrate atom, stable
/// atom counts per metabolite), measurement MIDs (length `size + 1`, entries
/// in `[0, 1]`, mass sum within `1e-3` of one), and input substrate
/// labelings (fractions summing to one, patterns covering every atom).
pub fn check_model(
    reactions: &[Reaction],
    measured_isotopes: &[Emu],
    measurements: &[Measurement],
    input_substrates: &[InputSubstrate],
) -> Result<(), ModelError> {
    check_reaction_ids(reactions)?;
    let atom_counts = metabolite_atom_counts(reactions)?;
    for reaction in reactions {
        check_atom_mapping(reaction)?;
    }

    let metabolites: IndexSet<String> = full_metabolite_list(reactions).into_iter().collect();

    if measurements.len() != measured_isotopes.len() {
        return Err(ModelError::MeasurementMismatch {
            index: measurements.len().min(measured_isotopes.len()),
        });
    }
    for (index, measurement) in measurements.iter().enumerate() {
        if measurement.emu != measured_isotopes[index] {
            return Err(ModelError::MeasurementMismatch { index });
        }
        check_measurement(measurement, &metabolites, &atom_counts)?;
    }

    for substrate in input_substrates {
        check_input_substrate(substrate, &metabolites, &atom_counts)?;
    }

    Ok(())
}

fn check_reaction_ids(reactions: &[Reaction]) -> Result<(), ModelError> {
    let total = reactions.len();
    let mut seen = vec![false; total];
    for reaction in reactions {
        if reaction.id >= total || seen[reaction.id] {
            return Err(ModelError::BadReactionId {
                name: reaction.name.clone(),
                id: reaction.id,
                total,
            });
        }
        seen[reaction.id] = true;
    }
    Ok(())
}

/// Number of mapped carbon atoms per metabolite, consistent over all
/// reactions that track it
fn metabolite_atom_counts(reactions: &[Reaction]) -> Result<IndexMap<String, usize>, ModelError> {
    let mut atom_counts: IndexMap<String, usize> = IndexMap::new();
    for reaction in reactions {
        for participant in reaction
            .chemical_equation
            .substrates
            .iter()
            .chain(reaction.chemical_equation.products.iter())
        {
            if participant.atom_mapping.is_empty() {
                continue;
            }
            let found = participant.atom_mapping.chars().count();
            match atom_counts.get(&participant.metabolite) {
                Some(&expected) if expected != found => {
                    return Err(ModelError::InconsistentAtomCount {
                        metabolite: participant.metabolite.clone(),
                        reaction: reaction.name.clone(),
                        expected,
                        found,
                    });
                }
                Some(_) => {}
                None => {
                    atom_counts.insert(participant.metabolite.clone(), found);
                }
            }
        }
    }
    Ok(atom_counts)
}

fn check_atom_mapping(reaction: &Reaction) -> Result<(), ModelError> {
    let substrate_letters = side_letters(
        reaction,
        reaction.chemical_equation.substrates.iter(),
        "substrate",
    )?;
    let product_letters = side_letters(
        reaction,
        reaction.chemical_equation.products.iter(),
        "product",
    )?;

    // Every product atom must come from exactly one substrate atom; letters
    // a substrate loses (released CO2 and the like) are allowed to vanish.
    for letter in &product_letters {
        if !substrate_letters.contains(letter) {
            return Err(ModelError::InvalidAtomMapping {
                reaction: reaction.name.clone(),
                detail: format!("product atom '{}' has no substrate source", letter),
            });
        }
    }
    Ok(())
}

fn side_letters<'a>(
    reaction: &Reaction,
    participants: impl Iterator<Item = &'a Participant>,
    side: &str,
) -> Result<IndexSet<char>, ModelError> {
    let mut letters = IndexSet::new();
    for participant in participants {
        for letter in participant.atom_mapping.chars() {
            if !letters.insert(letter) {
                return Err(ModelError::InvalidAtomMapping {
                    reaction: reaction.name.clone(),
                    detail: format!("{} atom '{}' appears twice", side, letter),
                });
            }
        }
    }
    Ok(letters)
}

fn check_measurement(
    measurement: &Measurement,
    metabolites: &IndexSet<String>,
    atom_counts: &IndexMap<String, usize>,
) -> Result<(), ModelError> {
    let metabolite = &measurement.emu.metabolite;
    if !metabolites.contains(metabolite) {
        return Err(ModelError::UnknownMetabolite {
            name: metabolite.clone(),
            referrer: "a measurement".to_string(),
        });
    }
    if let Some(&atom_count) = atom_counts.get(metabolite) {
        if measurement.emu.atom_states.len() != atom_count {
            return Err(ModelError::InvalidAtomMapping {
                reaction: metabolite.clone(),
                detail: format!(
                    "measured EMU covers {} atoms but the metabolite has {}",
                    measurement.emu.atom_states.len(),
                    atom_count
                ),
            });
        }
    }

    let expected = measurement.emu.size() + 1;
    if measurement.mid.len() != expected || measurement.errors.len() != expected {
        return Err(ModelError::MeasurementLength {
            metabolite: metabolite.clone(),
            expected,
            found: measurement.mid.len(),
        });
    }
    let mut sum = 0.0;
    for &value in &measurement.mid {
        if !(0.0..=1.0).contains(&value) {
            return Err(ModelError::MeasurementRange {
                metabolite: metabolite.clone(),
                value,
            });
        }
        sum += value;
    }
    if (sum - 1.0).abs() > 1e-3 {
        return Err(ModelError::MeasurementSum {
            metabolite: metabolite.clone(),
            sum,
        });
    }
    Ok(())
}

fn check_input_substrate(
    substrate: &InputSubstrate,
    metabolites: &IndexSet<String>,
    atom_counts: &IndexMap<String, usize>,
) -> Result<(), ModelError> {
    if !metabolites.contains(&substrate.name) {
        return Err(ModelError::UnknownMetabolite {
            name: substrate.name.clone(),
            referrer: "an input substrate".to_string(),
        });
    }
    let mut sum = 0.0;
    for labeling in &substrate.labelings {
        if let Some(&atom_count) = atom_counts.get(&substrate.name) {
            if labeling.pattern.len() != atom_count {
                return Err(ModelError::LabelingLength {
                    substrate: substrate.name.clone(),
                    expected: atom_count,
                    found: labeling.pattern.len(),
                });
            }
        }
        sum += labeling.fraction;
    }
    if (sum - 1.0).abs() > 1e-3 {
        return Err(ModelError::LabelingSum {
            substrate: substrate.name.clone(),
            sum,
        });
    }
    Ok(())
}
