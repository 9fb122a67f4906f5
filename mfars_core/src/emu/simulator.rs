//! EMU cascade simulation
//!
//! For a candidate flux vector, each network is reduced to a linear system
//! `A * X = B * Y` (Antoniewicz et al. 2007): rows of `X` are the unknown
//! MIDs of this network's product EMUs, rows of `Y` the known MIDs of
//! substrate EMUs, with condensation left sides collapsed into a single
//! convolved entry of `Y`. Networks are solved in ascending size order so
//! every substrate EMU is known by the time it is needed.

use indexmap::IndexMap;
use log::debug;
use nalgebra::DMatrix;
use thiserror::Error;

use crate::configuration::CONFIGURATION;
use crate::emu::{Emu, EmuNetwork, EmuSubstrate, Mid};

/// Failures while simulating MIDs for one flux vector
#[derive(Error, Debug, Clone)]
pub enum SimulationError {
    /// The balance matrix of a network is singular; for well-posed models
    /// this indicates a broken network compilation
    #[error("EMU network of size {size} has a singular balance matrix")]
    RankDeficientNetwork { size: usize },
    #[error("EMU network of size {size} solved with residual {residual:e}, above tolerance")]
    NumericalFailure { size: usize, residual: f64 },
    #[error("measured isotope {emu} is never produced by any EMU network")]
    MeasuredIsotopeNotReached { emu: Emu },
    #[error("substrate EMU {emu} is neither known nor produced in its network")]
    UnknownSubstrateMid { emu: Emu },
}

/// Simulate the MIDs of the measured isotopes under the given fluxes
///
/// `fluxes` is indexed by reaction id. The known-MID table is seeded from
/// the input EMU MIDs and grown network by network; it is local to this
/// call, so repeated simulation with identical fluxes returns identical
/// results.
pub fn simulate_mids(
    fluxes: &[f64],
    networks: &[EmuNetwork],
    input_mids: &IndexMap<Emu, Mid>,
    measured_isotopes: &[Emu],
) -> Result<Vec<Mid>, SimulationError> {
    let mut known_mids = input_mids.clone();
    for network in networks {
        solve_network(fluxes, network, &mut known_mids)?;
    }
    measured_isotopes
        .iter()
        .map(|emu| {
            known_mids
                .get(emu)
                .cloned()
                .ok_or_else(|| SimulationError::MeasuredIsotopeNotReached { emu: emu.clone() })
        })
        .collect()
}

/// Convolution of two MIDs
///
/// `(a * b)[k] = sum over i + j = k of a[i] * b[j]`; the distribution of
/// the union of two disjoint EMUs. Commutative and associative.
pub fn convolve_mids(a: &Mid, b: &Mid) -> Mid {
    let mut result = vec![0.0; a.len() + b.len() - 1];
    for (i, &left) in a.iter().enumerate() {
        for (j, &right) in b.iter().enumerate() {
            result[i + j] += left * right;
        }
    }
    result
}

/// Fold a condensation left side into one synthetic EMU and its MID
///
/// The synthetic EMU concatenates names and atom states in left-to-right
/// order; its identity only has to be stable within the current network
/// solve, where it indexes a column of `Y`.
fn convolve_emus(
    left: &[EmuSubstrate],
    known_mids: &IndexMap<Emu, Mid>,
) -> Result<(Emu, Mid), SimulationError> {
    let mut metabolite = String::new();
    let mut atom_states = Vec::new();
    let mut mid: Mid = vec![1.0];
    for part in left {
        let part_mid = known_mids
            .get(&part.emu)
            .ok_or_else(|| SimulationError::UnknownSubstrateMid {
                emu: part.emu.clone(),
            })?;
        metabolite.push_str(&part.emu.metabolite);
        atom_states.extend_from_slice(&part.emu.atom_states);
        mid = convolve_mids(&mid, part_mid);
    }
    Ok((
        Emu {
            metabolite,
            atom_states,
        },
        mid,
    ))
}

/// The substrate side of one EMU reaction after convolution collapse
struct CollapsedSubstrate {
    substrate: EmuSubstrate,
    known: bool,
}

fn solve_network(
    fluxes: &[f64],
    network: &EmuNetwork,
    known_mids: &mut IndexMap<Emu, Mid>,
) -> Result<(), SimulationError> {
    let size = network.size;

    // Product EMUs still missing a MID become the rows of X.
    let mut unknowns: IndexMap<Emu, usize> = IndexMap::new();
    for reaction in &network.reactions {
        if !known_mids.contains_key(&reaction.right.emu)
            && !unknowns.contains_key(&reaction.right.emu)
        {
            let index = unknowns.len();
            unknowns.insert(reaction.right.emu.clone(), index);
        }
    }
    if unknowns.is_empty() {
        debug!("EMU network of size {} has no unknown products", size);
        return Ok(());
    }

    // Collapse each left side and collect the known substrate MIDs for Y.
    let mut knowns: IndexMap<Emu, Mid> = IndexMap::new();
    let mut collapsed: Vec<Option<CollapsedSubstrate>> = Vec::with_capacity(network.reactions.len());
    for reaction in &network.reactions {
        if !unknowns.contains_key(&reaction.right.emu) {
            collapsed.push(None);
            continue;
        }
        if reaction.left.len() > 1 {
            let (emu, mid) = convolve_emus(&reaction.left, known_mids)?;
            knowns.insert(emu.clone(), mid);
            collapsed.push(Some(CollapsedSubstrate {
                substrate: EmuSubstrate {
                    emu,
                    coefficient: 1.0,
                },
                known: true,
            }));
        } else {
            let substrate = reaction.left[0].clone();
            let known = if let Some(mid) = known_mids.get(&substrate.emu) {
                knowns.insert(substrate.emu.clone(), mid.clone());
                true
            } else if unknowns.contains_key(&substrate.emu) {
                false
            } else {
                return Err(SimulationError::UnknownSubstrateMid { emu: substrate.emu });
            };
            collapsed.push(Some(CollapsedSubstrate { substrate, known }));
        }
    }

    let unknown_total = unknowns.len();
    let known_total = knowns.len();
    let mut a = DMatrix::<f64>::zeros(unknown_total, unknown_total);
    let mut b = DMatrix::<f64>::zeros(unknown_total, known_total);
    let mut y = DMatrix::<f64>::zeros(known_total, size + 1);
    for (row, mid) in knowns.values().enumerate() {
        for (mass_shift, &value) in mid.iter().enumerate() {
            y[(row, mass_shift)] = value;
        }
    }

    for (reaction, entry) in network.reactions.iter().zip(&collapsed) {
        let Some(CollapsedSubstrate { substrate, known }) = entry else {
            continue;
        };
        let flux = fluxes[reaction.id];
        let product_row = unknowns[&reaction.right.emu];
        a[(product_row, product_row)] += -reaction.right.coefficient * flux;
        if *known {
            let column = knowns
                .get_index_of(&substrate.emu)
                .ok_or_else(|| SimulationError::UnknownSubstrateMid {
                    emu: substrate.emu.clone(),
                })?;
            b[(product_row, column)] += -substrate.coefficient * flux;
        } else {
            // substrate coefficient on the substrate column (Antoniewicz
            // 2007), not the product coefficient the balance row carries
            let column = unknowns[&substrate.emu];
            a[(product_row, column)] += substrate.coefficient * flux;
        }
    }

    let rhs = &b * &y;
    let x = a
        .clone()
        .col_piv_qr()
        .solve(&rhs)
        .ok_or(SimulationError::RankDeficientNetwork { size })?;
    let residual = (&a * &x - &rhs).norm();
    let tolerance = CONFIGURATION.read().unwrap().simulation_tolerance;
    if residual > tolerance * (1.0 + rhs.norm()) {
        return Err(SimulationError::NumericalFailure { size, residual });
    }

    for (emu, &row) in &unknowns {
        let mid: Mid = (0..size + 1).map(|mass_shift| x[(row, mass_shift)]).collect();
        known_mids.insert(emu.clone(), mid);
    }
    Ok(())
}
