//! Expansion of atom-mapped reactions into EMU reactions and their
//! partition into size-stratified networks
//!
//! Expansion runs backwards from the measured isotopes: for every EMU we
//! still have to explain, each reaction producing its metabolite is traced
//! through the atom mapping, yielding the substrate EMUs its atoms came
//! from. Only EMUs reachable from a measurement are ever generated, which
//! is exactly the measured closure.

use std::collections::{BTreeMap, VecDeque};

use indexmap::IndexSet;
use log::debug;

use crate::emu::{Emu, EmuNetwork, EmuReaction, EmuSubstrate};
use crate::metabolic_model::reaction::Reaction;

/// Expand every reaction whose product atoms reach a measured isotope
///
/// For a target EMU `(M, bits)` and a reaction producing `M`, the letters
/// of the product mapping selected by `bits` are looked up in each
/// substrate mapping; every substrate owning at least one of them
/// contributes one substrate EMU. A product whose letters span several
/// substrates therefore yields a condensation reaction with a multi-EMU
/// left side.
pub fn compile_emu_reactions(reactions: &[Reaction], measured_isotopes: &[Emu]) -> Vec<EmuReaction> {
    let mut queue: VecDeque<Emu> = measured_isotopes.iter().cloned().collect();
    let mut visited: IndexSet<Emu> = measured_isotopes.iter().cloned().collect();
    let mut emu_reactions = Vec::new();

    while let Some(target) = queue.pop_front() {
        for reaction in reactions {
            for product in &reaction.chemical_equation.products {
                if product.metabolite != target.metabolite || product.atom_mapping.is_empty() {
                    continue;
                }
                let letters: Vec<char> = product
                    .atom_mapping
                    .chars()
                    .enumerate()
                    .filter(|(index, _)| target.atom_states.get(*index).copied().unwrap_or(false))
                    .map(|(_, letter)| letter)
                    .collect();

                let mut left = Vec::new();
                for substrate in &reaction.chemical_equation.substrates {
                    if substrate.atom_mapping.is_empty() {
                        continue;
                    }
                    let atom_states: Vec<bool> = substrate
                        .atom_mapping
                        .chars()
                        .map(|letter| letters.contains(&letter))
                        .collect();
                    if atom_states.iter().any(|&state| state) {
                        left.push(EmuSubstrate {
                            emu: Emu::new(&substrate.metabolite, atom_states),
                            coefficient: substrate.coefficient,
                        });
                    }
                }
                if left.is_empty() {
                    // the target's atoms do not pass through this reaction
                    continue;
                }

                for emu_substrate in &left {
                    if visited.insert(emu_substrate.emu.clone()) {
                        queue.push_back(emu_substrate.emu.clone());
                    }
                }
                emu_reactions.push(EmuReaction {
                    id: reaction.id,
                    left,
                    right: EmuSubstrate {
                        emu: target.clone(),
                        coefficient: product.coefficient,
                    },
                });
            }
        }
    }

    emu_reactions
}

/// Partition EMU reactions into networks by product size, ascending
///
/// Reactions producing an input-substrate EMU are dropped: their product
/// MIDs are given, not solved for. The resulting ordering guarantees that
/// when a network of size `s` is solved, every smaller EMU is already
/// known.
pub fn emu_networks(emu_reactions: &[EmuReaction], input_emus: &IndexSet<Emu>) -> Vec<EmuNetwork> {
    let mut by_size: BTreeMap<usize, Vec<EmuReaction>> = BTreeMap::new();
    for reaction in emu_reactions {
        if input_emus.contains(&reaction.right.emu) {
            debug!(
                "dropping EMU reaction {} producing input EMU {}",
                reaction.id, reaction.right.emu
            );
            continue;
        }
        by_size
            .entry(reaction.right.emu.size())
            .or_default()
            .push(reaction.clone());
    }
    by_size
        .into_iter()
        .map(|(size, reactions)| EmuNetwork { size, reactions })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metabolic_model::reaction::{ChemicalEquation, Participant, ReactionBuilder};

    fn mapped_reaction(
        id: usize,
        substrates: Vec<(&str, f64, &str)>,
        products: Vec<(&str, f64, &str)>,
    ) -> Reaction {
        ReactionBuilder::default()
            .id(id)
            .name(format!("v{}", id))
            .chemical_equation(ChemicalEquation::new(
                substrates
                    .into_iter()
                    .map(|(m, c, map)| Participant::new(m, c, map))
                    .collect(),
                products
                    .into_iter()
                    .map(|(m, c, map)| Participant::new(m, c, map))
                    .collect(),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn linear_chain_traces_back_to_input() {
        let reactions = vec![
            mapped_reaction(0, vec![("A", 1., "ab")], vec![("B", 1., "ab")]),
            mapped_reaction(1, vec![("B", 1., "ab")], vec![("C", 1., "ab")]),
        ];
        let measured = vec![Emu::new("C", vec![true, true])];
        let emu_reactions = compile_emu_reactions(&reactions, &measured);

        assert_eq!(emu_reactions.len(), 2);
        assert_eq!(emu_reactions[0].id, 1);
        assert_eq!(emu_reactions[0].left[0].emu, Emu::new("B", vec![true, true]));
        assert_eq!(emu_reactions[1].id, 0);
        assert_eq!(emu_reactions[1].left[0].emu, Emu::new("A", vec![true, true]));
    }

    #[test]
    fn partial_emu_selects_mapped_atoms() {
        // B's first carbon comes from A's second carbon
        let reactions = vec![mapped_reaction(
            0,
            vec![("A", 1., "ab")],
            vec![("B", 1., "ba")],
        )];
        let measured = vec![Emu::new("B", vec![true, false])];
        let emu_reactions = compile_emu_reactions(&reactions, &measured);

        assert_eq!(emu_reactions.len(), 1);
        assert_eq!(
            emu_reactions[0].left[0].emu,
            Emu::new("A", vec![false, true])
        );
    }

    #[test]
    fn condensation_splits_left_side() {
        // A (2 carbons) + B (1 carbon) -> C (3 carbons)
        let reactions = vec![mapped_reaction(
            0,
            vec![("A", 1., "ab"), ("B", 1., "c")],
            vec![("C", 1., "abc")],
        )];
        let measured = vec![Emu::new("C", vec![true, true, true])];
        let emu_reactions = compile_emu_reactions(&reactions, &measured);

        assert_eq!(emu_reactions.len(), 1);
        assert_eq!(emu_reactions[0].left.len(), 2);
        assert_eq!(
            emu_reactions[0].left[0].emu,
            Emu::new("A", vec![true, true])
        );
        assert_eq!(emu_reactions[0].left[1].emu, Emu::new("B", vec![true]));
    }

    #[test]
    fn closure_ignores_unreachable_products() {
        let reactions = vec![
            mapped_reaction(0, vec![("A", 1., "a")], vec![("B", 1., "a")]),
            mapped_reaction(1, vec![("A", 1., "a")], vec![("D", 1., "a")]),
        ];
        let measured = vec![Emu::new("B", vec![true])];
        let emu_reactions = compile_emu_reactions(&reactions, &measured);

        assert_eq!(emu_reactions.len(), 1);
        assert_eq!(emu_reactions[0].right.emu.metabolite, "B");
    }

    #[test]
    fn networks_are_size_ordered() {
        let reactions = vec![
            mapped_reaction(
                0,
                vec![("A", 1., "ab"), ("B", 1., "c")],
                vec![("C", 1., "abc")],
            ),
            mapped_reaction(1, vec![("C", 1., "abc")], vec![("D", 1., "abc")]),
        ];
        let measured = vec![
            Emu::new("D", vec![true, true, true]),
            Emu::new("D", vec![true, false, false]),
        ];
        let emu_reactions = compile_emu_reactions(&reactions, &measured);
        let input_emus: IndexSet<Emu> = [
            Emu::new("A", vec![true, true]),
            Emu::new("A", vec![true, false]),
            Emu::new("B", vec![true]),
        ]
        .into_iter()
        .collect();
        let networks = emu_networks(&emu_reactions, &input_emus);

        let sizes: Vec<usize> = networks.iter().map(|network| network.size).collect();
        assert_eq!(sizes, vec![1, 3]);
    }
}
