//! MIDs of EMUs that belong to input substrates
//!
//! Input substrates enter the network with a known, discrete labeling
//! composition, so the MID of any of their EMUs can be computed directly
//! and seeds the simulation cascade.

use indexmap::{IndexMap, IndexSet};

use crate::emu::{Emu, EmuReaction, Mid};
use crate::metabolic_model::model::InputSubstrate;

/// Collect every EMU of an input substrate appearing in the compiled
/// reactions
pub fn input_emu_list(
    emu_reactions: &[EmuReaction],
    input_substrates: &[InputSubstrate],
) -> IndexSet<Emu> {
    let is_input =
        |emu: &Emu| input_substrates.iter().any(|substrate| substrate.name == emu.metabolite);

    let mut input_emus = IndexSet::new();
    for reaction in emu_reactions {
        for emu_substrate in &reaction.left {
            if is_input(&emu_substrate.emu) {
                input_emus.insert(emu_substrate.emu.clone());
            }
        }
        if is_input(&reaction.right.emu) {
            input_emus.insert(reaction.right.emu.clone());
        }
    }
    input_emus
}

/// MIDs of the input EMUs from the substrates' labeling states
///
/// For an EMU selecting atoms `bits`, each labeling state with pattern `p`
/// contributes its fraction to mass shift `popcount(p & bits)`.
pub fn input_mids(
    input_substrates: &[InputSubstrate],
    input_emus: &IndexSet<Emu>,
) -> IndexMap<Emu, Mid> {
    let mut mids = IndexMap::new();
    for emu in input_emus {
        let Some(substrate) = input_substrates
            .iter()
            .find(|substrate| substrate.name == emu.metabolite)
        else {
            continue;
        };
        let mut mid = vec![0.0; emu.size() + 1];
        for labeling in &substrate.labelings {
            let mass_shift = labeling
                .pattern
                .iter()
                .zip(emu.atom_states.iter())
                .filter(|(&heavy, &included)| heavy && included)
                .count();
            mid[mass_shift] += labeling.fraction;
        }
        mids.insert(emu.clone(), mid);
    }
    mids
}
