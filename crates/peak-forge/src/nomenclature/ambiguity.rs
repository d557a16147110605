//! BMRB-style ambiguity codes and atom-group classification derived from the bond graph.

use crate::db::ComponentView;
use crate::model::types::{ComponentKind, Element};

/// Shape of a set of atoms produced by expanding one atom token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomGroup {
    Single,
    /// Every proton of one methyl carbon; the first proton stands for the group.
    Methyl { representative: String },
    /// Protons or heavy atoms that are mutual geminal partners.
    Geminal,
    /// Symmetric Phe/Tyr ring positions.
    Aromatic,
    Mixed,
}

fn name_stem(name: &str) -> &str {
    name.trim_end_matches(|c: char| c.is_ascii_digit())
}

fn is_symmetric_ring_position(view: ComponentView<'_>, atom_id: &str) -> bool {
    if view.kind() != ComponentKind::Peptide || !matches!(view.one_letter(), Some('F' | 'Y')) {
        return false;
    }
    ["CD", "CE", "HD", "HE"]
        .iter()
        .any(|p| atom_id.starts_with(p) && atom_id.len() == 3)
}

/// Finds a heavy atom that shares name stem, element, a heavy neighbour and proton count.
fn heavy_geminal_partner<'a>(view: ComponentView<'a>, heavy: &str) -> Option<&'a str> {
    let element = view.element_of(heavy)?;
    let stem = name_stem(heavy);
    if stem == heavy {
        return None;
    }
    let proton_count = view.hydrogens_of(heavy).len();
    view.neighbors(heavy)
        .filter(|(_, el)| el.is_heavy_atom())
        .flat_map(|(pivot, _)| view.neighbors(pivot))
        .find(|(other, el)| {
            *other != heavy
                && *el == element
                && name_stem(other) == stem
                && view.hydrogens_of(other).len() == proton_count
        })
        .map(|(other, _)| other)
}

/// Ambiguity code of a single atom within its component.
///
/// # Returns
///
/// `3` for symmetric aromatic ring positions, `2` for geminal protons and geminal heavy
/// atoms (including protons of isopropyl methyls), otherwise `1`. Unknown atoms report `1`.
pub fn ambiguity_code(view: ComponentView<'_>, atom_id: &str) -> u8 {
    if is_symmetric_ring_position(view, atom_id) {
        return 3;
    }
    match view.element_of(atom_id) {
        Some(Element::H) => {
            let Some(parent) = view.parent_of(atom_id) else {
                return 1;
            };
            match view.hydrogens_of(parent).len() {
                2 => 2,
                n if n >= 3 && heavy_geminal_partner(view, parent).is_some() => 2,
                _ => 1,
            }
        }
        Some(_) if heavy_geminal_partner(view, atom_id).is_some() => 2,
        _ => 1,
    }
}

/// Classifies the atoms a token expanded to.
pub fn classify_group(view: ComponentView<'_>, atom_ids: &[&str]) -> AtomGroup {
    match atom_ids {
        [] | [_] => return AtomGroup::Single,
        _ => {}
    }

    let parents: Vec<Option<&str>> = atom_ids
        .iter()
        .map(|a| match view.element_of(a) {
            Some(Element::H) => view.parent_of(a),
            _ => None,
        })
        .collect();
    let all_protons = parents.iter().all(Option::is_some);

    if all_protons {
        let first = parents[0];
        if parents.iter().all(|p| *p == first) {
            let parent = first.unwrap_or_default();
            let siblings = view.hydrogens_of(parent);
            if siblings.len() == 3 && atom_ids.len() == 3 {
                return AtomGroup::Methyl {
                    representative: atom_ids[0].to_string(),
                };
            }
            if siblings.len() == 2 && atom_ids.len() == 2 {
                return AtomGroup::Geminal;
            }
        }
    }

    if atom_ids.iter().all(|a| is_symmetric_ring_position(view, a)) {
        let stem = name_stem(atom_ids[0]);
        if atom_ids.iter().all(|a| name_stem(a) == stem) {
            return AtomGroup::Aromatic;
        }
    }

    if !all_protons && atom_ids.len() == 2 && heavy_geminal_partner(view, atom_ids[0]) == Some(atom_ids[1]) {
        return AtomGroup::Geminal;
    }

    AtomGroup::Mixed
}
