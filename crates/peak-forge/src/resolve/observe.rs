//! Evidence gathered while resolving labels, turned into reparse reasons at the end of a pass.

use crate::model::coords::{CoordinateContext, ResidueKey};
use crate::model::diagnostic::ListRef;
use crate::model::reparse::{ChainSeqRemap, ReparseReasons, set_per_list};
use crate::nomenclature::Nomenclature;
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet};

/// Distinct residues an offset must explain before it is trusted.
const MIN_OFFSET_VOTES: usize = 3;

/// A residue the label named but the coordinates did not confirm.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Unmatched {
    pub chain_id: Option<SmolStr>,
    pub seq_id: i32,
    pub comp_id: SmolStr,
}

#[derive(Debug, Clone, Default)]
pub struct Observations {
    unmatched: BTreeSet<Unmatched>,
    extended: BTreeMap<SmolStr, BTreeSet<i32>>,
    ext_substituted: BTreeMap<SmolStr, ChainSeqRemap>,
    non_poly: BTreeMap<(SmolStr, i32), (ResidueKey, bool)>,
    implicit_chains: BTreeMap<ListRef, BTreeMap<SmolStr, usize>>,
    numbering: BTreeMap<ListRef, (usize, usize)>,
}

impl Observations {
    pub fn unmatched(&mut self, chain_id: Option<&SmolStr>, seq_id: i32, comp_id: &SmolStr) {
        self.unmatched.insert(Unmatched {
            chain_id: chain_id.cloned(),
            seq_id,
            comp_id: comp_id.clone(),
        });
    }

    /// Records a residue accepted beyond a chain terminus. `label_chain` is the chain the
    /// label named, when it differs from the chain the residue was placed on.
    pub fn extended(&mut self, chain_id: &SmolStr, seq_id: i32, label_chain: Option<&SmolStr>) {
        self.extended
            .entry(chain_id.clone())
            .or_default()
            .insert(seq_id);
        if let Some(label_chain) = label_chain.filter(|c| *c != chain_id) {
            let remap = self
                .ext_substituted
                .entry(label_chain.clone())
                .or_insert_with(|| ChainSeqRemap {
                    chain_id: chain_id.clone(),
                    seq_id: BTreeMap::new(),
                });
            remap.seq_id.insert(seq_id, seq_id);
        }
    }

    pub fn non_polymer(&mut self, comp_id: &SmolStr, seq_id: i32, key: ResidueKey, branched: bool) {
        self.non_poly
            .entry((comp_id.clone(), seq_id))
            .or_insert((key, branched));
    }

    /// Records the chain picked for a chainless label that matched several chains.
    pub fn implicit_chain(&mut self, list: ListRef, chain_id: &SmolStr) {
        *self
            .implicit_chains
            .entry(list)
            .or_default()
            .entry(chain_id.clone())
            .or_default() += 1;
    }

    /// Counts a residue hit by author (`label == false`) or label numbering.
    pub fn numbering_hit(&mut self, list: ListRef, label: bool) {
        let slot = self.numbering.entry(list).or_default();
        if label {
            slot.1 += 1;
        } else {
            slot.0 += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unmatched.is_empty()
            && self.extended.is_empty()
            && self.non_poly.is_empty()
            && self.implicit_chains.is_empty()
            && self.numbering.values().all(|&(_, label)| label == 0)
    }

    /// Derives the reparse reasons this evidence supports.
    ///
    /// # Arguments
    ///
    /// * `coords` - The coordinate context the labels were resolved against.
    /// * `nomenclature` - Used to compare residue spellings with the model.
    pub fn into_reasons<N: Nomenclature + ?Sized>(
        self,
        coords: &CoordinateContext,
        nomenclature: &N,
    ) -> ReparseReasons {
        let mut reasons = ReparseReasons::default();

        let mut by_chain: BTreeMap<Option<SmolStr>, Vec<(i32, SmolStr)>> = BTreeMap::new();
        for u in &self.unmatched {
            by_chain
                .entry(u.chain_id.clone())
                .or_default()
                .push((u.seq_id, u.comp_id.clone()));
        }

        for (label_chain, pairs) in &by_chain {
            if let Some(chain) = label_chain.as_ref().filter(|c| !coords.has_chain(c)) {
                if let Some(target) = chain_substitute(coords, nomenclature, pairs) {
                    log::debug!("chain {chain} of the labels matches chain {target}");
                    reasons.chain_id_remap.insert(chain.clone(), target);
                    continue;
                }
            }
            let Some((target, map)) = sequence_offset(coords, nomenclature, label_chain.as_ref(), pairs)
            else {
                continue;
            };
            match label_chain {
                Some(chain) if *chain != target => {
                    reasons.chain_seq_id_remap.insert(
                        chain.clone(),
                        ChainSeqRemap {
                            chain_id: target,
                            seq_id: map,
                        },
                    );
                }
                _ => reasons
                    .seq_id_remap
                    .entry(target)
                    .or_default()
                    .extend(map),
            }
        }

        for ((comp, seq), (key, branched)) in self.non_poly {
            let slot = if branched {
                &mut reasons.branched_remap
            } else {
                &mut reasons.non_poly_remap
            };
            slot.entry(comp).or_default().insert(seq, key);
        }

        reasons.extend_seq_scheme = self.extended;
        reasons.ext_chain_seq_id_remap = self.ext_substituted;

        for (list, counts) in self.implicit_chains {
            let Some((chain, _)) = counts
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            else {
                continue;
            };
            let clones: Vec<SmolStr> = coords
                .identical_chains(chain)
                .iter()
                .filter(|c| *c != chain)
                .cloned()
                .collect();
            if !clones.is_empty() {
                reasons.chain_id_clone.insert(chain.clone(), clones);
            }
            set_per_list(&mut reasons.default_seg_id, list, chain.clone());
        }

        let (mut auth_total, mut label_total) = (0, 0);
        for (list, (auth, label)) in self.numbering {
            auth_total += auth;
            label_total += label;
            if label > auth {
                set_per_list(&mut reasons.local_seq_scheme, list, true);
            }
        }
        reasons.label_seq_scheme = label_total > auth_total;

        reasons
    }
}

fn matches_at<N: Nomenclature + ?Sized>(
    coords: &CoordinateContext,
    nomenclature: &N,
    chain_id: &str,
    seq_id: i32,
    comp_id: &str,
) -> bool {
    let Some(polymer) = coords.polymer(chain_id) else {
        return false;
    };
    polymer.position_of_auth(seq_id).is_some_and(|pos| {
        let reference = polymer.comp_at(pos).map(|c| c.as_str());
        polymer.comp_matches(pos, &nomenclature.standardize_residue(comp_id, reference))
    })
}

/// A modelled chain on which at least four in five of the residues validate unchanged.
fn chain_substitute<N: Nomenclature + ?Sized>(
    coords: &CoordinateContext,
    nomenclature: &N,
    pairs: &[(i32, SmolStr)],
) -> Option<SmolStr> {
    let mut best: Option<(&SmolStr, usize)> = None;
    for polymer in coords.polymers() {
        let hits = pairs
            .iter()
            .filter(|(seq, comp)| matches_at(coords, nomenclature, &polymer.chain_id, *seq, comp))
            .count();
        if best.is_none_or(|(_, top)| hits > top) {
            best = Some((&polymer.chain_id, hits));
        }
    }
    let (chain, hits) = best?;
    (hits > 0 && hits * 5 >= pairs.len() * 4).then(|| chain.clone())
}

/// Votes for a constant author-numbering offset that explains the unmatched residues.
///
/// # Returns
///
/// The chain the residues belong on and the renumbering of every residue the winning offset
/// validates, when the offset explains at least [`MIN_OFFSET_VOTES`] distinct residues and
/// four in five of them.
fn sequence_offset<N: Nomenclature + ?Sized>(
    coords: &CoordinateContext,
    nomenclature: &N,
    preferred: Option<&SmolStr>,
    pairs: &[(i32, SmolStr)],
) -> Option<(SmolStr, BTreeMap<i32, i32>)> {
    if pairs.len() < MIN_OFFSET_VOTES {
        return None;
    }

    let mut best: Option<(SmolStr, i32, usize)> = None;
    for polymer in coords.polymers() {
        let mut votes: BTreeMap<i32, usize> = BTreeMap::new();
        for (seq, comp) in pairs {
            let offsets: BTreeSet<i32> = (0..polymer.len())
                .filter(|&pos| {
                    let reference = polymer.comp_at(pos).map(|c| c.as_str());
                    polymer.comp_matches(pos, &nomenclature.standardize_residue(comp, reference))
                })
                .filter_map(|pos| polymer.auth_seq_id.get(pos).map(|auth| auth - seq))
                .filter(|&delta| delta != 0)
                .collect();
            for delta in offsets {
                *votes.entry(delta).or_default() += 1;
            }
        }
        let Some((&delta, &count)) = votes
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.abs().cmp(&a.0.abs())))
        else {
            continue;
        };
        let better = match &best {
            None => true,
            Some((chain, _, best_count)) => {
                count > *best_count
                    || (count == *best_count
                        && preferred == Some(&polymer.chain_id)
                        && preferred != Some(chain))
            }
        };
        if better {
            best = Some((polymer.chain_id.clone(), delta, count));
        }
    }

    let (chain, delta, count) = best?;
    if count < MIN_OFFSET_VOTES || count * 5 < pairs.len() * 4 {
        return None;
    }
    let map = pairs
        .iter()
        .filter(|(seq, comp)| matches_at(coords, nomenclature, &chain, seq + delta, comp))
        .map(|(seq, _)| (*seq, seq + delta))
        .collect();
    log::debug!("labels of chain {chain} are offset by {delta} from author numbering");
    Some((chain, map))
}
