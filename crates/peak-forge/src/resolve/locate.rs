//! Placement of a labelled residue onto the coordinate model.

use super::Resolver;
use crate::model::coords::{NonPolymer, PolymerSequence};
use crate::model::reparse::per_list;
use crate::nomenclature::Nomenclature;
use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numbering {
    Auth,
    Label,
}

/// A residue of the model a label may refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub chain_id: SmolStr,
    /// Author sequence number.
    pub seq_id: i32,
    /// Composition recorded in the model.
    pub comp_id: SmolStr,
    pub polymer: bool,
    pub numbering: Numbering,
    /// Within the configured distance of a chain end.
    pub near_terminus: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Found(Vec<Site>),
    /// The number exists but carries a different residue.
    Mismatch(Site),
    /// The number lies beyond a chain terminus by no more than the configured distance.
    Extended { chain_id: SmolStr, seq_id: i32 },
    Missing,
}

pub(super) type LocateKey = (Option<SmolStr>, i32, Option<SmolStr>, bool);

impl Site {
    fn on_polymer(polymer: &PolymerSequence, pos: usize, numbering: Numbering, reach: usize) -> Option<Self> {
        Some(Self {
            chain_id: polymer.chain_id.clone(),
            seq_id: *polymer.auth_seq_id.get(pos)?,
            comp_id: polymer.comp_at(pos)?.clone(),
            polymer: true,
            numbering,
            near_terminus: pos < reach || pos + reach >= polymer.len(),
        })
    }

    pub(super) fn on_ligand(ligand: &NonPolymer) -> Self {
        Self {
            chain_id: ligand.chain_id.clone(),
            seq_id: ligand.seq_id,
            comp_id: ligand.comp_id.clone(),
            polymer: false,
            numbering: Numbering::Auth,
            near_terminus: false,
        }
    }
}

impl<N: Nomenclature + ?Sized> Resolver<'_, N> {
    /// Locates a residue, consulting the memo table first.
    ///
    /// # Arguments
    ///
    /// * `chain` - Chain named by the label, if any.
    /// * `seq` - Sequence number as written.
    /// * `comp` - Standardized component named by the label, if any.
    pub(super) fn locate(&self, chain: Option<&str>, seq: i32, comp: Option<&str>) -> Location {
        let label_fallback = self.auth_balance < self.config.prefer_auth_threshold;
        let key: LocateKey = (chain.map(SmolStr::new), seq, comp.map(SmolStr::new), label_fallback);
        if let Some(hit) = self.locate_cache.borrow_mut().get(&key) {
            return hit.clone();
        }
        let location = self.compute_location(chain, seq, comp, label_fallback);
        self.locate_cache.borrow_mut().put(key, location.clone());
        location
    }

    fn remap_seq(&self, chain: &str, seq: i32) -> i32 {
        self.previous
            .seq_id_remap
            .get(chain)
            .and_then(|m| m.get(&seq))
            .copied()
            .unwrap_or(seq)
    }

    /// Applies the chain-level renumbering learned by an earlier pass.
    fn remap_chain(&self, chain: &str, seq: i32) -> (SmolStr, i32) {
        for remaps in [
            &self.previous.chain_seq_id_remap,
            &self.previous.ext_chain_seq_id_remap,
        ] {
            if let Some(remap) = remaps.get(chain) {
                if let Some(&target) = remap.seq_id.get(&seq) {
                    return (remap.chain_id.clone(), target);
                }
            }
        }
        let chain = self
            .previous
            .chain_id_remap
            .get(chain)
            .cloned()
            .unwrap_or_else(|| SmolStr::new(chain));
        let seq = self.remap_seq(&chain, seq);
        (chain, seq)
    }

    pub(super) fn default_chain(&self) -> Option<&SmolStr> {
        per_list(&self.previous.default_seg_id, self.list?)
    }

    fn label_first(&self) -> bool {
        self.previous.label_seq_scheme
            || self
                .list
                .and_then(|list| per_list(&self.previous.local_seq_scheme, list))
                .copied()
                .unwrap_or(false)
    }

    fn remapped_ligand(&self, seq: i32, comp: &str) -> Option<Site> {
        [&self.previous.non_poly_remap, &self.previous.branched_remap]
            .into_iter()
            .filter_map(|remap| remap.get(comp)?.get(&seq))
            .find_map(|key| self.coords.non_polymer_at(&key.chain_id, key.seq_id))
            .map(Site::on_ligand)
    }

    fn compute_location(
        &self,
        chain: Option<&str>,
        seq: i32,
        comp: Option<&str>,
        label_fallback: bool,
    ) -> Location {
        if let Some(site) = comp.and_then(|c| self.remapped_ligand(seq, c)) {
            return Location::Found(vec![site]);
        }

        let mut targets: Vec<(SmolStr, i32)> = Vec::new();
        match chain {
            Some(chain) => targets.push(self.remap_chain(chain, seq)),
            None => {
                let preferred = self.default_chain().cloned();
                let chains = preferred
                    .into_iter()
                    .chain(self.coords.polymers().iter().map(|p| p.chain_id.clone()));
                for chain in chains {
                    if targets.iter().all(|(c, _)| *c != chain) {
                        let seq = self.remap_seq(&chain, seq);
                        targets.push((chain, seq));
                    }
                }
            }
        }

        let reach = usize::try_from(self.config.max_allowed_ext_seq).unwrap_or(0);
        let plain_comp = comp.map(|c| self.nomenclature.standardize_residue(c, None));
        let label_first = self.label_first();
        let mut found = Vec::new();
        let mut mismatch = None;
        let mut extended = None;

        for (chain_id, seq_id) in &targets {
            if let Some(polymer) = self.coords.polymer(chain_id) {
                let matches = |pos: usize| {
                    comp.is_none_or(|c| {
                        let reference = polymer.comp_at(pos).map(|r| r.as_str());
                        polymer.comp_matches(pos, &self.nomenclature.standardize_residue(c, reference))
                    })
                };
                let auth_pos = polymer.locate_auth(*seq_id, plain_comp.as_deref());
                let label_pos = polymer.position_of_label(*seq_id);
                let order = if label_first {
                    [(label_pos, Numbering::Label), (auth_pos, Numbering::Auth)]
                } else if label_fallback {
                    [(auth_pos, Numbering::Auth), (label_pos, Numbering::Label)]
                } else {
                    [(auth_pos, Numbering::Auth), (None, Numbering::Label)]
                };

                let mut hit = None;
                for (pos, numbering) in order {
                    let Some(pos) = pos else { continue };
                    if matches(pos) {
                        hit = Site::on_polymer(polymer, pos, numbering, reach);
                        break;
                    }
                    if mismatch.is_none() {
                        mismatch = Site::on_polymer(polymer, pos, numbering, reach);
                    }
                }

                if let Some(site) = hit {
                    found.push(site);
                } else if auth_pos.is_none() && extended.is_none() {
                    let pinned = self
                        .previous
                        .extend_seq_scheme
                        .get(chain_id)
                        .is_some_and(|s| s.contains(seq_id));
                    let near = polymer
                        .distance_beyond_terminus(*seq_id)
                        .is_some_and(|d| d <= self.config.max_allowed_ext_seq);
                    if pinned || near {
                        extended = Some((chain_id.clone(), *seq_id));
                    }
                }
            }

            found.extend(
                self.coords
                    .non_polymers()
                    .iter()
                    .filter(|n| n.chain_id == *chain_id && n.seq_id == *seq_id)
                    .filter(|n| comp.is_none_or(|c| n.comp_matches(c)))
                    .map(Site::on_ligand),
            );
        }

        if let (None, Some(comp)) = (chain, comp) {
            for ligand in self.coords.non_polymers_matching(comp) {
                let site = Site::on_ligand(ligand);
                if ligand.seq_id == seq && !found.contains(&site) {
                    found.push(site);
                }
            }
        }

        if !found.is_empty() {
            Location::Found(found)
        } else if let Some(site) = mismatch {
            Location::Mismatch(site)
        } else if let Some((chain_id, seq_id)) = extended {
            Location::Extended { chain_id, seq_id }
        } else {
            Location::Missing
        }
    }
}
