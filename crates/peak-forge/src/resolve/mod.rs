//! Resolution of free-form peak labels into coordinate-grounded assignments.
//!
//! A label is split into tokens, every token is read in all the ways the label grammar
//! allows, and a small beam of hypotheses is ranked by how well each one validates against
//! the coordinate model and the component dictionary. The best hypothesis is then mapped
//! atom by atom, producing assignment rows and per-peak diagnostics. Evidence that a second
//! pass would resolve more labels is collected as [`Observations`].

mod locate;
mod observe;
pub mod token;

pub use locate::{Location, Numbering, Site};
pub use observe::Observations;

use crate::config::ParserConfig;
use crate::model::assignment::{Assignment, AssignmentRow};
use crate::model::coords::{AtomPresence, CoordinateContext, NonPolymer};
use crate::model::diagnostic::{DiagnosticKind, ListRef};
use crate::model::peak::{PeakLabel, is_null_token};
use crate::model::reparse::ReparseReasons;
use crate::model::types::{ComponentKind, Nucleus, PolymerType};
use crate::nomenclature::{AtomGroup, Nomenclature, normalize_token};
use locate::LocateKey;
use lru::LruCache;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use token::{Lexicon, Piece, Reading};

/// Hypotheses kept between tokens.
const BEAM_WIDTH: usize = 8;

/// A diagnostic raised while resolving one peak.
pub type Note = (DiagnosticKind, String);

/// The list a label belongs to and the nuclei of its dimensions.
#[derive(Debug, Clone, Copy)]
pub struct LabelScope<'s> {
    pub list: ListRef,
    pub nuclei: &'s [Option<Nucleus>],
}

impl LabelScope<'_> {
    /// Bond-graph rescue is only attempted for lists whose every dimension is a proton.
    pub fn all_proton(&self) -> bool {
        !self.nuclei.is_empty() && self.nuclei.iter().all(|n| *n == Some(Nucleus::H))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub rows: Vec<AssignmentRow>,
    pub notes: Vec<Note>,
    /// The label named more atoms than the list has dimensions, or several alternatives.
    pub surplus: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ResidueHyp {
    chain: Option<SmolStr>,
    seq: Option<i32>,
    comp: Option<SmolStr>,
}

#[derive(Debug, Clone)]
struct AtomHyp {
    residue: usize,
    token: usize,
    label: usize,
    name: SmolStr,
}

#[derive(Debug, Clone, Default)]
struct Hypothesis {
    residues: Vec<ResidueHyp>,
    atoms: Vec<AtomHyp>,
}

impl Hypothesis {
    fn open(&mut self, residue: ResidueHyp) {
        let last_has_atoms = self
            .atoms
            .last()
            .is_some_and(|a| a.residue + 1 == self.residues.len());
        match self.residues.last_mut() {
            Some(last) if !last_has_atoms => *last = residue,
            _ => self.residues.push(residue),
        }
    }

    fn apply(&self, reading: &Reading, token: usize, label: usize) -> Hypothesis {
        let mut next = self.clone();
        let mut current = next.residues.last().cloned().unwrap_or_default();
        let mut changed = false;
        let mut comp_here = false;

        for piece in reading {
            match piece {
                Piece::Chain(chain) => {
                    current = ResidueHyp {
                        chain: Some(chain.clone()),
                        ..ResidueHyp::default()
                    };
                    changed = true;
                }
                Piece::Seq(seq) => {
                    if current.seq.is_some() && !comp_here {
                        current.comp = None;
                    }
                    current.seq = Some(*seq);
                    changed = true;
                }
                Piece::Comp(comp) => {
                    current.comp = Some(comp.clone());
                    comp_here = true;
                    changed = true;
                }
                Piece::Atom(name) => {
                    if changed || next.residues.is_empty() {
                        next.open(current.clone());
                        changed = false;
                    }
                    next.atoms.push(AtomHyp {
                        residue: next.residues.len() - 1,
                        token,
                        label,
                        name: name.clone(),
                    });
                }
            }
        }
        if changed {
            next.open(current);
        }
        next
    }
}

/// Where an atom of a resolved residue is written.
struct Target {
    chain_id: SmolStr,
    seq_id: i32,
    comp_id: SmolStr,
    as_is: bool,
}

/// Label resolver for one parse pass.
pub struct Resolver<'a, N: Nomenclature + ?Sized> {
    coords: &'a CoordinateContext,
    nomenclature: &'a N,
    config: &'a ParserConfig,
    previous: &'a ReparseReasons,
    coord_comps: HashSet<SmolStr>,
    polymer_type: Option<PolymerType>,
    list: Option<ListRef>,
    auth_balance: i32,
    locate_cache: RefCell<LruCache<LocateKey, Location>>,
    observations: Observations,
}

impl<'a, N: Nomenclature + ?Sized> Resolver<'a, N> {
    /// Creates a resolver.
    ///
    /// # Arguments
    ///
    /// * `coords` - The deposited structure.
    /// * `nomenclature` - Residue and atom naming service.
    /// * `config` - Engine thresholds.
    /// * `previous` - Reasons produced by an earlier pass; empty on the first pass.
    pub fn new(
        coords: &'a CoordinateContext,
        nomenclature: &'a N,
        config: &'a ParserConfig,
        previous: &'a ReparseReasons,
    ) -> Self {
        let mut coord_comps = HashSet::new();
        for polymer in coords.polymers() {
            coord_comps.extend(polymer.comp_id.iter().cloned());
            coord_comps.extend(polymer.auth_comp_id.iter().cloned());
            coord_comps.extend(polymer.alt_comp_id.iter().flatten().cloned());
        }
        for ligand in coords.non_polymers() {
            coord_comps.insert(ligand.comp_id.clone());
            coord_comps.extend(ligand.alt_comp_id.iter().cloned());
        }

        Self {
            coords,
            nomenclature,
            config,
            previous,
            coord_comps,
            polymer_type: coords
                .uniform_polymer_type()
                .filter(|t| *t != PolymerType::Other),
            list: None,
            auth_balance: 0,
            locate_cache: RefCell::new(LruCache::new(config.cache_capacity())),
            observations: Observations::default(),
        }
    }

    /// Starts resolving labels of another list.
    pub fn begin_list(&mut self, list: ListRef) {
        self.list = Some(list);
        self.locate_cache.borrow_mut().clear();
    }

    /// Turns the evidence collected so far into reparse reasons and drops memo tables.
    pub fn take_reasons(&mut self) -> ReparseReasons {
        self.locate_cache.borrow_mut().clear();
        std::mem::take(&mut self.observations).into_reasons(self.coords, self.nomenclature)
    }

    /// Resolves one peak label.
    ///
    /// # Arguments
    ///
    /// * `label` - The label as deposited, whole or per dimension.
    /// * `scope` - The list and its dimension nuclei.
    ///
    /// # Returns
    ///
    /// Assignment rows (possibly partial, never longer than the list's dimensionality),
    /// diagnostics for atoms that could not be placed, and whether the label named surplus
    /// atoms.
    pub fn resolve(&mut self, label: &PeakLabel, scope: &LabelScope<'_>) -> Resolution {
        if self.list != Some(scope.list) {
            self.begin_list(scope.list);
        }
        let n = scope.nuclei.len();
        let (tokens, per_dim): (Vec<(usize, &str)>, bool) = match label {
            PeakLabel::Whole(text) if !is_null_token(text) => {
                (token::split_label(text).into_iter().map(|t| (0, t)).collect(), false)
            }
            PeakLabel::Whole(_) => (Vec::new(), false),
            PeakLabel::PerDim(labels) => {
                let tokens = labels
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| !is_null_token(l))
                    .flat_map(|(i, l)| token::split_label(l).into_iter().map(move |t| (i, t)))
                    .collect();
                (tokens, true)
            }
        };

        let best = self.parse(&tokens, scope.all_proton());
        let mut notes = Vec::new();
        let mut mapped: Vec<(usize, Vec<Assignment>)> = Vec::with_capacity(best.atoms.len());
        for atom in &best.atoms {
            let residue = &best.residues[atom.residue];
            let alternatives = self.map_atom(residue, &atom.name, scope, per_dim, &mut notes);
            mapped.push((atom.label, alternatives));
        }

        let atom_count = mapped.len();
        let slots = if per_dim {
            let mut slots = vec![Vec::new(); n];
            for (label, alternatives) in mapped {
                if let Some(slot) = slots.get_mut(label) {
                    slot.extend(alternatives);
                }
            }
            slots
        } else {
            align_to_nuclei(mapped.into_iter().map(|(_, a)| a).collect(), scope.nuclei)
        };
        let rows = build_rows(slots, n, self.config.max_rows_per_peak);
        Resolution {
            surplus: atom_count > n || rows.len() > 1,
            rows,
            notes,
        }
    }

    fn parse(&self, tokens: &[(usize, &str)], all_proton: bool) -> Hypothesis {
        let mut beam = vec![Hypothesis::default()];
        for (index, (label, text)) in tokens.iter().enumerate() {
            let readings = token::readings(text, self);
            if readings.is_empty() {
                log::debug!("token '{text}' has no reading");
                continue;
            }
            let mut next: Vec<(i32, Hypothesis)> = beam
                .iter()
                .flat_map(|h| readings.iter().map(move |r| h.apply(r, index, *label)))
                .map(|h| (self.score(&h, all_proton), h))
                .collect();
            next.sort_by(|a, b| b.0.cmp(&a.0));
            next.truncate(BEAM_WIDTH);
            beam = next.into_iter().map(|(_, h)| h).collect();
        }
        beam.into_iter().next().unwrap_or_default()
    }

    fn score(&self, h: &Hypothesis, all_proton: bool) -> i32 {
        let mut total: i32 = h.residues.iter().map(|r| self.residue_score(r)).sum();
        for group in h.atoms.chunk_by(|a, b| a.token == b.token) {
            let invalid = group
                .iter()
                .filter(|a| !self.atom_valid(&h.residues[a.residue], &a.name, all_proton))
                .count() as i32;
            total += if invalid == 0 {
                5 - group.len() as i32
            } else {
                -2 * invalid
            };
        }
        total
    }

    fn residue_score(&self, r: &ResidueHyp) -> i32 {
        let Some(seq) = r.seq else {
            return match (&r.chain, &r.comp) {
                (Some(chain), _) if !self.is_chain(chain) => -1,
                (Some(_), _) => 1,
                (None, Some(comp)) if self.ligand_for(None, comp).is_some() => 1,
                _ => 0,
            };
        };
        match self.locate(r.chain.as_deref(), seq, r.comp.as_deref()) {
            Location::Found(_) => 3 + i32::from(r.comp.is_some()) + i32::from(r.chain.is_some()),
            Location::Mismatch(_) => -1,
            Location::Extended { .. } => {
                if r.comp.as_deref().is_some_and(|c| self.nomenclature.is_standard_monomer(c)) {
                    1
                } else {
                    -1
                }
            }
            Location::Missing => -2,
        }
    }

    /// Component (and model site, when located) an atom of the hypothesised residue belongs to.
    fn target_comp(&self, r: &ResidueHyp) -> Option<(SmolStr, Option<Site>)> {
        let Some(seq) = r.seq else {
            let comp = r.comp.as_ref()?;
            let ligand = self.ligand_for(r.chain.as_deref(), comp)?;
            return Some((ligand.comp_id.clone(), Some(Site::on_ligand(ligand))));
        };
        match self.locate(r.chain.as_deref(), seq, r.comp.as_deref()) {
            Location::Found(sites) => {
                let site = self.pick(&sites, r.chain.is_none())?.clone();
                Some((site.comp_id.clone(), Some(site)))
            }
            _ => r.comp.clone().map(|c| (c, None)),
        }
    }

    fn atom_valid(&self, r: &ResidueHyp, name: &str, all_proton: bool) -> bool {
        let Some((comp, site)) = self.target_comp(r) else {
            return false;
        };
        if self.nomenclature.component_kind(&comp).is_some() {
            return !self.nomenclature.expand_atom(&comp, name).is_empty()
                || (all_proton && self.nomenclature.rescue_atom(&comp, name).is_some());
        }
        site.is_some_and(|s| {
            matches!(
                self.coords
                    .atom_presence(&s.chain_id, s.seq_id, &comp, &normalize_token(name)),
                AtomPresence::Observed | AtomPresence::Unobserved
            )
        })
    }

    fn ligand_for(&self, chain: Option<&str>, comp: &str) -> Option<&'a NonPolymer> {
        self.coords
            .non_polymers()
            .iter()
            .find(|n| n.comp_matches(comp) && chain.is_none_or(|c| n.chain_id == c))
    }

    /// Chooses among equally valid sites, honouring a default segment learned earlier.
    fn pick<'s>(&self, sites: &'s [Site], chainless: bool) -> Option<&'s Site> {
        if chainless {
            if let Some(default) = self.default_chain() {
                let clones = self.previous.chain_id_clone.get(default);
                let preferred = sites.iter().find(|s| s.chain_id == *default).or_else(|| {
                    sites
                        .iter()
                        .find(|s| clones.is_some_and(|c| c.contains(&s.chain_id)))
                });
                if preferred.is_some() {
                    return preferred;
                }
            }
        }
        sites.first()
    }

    fn place(&mut self, r: &ResidueHyp, name: &str, notes: &mut Vec<Note>) -> Option<Target> {
        let Some(seq) = r.seq else {
            if let Some(ligand) = r.comp.as_ref().and_then(|c| self.ligand_for(r.chain.as_deref(), c)) {
                return Some(Target {
                    chain_id: ligand.chain_id.clone(),
                    seq_id: ligand.seq_id,
                    comp_id: ligand.comp_id.clone(),
                    as_is: false,
                });
            }
            notes.push((
                DiagnosticKind::SequenceMismatch,
                format!("No residue could be identified for atom '{name}'"),
            ));
            return None;
        };

        let described = describe(r, seq);
        match self.locate(r.chain.as_deref(), seq, r.comp.as_deref()) {
            Location::Found(sites) => {
                let site = self.pick(&sites, r.chain.is_none())?.clone();
                let list = self.list?;
                let chains: BTreeSet<&SmolStr> = sites.iter().map(|s| &s.chain_id).collect();
                if r.chain.is_none() && chains.len() > 1 {
                    self.observations.implicit_chain(list, &site.chain_id);
                }
                if site.polymer {
                    let by_label = site.numbering == Numbering::Label;
                    self.observations.numbering_hit(list, by_label);
                    self.auth_balance += if by_label { -1 } else { 1 };
                }
                Some(Target {
                    chain_id: site.chain_id,
                    seq_id: site.seq_id,
                    comp_id: site.comp_id,
                    as_is: false,
                })
            }
            Location::Mismatch(site) => {
                let comp = r.comp.clone()?;
                if site.near_terminus && self.nomenclature.is_standard_monomer(&comp) {
                    notes.push((
                        DiagnosticKind::SequenceMismatchWarning,
                        format!(
                            "Residue {described} is {} {} of chain {} in the coordinates; the assignment is kept as-is",
                            site.comp_id, site.seq_id, site.chain_id
                        ),
                    ));
                    return Some(Target {
                        chain_id: site.chain_id,
                        seq_id: site.seq_id,
                        comp_id: comp,
                        as_is: true,
                    });
                }
                notes.push((
                    DiagnosticKind::SequenceMismatch,
                    format!(
                        "Residue {described} does not match {} {} of chain {}",
                        site.comp_id, site.seq_id, site.chain_id
                    ),
                ));
                self.observations.unmatched(r.chain.as_ref(), seq, &comp);
                None
            }
            Location::Extended { chain_id, seq_id } => {
                match r.comp.clone().filter(|c| self.nomenclature.is_standard_monomer(c)) {
                    Some(comp) => {
                        notes.push((
                            DiagnosticKind::SequenceMismatchWarning,
                            format!(
                                "Residue {described} lies beyond the modelled terminus of chain {chain_id}; the assignment is kept as-is"
                            ),
                        ));
                        self.observations.extended(&chain_id, seq_id, r.chain.as_ref());
                        Some(Target {
                            chain_id,
                            seq_id,
                            comp_id: comp,
                            as_is: true,
                        })
                    }
                    None => {
                        notes.push((
                            DiagnosticKind::SequenceMismatch,
                            format!("Residue {described} was not found in chain {chain_id}"),
                        ));
                        None
                    }
                }
            }
            Location::Missing => {
                notes.push((
                    DiagnosticKind::SequenceMismatch,
                    format!("Residue {described} was not found in the coordinates"),
                ));
                if let Some(comp) = &r.comp {
                    self.observations.unmatched(r.chain.as_ref(), seq, comp);
                    if let Some(ligand) = self.ligand_for(r.chain.as_deref(), comp) {
                        self.observations
                            .non_polymer(comp, seq, ligand.key(), ligand.branched);
                    }
                }
                None
            }
        }
    }

    fn map_atom(
        &mut self,
        r: &ResidueHyp,
        name: &str,
        scope: &LabelScope<'_>,
        unique: bool,
        notes: &mut Vec<Note>,
    ) -> Vec<Assignment> {
        let Some(target) = self.place(r, name, notes) else {
            return Vec::new();
        };
        let comp = target.comp_id.clone();
        let known = self.nomenclature.component_kind(&comp).is_some();
        let expansion = self.nomenclature.expand_atom(&comp, name);

        let mut ids = expansion.atom_ids;
        if known && ids.is_empty() && scope.all_proton() {
            ids.extend(self.nomenclature.rescue_atom(&comp, name));
        }
        if ids.is_empty() {
            notes.push((
                DiagnosticKind::InvalidAtomNomenclature,
                format!(
                    "'{name}' is not an atom of {comp} {} in chain {}",
                    target.seq_id, target.chain_id
                ),
            ));
            return Vec::new();
        }

        if !target.as_is {
            for id in &ids {
                let presence =
                    self.coords
                        .atom_presence(&target.chain_id, target.seq_id, &comp, id);
                if presence != AtomPresence::Absent {
                    continue;
                }
                if !known {
                    notes.push((
                        DiagnosticKind::AtomNotFound,
                        format!(
                            "Atom {id} of {comp} {} in chain {} is not in the coordinates",
                            target.seq_id, target.chain_id
                        ),
                    ));
                    return Vec::new();
                }
                if let Some(note) = self.absent_atom(&target, id) {
                    notes.push(note);
                }
            }
        }

        let make = |atom_id: &str, ambiguity_code: Option<u8>| Assignment {
            chain_id: target.chain_id.clone(),
            seq_id: target.seq_id,
            comp_id: comp.clone(),
            atom_id: SmolStr::new(atom_id),
            auth_atom_id: SmolStr::new(name),
            ambiguity_code,
            as_is: target.as_is,
        };

        if ids.len() == 1 {
            return vec![make(ids[0].as_str(), None)];
        }
        let refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        match self.nomenclature.atom_group(&comp, &refs) {
            AtomGroup::Methyl { representative } => vec![make(representative.as_str(), Some(1))],
            AtomGroup::Mixed if unique => {
                notes.push((
                    DiagnosticKind::InvalidAtomSelection,
                    format!(
                        "'{name}' matches {} unrelated atoms of {comp} {} in chain {}",
                        ids.len(),
                        target.seq_id,
                        target.chain_id
                    ),
                ));
                Vec::new()
            }
            AtomGroup::Mixed => ids.iter().map(|id| make(id.as_str(), None)).collect(),
            AtomGroup::Single | AtomGroup::Geminal | AtomGroup::Aromatic => {
                let code = self.nomenclature.max_ambiguity_code(&comp, name);
                ids.iter().map(|id| make(id.as_str(), Some(code))).collect()
            }
        }
    }

    /// Diagnostic for a dictionary atom missing from an otherwise modelled residue.
    fn absent_atom(&self, target: &Target, atom_id: &str) -> Option<Note> {
        let (chain, seq, comp) = (&target.chain_id, target.seq_id, &target.comp_id);
        let has_protons = self
            .coords
            .residue_atoms(chain, seq)
            .is_some_and(|atoms| atoms.iter().any(|a| a.starts_with('H')));
        if atom_id.starts_with('H') && !has_protons {
            return Some((
                DiagnosticKind::HydrogenNotInstantiated,
                format!("Hydrogens of {comp} {seq} in chain {chain} are not instantiated in the coordinates"),
            ));
        }
        // A cyclic chain has no free carboxyl on its last residue.
        let cyclic_carboxyl = matches!(atom_id, "OXT" | "HXT")
            && self.coords.is_cyclic(chain)
            && self
                .coords
                .polymer(chain)
                .is_some_and(|p| p.is_c_terminal(seq));
        if cyclic_carboxyl {
            return None;
        }
        Some((
            DiagnosticKind::CoordinateIssue,
            format!("Atom {atom_id} of {comp} {seq} in chain {chain} is missing from the coordinates"),
        ))
    }
}

impl<N: Nomenclature + ?Sized> Lexicon for Resolver<'_, N> {
    fn residue_name(&self, text: &str) -> Option<SmolStr> {
        let standard = self.nomenclature.standardize_residue(text, None);
        let known = self.nomenclature.component_kind(&standard).is_some()
            || self.coord_comps.contains(&standard)
            || self.coord_comps.contains(text);
        known.then_some(standard)
    }

    fn one_letter(&self, code: char) -> Option<SmolStr> {
        self.nomenclature.one_letter_comp(code, self.polymer_type?)
    }

    fn is_chain(&self, text: &str) -> bool {
        self.coords.has_chain(text)
            || self.previous.chain_id_remap.contains_key(text)
            || self.previous.chain_seq_id_remap.contains_key(text)
    }

    fn is_ion(&self, comp_id: &str) -> bool {
        self.nomenclature.component_kind(comp_id) == Some(ComponentKind::Ion)
    }
}

fn describe(r: &ResidueHyp, seq: i32) -> String {
    let mut out = String::new();
    if let Some(chain) = &r.chain {
        out.push_str(chain);
        out.push(':');
    }
    out.push_str(&seq.to_string());
    if let Some(comp) = &r.comp {
        out.push(' ');
        out.push_str(comp);
    }
    out
}

/// Reorders one slot per dimension so that atom elements follow the dimension nuclei.
///
/// The order is left alone unless every slot finds a distinct dimension.
fn align_to_nuclei(slots: Vec<Vec<Assignment>>, nuclei: &[Option<Nucleus>]) -> Vec<Vec<Assignment>> {
    if slots.len() != nuclei.len() || slots.iter().any(|s| s.is_empty()) {
        return slots;
    }
    let slot_nucleus: Vec<Option<Nucleus>> = slots
        .iter()
        .map(|s| s.first().and_then(|a| Nucleus::from_atom_id(&a.atom_id)))
        .collect();
    let mut used = vec![false; slots.len()];
    let mut order = Vec::with_capacity(slots.len());
    for nucleus in nuclei {
        let Some(nucleus) = nucleus else {
            return slots;
        };
        let Some(i) = (0..slots.len()).find(|&i| !used[i] && slot_nucleus[i] == Some(*nucleus)) else {
            return slots;
        };
        used[i] = true;
        order.push(i);
    }
    let mut taken: Vec<Option<Vec<Assignment>>> = slots.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| taken[i].take()).collect()
}

/// Spreads atom slots over rows of `n` dimensions.
///
/// Slot counts that are a multiple of `n` give one row group per chunk; a remainder is
/// folded into alternatives of the last dimension. Alternatives within a group expand to
/// their cross product, capped at `cap` rows overall.
fn build_rows(slots: Vec<Vec<Assignment>>, n: usize, cap: usize) -> Vec<AssignmentRow> {
    if n == 0 || slots.iter().all(|s| s.is_empty()) {
        return Vec::new();
    }
    let groups: Vec<Vec<Vec<Assignment>>> = if slots.len() <= n {
        let mut group = slots;
        group.resize(n, Vec::new());
        vec![group]
    } else if slots.len() % n == 0 {
        slots.chunks(n).map(|c| c.to_vec()).collect()
    } else {
        let mut group = slots;
        let tail: Vec<Assignment> = group.split_off(n - 1).into_iter().flatten().collect();
        group.push(tail);
        vec![group]
    };

    let mut rows: Vec<AssignmentRow> = Vec::new();
    for group in groups {
        let mut partial: Vec<AssignmentRow> = vec![Vec::with_capacity(n)];
        for slot in &group {
            let room = cap.saturating_sub(rows.len()).max(1);
            let mut next = Vec::new();
            'rows: for row in &partial {
                if slot.is_empty() {
                    let mut r = row.clone();
                    r.push(None);
                    next.push(r);
                    continue;
                }
                for assignment in slot {
                    if next.len() >= room {
                        break 'rows;
                    }
                    let mut r = row.clone();
                    r.push(Some(assignment.clone()));
                    next.push(r);
                }
            }
            partial = next;
        }
        let room = cap.saturating_sub(rows.len());
        if partial.len() > room {
            log::debug!("alternative rows capped at {cap}");
        }
        rows.extend(partial.into_iter().take(room));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::assignment::{RowState, row_state};
    use crate::model::coords::{CoordinateSnapshot, EntityAssembly, PolymerSequence, ResidueAtoms};
    use crate::nomenclature::ChemCompDictionary;

    fn coords() -> CoordinateContext {
        let mut comps = vec![
            "MET", "ALA", "GLY", "LEU", "SER", "THR", "VAL", "LYS", "GLU", "ASN", "ILE", "PHE",
            "GLN", "TRP", "ARG", "TYR", "HIS", "PRO", "CYS", "ALA",
        ];
        comps.extend(["GLY", "SER", "ASP", "LEU", "LYS"]);
        let mut chain = PolymerSequence::contiguous("A", 1, &comps);
        for (i, auth) in chain.auth_seq_id.iter_mut().enumerate().skip(20) {
            *auth = 137 + (i as i32 - 20);
        }
        chain.entity_id = Some(1);
        chain.gap_in_auth_seq = true;
        CoordinateSnapshot {
            polymers: vec![chain],
            non_polymers: vec![NonPolymer {
                chain_id: "B".into(),
                seq_id: 201,
                comp_id: "ZN".into(),
                ..Default::default()
            }],
            observed_atoms: vec![ResidueAtoms {
                chain_id: "A".into(),
                seq_id: 5,
                atom_ids: ["N", "CA", "O", "CB"].into_iter().map(SmolStr::new).collect(),
            }],
            entity_assembly: vec![EntityAssembly {
                entity_id: 1,
                chain_ids: vec!["A".into()],
                polymer_type: Some("polypeptide(L)".into()),
            }],
            exptl_method: "SOLUTION NMR".into(),
            ..Default::default()
        }
        .into()
    }

    struct Fixture {
        coords: CoordinateContext,
        dict: ChemCompDictionary,
        config: ParserConfig,
        previous: ReparseReasons,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                coords: coords(),
                dict: ChemCompDictionary::default(),
                config: ParserConfig::default(),
                previous: ReparseReasons::default(),
            }
        }

        fn resolver(&self) -> Resolver<'_, ChemCompDictionary> {
            Resolver::new(&self.coords, &self.dict, &self.config, &self.previous)
        }
    }

    fn whole(text: &str) -> PeakLabel {
        PeakLabel::Whole(text.to_string())
    }

    fn single(resolution: &Resolution) -> &Assignment {
        resolution.rows[0][0].as_ref().expect("assigned")
    }

    const H1: &[Option<Nucleus>] = &[Some(Nucleus::H)];

    fn scope(nuclei: &[Option<Nucleus>]) -> LabelScope<'_> {
        LabelScope {
            list: ListRef {
                num_dim: nuclei.len(),
                list_id: 1,
            },
            nuclei,
        }
    }

    #[test]
    fn residue_then_atom_label_resolves_to_one_atom() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("14Trp.Hh2"), &scope(H1));
        assert_eq!(r.rows.len(), 1);
        let a = single(&r);
        assert_eq!(a.to_string(), "A:14:TRP:HH2");
        assert!(r.notes.is_empty());
    }

    #[test]
    fn straddling_number_prefers_the_validating_partition() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("D1391HB"), &scope(H1));
        let a = single(&r);
        assert_eq!((a.seq_id, a.comp_id.as_str(), a.atom_id.as_str()), (139, "ASP", "HB2"));
        assert_eq!(a.auth_atom_id, "1HB");
    }

    #[test]
    fn canonical_form_resolves_to_itself() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let first = resolver.resolve(&whole("14Trp.Hh2"), &scope(H1));
        let canonical = single(&first).to_string();
        let again = resolver.resolve(&whole(&canonical), &scope(H1));
        assert_eq!(single(&again).to_string(), canonical);
    }

    #[test]
    fn per_dimension_labels_inherit_residue_context() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let nuclei = [Some(Nucleus::H), Some(Nucleus::N)];
        let label = PeakLabel::PerDim(vec!["W14HN".into(), "N".into()]);
        let r = resolver.resolve(&label, &scope(&nuclei));
        assert_eq!(r.rows.len(), 1);
        assert_eq!(row_state(&r.rows[0]), RowState::Complete);
        let atoms: Vec<&str> = r.rows[0].iter().flatten().map(|a| a.atom_id.as_str()).collect();
        assert_eq!(atoms, vec!["H", "N"]);
        assert!(r.rows[0].iter().flatten().all(|a| a.seq_id == 14));
    }

    #[test]
    fn atoms_are_aligned_with_dimension_nuclei() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let nuclei = [Some(Nucleus::H), Some(Nucleus::N)];
        let r = resolver.resolve(&whole("W14N-W14H"), &scope(&nuclei));
        let atoms: Vec<&str> = r.rows[0].iter().flatten().map(|a| a.atom_id.as_str()).collect();
        assert_eq!(atoms, vec!["H", "N"]);
    }

    #[test]
    fn methyl_pseudo_atom_collapses_to_its_representative() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("A2QB"), &scope(H1));
        assert_eq!(r.rows.len(), 1);
        let a = single(&r);
        assert_eq!(a.atom_id, "HB1");
        assert_eq!(a.ambiguity_code, Some(1));
    }

    #[test]
    fn geminal_wildcard_yields_alternative_rows() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("S5HB*"), &scope(H1));
        assert_eq!(r.rows.len(), 2);
        assert!(r.surplus);
        assert!(r.rows.iter().flatten().flatten().all(|a| a.ambiguity_code == Some(2)));
    }

    #[test]
    fn unknown_residue_number_raises_sequence_mismatch() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("Gly90HA2"), &scope(H1));
        assert!(r.rows.iter().flatten().all(|a| a.is_none()));
        assert!(r.notes.iter().any(|(k, _)| *k == DiagnosticKind::SequenceMismatch));
    }

    #[test]
    fn label_numbering_waits_for_the_preference_threshold() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("Ser22HA"), &scope(H1));
        assert!(r.rows.iter().flatten().all(|a| a.is_none()));
        assert!(r.notes.iter().any(|(k, _)| *k == DiagnosticKind::SequenceMismatch));

        let mut f = Fixture::new();
        f.config.prefer_auth_threshold = 1;
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("Ser22HA"), &scope(H1));
        let a = single(&r);
        assert_eq!((a.seq_id, a.comp_id.as_str(), a.atom_id.as_str()), (138, "SER", "HA"));
    }

    #[test]
    fn residue_just_beyond_the_terminus_is_kept_as_is() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("Gly143HA2"), &scope(H1));
        let a = single(&r);
        assert!(a.as_is);
        assert_eq!((a.seq_id, a.comp_id.as_str()), (143, "GLY"));
        assert!(r
            .notes
            .iter()
            .any(|(k, _)| *k == DiagnosticKind::SequenceMismatchWarning));
        let reasons = resolver.take_reasons();
        assert!(reasons.extend_seq_scheme["A"].contains(&143));
    }

    #[test]
    fn invalid_atom_name_is_reported() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("G3HB"), &scope(H1));
        assert!(r
            .notes
            .iter()
            .any(|(k, _)| *k == DiagnosticKind::InvalidAtomNomenclature));
    }

    #[test]
    fn missing_protons_in_a_modelled_residue_are_not_errors() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("S5HA"), &scope(H1));
        assert_eq!(single(&r).atom_id, "HA");
        assert!(r
            .notes
            .iter()
            .any(|(k, _)| *k == DiagnosticKind::HydrogenNotInstantiated));
        let heavy = resolver.resolve(&whole("S5C"), &scope(&[Some(Nucleus::C)]));
        assert!(heavy
            .notes
            .iter()
            .any(|(k, _)| *k == DiagnosticKind::CoordinateIssue));
    }

    #[test]
    fn cyclic_chains_have_no_free_carboxyl() {
        let mut f = Fixture::new();
        let mut snapshot = f.coords.snapshot().clone();
        snapshot.observed_atoms.push(ResidueAtoms {
            chain_id: "A".into(),
            seq_id: 141,
            atom_ids: ["N", "CA", "C", "O", "CB", "CG", "CD", "NZ"]
                .into_iter()
                .map(SmolStr::new)
                .collect(),
        });
        f.coords = snapshot.clone().into();
        let linear = {
            let mut resolver = f.resolver();
            resolver.resolve(&whole("Lys141OXT"), &scope(&[None]))
        };
        assert!(linear
            .notes
            .iter()
            .any(|(k, _)| *k == DiagnosticKind::CoordinateIssue));

        snapshot.cyclic_chains.push("A".into());
        f.coords = snapshot.into();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("Lys141OXT"), &scope(&[None]));
        assert_eq!(single(&r).atom_id, "OXT");
        assert!(r.notes.is_empty());

        let side_chain = resolver.resolve(&whole("Lys141CE"), &scope(&[Some(Nucleus::C)]));
        assert!(side_chain
            .notes
            .iter()
            .any(|(k, _)| *k == DiagnosticKind::CoordinateIssue));
    }

    #[test]
    fn unrelated_atoms_are_rejected_only_in_per_dimension_labels() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let per_dim = resolver.resolve(&PeakLabel::PerDim(vec!["A2H*".into()]), &scope(H1));
        assert!(per_dim.rows.iter().flatten().all(|a| a.is_none()));
        assert!(per_dim
            .notes
            .iter()
            .any(|(k, _)| *k == DiagnosticKind::InvalidAtomSelection));

        let whole_label = resolver.resolve(&whole("A2H*"), &scope(H1));
        assert!(whole_label.rows.len() > 1);
        assert!(whole_label
            .notes
            .iter()
            .all(|(k, _)| *k != DiagnosticKind::InvalidAtomSelection));
    }

    #[test]
    fn atoms_of_unknown_ligands_must_be_modelled() {
        let mut f = Fixture::new();
        let mut snapshot = f.coords.snapshot().clone();
        snapshot.non_polymers.push(NonPolymer {
            chain_id: "C".into(),
            seq_id: 301,
            comp_id: "HEM".into(),
            ..Default::default()
        });
        snapshot.observed_atoms.push(ResidueAtoms {
            chain_id: "C".into(),
            seq_id: 301,
            atom_ids: vec!["FE".into(), "CHA".into()],
        });
        f.coords = snapshot.into();
        let mut resolver = f.resolver();

        let modelled = resolver.resolve(&whole("C:301:HEM:CHA"), &scope(&[None]));
        let a = single(&modelled);
        assert_eq!((a.chain_id.as_str(), a.seq_id, a.atom_id.as_str()), ("C", 301, "CHA"));

        let absent = resolver.resolve(&whole("C:301:HEM:CAA"), &scope(&[None]));
        assert!(absent.rows.iter().flatten().all(|a| a.is_none()));
        assert!(absent
            .notes
            .iter()
            .any(|(k, _)| *k == DiagnosticKind::AtomNotFound));
    }

    #[test]
    fn ion_label_resolves_to_the_ligand() {
        let f = Fixture::new();
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("Zn"), &scope(H1));
        let a = single(&r);
        assert_eq!((a.chain_id.as_str(), a.seq_id, a.atom_id.as_str()), ("B", 201, "ZN"));
    }

    #[test]
    fn second_pass_applies_learned_offsets() {
        let mut f = Fixture::new();
        let reasons = {
            let mut resolver = f.resolver();
            for label in ["Ala12HA", "Gly13HA2", "Leu14HA"] {
                let r = resolver.resolve(&whole(label), &scope(H1));
                assert!(r.rows.iter().flatten().all(|a| a.is_none()));
            }
            resolver.take_reasons()
        };
        f.previous = reasons;
        assert_eq!(f.previous.seq_id_remap["A"][&12], 2);
        let mut resolver = f.resolver();
        let r = resolver.resolve(&whole("Ala12HA"), &scope(H1));
        let a = single(&r);
        assert_eq!((a.seq_id, a.comp_id.as_str()), (2, "ALA"));
        assert!(r.notes.is_empty());
    }

    #[test]
    fn rows_fold_surplus_atoms_into_the_last_dimension() {
        let a = |atom: &str| Assignment::new("A", 1, "ALA", atom);
        let rows = build_rows(vec![vec![a("H")], vec![a("HA")], vec![a("HB1")]], 2, 16);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r[0].as_ref().map(|x| x.atom_id.as_str()) == Some("H")));

        let chunked = build_rows(
            vec![vec![a("H")], vec![a("N")], vec![a("HA")], vec![a("CA")]],
            2,
            16,
        );
        assert_eq!(chunked.len(), 2);
        assert_eq!(chunked[1][1].as_ref().map(|x| x.atom_id.as_str()), Some("CA"));

        let capped = build_rows(vec![vec![a("H"); 5], vec![a("N"); 5]], 2, 16);
        assert_eq!(capped.len(), 16);
    }

    #[test]
    fn short_labels_leave_blank_fields() {
        let a = Assignment::new("A", 1, "ALA", "H");
        let rows = build_rows(vec![vec![a]], 3, 16);
        assert_eq!(rows.len(), 1);
        assert_eq!(row_state(&rows[0]), RowState::Partial);
        assert!(build_rows(vec![Vec::new()], 2, 16).is_empty());
    }
}
