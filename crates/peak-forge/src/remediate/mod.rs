//! Repair of per-dimension assignments against the transfer topology of a closed list.
//!
//! One-bond pairs must name directly bonded atoms of one residue; J-coupled pairs must stay
//! within a residue and relayed pairs within neighbouring residues. Inconsistent pairs are
//! swapped onto the alternative whose chemical shifts fit the peak position best, or
//! blanked when nothing fits. The remediator also records which DIM-transfer index the
//! deposited assignments support and which elements were assigned to each dimension, so
//! that a second pass can correct the inferred setup.

pub mod indices;

use crate::model::assignment::{Assignment, AssignmentRow, RowState, row_state};
use crate::model::diagnostic::DiagnosticKind;
use crate::model::dimension::SpectralDim;
use crate::model::peak::Peak;
use crate::model::reparse::IndexHistory;
use crate::model::shifts::ShiftLookup;
use crate::model::transfer::TransferSet;
use crate::model::types::{Nucleus, TransferType, isotope_weight};
use crate::nomenclature::{AtomGroup, BondFilter, Nomenclature};
use crate::resolve::Note;
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashMap};

/// A pair whose squared mismatch falls below this is accepted outright.
const ACCEPT_DEVIATION: f64 = 1.0;

/// What remediation changed in a list and what it learned about the list's setup.
#[derive(Debug, Clone, Default)]
pub struct Remediation {
    /// Diagnostics keyed by the intra-list index of the peak they concern.
    pub notes: Vec<(usize, Note)>,
    pub swapped: usize,
    pub blanked: usize,
    pub deleted_rows: usize,
    /// Rows whose one-bond pairs are bonded, per DIM-transfer index.
    pub onebond_history: IndexHistory,
    pub jcoupling_history: IndexHistory,
    pub relayed_history: IndexHistory,
    /// Element counts per dimension, present only when some dimension disagrees with its
    /// inferred nucleus.
    pub atom_type_history: Option<Vec<BTreeMap<SmolStr, usize>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coupling {
    JCoupling,
    Relayed,
}

impl Coupling {
    fn max_seq_gap(self) -> i32 {
        match self {
            Coupling::JCoupling => 0,
            Coupling::Relayed => 1,
        }
    }
}

/// A replacement for one dimension of a row.
#[derive(Debug, Clone)]
struct Candidate {
    dim: usize,
    assignment: Assignment,
    deviation: Option<f64>,
}

/// Remediator for one list.
pub struct Remediator<'a, N: Nomenclature + ?Sized> {
    dims: &'a [SpectralDim],
    transfers: &'a TransferSet,
    shifts: ShiftLookup<'a>,
    nomenclature: &'a N,
    bonded_memo: HashMap<(SmolStr, SmolStr, bool), Vec<SmolStr>>,
}

impl<'a, N: Nomenclature + ?Sized> Remediator<'a, N> {
    /// Creates a remediator.
    ///
    /// # Arguments
    ///
    /// * `dims` - Classified dimensions of the list.
    /// * `transfers` - Inferred transfer table of the list.
    /// * `shifts` - Deposited and scratch chemical shifts.
    /// * `nomenclature` - Bond graph and atom naming service.
    pub fn new(
        dims: &'a [SpectralDim],
        transfers: &'a TransferSet,
        shifts: ShiftLookup<'a>,
        nomenclature: &'a N,
    ) -> Self {
        Self {
            dims,
            transfers,
            shifts,
            nomenclature,
            bonded_memo: HashMap::new(),
        }
    }

    /// Remediates every assignment row of the list in place.
    ///
    /// # Arguments
    ///
    /// * `peaks` - Kept peaks of the list.
    ///
    /// # Returns
    ///
    /// The changes made and the histories observed before any change.
    pub fn run(&mut self, peaks: &mut [Peak]) -> Remediation {
        let mut outcome = Remediation::default();
        let num_dim = self.dims.len();

        let onebond: Vec<(usize, usize)> = self.pairs_of(TransferType::OneBond);
        let jcoupling: Vec<(usize, usize)> = self.pairs_of(TransferType::JCoupling);
        let relayed: Vec<(usize, usize)> = self.pairs_of(TransferType::Relayed);

        for peak in peaks.iter() {
            for row in peak.assignments.iter().filter(|r| r.len() == num_dim) {
                self.count_indices(row, &mut outcome.onebond_history, |s, a, b| {
                    s.is_bonded_pair(a, b)
                });
                if !jcoupling.is_empty() {
                    self.count_indices(row, &mut outcome.jcoupling_history, |_, a, b| {
                        within(a, b, Coupling::JCoupling)
                    });
                }
                if !relayed.is_empty() {
                    self.count_indices(row, &mut outcome.relayed_history, |_, a, b| {
                        within(a, b, Coupling::Relayed)
                    });
                }
            }
        }

        for peak in peaks.iter_mut() {
            let Peak {
                index,
                positions,
                assignments,
                ..
            } = peak;
            let positions: &[f64] = positions;
            for row in assignments.iter_mut().filter(|r| r.len() == num_dim) {
                for &(i, j) in &onebond {
                    self.fix_onebond(positions, row, (i, j), *index, &mut outcome);
                }
                for &(i, j) in &jcoupling {
                    self.fix_coupled(positions, row, (i, j), Coupling::JCoupling, *index, &mut outcome);
                }
                for &(i, j) in &relayed {
                    self.fix_coupled(positions, row, (i, j), Coupling::Relayed, *index, &mut outcome);
                }
            }

            let before = assignments.len();
            assignments.retain(|row| row_state(row) != RowState::Partial);
            let deleted = before - assignments.len();
            if deleted > 0 {
                log::debug!("peak {index}: {deleted} incomplete assignment row(s) deleted");
                outcome.deleted_rows += deleted;
            }
        }

        outcome.atom_type_history = self.atom_type_history(peaks);
        outcome
    }

    /// Zero-based axis pairs of the transfers of one type.
    fn pairs_of(&self, kind: TransferType) -> Vec<(usize, usize)> {
        self.transfers
            .of_kind(kind)
            .filter(|t| t.dim_id_1 >= 1 && t.dim_id_2 <= self.dims.len())
            .map(|t| (t.dim_id_1 - 1, t.dim_id_2 - 1))
            .collect()
    }

    fn count_indices(
        &self,
        row: &AssignmentRow,
        history: &mut IndexHistory,
        consistent: impl Fn(&Self, &Assignment, &Assignment) -> bool,
    ) {
        for (index, pairs) in indices::transfer_pairs(row.len()).iter().enumerate() {
            let hit = pairs.iter().any(|&(x, y)| match (&row[x], &row[y]) {
                (Some(a), Some(b)) => consistent(self, a, b),
                _ => false,
            });
            if hit {
                *history.entry(index).or_default() += 1;
            }
        }
    }

    fn is_bonded_pair(&self, a: &Assignment, b: &Assignment) -> bool {
        a.same_residue(b)
            && a.comp_id == b.comp_id
            && self.nomenclature.is_bonded(&a.comp_id, &a.atom_id, &b.atom_id)
    }

    fn bonded(&mut self, comp_id: &SmolStr, atom_id: &SmolStr, proton: bool) -> Vec<SmolStr> {
        let key = (comp_id.clone(), atom_id.clone(), proton);
        if let Some(hit) = self.bonded_memo.get(&key) {
            return hit.clone();
        }
        let filter = if proton {
            BondFilter::Proton
        } else {
            BondFilter::NonProton
        };
        let atoms = self.nomenclature.bonded_atoms(comp_id, atom_id, filter);
        self.bonded_memo.insert(key, atoms.clone());
        atoms
    }

    fn weight(&self, dim: usize) -> f64 {
        self.dims
            .get(dim)
            .and_then(|d| d.isotope.or_else(|| d.nucleus.map(|n| n.default_isotope())))
            .map(isotope_weight)
            .unwrap_or(1.0)
    }

    /// Atoms whose deposited shifts may stand in for `a`: the other protons on its heavy
    /// atom and the group name without its trailing index.
    fn shift_group(&mut self, a: &Assignment) -> Vec<SmolStr> {
        let mut group = Vec::new();
        if a.is_proton() {
            if let Some(parent) = self.bonded(&a.comp_id, &a.atom_id, false).first().cloned() {
                group.extend(
                    self.bonded(&a.comp_id, &parent, true)
                        .into_iter()
                        .filter(|s| *s != a.atom_id),
                );
            }
        }
        let stem = a.atom_id.trim_end_matches(|c: char| c.is_ascii_digit());
        if !stem.is_empty() && stem != a.atom_id {
            group.push(SmolStr::new(stem));
        }
        group
    }

    /// Squared, nucleus-weighted mismatch between a position and the atom's shift.
    fn deviation(&mut self, positions: &[f64], dim: usize, a: &Assignment) -> Option<f64> {
        let position = *positions.get(dim)?;
        let group = self.shift_group(a);
        let refs: Vec<&str> = group.iter().map(SmolStr::as_str).collect();
        let shift = self.shifts.shift(&a.chain_id, a.seq_id, &a.atom_id, &refs)?;
        Some(((position - shift) * self.weight(dim)).powi(2))
    }

    fn pair_deviation(
        &mut self,
        positions: &[f64],
        (i, a): (usize, &Assignment),
        (j, b): (usize, &Assignment),
    ) -> Option<f64> {
        Some(self.deviation(positions, i, a)? + self.deviation(positions, j, b)?)
    }

    /// Nucleus expected on a dimension, falling back to the element of its current atom.
    fn expected_nucleus(&self, dim: usize, current: &Assignment) -> Option<Nucleus> {
        self.dims
            .get(dim)
            .and_then(|d| d.nucleus)
            .or_else(|| Nucleus::from_atom_id(&current.atom_id))
    }

    /// Atoms bonded to `anchor` that could sit on `dim`, with methyl protons collapsed.
    fn bonded_candidates(&mut self, anchor: &Assignment, dim: usize, current: &Assignment) -> Vec<Assignment> {
        let Some(want) = self.expected_nucleus(dim, current) else {
            return Vec::new();
        };
        let ids: Vec<SmolStr> = self
            .bonded(&anchor.comp_id, &anchor.atom_id, want.is_proton())
            .into_iter()
            .filter(|id| Nucleus::from_atom_id(id) == Some(want))
            .collect();
        self.relabel_group(anchor, &ids)
    }

    fn relabel_group(&self, anchor: &Assignment, ids: &[SmolStr]) -> Vec<Assignment> {
        if ids.len() > 1 {
            let refs: Vec<&str> = ids.iter().map(SmolStr::as_str).collect();
            if let AtomGroup::Methyl { representative } =
                self.nomenclature.atom_group(&anchor.comp_id, &refs)
            {
                return vec![relabel(anchor, &representative, Some(1))];
            }
        }
        ids.iter().map(|id| relabel(anchor, id, None)).collect()
    }

    /// Scores candidates against the unchanged side of the pair.
    fn score(
        &mut self,
        positions: &[f64],
        row: &AssignmentRow,
        (i, j): (usize, usize),
        candidates: Vec<(usize, Assignment)>,
    ) -> Vec<Candidate> {
        candidates
            .into_iter()
            .map(|(dim, assignment)| {
                let other = if dim == i { j } else { i };
                let deviation = match &row[other] {
                    Some(kept) => {
                        let kept = kept.clone();
                        self.pair_deviation(positions, (dim, &assignment), (other, &kept))
                    }
                    None => None,
                };
                Candidate {
                    dim,
                    assignment,
                    deviation,
                }
            })
            .collect()
    }

    /// The accepted candidate with the smallest mismatch.
    fn best_accepted(candidates: &[Candidate], current: Option<f64>) -> Option<&Candidate> {
        let threshold = current.map_or(ACCEPT_DEVIATION, |c| (c / 2.0).max(ACCEPT_DEVIATION));
        candidates
            .iter()
            .filter(|c| c.deviation.is_some_and(|d| d < threshold))
            .fold(None, |best: Option<&Candidate>, c| match best {
                Some(b) if b.deviation <= c.deviation => Some(b),
                _ => Some(c),
            })
    }

    /// Dimension indices ordered so that the worse-fitting side comes first.
    fn lesser_first(&mut self, positions: &[f64], row: &AssignmentRow, (i, j): (usize, usize)) -> (usize, usize) {
        let mut dev = |d: usize| {
            row[d]
                .clone()
                .and_then(|a| self.deviation(positions, d, &a))
                .unwrap_or(f64::INFINITY)
        };
        let di = dev(i);
        let dj = dev(j);
        if di >= dj { (i, j) } else { (j, i) }
    }

    fn fix_onebond(
        &mut self,
        positions: &[f64],
        row: &mut AssignmentRow,
        (i, j): (usize, usize),
        peak: usize,
        outcome: &mut Remediation,
    ) {
        let (Some(a), Some(b)) = (row[i].clone(), row[j].clone()) else {
            return;
        };
        if self.is_bonded_pair(&a, &b) {
            return;
        }
        let current = self.pair_deviation(positions, (i, &a), (j, &b));

        let movable = if a.same_residue(&b) {
            vec![(i, j), (j, i)]
        } else {
            vec![self.lesser_first(positions, row, (i, j))]
        };
        let mut proposals = Vec::new();
        for (moved, kept) in movable {
            let (Some(anchor), Some(current_atom)) = (row[kept].clone(), row[moved].clone()) else {
                continue;
            };
            for c in self.bonded_candidates(&anchor, moved, &current_atom) {
                proposals.push((moved, c));
            }
        }
        let candidates = self.score(positions, row, (i, j), proposals);

        let proton_side = [i, j]
            .into_iter()
            .find(|&d| self.expected_nucleus(d, if d == i { &a } else { &b }) == Some(Nucleus::H));
        let chosen = Self::best_accepted(&candidates, current).cloned().or_else(|| {
            let dim = proton_side?;
            candidates
                .iter()
                .filter(|c| c.dim == dim)
                .fold(None, |best: Option<&Candidate>, c| match (best, c.deviation) {
                    (None, _) => Some(c),
                    (Some(b), Some(d)) if b.deviation.is_none_or(|bd| d < bd) => Some(c),
                    (Some(b), _) => Some(b),
                })
                .cloned()
        });

        match chosen {
            Some(candidate) => {
                log::debug!(
                    "peak {peak}: one-bond pair {}-{} repaired, {} -> {}",
                    i + 1,
                    j + 1,
                    row[candidate.dim].as_ref().map(ToString::to_string).unwrap_or_default(),
                    candidate.assignment
                );
                row[candidate.dim] = Some(candidate.assignment);
                outcome.swapped += 1;
            }
            None => blank(row, (i, j), (&a, &b), peak, "one-bond", outcome),
        }
    }

    fn fix_coupled(
        &mut self,
        positions: &[f64],
        row: &mut AssignmentRow,
        (i, j): (usize, usize),
        coupling: Coupling,
        peak: usize,
        outcome: &mut Remediation,
    ) {
        let (Some(a), Some(b)) = (row[i].clone(), row[j].clone()) else {
            return;
        };
        if within(&a, &b, coupling) {
            return;
        }
        let current = self.pair_deviation(positions, (i, &a), (j, &b));
        let (moved, kept) = self.lesser_first(positions, row, (i, j));
        let (Some(anchor), Some(current_atom)) = (row[kept].clone(), row[moved].clone()) else {
            return;
        };

        let ids = self
            .nomenclature
            .expand_atom(&anchor.comp_id, &current_atom.atom_id)
            .atom_ids;
        let proposals = self
            .relabel_group(&anchor, &ids)
            .into_iter()
            .map(|c| (moved, c))
            .collect();
        let candidates = self.score(positions, row, (i, j), proposals);

        match Self::best_accepted(&candidates, current).cloned() {
            Some(candidate) => {
                log::debug!(
                    "peak {peak}: {} moved onto residue {}:{}",
                    current_atom,
                    anchor.chain_id,
                    anchor.seq_id
                );
                row[candidate.dim] = Some(candidate.assignment);
                outcome.swapped += 1;
            }
            None => {
                let label = match coupling {
                    Coupling::JCoupling => "J-coupled",
                    Coupling::Relayed => "relayed",
                };
                blank(row, (i, j), (&a, &b), peak, label, outcome);
            }
        }
    }

    /// Counts assigned elements per dimension and reports them when any dimension's
    /// dominant element differs from its nucleus.
    fn atom_type_history(&self, peaks: &[Peak]) -> Option<Vec<BTreeMap<SmolStr, usize>>> {
        let mut counts: Vec<BTreeMap<SmolStr, usize>> = vec![BTreeMap::new(); self.dims.len()];
        for row in peaks.iter().flat_map(|p| &p.assignments) {
            for (dim, a) in row.iter().enumerate() {
                let Some(a) = a else { continue };
                let Some(slot) = counts.get_mut(dim) else {
                    continue;
                };
                let element = Nucleus::from_atom_id(&a.atom_id)
                    .map(|n| SmolStr::new(n.symbol()))
                    .or_else(|| a.atom_id.get(..1).map(SmolStr::new));
                if let Some(element) = element {
                    *slot.entry(element).or_default() += 1;
                }
            }
        }

        let disagrees = self.dims.iter().zip(&counts).any(|(dim, c)| {
            let Some(nucleus) = dim.nucleus else {
                return false;
            };
            let dominant = c.iter().fold(None, |best: Option<(&SmolStr, usize)>, (k, &n)| match best {
                Some((_, bn)) if bn >= n => best,
                _ => Some((k, n)),
            });
            dominant.is_some_and(|(k, _)| k.as_str() != nucleus.symbol())
        });
        disagrees.then_some(counts)
    }
}

/// Clears both sides of a pair that no alternative could repair.
fn blank(
    row: &mut AssignmentRow,
    (i, j): (usize, usize),
    (a, b): (&Assignment, &Assignment),
    peak: usize,
    transfer: &str,
    outcome: &mut Remediation,
) {
    row[i] = None;
    row[j] = None;
    outcome.blanked += 1;
    outcome.notes.push((
        peak,
        (
            DiagnosticKind::InconsistentPeakAssignment,
            format!(
                "Assignments {a} and {b} on dimensions {} and {} are inconsistent with the {transfer} transfer; both were cleared",
                i + 1,
                j + 1
            ),
        ),
    ));
}

fn within(a: &Assignment, b: &Assignment, coupling: Coupling) -> bool {
    a.chain_id == b.chain_id && (a.seq_id - b.seq_id).abs() <= coupling.max_seq_gap()
}

fn relabel(anchor: &Assignment, atom_id: &str, ambiguity_code: Option<u8>) -> Assignment {
    Assignment {
        ambiguity_code,
        as_is: anchor.as_is,
        ..Assignment::new(
            anchor.chain_id.clone(),
            anchor.seq_id,
            anchor.comp_id.clone(),
            atom_id,
        )
    }
}
