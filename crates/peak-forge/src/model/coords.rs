//! Read-only snapshot of the deposited structure consulted while resolving assignments.
//!
//! The snapshot is deserialized (or built by the mmCIF reader) as a [`CoordinateSnapshot`] of
//! plain tables and converted once into a [`CoordinateContext`], which adds the lookup indices
//! the resolver needs.

use super::types::PolymerType;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidueKey {
    pub chain_id: SmolStr,
    pub seq_id: i32,
}

impl ResidueKey {
    pub fn new(chain_id: impl Into<SmolStr>, seq_id: i32) -> Self {
        Self {
            chain_id: chain_id.into(),
            seq_id,
        }
    }
}

/// One polymer chain with parallel author and label numbering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolymerSequence {
    pub chain_id: SmolStr,
    #[serde(default)]
    pub entity_id: Option<u32>,
    pub seq_id: Vec<i32>,
    pub auth_seq_id: Vec<i32>,
    pub comp_id: Vec<SmolStr>,
    #[serde(default)]
    pub auth_comp_id: Vec<SmolStr>,
    #[serde(default)]
    pub alt_comp_id: Vec<Vec<SmolStr>>,
    #[serde(default)]
    pub alt_auth_seq_id: Vec<i32>,
    #[serde(default)]
    pub gap_in_auth_seq: bool,
    #[serde(default)]
    pub identical_chain_id: Vec<SmolStr>,
}

impl PolymerSequence {
    /// Builds a chain whose author and label numbering both start at `first_seq_id`.
    pub fn contiguous(chain_id: impl Into<SmolStr>, first_seq_id: i32, comps: &[&str]) -> Self {
        let seq: Vec<i32> = (0..comps.len() as i32).map(|i| first_seq_id + i).collect();
        Self {
            chain_id: chain_id.into(),
            seq_id: seq.clone(),
            auth_seq_id: seq,
            comp_id: comps.iter().map(|c| SmolStr::new(c)).collect(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.comp_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comp_id.is_empty()
    }

    pub fn position_of_auth(&self, seq_id: i32) -> Option<usize> {
        self.auth_seq_id.iter().position(|&s| s == seq_id)
    }

    pub fn position_of_label(&self, seq_id: i32) -> Option<usize> {
        self.seq_id.iter().position(|&s| s == seq_id)
    }

    /// Composition recorded in the coordinates at a position.
    pub fn comp_at(&self, pos: usize) -> Option<&SmolStr> {
        self.comp_id.get(pos)
    }

    /// Whether `comp_id` names the residue at `pos` under any recorded spelling.
    pub fn comp_matches(&self, pos: usize, comp_id: &str) -> bool {
        self.comp_id.get(pos).is_some_and(|c| c == comp_id)
            || self.auth_comp_id.get(pos).is_some_and(|c| c == comp_id)
            || self
                .alt_comp_id
                .get(pos)
                .is_some_and(|alts| alts.iter().any(|c| c == comp_id))
    }

    /// Locates an author sequence number, widening across gaps to the nearest neighbour.
    ///
    /// Returns the exact position when present. For chains flagged with a gap, alternative
    /// author numbers are checked next, then the positions one below and one above whose
    /// composition matches `comp_id`.
    pub fn locate_auth(&self, seq_id: i32, comp_id: Option<&str>) -> Option<usize> {
        if let Some(pos) = self.position_of_auth(seq_id) {
            return Some(pos);
        }
        if !self.gap_in_auth_seq {
            return None;
        }
        if let Some(pos) = self.alt_auth_seq_id.iter().position(|&s| s == seq_id) {
            if pos < self.len() {
                return Some(pos);
            }
        }
        let comp_id = comp_id?;
        [seq_id - 1, seq_id + 1]
            .into_iter()
            .filter_map(|s| self.position_of_auth(s))
            .find(|&pos| self.comp_matches(pos, comp_id))
    }

    pub fn first_auth(&self) -> Option<i32> {
        self.auth_seq_id.iter().copied().min()
    }

    pub fn last_auth(&self) -> Option<i32> {
        self.auth_seq_id.iter().copied().max()
    }

    /// Distance of an author number beyond the nearest terminus; `None` when inside the chain.
    pub fn distance_beyond_terminus(&self, seq_id: i32) -> Option<i32> {
        let first = self.first_auth()?;
        let last = self.last_auth()?;
        if seq_id < first {
            Some(first - seq_id)
        } else if seq_id > last {
            Some(seq_id - last)
        } else {
            None
        }
    }

    /// Whether `seq_id` is the author number of the last residue in chain order.
    pub fn is_c_terminal(&self, seq_id: i32) -> bool {
        self.auth_seq_id.last() == Some(&seq_id)
    }
}

/// A ligand, ion or branched-entity residue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NonPolymer {
    pub chain_id: SmolStr,
    pub seq_id: i32,
    #[serde(default)]
    pub label_seq_id: Option<i32>,
    pub comp_id: SmolStr,
    #[serde(default)]
    pub alt_comp_id: Vec<SmolStr>,
    #[serde(default)]
    pub entity_id: Option<u32>,
    #[serde(default)]
    pub branched: bool,
}

impl NonPolymer {
    pub fn comp_matches(&self, comp_id: &str) -> bool {
        self.comp_id == comp_id || self.alt_comp_id.iter().any(|c| c == comp_id)
    }

    pub fn key(&self) -> ResidueKey {
        ResidueKey::new(self.chain_id.clone(), self.seq_id)
    }
}

/// A ligand whose atoms are spread over several residues in the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitLigand {
    pub chain_id: SmolStr,
    pub seq_id: i32,
    pub comp_id: SmolStr,
    pub parts: Vec<ResidueKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAssembly {
    pub entity_id: u32,
    #[serde(default)]
    pub chain_ids: Vec<SmolStr>,
    #[serde(default)]
    pub polymer_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueAtoms {
    pub chain_id: SmolStr,
    pub seq_id: i32,
    pub atom_ids: Vec<SmolStr>,
}

fn default_model_num_name() -> String {
    "pdbx_PDB_model_num".to_string()
}

/// Serializable form of the coordinate context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSnapshot {
    #[serde(default)]
    pub polymers: Vec<PolymerSequence>,
    #[serde(default)]
    pub non_polymers: Vec<NonPolymer>,
    #[serde(default)]
    pub split_ligands: Vec<SplitLigand>,
    #[serde(default = "default_model_num_name")]
    pub model_num_name: String,
    #[serde(default)]
    pub observed_atoms: Vec<ResidueAtoms>,
    #[serde(default)]
    pub unobserved_residues: Vec<ResidueKey>,
    #[serde(default)]
    pub unobserved_atoms: Vec<ResidueAtoms>,
    #[serde(default)]
    pub entity_assembly: Vec<EntityAssembly>,
    #[serde(default)]
    pub exptl_method: String,
    #[serde(default)]
    pub cyclic_chains: Vec<SmolStr>,
}

impl Default for CoordinateSnapshot {
    fn default() -> Self {
        Self {
            polymers: Vec::new(),
            non_polymers: Vec::new(),
            split_ligands: Vec::new(),
            model_num_name: default_model_num_name(),
            observed_atoms: Vec::new(),
            unobserved_residues: Vec::new(),
            unobserved_atoms: Vec::new(),
            entity_assembly: Vec::new(),
            exptl_method: String::new(),
            cyclic_chains: Vec::new(),
        }
    }
}

/// How an atom relates to the deposited model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomPresence {
    Observed,
    Unobserved,
    /// The residue is modelled but the atom is missing from it.
    Absent,
    /// No atom-site data is available for the residue.
    Unknown,
}

/// Indexed, immutable view of the deposited structure.
#[derive(Debug, Clone)]
pub struct CoordinateContext {
    snapshot: CoordinateSnapshot,
    observed: HashMap<ResidueKey, BTreeSet<SmolStr>>,
    unobserved_atoms: HashMap<ResidueKey, BTreeSet<SmolStr>>,
    unobserved_residues: HashSet<ResidueKey>,
    split: HashMap<(ResidueKey, SmolStr), Vec<ResidueKey>>,
    cyclic: HashSet<SmolStr>,
}

impl From<CoordinateSnapshot> for CoordinateContext {
    fn from(snapshot: CoordinateSnapshot) -> Self {
        fn index(rows: &[ResidueAtoms]) -> HashMap<ResidueKey, BTreeSet<SmolStr>> {
            let mut map: HashMap<ResidueKey, BTreeSet<SmolStr>> = HashMap::new();
            for row in rows {
                map.entry(ResidueKey::new(row.chain_id.clone(), row.seq_id))
                    .or_default()
                    .extend(row.atom_ids.iter().cloned());
            }
            map
        }

        let observed = index(&snapshot.observed_atoms);
        let unobserved_atoms = index(&snapshot.unobserved_atoms);
        let unobserved_residues = snapshot.unobserved_residues.iter().cloned().collect();
        let split = snapshot
            .split_ligands
            .iter()
            .map(|s| {
                (
                    (ResidueKey::new(s.chain_id.clone(), s.seq_id), s.comp_id.clone()),
                    s.parts.clone(),
                )
            })
            .collect();
        let cyclic = snapshot.cyclic_chains.iter().cloned().collect();

        Self {
            snapshot,
            observed,
            unobserved_atoms,
            unobserved_residues,
            split,
            cyclic,
        }
    }
}

impl<'de> Deserialize<'de> for CoordinateContext {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        CoordinateSnapshot::deserialize(deserializer).map(Self::from)
    }
}

impl CoordinateContext {
    pub fn snapshot(&self) -> &CoordinateSnapshot {
        &self.snapshot
    }

    pub fn polymers(&self) -> &[PolymerSequence] {
        &self.snapshot.polymers
    }

    pub fn polymer(&self, chain_id: &str) -> Option<&PolymerSequence> {
        self.snapshot.polymers.iter().find(|p| p.chain_id == chain_id)
    }

    pub fn non_polymers(&self) -> &[NonPolymer] {
        &self.snapshot.non_polymers
    }

    pub fn model_num_name(&self) -> &str {
        &self.snapshot.model_num_name
    }

    pub fn is_solid_state(&self) -> bool {
        self.snapshot.exptl_method == "SOLID-STATE NMR"
    }

    pub fn has_chain(&self, chain_id: &str) -> bool {
        self.polymer(chain_id).is_some()
            || self.snapshot.non_polymers.iter().any(|n| n.chain_id == chain_id)
    }

    /// Every chain id known to the model, polymers first, without duplicates.
    pub fn chain_ids(&self) -> Vec<SmolStr> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let polymer_chains = self.snapshot.polymers.iter().map(|p| &p.chain_id);
        let ligand_chains = self.snapshot.non_polymers.iter().map(|n| &n.chain_id);
        for chain in polymer_chains.chain(ligand_chains) {
            if seen.insert(chain.clone()) {
                out.push(chain.clone());
            }
        }
        out
    }

    /// Polymer type of a chain from its entity-assembly tag.
    pub fn polymer_type(&self, chain_id: &str) -> PolymerType {
        let entity_id = self.polymer(chain_id).and_then(|p| p.entity_id);
        self.snapshot
            .entity_assembly
            .iter()
            .find(|e| {
                e.chain_ids.iter().any(|c| c == chain_id)
                    || (entity_id.is_some() && entity_id == Some(e.entity_id))
            })
            .and_then(|e| e.polymer_type.as_deref())
            .map(PolymerType::from_tag)
            .unwrap_or(PolymerType::Other)
    }

    /// The single polymer type shared by every chain, if the model is homogeneous.
    pub fn uniform_polymer_type(&self) -> Option<PolymerType> {
        let mut types = self
            .snapshot
            .polymers
            .iter()
            .map(|p| self.polymer_type(&p.chain_id));
        let first = types.next()?;
        types.all(|t| t == first).then_some(first)
    }

    pub fn residue_atoms(&self, chain_id: &str, seq_id: i32) -> Option<&BTreeSet<SmolStr>> {
        self.observed.get(&ResidueKey::new(chain_id, seq_id))
    }

    pub fn is_unobserved_residue(&self, chain_id: &str, seq_id: i32) -> bool {
        self.unobserved_residues
            .contains(&ResidueKey::new(chain_id, seq_id))
    }

    /// Classifies an atom against the modelled atom sites.
    ///
    /// Split ligands are searched across all of their parts.
    pub fn atom_presence(
        &self,
        chain_id: &str,
        seq_id: i32,
        comp_id: &str,
        atom_id: &str,
    ) -> AtomPresence {
        let key = ResidueKey::new(chain_id, seq_id);
        if self.unobserved_residues.contains(&key)
            || self
                .unobserved_atoms
                .get(&key)
                .is_some_and(|atoms| atoms.contains(atom_id))
        {
            return AtomPresence::Unobserved;
        }

        let parts = self
            .split
            .get(&(key.clone(), SmolStr::new(comp_id)))
            .map(|p| p.as_slice())
            .unwrap_or(&[]);
        let mut any_data = false;
        for k in std::iter::once(&key).chain(parts.iter()) {
            if let Some(atoms) = self.observed.get(k) {
                any_data = true;
                if atoms.contains(atom_id) {
                    return AtomPresence::Observed;
                }
            }
        }

        if any_data {
            AtomPresence::Absent
        } else {
            AtomPresence::Unknown
        }
    }

    pub fn is_cyclic(&self, chain_id: &str) -> bool {
        self.cyclic.contains(chain_id)
    }

    pub fn non_polymers_matching<'a>(
        &'a self,
        comp_id: &'a str,
    ) -> impl Iterator<Item = &'a NonPolymer> + 'a {
        self.snapshot
            .non_polymers
            .iter()
            .filter(move |n| n.comp_matches(comp_id))
    }

    pub fn non_polymer_at(&self, chain_id: &str, seq_id: i32) -> Option<&NonPolymer> {
        self.snapshot
            .non_polymers
            .iter()
            .find(|n| n.chain_id == chain_id && n.seq_id == seq_id)
    }

    pub fn identical_chains(&self, chain_id: &str) -> &[SmolStr] {
        self.polymer(chain_id)
            .map(|p| p.identical_chain_id.as_slice())
            .unwrap_or(&[])
    }
}
