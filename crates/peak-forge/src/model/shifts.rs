use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::HashMap;

/// One row of an `_Atom_chem_shift` loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRow {
    #[serde(rename = "Entity_assembly_ID", default)]
    pub entity_assembly_id: Option<SmolStr>,
    #[serde(rename = "Comp_index_ID")]
    pub comp_index_id: i32,
    #[serde(rename = "Comp_ID")]
    pub comp_id: SmolStr,
    #[serde(rename = "Atom_ID")]
    pub atom_id: SmolStr,
    #[serde(rename = "Atom_isotope_number", default)]
    pub isotope: Option<u16>,
    #[serde(rename = "Val")]
    pub value: f64,
    #[serde(rename = "Auth_asym_ID", default)]
    pub auth_asym_id: Option<SmolStr>,
}

impl ShiftRow {
    /// Chain the row belongs to: the author asym id, else the entity-assembly id.
    pub fn chain_id(&self) -> Option<&SmolStr> {
        self.auth_asym_id
            .as_ref()
            .filter(|c| !c.is_empty() && c.as_str() != "." && c.as_str() != "?")
            .or(self.entity_assembly_id.as_ref())
    }
}

pub type ShiftLoop = Vec<ShiftRow>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AtomKey {
    chain_id: SmolStr,
    seq_id: i32,
    atom_id: SmolStr,
}

impl AtomKey {
    fn new(chain_id: &str, seq_id: i32, atom_id: &str) -> Self {
        Self {
            chain_id: SmolStr::new(chain_id),
            seq_id,
            atom_id: SmolStr::new(atom_id),
        }
    }
}

/// Assigned chemical shifts keyed by chain, residue number and atom.
///
/// The first value wins when a loop lists the same atom twice.
#[derive(Debug, Clone, Default)]
pub struct ChemicalShiftIndex {
    values: HashMap<AtomKey, f64>,
    comps: HashMap<(SmolStr, i32), SmolStr>,
}

impl ChemicalShiftIndex {
    /// Builds the index from every chemical-shift loop of the entry.
    ///
    /// # Arguments
    ///
    /// * `loops` - Shift tables in file order.
    pub fn new(loops: &[ShiftLoop]) -> Self {
        let mut values = HashMap::new();
        let mut comps = HashMap::new();
        for row in loops.iter().flatten() {
            let Some(chain) = row.chain_id() else {
                continue;
            };
            if !row.value.is_finite() {
                continue;
            }
            values
                .entry(AtomKey::new(chain, row.comp_index_id, &row.atom_id))
                .or_insert(row.value);
            comps
                .entry((chain.clone(), row.comp_index_id))
                .or_insert_with(|| row.comp_id.clone());
        }
        Self { values, comps }
    }

    pub fn get(&self, chain_id: &str, seq_id: i32, atom_id: &str) -> Option<f64> {
        self.values
            .get(&AtomKey::new(chain_id, seq_id, atom_id))
            .copied()
    }

    /// Composition under which the residue was deposited in the shift tables.
    pub fn comp_of(&self, chain_id: &str, seq_id: i32) -> Option<&SmolStr> {
        self.comps.get(&(SmolStr::new(chain_id), seq_id))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Tentative shifts taken from assigned peak positions of lists already closed.
#[derive(Debug, Clone, Default)]
pub struct ScratchShifts {
    values: HashMap<AtomKey, Vec<f64>>,
}

impl ScratchShifts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, chain_id: &str, seq_id: i32, atom_id: &str, value: f64) {
        if value.is_finite() {
            self.values
                .entry(AtomKey::new(chain_id, seq_id, atom_id))
                .or_default()
                .push(value);
        }
    }

    /// Mean of the positions recorded for an atom.
    pub fn get(&self, chain_id: &str, seq_id: i32, atom_id: &str) -> Option<f64> {
        let samples = self.values.get(&AtomKey::new(chain_id, seq_id, atom_id))?;
        (!samples.is_empty()).then(|| samples.iter().sum::<f64>() / samples.len() as f64)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Combined read view over deposited and scratch shifts.
#[derive(Debug, Clone, Copy)]
pub struct ShiftLookup<'a> {
    pub index: &'a ChemicalShiftIndex,
    pub scratch: &'a ScratchShifts,
}

impl<'a> ShiftLookup<'a> {
    pub fn new(index: &'a ChemicalShiftIndex, scratch: &'a ScratchShifts) -> Self {
        Self { index, scratch }
    }

    /// Resolves a shift for an atom.
    ///
    /// The deposited value is preferred; otherwise the mean over `group` (the other members of
    /// a methyl or geminal group) is used, and finally the scratch pool.
    pub fn shift(&self, chain_id: &str, seq_id: i32, atom_id: &str, group: &[&str]) -> Option<f64> {
        if let Some(v) = self.index.get(chain_id, seq_id, atom_id) {
            return Some(v);
        }
        let group_values: Vec<f64> = group
            .iter()
            .filter_map(|a| self.index.get(chain_id, seq_id, a))
            .collect();
        if !group_values.is_empty() {
            return Some(group_values.iter().sum::<f64>() / group_values.len() as f64);
        }
        self.scratch.get(chain_id, seq_id, atom_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(chain: &str, seq: i32, comp: &str, atom: &str, value: f64) -> ShiftRow {
        ShiftRow {
            entity_assembly_id: Some("1".into()),
            comp_index_id: seq,
            comp_id: comp.into(),
            atom_id: atom.into(),
            isotope: None,
            value,
            auth_asym_id: Some(chain.into()),
        }
    }

    #[test]
    fn index_is_keyed_by_author_chain() {
        let index = ChemicalShiftIndex::new(&[vec![
            row("A", 5, "ALA", "HA", 4.3),
            row("A", 5, "ALA", "HA", 9.9),
        ]]);
        assert_eq!(index.get("A", 5, "HA"), Some(4.3));
        assert_eq!(index.get("1", 5, "HA"), None);
        assert_eq!(index.comp_of("A", 5).map(|c| c.as_str()), Some("ALA"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn rows_without_author_chain_use_entity_assembly() {
        let mut r = row("", 7, "GLY", "N", 109.0);
        r.auth_asym_id = Some(".".into());
        let index = ChemicalShiftIndex::new(&[vec![r]]);
        assert_eq!(index.get("1", 7, "N"), Some(109.0));
    }

    #[test]
    fn lookup_falls_back_to_group_then_scratch() {
        let index = ChemicalShiftIndex::new(&[vec![
            row("A", 1, "ALA", "HB1", 1.3),
            row("A", 1, "ALA", "HB2", 1.5),
        ]]);
        let mut scratch = ScratchShifts::new();
        scratch.record("A", 2, "HA", 4.0);
        scratch.record("A", 2, "HA", 4.2);
        let lookup = ShiftLookup::new(&index, &scratch);

        assert_eq!(lookup.shift("A", 1, "HB1", &[]), Some(1.3));
        let mean = lookup.shift("A", 1, "HB3", &["HB1", "HB2"]).unwrap();
        assert!((mean - 1.4).abs() < 1e-9);
        let scratch_mean = lookup.shift("A", 2, "HA", &[]).unwrap();
        assert!((scratch_mean - 4.1).abs() < 1e-9);
        assert_eq!(lookup.shift("A", 3, "HA", &[]), None);
    }
}
