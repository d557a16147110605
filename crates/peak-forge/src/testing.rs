//! In-memory structure, shifts and peak builders shared by the engine tests.

use crate::config::ParserConfig;
use crate::engine::{ParseInputs, PeakListHeader, PeakListInput, PeakParser};
use crate::model::coords::{
    CoordinateContext, CoordinateSnapshot, EntityAssembly, NonPolymer, PolymerSequence,
};
use crate::model::dimension::DimensionSetup;
use crate::model::peak::{Intensity, PeakLabel, RawPeak};
use crate::model::reparse::ReparseReasons;
use crate::model::shifts::{ChemicalShiftIndex, ShiftLoop, ShiftRow};
use crate::model::types::Nucleus;
use crate::nomenclature::ChemCompDictionary;

const PEPTIDE: &[&str] = &[
    "MET", "ALA", "GLY", "LEU", "SER", "THR", "VAL", "LYS", "GLU", "ASN", "ILE", "PHE", "GLN",
    "TRP", "ARG", "TYR", "HIS", "PRO", "CYS", "ALA",
];

const TAIL: &[&str] = &["GLY", "SER", "ASP", "LEU", "LYS"];

/// Chain A numbered 1..=20 and then 137..=141, with a zinc ion on chain B.
pub fn peptide(exptl_method: &str) -> CoordinateContext {
    let comps: Vec<&str> = PEPTIDE.iter().chain(TAIL).copied().collect();
    let mut chain = PolymerSequence::contiguous("A", 1, &comps);
    for (i, auth) in chain.auth_seq_id.iter_mut().enumerate().skip(PEPTIDE.len()) {
        *auth = 137 + (i - PEPTIDE.len()) as i32;
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
        entity_assembly: vec![EntityAssembly {
            entity_id: 1,
            chain_ids: vec!["A".into()],
            polymer_type: Some("polypeptide(L)".into()),
        }],
        exptl_method: exptl_method.into(),
        ..Default::default()
    }
    .into()
}

fn shift(seq: i32, comp: &str, atom: &str, value: f64) -> ShiftRow {
    ShiftRow {
        entity_assembly_id: Some("1".into()),
        comp_index_id: seq,
        comp_id: comp.into(),
        atom_id: atom.into(),
        isotope: None,
        value,
        auth_asym_id: Some("A".into()),
    }
}

/// Deposited shifts of Ala-2.
pub fn shift_loops() -> Vec<ShiftLoop> {
    vec![vec![
        shift(2, "ALA", "H", 8.2),
        shift(2, "ALA", "HA", 4.3),
        shift(2, "ALA", "HB", 1.4),
        shift(2, "ALA", "CA", 52.0),
        shift(2, "ALA", "CB", 20.0),
        shift(2, "ALA", "N", 123.0),
    ]]
}

pub struct Fixture {
    pub coords: CoordinateContext,
    pub shifts: ChemicalShiftIndex,
    pub dict: ChemCompDictionary,
    pub config: ParserConfig,
    pub previous: ReparseReasons,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_method("SOLUTION NMR")
    }

    pub fn solid_state() -> Self {
        Self::with_method("SOLID-STATE NMR")
    }

    fn with_method(exptl_method: &str) -> Self {
        Self {
            coords: peptide(exptl_method),
            shifts: ChemicalShiftIndex::new(&shift_loops()),
            dict: ChemCompDictionary::default(),
            config: ParserConfig::default(),
            previous: ReparseReasons::default(),
        }
    }

    pub fn parser(&self, original_filename: Option<&str>) -> PeakParser<'_, ChemCompDictionary> {
        PeakParser::new(
            &self.config,
            &self.coords,
            &self.shifts,
            &self.dict,
            original_filename,
            &self.previous,
        )
    }

    pub fn inputs<'s>(
        &'s self,
        original_filename: Option<&'s str>,
        lists: &'s [PeakListInput],
    ) -> ParseInputs<'s> {
        ParseInputs {
            coords: &self.coords,
            shifts: &self.shifts,
            original_filename,
            lists,
        }
    }
}

/// Header declaring the nucleus of every dimension.
pub fn header(nuclei: &[Nucleus]) -> PeakListHeader {
    PeakListHeader {
        num_dim: nuclei.len(),
        dims: nuclei
            .iter()
            .map(|n| DimensionSetup {
                atom_type: Some(*n),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// Header that leaves every dimension to inference.
pub fn blind_header(num_dim: usize) -> PeakListHeader {
    PeakListHeader {
        num_dim,
        ..Default::default()
    }
}

pub fn raw(positions: &[f64], label: Option<&str>) -> RawPeak {
    RawPeak {
        positions: positions.to_vec(),
        height: Some(Intensity {
            value: 1.0e6,
            error: None,
        }),
        label: label.map(|l| PeakLabel::Whole(l.to_string())),
        ..Default::default()
    }
}
