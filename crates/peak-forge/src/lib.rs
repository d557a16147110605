//! # PeakForge
//!
//! **PeakForge** is a pure-Rust reconciliation engine for deposited NMR peak lists. It reads peak lists as an upstream format parser delivers them, infers the spectrometer setup each list was recorded with, resolves free-form peak labels against the deposited coordinates, and repairs assignments that contradict the inferred transfer topology. Problems inside the data are reported as typed diagnostics instead of failing the run.
//!
//! ## Features
//!
//! - **Setup inference** – Nucleus, isotope, spectral region, acquisition axis, undersampling and sweep width of every dimension, plus the coherence-transfer table and experiment class of every list.
//! - **Label resolution** – Labels such as `"14Trp.Hh2"`, `"D1391HB"` or per-dimension atom names are tokenized, ranked against the structure and mapped to canonical chain/sequence/component/atom assignments with ambiguity codes.
//! - **Assignment remediation** – One-bond, J-coupled and relayed pairs are checked against the bond graph and swapped onto the best-fitting alternative using deposited chemical shifts, or cleared with a diagnostic.
//! - **Two-pass reconciliation** – What the first pass fails to map becomes reparse reasons (sequence offsets, chain remaps, one-bond forcing) that seed a second pass and reach a fixed point.
//! - **Embedded dictionary** – Amino-acid, nucleotide and ion components ship as TOML files compiled into the library and back the `Nomenclature` service.
//! - **Readers** – mmCIF coordinate context and NMR-STAR chemical-shift loops share one STAR tokenizer.

mod db;

pub mod config;
pub mod engine;
pub mod error;
pub mod infer;
pub mod io;
pub mod model;
pub mod nomenclature;
pub mod remediate;
pub mod resolve;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ParserConfig;
pub use engine::{
    ContentSubtype, ParseInputs, ParseOutcome, PeakListHeader, PeakListInput, PeakListReport,
    PeakParser, reconcile,
};
pub use error::Error;
pub use model::assignment::{Assignment, AssignmentRow};
pub use model::coords::{CoordinateContext, CoordinateSnapshot};
pub use model::diagnostic::{Diagnostic, DiagnosticKind, DiagnosticLog, ListRef};
pub use model::dimension::{DimensionSetup, SpectralDim};
pub use model::peak::{Peak, PeakLabel, RawPeak};
pub use model::reparse::ReparseReasons;
pub use model::shifts::{ChemicalShiftIndex, ShiftLoop, ShiftRow};
pub use model::transfer::{Transfer, TransferSet};
pub use model::types::{Nucleus, SpectralRegion, TransferType};
pub use nomenclature::{ChemCompDictionary, Nomenclature};
