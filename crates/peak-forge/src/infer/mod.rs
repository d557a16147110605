//! Inference of the spectrometer setup of a peak list from its peaks.
//!
//! Dimension inference classifies every axis from the ppm values observed on it; transfer
//! inference then links the classified axes using filename hints and the correlation of
//! peak coordinates between axes. Both run once per list, after its last peak arrives.

mod dimension;
mod hints;
mod stats;
mod transfer;

pub use dimension::infer_dimensions;
pub use hints::FileHints;
pub use stats::pearson;
pub use transfer::{infer_transfers, sample_positions};

use crate::model::dimension::SpectralDim;
use crate::model::transfer::TransferSet;
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Everything besides the dimensions themselves that steers inference for one list.
#[derive(Debug, Clone, Copy)]
pub struct InferenceContext<'a> {
    /// The deposited structure was solved by solid-state NMR.
    pub solid_state: bool,
    pub hints: FileHints,
    /// Correlation a one-bond candidate needs in lists without aromatic axes.
    pub onebond_min_correlation: f64,
    /// Per-dimension element counts of the atoms assigned during the first pass.
    pub atom_type_history: Option<&'a [BTreeMap<SmolStr, usize>]>,
    /// DIM-transfer index whose one-bond pairs replace the inferred ones.
    pub onebond_resolved: Option<usize>,
}

impl Default for InferenceContext<'_> {
    fn default() -> Self {
        Self {
            solid_state: false,
            hints: FileHints::default(),
            onebond_min_correlation: 0.2,
            atom_type_history: None,
            onebond_resolved: None,
        }
    }
}

/// Classifies the dimensions of a list and infers its transfer table.
///
/// # Arguments
///
/// * `dims` - Dimensions with `freq_hint` filled from the kept peaks.
/// * `positions` - Peak positions of the list, one row per peak.
/// * `ctx` - Hints and first-pass corrections for the list.
///
/// # Returns
///
/// The transfer table. `freq_hint` of every dimension is cleared on return.
pub fn run(dims: &mut [SpectralDim], positions: &[Vec<f64>], ctx: &InferenceContext<'_>) -> TransferSet {
    infer_dimensions(dims, ctx);
    let transfers = infer_transfers(dims, positions, ctx);
    for dim in dims.iter_mut() {
        dim.freq_hint.clear();
    }
    transfers
}
