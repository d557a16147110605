//! Emitted shape of a reconciled parse.

use super::counter::ContentSubtype;
use crate::model::diagnostic::{DiagnosticLog, ListRef};
use crate::model::dimension::SpectralDim;
use crate::model::peak::Peak;
use crate::model::reparse::ReparseReasons;
use crate::model::transfer::TransferSet;
use crate::model::types::TransferType;
use serde::Serialize;

/// One closed peak list with its inferred setup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakListReport {
    pub list: ListRef,
    pub subtype: ContentSubtype,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrum_name: Option<String>,
    pub experiment_class: Option<String>,
    pub primary_transfer: Option<TransferType>,
    pub dimensions: Vec<SpectralDim>,
    pub transfers: TransferSet,
    /// Kept peaks; dropped peaks never appear here.
    pub peaks: Vec<Peak>,
}

impl PeakListReport {
    pub fn peak_count(&self) -> usize {
        self.peaks.len()
    }

    pub fn dimension(&self, dim_id: usize) -> Option<&SpectralDim> {
        self.dimensions.iter().find(|d| d.dim_id == dim_id)
    }
}

/// Everything a parse produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub lists: Vec<PeakListReport>,
    pub diagnostics: DiagnosticLog,
    pub reasons: ReparseReasons,
    /// Passes run to reach the result.
    pub passes: usize,
}

impl ParseOutcome {
    pub fn list(&self, num_dim: usize, list_id: u32) -> Option<&PeakListReport> {
        self.lists
            .iter()
            .find(|l| l.list.num_dim == num_dim && l.list.list_id == list_id)
    }
}

fn side(dims: &[SpectralDim], transfers: &TransferSet, dim_id: usize, other: usize) -> Option<String> {
    let symbol = |id: usize| {
        dims.iter()
            .find(|d| d.dim_id == id)
            .and_then(|d| d.nucleus)
            .map(|n| n.symbol())
    };
    let mut text = symbol(dim_id)?.to_string();
    if let Some(partner) = transfers.onebond_partner(dim_id).filter(|p| *p != other) {
        if let Some(bonded) = symbol(partner) {
            text.push('[');
            text.push_str(bonded);
            text.push(']');
        }
    }
    Some(text)
}

/// Names the experiment of a list as `a[b]_c[d].primary`.
///
/// `a` and `c` are the nuclei on the two sides of the primary transfer; `b` and `d` are
/// the nuclei one bond away from each side. A side's bracket is dropped when it has no
/// one-bond partner or when that partner is the other side of the primary transfer.
///
/// # Returns
///
/// `None` when the list has no transfer or a side's nucleus is unknown.
pub fn experiment_class(dims: &[SpectralDim], transfers: &TransferSet) -> Option<String> {
    let primary = transfers.primary()?;
    let a = side(dims, transfers, primary.dim_id_1, primary.dim_id_2)?;
    let c = side(dims, transfers, primary.dim_id_2, primary.dim_id_1)?;
    Some(format!("{a}_{c}.{}", primary.kind))
}
