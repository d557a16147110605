use serde::Serialize;
use std::fmt;

/// Classification of a problem found while reconciling a peak list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    RangeValueError,
    RangeValueWarning,
    MissingData,
    SequenceMismatch,
    SequenceMismatchWarning,
    AtomNotFound,
    InvalidAtomNomenclature,
    InvalidAtomSelection,
    InconsistentPeakAssignment,
    HydrogenNotInstantiated,
    CoordinateIssue,
}

impl DiagnosticKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::RangeValueError => "Range value error",
            DiagnosticKind::RangeValueWarning => "Range value warning",
            DiagnosticKind::MissingData => "Missing data",
            DiagnosticKind::SequenceMismatch => "Sequence mismatch",
            DiagnosticKind::SequenceMismatchWarning => "Sequence mismatch warning",
            DiagnosticKind::AtomNotFound => "Atom not found",
            DiagnosticKind::InvalidAtomNomenclature => "Invalid atom nomenclature",
            DiagnosticKind::InvalidAtomSelection => "Invalid atom selection",
            DiagnosticKind::InconsistentPeakAssignment => "Inconsistent peak assignment",
            DiagnosticKind::HydrogenNotInstantiated => "Hydrogen not instantiated",
            DiagnosticKind::CoordinateIssue => "Coordinate issue",
        }
    }

    /// Errors invalidate the peak or assignment they refer to; warnings do not.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::RangeValueError
                | DiagnosticKind::MissingData
                | DiagnosticKind::SequenceMismatch
                | DiagnosticKind::AtomNotFound
                | DiagnosticKind::InvalidAtomNomenclature
                | DiagnosticKind::InvalidAtomSelection
        )
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Identifies a peak list by dimensionality and list id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListRef {
    pub num_dim: usize,
    pub list_id: u32,
}

impl fmt::Display for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}D peak list {}", self.num_dim, self.list_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub list: Option<ListRef>,
    pub peak: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] ", self.kind)?;
        match (self.list, self.peak) {
            (Some(list), Some(peak)) => write!(f, "[Check row {} of {}] ", peak + 1, list)?,
            (Some(list), None) => write!(f, "[Check {}] ", list)?,
            _ => {}
        }
        write!(f, "{}", self.message)
    }
}

/// Insertion-ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        list: Option<ListRef>,
        peak: Option<usize>,
        message: impl Into<String>,
    ) {
        self.entries.push(Diagnostic {
            kind,
            list,
            peak,
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: DiagnosticLog) {
        self.entries.extend(other.entries);
    }

    /// Removes repeated entries, keeping the first occurrence of each.
    pub fn dedup(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.entries.retain(|d| seen.insert(d.clone()));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn for_list(&self, list: ListRef) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.list == Some(list))
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
