use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// One dimension's assignment to a coordinate atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub chain_id: SmolStr,
    pub seq_id: i32,
    pub comp_id: SmolStr,
    pub atom_id: SmolStr,
    pub auth_atom_id: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguity_code: Option<u8>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub as_is: bool,
}

/// Per-dimension assignments of one alternative; `None` is a blank atom field.
pub type AssignmentRow = Vec<Option<Assignment>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Empty,
    Partial,
    Complete,
}

impl Assignment {
    pub fn new(
        chain_id: impl Into<SmolStr>,
        seq_id: i32,
        comp_id: impl Into<SmolStr>,
        atom_id: impl Into<SmolStr>,
    ) -> Self {
        let atom_id = atom_id.into();
        Self {
            chain_id: chain_id.into(),
            seq_id,
            comp_id: comp_id.into(),
            auth_atom_id: atom_id.clone(),
            atom_id,
            ambiguity_code: None,
            as_is: false,
        }
    }

    pub fn same_residue(&self, other: &Assignment) -> bool {
        self.chain_id == other.chain_id && self.seq_id == other.seq_id
    }

    pub fn is_proton(&self) -> bool {
        self.atom_id.starts_with('H')
    }
}

impl fmt::Display for Assignment {
    /// Formats the canonical `chain:seq:comp:atom` label.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chain_id, self.seq_id, self.comp_id, self.atom_id
        )
    }
}

/// Classifies a row by how many of its atom fields are populated.
pub fn row_state(row: &[Option<Assignment>]) -> RowState {
    let filled = row.iter().filter(|a| a.is_some()).count();
    if filled == 0 {
        RowState::Empty
    } else if filled == row.len() {
        RowState::Complete
    } else {
        RowState::Partial
    }
}
