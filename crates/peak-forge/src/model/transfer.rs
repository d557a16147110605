use super::types::TransferType;
use serde::Serialize;

/// A coherence transfer between two dimensions of the same list.
///
/// Dimension ids are one-based and stored with `dim_id_1 < dim_id_2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub dim_id_1: usize,
    pub dim_id_2: usize,
    #[serde(rename = "type")]
    pub kind: TransferType,
    pub indirect: bool,
}

impl Transfer {
    pub fn new(a: usize, b: usize, kind: TransferType, indirect: bool) -> Self {
        let (dim_id_1, dim_id_2) = if a <= b { (a, b) } else { (b, a) };
        Self {
            dim_id_1,
            dim_id_2,
            kind,
            indirect,
        }
    }

    pub fn involves(&self, dim_id: usize) -> bool {
        self.dim_id_1 == dim_id || self.dim_id_2 == dim_id
    }

    pub fn connects(&self, a: usize, b: usize) -> bool {
        (self.dim_id_1 == a && self.dim_id_2 == b) || (self.dim_id_1 == b && self.dim_id_2 == a)
    }

    /// The dimension on the other end of the transfer.
    pub fn partner(&self, dim_id: usize) -> Option<usize> {
        if self.dim_id_1 == dim_id {
            Some(self.dim_id_2)
        } else if self.dim_id_2 == dim_id {
            Some(self.dim_id_1)
        } else {
            None
        }
    }
}

/// Ordered transfer table of one list.
///
/// Insertion rejects self-pairs, a second transfer of the same type on the same pair, and a
/// one-bond transfer touching a dimension that already has one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TransferSet {
    items: Vec<Transfer>,
}

impl TransferSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transfer if it keeps the table consistent.
    ///
    /// # Returns
    ///
    /// `true` when the transfer was inserted.
    pub fn insert(&mut self, transfer: Transfer) -> bool {
        if transfer.dim_id_1 == transfer.dim_id_2 {
            return false;
        }
        if self.has(transfer.dim_id_1, transfer.dim_id_2, transfer.kind) {
            return false;
        }
        if transfer.kind == TransferType::OneBond
            && (self.onebond_partner(transfer.dim_id_1).is_some()
                || self.onebond_partner(transfer.dim_id_2).is_some())
        {
            return false;
        }
        self.items.push(transfer);
        true
    }

    pub fn has(&self, a: usize, b: usize, kind: TransferType) -> bool {
        self.items.iter().any(|t| t.kind == kind && t.connects(a, b))
    }

    pub fn has_any(&self, a: usize, b: usize) -> bool {
        self.items.iter().any(|t| t.connects(a, b))
    }

    pub fn onebond_partner(&self, dim_id: usize) -> Option<usize> {
        self.items
            .iter()
            .filter(|t| t.kind == TransferType::OneBond)
            .find_map(|t| t.partner(dim_id))
    }

    pub fn of_kind(&self, kind: TransferType) -> impl Iterator<Item = &Transfer> {
        self.items.iter().filter(move |t| t.kind == kind)
    }

    pub fn remove_kind(&mut self, kind: TransferType) {
        self.items.retain(|t| t.kind != kind);
    }

    /// Elects the transfer that names the experiment: highest priority, earliest on ties.
    pub fn primary(&self) -> Option<&Transfer> {
        self.items.iter().fold(None, |best: Option<&Transfer>, t| match best {
            Some(b) if b.kind.priority() >= t.kind.priority() => Some(b),
            _ => Some(t),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transfer> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
