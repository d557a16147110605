//! Error type for collaborator misuse of the parse driver.
//!
//! Problems inside peak lists (out-of-range values, unknown atoms, inconsistent assignments)
//! are never raised; they are recorded as diagnostics. The variants below cover malformed
//! calls from the upstream parser that leave the session in no meaningful state.

use crate::model::diagnostic::ListRef;
use thiserror::Error;

/// Error conditions surfaced by the parse driver and configuration loader.
#[derive(Debug, Error)]
pub enum Error {
    /// A peak's position count differs from the dimensionality of its list.
    #[error("peak carries {found} positions but {list} has {expected} dimensions")]
    DimensionMismatch {
        list: ListRef,
        expected: usize,
        found: usize,
    },

    /// A peak or close request arrived while no list was open.
    #[error("no peak list is open")]
    NoOpenList,

    /// A list was opened before the previous one was closed.
    #[error("{open} is still open")]
    ListAlreadyOpen { open: ListRef },

    /// The requested list id was reserved or already issued.
    #[error("list id {list_id} is already in use for {subtype} lists")]
    ListIdInUse { subtype: &'static str, list_id: u32 },

    /// A list was declared with no dimensions.
    #[error("a peak list needs at least one dimension")]
    NoDimensions,

    /// The dimension setup table does not match the declared dimensionality.
    #[error("peak list declares {num_dim} dimensions but supplies {setups} dimension setups")]
    SetupMismatch { num_dim: usize, setups: usize },

    /// Configuration text failed to deserialize.
    #[error("invalid parser configuration: {details}")]
    InvalidConfig { details: String },
}

impl Error {
    /// Helper for constructing an [`Error::DimensionMismatch`] variant.
    ///
    /// # Arguments
    ///
    /// * `list` - List the peak was offered to.
    /// * `found` - Number of positions on the peak.
    pub fn dimension_mismatch(list: ListRef, found: usize) -> Self {
        Self::DimensionMismatch {
            list,
            expected: list.num_dim,
            found,
        }
    }

    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }
}
