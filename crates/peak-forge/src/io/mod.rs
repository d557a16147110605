//! Readers for the collaborator inputs of a reconcile run.
//!
//! The coordinate context comes from an mmCIF model and the assigned chemical shifts come
//! from the `_Atom_chem_shift` loops of an NMR-STAR entry. Both share one STAR table reader.

mod error;
mod mmcif;
mod nmrstar;
mod star;

pub use error::Error;
pub use mmcif::read as read_coordinate_context;
pub use nmrstar::read as read_shift_loops;
