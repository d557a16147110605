//! Internal database API exposing read-only views over chemical components.
//!
//! Callers obtain [`ComponentView`] handles keyed by component id, enabling the nomenclature
//! service and the remediator to walk atoms and the bonded-atom graph without cloning the
//! underlying schema.

mod loader;
mod schema;
mod store;

use crate::model::types::{ComponentKind, Element};

/// Retrieves a component by its canonical id.
///
/// # Arguments
///
/// * `name` - Component identifier such as `"ALA"` or `"DC"`.
///
/// # Returns
///
/// `Some(ComponentView)` when the component exists, otherwise `None`.
pub fn get_component(name: &str) -> Option<ComponentView<'static>> {
    store::get_store()
        .components_by_name
        .get(name)
        .map(ComponentView::new)
}

/// Looks up the component registered under a one-letter code for a polymer kind.
///
/// # Arguments
///
/// * `kind` - Component family the code belongs to.
/// * `code` - Upper-case one-letter code.
///
/// # Returns
///
/// The component view, or `None` when the code is not registered for `kind`.
pub fn component_for_one_letter(kind: ComponentKind, code: char) -> Option<ComponentView<'static>> {
    let name = store::get_store().by_one_letter.get(&(kind, code))?;
    get_component(name)
}

/// Lightweight wrapper granting read-only access to a stored component.
#[derive(Debug, Clone, Copy)]
pub struct ComponentView<'a> {
    inner: &'a store::InternalComponent,
}

impl<'a> ComponentView<'a> {
    /// Creates a new view from the internal store entry.
    ///
    /// # Arguments
    ///
    /// * `inner` - Reference to the cached component.
    pub fn new(inner: &'a store::InternalComponent) -> Self {
        Self { inner }
    }

    /// Returns the component id.
    pub fn name(&self) -> &'a str {
        &self.inner.schema.info.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.inner.schema.info.kind
    }

    pub fn one_letter(&self) -> Option<char> {
        self.inner
            .schema
            .info
            .one_letter
            .as_deref()
            .and_then(|s| s.chars().next())
    }

    /// Iterates atoms with their elements in declaration order.
    ///
    /// # Returns
    ///
    /// An iterator yielding `(name, Element)` tuples.
    pub fn atoms(&self) -> impl Iterator<Item = (&'a str, Element)> + use<'a> {
        let inner: &'a store::InternalComponent = self.inner;
        inner
            .schema
            .topology
            .atoms
            .iter()
            .map(|a| (a.0.as_str(), a.1))
    }

    pub fn has_atom(&self, atom_id: &str) -> bool {
        self.inner.atom_index.contains_key(atom_id)
    }

    /// Returns the element of an atom, if the component declares it.
    pub fn element_of(&self, atom_id: &str) -> Option<Element> {
        let &idx = self.inner.atom_index.get(atom_id)?;
        Some(self.inner.schema.topology.atoms[idx].1)
    }

    /// Iterates the atoms directly bonded to `atom_id`.
    ///
    /// # Arguments
    ///
    /// * `atom_id` - Atom whose neighbours are requested.
    ///
    /// # Returns
    ///
    /// `(name, Element)` pairs; empty when the atom is unknown.
    pub fn neighbors(&self, atom_id: &str) -> impl Iterator<Item = (&'a str, Element)> + use<'a> {
        let inner: &'a store::InternalComponent = self.inner;
        let atoms = &inner.schema.topology.atoms;
        let indices: &'a [usize] = inner
            .atom_index
            .get(atom_id)
            .map(|&idx| inner.neighbors[idx].as_slice())
            .unwrap_or(&[]);
        indices.iter().map(move |&i| (atoms[i].0.as_str(), atoms[i].1))
    }

    pub fn is_bonded(&self, a: &str, b: &str) -> bool {
        self.neighbors(a).any(|(name, _)| name == b)
    }

    /// Returns the heavy atom a hydrogen is attached to.
    pub fn parent_of(&self, hydrogen: &str) -> Option<&'a str> {
        self.neighbors(hydrogen)
            .find(|(_, element)| element.is_heavy_atom())
            .map(|(name, _)| name)
    }

    /// Lists the hydrogens attached to a heavy atom in declaration order.
    pub fn hydrogens_of(&self, heavy: &str) -> Vec<&'a str> {
        self.neighbors(heavy)
            .filter(|(_, element)| *element == Element::H)
            .map(|(name, _)| name)
            .collect()
    }

    /// Reports whether the atom leaves the component when it links into a polymer.
    pub fn is_leaving(&self, atom_id: &str) -> bool {
        self.inner.schema.info.leaving.iter().any(|a| a == atom_id)
    }
}
