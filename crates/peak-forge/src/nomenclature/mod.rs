//! Residue and atom nomenclature service.
//!
//! Peak labels name residues and atoms with force-field, legacy PDB and pseudo-atom
//! spellings. The [`Nomenclature`] trait answers the questions the resolver and the
//! remediator ask about such names, and [`ChemCompDictionary`] answers them from the
//! embedded component dictionary with bounded memoisation.

mod alias;
mod ambiguity;
mod atom;

pub use alias::ResidueAliases;
pub use ambiguity::AtomGroup;
pub use atom::normalize_token;

use crate::db::{self, ComponentView};
use crate::model::types::{ComponentKind, Element, PolymerType};
use lru::LruCache;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::num::NonZeroUsize;

/// Result of expanding one atom token against a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomExpansion {
    pub atom_ids: Vec<SmolStr>,
    /// Set when the component is not in the dictionary or the token matched nothing.
    pub details: Option<String>,
}

impl AtomExpansion {
    pub fn is_empty(&self) -> bool {
        self.atom_ids.is_empty()
    }
}

/// Restricts which bonded atoms [`Nomenclature::bonded_atoms`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondFilter {
    Proton,
    NonProton,
    Any,
}

impl BondFilter {
    fn admits(&self, element: Element) -> bool {
        match self {
            BondFilter::Proton => element == Element::H,
            BondFilter::NonProton => element != Element::H,
            BondFilter::Any => true,
        }
    }
}

/// Questions the assignment pipeline asks about residue and atom names.
pub trait Nomenclature {
    /// Maps a residue spelling onto a component id, preferring `reference` when both denote
    /// the same nucleotide base.
    fn standardize_residue(&self, comp_id: &str, reference: Option<&str>) -> SmolStr;

    /// Expands an atom token to dictionary atom ids of `comp_id`.
    fn expand_atom(&self, comp_id: &str, token: &str) -> AtomExpansion;

    /// Lists atoms bonded to `atom_id`, filtered by element class.
    fn bonded_atoms(&self, comp_id: &str, atom_id: &str, filter: BondFilter) -> Vec<SmolStr>;

    fn is_bonded(&self, comp_id: &str, a: &str, b: &str) -> bool;

    fn component_kind(&self, comp_id: &str) -> Option<ComponentKind>;

    fn is_peptide_like(&self, comp_id: &str) -> bool {
        self.component_kind(comp_id) == Some(ComponentKind::Peptide)
    }

    /// Whether the component is a standard amino acid or nucleotide.
    fn is_standard_monomer(&self, comp_id: &str) -> bool {
        self.component_kind(comp_id)
            .is_some_and(|k| k != ComponentKind::Ion)
    }

    /// Largest ambiguity code among the atoms `token` expands to.
    fn max_ambiguity_code(&self, comp_id: &str, token: &str) -> u8;

    /// Component for a one-letter code within a polymer of the given type.
    fn one_letter_comp(&self, code: char, polymer: PolymerType) -> Option<SmolStr>;

    /// Recovers `<X>H'…` spellings through the bond graph.
    fn rescue_atom(&self, comp_id: &str, token: &str) -> Option<SmolStr>;

    fn atom_group(&self, comp_id: &str, atom_ids: &[&str]) -> AtomGroup;

    /// Drops memoised answers.
    fn clear_caches(&self);
}

/// Dictionary-backed [`Nomenclature`] with LRU memoisation of residue and atom lookups.
#[derive(Debug)]
pub struct ChemCompDictionary {
    aliases: ResidueAliases,
    residue_cache: RefCell<LruCache<(SmolStr, Option<SmolStr>), SmolStr>>,
    atom_cache: RefCell<LruCache<(SmolStr, SmolStr), AtomExpansion>>,
}

impl ChemCompDictionary {
    /// Creates a service over the embedded dictionary.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Entry bound of each memo table.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_aliases(ResidueAliases::new_default(), capacity)
    }

    pub fn with_aliases(aliases: ResidueAliases, capacity: NonZeroUsize) -> Self {
        Self {
            aliases,
            residue_cache: RefCell::new(LruCache::new(capacity)),
            atom_cache: RefCell::new(LruCache::new(capacity)),
        }
    }

    fn view(&self, comp_id: &str) -> Option<ComponentView<'static>> {
        db::get_component(comp_id)
    }

    fn resolve_residue(&self, comp_id: &str, reference: Option<&str>) -> SmolStr {
        let upper = comp_id.trim().to_ascii_uppercase();
        let canonical = self.aliases.resolve_name(&upper).to_string();

        let Some(reference) = reference.map(|r| r.trim().to_ascii_uppercase()) else {
            return SmolStr::new(canonical);
        };
        let reference = self.aliases.resolve_name(&reference).to_string();
        if reference == canonical {
            return SmolStr::new(canonical);
        }

        let same_base = match (self.view(&canonical), self.view(&reference)) {
            (Some(c), Some(r)) => {
                c.kind().is_nucleotide()
                    && r.kind().is_nucleotide()
                    && c.one_letter().is_some()
                    && c.one_letter() == r.one_letter()
            }
            (None, Some(r)) => {
                r.kind().is_nucleotide()
                    && canonical.len() == 1
                    && r.one_letter().map(String::from).as_deref() == Some(canonical.as_str())
            }
            _ => false,
        };
        if same_base {
            SmolStr::new(reference)
        } else {
            SmolStr::new(canonical)
        }
    }

    fn compute_expansion(&self, comp_id: &str, token: &str) -> AtomExpansion {
        let Some(view) = self.view(comp_id) else {
            let normalized = normalize_token(token);
            return AtomExpansion {
                atom_ids: if normalized.is_empty() {
                    Vec::new()
                } else {
                    vec![SmolStr::new(normalized)]
                },
                details: Some(format!("{comp_id} is not a dictionary component")),
            };
        };

        let atom_ids = atom::expand(view, token);
        let details = atom_ids
            .is_empty()
            .then(|| format!("{token} does not name an atom of {comp_id}"));
        AtomExpansion { atom_ids, details }
    }
}

impl Default for ChemCompDictionary {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(1024).unwrap_or(NonZeroUsize::MIN))
    }
}

impl Nomenclature for ChemCompDictionary {
    fn standardize_residue(&self, comp_id: &str, reference: Option<&str>) -> SmolStr {
        let key = (SmolStr::new(comp_id), reference.map(SmolStr::new));
        if let Some(hit) = self.residue_cache.borrow_mut().get(&key) {
            return hit.clone();
        }
        let resolved = self.resolve_residue(comp_id, reference);
        self.residue_cache.borrow_mut().put(key, resolved.clone());
        resolved
    }

    fn expand_atom(&self, comp_id: &str, token: &str) -> AtomExpansion {
        let key = (SmolStr::new(comp_id), SmolStr::new(token));
        if let Some(hit) = self.atom_cache.borrow_mut().get(&key) {
            return hit.clone();
        }
        let expansion = self.compute_expansion(comp_id, token);
        self.atom_cache.borrow_mut().put(key, expansion.clone());
        expansion
    }

    fn bonded_atoms(&self, comp_id: &str, atom_id: &str, filter: BondFilter) -> Vec<SmolStr> {
        let Some(view) = self.view(comp_id) else {
            return Vec::new();
        };
        view.neighbors(atom_id)
            .filter(|(_, element)| filter.admits(*element))
            .map(|(name, _)| SmolStr::new(name))
            .collect()
    }

    fn is_bonded(&self, comp_id: &str, a: &str, b: &str) -> bool {
        self.view(comp_id).is_some_and(|v| v.is_bonded(a, b))
    }

    fn component_kind(&self, comp_id: &str) -> Option<ComponentKind> {
        self.view(comp_id).map(|v| v.kind())
    }

    fn max_ambiguity_code(&self, comp_id: &str, token: &str) -> u8 {
        let Some(view) = self.view(comp_id) else {
            return 1;
        };
        self.expand_atom(comp_id, token)
            .atom_ids
            .iter()
            .map(|a| ambiguity::ambiguity_code(view, a))
            .max()
            .unwrap_or(1)
    }

    fn one_letter_comp(&self, code: char, polymer: PolymerType) -> Option<SmolStr> {
        let code = code.to_ascii_uppercase();
        let kind = match polymer {
            PolymerType::Polypeptide => ComponentKind::Peptide,
            PolymerType::Polyribonucleotide => ComponentKind::Rna,
            PolymerType::Polydeoxyribonucleotide => ComponentKind::Dna,
            PolymerType::Other => return None,
        };
        db::component_for_one_letter(kind, code).map(|v| SmolStr::new(v.name()))
    }

    fn rescue_atom(&self, comp_id: &str, token: &str) -> Option<SmolStr> {
        atom::rescue_via_bonds(self.view(comp_id)?, token)
    }

    fn atom_group(&self, comp_id: &str, atom_ids: &[&str]) -> AtomGroup {
        match self.view(comp_id) {
            Some(view) => ambiguity::classify_group(view, atom_ids),
            None if atom_ids.len() <= 1 => AtomGroup::Single,
            None => AtomGroup::Mixed,
        }
    }

    fn clear_caches(&self) {
        self.residue_cache.borrow_mut().clear();
        self.atom_cache.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> ChemCompDictionary {
        ChemCompDictionary::new(NonZeroUsize::new(8).unwrap())
    }

    #[test]
    fn standardize_resolves_aliases_and_case() {
        let dict = dictionary();
        assert_eq!(dict.standardize_residue("hie", None), "HIS");
        assert_eq!(dict.standardize_residue("Trp", None), "TRP");
        assert_eq!(dict.standardize_residue("XYZ", None), "XYZ");
    }

    #[test]
    fn standardize_prefers_reference_nucleotide_with_same_base() {
        let dict = dictionary();
        assert_eq!(dict.standardize_residue("A", Some("DA")), "DA");
        assert_eq!(dict.standardize_residue("ADE", Some("DA")), "DA");
        assert_eq!(dict.standardize_residue("G", Some("DA")), "G");
        assert_eq!(dict.standardize_residue("ALA", Some("DA")), "ALA");
    }

    #[test]
    fn expansion_reports_details_on_failure() {
        let dict = dictionary();
        let ok = dict.expand_atom("TRP", "HH2");
        assert_eq!(ok.atom_ids, vec![SmolStr::new("HH2")]);
        assert!(ok.details.is_none());

        let bad = dict.expand_atom("ALA", "HG");
        assert!(bad.is_empty());
        assert!(bad.details.is_some());

        let unknown = dict.expand_atom("LIG", "c12");
        assert_eq!(unknown.atom_ids, vec![SmolStr::new("C12")]);
        assert!(unknown.details.is_some());
    }

    #[test]
    fn repeated_expansion_is_served_from_cache() {
        let dict = dictionary();
        let first = dict.expand_atom("ASP", "1HB");
        assert_eq!(dict.atom_cache.borrow().len(), 1);
        let second = dict.expand_atom("ASP", "1HB");
        assert_eq!(first, second);
        assert_eq!(dict.atom_cache.borrow().len(), 1);
        dict.clear_caches();
        assert_eq!(dict.atom_cache.borrow().len(), 0);
    }

    #[test]
    fn bonded_atoms_are_filtered_by_element_class() {
        let dict = dictionary();
        let protons = dict.bonded_atoms("ALA", "CB", BondFilter::Proton);
        assert_eq!(protons, vec!["HB1", "HB2", "HB3"]);
        let heavy = dict.bonded_atoms("ALA", "CB", BondFilter::NonProton);
        assert_eq!(heavy, vec!["CA"]);
        assert!(dict.is_bonded("ALA", "CA", "HA"));
        assert!(!dict.is_bonded("ALA", "HA", "CB"));
    }

    #[test]
    fn one_letter_codes_follow_polymer_type() {
        let dict = dictionary();
        assert_eq!(
            dict.one_letter_comp('d', PolymerType::Polypeptide).as_deref(),
            Some("ASP")
        );
        assert_eq!(
            dict.one_letter_comp('T', PolymerType::Polydeoxyribonucleotide).as_deref(),
            Some("DT")
        );
        assert_eq!(dict.one_letter_comp('A', PolymerType::Other), None);
    }

    #[test]
    fn component_classification() {
        let dict = dictionary();
        assert!(dict.is_peptide_like("GLY"));
        assert!(!dict.is_peptide_like("U"));
        assert!(dict.is_standard_monomer("DC"));
        assert!(!dict.is_standard_monomer("ZN"));
        assert!(!dict.is_standard_monomer("HOH"));
        assert_eq!(dict.max_ambiguity_code("LEU", "HD1*"), 2);
        assert_eq!(dict.max_ambiguity_code("PHE", "HD1"), 3);
        assert_eq!(dict.rescue_atom("C", "NH''").as_deref(), Some("H42"));
    }
}
