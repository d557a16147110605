//! Translation of atom tokens found in peak labels into dictionary atom ids.

use crate::db::ComponentView;
use crate::model::types::{ComponentKind, Element};
use smol_str::SmolStr;

const WILDCARDS: &[char] = &['*', '#', '%'];

/// Upper-cases a token and rewrites a double-quote prime as two single primes.
pub fn normalize_token(token: &str) -> String {
    token.trim().to_ascii_uppercase().replace('"', "''")
}

/// Expands an atom token to the atom ids it denotes in a component.
///
/// Rules are tried in order and the first that yields atoms wins: exact name, nucleotide
/// prime spellings, amide `HN`, leading-digit names, methylene `X1`, wildcards, `Q`/`M`
/// pseudo-atoms and element-symbol ions.
///
/// # Arguments
///
/// * `view` - Dictionary entry of the hypothesised residue.
/// * `token` - Atom token as written in the label.
///
/// # Returns
///
/// Atom ids in dictionary declaration order; empty when nothing matches.
pub fn expand(view: ComponentView<'_>, token: &str) -> Vec<SmolStr> {
    let t = normalize_token(token);
    if t.is_empty() {
        return Vec::new();
    }

    if view.has_atom(&t) {
        return vec![SmolStr::new(&t)];
    }

    let rules: [fn(ComponentView<'_>, &str) -> Vec<SmolStr>; 7] = [
        nucleotide_primes,
        amide_proton,
        leading_digit,
        methylene_one,
        wildcard,
        pseudo_atom,
        ion_symbol,
    ];
    rules
        .iter()
        .map(|rule| rule(view, &t))
        .find(|atoms| !atoms.is_empty())
        .unwrap_or_default()
}

fn single_if_present(view: ComponentView<'_>, name: &str) -> Vec<SmolStr> {
    if view.has_atom(name) {
        vec![SmolStr::new(name)]
    } else {
        Vec::new()
    }
}

fn nucleotide_primes(view: ComponentView<'_>, t: &str) -> Vec<SmolStr> {
    if !view.kind().is_nucleotide() {
        return Vec::new();
    }

    if t.contains('*') {
        let primed = t.replace('*', "'");
        if view.has_atom(&primed) {
            return vec![SmolStr::new(primed)];
        }
        if let Some(found) = split_prime_suffix(view, &primed) {
            return found;
        }
        return leading_digit(view, &primed);
    }

    split_prime_suffix(view, t).unwrap_or_default()
}

/// `H5'1`/`H5'2` and `H2'1`/`H2'2` name the two protons of a sugar methylene.
fn split_prime_suffix(view: ComponentView<'_>, t: &str) -> Option<Vec<SmolStr>> {
    let (stem, index) = t.rsplit_once('\'')?;
    let candidate = match index {
        "1" => format!("{stem}'"),
        "2" => format!("{stem}''"),
        _ => return None,
    };
    let found = single_if_present(view, &candidate);
    (!found.is_empty()).then_some(found)
}

fn amide_proton(view: ComponentView<'_>, t: &str) -> Vec<SmolStr> {
    match t {
        "HN" | "HT1" if view.kind() == ComponentKind::Peptide => single_if_present(view, "H"),
        _ => Vec::new(),
    }
}

/// Old PDB names put the index first: `1HB`, `2HD1`, `1H5'`.
fn leading_digit(view: ComponentView<'_>, t: &str) -> Vec<SmolStr> {
    let mut chars = t.chars();
    let Some(d) = chars.next().filter(|c| c.is_ascii_digit()) else {
        return Vec::new();
    };
    let rest = chars.as_str();
    if rest.is_empty() || !rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Vec::new();
    }

    if rest.ends_with('\'') {
        return match d {
            '1' => single_if_present(view, rest),
            '2' => single_if_present(view, &format!("{rest}'")),
            _ => Vec::new(),
        };
    }

    let is_methylene = !view.has_atom(&format!("{rest}1"))
        && view.has_atom(&format!("{rest}2"))
        && view.has_atom(&format!("{rest}3"));
    if is_methylene {
        return match d {
            '1' => single_if_present(view, &format!("{rest}2")),
            '2' => single_if_present(view, &format!("{rest}3")),
            _ => Vec::new(),
        };
    }

    single_if_present(view, &format!("{rest}{d}"))
}

/// Methylene protons numbered 1/2 map onto 3/2.
fn methylene_one(view: ComponentView<'_>, t: &str) -> Vec<SmolStr> {
    let Some(base) = t.strip_suffix('1') else {
        return Vec::new();
    };
    if base.is_empty() || !base.starts_with('H') {
        return Vec::new();
    }
    if view.has_atom(&format!("{base}2")) && view.has_atom(&format!("{base}3")) {
        single_if_present(view, &format!("{base}3"))
    } else {
        Vec::new()
    }
}

fn prefixed_atoms(view: ComponentView<'_>, prefix: &str, element: Option<Element>) -> Vec<SmolStr> {
    view.atoms()
        .filter(|(name, el)| {
            name.starts_with(prefix)
                && element.is_none_or(|e| e == *el)
                && (!view.is_leaving(name) || *name == prefix)
        })
        .map(|(name, _)| SmolStr::new(name))
        .collect()
}

fn leading_element(prefix: &str) -> Option<Element> {
    match prefix.chars().next()? {
        'H' => Some(Element::H),
        'C' => Some(Element::C),
        'N' => Some(Element::N),
        'O' => Some(Element::O),
        'P' => Some(Element::P),
        'S' => Some(Element::S),
        _ => None,
    }
}

fn wildcard(view: ComponentView<'_>, t: &str) -> Vec<SmolStr> {
    if !t.ends_with(WILDCARDS) {
        return Vec::new();
    }
    let prefix = t.trim_end_matches(WILDCARDS);
    if prefix.is_empty() {
        return Vec::new();
    }
    prefixed_atoms(view, prefix, leading_element(prefix))
}

fn pseudo_atom(view: ComponentView<'_>, t: &str) -> Vec<SmolStr> {
    let t = t.trim_end_matches(WILDCARDS);
    let Some(rest) = t.strip_prefix('Q').or_else(|| t.strip_prefix('M')) else {
        return Vec::new();
    };
    if rest.is_empty() {
        return Vec::new();
    }
    let is_methyl_prefix = t.starts_with('M');

    if rest == "R" {
        return ring_protons(view);
    }

    let stem = match rest.strip_prefix('Q') {
        Some(inner) if !inner.is_empty() => inner,
        _ => rest,
    };
    let atoms = prefixed_atoms(view, &format!("H{stem}"), Some(Element::H));

    if is_methyl_prefix && !rest.chars().any(|c| c.is_ascii_digit()) {
        let parents: Vec<_> = atoms.iter().filter_map(|a| view.parent_of(a)).collect();
        let single_methyl = atoms.len() == 3 && parents.windows(2).all(|w| w[0] == w[1]);
        if !single_methyl {
            return Vec::new();
        }
    }
    atoms
}

/// Protons on aromatic ring carbons of Phe, Tyr, Trp and His.
fn ring_protons(view: ComponentView<'_>) -> Vec<SmolStr> {
    if !matches!(view.one_letter(), Some('F' | 'Y' | 'W' | 'H'))
        || view.kind() != ComponentKind::Peptide
    {
        return Vec::new();
    }
    view.atoms()
        .filter(|(_, el)| *el == Element::H)
        .filter(|(name, _)| {
            view.parent_of(name).is_some_and(|p| {
                p.starts_with("CD") || p.starts_with("CE") || p.starts_with("CZ") || p.starts_with("CH")
            })
        })
        .map(|(name, _)| SmolStr::new(name))
        .collect()
}

fn ion_symbol(view: ComponentView<'_>, t: &str) -> Vec<SmolStr> {
    if view.kind() != ComponentKind::Ion {
        return Vec::new();
    }
    let symbol = t.trim_end_matches(|c: char| c.is_ascii_digit() || c == '+' || c == '-');
    let Ok(element) = symbol.parse::<Element>() else {
        return Vec::new();
    };
    view.atoms()
        .filter(|(_, el)| *el == element)
        .map(|(name, _)| SmolStr::new(name))
        .collect()
}

/// Recovers `<X>H'…` spellings through the bond graph.
///
/// The element letter picks the unique heavy atom of that element carrying at least two
/// protons; the number of primes selects its k-th proton.
pub fn rescue_via_bonds(view: ComponentView<'_>, token: &str) -> Option<SmolStr> {
    let t = normalize_token(token);
    let mut chars = t.chars();
    let element: Element = chars.next()?.to_string().parse().ok()?;
    if element == Element::H || !element.is_heavy_atom() {
        return None;
    }
    let rest = chars.as_str().strip_prefix('H')?;
    if rest.is_empty() || !rest.chars().all(|c| c == '\'') {
        return None;
    }
    let k = rest.len();

    let mut carriers = view
        .atoms()
        .filter(|(_, el)| *el == element)
        .map(|(name, _)| view.hydrogens_of(name))
        .filter(|hs| hs.len() >= 2);
    let protons = carriers.next()?;
    if carriers.next().is_some() {
        return None;
    }
    protons.get(k - 1).map(|h| SmolStr::new(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::get_component;

    fn expand_in(comp: &str, token: &str) -> Vec<String> {
        let view = get_component(comp).expect("component exists");
        expand(view, token).into_iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_names_are_case_insensitive() {
        assert_eq!(expand_in("TRP", "Hh2"), vec!["HH2"]);
        assert_eq!(expand_in("ALA", "ca"), vec!["CA"]);
    }

    #[test]
    fn amide_hn_maps_to_h() {
        assert_eq!(expand_in("GLY", "HN"), vec!["H"]);
        assert!(expand_in("A", "HN").is_empty());
    }

    #[test]
    fn leading_digit_names_follow_remediated_numbering() {
        assert_eq!(expand_in("ASP", "1HB"), vec!["HB2"]);
        assert_eq!(expand_in("ASP", "2HB"), vec!["HB3"]);
        assert_eq!(expand_in("ALA", "1HB"), vec!["HB1"]);
        assert_eq!(expand_in("LEU", "2HD1"), vec!["HD12"]);
        assert_eq!(expand_in("ASN", "1HD2"), vec!["HD21"]);
    }

    #[test]
    fn methylene_index_one_maps_to_three() {
        assert_eq!(expand_in("GLY", "HA1"), vec!["HA3"]);
        assert_eq!(expand_in("LYS", "HE1"), vec!["HE3"]);
        assert!(expand_in("ALA", "HA1").is_empty());
    }

    #[test]
    fn wildcards_expand_to_every_matching_atom() {
        assert_eq!(expand_in("ALA", "HB*"), vec!["HB1", "HB2", "HB3"]);
        assert_eq!(expand_in("LEU", "HD#").len(), 6);
        assert_eq!(expand_in("VAL", "HG2%"), vec!["HG21", "HG22", "HG23"]);
    }

    #[test]
    fn pseudo_atoms_expand_to_proton_groups() {
        assert_eq!(expand_in("ALA", "QB"), vec!["HB1", "HB2", "HB3"]);
        assert_eq!(expand_in("ALA", "MB"), vec!["HB1", "HB2", "HB3"]);
        assert_eq!(expand_in("VAL", "MG1"), vec!["HG11", "HG12", "HG13"]);
        assert_eq!(expand_in("LEU", "QQD").len(), 6);
        assert_eq!(expand_in("PHE", "QR").len(), 5);
        assert!(expand_in("LEU", "MD").is_empty());
    }

    #[test]
    fn nucleotide_primes_accept_star_and_numbered_spellings() {
        assert_eq!(expand_in("A", "C1*"), vec!["C1'"]);
        assert_eq!(expand_in("A", "H5'1"), vec!["H5'"]);
        assert_eq!(expand_in("A", "H5'2"), vec!["H5''"]);
        assert_eq!(expand_in("DA", "H2\""), vec!["H2''"]);
        assert_eq!(expand_in("DC", "2H5*"), vec!["H5''"]);
        assert_eq!(expand_in("C", "1H4"), vec!["H41"]);
    }

    #[test]
    fn ions_match_their_element_symbol() {
        assert_eq!(expand_in("ZN", "Zn"), vec!["ZN"]);
        assert_eq!(expand_in("CA", "CA2+"), vec!["CA"]);
        assert!(expand_in("ZN", "MG").is_empty());
    }

    #[test]
    fn unknown_tokens_expand_to_nothing() {
        assert!(expand_in("ALA", "HZ").is_empty());
        assert!(expand_in("ALA", "").is_empty());
    }

    #[test]
    fn bond_rescue_picks_kth_proton_of_amino_group() {
        let c = get_component("C").unwrap();
        assert_eq!(rescue_via_bonds(c, "NH''").as_deref(), Some("H42"));
        assert_eq!(rescue_via_bonds(c, "NH'").as_deref(), Some("H41"));
        let g = get_component("G").unwrap();
        assert_eq!(rescue_via_bonds(g, "NH''").as_deref(), Some("H22"));
        assert_eq!(rescue_via_bonds(c, "HN''"), None);
        let u = get_component("U").unwrap();
        assert_eq!(rescue_via_bonds(u, "NH'"), None);
    }
}
