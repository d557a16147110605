//! mmCIF reader producing the coordinate context consulted by the assignment resolver.
//!
//! Only the categories that describe sequence, numbering and atom presence are read:
//! entity polymers, the polymer/non-polymer/branched numbering schemes, first-model atom
//! sites, unobserved residues and atoms, covalent connections and the experimental method.

use super::error::Error;
use super::star::{StarTable, read_tables};
use crate::model::coords::{
    CoordinateContext, CoordinateSnapshot, EntityAssembly, NonPolymer, PolymerSequence,
    ResidueAtoms, ResidueKey,
};
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::BufRead;

const FORMAT: &str = "mmCIF";
const SOLID_STATE: &str = "SOLID-STATE NMR";

/// Parses mmCIF text into a [`CoordinateContext`].
///
/// # Arguments
///
/// * `reader` - Any buffered reader that yields mmCIF text.
///
/// # Returns
///
/// The indexed coordinate context.
///
/// # Errors
///
/// Returns [`Error`] for malformed STAR syntax, non-numeric sequence numbers, or IO
/// failures reported by `reader`.
pub fn read<R: BufRead>(reader: R) -> Result<CoordinateContext, Error> {
    let tables = read_tables(reader, FORMAT)?;
    build_snapshot(&tables).map(CoordinateContext::from)
}

fn parse_int(value: &str, what: &str, line_num: usize) -> Result<i32, Error> {
    value
        .parse::<i32>()
        .map_err(|_| Error::parse(FORMAT, None, line_num, format!("Invalid {what} '{value}'")))
}

fn tables_of<'a>(tables: &'a [StarTable], category: &'a str) -> impl Iterator<Item = &'a StarTable> + 'a {
    tables.iter().filter(move |t| t.is_category(category))
}

fn build_snapshot(tables: &[StarTable]) -> Result<CoordinateSnapshot, Error> {
    let mut snapshot = CoordinateSnapshot {
        entity_assembly: read_entity_poly(tables),
        ..Default::default()
    };
    snapshot.polymers = read_poly_seq_scheme(tables, &snapshot.entity_assembly)?;
    snapshot.non_polymers = read_non_polymers(tables)?;
    let (model_num_name, observed) = read_atom_sites(tables)?;
    if let Some(name) = model_num_name {
        snapshot.model_num_name = name;
    }
    snapshot.observed_atoms = observed;
    let (unobserved_residues, unobserved_atoms) = read_unobserved(tables)?;
    snapshot.unobserved_residues = unobserved_residues;
    snapshot.unobserved_atoms = unobserved_atoms;
    snapshot.cyclic_chains = read_cyclic_chains(tables, &snapshot.polymers)?;
    snapshot.exptl_method = read_method(tables);

    log::debug!(
        "mmCIF: {} polymer chain(s), {} non-polymer residue(s), {} residue(s) with atom sites",
        snapshot.polymers.len(),
        snapshot.non_polymers.len(),
        snapshot.observed_atoms.len()
    );
    Ok(snapshot)
}

fn read_entity_poly(tables: &[StarTable]) -> Vec<EntityAssembly> {
    let mut out = Vec::new();
    for table in tables_of(tables, "_entity_poly") {
        let entity_col = table.column("entity_id");
        let type_col = table.column("type");
        let strand_col = table.column("pdbx_strand_id");
        for (_, row) in table.iter_rows() {
            let Some(entity_id) = table
                .value(row, entity_col)
                .and_then(|v| v.parse::<u32>().ok())
            else {
                continue;
            };
            let chain_ids = table
                .value(row, strand_col)
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(SmolStr::new)
                        .collect()
                })
                .unwrap_or_default();
            out.push(EntityAssembly {
                entity_id,
                chain_ids,
                polymer_type: table.value(row, type_col).map(str::to_string),
            });
        }
    }
    out
}

fn read_poly_seq_scheme(
    tables: &[StarTable],
    entities: &[EntityAssembly],
) -> Result<Vec<PolymerSequence>, Error> {
    let mut order: Vec<SmolStr> = Vec::new();
    let mut chains: HashMap<SmolStr, PolymerSequence> = HashMap::new();

    for table in tables_of(tables, "_pdbx_poly_seq_scheme") {
        let chain_col = table.column_any(&["pdb_strand_id", "asym_id"]);
        let entity_col = table.column("entity_id");
        let seq_col = table.column("seq_id");
        let auth_seq_col = table.column_any(&["pdb_seq_num", "auth_seq_num"]);
        let mon_col = table.column("mon_id");
        let auth_mon_col = table.column_any(&["pdb_mon_id", "auth_mon_id"]);

        for (line_num, row) in table.iter_rows() {
            let (Some(chain_id), Some(seq), Some(mon)) = (
                table.value(row, chain_col),
                table.value(row, seq_col),
                table.value(row, mon_col),
            ) else {
                continue;
            };
            let seq_id = parse_int(seq, "seq_id", line_num)?;
            let auth_seq_id = match table.value(row, auth_seq_col) {
                Some(v) => parse_int(v, "author sequence number", line_num)?,
                None => seq_id,
            };

            let chain_key = SmolStr::new(chain_id);
            let chain = chains.entry(chain_key.clone()).or_insert_with(|| {
                order.push(chain_key.clone());
                PolymerSequence {
                    chain_id: chain_key.clone(),
                    entity_id: table
                        .value(row, entity_col)
                        .and_then(|e| e.parse::<u32>().ok()),
                    ..Default::default()
                }
            });

            if chain.seq_id.last() == Some(&seq_id) {
                // microheterogeneity: a second monomer at the same position
                if let Some(alts) = chain.alt_comp_id.last_mut() {
                    alts.push(SmolStr::new(mon));
                }
                continue;
            }

            chain.seq_id.push(seq_id);
            chain.auth_seq_id.push(auth_seq_id);
            chain.comp_id.push(SmolStr::new(mon));
            chain.auth_comp_id.push(SmolStr::new(
                table.value(row, auth_mon_col).unwrap_or(mon),
            ));
            chain.alt_comp_id.push(Vec::new());
        }
    }

    let mut polymers: Vec<PolymerSequence> = order
        .into_iter()
        .filter_map(|c| chains.remove(&c))
        .collect();

    for chain in &mut polymers {
        chain.gap_in_auth_seq = chain
            .auth_seq_id
            .windows(2)
            .zip(chain.seq_id.windows(2))
            .any(|(auth, label)| auth[1] - auth[0] > label[1] - label[0]);
        if chain.alt_comp_id.iter().all(Vec::is_empty) {
            chain.alt_comp_id.clear();
        }
    }

    let mut by_entity: BTreeMap<u32, Vec<SmolStr>> = BTreeMap::new();
    for chain in &polymers {
        if let Some(entity_id) = chain.entity_id {
            by_entity.entry(entity_id).or_default().push(chain.chain_id.clone());
        }
    }
    for entity in entities {
        let members = by_entity.entry(entity.entity_id).or_default();
        for chain in &entity.chain_ids {
            if !members.contains(chain) {
                members.push(chain.clone());
            }
        }
    }
    for chain in &mut polymers {
        if let Some(members) = chain.entity_id.and_then(|e| by_entity.get(&e)) {
            if members.len() > 1 {
                chain.identical_chain_id = members.clone();
            }
        }
    }

    Ok(polymers)
}

fn read_non_polymers(tables: &[StarTable]) -> Result<Vec<NonPolymer>, Error> {
    let mut out = Vec::new();
    for (category, branched) in [("_pdbx_nonpoly_scheme", false), ("_pdbx_branch_scheme", true)] {
        for table in tables_of(tables, category) {
            let chain_col = table.column_any(&["pdb_strand_id", "pdb_asym_id", "asym_id"]);
            let seq_col = table.column_any(&["pdb_seq_num", "auth_seq_num"]);
            let label_col = table.column_any(&["num", "ndb_seq_num"]);
            let mon_col = table.column("mon_id");
            let auth_mon_col = table.column_any(&["pdb_mon_id", "auth_mon_id"]);
            let entity_col = table.column("entity_id");

            for (line_num, row) in table.iter_rows() {
                let (Some(chain_id), Some(seq), Some(mon)) = (
                    table.value(row, chain_col),
                    table.value(row, seq_col),
                    table.value(row, mon_col),
                ) else {
                    continue;
                };
                let alt_comp_id = table
                    .value(row, auth_mon_col)
                    .filter(|a| *a != mon)
                    .map(|a| vec![SmolStr::new(a)])
                    .unwrap_or_default();
                out.push(NonPolymer {
                    chain_id: SmolStr::new(chain_id),
                    seq_id: parse_int(seq, "non-polymer sequence number", line_num)?,
                    label_seq_id: table.value(row, label_col).and_then(|v| v.parse().ok()),
                    comp_id: SmolStr::new(mon),
                    alt_comp_id,
                    entity_id: table.value(row, entity_col).and_then(|v| v.parse().ok()),
                    branched,
                });
            }
        }
    }
    Ok(out)
}

/// Collects atom names per residue from the first model of `_atom_site`.
fn read_atom_sites(tables: &[StarTable]) -> Result<(Option<String>, Vec<ResidueAtoms>), Error> {
    let mut model_num_name = None;
    let mut order: Vec<ResidueKey> = Vec::new();
    let mut atoms: HashMap<ResidueKey, Vec<SmolStr>> = HashMap::new();

    for table in tables_of(tables, "_atom_site") {
        let model_col = match table.column("pdbx_PDB_model_num") {
            Some(col) => {
                model_num_name = Some("pdbx_PDB_model_num".to_string());
                Some(col)
            }
            None => table.column("ndb_model").inspect(|_| {
                model_num_name = Some("ndb_model".to_string());
            }),
        };
        let chain_col = table.column_any(&["auth_asym_id", "label_asym_id"]);
        let seq_col = table.column_any(&["auth_seq_id", "label_seq_id"]);
        let atom_col = table.column_any(&["auth_atom_id", "label_atom_id"]);
        let mut first_model: Option<String> = None;

        for (line_num, row) in table.iter_rows() {
            if let Some(model) = table.value(row, model_col) {
                match &first_model {
                    None => first_model = Some(model.to_string()),
                    Some(first) if first != model => continue,
                    Some(_) => {}
                }
            }
            let (Some(chain_id), Some(seq), Some(atom)) = (
                table.value(row, chain_col),
                table.value(row, seq_col),
                table.value(row, atom_col),
            ) else {
                continue;
            };
            let key = ResidueKey::new(chain_id, parse_int(seq, "atom_site sequence number", line_num)?);
            let entry = atoms.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                Vec::new()
            });
            if !entry.iter().any(|a| a == atom) {
                entry.push(SmolStr::new(atom));
            }
        }
    }

    let residues = order
        .into_iter()
        .filter_map(|key| {
            let atom_ids = atoms.remove(&key)?;
            Some(ResidueAtoms {
                chain_id: key.chain_id,
                seq_id: key.seq_id,
                atom_ids,
            })
        })
        .collect();
    Ok((model_num_name, residues))
}

type Unobserved = (Vec<ResidueKey>, Vec<ResidueAtoms>);

fn read_unobserved(tables: &[StarTable]) -> Result<Unobserved, Error> {
    let mut residues = BTreeSet::new();
    for table in tables_of(tables, "_pdbx_unobs_or_zero_occ_residues") {
        let chain_col = table.column_any(&["auth_asym_id", "label_asym_id"]);
        let seq_col = table.column_any(&["auth_seq_id", "label_seq_id"]);
        for (line_num, row) in table.iter_rows() {
            if let (Some(chain), Some(seq)) = (table.value(row, chain_col), table.value(row, seq_col)) {
                residues.insert(ResidueKey::new(chain, parse_int(seq, "unobserved residue number", line_num)?));
            }
        }
    }

    let mut atoms: BTreeMap<ResidueKey, Vec<SmolStr>> = BTreeMap::new();
    for table in tables_of(tables, "_pdbx_unobs_or_zero_occ_atoms") {
        let chain_col = table.column_any(&["auth_asym_id", "label_asym_id"]);
        let seq_col = table.column_any(&["auth_seq_id", "label_seq_id"]);
        let atom_col = table.column_any(&["auth_atom_id", "label_atom_id"]);
        for (line_num, row) in table.iter_rows() {
            if let (Some(chain), Some(seq), Some(atom)) = (
                table.value(row, chain_col),
                table.value(row, seq_col),
                table.value(row, atom_col),
            ) {
                let key = ResidueKey::new(chain, parse_int(seq, "unobserved atom residue number", line_num)?);
                let entry = atoms.entry(key).or_default();
                if !entry.iter().any(|a| a == atom) {
                    entry.push(SmolStr::new(atom));
                }
            }
        }
    }

    let atoms = atoms
        .into_iter()
        .map(|(key, atom_ids)| ResidueAtoms {
            chain_id: key.chain_id,
            seq_id: key.seq_id,
            atom_ids,
        })
        .collect();
    Ok((residues.into_iter().collect(), atoms))
}

/// Chains whose first and last residues are covalently linked.
fn read_cyclic_chains(tables: &[StarTable], polymers: &[PolymerSequence]) -> Result<Vec<SmolStr>, Error> {
    let mut cyclic = Vec::new();
    for table in tables_of(tables, "_struct_conn") {
        let type_col = table.column("conn_type_id");
        let cols = [
            table.column("ptnr1_auth_asym_id"),
            table.column("ptnr1_auth_seq_id"),
            table.column("ptnr2_auth_asym_id"),
            table.column("ptnr2_auth_seq_id"),
        ];
        for (line_num, row) in table.iter_rows() {
            if !table
                .value(row, type_col)
                .is_some_and(|t| t.eq_ignore_ascii_case("covale"))
            {
                continue;
            }
            let [Some(c1), Some(s1), Some(c2), Some(s2)] = cols.map(|c| table.value(row, c)) else {
                continue;
            };
            if c1 != c2 {
                continue;
            }
            let s1 = parse_int(s1, "connection sequence number", line_num)?;
            let s2 = parse_int(s2, "connection sequence number", line_num)?;
            let Some(chain) = polymers.iter().find(|p| p.chain_id == c1) else {
                continue;
            };
            let (Some(first), Some(last)) = (chain.first_auth(), chain.last_auth()) else {
                continue;
            };
            let ends = (s1.min(s2), s1.max(s2));
            if ends == (first, last) && first != last && !cyclic.contains(&chain.chain_id) {
                cyclic.push(chain.chain_id.clone());
            }
        }
    }
    Ok(cyclic)
}

fn read_method(tables: &[StarTable]) -> String {
    let methods: Vec<&str> = tables_of(tables, "_exptl")
        .flat_map(|t| {
            let col = t.column("method");
            t.rows.iter().filter_map(move |row| t.value(row, col))
        })
        .collect();
    methods
        .iter()
        .find(|m| m.eq_ignore_ascii_case(SOLID_STATE))
        .map(|_| SOLID_STATE.to_string())
        .or_else(|| methods.first().map(|m| m.to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::coords::AtomPresence;
    use crate::model::types::PolymerType;
    use std::io::Cursor;

    const SAMPLE: &str = r#"data_TEST
#
_exptl.entry_id TEST
_exptl.method 'SOLID-STATE NMR'
#
loop_
_entity_poly.entity_id
_entity_poly.type
_entity_poly.pdbx_strand_id
1 'polypeptide(L)' A,B
#
loop_
_pdbx_poly_seq_scheme.asym_id
_pdbx_poly_seq_scheme.entity_id
_pdbx_poly_seq_scheme.seq_id
_pdbx_poly_seq_scheme.mon_id
_pdbx_poly_seq_scheme.pdb_seq_num
_pdbx_poly_seq_scheme.pdb_mon_id
_pdbx_poly_seq_scheme.pdb_strand_id
A 1 1 GLY 10 GLY A
A 1 2 TRP 11 TRP A
A 1 3 ALA 13 ALA A
B 1 1 GLY 10 GLY B
B 1 2 TRP 11 TRP B
B 1 3 ALA 12 ALA B
#
loop_
_pdbx_nonpoly_scheme.asym_id
_pdbx_nonpoly_scheme.entity_id
_pdbx_nonpoly_scheme.mon_id
_pdbx_nonpoly_scheme.pdb_seq_num
_pdbx_nonpoly_scheme.pdb_mon_id
_pdbx_nonpoly_scheme.pdb_strand_id
C 2 ZN 101 ZN A
#
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.label_atom_id
_atom_site.auth_seq_id
_atom_site.auth_asym_id
_atom_site.auth_atom_id
_atom_site.pdbx_PDB_model_num
ATOM 1 N 11 A N 1
ATOM 2 CA 11 A CA 1
ATOM 3 HH2 11 A HH2 1
ATOM 4 N 11 A N 2
ATOM 5 XX 11 A XX 2
#
loop_
_pdbx_unobs_or_zero_occ_residues.id
_pdbx_unobs_or_zero_occ_residues.auth_asym_id
_pdbx_unobs_or_zero_occ_residues.auth_seq_id
1 A 10
#
loop_
_struct_conn.id
_struct_conn.conn_type_id
_struct_conn.ptnr1_auth_asym_id
_struct_conn.ptnr1_auth_seq_id
_struct_conn.ptnr2_auth_asym_id
_struct_conn.ptnr2_auth_seq_id
covale1 covale B 12 B 10
"#;

    fn sample() -> CoordinateContext {
        read(Cursor::new(SAMPLE)).expect("sample mmCIF parses")
    }

    #[test]
    fn polymer_numbering_and_gaps_are_read() {
        let ctx = sample();
        let a = ctx.polymer("A").unwrap();
        assert_eq!(a.seq_id, vec![1, 2, 3]);
        assert_eq!(a.auth_seq_id, vec![10, 11, 13]);
        assert!(a.gap_in_auth_seq);
        assert!(!ctx.polymer("B").unwrap().gap_in_auth_seq);
        assert_eq!(a.identical_chain_id, vec![SmolStr::new("A"), SmolStr::new("B")]);
        assert_eq!(ctx.polymer_type("A"), PolymerType::Polypeptide);
    }

    #[test]
    fn atom_sites_come_from_the_first_model_only() {
        let ctx = sample();
        let atoms = ctx.residue_atoms("A", 11).unwrap();
        assert!(atoms.contains("HH2"));
        assert!(!atoms.contains("XX"));
        assert_eq!(ctx.model_num_name(), "pdbx_PDB_model_num");
        assert_eq!(ctx.atom_presence("A", 11, "TRP", "HE1"), AtomPresence::Absent);
        assert_eq!(ctx.atom_presence("A", 10, "GLY", "N"), AtomPresence::Unobserved);
    }

    #[test]
    fn ligands_method_and_cyclic_chains_are_read() {
        let ctx = sample();
        assert_eq!(ctx.non_polymers().len(), 1);
        assert_eq!(ctx.non_polymers()[0].comp_id, "ZN");
        assert_eq!(ctx.non_polymers()[0].chain_id, "A");
        assert!(ctx.is_solid_state());
        assert!(ctx.is_cyclic("B"));
        assert!(!ctx.is_cyclic("A"));
    }

    #[test]
    fn non_numeric_sequence_numbers_are_rejected() {
        let text = "loop_\n_pdbx_poly_seq_scheme.pdb_strand_id\n_pdbx_poly_seq_scheme.seq_id\n_pdbx_poly_seq_scheme.mon_id\nA x GLY\n";
        let err = read(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, Error::Parse { line_number: 5, .. }));
    }
}
