//! NMR-STAR reader for `_Atom_chem_shift` loops.

use super::error::Error;
use super::star::{StarTable, read_tables};
use crate::model::shifts::{ShiftLoop, ShiftRow};
use smol_str::SmolStr;
use std::io::BufRead;

const FORMAT: &str = "NMR-STAR";
const CATEGORY: &str = "_Atom_chem_shift";

/// Reads every assigned chemical-shift loop of an NMR-STAR file.
///
/// Rows without a residue number or a shift value are skipped.
///
/// # Arguments
///
/// * `reader` - Buffered source of NMR-STAR text.
///
/// # Returns
///
/// One [`ShiftLoop`] per `_Atom_chem_shift` loop, in file order.
///
/// # Errors
///
/// Returns [`Error::InconsistentData`] when a loop lacks a mandatory column and
/// [`Error::Parse`] when a number cannot be read.
pub fn read<R: BufRead>(reader: R) -> Result<Vec<ShiftLoop>, Error> {
    let tables = read_tables(reader, FORMAT)?;
    tables
        .iter()
        .filter(|t| t.is_category(CATEGORY))
        .map(read_loop)
        .collect()
}

fn required(table: &StarTable, tag: &str) -> Result<usize, Error> {
    table.column(tag).ok_or_else(|| {
        Error::inconsistent_data(FORMAT, None, format!("{CATEGORY} loop has no {tag} column"))
    })
}

fn read_loop(table: &StarTable) -> Result<ShiftLoop, Error> {
    let seq_col = required(table, "Comp_index_ID")?;
    let comp_col = required(table, "Comp_ID")?;
    let atom_col = required(table, "Atom_ID")?;
    let val_col = required(table, "Val")?;
    let entity_assembly_col = table.column("Entity_assembly_ID");
    let isotope_col = table.column("Atom_isotope_number");
    let auth_asym_col = table.column("Auth_asym_ID");

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut skipped = 0usize;
    for (line_num, row) in table.iter_rows() {
        let (Some(seq), Some(comp), Some(atom), Some(val)) = (
            table.value(row, Some(seq_col)),
            table.value(row, Some(comp_col)),
            table.value(row, Some(atom_col)),
            table.value(row, Some(val_col)),
        ) else {
            skipped += 1;
            continue;
        };
        let comp_index_id = seq.parse::<i32>().map_err(|_| {
            Error::parse(FORMAT, None, line_num, format!("Invalid Comp_index_ID '{seq}'"))
        })?;
        let value = val
            .parse::<f64>()
            .map_err(|_| Error::parse(FORMAT, None, line_num, format!("Invalid Val '{val}'")))?;
        let isotope = match table.value(row, isotope_col) {
            Some(iso) => Some(iso.parse::<u16>().map_err(|_| {
                Error::parse(
                    FORMAT,
                    None,
                    line_num,
                    format!("Invalid Atom_isotope_number '{iso}'"),
                )
            })?),
            None => None,
        };

        rows.push(ShiftRow {
            entity_assembly_id: table.value(row, entity_assembly_col).map(SmolStr::new),
            comp_index_id,
            comp_id: SmolStr::new(comp),
            atom_id: SmolStr::new(atom),
            isotope,
            value,
            auth_asym_id: table.value(row, auth_asym_col).map(SmolStr::new),
        });
    }

    if skipped > 0 {
        log::debug!("NMR-STAR: skipped {skipped} incomplete {CATEGORY} row(s)");
    }
    Ok(rows)
}
