//! Table-level reader shared by the mmCIF and NMR-STAR front-ends.
//!
//! Both formats are STAR dialects: `loop_` blocks of tagged columns, single key/value items,
//! quoted values and `;`-delimited text fields. The reader flattens a file into
//! [`StarTable`]s in file order; data blocks and save frames only delimit tables.

use super::error::Error;
use std::io::BufRead;

/// One loop or one run of key/value items sharing a category.
#[derive(Debug, Clone, PartialEq)]
pub struct StarTable {
    /// Category prefix including the leading underscore, e.g. `_atom_site`.
    pub category: String,
    /// Column names with the category prefix removed.
    pub tags: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Line on which each row ends.
    pub row_lines: Vec<usize>,
}

impl StarTable {
    fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            tags: Vec::new(),
            rows: Vec::new(),
            row_lines: Vec::new(),
        }
    }

    pub fn is_category(&self, category: &str) -> bool {
        self.category.eq_ignore_ascii_case(category)
    }

    /// Column index of a tag, compared case-insensitively.
    pub fn column(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t.eq_ignore_ascii_case(tag))
    }

    /// First present column among `tags`.
    pub fn column_any(&self, tags: &[&str]) -> Option<usize> {
        tags.iter().find_map(|t| self.column(t))
    }

    /// Cell value with the STAR null markers `.` and `?` mapped to `None`.
    pub fn value<'a>(&self, row: &'a [String], column: Option<usize>) -> Option<&'a str> {
        let cell = row.get(column?)?.as_str();
        (!matches!(cell, "." | "?" | "")).then_some(cell)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.row_lines
            .iter()
            .copied()
            .zip(self.rows.iter().map(|r| r.as_slice()))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    quoted: bool,
}

/// Splits a line into tokens while respecting single and double quotes.
///
/// A quote only closes a value when followed by whitespace or the end of the line, so
/// primes inside atom names such as `"H5''"` or `C1'` survive intact.
fn tokenize_star_line(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote: Option<char> = None;
    let chars: Vec<char> = line.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        match in_quote {
            Some(q) => {
                let closes = c == q && chars.get(i + 1).is_none_or(|n| n.is_whitespace());
                if closes {
                    tokens.push(Token {
                        text: std::mem::take(&mut current),
                        quoted: true,
                    });
                    in_quote = None;
                } else {
                    current.push(c);
                }
            }
            None => {
                if c.is_whitespace() {
                    if !current.is_empty() {
                        tokens.push(Token {
                            text: std::mem::take(&mut current),
                            quoted: false,
                        });
                    }
                } else if (c == '\'' || c == '"') && current.is_empty() {
                    in_quote = Some(c);
                } else {
                    current.push(c);
                }
            }
        }
    }
    if in_quote.is_some() || !current.is_empty() {
        tokens.push(Token {
            text: current,
            quoted: in_quote.is_some(),
        });
    }
    tokens
}

fn split_tag(tag: &str) -> (&str, &str) {
    tag.split_once('.').unwrap_or((tag, ""))
}

/// DFA states of the table builder.
enum ParserState {
    Base,
    InLoopHeader,
    InLoopBody,
    AwaitingValue(String),
}

struct TableBuilder {
    format: &'static str,
    state: ParserState,
    tables: Vec<StarTable>,
    loop_table: Option<StarTable>,
    pending: Vec<String>,
    /// Index into `tables` of the open key/value run.
    item_table: Option<usize>,
}

impl TableBuilder {
    fn new(format: &'static str) -> Self {
        Self {
            format,
            state: ParserState::Base,
            tables: Vec::new(),
            loop_table: None,
            pending: Vec::new(),
            item_table: None,
        }
    }

    fn close_loop(&mut self, line_num: usize) -> Result<(), Error> {
        if let Some(table) = self.loop_table.take() {
            if !self.pending.is_empty() {
                return Err(Error::parse(
                    self.format,
                    None,
                    line_num,
                    format!(
                        "{} loop row has {} of {} values",
                        table.category,
                        self.pending.len(),
                        table.tags.len()
                    ),
                ));
            }
            self.tables.push(table);
        }
        Ok(())
    }

    fn push_item(&mut self, tag: &str, value: String, line_num: usize) {
        let (category, name) = split_tag(tag);
        let reusable = self.item_table.filter(|&idx| {
            let t = &self.tables[idx];
            t.is_category(category) && t.column(name).is_none()
        });
        let idx = match reusable {
            Some(idx) => idx,
            None => {
                let mut table = StarTable::new(category);
                table.rows.push(Vec::new());
                table.row_lines.push(line_num);
                self.tables.push(table);
                self.tables.len() - 1
            }
        };
        let table = &mut self.tables[idx];
        table.tags.push(name.to_string());
        table.rows[0].push(value);
        self.item_table = Some(idx);
    }

    fn accept(&mut self, token: Token, line_num: usize) -> Result<(), Error> {
        if !token.quoted {
            let lower = token.text.to_ascii_lowercase();
            if lower == "loop_" {
                self.close_loop(line_num)?;
                self.item_table = None;
                self.state = ParserState::InLoopHeader;
                return Ok(());
            }
            if lower == "stop_" {
                self.close_loop(line_num)?;
                self.state = ParserState::Base;
                return Ok(());
            }
            if lower.starts_with("data_") || lower.starts_with("save_") || lower == "global_" {
                self.close_loop(line_num)?;
                self.item_table = None;
                self.state = ParserState::Base;
                return Ok(());
            }
            if token.text.starts_with('_') {
                match std::mem::replace(&mut self.state, ParserState::Base) {
                    ParserState::InLoopHeader => {
                        let (category, name) = split_tag(&token.text);
                        let table = self
                            .loop_table
                            .get_or_insert_with(|| StarTable::new(category));
                        table.tags.push(name.to_string());
                        self.state = ParserState::InLoopHeader;
                        return Ok(());
                    }
                    ParserState::InLoopBody => self.close_loop(line_num)?,
                    ParserState::AwaitingValue(tag) => {
                        return Err(Error::parse(
                            self.format,
                            None,
                            line_num,
                            format!("item {tag} has no value"),
                        ));
                    }
                    ParserState::Base => {}
                }
                self.state = ParserState::AwaitingValue(token.text);
                return Ok(());
            }
        }

        match std::mem::replace(&mut self.state, ParserState::Base) {
            ParserState::InLoopHeader | ParserState::InLoopBody => {
                let Some(table) = self.loop_table.as_mut() else {
                    return Err(Error::parse(
                        self.format,
                        None,
                        line_num,
                        "loop_ declares no tags",
                    ));
                };
                self.pending.push(token.text);
                if self.pending.len() == table.tags.len() {
                    table.rows.push(std::mem::take(&mut self.pending));
                    table.row_lines.push(line_num);
                }
                self.state = ParserState::InLoopBody;
                Ok(())
            }
            ParserState::AwaitingValue(tag) => {
                self.push_item(&tag, token.text, line_num);
                Ok(())
            }
            ParserState::Base => Err(Error::parse(
                self.format,
                None,
                line_num,
                format!("value '{}' appears outside any item or loop", token.text),
            )),
        }
    }

    fn finish(mut self, line_num: usize) -> Result<Vec<StarTable>, Error> {
        if let ParserState::AwaitingValue(tag) = &self.state {
            return Err(Error::parse(
                self.format,
                None,
                line_num,
                format!("item {tag} has no value"),
            ));
        }
        self.close_loop(line_num)?;
        Ok(self.tables)
    }
}

/// Reads every table of a STAR-dialect stream.
///
/// # Arguments
///
/// * `reader` - Buffered source of mmCIF or NMR-STAR text.
/// * `format` - Format name used in error messages.
///
/// # Returns
///
/// Tables in file order; key/value items of one category form a single-row table.
///
/// # Errors
///
/// Returns [`Error::Parse`] for truncated loop rows, dangling items, stray values and
/// unterminated text fields, and [`Error::Io`] when the stream fails.
pub fn read_tables<R: BufRead>(reader: R, format: &'static str) -> Result<Vec<StarTable>, Error> {
    let mut builder = TableBuilder::new(format);
    let mut text_field: Option<(usize, String)> = None;
    let mut line_num = 0;

    for line in reader.lines() {
        line_num += 1;
        let line = line.map_err(|e| Error::from_io(e, None))?;

        if let Some((start, mut text)) = text_field.take() {
            if line.starts_with(';') {
                builder.accept(
                    Token {
                        text: text.trim_end().to_string(),
                        quoted: true,
                    },
                    start,
                )?;
            } else {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&line);
                text_field = Some((start, text));
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix(';') {
            text_field = Some((line_num, rest.to_string()));
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        for token in tokenize_star_line(trimmed) {
            builder.accept(token, line_num)?;
        }
    }

    if let Some((start, _)) = text_field {
        return Err(Error::parse(format, None, start, "text field is never closed"));
    }
    builder.finish(line_num)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tables(text: &str) -> Vec<StarTable> {
        read_tables(Cursor::new(text), "mmCIF").expect("valid STAR text")
    }

    #[test]
    fn tokenizer_keeps_primes_inside_quoted_atom_names() {
        let tokens: Vec<String> = tokenize_star_line(r#"A 1 "H5''" C1' 'O5 x'"#)
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(tokens, vec!["A", "1", "H5''", "C1'", "O5 x"]);
    }

    #[test]
    fn loops_are_split_into_rows_across_lines() {
        let t = tables(
            "data_test\nloop_\n_atom_site.id\n_atom_site.label_atom_id\n_atom_site.auth_seq_id\n1 N\n 5\n2 CA 5\n#\n",
        );
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].category, "_atom_site");
        assert_eq!(t[0].tags, vec!["id", "label_atom_id", "auth_seq_id"]);
        assert_eq!(t[0].rows.len(), 2);
        assert_eq!(t[0].row_lines, vec![7, 8]);
        let col = t[0].column("LABEL_ATOM_ID");
        assert_eq!(t[0].value(&t[0].rows[1], col), Some("CA"));
    }

    #[test]
    fn key_value_items_group_by_category() {
        let t = tables("_exptl.entry_id 1ABC\n_exptl.method 'SOLUTION NMR'\n_cell.length_a 1.0\n");
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].category, "_exptl");
        let col = t[0].column("method");
        assert_eq!(t[0].value(&t[0].rows[0], col), Some("SOLUTION NMR"));
    }

    #[test]
    fn text_fields_and_stop_markers_are_handled() {
        let t = tables(
            "save_shifts\n_Assigned_chem_shift_list.Details\n;\nfree text\n;\nloop_\n_Atom_chem_shift.ID\n_Atom_chem_shift.Val\n1 4.30\nstop_\nsave_\n",
        );
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].rows[0][0], "free text");
        assert_eq!(t[1].category, "_Atom_chem_shift");
        assert_eq!(t[1].rows, vec![vec!["1".to_string(), "4.30".to_string()]]);
    }

    #[test]
    fn null_markers_read_as_missing() {
        let t = tables("loop_\n_x.a\n_x.b\n. ?\n");
        assert_eq!(t[0].value(&t[0].rows[0], Some(0)), None);
        assert_eq!(t[0].value(&t[0].rows[0], Some(1)), None);
        assert_eq!(t[0].value(&t[0].rows[0], None), None);
    }

    #[test]
    fn truncated_loop_rows_are_rejected() {
        let err = read_tables(Cursor::new("loop_\n_x.a\n_x.b\n1 2\n3\n_y.c 4\n"), "mmCIF")
            .unwrap_err();
        assert!(matches!(err, Error::Parse { line_number: 6, .. }));
    }

    #[test]
    fn unterminated_text_field_is_an_error() {
        let err = read_tables(Cursor::new("_x.a\n;\nnever closed\n"), "NMR-STAR").unwrap_err();
        assert!(matches!(err, Error::Parse { line_number: 2, .. }));
    }
}
