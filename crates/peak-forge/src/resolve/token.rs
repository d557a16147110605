//! Splitting of free-form peak labels into typed spans.
//!
//! A label such as `"14Trp.Hh2"` or `"D1391HB"` is cut into tokens at separator
//! characters. Each token is then read as a sequence of [`Piece`]s in every way the
//! grammar `chain? comp? seq? comp? atom{0,4}` allows; the caller ranks the readings
//! against the coordinates.

use smol_str::SmolStr;

/// Readings kept per token.
pub const MAX_READINGS: usize = 8;

/// Atom names one token may concatenate.
pub const MAX_ATOMS_PER_TOKEN: usize = 4;

const MAX_SEQ_DIGITS: usize = 6;
const MAX_COMP_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Chain(SmolStr),
    Seq(i32),
    Comp(SmolStr),
    Atom(SmolStr),
}

pub type Reading = Vec<Piece>;

/// Vocabulary consulted while reading a token.
pub trait Lexicon {
    /// Component id for a residue spelling of two or more characters.
    fn residue_name(&self, text: &str) -> Option<SmolStr>;

    /// Component id for a one-letter code, when the polymer type allows one.
    fn one_letter(&self, code: char) -> Option<SmolStr>;

    fn is_chain(&self, text: &str) -> bool;

    /// Whether a component is a monatomic ion whose only atom shares its name.
    fn is_ion(&self, comp_id: &str) -> bool;
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '\'' | '"' | '*' | '#' | '%')
}

fn is_nucleus_char(b: u8) -> bool {
    matches!(b, b'H' | b'Q' | b'M' | b'C' | b'N' | b'P' | b'F')
}

/// Splits a label at every character that cannot belong to a name or number.
pub fn split_label(label: &str) -> Vec<&str> {
    label
        .split(|c: char| !is_token_char(c))
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
struct Seen {
    comp: bool,
    seq: bool,
    atoms: usize,
}

struct Walker<'a, L: Lexicon> {
    text: &'a str,
    lexicon: &'a L,
    stack: Reading,
    out: Vec<Reading>,
}

impl<L: Lexicon> Walker<'_, L> {
    fn full(&self) -> bool {
        self.out.len() >= MAX_READINGS
    }

    fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    fn emit(&mut self) {
        if self.stack.is_empty() || self.full() || self.out.contains(&self.stack) {
            return;
        }
        self.out.push(self.stack.clone());
    }

    fn with_piece(&mut self, piece: Piece, pos: usize, seen: Seen) {
        self.stack.push(piece);
        self.walk(pos, seen);
        self.stack.pop();
    }

    fn walk(&mut self, pos: usize, seen: Seen) {
        if self.full() {
            return;
        }
        if pos == self.text.len() {
            self.emit();
            if let Some(Piece::Comp(comp)) = self.stack.last().cloned() {
                if self.lexicon.is_ion(&comp) {
                    self.stack.push(Piece::Atom(comp));
                    self.emit();
                    self.stack.pop();
                }
            }
            return;
        }

        if seen.atoms == 0 {
            self.try_seq(pos, seen);
            self.try_comp(pos, seen);
        }
        self.try_atoms(pos, seen);
    }

    fn try_seq(&mut self, pos: usize, seen: Seen) {
        if seen.seq {
            return;
        }
        let run = self.bytes()[pos..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if run == 0 {
            return;
        }
        for len in (1..=run.min(MAX_SEQ_DIGITS)).rev() {
            if run - len > 1 {
                continue;
            }
            let Ok(value) = self.text[pos..pos + len].parse::<i32>() else {
                continue;
            };
            let next = Seen { seq: true, ..seen };
            self.with_piece(Piece::Seq(value), pos + len, next);
        }
    }

    fn try_comp(&mut self, pos: usize, seen: Seen) {
        if seen.comp {
            return;
        }
        let run = self.bytes()[pos..]
            .iter()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        if run == 0 {
            return;
        }
        let next = Seen { comp: true, ..seen };
        for len in (2..=run.min(MAX_COMP_LEN)).rev() {
            if let Some(comp) = self.lexicon.residue_name(&self.text[pos..pos + len]) {
                self.with_piece(Piece::Comp(comp), pos + len, next);
            }
        }
        let code = self.bytes()[pos] as char;
        if let Some(comp) = self.lexicon.one_letter(code) {
            self.with_piece(Piece::Comp(comp), pos + 1, next);
        }
    }

    /// Length of the mandatory head of an atom name starting at `pos`, if one starts there.
    fn atom_head(&self, pos: usize) -> Option<usize> {
        let bytes = self.bytes();
        let first = *bytes.get(pos)?;
        if is_nucleus_char(first) {
            return Some(1);
        }
        let second = *bytes.get(pos + 1)?;
        (first.is_ascii_digit() && is_nucleus_char(second)).then_some(2)
    }

    fn try_atoms(&mut self, pos: usize, seen: Seen) {
        if seen.atoms >= MAX_ATOMS_PER_TOKEN {
            return;
        }
        let Some(head) = self.atom_head(pos) else {
            return;
        };
        let pseudo = matches!(self.bytes()[pos + head - 1], b'Q' | b'M');
        let len = self.text.len();
        for end in (pos + head..=len).rev() {
            if pseudo && end == pos + head {
                continue;
            }
            if end < len && self.atom_head(end).is_none() {
                continue;
            }
            let next = Seen {
                atoms: seen.atoms + 1,
                ..seen
            };
            let name = SmolStr::new(&self.text[pos..end]);
            self.with_piece(Piece::Atom(name), end, next);
        }
    }
}

/// Enumerates the readings of one token, best-formed first.
///
/// # Arguments
///
/// * `token` - A token produced by [`split_label`].
/// * `lexicon` - Residue and chain vocabulary.
///
/// # Returns
///
/// At most [`MAX_READINGS`] readings. A token naming a known chain on its own also
/// yields a single-piece chain reading, placed first.
pub fn readings<L: Lexicon>(token: &str, lexicon: &L) -> Vec<Reading> {
    let upper = token.to_ascii_uppercase();
    let mut walker = Walker {
        text: &upper,
        lexicon,
        stack: Vec::new(),
        out: Vec::new(),
    };

    if upper.len() <= MAX_COMP_LEN && lexicon.is_chain(&upper) {
        walker.out.push(vec![Piece::Chain(SmolStr::new(&upper))]);
    }
    let bytes = upper.as_bytes();
    if bytes.len() > 1 && bytes[0].is_ascii_alphabetic() && bytes[1].is_ascii_digit() {
        let chain = &upper[..1];
        if lexicon.is_chain(chain) {
            walker.stack.push(Piece::Chain(SmolStr::new(chain)));
            walker.walk(1, Seen::default());
            walker.stack.pop();
        }
    }
    walker.walk(0, Seen::default());
    walker.out
}
