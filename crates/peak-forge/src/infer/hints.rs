use serde::Serialize;

/// Experiment hints read from the names attached to a peak list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileHints {
    pub noe: bool,
    pub roe: bool,
    pub cosy: bool,
    pub tocsy: bool,
    pub aro: bool,
    pub anoe: bool,
    pub rfdr: bool,
    pub darr: bool,
    pub redor: bool,
    pub tedor: bool,
    /// Set by the caller when the list is declared to hold long-range correlations.
    pub long_range: bool,
}

impl FileHints {
    /// Scans one name for the hint keywords, case-insensitively.
    pub fn scan(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let has = |key: &str| lower.contains(key);
        Self {
            noe: has("noe"),
            roe: has("roe"),
            cosy: has("cosy"),
            tocsy: has("tocsy"),
            aro: has("aro"),
            anoe: has("anoe"),
            rfdr: has("rfdr"),
            darr: has("darr"),
            redor: has("redor"),
            tedor: has("tedor"),
            long_range: false,
        }
    }

    /// Combines the original file name with the optional spectrum name.
    ///
    /// The original file name takes precedence: the spectrum name is consulted only when the
    /// file name carries no experiment keyword.
    pub fn from_names(original_filename: Option<&str>, spectrum_name: Option<&str>) -> Self {
        let primary = original_filename.map(Self::scan).unwrap_or_default();
        if primary.any() {
            return primary;
        }
        spectrum_name.map(Self::scan).unwrap_or_default()
    }

    pub fn with_long_range(mut self, long_range: bool) -> Self {
        self.long_range = long_range;
        self
    }

    fn any(&self) -> bool {
        self.noe
            || self.roe
            || self.cosy
            || self.tocsy
            || self.aro
            || self.anoe
            || self.has_solid_state_sequence()
    }

    pub fn has_through_space(&self) -> bool {
        self.noe || self.roe
    }

    /// RFDR, DARR, REDOR or TEDOR.
    pub fn has_solid_state_sequence(&self) -> bool {
        self.rfdr || self.darr || self.redor || self.tedor
    }

    pub fn has_specific_sequence(&self) -> bool {
        self.has_through_space() || self.has_solid_state_sequence()
    }

    /// Aromatic-selective experiment; widens the C-aromatic window.
    pub fn is_aromatic(&self) -> bool {
        self.aro || self.anoe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_is_case_insensitive_substring() {
        let h = FileHints::scan("data_NOESY.peaks");
        assert!(h.noe);
        assert!(h.has_through_space());
        assert!(!h.cosy);

        let h = FileHints::scan("13C_aroNOE.list");
        assert!(h.aro && h.noe && h.is_aromatic());

        assert!(FileHints::scan("rfdr.peaks").has_solid_state_sequence());
        assert!(FileHints::scan("TOCSY").tocsy);
    }

    #[test]
    fn original_filename_takes_precedence() {
        let h = FileHints::from_names(Some("hsqc_tocsy.txt"), Some("noesy"));
        assert!(h.tocsy);
        assert!(!h.noe);

        let h = FileHints::from_names(Some("peaks.txt"), Some("NOESY 150ms"));
        assert!(h.noe);

        let h = FileHints::from_names(None, None);
        assert_eq!(h, FileHints::default());
    }

    #[test]
    fn long_range_flag_is_set_explicitly() {
        let h = FileHints::scan("peaks").with_long_range(true);
        assert!(h.long_range);
        assert!(!h.has_specific_sequence());
    }
}
