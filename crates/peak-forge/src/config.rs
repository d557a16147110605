//! Tunable thresholds of the reconciliation engine.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Engine configuration; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Keep peaks that carry neither height nor volume.
    pub internal_mode: bool,
    /// Positions outside this window (ppm) raise a range warning.
    pub cs_range: [f64; 2],
    /// Positions outside this window (ppm) drop the peak.
    pub cs_error_range: [f64; 2],
    /// How far beyond a chain terminus an unmodelled standard residue is accepted as-is.
    pub max_allowed_ext_seq: i32,
    /// Label numbering is consulted once author-numbering hits fall to this balance.
    pub prefer_auth_threshold: i32,
    /// Minimum one-bond correlation for lists without aromatic dimensions.
    pub onebond_min_correlation: f64,
    pub max_rows_per_peak: usize,
    pub cache_capacity: usize,
    /// Run a second pass when the first one produces reparse reasons.
    pub second_pass: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            internal_mode: false,
            cs_range: [-300.0, 300.0],
            cs_error_range: [-999.0, 999.0],
            max_allowed_ext_seq: 2,
            prefer_auth_threshold: 0,
            onebond_min_correlation: 0.2,
            max_rows_per_peak: 16,
            cache_capacity: 1024,
            second_pass: true,
        }
    }
}

impl ParserConfig {
    /// Parses a TOML document, filling omitted fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::invalid_config(e.to_string()))
    }

    /// Capacity for memo caches, clamped to 256..=2048 entries.
    pub fn cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.cache_capacity.clamp(256, 2048)).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn in_error_range(&self, ppm: f64) -> bool {
        ppm.is_finite() && ppm >= self.cs_error_range[0] && ppm <= self.cs_error_range[1]
    }

    pub fn in_range(&self, ppm: f64) -> bool {
        ppm >= self.cs_range[0] && ppm <= self.cs_range[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = ParserConfig::from_toml_str("internal_mode = true\nmax_allowed_ext_seq = 4\n")
            .expect("valid config");
        assert!(config.internal_mode);
        assert_eq!(config.max_allowed_ext_seq, 4);
        assert_eq!(config.cs_range, [-300.0, 300.0]);
        assert_eq!(config.onebond_min_correlation, 0.2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ParserConfig::from_toml_str("bogus = 1").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn cache_capacity_is_clamped() {
        let mut config = ParserConfig::default();
        config.cache_capacity = 10;
        assert_eq!(config.cache_capacity().get(), 256);
        config.cache_capacity = 100_000;
        assert_eq!(config.cache_capacity().get(), 2048);
    }

    #[test]
    fn ranges_are_inclusive() {
        let config = ParserConfig::default();
        assert!(config.in_range(300.0));
        assert!(!config.in_range(300.1));
        assert!(config.in_error_range(-999.0));
        assert!(!config.in_error_range(f64::NAN));
    }
}
