use super::assignment::AssignmentRow;
use super::types::WidthUnit;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineWidth {
    pub value: f64,
    #[serde(default = "default_line_width_unit")]
    pub units: WidthUnit,
}

fn default_line_width_unit() -> WidthUnit {
    WidthUnit::Ppm
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intensity {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
}

/// Textual assignment carried on a peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeakLabel {
    /// One label describing every dimension, e.g. `"14Trp.Hh2"`.
    Whole(String),
    /// One label per dimension, in dimension order.
    PerDim(Vec<String>),
}

impl PeakLabel {
    pub fn is_blank(&self) -> bool {
        match self {
            PeakLabel::Whole(s) => s.trim().is_empty() || is_null_token(s),
            PeakLabel::PerDim(v) => v.iter().all(|s| s.trim().is_empty() || is_null_token(s)),
        }
    }
}

/// Placeholder spellings used by peak-list formats for "no assignment".
pub fn is_null_token(s: &str) -> bool {
    matches!(s.trim(), "?" | "." | "-" | "none" | "None" | "NONE" | "null" | "n/a")
}

/// A peak as delivered by the upstream parser, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPeak {
    pub positions: Vec<f64>,
    #[serde(default)]
    pub position_errors: Vec<Option<f64>>,
    #[serde(default)]
    pub line_widths: Vec<Option<LineWidth>>,
    #[serde(default)]
    pub height: Option<Intensity>,
    #[serde(default)]
    pub volume: Option<Intensity>,
    #[serde(default)]
    pub figure_of_merit: Option<f64>,
    #[serde(default)]
    pub label: Option<PeakLabel>,
}

/// A validated peak owned by a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peak {
    pub list_id: u32,
    pub index: usize,
    pub positions: Vec<f64>,
    pub position_errors: Vec<Option<f64>>,
    pub line_widths: Vec<Option<LineWidth>>,
    pub height: Option<Intensity>,
    pub volume: Option<Intensity>,
    pub figure_of_merit: Option<f64>,
    pub label: Option<PeakLabel>,
    pub assignments: Vec<AssignmentRow>,
}

impl Peak {
    pub fn num_dim(&self) -> usize {
        self.positions.len()
    }

    pub fn has_assignments(&self) -> bool {
        self.assignments
            .iter()
            .any(|row| row.iter().any(|a| a.is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_deserializes_whole_and_per_dimension_forms() {
        let whole: PeakLabel = serde_json::from_str("\"14Trp.Hh2\"").unwrap();
        assert_eq!(whole, PeakLabel::Whole("14Trp.Hh2".to_string()));
        let per: PeakLabel = serde_json::from_str("[\"14HN\", \"14N\"]").unwrap();
        assert!(matches!(per, PeakLabel::PerDim(ref v) if v.len() == 2));
    }

    #[test]
    fn null_labels_are_blank() {
        assert!(PeakLabel::Whole("?".into()).is_blank());
        assert!(PeakLabel::PerDim(vec!["".into(), "-".into()]).is_blank());
        assert!(!PeakLabel::Whole("G14HA".into()).is_blank());
    }

    #[test]
    fn raw_peak_fills_optional_fields() {
        let peak: RawPeak = serde_json::from_str(
            r#"{"positions": [8.1, 118.2], "height": {"value": 1.5e5}}"#,
        )
        .unwrap();
        assert_eq!(peak.positions.len(), 2);
        assert!(peak.volume.is_none());
        assert!(peak.label.is_none());
        assert_eq!(peak.height.unwrap().value, 1.5e5);
    }
}
