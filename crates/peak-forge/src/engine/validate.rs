//! Per-peak range and completeness checks applied as peaks arrive.

use crate::config::ParserConfig;
use crate::error::Error;
use crate::model::diagnostic::{DiagnosticKind, DiagnosticLog, ListRef};
use crate::model::peak::{Peak, RawPeak};

fn fit<T: Clone>(mut values: Vec<Option<T>>, len: usize) -> Vec<Option<T>> {
    values.resize(len, None);
    values
}

/// Validates one raw peak against its list.
///
/// # Arguments
///
/// * `raw` - The peak as delivered by the upstream parser.
/// * `list` - The open list.
/// * `index` - Position of the peak among all peaks offered to the list.
/// * `config` - Range windows and the internal-mode switch.
/// * `log` - Receives range and missing-data diagnostics.
///
/// # Returns
///
/// The validated peak, or `None` when an error-level problem drops it.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] when the peak does not carry one position per
/// dimension.
pub fn validate(
    raw: RawPeak,
    list: ListRef,
    index: usize,
    config: &ParserConfig,
    log: &mut DiagnosticLog,
) -> Result<Option<Peak>, Error> {
    if raw.positions.len() != list.num_dim {
        return Err(Error::dimension_mismatch(list, raw.positions.len()));
    }

    let mut dropped = false;
    for (d, &ppm) in raw.positions.iter().enumerate() {
        let [lo, hi] = config.cs_error_range;
        if !config.in_error_range(ppm) {
            log.push(
                DiagnosticKind::RangeValueError,
                Some(list),
                Some(index),
                format!(
                    "Position {ppm} ppm of dimension {} lies outside the range [{lo}, {hi}]; the peak was dropped",
                    d + 1
                ),
            );
            dropped = true;
        } else if !config.in_range(ppm) {
            let [lo, hi] = config.cs_range;
            log.push(
                DiagnosticKind::RangeValueWarning,
                Some(list),
                Some(index),
                format!(
                    "Position {ppm} ppm of dimension {} lies outside the expected range [{lo}, {hi}]",
                    d + 1
                ),
            );
        }
    }
    if dropped {
        return Ok(None);
    }

    if raw.height.is_none() && raw.volume.is_none() && !config.internal_mode {
        log.push(
            DiagnosticKind::MissingData,
            Some(list),
            Some(index),
            "Neither height nor volume is given; the peak was dropped",
        );
        return Ok(None);
    }

    let figure_of_merit = match raw.figure_of_merit {
        Some(fom) if !(0.0..=1.0).contains(&fom) => {
            log.push(
                DiagnosticKind::RangeValueWarning,
                Some(list),
                Some(index),
                format!("Figure of merit {fom} lies outside [0, 1] and was ignored"),
            );
            None
        }
        other => other,
    };

    let mut line_widths = fit(raw.line_widths, list.num_dim);
    for (d, slot) in line_widths.iter_mut().enumerate() {
        if let Some(width) = slot {
            if !width.value.is_finite() || width.value <= 0.0 {
                log.push(
                    DiagnosticKind::RangeValueWarning,
                    Some(list),
                    Some(index),
                    format!(
                        "Line width {} of dimension {} is not positive and was ignored",
                        width.value,
                        d + 1
                    ),
                );
                *slot = None;
            }
        }
    }

    Ok(Some(Peak {
        list_id: list.list_id,
        index,
        position_errors: fit(raw.position_errors, list.num_dim),
        positions: raw.positions,
        line_widths,
        height: raw.height,
        volume: raw.volume,
        figure_of_merit,
        label: raw.label,
        assignments: Vec::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::peak::{Intensity, LineWidth};
    use crate::model::types::WidthUnit;

    const LIST: ListRef = ListRef {
        num_dim: 2,
        list_id: 1,
    };

    fn raw(positions: &[f64]) -> RawPeak {
        RawPeak {
            positions: positions.to_vec(),
            height: Some(Intensity {
                value: 1.0e5,
                error: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn wrong_dimensionality_is_an_error() {
        let mut log = DiagnosticLog::new();
        let err = validate(raw(&[8.0]), LIST, 0, &ParserConfig::default(), &mut log).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn position_outside_the_error_window_drops_the_peak() {
        let mut log = DiagnosticLog::new();
        let kept = validate(raw(&[8.0, 1200.0]), LIST, 3, &ParserConfig::default(), &mut log).unwrap();
        assert!(kept.is_none());
        assert_eq!(log.count(DiagnosticKind::RangeValueError), 1);
        let d = log.iter().next().expect("diagnostic");
        assert_eq!(d.peak, Some(3));
        assert!(d.message.contains("dimension 2"));
    }

    #[test]
    fn position_outside_the_warning_window_keeps_the_peak() {
        let mut log = DiagnosticLog::new();
        let kept = validate(raw(&[8.0, 400.0]), LIST, 0, &ParserConfig::default(), &mut log).unwrap();
        assert!(kept.is_some());
        assert_eq!(log.count(DiagnosticKind::RangeValueWarning), 1);
    }

    #[test]
    fn missing_intensity_drops_the_peak_unless_internal() {
        let mut bare = raw(&[8.0, 120.0]);
        bare.height = None;
        let mut log = DiagnosticLog::new();
        assert!(
            validate(bare.clone(), LIST, 0, &ParserConfig::default(), &mut log)
                .unwrap()
                .is_none()
        );
        assert_eq!(log.count(DiagnosticKind::MissingData), 1);

        let internal = ParserConfig {
            internal_mode: true,
            ..ParserConfig::default()
        };
        let mut log = DiagnosticLog::new();
        assert!(validate(bare, LIST, 0, &internal, &mut log).unwrap().is_some());
        assert!(log.is_empty());
    }

    #[test]
    fn bad_figure_of_merit_and_line_width_are_cleared() {
        let mut peak = raw(&[8.0, 120.0]);
        peak.figure_of_merit = Some(1.5);
        peak.line_widths = vec![Some(LineWidth {
            value: -2.0,
            units: WidthUnit::Hz,
        })];
        let mut log = DiagnosticLog::new();
        let kept = validate(peak, LIST, 0, &ParserConfig::default(), &mut log)
            .unwrap()
            .expect("kept");
        assert_eq!(kept.figure_of_merit, None);
        assert_eq!(kept.line_widths, vec![None, None]);
        assert_eq!(kept.position_errors.len(), 2);
        assert_eq!(log.count(DiagnosticKind::RangeValueWarning), 2);
    }
}
