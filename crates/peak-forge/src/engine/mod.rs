//! Parse driver tying validation, resolution, inference and remediation together.
//!
//! A [`PeakParser`] runs one pass: lists are opened in turn, each peak is validated and
//! its label resolved as it arrives, and closing a list infers its dimensions and
//! transfers before remediating its assignments. [`reconcile`] runs a first pass and,
//! when that pass learned something that would change the result, a second pass seeded
//! with the learned [`ReparseReasons`].

mod counter;
mod report;
mod session;
mod validate;

pub use counter::{ContentSubtype, ListIdCounter};
pub use report::{ParseOutcome, PeakListReport, experiment_class};
pub use session::{PeakListHeader, PeakParser};
pub use validate::validate;

use crate::config::ParserConfig;
use crate::error::Error;
use crate::model::coords::CoordinateContext;
use crate::model::peak::RawPeak;
use crate::model::reparse::ReparseReasons;
use crate::model::shifts::ChemicalShiftIndex;
use crate::nomenclature::Nomenclature;
use serde::{Deserialize, Serialize};

/// A list declaration together with its raw peaks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeakListInput {
    #[serde(flatten)]
    pub header: PeakListHeader,
    #[serde(default)]
    pub peaks: Vec<RawPeak>,
}

/// Everything one parse reads besides configuration and nomenclature.
#[derive(Debug, Clone, Copy)]
pub struct ParseInputs<'a> {
    pub coords: &'a CoordinateContext,
    pub shifts: &'a ChemicalShiftIndex,
    pub original_filename: Option<&'a str>,
    pub lists: &'a [PeakListInput],
}

/// Runs a single pass over the inputs.
///
/// # Arguments
///
/// * `inputs` - Structure, shifts and peak lists.
/// * `config` - Engine thresholds.
/// * `nomenclature` - Residue and atom naming service.
/// * `previous` - Reasons learned by an earlier pass.
///
/// # Errors
///
/// Propagates collaborator errors raised by [`PeakParser`].
pub fn parse_pass<N: Nomenclature + ?Sized>(
    inputs: &ParseInputs<'_>,
    config: &ParserConfig,
    nomenclature: &N,
    previous: &ReparseReasons,
) -> Result<ParseOutcome, Error> {
    let mut parser = PeakParser::new(
        config,
        inputs.coords,
        inputs.shifts,
        nomenclature,
        inputs.original_filename,
        previous,
    );
    for input in inputs.lists {
        parser.open_list(input.header.clone())?;
        for peak in &input.peaks {
            parser.add_peak(peak.clone())?;
        }
        parser.close_list()?;
    }
    parser.finish()
}

/// Reconciles the peak lists of one deposition against its structure.
///
/// A second pass runs when `config.second_pass` is set and the first pass produced reasons
/// that change parsing and differ from those it was seeded with. The returned reasons are
/// the union of everything learned, with the seeded values of the stable keys kept, so
/// feeding them back in reaches a fixed point.
///
/// # Arguments
///
/// * `inputs` - Structure, shifts and peak lists.
/// * `config` - Engine thresholds.
/// * `nomenclature` - Residue and atom naming service.
/// * `initial` - Reasons emitted by an earlier run, if any.
///
/// # Errors
///
/// Propagates collaborator errors raised by [`PeakParser`].
pub fn reconcile<N: Nomenclature + ?Sized>(
    inputs: &ParseInputs<'_>,
    config: &ParserConfig,
    nomenclature: &N,
    initial: Option<&ReparseReasons>,
) -> Result<ParseOutcome, Error> {
    let seed = initial.cloned().unwrap_or_default();
    let mut first = parse_pass(inputs, config, nomenclature, &seed)?;
    first.reasons.merge_previous(&seed);

    if !config.second_pass || !first.reasons.needs_reparse() || first.reasons == seed {
        return Ok(first);
    }

    let keys: Vec<&str> = first
        .reasons
        .present_keys()
        .iter()
        .filter(|k| k.triggers_reparse())
        .map(|k| k.label())
        .collect();
    log::info!("reparsing with {}", keys.join(", "));

    let mut second = parse_pass(inputs, config, nomenclature, &first.reasons)?;
    second.reasons.merge_previous(&first.reasons);
    second.passes = first.passes + 1;
    Ok(second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::assignment::{RowState, row_state};
    use crate::model::diagnostic::DiagnosticKind;
    use crate::model::peak::Peak;
    use crate::model::types::{Nucleus, SpectralRegion, TransferType};
    use crate::testing::{self, Fixture};

    fn list(header: PeakListHeader, peaks: Vec<RawPeak>) -> PeakListInput {
        PeakListInput { header, peaks }
    }

    fn transfers(report: &PeakListReport) -> Vec<(usize, usize, TransferType, bool)> {
        report
            .transfers
            .iter()
            .map(|t| (t.dim_id_1, t.dim_id_2, t.kind, t.indirect))
            .collect()
    }

    fn first_atom(peak: &Peak, axis: usize) -> (i32, String, String) {
        let a = peak.assignments[0][axis].as_ref().expect("assigned");
        (a.seq_id, a.comp_id.to_string(), a.atom_id.to_string())
    }

    fn run(f: &Fixture, filename: Option<&str>, lists: &[PeakListInput]) -> ParseOutcome {
        reconcile(&f.inputs(filename, lists), &f.config, &f.dict, None).expect("reconciled")
    }

    #[test]
    fn homonuclear_noesy_is_named_from_its_filename() {
        let f = Fixture::new();
        let peaks = (0..8)
            .map(|i| {
                let i = i as f64;
                testing::raw(&[3.8 + 0.1 * i, 7.8 + 0.07 * ((3.0 * i) % 8.0)], None)
            })
            .collect();
        let lists = [list(testing::blind_header(2), peaks)];
        let outcome = run(&f, Some("data_NOESY.peaks"), &lists);
        let report = &outcome.lists[0];

        for dim in &report.dimensions {
            assert_eq!(dim.nucleus, Some(Nucleus::H));
            assert_eq!(dim.isotope, Some(1));
        }
        assert_eq!(report.dimensions[0].spectral_region, Some(SpectralRegion::H));
        assert_eq!(report.dimensions[1].spectral_region, Some(SpectralRegion::HN));
        assert_eq!(report.dimensions[1].axis_code.as_deref(), Some("H"));
        assert_eq!(
            report.dimensions.iter().filter(|d| d.acquisition == Some(true)).count(),
            1
        );
        assert_eq!(transfers(report), vec![(1, 2, TransferType::ThroughSpace, true)]);
        assert_eq!(report.primary_transfer, Some(TransferType::ThroughSpace));
        assert_eq!(report.experiment_class.as_deref(), Some("H_H.through-space"));
    }

    #[test]
    fn nitrogen_edited_noesy_links_amide_and_through_space() {
        let f = Fixture::new();
        let peaks = (0..8)
            .map(|i| {
                let i = i as f64;
                testing::raw(
                    &[7.6 + 0.1 * i, 115.0 + i, 3.2 + 0.1 * ((5.0 * i) % 8.0)],
                    None,
                )
            })
            .collect();
        let lists = [list(testing::blind_header(3), peaks)];
        let outcome = run(&f, Some("hsqc_noesy.peaks"), &lists);
        let report = &outcome.lists[0];

        let nuclei: Vec<_> = report.dimensions.iter().map(|d| d.nucleus).collect();
        assert_eq!(nuclei, vec![Some(Nucleus::H), Some(Nucleus::N), Some(Nucleus::H)]);
        assert_eq!(report.dimensions[0].acquisition, Some(true));
        assert_eq!(
            transfers(report),
            vec![
                (1, 2, TransferType::OneBond, false),
                (1, 3, TransferType::ThroughSpace, true),
            ]
        );
        assert_eq!(report.primary_transfer, Some(TransferType::ThroughSpace));
        assert_eq!(report.experiment_class.as_deref(), Some("H[N]_H.through-space"));
    }

    #[test]
    fn residue_labels_resolve_to_single_assignments() {
        let f = Fixture::new();
        let lists = [list(
            testing::header(&[Nucleus::H]),
            vec![
                testing::raw(&[7.2], Some("14Trp.Hh2")),
                testing::raw(&[2.7], Some("D1391HB")),
            ],
        )];
        let outcome = run(&f, None, &lists);
        let report = &outcome.lists[0];

        assert_eq!(report.peaks[0].assignments.len(), 1);
        assert_eq!(first_atom(&report.peaks[0], 0), (14, "TRP".into(), "HH2".into()));
        assert_eq!(
            report.peaks[0].assignments[0][0]
                .as_ref()
                .map(|a| a.chain_id.as_str()),
            Some("A")
        );
        assert_eq!(first_atom(&report.peaks[1], 0), (139, "ASP".into(), "HB2".into()));
        assert!(!outcome.diagnostics.iter().any(|d| d.peak == Some(0)));
    }

    #[test]
    fn unbonded_onebond_pair_is_swapped_onto_the_methyl() {
        let f = Fixture::new();
        let peaks = (0..7)
            .map(|i| {
                let label = (i == 3).then_some("Ala2HA-Ala2CB");
                let i = i as f64;
                testing::raw(&[0.8 + 0.1 * i, 16.0 + 1.5 * i], label)
            })
            .collect();
        let lists = [list(testing::header(&[Nucleus::H, Nucleus::C]), peaks)];
        let outcome = run(&f, None, &lists);
        let report = &outcome.lists[0];

        assert_eq!(transfers(report), vec![(1, 2, TransferType::OneBond, false)]);
        let peak = &report.peaks[3];
        let proton = peak.assignments[0][0].as_ref().expect("proton");
        assert_eq!((proton.seq_id, proton.atom_id.as_str()), (2, "HB1"));
        assert_eq!(proton.ambiguity_code, Some(1));
        assert_eq!(first_atom(peak, 1), (2, "ALA".into(), "CB".into()));
        assert_eq!(
            outcome
                .diagnostics
                .count(DiagnosticKind::InconsistentPeakAssignment),
            0
        );
    }

    #[test]
    fn kept_rows_are_complete_or_explained() {
        let f = Fixture::new();
        let labels = [
            (1, "Ala2HA"),
            (3, "Ala2HA-Ala2CB"),
            (5, "Ala2HA-Ala2C"),
            (6, "Met1HA-Met1CA"),
        ];
        let peaks = (0..8)
            .map(|i| {
                let label = labels.iter().find(|(at, _)| *at == i).map(|(_, l)| *l);
                let i = i as f64;
                testing::raw(&[0.8 + 0.1 * i, 16.0 + 1.5 * i], label)
            })
            .collect();
        let lists = [list(testing::header(&[Nucleus::H, Nucleus::C]), peaks)];
        let outcome = run(&f, None, &lists);
        let report = &outcome.lists[0];

        assert!(report.peaks[1].assignments.is_empty());
        for peak in &report.peaks {
            for row in &peak.assignments {
                match row_state(row) {
                    RowState::Complete => {
                        for a in row.iter().flatten() {
                            let chain = f.coords.polymer(&a.chain_id).expect("modelled chain");
                            assert!(chain.position_of_auth(a.seq_id).is_some(), "{a}");
                        }
                    }
                    RowState::Empty => assert!(
                        outcome
                            .diagnostics
                            .for_list(report.list)
                            .any(|d| d.peak == Some(peak.index)),
                        "blank row of peak {} has no message",
                        peak.index
                    ),
                    RowState::Partial => panic!("partial row kept on peak {}", peak.index),
                }
            }
        }
    }

    #[test]
    fn solid_state_rfdr_pairs_the_carbon_axes() {
        let f = Fixture::solid_state();
        let peaks = (0..8)
            .map(|i| {
                let i = i as f64;
                testing::raw(&[30.0 + 3.0 * i, 35.0 + 2.5 * ((5.0 * i) % 8.0)], None)
            })
            .collect();
        let lists = [list(testing::blind_header(2), peaks)];
        let outcome = run(&f, Some("rfdr.peaks"), &lists);
        let report = &outcome.lists[0];

        let nuclei: Vec<_> = report.dimensions.iter().map(|d| d.nucleus).collect();
        assert_eq!(nuclei, vec![Some(Nucleus::C), Some(Nucleus::C)]);
        let codes: Vec<_> = report
            .dimensions
            .iter()
            .map(|d| d.axis_code.as_deref())
            .collect();
        assert_eq!(codes, vec![Some("Cx"), Some("Cy")]);
        assert_eq!(transfers(report), vec![(1, 2, TransferType::ThroughSpace, true)]);
        assert_eq!(report.experiment_class.as_deref(), Some("C_C.through-space"));
    }

    #[test]
    fn dropped_peaks_are_absent_from_the_report() {
        let f = Fixture::new();
        let mut silent = testing::raw(&[8.3], None);
        silent.height = None;
        let lists = [list(
            testing::header(&[Nucleus::H]),
            vec![
                testing::raw(&[8.1], None),
                testing::raw(&[-1200.0], None),
                silent,
                testing::raw(&[7.9], None),
            ],
        )];
        let outcome = run(&f, None, &lists);
        let report = &outcome.lists[0];
        assert_eq!(report.peak_count(), 2);
        assert!(report.peaks.iter().all(|p| p.index != 1 && p.index != 2));
        assert_eq!(outcome.diagnostics.count(DiagnosticKind::RangeValueError), 1);
        assert_eq!(outcome.diagnostics.count(DiagnosticKind::MissingData), 1);
    }

    #[test]
    fn second_pass_applies_a_sequence_offset_and_reaches_a_fixed_point() {
        let f = Fixture::new();
        let lists = [list(
            testing::header(&[Nucleus::H]),
            vec![
                testing::raw(&[4.3], Some("Ala12HA")),
                testing::raw(&[3.9], Some("Gly13HA2")),
                testing::raw(&[4.1], Some("Leu14HA")),
            ],
        )];
        let outcome = run(&f, None, &lists);
        assert_eq!(outcome.passes, 2);
        assert_eq!(outcome.reasons.seq_id_remap["A"][&12], 2);
        assert_eq!(
            first_atom(&outcome.lists[0].peaks[0], 0),
            (2, "ALA".into(), "HA".into())
        );
        assert_eq!(outcome.diagnostics.count(DiagnosticKind::SequenceMismatch), 0);

        let again = reconcile(
            &f.inputs(None, &lists),
            &f.config,
            &f.dict,
            Some(&outcome.reasons),
        )
        .expect("reconciled");
        assert_eq!(again.reasons.seq_id_remap, outcome.reasons.seq_id_remap);
        assert_eq!(again.reasons.onebond_idx_history, outcome.reasons.onebond_idx_history);
        assert_eq!(again.reasons.atom_type_history, outcome.reasons.atom_type_history);
        assert_eq!(again.reasons.default_seg_id, outcome.reasons.default_seg_id);
        assert_eq!(
            first_atom(&again.lists[0].peaks[0], 0),
            (2, "ALA".into(), "HA".into())
        );
    }

    #[test]
    fn second_pass_can_be_disabled() {
        let mut f = Fixture::new();
        f.config.second_pass = false;
        let lists = [list(
            testing::header(&[Nucleus::H]),
            vec![
                testing::raw(&[4.3], Some("Ala12HA")),
                testing::raw(&[3.9], Some("Gly13HA2")),
                testing::raw(&[4.1], Some("Leu14HA")),
            ],
        )];
        let outcome = run(&f, None, &lists);
        assert_eq!(outcome.passes, 1);
        assert!(outcome.reasons.needs_reparse());
        let peak = &outcome.lists[0].peaks[0];
        assert!(peak.assignments.iter().flatten().all(|a| a.is_none()));
    }

    #[test]
    fn list_inputs_deserialize_with_a_flattened_header() {
        let input: PeakListInput = serde_json::from_str(
            r#"{"num_dim": 2, "spectrum_name": "hsqc", "dims": [{"atom_type": "H"}, {"atom_type": "N"}],
                "peaks": [{"positions": [8.1, 120.2], "height": {"value": 1.0}, "label": ["2H", "2N"]}]}"#,
        )
        .expect("json");
        assert_eq!(input.header.num_dim, 2);
        assert_eq!(input.header.dims[1].atom_type, Some(Nucleus::N));
        assert_eq!(input.peaks.len(), 1);
    }
}
