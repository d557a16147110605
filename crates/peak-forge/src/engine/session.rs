//! Incremental parse driver: lists are opened, filled peak by peak, and closed.

use super::counter::{ContentSubtype, ListIdCounter};
use super::report::{ParseOutcome, PeakListReport, experiment_class};
use super::validate::validate;
use crate::config::ParserConfig;
use crate::error::Error;
use crate::infer::{self, FileHints, InferenceContext};
use crate::model::coords::CoordinateContext;
use crate::model::diagnostic::{DiagnosticLog, ListRef};
use crate::model::dimension::{DimensionSetup, SpectralDim};
use crate::model::peak::{Peak, RawPeak};
use crate::model::reparse::{IndexHistory, ReparseReasons, per_list, set_per_list};
use crate::model::shifts::{ChemicalShiftIndex, ScratchShifts, ShiftLookup};
use crate::model::transfer::TransferSet;
use crate::model::types::{Nucleus, TransferType};
use crate::nomenclature::Nomenclature;
use crate::remediate::{Remediation, Remediator, indices};
use crate::resolve::{LabelScope, Resolver};
use serde::{Deserialize, Serialize};

/// Declaration of a list handed to [`PeakParser::open_list`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeakListHeader {
    pub num_dim: usize,
    /// Requested list id; the next free one is issued when absent.
    #[serde(default)]
    pub list_id: Option<u32>,
    #[serde(default)]
    pub spectrum_name: Option<String>,
    /// Upstream setup per dimension; empty means nothing is known.
    #[serde(default)]
    pub dims: Vec<DimensionSetup>,
    /// The upstream format marks the experiment as long-range.
    #[serde(default)]
    pub long_range: bool,
}

#[derive(Debug)]
struct OpenList {
    list: ListRef,
    header: PeakListHeader,
    dims: Vec<SpectralDim>,
    nuclei: Vec<Option<Nucleus>>,
    peaks: Vec<Peak>,
    offered: usize,
    surplus: bool,
}

/// One parse pass over a sequence of peak lists.
///
/// The coordinate context, shift index and nomenclature service are shared read-only;
/// the scratch shift pool, list-id counter and resolver memo tables belong to the pass.
pub struct PeakParser<'a, N: Nomenclature + ?Sized> {
    config: &'a ParserConfig,
    coords: &'a CoordinateContext,
    shifts: &'a ChemicalShiftIndex,
    nomenclature: &'a N,
    original_filename: Option<String>,
    previous: &'a ReparseReasons,
    resolver: Resolver<'a, N>,
    scratch: ScratchShifts,
    counter: ListIdCounter,
    open: Option<OpenList>,
    lists: Vec<PeakListReport>,
    diagnostics: DiagnosticLog,
    list_reasons: ReparseReasons,
}

impl<'a, N: Nomenclature + ?Sized> PeakParser<'a, N> {
    /// Creates a parser for one pass.
    ///
    /// # Arguments
    ///
    /// * `config` - Engine thresholds.
    /// * `coords` - The deposited structure.
    /// * `shifts` - Deposited chemical shifts.
    /// * `nomenclature` - Residue and atom naming service.
    /// * `original_filename` - Name of the uploaded peak-list file, used for hints.
    /// * `previous` - Reasons emitted by the previous pass; empty on a first pass.
    pub fn new(
        config: &'a ParserConfig,
        coords: &'a CoordinateContext,
        shifts: &'a ChemicalShiftIndex,
        nomenclature: &'a N,
        original_filename: Option<&str>,
        previous: &'a ReparseReasons,
    ) -> Self {
        Self {
            config,
            coords,
            shifts,
            nomenclature,
            original_filename: original_filename.map(str::to_string),
            previous,
            resolver: Resolver::new(coords, nomenclature, config, previous),
            scratch: ScratchShifts::new(),
            counter: ListIdCounter::new(),
            open: None,
            lists: Vec::new(),
            diagnostics: DiagnosticLog::new(),
            list_reasons: ReparseReasons::default(),
        }
    }

    /// Marks a list id as taken before any list is opened.
    pub fn reserve_list_id(&mut self, subtype: ContentSubtype, list_id: u32) -> Result<(), Error> {
        self.counter.reserve(subtype, list_id)
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Opens a list.
    ///
    /// # Errors
    ///
    /// Fails when another list is open, the list has no dimensions, the setup table
    /// length disagrees with `num_dim`, or the requested id is taken.
    pub fn open_list(&mut self, header: PeakListHeader) -> Result<ListRef, Error> {
        if let Some(open) = &self.open {
            return Err(Error::ListAlreadyOpen { open: open.list });
        }
        if header.num_dim == 0 {
            return Err(Error::NoDimensions);
        }
        if !header.dims.is_empty() && header.dims.len() != header.num_dim {
            return Err(Error::SetupMismatch {
                num_dim: header.num_dim,
                setups: header.dims.len(),
            });
        }

        let list_id = self
            .counter
            .issue(ContentSubtype::SpectralPeak, header.list_id)?;
        let list = ListRef {
            num_dim: header.num_dim,
            list_id,
        };
        let fallback = DimensionSetup::default();
        let dims: Vec<SpectralDim> = (0..header.num_dim)
            .map(|d| SpectralDim::from_setup(d + 1, header.dims.get(d).unwrap_or(&fallback)))
            .collect();
        let nuclei = dims.iter().map(|d| d.nucleus).collect();

        self.resolver.begin_list(list);
        log::debug!("opened {list}");
        self.open = Some(OpenList {
            list,
            header,
            dims,
            nuclei,
            peaks: Vec::new(),
            offered: 0,
            surplus: false,
        });
        Ok(list)
    }

    /// Validates a peak and resolves its label against the structure.
    ///
    /// # Errors
    ///
    /// Fails when no list is open or the peak's dimensionality differs from the list's.
    pub fn add_peak(&mut self, raw: RawPeak) -> Result<(), Error> {
        let open = self.open.as_mut().ok_or(Error::NoOpenList)?;
        let index = open.offered;
        open.offered += 1;

        let Some(mut peak) = validate(raw, open.list, index, self.config, &mut self.diagnostics)?
        else {
            log::debug!("{}: dropped peak {}", open.list, index + 1);
            return Ok(());
        };

        if let Some(label) = peak.label.as_ref().filter(|l| !l.is_blank()) {
            let scope = LabelScope {
                list: open.list,
                nuclei: &open.nuclei,
            };
            let resolution = self.resolver.resolve(label, &scope);
            for (kind, message) in resolution.notes {
                self.diagnostics
                    .push(kind, Some(open.list), Some(index), message);
            }
            open.surplus |= resolution.surplus;
            peak.assignments = resolution.rows;
        }
        open.peaks.push(peak);
        Ok(())
    }

    /// Closes the open list: infers its setup, remediates its assignments and files it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoOpenList`] when no list is open.
    pub fn close_list(&mut self) -> Result<ListRef, Error> {
        let OpenList {
            list,
            header,
            mut dims,
            mut peaks,
            surplus,
            ..
        } = self.open.take().ok_or(Error::NoOpenList)?;

        let positions: Vec<Vec<f64>> = peaks.iter().map(|p| p.positions.clone()).collect();
        for (axis, dim) in dims.iter_mut().enumerate() {
            dim.freq_hint = infer::sample_positions(&positions, axis);
        }
        let ctx = InferenceContext {
            solid_state: self.coords.is_solid_state(),
            hints: FileHints::from_names(
                self.original_filename.as_deref(),
                header.spectrum_name.as_deref(),
            )
            .with_long_range(header.long_range),
            onebond_min_correlation: self.config.onebond_min_correlation,
            atom_type_history: per_list(&self.previous.atom_type_history, list).map(Vec::as_slice),
            onebond_resolved: per_list(&self.previous.onebond_resolved, list).copied(),
        };
        let transfers = infer::run(&mut dims, &positions, &ctx);

        let remediation = Remediator::new(
            &dims,
            &transfers,
            ShiftLookup::new(self.shifts, &self.scratch),
            self.nomenclature,
        )
        .run(&mut peaks);
        for (peak, (kind, message)) in &remediation.notes {
            self.diagnostics
                .push(*kind, Some(list), Some(*peak), message.clone());
        }
        if remediation.blanked > 0 {
            log::warn!(
                "{list}: {} assignment pair(s) contradict the transfer topology and were cleared",
                remediation.blanked
            );
        }
        self.record_histories(list, &dims, &transfers, &remediation);

        for peak in &peaks {
            if let [row] = peak.assignments.as_slice() {
                for (axis, assignment) in row.iter().enumerate() {
                    if let (Some(a), Some(&ppm)) = (assignment, peak.positions.get(axis)) {
                        self.scratch.record(&a.chain_id, a.seq_id, &a.atom_id, ppm);
                    }
                }
            }
        }

        let subtype = if surplus {
            self.counter.adopt(ContentSubtype::SpectralPeakAlt, list.list_id);
            ContentSubtype::SpectralPeakAlt
        } else {
            ContentSubtype::SpectralPeak
        };
        let class = experiment_class(&dims, &transfers);
        log::info!(
            "{list}: {} peak(s) kept, experiment {}",
            peaks.len(),
            class.as_deref().unwrap_or("unknown")
        );

        self.lists.push(PeakListReport {
            list,
            subtype,
            spectrum_name: header.spectrum_name,
            experiment_class: class,
            primary_transfer: transfers.primary().map(|t| t.kind),
            dimensions: dims,
            transfers,
            peaks,
        });
        Ok(list)
    }

    fn record_histories(
        &mut self,
        list: ListRef,
        dims: &[SpectralDim],
        transfers: &TransferSet,
        remediation: &Remediation,
    ) {
        let reasons = &mut self.list_reasons;
        for (history, slot) in [
            (&remediation.onebond_history, &mut reasons.onebond_idx_history),
            (&remediation.jcoupling_history, &mut reasons.jcoupling_idx_history),
            (&remediation.relayed_history, &mut reasons.relayed_idx_history),
        ] {
            if !history.is_empty() {
                set_per_list(slot, list, history.clone());
            }
        }
        if let Some(counts) = &remediation.atom_type_history {
            set_per_list(&mut reasons.atom_type_history, list, counts.clone());
        }

        let Some(best) = most_supported(&remediation.onebond_history) else {
            return;
        };
        let inferred: Vec<usize> = transfers
            .of_kind(TransferType::OneBond)
            .filter_map(|t| indices::index_of(dims.len(), t.dim_id_1 - 1, t.dim_id_2 - 1))
            .collect();
        if !inferred.contains(&best) && forcible(dims, best) {
            log::info!("{list}: assignments support one-bond index {best} over the inferred pairs");
            set_per_list(&mut reasons.onebond_resolved, list, best);
        }
    }

    /// Ends the pass and hands back everything it produced.
    ///
    /// A list still open is closed first.
    ///
    /// # Errors
    ///
    /// Propagates errors from closing the last list.
    pub fn finish(mut self) -> Result<ParseOutcome, Error> {
        if self.open.is_some() {
            self.close_list()?;
        }
        let mut reasons = self.resolver.take_reasons();
        let listed = self.list_reasons;
        reasons.onebond_resolved = listed.onebond_resolved;
        reasons.onebond_idx_history = listed.onebond_idx_history;
        reasons.jcoupling_idx_history = listed.jcoupling_idx_history;
        reasons.relayed_idx_history = listed.relayed_idx_history;
        reasons.atom_type_history = listed.atom_type_history;

        let mut diagnostics = self.diagnostics;
        diagnostics.dedup();
        self.nomenclature.clear_caches();

        Ok(ParseOutcome {
            lists: self.lists,
            diagnostics,
            reasons,
            passes: 1,
        })
    }
}

/// Index with the highest count; the lowest index wins ties.
fn most_supported(history: &IndexHistory) -> Option<usize> {
    history
        .iter()
        .fold(None, |best: Option<(usize, usize)>, (&index, &count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((index, count)),
        })
        .map(|(index, _)| index)
}

/// Whether some pair of an index joins a proton axis to a carbon or nitrogen axis.
fn forcible(dims: &[SpectralDim], index: usize) -> bool {
    let Some(pairs) = indices::transfer_pairs(dims.len()).get(index) else {
        return false;
    };
    pairs.iter().any(|&(a, b)| {
        let (Some(x), Some(y)) = (dims.get(a), dims.get(b)) else {
            return false;
        };
        let heavy = |d: &SpectralDim| matches!(d.nucleus, Some(Nucleus::C | Nucleus::N));
        (x.is_proton() && heavy(y)) || (y.is_proton() && heavy(x))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::diagnostic::DiagnosticKind;
    use crate::testing::{self, Fixture};

    #[test]
    fn peaks_need_an_open_list() {
        let f = Fixture::new();
        let mut parser = f.parser(None);
        let err = parser.add_peak(testing::raw(&[8.0], None)).unwrap_err();
        assert!(matches!(err, Error::NoOpenList));
        assert!(matches!(parser.close_list(), Err(Error::NoOpenList)));
    }

    #[test]
    fn a_second_list_cannot_open_before_the_first_closes() {
        let f = Fixture::new();
        let mut parser = f.parser(None);
        let first = parser.open_list(testing::header(&[Nucleus::H])).unwrap();
        let err = parser
            .open_list(testing::header(&[Nucleus::H]))
            .unwrap_err();
        assert!(matches!(err, Error::ListAlreadyOpen { open } if open == first));
    }

    #[test]
    fn declarations_are_checked() {
        let f = Fixture::new();
        let mut parser = f.parser(None);
        let empty = PeakListHeader::default();
        assert!(matches!(parser.open_list(empty), Err(Error::NoDimensions)));

        let mut short = testing::header(&[Nucleus::H, Nucleus::N]);
        short.num_dim = 3;
        assert!(matches!(
            parser.open_list(short),
            Err(Error::SetupMismatch { num_dim: 3, setups: 2 })
        ));
    }

    #[test]
    fn dimension_mismatch_is_raised() {
        let f = Fixture::new();
        let mut parser = f.parser(None);
        parser.open_list(testing::header(&[Nucleus::H, Nucleus::N])).unwrap();
        let err = parser.add_peak(testing::raw(&[8.0], None)).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn reserved_ids_are_not_issued() {
        let f = Fixture::new();
        let mut parser = f.parser(None);
        parser
            .reserve_list_id(ContentSubtype::SpectralPeak, 1)
            .unwrap();
        let list = parser.open_list(testing::header(&[Nucleus::H])).unwrap();
        assert_eq!(list.list_id, 2);
        parser.close_list().unwrap();

        let mut taken = testing::header(&[Nucleus::H]);
        taken.list_id = Some(1);
        assert!(matches!(
            parser.open_list(taken),
            Err(Error::ListIdInUse { list_id: 1, .. })
        ));
    }

    #[test]
    fn unresolved_label_is_reported_against_its_peak() {
        let f = Fixture::new();
        let mut parser = f.parser(None);
        let list = parser.open_list(testing::header(&[Nucleus::H])).unwrap();
        parser.add_peak(testing::raw(&[8.1], Some("14Trp.Hh2"))).unwrap();
        parser.add_peak(testing::raw(&[4.2], Some("G3HB"))).unwrap();
        parser.close_list().unwrap();
        let outcome = parser.finish().unwrap();

        let report = outcome.list(1, list.list_id).expect("list");
        assert_eq!(report.peak_count(), 2);
        assert_eq!(report.peaks[0].assignments.len(), 1);
        let flagged: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|d| d.kind.is_error())
            .collect();
        assert!(!flagged.is_empty());
        assert!(flagged.iter().all(|d| d.peak == Some(1) && d.list == Some(list)));
    }

    #[test]
    fn finish_closes_a_list_left_open() {
        let f = Fixture::new();
        let mut parser = f.parser(None);
        parser.open_list(testing::header(&[Nucleus::H])).unwrap();
        parser.add_peak(testing::raw(&[8.1], None)).unwrap();
        let outcome = parser.finish().unwrap();
        assert_eq!(outcome.lists.len(), 1);
        assert_eq!(outcome.passes, 1);
    }

    #[test]
    fn most_supported_prefers_the_lowest_index_on_ties() {
        let history: IndexHistory = [(0, 3), (1, 5), (2, 5)].into_iter().collect();
        assert_eq!(most_supported(&history), Some(1));
        assert_eq!(most_supported(&IndexHistory::new()), None);
    }

    #[test]
    fn dropped_peaks_leave_no_trace_in_the_list() {
        let f = Fixture::new();
        let mut parser = f.parser(None);
        let list = parser.open_list(testing::header(&[Nucleus::H, Nucleus::N])).unwrap();
        parser.add_peak(testing::raw(&[8.1, 120.0], None)).unwrap();
        parser.add_peak(testing::raw(&[8.2, 1500.0], None)).unwrap();
        let mut silent = testing::raw(&[8.3, 121.0], None);
        silent.height = None;
        parser.add_peak(silent).unwrap();
        parser.add_peak(testing::raw(&[8.4, 122.0], None)).unwrap();
        parser.close_list().unwrap();
        let outcome = parser.finish().unwrap();

        let report = outcome.list(2, list.list_id).expect("list");
        assert_eq!(report.peak_count(), 2);
        let kept: Vec<usize> = report.peaks.iter().map(|p| p.index).collect();
        assert_eq!(kept, vec![0, 3]);
        assert_eq!(outcome.diagnostics.count(DiagnosticKind::RangeValueError), 1);
        assert_eq!(outcome.diagnostics.count(DiagnosticKind::MissingData), 1);
    }
}
