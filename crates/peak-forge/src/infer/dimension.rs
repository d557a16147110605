//! Classification of spectral axes from the peak positions observed on each of them.

use super::InferenceContext;
use crate::model::dimension::{PositionStats, SpectralDim};
use crate::model::types::{Nucleus, SpectralRegion, Undersampling, WidthUnit, isotope_weight};
use crate::model::value::round_to;
use std::collections::BTreeMap;

/// Outcome of the ppm window test before the per-list amide/aromatic decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Region(SpectralRegion),
    AmideOrAromatic,
}

impl Window {
    fn nucleus(&self) -> Nucleus {
        match self {
            Window::Region(r) => r.nucleus(),
            Window::AmideOrAromatic => Nucleus::H,
        }
    }
}

fn in_open_closed(x: f64, lo: f64, hi: f64) -> bool {
    x > lo && x <= hi
}

/// Applies the fixed ppm windows in priority order.
fn select_window(stats: &PositionStats, aromatic_hint: bool) -> Option<Window> {
    let c = stats.centre;
    let aromatic_lo = if aromatic_hint { 123.0 } else { 128.0 };

    if in_open_closed(c, aromatic_lo, 133.0) && stats.min > 90.0 {
        return Some(Window::Region(SpectralRegion::CAromatic));
    }
    if in_open_closed(c, 115.0, 128.0) && stats.min > 60.0 && stats.max < 170.0 {
        return Some(Window::Region(SpectralRegion::N));
    }
    if (170.0..=180.0).contains(&c) {
        return Some(Window::Region(SpectralRegion::CO));
    }
    if in_open_closed(c, 6.0, 9.0) {
        return Some(Window::AmideOrAromatic);
    }
    if in_open_closed(c, 4.0, 6.0) {
        return Some(Window::Region(SpectralRegion::H));
    }
    if in_open_closed(c, 2.0, 4.0) {
        let region = if stats.max >= 7.0 {
            SpectralRegion::H
        } else {
            SpectralRegion::HAliphatic
        };
        return Some(Window::Region(region));
    }
    if in_open_closed(c, 0.0, 2.0) {
        let region = if stats.max >= 3.0 {
            SpectralRegion::HAliphatic
        } else {
            SpectralRegion::HMethyl
        };
        return Some(Window::Region(region));
    }
    if in_open_closed(c, 60.0, 90.0) {
        return Some(Window::Region(SpectralRegion::C));
    }
    if in_open_closed(c, 30.0, 60.0) {
        return Some(Window::Region(SpectralRegion::CAliphatic));
    }
    if in_open_closed(c, 10.0, 30.0) {
        return Some(Window::Region(SpectralRegion::CMethyl));
    }
    if stats.min > 10.0 && stats.max < 190.0 {
        return Some(Window::Region(SpectralRegion::C));
    }
    None
}

/// Chooses a window compatible with a nucleus that is already known.
fn constrained_window(stats: &PositionStats, nucleus: Nucleus, aromatic_hint: bool) -> Window {
    if nucleus == Nucleus::H && in_open_closed(stats.centre, 9.0, 16.0) {
        return Window::Region(SpectralRegion::HImide);
    }
    match select_window(stats, aromatic_hint) {
        Some(w) if w.nucleus() == nucleus => w,
        _ => Window::Region(SpectralRegion::generic(nucleus)),
    }
}

/// Most frequent value among observed spectrometer-frequency samples.
fn most_frequent(samples: &[f64]) -> Option<f64> {
    let mut counts: BTreeMap<u64, (usize, f64)> = BTreeMap::new();
    for &s in samples.iter().filter(|s| s.is_finite() && **s > 0.0) {
        counts.entry(s.to_bits()).or_insert((0, s)).0 += 1;
    }
    counts
        .values()
        .fold(None, |best: Option<(usize, f64)>, &(n, v)| match best {
            Some((bn, _)) if bn >= n => best,
            _ => Some((n, v)),
        })
        .map(|(_, v)| v)
}

/// Overrides the nucleus of dimensions whose assigned atoms disagreed on the first pass.
fn apply_atom_type_history(dims: &mut [SpectralDim], history: &[BTreeMap<smol_str::SmolStr, usize>]) {
    for (dim, counts) in dims.iter_mut().zip(history) {
        let dominant = counts
            .iter()
            .fold(None, |best: Option<(&str, usize)>, (k, &n)| match best {
                Some((_, bn)) if bn >= n => best,
                _ => Some((k.as_str(), n)),
            });
        let Some(nucleus) = dominant.and_then(|(k, _)| k.parse::<Nucleus>().ok()) else {
            continue;
        };
        if dim.nucleus != Some(nucleus) {
            log::debug!(
                "dimension {} reclassified from {:?} to {} by assigned atoms",
                dim.dim_id,
                dim.nucleus,
                nucleus
            );
            dim.nucleus = Some(nucleus);
            dim.isotope = Some(nucleus.default_isotope());
            dim.spectral_region = None;
        }
    }
}

/// Classifies every axis of one list.
///
/// Sets nucleus, isotope, spectral region and axis code from the positions in `freq_hint`,
/// elects the acquisition dimension, sets undersampling modes, completes spectrometer
/// frequencies and converts ppm sweep widths to Hz. `freq_hint` is left in place for
/// transfer inference.
///
/// # Arguments
///
/// * `dims` - Dimensions of the list in dimension order.
/// * `ctx` - Solid-state flag, filename hints and first-pass corrections.
pub fn infer_dimensions(dims: &mut [SpectralDim], ctx: &InferenceContext<'_>) {
    if let Some(history) = ctx.atom_type_history {
        apply_atom_type_history(dims, history);
    }

    let aromatic_hint = ctx.hints.is_aromatic();
    let mut windows: Vec<Option<Window>> = Vec::with_capacity(dims.len());
    for dim in dims.iter_mut() {
        dim.stats = PositionStats::from_values(&dim.freq_hint);
        let window = match (dim.stats.as_ref(), dim.nucleus) {
            (Some(stats), Some(nucleus)) => Some(constrained_window(stats, nucleus, aromatic_hint)),
            (Some(stats), None) => select_window(stats, aromatic_hint),
            (None, _) => None,
        };
        windows.push(window);
    }

    let has_carbon_aromatic = windows
        .iter()
        .any(|w| *w == Some(Window::Region(SpectralRegion::CAromatic)));

    for (dim, window) in dims.iter_mut().zip(&windows) {
        match window {
            Some(Window::Region(region)) => dim.classify(*region),
            Some(Window::AmideOrAromatic) if has_carbon_aromatic => {
                dim.classify(SpectralRegion::HAromatic)
            }
            Some(Window::AmideOrAromatic) => dim.classify(SpectralRegion::HN),
            None => {
                if let Some(nucleus) = dim.nucleus {
                    dim.axis_code = Some(nucleus.symbol().to_string());
                }
            }
        }
    }

    elect_acquisition(dims, ctx.solid_state);
    set_undersampling(dims);
    complete_frequencies(dims);
    normalize_sweep_widths(dims);

    if (ctx.solid_state || ctx.hints.has_solid_state_sequence())
        && dims.len() == 2
        && dims.iter().all(|d| d.nucleus == Some(Nucleus::C))
    {
        dims[0].axis_code = Some("Cx".to_string());
        dims[1].axis_code = Some("Cy".to_string());
    }
}

fn elect_acquisition(dims: &mut [SpectralDim], solid_state: bool) {
    let flagged: Vec<usize> = dims
        .iter()
        .enumerate()
        .filter(|(_, d)| d.is_acquisition())
        .map(|(i, _)| i)
        .collect();

    let chosen = if flagged.len() == 1 {
        Some(flagged[0])
    } else {
        dims.iter()
            .position(|d| {
                d.stats.is_some()
                    && (d.is_proton() || (solid_state && d.nucleus == Some(Nucleus::C)))
            })
            .or_else(|| dims.iter().position(|d| d.stats.is_some()))
            .or(flagged.first().copied())
    };

    for (i, dim) in dims.iter_mut().enumerate() {
        dim.acquisition = Some(Some(i) == chosen);
    }
}

fn set_undersampling(dims: &mut [SpectralDim]) {
    for dim in dims.iter_mut() {
        let mode = if dim.is_acquisition() {
            Undersampling::NotObserved
        } else if dim.nucleus == Some(Nucleus::C)
            && dim
                .stats
                .is_some_and(|s| s.centre < 100.0 && s.width() < 50.0)
        {
            Undersampling::Folded
        } else {
            Undersampling::Aliased
        };
        dim.undersampling = Some(mode);
    }
}

/// Fills missing spectrometer frequencies from samples, then from a proton dimension.
fn complete_frequencies(dims: &mut [SpectralDim]) {
    for dim in dims.iter_mut() {
        if dim.spectrometer_frequency.is_none() {
            dim.spectrometer_frequency = most_frequent(&dim.observed_frequencies);
        }
    }

    let reference = dims.iter().find_map(|d| {
        let freq = d.spectrometer_frequency?;
        d.is_proton()
            .then(|| (freq / isotope_weight(d.isotope.unwrap_or(1)), d.source_frequency.map(|f| f.decimals)))
    });
    let Some((proton_mhz, decimals)) = reference else {
        return;
    };

    for dim in dims.iter_mut() {
        if dim.spectrometer_frequency.is_some() {
            continue;
        }
        let Some(isotope) = dim.isotope else {
            continue;
        };
        let derived = proton_mhz * isotope_weight(isotope);
        dim.spectrometer_frequency = Some(round_to(derived, decimals.unwrap_or(3).max(3)));
    }
}

fn normalize_sweep_widths(dims: &mut [SpectralDim]) {
    for dim in dims.iter_mut() {
        let Some(freq) = dim.spectrometer_frequency else {
            continue;
        };
        match (dim.sweep_width, dim.sweep_width_units) {
            (Some(width), Some(WidthUnit::Ppm)) => {
                let decimals = dim
                    .source_sweep_width
                    .map(|w| w.decimals)
                    .unwrap_or(0)
                    .max(dim.source_frequency.map(|f| f.decimals).unwrap_or(0));
                dim.sweep_width = Some(round_to(width * freq, decimals));
                dim.sweep_width_units = Some(WidthUnit::Hz);
            }
            (Some(_), None) => dim.sweep_width_units = Some(WidthUnit::Hz),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::FileHints;
    use crate::model::dimension::DimensionSetup;
    use crate::model::value::DecimalValue;

    fn dim_with(id: usize, values: &[f64]) -> SpectralDim {
        let mut dim = SpectralDim::from_setup(id, &DimensionSetup::default());
        dim.freq_hint = values.to_vec();
        dim
    }

    fn run(dims: &mut [SpectralDim], hints: FileHints, solid_state: bool) {
        let ctx = InferenceContext {
            solid_state,
            hints,
            ..InferenceContext::default()
        };
        infer_dimensions(dims, &ctx);
    }

    #[test]
    fn amide_window_resolves_to_hn_without_carbon_aromatic() {
        let mut dims = vec![dim_with(1, &[7.9, 8.1, 8.4]), dim_with(2, &[116.0, 120.0, 124.0])];
        run(&mut dims, FileHints::default(), false);
        assert_eq!(dims[0].spectral_region, Some(SpectralRegion::HN));
        assert_eq!(dims[0].axis_code.as_deref(), Some("H"));
        assert_eq!(dims[1].spectral_region, Some(SpectralRegion::N));
        assert_eq!(dims[1].isotope, Some(15));
    }

    #[test]
    fn amide_window_resolves_to_aromatic_with_carbon_aromatic() {
        let mut dims = vec![dim_with(1, &[6.8, 7.2]), dim_with(2, &[129.0, 132.0])];
        run(&mut dims, FileHints::default(), false);
        assert_eq!(dims[0].spectral_region, Some(SpectralRegion::HAromatic));
        assert_eq!(dims[1].spectral_region, Some(SpectralRegion::CAromatic));
    }

    #[test]
    fn aromatic_hint_widens_the_carbon_aromatic_window() {
        let mut plain = vec![dim_with(1, &[124.0, 126.0])];
        run(&mut plain, FileHints::default(), false);
        assert_eq!(plain[0].spectral_region, Some(SpectralRegion::N));

        let mut hinted = vec![dim_with(1, &[124.0, 126.0])];
        run(&mut hinted, FileHints::scan("aro_hsqc"), false);
        assert_eq!(hinted[0].spectral_region, Some(SpectralRegion::CAromatic));
    }

    #[test]
    fn proton_windows_promote_on_wide_spread() {
        let mut dims = vec![
            dim_with(1, &[1.0, 1.5, 8.0]),
            dim_with(2, &[0.8, 1.2]),
            dim_with(3, &[0.5, 1.0, 4.0]),
        ];
        run(&mut dims, FileHints::default(), false);
        assert_eq!(dims[0].spectral_region, Some(SpectralRegion::H));
        assert_eq!(dims[1].spectral_region, Some(SpectralRegion::HMethyl));
        assert_eq!(dims[2].spectral_region, Some(SpectralRegion::HAliphatic));
    }

    #[test]
    fn known_nucleus_overrides_inconsistent_window() {
        let setup = DimensionSetup {
            isotope: Some(15),
            ..Default::default()
        };
        let mut dim = SpectralDim::from_setup(1, &setup);
        dim.freq_hint = vec![50.0, 55.0];
        let mut dims = vec![dim];
        run(&mut dims, FileHints::default(), false);
        assert_eq!(dims[0].spectral_region, Some(SpectralRegion::N));
        assert_eq!(dims[0].axis_code.as_deref(), Some("N"));
    }

    #[test]
    fn known_protons_in_imide_range_are_tagged() {
        let setup = DimensionSetup {
            isotope: Some(1),
            ..Default::default()
        };
        let mut dim = SpectralDim::from_setup(1, &setup);
        dim.freq_hint = vec![12.5, 13.5];
        let mut dims = vec![dim];
        run(&mut dims, FileHints::default(), false);
        assert_eq!(dims[0].spectral_region, Some(SpectralRegion::HImide));
    }

    #[test]
    fn exactly_one_acquisition_dimension_is_elected() {
        let mut dims = vec![
            dim_with(1, &[118.0, 121.0]),
            dim_with(2, &[8.0, 8.5]),
            dim_with(3, &[4.0, 4.5]),
        ];
        dims[0].acquisition = Some(true);
        dims[1].acquisition = Some(true);
        run(&mut dims, FileHints::default(), false);
        let acq: Vec<bool> = dims.iter().map(|d| d.is_acquisition()).collect();
        assert_eq!(acq, vec![false, true, false]);
        assert_eq!(dims[1].undersampling, Some(Undersampling::NotObserved));
        assert_eq!(dims[0].undersampling, Some(Undersampling::Aliased));
    }

    #[test]
    fn solid_state_elects_carbon_and_labels_homonuclear_axes() {
        let mut dims = vec![dim_with(1, &[20.0, 40.0, 55.0]), dim_with(2, &[22.0, 41.0, 56.0])];
        run(&mut dims, FileHints::scan("rfdr.peaks"), true);
        assert!(dims[0].is_acquisition());
        assert_eq!(dims[0].axis_code.as_deref(), Some("Cx"));
        assert_eq!(dims[1].axis_code.as_deref(), Some("Cy"));
        assert_eq!(dims[1].undersampling, Some(Undersampling::Folded));
    }

    #[test]
    fn ppm_sweep_width_is_converted_with_source_precision() {
        let setup = DimensionSetup {
            isotope: Some(1),
            sweep_width: Some("10.0".parse::<DecimalValue>().unwrap()),
            sweep_width_units: Some(WidthUnit::Ppm),
            spectrometer_frequency: Some("600.13".parse::<DecimalValue>().unwrap()),
            ..Default::default()
        };
        let mut h = SpectralDim::from_setup(1, &setup);
        h.freq_hint = vec![8.0, 8.2];
        let n_setup = DimensionSetup {
            isotope: Some(15),
            sweep_width: Some("30".parse::<DecimalValue>().unwrap()),
            sweep_width_units: Some(WidthUnit::Ppm),
            ..Default::default()
        };
        let mut n = SpectralDim::from_setup(2, &n_setup);
        n.freq_hint = vec![118.0, 122.0];
        let mut dims = vec![h, n];
        run(&mut dims, FileHints::default(), false);

        assert_eq!(dims[0].sweep_width, Some(6001.3));
        assert_eq!(dims[0].sweep_width_units, Some(WidthUnit::Hz));
        let n_freq = dims[1].spectrometer_frequency.unwrap();
        assert!((n_freq - 600.13 * 0.101329118).abs() < 1e-3);
        assert_eq!(dims[1].sweep_width_units, Some(WidthUnit::Hz));
    }

    #[test]
    fn frequency_samples_fill_missing_frequency() {
        let mut dim = dim_with(1, &[8.0]);
        dim.observed_frequencies = vec![500.1, 600.2, 600.2];
        let mut dims = vec![dim];
        run(&mut dims, FileHints::default(), false);
        assert_eq!(dims[0].spectrometer_frequency, Some(600.2));
    }

    #[test]
    fn atom_type_history_reclassifies_dimension() {
        let mut dims = vec![dim_with(1, &[8.0, 8.3]), dim_with(2, &[55.0, 60.0])];
        let history = vec![
            BTreeMap::new(),
            BTreeMap::from([(smol_str::SmolStr::new("N"), 5), (smol_str::SmolStr::new("C"), 1)]),
        ];
        let ctx = InferenceContext {
            atom_type_history: Some(&history),
            ..InferenceContext::default()
        };
        infer_dimensions(&mut dims, &ctx);
        assert_eq!(dims[1].nucleus, Some(Nucleus::N));
        assert_eq!(dims[1].spectral_region, Some(SpectralRegion::N));
    }

    #[test]
    fn empty_dimension_carries_no_region() {
        let mut dims = vec![dim_with(1, &[]), dim_with(2, &[8.0])];
        run(&mut dims, FileHints::default(), false);
        assert_eq!(dims[0].spectral_region, None);
        assert!(dims[1].is_acquisition());
    }
}
