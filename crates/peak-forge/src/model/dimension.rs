use super::types::{Nucleus, SpectralRegion, Undersampling, WidthUnit};
use super::value::DecimalValue;
use serde::{Deserialize, Serialize};

/// Per-dimension setup reported by the upstream peak-list parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionSetup {
    #[serde(default)]
    pub atom_type: Option<Nucleus>,
    #[serde(default)]
    pub isotope: Option<u16>,
    #[serde(default)]
    pub acquisition: Option<bool>,
    #[serde(default)]
    pub sweep_width: Option<DecimalValue>,
    #[serde(default)]
    pub sweep_width_units: Option<WidthUnit>,
    #[serde(default)]
    pub spectrometer_frequency: Option<DecimalValue>,
    #[serde(default)]
    pub observed_frequencies: Vec<f64>,
}

/// Centre and extent of the ppm values observed on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionStats {
    pub centre: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl PositionStats {
    /// Summarises a set of positions.
    ///
    /// # Arguments
    ///
    /// * `values` - Observed ppm values for the axis.
    ///
    /// # Returns
    ///
    /// `None` when no finite value is present.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut count = 0usize;
        for &v in values.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            count += 1;
        }
        (count > 0).then(|| Self {
            centre: sum / count as f64,
            min,
            max,
            count,
        })
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// A classified spectral axis of one peak list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralDim {
    pub dim_id: usize,
    #[serde(rename = "atom_type")]
    pub nucleus: Option<Nucleus>,
    #[serde(rename = "atom_isotope_number")]
    pub isotope: Option<u16>,
    pub axis_code: Option<String>,
    pub spectral_region: Option<SpectralRegion>,
    pub acquisition: Option<bool>,
    pub undersampling: Option<Undersampling>,
    pub sweep_width: Option<f64>,
    pub sweep_width_units: Option<WidthUnit>,
    pub spectrometer_frequency: Option<f64>,
    #[serde(skip)]
    pub freq_hint: Vec<f64>,
    #[serde(skip)]
    pub stats: Option<PositionStats>,
    #[serde(skip)]
    pub observed_frequencies: Vec<f64>,
    #[serde(skip)]
    pub source_sweep_width: Option<DecimalValue>,
    #[serde(skip)]
    pub source_frequency: Option<DecimalValue>,
}

impl SpectralDim {
    /// Creates an unclassified dimension from its upstream setup.
    ///
    /// # Arguments
    ///
    /// * `dim_id` - One-based dimension id.
    /// * `setup` - Values reported by the upstream parser.
    pub fn from_setup(dim_id: usize, setup: &DimensionSetup) -> Self {
        let nucleus = setup
            .atom_type
            .or_else(|| setup.isotope.and_then(Nucleus::from_isotope));
        Self {
            dim_id,
            nucleus,
            isotope: setup.isotope.or_else(|| nucleus.map(|n| n.default_isotope())),
            axis_code: None,
            spectral_region: None,
            acquisition: setup.acquisition,
            undersampling: None,
            sweep_width: setup.sweep_width.map(|w| w.value),
            sweep_width_units: setup.sweep_width_units,
            spectrometer_frequency: setup.spectrometer_frequency.map(|f| f.value),
            freq_hint: Vec::new(),
            stats: None,
            observed_frequencies: setup.observed_frequencies.clone(),
            source_sweep_width: setup.sweep_width,
            source_frequency: setup.spectrometer_frequency,
        }
    }

    pub fn is_proton(&self) -> bool {
        self.nucleus.is_some_and(|n| n.is_proton())
    }

    pub fn region_or_generic(&self) -> Option<SpectralRegion> {
        self.spectral_region
            .or_else(|| self.nucleus.map(SpectralRegion::generic))
    }

    /// Whether the acquisition flag is explicitly set.
    pub fn is_acquisition(&self) -> bool {
        self.acquisition == Some(true)
    }

    /// Sets nucleus, isotope, region and axis code together so they stay consistent.
    pub fn classify(&mut self, region: SpectralRegion) {
        let nucleus = region.nucleus();
        if self.nucleus != Some(nucleus) {
            self.isotope = Some(nucleus.default_isotope());
        } else if self.isotope.is_none() {
            self.isotope = Some(nucleus.default_isotope());
        }
        self.nucleus = Some(nucleus);
        self.spectral_region = Some(region);
        self.axis_code = Some(nucleus.symbol().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_stats_reports_centre_and_extent() {
        let stats = PositionStats::from_values(&[1.0, 2.0, 6.0]).unwrap();
        assert_eq!(stats.centre, 3.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 6.0);
        assert_eq!(stats.width(), 5.0);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn position_stats_ignores_non_finite_values() {
        assert!(PositionStats::from_values(&[]).is_none());
        assert!(PositionStats::from_values(&[f64::NAN]).is_none());
        let stats = PositionStats::from_values(&[f64::NAN, 4.0]).unwrap();
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn from_setup_derives_nucleus_from_isotope() {
        let setup = DimensionSetup {
            isotope: Some(15),
            ..Default::default()
        };
        let dim = SpectralDim::from_setup(2, &setup);
        assert_eq!(dim.dim_id, 2);
        assert_eq!(dim.nucleus, Some(Nucleus::N));
        assert_eq!(dim.isotope, Some(15));
    }

    #[test]
    fn classify_keeps_axis_code_consistent() {
        let mut dim = SpectralDim::from_setup(1, &DimensionSetup::default());
        dim.classify(SpectralRegion::CAromatic);
        assert_eq!(dim.nucleus, Some(Nucleus::C));
        assert_eq!(dim.isotope, Some(13));
        assert_eq!(dim.axis_code.as_deref(), Some("C"));
        assert_eq!(dim.spectral_region, Some(SpectralRegion::CAromatic));
    }

    #[test]
    fn classify_preserves_known_deuterium_isotope() {
        let setup = DimensionSetup {
            isotope: Some(2),
            ..Default::default()
        };
        let mut dim = SpectralDim::from_setup(1, &setup);
        dim.classify(SpectralRegion::H);
        assert_eq!(dim.isotope, Some(2));
    }
}
