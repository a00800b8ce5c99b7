//! A detected feature: one trace plus the attributes derived from it.
use std::sync::Arc;

use tracing::trace;

use crate::center::{CenterEstimator, CenterFunction};
use crate::error::TraceError;
use crate::metrics::{
    area, center_mz, height, intensity_range, mobility, mobility_range, most_intense_index,
    mz_range, rt_range, SmallestMzDelta, ValueRange,
};
use crate::mobilogram_trace::MobilogramTimeTrace;
use crate::quality::{asymmetry_factor, fwhm, tailing_factor};
use crate::spectrum::{MobilityType, SpectrumLike};
use crate::spectrum_trace::IonTimeTrace;
use crate::tracks::{IntensityTrack, MzTrack, TimeTrack, Track};

/// The one trace a feature holds
#[derive(Debug, Clone)]
pub enum FeatureData {
    Chromatogram(IonTimeTrace),
    Mobilogram(MobilogramTimeTrace),
}

impl FeatureData {
    pub fn has_mobility(&self) -> bool {
        matches!(self, Self::Mobilogram(_))
    }

    pub fn as_mobilogram(&self) -> Option<&MobilogramTimeTrace> {
        match self {
            Self::Chromatogram(_) => None,
            Self::Mobilogram(t) => Some(t),
        }
    }

    pub fn mobility_type(&self) -> Option<MobilityType> {
        self.as_mobilogram()
            .and_then(|t| t.frames().first())
            .map(|f| f.mobility_type)
    }

    /// The spectrum holding the apex of this trace
    pub fn representative_spectrum(&self) -> Option<Arc<dyn SpectrumLike>> {
        let i = most_intense_index(self)?;
        match self {
            Self::Chromatogram(t) => Some(t.spectra()[i].clone() as Arc<dyn SpectrumLike>),
            Self::Mobilogram(t) => Some(t.frames()[i].clone() as Arc<dyn SpectrumLike>),
        }
    }
}

impl From<IonTimeTrace> for FeatureData {
    fn from(value: IonTimeTrace) -> Self {
        Self::Chromatogram(value)
    }
}

impl From<MobilogramTimeTrace> for FeatureData {
    fn from(value: MobilogramTimeTrace) -> Self {
        Self::Mobilogram(value)
    }
}

impl Track for FeatureData {
    fn value_count(&self) -> usize {
        match self {
            Self::Chromatogram(t) => t.value_count(),
            Self::Mobilogram(t) => t.value_count(),
        }
    }
}

impl MzTrack for FeatureData {
    fn mz_values(&self) -> &[f64] {
        match self {
            Self::Chromatogram(t) => t.mz_values(),
            Self::Mobilogram(t) => t.mz_values(),
        }
    }
}

impl IntensityTrack for FeatureData {
    fn intensity_values(&self) -> &[f64] {
        match self {
            Self::Chromatogram(t) => t.intensity_values(),
            Self::Mobilogram(t) => t.intensity_values(),
        }
    }
}

impl TimeTrack for FeatureData {
    fn retention_time(&self, index: usize) -> Result<f64, TraceError> {
        match self {
            Self::Chromatogram(t) => t.retention_time(index),
            Self::Mobilogram(t) => t.retention_time(index),
        }
    }

    fn iter_retention_times(&self) -> impl Iterator<Item = f64> + '_ {
        let (scans, frames) = match self {
            Self::Chromatogram(t) => (Some(t.iter_retention_times()), None),
            Self::Mobilogram(t) => (None, Some(t.iter_retention_times())),
        };
        scans
            .into_iter()
            .flatten()
            .chain(frames.into_iter().flatten())
    }
}

impl SmallestMzDelta for FeatureData {
    fn smallest_mz_delta(&self) -> Option<f64> {
        match self {
            Self::Chromatogram(t) => t.smallest_mz_delta(),
            Self::Mobilogram(t) => t.smallest_mz_delta(),
        }
    }
}

/// How the spectra of a feature were acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Acquisition {
    /// Spectra are separated in time, retention time attributes are meaningful
    #[default]
    Chromatography,
    /// Spectra are separated in space, there is no retention time axis
    Imaging,
}

/// Everything derived from a feature's trace. `None` means "not computed" or "undefined".
#[derive(Debug, Clone, Default)]
pub struct FeatureAttributes {
    pub area: Option<f64>,
    pub height: Option<f64>,
    pub mz: Option<f64>,
    pub mz_range: Option<ValueRange>,
    pub intensity_range: Option<ValueRange>,
    pub rt: Option<f64>,
    pub rt_range: Option<ValueRange>,
    pub mobility: Option<f64>,
    pub mobility_range: Option<ValueRange>,
    pub mobility_unit: Option<&'static str>,
    pub representative_spectrum: Option<Arc<dyn SpectrumLike>>,
    pub fwhm: Option<f64>,
    pub tailing_factor: Option<f64>,
    pub asymmetry_factor: Option<f64>,
}

/// Options for [`recompute_derived_attributes`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecomputeParams {
    pub center: CenterFunction,
    pub compute_quality: bool,
}

impl Default for RecomputeParams {
    fn default() -> Self {
        Self {
            center: CenterFunction::default(),
            compute_quality: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Feature {
    data: FeatureData,
    acquisition: Acquisition,
    attributes: FeatureAttributes,
}

impl Feature {
    /// Create a feature and derive its attributes with [`RecomputeParams::default`]
    pub fn new(data: impl Into<FeatureData>, acquisition: Acquisition) -> Self {
        Self::with_params(data, acquisition, &RecomputeParams::default())
    }

    pub fn with_params(
        data: impl Into<FeatureData>,
        acquisition: Acquisition,
        params: &RecomputeParams,
    ) -> Self {
        let mut this = Self {
            data: data.into(),
            acquisition,
            attributes: FeatureAttributes::default(),
        };
        recompute_derived_attributes(&mut this, &params.center, params.compute_quality);
        this
    }

    pub fn data(&self) -> &FeatureData {
        &self.data
    }

    pub fn acquisition(&self) -> Acquisition {
        self.acquisition
    }

    pub fn attributes(&self) -> &FeatureAttributes {
        &self.attributes
    }

    /// Replace the trace wholesale and refresh every derived attribute
    pub fn set_data<C: CenterEstimator + ?Sized>(
        &mut self,
        data: impl Into<FeatureData>,
        center: &C,
        compute_quality: bool,
    ) {
        self.data = data.into();
        recompute_derived_attributes(self, center, compute_quality);
    }
}

/// Refresh every attribute of `feature` from its trace.
///
/// Retention time attributes are only set for chromatographic acquisitions and mobility
/// attributes only for mobility-resolved traces. The quality metrics come last and are
/// each left unset when undefined for this trace.
pub fn recompute_derived_attributes<C: CenterEstimator + ?Sized>(
    feature: &mut Feature,
    center: &C,
    compute_quality: bool,
) {
    let data = &feature.data;
    let mut attrs = FeatureAttributes {
        area: Some(area(data)),
        mz_range: mz_range(data),
        mz: center_mz(data, center),
        intensity_range: intensity_range(data),
        height: Some(height(data)),
        representative_spectrum: data.representative_spectrum(),
        ..Default::default()
    };

    if feature.acquisition != Acquisition::Imaging {
        attrs.rt = attrs
            .representative_spectrum
            .as_ref()
            .map(|s| s.retention_time());
        attrs.rt_range = rt_range(data);
    }

    if let FeatureData::Mobilogram(trace) = data {
        let summed = trace.summed_mobility_distribution();
        attrs.mobility_range = mobility_range(summed);
        let value = mobility(summed);
        attrs.mobility = (!value.is_nan()).then_some(value);
        attrs.mobility_unit = data.mobility_type().map(|t| t.unit());
    }

    if compute_quality {
        attrs.fwhm = fwhm(data);
        attrs.tailing_factor = tailing_factor(data);
        attrs.asymmetry_factor = asymmetry_factor(data);
    }

    trace!(
        "Recomputed a feature of {} points: area {:?}, m/z {:?}, rt {:?}, mobility {:?}, fwhm {:?}",
        data.value_count(),
        attrs.area,
        attrs.mz,
        attrs.rt,
        attrs.mobility,
        attrs.fwhm
    );
    feature.attributes = attrs;
}
