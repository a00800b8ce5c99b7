//! Ranges, integrals and representative values derived from traces.
//!
//! Every function here is a pure single pass over the capability tracks. Degenerate input
//! produces `None` (or `NaN` for [`mobility`]) instead of an error, an empty or all-zero
//! trace is a normal state for sparse data.
use std::sync::Arc;

use itertools::Itertools;
use mzpeaks::coordinate::SimpleInterval;
use tracing::debug;

use crate::center::CenterEstimator;
use crate::ion_trace::IonTrace;
use crate::mobility::SummedMobilogram;
use crate::mobilogram_trace::MobilogramTimeTrace;
use crate::quality::width_at;
use crate::spectrum::SpectrumLike;
use crate::spectrum_trace::SpectrumTrace;
use crate::tracks::{IntensityTrack, MobilityTrack, MzTrack, TimeTrack};

/// A closed range of values
pub type ValueRange = SimpleInterval<f64>;

fn min_max(values: impl Iterator<Item = f64>) -> Option<ValueRange> {
    values.fold(None, |acc: Option<ValueRange>, v| match acc {
        None => Some(ValueRange::new(v, v)),
        Some(r) => Some(ValueRange::new(r.start.min(v), r.end.max(v))),
    })
}

/// Whether a point is a real observation rather than a guard point
#[inline]
fn is_signal(mz: f64, intensity: f64) -> bool {
    intensity > 0.0 && mz > 0.0
}

/// The retention time span of every point, guard points included
pub fn rt_range<T: TimeTrack>(trace: &T) -> Option<ValueRange> {
    min_max(trace.iter_retention_times())
}

/// The m/z span of points carrying intensity
pub fn mz_range<T: MzTrack + IntensityTrack>(trace: &T) -> Option<ValueRange> {
    min_max(
        trace
            .mz_values()
            .iter()
            .zip(trace.intensity_values())
            .filter(|(mz, i)| is_signal(**mz, **i))
            .map(|(mz, _)| *mz),
    )
}

/// The span of positive intensities
pub fn intensity_range<T: IntensityTrack>(trace: &T) -> Option<ValueRange> {
    min_max(
        trace
            .intensity_values()
            .iter()
            .copied()
            .filter(|i| *i > 0.0),
    )
}

pub fn mobility_range<T: MobilityTrack>(trace: &T) -> Option<ValueRange> {
    min_max(trace.iter_mobilities())
}

/// The index of the highest positive intensity. Ties resolve to the earliest index.
pub fn most_intense_index<T: IntensityTrack>(trace: &T) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in trace.intensity_values().iter().copied().enumerate() {
        if v > 0.0 && best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

pub fn most_intense_spectrum<S: SpectrumLike>(trace: &SpectrumTrace<S>) -> Option<&Arc<S>> {
    most_intense_index(trace).map(|i| &trace.spectra()[i])
}

/// The height of the apex, `0.0` for an empty or all-zero trace
pub fn height<T: IntensityTrack>(trace: &T) -> f64 {
    most_intense_index(trace)
        .map(|i| trace.intensity_values()[i])
        .unwrap_or_default()
}

/// Trapezoidal integral of intensity over retention time
pub fn area<T: IntensityTrack + TimeTrack>(trace: &T) -> f64 {
    trace
        .iter_retention_times()
        .zip(trace.intensity_values().iter().copied())
        .tuple_windows()
        .map(|((t0, i0), (t1, i1))| (t1 - t0) * (i0 + i1) / 2.0)
        .sum()
}

/// A single representative m/z from the real points of `trace`, as computed by `center`
pub fn center_mz<T, C>(trace: &T, center: &C) -> Option<f64>
where
    T: MzTrack + IntensityTrack,
    C: CenterEstimator + ?Sized,
{
    let (mzs, weights): (Vec<f64>, Vec<f64>) = trace
        .mz_values()
        .iter()
        .zip(trace.intensity_values())
        .filter(|(mz, i)| is_signal(**mz, **i))
        .map(|(mz, i)| (*mz, *i))
        .unzip();
    center.center(&mzs, &weights)
}

/// The mobility at the apex of `trace`, `NaN` when no point has intensity
pub fn mobility<T: MobilityTrack + IntensityTrack>(trace: &T) -> f64 {
    match most_intense_index(trace).map(|i| trace.mobility(i)) {
        Some(Ok(value)) => value,
        _ => {
            debug!(
                "Cannot determine the mobility of a trace with {} points and no intensity",
                trace.value_count()
            );
            f64::NAN
        }
    }
}

/// The mobility range at half height of a summed mobilogram
pub fn mobility_fwhm(summed: &SummedMobilogram) -> Option<ValueRange> {
    let w = width_at(summed.mobility_values(), summed.intensity_values(), 0.5)?;
    Some(ValueRange::new(w.left.min(w.right), w.left.max(w.right)))
}

fn smallest_positive_gap<T: MzTrack + IntensityTrack + ?Sized>(trace: &T) -> Option<f64> {
    trace
        .mz_values()
        .iter()
        .zip(trace.intensity_values())
        .filter(|(mz, i)| is_signal(**mz, **i))
        .map(|(mz, _)| *mz)
        .sorted_by(|a, b| a.total_cmp(b))
        .tuple_windows()
        .map(|(a, b)| b - a)
        .filter(|d| *d > 0.0)
        .min_by(|a, b| a.total_cmp(b))
}

/// The smallest m/z spacing between distinct real points, an estimate of the
/// resolution a trace was sampled at.
pub trait SmallestMzDelta {
    fn smallest_mz_delta(&self) -> Option<f64>;
}

impl SmallestMzDelta for IonTrace {
    fn smallest_mz_delta(&self) -> Option<f64> {
        smallest_positive_gap(self)
    }
}

impl<S: SpectrumLike> SmallestMzDelta for SpectrumTrace<S> {
    fn smallest_mz_delta(&self) -> Option<f64> {
        smallest_positive_gap(self)
    }
}

/// Computed per mobilogram. Frame-level m/z values are means over whole mobilograms and
/// their spacing says nothing about the instrument.
impl SmallestMzDelta for MobilogramTimeTrace {
    fn smallest_mz_delta(&self) -> Option<f64> {
        self.mobilograms()
            .iter()
            .filter_map(|m| m.smallest_mz_delta())
            .min_by(|a, b| a.total_cmp(b))
    }
}
