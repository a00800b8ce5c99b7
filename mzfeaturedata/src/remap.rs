//! Projecting traces onto other spectrum axes and TIC normalization.
use std::sync::Arc;

use tracing::trace;

use crate::error::TraceError;
use crate::spectrum::{same_spectrum, SpectrumLike};
use crate::spectrum_trace::SpectrumTrace;
use crate::storage::MemoryMapStorage;
use crate::tracks::{IntensityTrack, MzTrack};

/// The intensity-weighted mean m/z over the whole trace, `0.0` without intensity
fn weighted_mean_mz<S: SpectrumLike>(trace: &SpectrumTrace<S>) -> f64 {
    let (weighted, total) = trace
        .iter()
        .fold((0.0, 0.0), |(weighted, total), (mz, intensity)| {
            (weighted + mz * intensity, total + intensity)
        });
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

/// Write `trace` projected onto `new_spectra` into the caller's buffers.
///
/// `new_spectra` must be an order-preserving superset of the trace's spectra. Points of
/// spectra the trace has no value for get intensity `0.0` and the trace's weighted mean
/// m/z, an approximation that is only good enough for previews. Both buffers must hold
/// exactly `new_spectra.len()` values.
pub fn remap_into<S: SpectrumLike>(
    trace: &SpectrumTrace<S>,
    new_spectra: &[Arc<S>],
    mz_out: &mut [f64],
    intensity_out: &mut [f64],
) -> Result<(), TraceError> {
    for (what, actual) in [("m/z", mz_out.len()), ("intensity", intensity_out.len())] {
        if actual != new_spectra.len() {
            return Err(TraceError::OutputBufferSize {
                what,
                expected: new_spectra.len(),
                actual,
            });
        }
    }

    let spectra = trace.spectra();
    let mzs = trace.mz_values();
    let intensities = trace.intensity_values();
    let fill_mz = weighted_mean_mz(trace);

    let mut cursor = 0;
    for (k, spectrum) in new_spectra.iter().enumerate() {
        if cursor < spectra.len() && same_spectrum(spectra[cursor].as_ref(), spectrum.as_ref()) {
            mz_out[k] = mzs[cursor];
            intensity_out[k] = intensities[cursor];
            cursor += 1;
        } else {
            mz_out[k] = fill_mz;
            intensity_out[k] = 0.0;
        }
    }

    if cursor < spectra.len() {
        return Err(TraceError::IncompleteRemap {
            unmatched: spectra.len() - cursor,
        });
    }
    Ok(())
}

/// Project `trace` onto `new_spectra`. See [`remap_into`].
pub fn remap_onto_axis<S: SpectrumLike>(
    trace: &SpectrumTrace<S>,
    new_spectra: &[Arc<S>],
    storage: Option<&MemoryMapStorage>,
) -> Result<SpectrumTrace<S>, TraceError> {
    let mut mz = vec![0.0; new_spectra.len()];
    let mut intensity = vec![0.0; new_spectra.len()];
    remap_into(trace, new_spectra, &mut mz, &mut intensity)?;
    trace!(
        "Remapped a trace of {} points onto {} spectra",
        trace.len(),
        new_spectra.len()
    );
    SpectrumTrace::new(storage, mz, intensity, new_spectra.to_vec())
}

/// Scale every intensity by `avg_tic / tic`, where `avg_tic` is the mean positive TIC of
/// the trace's own spectra.
///
/// The normalization is local to the time window the trace spans. Points in spectra
/// without a positive TIC keep their intensity.
pub fn normalize_to_average_tic<S: SpectrumLike>(
    trace: &SpectrumTrace<S>,
    storage: Option<&MemoryMapStorage>,
) -> Result<SpectrumTrace<S>, TraceError> {
    let (sum, n) = trace
        .spectra()
        .iter()
        .map(|s| s.tic())
        .filter(|tic| *tic > 0.0)
        .fold((0.0, 0usize), |(sum, n), tic| (sum + tic, n + 1));
    let average = if n > 0 { sum / n as f64 } else { 0.0 };

    let intensity = trace
        .spectra()
        .iter()
        .zip(trace.intensity_values())
        .map(|(s, i)| {
            let tic = s.tic();
            if tic > 0.0 {
                i * average / tic
            } else {
                *i
            }
        })
        .collect();
    trace.replace_values(storage, trace.mz_values().to_vec(), intensity)
}
