//! Chromatograms over ion mobility frames, resolved along the mobility axis.
use std::sync::Arc;

use tracing::trace;

use crate::error::TraceError;
use crate::mobility::{MobilogramBinning, SummedMobilogram};
use crate::spectrum::Frame;
use crate::spectrum_trace::{sublist_indices, IonMobilityTrace, SpectrumTrace};
use crate::storage::MemoryMapStorage;
use crate::tracks::{IntensityTrack, MzTrack, TimeTrack, Track};

/// A time trace over [`Frame`]s where every frame's point is the mobility-axis sum of a
/// nested [`IonMobilityTrace`].
///
/// The outer m/z of a frame is the intensity-weighted mean m/z of its mobilogram. A
/// [`SummedMobilogram`] over all frames is carried alongside.
#[derive(Debug, Clone)]
pub struct MobilogramTimeTrace {
    outer: SpectrumTrace<Frame>,
    mobilograms: Arc<[IonMobilityTrace]>,
    summed: SummedMobilogram,
}

/// Collapse a mobilogram into its intensity sum and intensity-weighted mean m/z
fn collapse(mobilogram: &IonMobilityTrace) -> (f64, f64) {
    let (weighted, total) = mobilogram
        .iter()
        .fold((0.0, 0.0), |(weighted, total), (mz, intensity)| {
            (weighted + mz * intensity, total + intensity)
        });
    if total > 0.0 {
        (weighted / total, total)
    } else {
        (0.0, total)
    }
}

fn check_frames(
    frames: &[Arc<Frame>],
    mobilograms: &[IonMobilityTrace],
) -> Result<(), TraceError> {
    if frames.len() != mobilograms.len() {
        return Err(TraceError::length_mismatch(
            "mobilograms",
            frames.len(),
            mobilograms.len(),
        ));
    }
    for (frame, mobilogram) in frames.iter().zip(mobilograms.iter()) {
        if let Some(scan) = mobilogram
            .spectra()
            .iter()
            .find(|s| s.frame_index != frame.index)
        {
            return Err(TraceError::FrameMismatch {
                expected: frame.index,
                found: scan.frame_index,
                mobility_scan: scan.index,
            });
        }
    }
    Ok(())
}

impl MobilogramTimeTrace {
    /// Build a trace from one mobilogram per frame, summing the mobility distribution
    /// with `binning`.
    pub fn new(
        storage: Option<&MemoryMapStorage>,
        frames: Vec<Arc<Frame>>,
        mobilograms: Vec<IonMobilityTrace>,
        binning: &mut MobilogramBinning,
    ) -> Result<Self, TraceError> {
        check_frames(&frames, &mobilograms)?;
        binning.set_mobilograms(mobilograms.iter());
        let summed = binning.to_summed_mobilogram(storage)?;
        Self::from_parts(storage, frames, mobilograms.into(), summed)
    }

    /// Build a trace from one mobilogram per frame and an already binned summed
    /// distribution, as read back from a persisted feature.
    pub fn with_summed(
        storage: Option<&MemoryMapStorage>,
        frames: Vec<Arc<Frame>>,
        mobilograms: Vec<IonMobilityTrace>,
        summed: SummedMobilogram,
    ) -> Result<Self, TraceError> {
        check_frames(&frames, &mobilograms)?;
        Self::from_parts(storage, frames, mobilograms.into(), summed)
    }

    fn from_parts(
        storage: Option<&MemoryMapStorage>,
        frames: Vec<Arc<Frame>>,
        mobilograms: Arc<[IonMobilityTrace]>,
        summed: SummedMobilogram,
    ) -> Result<Self, TraceError> {
        let (mz, intensity): (Vec<f64>, Vec<f64>) = mobilograms.iter().map(collapse).unzip();
        let outer = SpectrumTrace::new(storage, mz, intensity, frames)?;
        trace!(
            "Built a mobilogram trace over {} frames with {} summed mobility bins",
            outer.len(),
            summed.len()
        );
        Ok(Self {
            outer,
            mobilograms,
            summed,
        })
    }

    pub fn len(&self) -> usize {
        self.outer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outer.is_empty()
    }

    pub fn frames(&self) -> &[Arc<Frame>] {
        self.outer.spectra()
    }

    /// The mobility-collapsed trace over frames
    pub fn outer(&self) -> &SpectrumTrace<Frame> {
        &self.outer
    }

    pub fn mobilograms(&self) -> &[IonMobilityTrace] {
        &self.mobilograms
    }

    /// The mobilogram recorded for `frame`, or `None` when this trace has no point in it.
    /// A present mobilogram may still be all zero.
    pub fn mobilogram_for(&self, frame: &Frame) -> Option<&IonMobilityTrace> {
        self.outer
            .index_of_spectrum(frame)
            .map(|i| &self.mobilograms[i])
    }

    pub fn summed_mobility_distribution(&self) -> &SummedMobilogram {
        &self.summed
    }

    /// Restrict this trace to `frames`, an order-preserving sublist of [`Self::frames`],
    /// re-summing the mobility distribution with `binning`.
    pub fn subset(
        &self,
        storage: Option<&MemoryMapStorage>,
        frames: &[Arc<Frame>],
        binning: &mut MobilogramBinning,
    ) -> Result<Self, TraceError> {
        let indices = sublist_indices(self.frames(), frames)?;
        let mobilograms = indices
            .iter()
            .map(|i| self.mobilograms[*i].copy(storage))
            .collect::<Result<Vec<_>, _>>()?;
        binning.set_mobilograms(mobilograms.iter());
        let summed = binning.to_summed_mobilogram(storage)?;
        Self::from_parts(storage, frames.to_vec(), mobilograms.into(), summed)
    }

    /// Swap only the summed distribution. Frames and mobilograms are shared with `self`.
    pub fn replace_summed_distribution(
        &self,
        storage: Option<&MemoryMapStorage>,
        summed: &SummedMobilogram,
    ) -> Result<Self, TraceError> {
        Ok(Self {
            outer: self.outer.clone(),
            mobilograms: self.mobilograms.clone(),
            summed: summed.copy(storage)?,
        })
    }

    /// Replace every mobilogram, e.g. after smoothing along the mobility axis. The frame
    /// values and the summed distribution are recomputed.
    pub fn replace_mobilograms(
        &self,
        storage: Option<&MemoryMapStorage>,
        mobilograms: Vec<IonMobilityTrace>,
        binning: &mut MobilogramBinning,
    ) -> Result<Self, TraceError> {
        Self::new(storage, self.frames().to_vec(), mobilograms, binning)
    }
}

impl Track for MobilogramTimeTrace {
    fn value_count(&self) -> usize {
        self.len()
    }
}

impl MzTrack for MobilogramTimeTrace {
    fn mz_values(&self) -> &[f64] {
        self.outer.mz_values()
    }
}

impl IntensityTrack for MobilogramTimeTrace {
    fn intensity_values(&self) -> &[f64] {
        self.outer.intensity_values()
    }
}

impl TimeTrack for MobilogramTimeTrace {
    fn retention_time(&self, index: usize) -> Result<f64, TraceError> {
        self.outer.retention_time(index)
    }

    fn iter_retention_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.outer.iter_retention_times()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::mobility::test::make_frames;
    use crate::spectrum::MobilityType;

    pub(crate) fn mobilogram(
        frame: &Frame,
        first_scan: usize,
        intensity: &[f64],
    ) -> IonMobilityTrace {
        let scans = frame.mobility_scans()[first_scan..first_scan + intensity.len()].to_vec();
        let mz = intensity
            .iter()
            .enumerate()
            .map(|(i, _)| 500.0 + i as f64 * 0.001)
            .collect();
        IonMobilityTrace::new(None, mz, intensity.to_vec(), scans).unwrap()
    }

    pub(crate) fn make_trace() -> (MobilogramTimeTrace, MobilogramBinning, Vec<Arc<Frame>>) {
        let frames = make_frames(MobilityType::DriftTube);
        let mut binning = MobilogramBinning::new(&frames, 1).unwrap();
        let mobilograms = vec![
            mobilogram(&frames[0], 3, &[5.0, 10.0, 5.0]),
            mobilogram(&frames[1], 3, &[10.0, 20.0, 10.0]),
            mobilogram(&frames[2], 4, &[0.0, 0.0]),
        ];
        let trace = MobilogramTimeTrace::new(
            None,
            frames[..3].to_vec(),
            mobilograms,
            &mut binning,
        )
        .unwrap();
        (trace, binning, frames)
    }

    #[test]
    fn test_outer_sums() {
        let (trace, _, _) = make_trace();
        assert_eq!(trace.intensity_values(), &[20.0, 40.0, 0.0]);
        assert!((trace.mz_values()[0] - 500.001).abs() < 1e-9);
        assert_eq!(trace.mz_values()[2], 0.0);
        assert_eq!(trace.retention_time(1).unwrap(), 11.0);

        let summed = trace.summed_mobility_distribution();
        assert_eq!(summed.intensity_values(), &[0.0, 15.0, 30.0, 15.0, 0.0]);
    }

    #[test]
    fn test_mobilogram_for() {
        let (trace, _, frames) = make_trace();
        let zero = trace.mobilogram_for(&frames[2]).unwrap();
        assert!(zero.intensity_values().iter().all(|i| *i == 0.0));
        assert!(trace.mobilogram_for(&frames[3]).is_none());
        assert_eq!(trace.mobilogram_for(&frames[1]).unwrap().len(), 3);
    }

    #[test]
    fn test_frame_mismatch() {
        let frames = make_frames(MobilityType::DriftTube);
        let mut binning = MobilogramBinning::new(&frames, 1).unwrap();
        let err = MobilogramTimeTrace::new(
            None,
            frames[..2].to_vec(),
            vec![
                mobilogram(&frames[0], 0, &[1.0]),
                mobilogram(&frames[3], 0, &[1.0]),
            ],
            &mut binning,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TraceError::FrameMismatch {
                expected: 1,
                found: 3,
                mobility_scan: 0
            }
        ));

        let err = MobilogramTimeTrace::new(
            None,
            frames[..2].to_vec(),
            vec![mobilogram(&frames[0], 0, &[1.0])],
            &mut binning,
        )
        .unwrap_err();
        assert!(matches!(err, TraceError::LengthMismatch { .. }));
    }

    #[test]
    fn test_subset_rebins() -> Result<(), TraceError> {
        let (trace, mut binning, frames) = make_trace();
        let storage = MemoryMapStorage::new();
        let part = trace.subset(Some(&storage), &[frames[1].clone()], &mut binning)?;
        assert_eq!(part.len(), 1);
        assert_eq!(part.intensity_values(), &[40.0]);
        assert_eq!(
            part.summed_mobility_distribution().intensity_values(),
            &[0.0, 10.0, 20.0, 10.0, 0.0]
        );
        assert!(part.mobilograms()[0].ions().is_mapped());

        let err = trace.subset(None, &[frames[3].clone()], &mut binning);
        assert!(matches!(err, Err(TraceError::NotASubset(3))));
        Ok(())
    }

    #[test]
    fn test_replace_summary_only() -> Result<(), TraceError> {
        let (trace, _, _) = make_trace();
        let normalized = trace.summed_mobility_distribution().normalized(None);
        let replaced = trace.replace_summed_distribution(None, &normalized)?;
        assert_eq!(
            replaced.summed_mobility_distribution().intensity_values(),
            &[0.0, 0.5, 1.0, 0.5, 0.0]
        );
        assert!(replaced.outer().index_eq(trace.outer()));
        assert_eq!(replaced.mobilograms().len(), trace.mobilograms().len());
        Ok(())
    }

    #[test]
    fn test_replace_mobilograms() -> Result<(), TraceError> {
        let (trace, mut binning, frames) = make_trace();
        let smoothed = vec![
            mobilogram(&frames[0], 3, &[6.0, 8.0, 6.0]),
            mobilogram(&frames[1], 3, &[12.0, 16.0, 12.0]),
            mobilogram(&frames[2], 4, &[1.0, 1.0]),
        ];
        let replaced = trace.replace_mobilograms(None, smoothed, &mut binning)?;
        assert_eq!(replaced.intensity_values(), &[20.0, 40.0, 2.0]);
        assert_eq!(
            replaced.summed_mobility_distribution().intensity_values(),
            &[0.0, 18.0, 25.0, 19.0, 0.0]
        );
        Ok(())
    }
}
