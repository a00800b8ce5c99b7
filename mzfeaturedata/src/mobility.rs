//! Cross-frame mobility distributions and the binning accessor that builds them.
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, trace};

use crate::error::TraceError;
use crate::spectrum::{Frame, MobilityType};
use crate::spectrum_trace::IonMobilityTrace;
use crate::storage::{store_values, DoubleBuffer, MemoryMapStorage};
use crate::tracks::{IntensityTrack, MobilityTrack, Track};

/// Added to the last mobility of a bin to form its exclusive upper limit
pub const MOBILITY_EPSILON: f64 = 1e-5;

/// A mobility-binned intensity distribution summed over all frames of a feature.
///
/// Mobilities are always in ascending order, regardless of how the frames were acquired.
#[derive(Debug, Clone, Default)]
pub struct SummedMobilogram {
    mobility: DoubleBuffer,
    intensity: DoubleBuffer,
}

impl SummedMobilogram {
    pub fn new(
        storage: Option<&MemoryMapStorage>,
        mobility: Vec<f64>,
        intensity: Vec<f64>,
    ) -> Result<Self, TraceError> {
        if mobility.len() != intensity.len() {
            return Err(TraceError::length_mismatch(
                "intensity",
                mobility.len(),
                intensity.len(),
            ));
        }
        Ok(Self {
            mobility: store_values(storage, mobility)?,
            intensity: store_values(storage, intensity)?,
        })
    }

    pub fn len(&self) -> usize {
        self.mobility.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mobility.is_empty()
    }

    pub fn mobility_values(&self) -> &[f64] {
        &self.mobility
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mobility
            .iter()
            .copied()
            .zip(self.intensity.iter().copied())
    }

    /// Deep copy both buffers into `storage`
    pub fn copy(&self, storage: Option<&MemoryMapStorage>) -> Result<Self, TraceError> {
        Self::new(storage, self.mobility.to_vec(), self.intensity.to_vec())
    }

    /// Divide every intensity by `factor`, or by the highest intensity when `factor`
    /// is `None`. The result always lives on the heap.
    pub fn normalized(&self, factor: Option<f64>) -> Self {
        let denominator = factor.unwrap_or_else(|| {
            self.intensity
                .iter()
                .copied()
                .max_by(|a, b| a.total_cmp(b))
                .filter(|max| *max > 0.0)
                .unwrap_or(1.0)
        });
        Self {
            mobility: self.mobility.clone(),
            intensity: self
                .intensity
                .iter()
                .map(|i| i / denominator)
                .collect_vec()
                .into(),
        }
    }
}

impl Track for SummedMobilogram {
    fn value_count(&self) -> usize {
        self.len()
    }
}

impl IntensityTrack for SummedMobilogram {
    fn intensity_values(&self) -> &[f64] {
        &self.intensity
    }
}

impl MobilityTrack for SummedMobilogram {
    fn mobility(&self, index: usize) -> Result<f64, TraceError> {
        self.check_index(index)?;
        Ok(self.mobility[index])
    }

    fn iter_mobilities(&self) -> impl Iterator<Item = f64> + '_ {
        self.mobility.iter().copied()
    }
}

/// Sums mobilograms of many frames onto one shared mobility axis.
///
/// The axis is derived once from the frames of a run. Each bin groups `bin_width`
/// consecutive distinct mobility values. The accumulation buffer is scratch state, so
/// every mutating call takes `&mut self` and an instance serves one caller at a time.
#[derive(Debug, Clone)]
pub struct MobilogramBinning {
    mobility_type: MobilityType,
    bin_width: usize,
    centers: Vec<f64>,
    upper_limits: Vec<f64>,
    intensities: Vec<f64>,
}

impl MobilogramBinning {
    pub fn new(frames: &[Arc<Frame>], bin_width: usize) -> Result<Self, TraceError> {
        if bin_width < 1 {
            return Err(TraceError::InvalidBinWidth(bin_width));
        }

        let mut distinct: Vec<f64> = frames
            .iter()
            .filter(|f| f.num_mobility_scans() > 1)
            .unique_by(|f| {
                f.mobility_bounds()
                    .map(|(lo, hi)| (lo.to_bits(), hi.to_bits()))
            })
            .flat_map(|f| f.iter_mobilities())
            .collect();
        if distinct.len() < 2 {
            return Err(TraceError::NoMobilityData);
        }
        distinct.sort_by(|a, b| a.total_cmp(b));
        distinct.dedup();

        let mut centers = Vec::with_capacity(distinct.len() / bin_width + 1);
        let mut upper_limits = Vec::with_capacity(distinct.len() / bin_width + 1);
        for chunk in distinct.chunks(bin_width) {
            centers.push(chunk.iter().sum::<f64>() / chunk.len() as f64);
            if let Some(last) = chunk.last() {
                upper_limits.push(*last + MOBILITY_EPSILON);
            }
        }

        let mobility_type = frames
            .first()
            .map(|f| f.mobility_type)
            .unwrap_or_default();
        if let (Some(first), Some(last)) = (centers.first(), centers.last()) {
            debug!(
                "Binning {} mobility values into {} bins of {} (about {:.6} {} each)",
                distinct.len(),
                centers.len(),
                bin_width,
                (last - first) / (centers.len().max(2) - 1) as f64,
                mobility_type.unit()
            );
        }
        let intensities = vec![0.0; centers.len()];
        Ok(Self {
            mobility_type,
            bin_width,
            centers,
            upper_limits,
            intensities,
        })
    }

    /// A bin width that yields a usable resolution for `frame`'s acquisition type.
    ///
    /// TIMS frames are sampled far more finely than the instrument resolves, so adjacent
    /// scans are pooled until a bin spans roughly 0.0008 Vs/cm^2. Every other type uses
    /// the raw scans.
    pub fn recommended_bin_width(frame: &Frame) -> usize {
        match frame.mobility_type {
            MobilityType::Tims => {
                let mid = frame.num_mobility_scans() / 2;
                let delta = match (frame.mobility_scan(mid), frame.mobility_scan(mid + 1)) {
                    (Some(a), Some(b)) => (a.mobility - b.mobility).abs(),
                    _ => return 1,
                };
                if delta <= 0.0 || !delta.is_finite() {
                    return 1;
                }
                (0.0008 / delta).max(1.0) as usize * 2
            }
            _ => 1,
        }
    }

    pub fn bin_width(&self) -> usize {
        self.bin_width
    }

    pub fn mobility_type(&self) -> MobilityType {
        self.mobility_type
    }

    pub fn bin_centers(&self) -> &[f64] {
        &self.centers
    }

    pub fn bin_upper_limits(&self) -> &[f64] {
        &self.upper_limits
    }

    /// The intensity currently accumulated per bin
    pub fn binned_intensities(&self) -> &[f64] {
        &self.intensities
    }

    fn clear(&mut self) {
        self.intensities.iter_mut().for_each(|i| *i = 0.0);
    }

    /// Add ascending (mobility, intensity) points to the bins, returning how many points
    /// fell outside every bin.
    fn accumulate(&mut self, points: impl Iterator<Item = (f64, f64)>) -> usize {
        let mut points = points.peekable();
        let mut unassigned = 0;
        for (i, bin_end) in self.upper_limits.iter().copied().enumerate() {
            let bin_start = if i == 0 {
                -MOBILITY_EPSILON
            } else {
                self.upper_limits[i - 1]
            };
            while let Some((mobility, intensity)) = points.next_if(|(m, _)| *m < bin_end) {
                if mobility > bin_start {
                    self.intensities[i] += intensity;
                } else {
                    unassigned += 1;
                }
            }
        }
        unassigned + points.count()
    }

    /// Replace the accumulated distribution with the sum of `mobilograms`
    pub fn set_mobilograms<'a>(
        &mut self,
        mobilograms: impl IntoIterator<Item = &'a IonMobilityTrace>,
    ) {
        self.clear();
        let descending = self.mobility_type.is_descending();
        for mobilogram in mobilograms {
            let n = mobilogram.len();
            let points = mobilogram
                .iter_mobilities()
                .zip(mobilogram.intensity_values().iter().copied())
                .collect_vec();
            let unassigned = if descending {
                self.accumulate(points.into_iter().rev())
            } else {
                self.accumulate(points.into_iter())
            };
            if unassigned > 0 {
                debug!(
                    "Assigned {}/{} points of the mobilogram of frame {:?}",
                    n - unassigned,
                    n,
                    mobilogram.frame_index()
                );
            }
        }
    }

    /// Re-bin an already summed distribution.
    ///
    /// Re-binning with a narrower bin width than the one `summed` was built with leaves
    /// empty bins behind. Prefer [`MobilogramBinning::set_mobilograms`] when the
    /// individual mobilograms are available.
    pub fn set_summed(&mut self, summed: &SummedMobilogram) {
        self.clear();
        let unassigned = self.accumulate(summed.iter());
        if unassigned > 0 {
            debug!(
                "Assigned {}/{} points of a summed mobilogram",
                summed.len() - unassigned,
                summed.len()
            );
        }
    }

    /// Build a [`SummedMobilogram`] from the accumulated bins.
    ///
    /// The result spans the first through the last non-zero bin plus one zero bin on each
    /// side where available. An all-zero accumulation produces an empty distribution.
    pub fn to_summed_mobilogram(
        &self,
        storage: Option<&MemoryMapStorage>,
    ) -> Result<SummedMobilogram, TraceError> {
        let first = self.intensities.iter().position(|i| *i > 0.0);
        let last = self.intensities.iter().rposition(|i| *i > 0.0);
        let (start, end) = match (first, last) {
            (Some(first), Some(last)) => (
                first.saturating_sub(1),
                (last + 1).min(self.intensities.len() - 1),
            ),
            _ => {
                trace!("No intensity was binned, the summed mobilogram is empty");
                return SummedMobilogram::new(storage, Vec::new(), Vec::new());
            }
        };
        SummedMobilogram::new(
            storage,
            self.centers[start..=end].to_vec(),
            self.intensities[start..=end].to_vec(),
        )
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub(crate) fn make_frames(mobility_type: MobilityType) -> Vec<Arc<Frame>> {
        let mut mobilities: Vec<f64> = (0..10).map(|i| 1.0 + i as f64 * 0.01).collect();
        if mobility_type.is_descending() {
            mobilities.reverse();
        }
        (0..4)
            .map(|i| {
                Arc::new(Frame::new(
                    i,
                    10.0 + i as f64,
                    1,
                    1e4,
                    mobility_type,
                    &mobilities,
                ))
            })
            .collect()
    }

    fn mobilogram_of(frame: &Frame, scans: &[usize], intensity: &[f64]) -> IonMobilityTrace {
        IonMobilityTrace::new(
            None,
            vec![500.0; scans.len()],
            intensity.to_vec(),
            scans
                .iter()
                .map(|i| frame.mobility_scans()[*i].clone())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_bins() -> Result<(), TraceError> {
        let frames = make_frames(MobilityType::DriftTube);
        let binning = MobilogramBinning::new(&frames, 3)?;
        assert_eq!(binning.bin_centers().len(), 4);
        assert!((binning.bin_centers()[0] - 1.01).abs() < 1e-9);
        assert!((binning.bin_upper_limits()[0] - (1.02 + MOBILITY_EPSILON)).abs() < 1e-9);
        // the last bin only holds one value
        assert!((binning.bin_centers()[3] - 1.09).abs() < 1e-9);

        assert!(matches!(
            MobilogramBinning::new(&frames, 0),
            Err(TraceError::InvalidBinWidth(0))
        ));
        let flat = vec![Arc::new(Frame::new(0, 1.0, 1, 1.0, MobilityType::None, &[]))];
        assert!(matches!(
            MobilogramBinning::new(&flat, 1),
            Err(TraceError::NoMobilityData)
        ));
        Ok(())
    }

    #[test]
    fn test_recommended_bin_width() {
        let frames = make_frames(MobilityType::DriftTube);
        assert_eq!(MobilogramBinning::recommended_bin_width(&frames[0]), 1);

        let tims = Frame::new(
            0,
            1.0,
            1,
            1.0,
            MobilityType::Tims,
            &[1.001, 1.00075, 1.0005, 1.00025, 1.0],
        );
        // 0.0008 / 0.00025 rounds down to 3 scans, doubled
        assert_eq!(MobilogramBinning::recommended_bin_width(&tims), 6);
    }

    #[test_log::test]
    fn test_sum_tims_mobilograms() -> Result<(), TraceError> {
        let frames = make_frames(MobilityType::Tims);
        let mut binning = MobilogramBinning::new(&frames, 2)?;
        // scans 3..=5 of a descending frame hold mobilities 1.06, 1.05 and 1.04
        let a = mobilogram_of(&frames[0], &[3, 4, 5], &[10.0, 20.0, 30.0]);
        let b = mobilogram_of(&frames[1], &[4, 5], &[5.0, 5.0]);
        binning.set_mobilograms([&a, &b]);
        let binned = binning.binned_intensities();
        assert_eq!(binned.len(), 5);
        assert_eq!(binned[2], 20.0 + 5.0 + 30.0 + 5.0);
        assert_eq!(binned[3], 10.0);
        assert_eq!(binned.iter().sum::<f64>(), 70.0);

        let summed = binning.to_summed_mobilogram(None)?;
        assert_eq!(summed.len(), 4);
        assert_eq!(summed.intensity_values(), &[0.0, 60.0, 10.0, 0.0]);
        assert!(summed
            .mobility_values()
            .windows(2)
            .all(|w| w[0] < w[1]));

        let mut rebinned = MobilogramBinning::new(&frames, 2)?;
        rebinned.set_summed(&summed);
        assert_eq!(rebinned.binned_intensities(), binned);
        Ok(())
    }

    #[test]
    fn test_empty_accumulation() -> Result<(), TraceError> {
        let frames = make_frames(MobilityType::DriftTube);
        let binning = MobilogramBinning::new(&frames, 1)?;
        assert!(binning.to_summed_mobilogram(None)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_normalized() -> Result<(), TraceError> {
        let summed = SummedMobilogram::new(None, vec![1.0, 1.1, 1.2], vec![2.0, 8.0, 4.0])?;
        assert_eq!(summed.normalized(None).intensity_values(), &[0.25, 1.0, 0.5]);
        assert_eq!(
            summed.normalized(Some(2.0)).intensity_values(),
            &[1.0, 4.0, 2.0]
        );
        assert_eq!(summed.normalized(None).mobility(2)?, 1.2);

        let flat = SummedMobilogram::new(None, vec![1.0, 1.1], vec![0.0, 0.0])?;
        assert_eq!(flat.normalized(None).intensity_values(), &[0.0, 0.0]);
        Ok(())
    }
}
