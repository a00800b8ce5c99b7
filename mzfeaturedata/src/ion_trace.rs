//! Paired m/z and intensity buffers
use std::iter::{Copied, Zip};
use std::slice;

use mzpeaks::{CentroidPeak, IndexType};

use crate::error::TraceError;
use crate::storage::{store_values, DoubleBuffer, MemoryMapStorage};
use crate::tracks::{IntensityTrack, MzTrack, Track};

/// An ordered sequence of (m/z, intensity) pairs.
///
/// The boundaries may carry guard points, zero intensity samples with a placeholder
/// m/z that keep integration and plotting continuous.
#[derive(Debug, Clone, Default)]
pub struct IonTrace {
    mz: DoubleBuffer,
    intensity: DoubleBuffer,
}

/// A restartable iterator over the (m/z, intensity) pairs of an [`IonTrace`]
pub type IonTraceIter<'a> = Zip<Copied<slice::Iter<'a, f64>>, Copied<slice::Iter<'a, f64>>>;

impl IonTrace {
    pub fn new(
        storage: Option<&MemoryMapStorage>,
        mz: Vec<f64>,
        intensity: Vec<f64>,
    ) -> Result<Self, TraceError> {
        if mz.len() != intensity.len() {
            return Err(TraceError::length_mismatch(
                "intensity",
                mz.len(),
                intensity.len(),
            ));
        }
        Ok(Self {
            mz: store_values(storage, mz)?,
            intensity: store_values(storage, intensity)?,
        })
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    pub fn iter(&self) -> IonTraceIter<'_> {
        self.mz
            .iter()
            .copied()
            .zip(self.intensity.iter().copied())
    }

    /// Duplicate both buffers into `storage`. The copy shares nothing with `self`.
    pub fn copy(&self, storage: Option<&MemoryMapStorage>) -> Result<Self, TraceError> {
        Self::new(storage, self.mz.to_vec(), self.intensity.to_vec())
    }

    /// Whether either buffer lives in a memory-mapped arena
    pub fn is_mapped(&self) -> bool {
        self.mz.is_mapped() || self.intensity.is_mapped()
    }

    /// Convert the points of this trace into [`CentroidPeak`]s, indexed by position
    pub fn to_peaks(&self) -> Vec<CentroidPeak> {
        self.iter()
            .enumerate()
            .map(|(i, (mz, intensity))| CentroidPeak::new(mz, intensity as f32, i as IndexType))
            .collect()
    }
}

impl<'a> IntoIterator for &'a IonTrace {
    type Item = (f64, f64);

    type IntoIter = IonTraceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Track for IonTrace {
    fn value_count(&self) -> usize {
        self.len()
    }
}

impl MzTrack for IonTrace {
    fn mz_values(&self) -> &[f64] {
        &self.mz
    }
}

impl IntensityTrack for IonTrace {
    fn intensity_values(&self) -> &[f64] {
        &self.intensity
    }
}
