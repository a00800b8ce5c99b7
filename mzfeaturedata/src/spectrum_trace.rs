//! Ion traces bound to the spectra they were observed in.
use std::sync::Arc;

use mzpeaks::{feature::Feature, IonMobility, Time, MZ};

use crate::error::TraceError;
use crate::ion_trace::{IonTrace, IonTraceIter};
use crate::spectrum::{
    check_ordered, find_spectrum, same_spectrum, MobilityScan, Scan, SpectrumLike,
};
use crate::storage::MemoryMapStorage;
use crate::tracks::{IntensityTrack, MobilityTrack, MzTrack, TimeTrack, Track};

/// An [`IonTrace`] whose point `i` was observed in spectrum `i`.
///
/// The spectrum list is in acquisition order and exactly as long as the value buffers.
/// All transformations produce new traces, the buffers of `self` are never touched.
#[derive(Debug, Clone)]
pub struct SpectrumTrace<S: SpectrumLike> {
    ions: IonTrace,
    spectra: Arc<[Arc<S>]>,
}

/// A chromatogram over the scans of a run
pub type IonTimeTrace<S = Scan> = SpectrumTrace<S>;

/// A mobilogram over the mobility scans of a single frame
pub type IonMobilityTrace = SpectrumTrace<MobilityScan>;

impl<S: SpectrumLike> SpectrumTrace<S> {
    pub fn new(
        storage: Option<&MemoryMapStorage>,
        mz: Vec<f64>,
        intensity: Vec<f64>,
        spectra: Vec<Arc<S>>,
    ) -> Result<Self, TraceError> {
        check_ordered(&spectra)?;
        Self::from_parts(storage, mz, intensity, spectra.into())
    }

    fn from_parts(
        storage: Option<&MemoryMapStorage>,
        mz: Vec<f64>,
        intensity: Vec<f64>,
        spectra: Arc<[Arc<S>]>,
    ) -> Result<Self, TraceError> {
        if mz.len() != spectra.len() {
            return Err(TraceError::length_mismatch("m/z", spectra.len(), mz.len()));
        }
        let ions = IonTrace::new(storage, mz, intensity)?;
        Ok(Self { ions, spectra })
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn spectra(&self) -> &[Arc<S>] {
        &self.spectra
    }

    pub fn spectrum(&self, index: usize) -> Result<&Arc<S>, TraceError> {
        self.spectra.get(index).ok_or(TraceError::IndexOutOfBounds {
            index,
            len: self.len(),
        })
    }

    pub fn ions(&self) -> &IonTrace {
        &self.ions
    }

    pub fn iter(&self) -> IonTraceIter<'_> {
        self.ions.iter()
    }

    pub fn index_of_spectrum(&self, spectrum: &S) -> Option<usize> {
        find_spectrum(&self.spectra, spectrum)
    }

    /// The intensity observed in `spectrum`, or `0.0` if this trace has no point in it.
    pub fn intensity_for_spectrum(&self, spectrum: &S) -> f64 {
        self.index_of_spectrum(spectrum)
            .map(|i| self.ions.intensity_values()[i])
            .unwrap_or_default()
    }

    /// The m/z observed in `spectrum`, or `0.0` if this trace has no point in it.
    pub fn mz_for_spectrum(&self, spectrum: &S) -> f64 {
        self.index_of_spectrum(spectrum)
            .map(|i| self.ions.mz_values()[i])
            .unwrap_or_default()
    }

    /// Restrict this trace to `spectra`, which must be an order-preserving sublist of
    /// [`Self::spectra`]. Used to split one chromatographic peak into several features.
    pub fn subset(
        &self,
        storage: Option<&MemoryMapStorage>,
        spectra: &[Arc<S>],
    ) -> Result<Self, TraceError> {
        let indices = sublist_indices(&self.spectra, spectra)?;
        let mz = self.ions.mz_values();
        let intensity = self.ions.intensity_values();
        Self::from_parts(
            storage,
            indices.iter().map(|i| mz[*i]).collect(),
            indices.iter().map(|i| intensity[*i]).collect(),
            spectra.into(),
        )
    }

    /// A new trace over the same spectra with replaced values, as produced by smoothing
    /// or recalibration.
    pub fn replace_values(
        &self,
        storage: Option<&MemoryMapStorage>,
        mz: Vec<f64>,
        intensity: Vec<f64>,
    ) -> Result<Self, TraceError> {
        Self::from_parts(storage, mz, intensity, self.spectra.clone())
    }

    /// Deep copy the value buffers into `storage`. The spectra stay shared.
    pub fn copy(&self, storage: Option<&MemoryMapStorage>) -> Result<Self, TraceError> {
        Ok(Self {
            ions: self.ions.copy(storage)?,
            spectra: self.spectra.clone(),
        })
    }

    /// Whether `self` and `other` are bound to the same spectra and agree on every value
    pub fn index_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .spectra
                .iter()
                .zip(other.spectra.iter())
                .all(|(a, b)| a.index() == b.index())
            && self.mz_values() == other.mz_values()
            && self.intensity_values() == other.intensity_values()
    }
}

impl SpectrumTrace<Scan> {
    /// Convert into an [`mzpeaks`] feature over (m/z, time)
    pub fn to_feature(&self) -> Feature<MZ, Time> {
        let mut feature = Feature::empty();
        for ((mz, intensity), scan) in self.iter().zip(self.spectra.iter()) {
            feature.push_raw(mz, scan.retention_time, intensity as f32);
        }
        feature
    }
}

impl SpectrumTrace<MobilityScan> {
    /// Convert into an [`mzpeaks`] feature over (m/z, ion mobility)
    pub fn to_feature(&self) -> Feature<MZ, IonMobility> {
        let mut feature = Feature::empty();
        for ((mz, intensity), scan) in self.iter().zip(self.spectra.iter()) {
            feature.push_raw(mz, scan.mobility, intensity as f32);
        }
        feature
    }

    /// The index of the frame all mobility scans of this trace belong to
    pub fn frame_index(&self) -> Option<usize> {
        self.spectra.first().map(|s| s.frame_index)
    }
}

/// Map each entry of `subset` to its position in `parent`, in one forward walk.
pub(crate) fn sublist_indices<S: SpectrumLike>(
    parent: &[Arc<S>],
    subset: &[Arc<S>],
) -> Result<Vec<usize>, TraceError> {
    let mut indices = Vec::with_capacity(subset.len());
    let mut cursor = 0;
    for spectrum in subset {
        let offset = parent[cursor..]
            .iter()
            .position(|p| same_spectrum(p.as_ref(), spectrum.as_ref()))
            .ok_or(TraceError::NotASubset(spectrum.index()))?;
        indices.push(cursor + offset);
        cursor += offset + 1;
    }
    Ok(indices)
}

impl<'a, S: SpectrumLike> IntoIterator for &'a SpectrumTrace<S> {
    type Item = (f64, f64);

    type IntoIter = IonTraceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<S: SpectrumLike> Track for SpectrumTrace<S> {
    fn value_count(&self) -> usize {
        self.len()
    }
}

impl<S: SpectrumLike> MzTrack for SpectrumTrace<S> {
    fn mz_values(&self) -> &[f64] {
        self.ions.mz_values()
    }
}

impl<S: SpectrumLike> IntensityTrack for SpectrumTrace<S> {
    fn intensity_values(&self) -> &[f64] {
        self.ions.intensity_values()
    }
}

impl<S: SpectrumLike> TimeTrack for SpectrumTrace<S> {
    fn retention_time(&self, index: usize) -> Result<f64, TraceError> {
        self.spectrum(index).map(|s| s.retention_time())
    }

    fn iter_retention_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.spectra.iter().map(|s| s.retention_time())
    }
}

impl MobilityTrack for SpectrumTrace<MobilityScan> {
    fn mobility(&self, index: usize) -> Result<f64, TraceError> {
        self.spectrum(index).map(|s| s.mobility)
    }

    fn iter_mobilities(&self) -> impl Iterator<Item = f64> + '_ {
        self.spectra.iter().map(|s| s.mobility)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use mzpeaks::prelude::*;

    use super::*;

    pub(crate) fn make_scans(n: usize) -> Vec<Arc<Scan>> {
        (0..n)
            .map(|i| Arc::new(Scan::new(i, 10.0 + i as f64, 1, 1000.0)))
            .collect()
    }

    fn make_trace() -> IonTimeTrace {
        let scans = make_scans(5);
        IonTimeTrace::new(
            None,
            vec![0.0, 100.0, 100.01, 99.99, 0.0],
            vec![0.0, 50.0, 80.0, 30.0, 0.0],
            scans,
        )
        .unwrap()
    }

    #[test]
    fn test_value_count_matches_spectra() {
        let trace = make_trace();
        assert_eq!(trace.value_count(), trace.spectra().len());

        let err = IonTimeTrace::new(None, vec![1.0], vec![1.0], make_scans(2)).unwrap_err();
        assert!(matches!(err, TraceError::LengthMismatch { .. }));

        let mut scans = make_scans(3);
        scans.swap(0, 2);
        let err = IonTimeTrace::new(None, vec![1.0; 3], vec![1.0; 3], scans).unwrap_err();
        assert!(matches!(err, TraceError::UnorderedSpectra { .. }));
    }

    #[test]
    fn test_lookup_by_spectrum() {
        let trace = make_trace();
        let scan = trace.spectra()[2].clone();
        assert_eq!(trace.intensity_for_spectrum(&scan), 80.0);
        assert_eq!(trace.mz_for_spectrum(&scan), 100.01);
        let absent = Scan::new(42, 60.0, 1, 1000.0);
        assert_eq!(trace.intensity_for_spectrum(&absent), 0.0);
        assert_eq!(trace.index_of_spectrum(&absent), None);
        assert_eq!(trace.retention_time(2).unwrap(), 12.0);
        assert!(trace.retention_time(5).is_err());
    }

    #[test]
    fn test_replace_values_round_trip() -> Result<(), TraceError> {
        let trace = make_trace();
        let again = trace.replace_values(
            None,
            trace.mz_values().to_vec(),
            trace.intensity_values().to_vec(),
        )?;
        assert!(again.index_eq(&trace));

        let err = trace
            .replace_values(None, vec![1.0; 4], vec![1.0; 4])
            .unwrap_err();
        assert!(matches!(
            err,
            TraceError::LengthMismatch {
                expected: 5,
                actual: 4,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_subset() -> Result<(), TraceError> {
        let trace = make_trace();
        let full = trace.subset(None, &trace.spectra().to_vec())?;
        assert!(full.index_eq(&trace));

        let storage = MemoryMapStorage::new();
        let part = trace.subset(
            Some(&storage),
            &[trace.spectra()[1].clone(), trace.spectra()[3].clone()],
        )?;
        assert_eq!(part.intensity_values(), &[50.0, 30.0]);
        assert_eq!(part.mz_values(), &[100.0, 99.99]);
        assert_eq!(part.retention_time(1)?, 13.0);
        assert!(part.ions().is_mapped());

        let out_of_order = trace.subset(
            None,
            &[trace.spectra()[3].clone(), trace.spectra()[1].clone()],
        );
        assert!(matches!(out_of_order, Err(TraceError::NotASubset(1))));

        let foreign = trace.subset(None, &[Arc::new(Scan::new(99, 1.0, 1, 0.0))]);
        assert!(matches!(foreign, Err(TraceError::NotASubset(99))));
        Ok(())
    }

    #[test]
    fn test_subset_rejects_other_run() {
        let trace = make_trace();
        // same index as a member, different acquisition
        let other = Arc::new(Scan::new(2, 999.0, 1, 1000.0));
        assert_eq!(trace.index_of_spectrum(&other), None);
        let result = trace.subset(None, &[other]);
        assert!(matches!(result, Err(TraceError::NotASubset(2))));
    }

    #[test]
    fn test_to_feature() {
        let trace = make_trace();
        let feature = trace.to_feature();
        assert_eq!(feature.len(), 5);
        assert_eq!(feature.start_time(), Some(10.0));
        assert_eq!(feature.end_time(), Some(14.0));
    }
}
