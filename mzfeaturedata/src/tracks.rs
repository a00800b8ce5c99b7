//! Read-only capability contracts shared by every trace type.
//!
//! Each trace implements only the tracks it can actually provide. A summed mobilogram has
//! mobility and intensity but no m/z, an ion trace has m/z and intensity but no time, and
//! so on. The metrics engine is written against these traits.
use crate::error::TraceError;

/// Anything holding a fixed number of index-aligned values
pub trait Track {
    fn value_count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.value_count() == 0
    }

    #[doc(hidden)]
    fn check_index(&self, index: usize) -> Result<(), TraceError> {
        let len = self.value_count();
        if index < len {
            Ok(())
        } else {
            Err(TraceError::IndexOutOfBounds { index, len })
        }
    }
}

pub trait MzTrack: Track {
    /// The whole m/z buffer
    fn mz_values(&self) -> &[f64];

    fn mz(&self, index: usize) -> Result<f64, TraceError> {
        self.check_index(index)?;
        Ok(self.mz_values()[index])
    }
}

pub trait IntensityTrack: Track {
    /// The whole intensity buffer
    fn intensity_values(&self) -> &[f64];

    fn intensity(&self, index: usize) -> Result<f64, TraceError> {
        self.check_index(index)?;
        Ok(self.intensity_values()[index])
    }

    /// A cheap regression probe, **not** full equality.
    ///
    /// Two tracks compare equal if they have the same length and either share the same
    /// buffer or agree on five sampled points: the first, the three quartiles and the last.
    fn intensities_approx_eq<T: IntensityTrack + ?Sized>(&self, other: &T) -> bool {
        let a = self.intensity_values();
        let b = other.intensity_values();
        if a.len() != b.len() {
            return false;
        }
        if std::ptr::eq(a, b) || a.is_empty() {
            return true;
        }
        let last = a.len() - 1;
        [0, last / 4, last / 2, (last * 3) / 4, last]
            .into_iter()
            .all(|i| a[i] == b[i])
    }
}

pub trait MobilityTrack: Track {
    fn mobility(&self, index: usize) -> Result<f64, TraceError>;

    fn iter_mobilities(&self) -> impl Iterator<Item = f64> + '_;
}

pub trait TimeTrack: Track {
    /// The retention time of the spectrum at `index`
    fn retention_time(&self, index: usize) -> Result<f64, TraceError>;

    fn iter_retention_times(&self) -> impl Iterator<Item = f64> + '_;
}

#[cfg(test)]
mod test {
    use super::*;

    struct Intensities(Vec<f64>);

    impl Track for Intensities {
        fn value_count(&self) -> usize {
            self.0.len()
        }
    }

    impl IntensityTrack for Intensities {
        fn intensity_values(&self) -> &[f64] {
            &self.0
        }
    }

    #[test]
    fn test_index_bounds() {
        let track = Intensities(vec![1.0, 2.0]);
        assert_eq!(track.intensity(1).unwrap(), 2.0);
        assert!(matches!(
            track.intensity(2),
            Err(TraceError::IndexOutOfBounds { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_approx_eq() {
        let a = Intensities((0..20).map(|i| i as f64).collect());
        assert!(a.intensities_approx_eq(&a));

        let mut values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let b = Intensities(values.clone());
        assert!(a.intensities_approx_eq(&b));

        // An unsampled point differs, the probe cannot see it
        values[3] = -1.0;
        let c = Intensities(values.clone());
        assert!(a.intensities_approx_eq(&c));

        values[9] = -1.0;
        let d = Intensities(values);
        assert!(!a.intensities_approx_eq(&d));

        let e = Intensities(vec![0.0; 19]);
        assert!(!a.intensities_approx_eq(&e));
    }
}
