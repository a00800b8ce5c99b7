//! The acquired spectra that traces are bound to.
//!
//! Spectra are owned by the run that acquired them and shared with traces through
//! [`Arc`] handles. A trace never copies a spectrum's retention time or mobility, it reads
//! them through the handle.
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use crate::error::TraceError;

/// The ion mobility separation technique a frame was acquired with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MobilityType {
    #[default]
    None,
    /// Trapped ion mobility, mobility scans are ordered by *decreasing* mobility
    Tims,
    DriftTube,
    TravelingWave,
    Faims,
    Other,
}

impl MobilityType {
    pub fn unit(&self) -> &'static str {
        match self {
            MobilityType::Tims => "Vs/cm^2",
            MobilityType::DriftTube | MobilityType::TravelingWave => "ms",
            MobilityType::Faims => "V",
            MobilityType::None | MobilityType::Other => "a.u.",
        }
    }

    /// Whether mobility scans of this type are acquired in descending mobility order
    pub fn is_descending(&self) -> bool {
        matches!(self, MobilityType::Tims)
    }
}

impl Display for MobilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The minimal read-only view of a spectrum a trace needs.
pub trait SpectrumLike: Debug + Send + Sync {
    /// The position of this spectrum in acquisition order. Unique within a run,
    /// or for mobility scans, within a frame.
    fn index(&self) -> usize;

    fn retention_time(&self) -> f64;

    fn ms_level(&self) -> u8;

    /// The total ion current of this spectrum
    fn tic(&self) -> f64;

    fn mobility(&self) -> Option<f64> {
        None
    }
}

/// A single mass spectrum acquired at one retention time
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub index: usize,
    pub retention_time: f64,
    pub ms_level: u8,
    pub tic: f64,
}

impl Scan {
    pub fn new(index: usize, retention_time: f64, ms_level: u8, tic: f64) -> Self {
        Self {
            index,
            retention_time,
            ms_level,
            tic,
        }
    }
}

impl SpectrumLike for Scan {
    fn index(&self) -> usize {
        self.index
    }

    fn retention_time(&self) -> f64 {
        self.retention_time
    }

    fn ms_level(&self) -> u8 {
        self.ms_level
    }

    fn tic(&self) -> f64 {
        self.tic
    }
}

/// One sub-spectrum of a [`Frame`] at a specific mobility.
///
/// `index` is the mobility scan number within the frame, `frame_index` the index of the
/// owning frame in the run.
#[derive(Debug, Clone, PartialEq)]
pub struct MobilityScan {
    pub frame_index: usize,
    pub index: usize,
    pub mobility: f64,
    pub retention_time: f64,
    pub ms_level: u8,
    pub tic: f64,
}

impl SpectrumLike for MobilityScan {
    fn index(&self) -> usize {
        self.index
    }

    fn retention_time(&self) -> f64 {
        self.retention_time
    }

    fn ms_level(&self) -> u8 {
        self.ms_level
    }

    fn tic(&self) -> f64 {
        self.tic
    }

    fn mobility(&self) -> Option<f64> {
        Some(self.mobility)
    }
}

/// An ion mobility "super-scan" made up of many [`MobilityScan`]s
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub retention_time: f64,
    pub ms_level: u8,
    pub tic: f64,
    pub mobility_type: MobilityType,
    mobility_scans: Vec<Arc<MobilityScan>>,
}

impl Frame {
    /// Create a frame with one mobility scan per entry of `mobilities`, numbered in the
    /// order given.
    pub fn new(
        index: usize,
        retention_time: f64,
        ms_level: u8,
        tic: f64,
        mobility_type: MobilityType,
        mobilities: &[f64],
    ) -> Self {
        let mobility_scans = mobilities
            .iter()
            .enumerate()
            .map(|(i, mobility)| {
                Arc::new(MobilityScan {
                    frame_index: index,
                    index: i,
                    mobility: *mobility,
                    retention_time,
                    ms_level,
                    tic: 0.0,
                })
            })
            .collect();
        Self {
            index,
            retention_time,
            ms_level,
            tic,
            mobility_type,
            mobility_scans,
        }
    }

    pub fn mobility_scans(&self) -> &[Arc<MobilityScan>] {
        &self.mobility_scans
    }

    pub fn mobility_scan(&self, index: usize) -> Option<&Arc<MobilityScan>> {
        self.mobility_scans.get(index)
    }

    pub fn num_mobility_scans(&self) -> usize {
        self.mobility_scans.len()
    }

    pub fn iter_mobilities(&self) -> impl Iterator<Item = f64> + '_ {
        self.mobility_scans.iter().map(|s| s.mobility)
    }

    /// The lowest and highest mobility in this frame, if it has any mobility scans
    pub fn mobility_bounds(&self) -> Option<(f64, f64)> {
        self.iter_mobilities().fold(None, |acc, m| match acc {
            None => Some((m, m)),
            Some((lo, hi)) => Some((lo.min(m), hi.max(m))),
        })
    }
}

impl SpectrumLike for Frame {
    fn index(&self) -> usize {
        self.index
    }

    fn retention_time(&self) -> f64 {
        self.retention_time
    }

    fn ms_level(&self) -> u8 {
        self.ms_level
    }

    fn tic(&self) -> f64 {
        self.tic
    }
}

/// Check that `spectra` are in strictly ascending acquisition order
pub(crate) fn check_ordered<S: SpectrumLike>(spectra: &[Arc<S>]) -> Result<(), TraceError> {
    for (prev, next) in spectra.iter().zip(spectra.iter().skip(1)) {
        if prev.index() >= next.index() {
            return Err(TraceError::UnorderedSpectra {
                previous: prev.index(),
                next: next.index(),
            });
        }
    }
    Ok(())
}

/// Locate `spectrum` in an acquisition-ordered list.
///
/// The candidate at the matching index must either be the same allocation or have the
/// same retention time, otherwise `spectrum` comes from a different run.
/// Whether `a` and `b` denote the same spectrum of the same run. A shared index alone is
/// not enough, the handles must be identical or agree on retention time too.
pub(crate) fn same_spectrum<S: SpectrumLike>(a: &S, b: &S) -> bool {
    a.index() == b.index()
        && (std::ptr::eq(a, b) || a.retention_time() == b.retention_time())
}

pub(crate) fn find_spectrum<S: SpectrumLike>(spectra: &[Arc<S>], spectrum: &S) -> Option<usize> {
    let i = spectra
        .binary_search_by(|s| s.index().cmp(&spectrum.index()))
        .ok()?;
    same_spectrum(spectra[i].as_ref(), spectrum).then_some(i)
}
