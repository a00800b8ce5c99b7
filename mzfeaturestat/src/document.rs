//! The serialized form of a run's spectra and its feature traces.
//!
//! Traces are stored as spectrum index lists plus value lists. They are rebuilt through
//! the validating constructors of [`mzfeaturedata`], so a malformed document surfaces as
//! a [`DocumentError`] for the offending feature instead of a broken trace.
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use mzfeaturedata::{
    Acquisition, FeatureData, Frame, IonMobilityTrace, IonTimeTrace, MemoryMapStorage,
    MobilityScan, MobilityType, MobilogramBinning, MobilogramTimeTrace, Scan, SpectrumLike,
    SummedMobilogram, TraceError,
};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Scan {0} is not part of the run")]
    UnknownScan(usize),
    #[error("Frame {0} is not part of the run")]
    UnknownFrame(usize),
    #[error("Frame {frame} has no mobility scan {scan}")]
    UnknownMobilityScan { frame: usize, scan: usize },
    #[error("Feature {0} holds mobilograms but the run has no frames with mobility data")]
    MissingMobilityData(String),
    #[error("Feature {id} could not be rebuilt: {source}")]
    InvalidTrace {
        id: String,
        #[source]
        source: TraceError,
    },
}

fn default_ms_level() -> u8 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub index: usize,
    pub rt: f64,
    #[serde(default = "default_ms_level")]
    pub ms_level: u8,
    #[serde(default)]
    pub tic: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MobilityTypeRecord {
    #[default]
    None,
    Tims,
    DriftTube,
    TravelingWave,
    Faims,
    Other,
}

impl From<MobilityTypeRecord> for MobilityType {
    fn from(value: MobilityTypeRecord) -> Self {
        match value {
            MobilityTypeRecord::None => MobilityType::None,
            MobilityTypeRecord::Tims => MobilityType::Tims,
            MobilityTypeRecord::DriftTube => MobilityType::DriftTube,
            MobilityTypeRecord::TravelingWave => MobilityType::TravelingWave,
            MobilityTypeRecord::Faims => MobilityType::Faims,
            MobilityTypeRecord::Other => MobilityType::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub index: usize,
    pub rt: f64,
    #[serde(default = "default_ms_level")]
    pub ms_level: u8,
    #[serde(default)]
    pub tic: f64,
    #[serde(default)]
    pub mobility_type: MobilityTypeRecord,
    /// The mobility of each mobility scan, in acquisition order
    pub mobilities: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobilogramRecord {
    pub mobility_scans: Vec<usize>,
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummedRecord {
    pub mobility: Vec<f64>,
    pub intensity: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TraceRecord {
    Chromatogram {
        scans: Vec<usize>,
        mz: Vec<f64>,
        intensity: Vec<f64>,
    },
    Mobilogram {
        frames: Vec<usize>,
        mobilograms: Vec<MobilogramRecord>,
        #[serde(default)]
        summed: Option<SummedRecord>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: String,
    #[serde(default)]
    pub imaging: bool,
    #[serde(flatten)]
    pub trace: TraceRecord,
}

impl FeatureRecord {
    pub fn acquisition(&self) -> Acquisition {
        if self.imaging {
            Acquisition::Imaging
        } else {
            Acquisition::Chromatography
        }
    }

    fn invalid(&self, source: TraceError) -> DocumentError {
        DocumentError::InvalidTrace {
            id: self.id.clone(),
            source,
        }
    }

    /// Rebuild a chromatogram, failing if this record holds mobilograms
    pub fn build_chromatogram(
        &self,
        run: &Run,
        storage: Option<&MemoryMapStorage>,
    ) -> Result<Option<IonTimeTrace>, DocumentError> {
        match &self.trace {
            TraceRecord::Chromatogram {
                scans,
                mz,
                intensity,
            } => {
                let spectra = run.scans_for(scans)?;
                IonTimeTrace::new(storage, mz.clone(), intensity.clone(), spectra)
                    .map(Some)
                    .map_err(|e| self.invalid(e))
            }
            TraceRecord::Mobilogram { .. } => Ok(None),
        }
    }

    /// Rebuild a mobility-resolved trace. A stored summed distribution is used as is,
    /// otherwise it is binned with `binning`.
    pub fn build_mobilogram(
        &self,
        run: &Run,
        storage: Option<&MemoryMapStorage>,
        binning: Option<&mut MobilogramBinning>,
    ) -> Result<Option<MobilogramTimeTrace>, DocumentError> {
        let TraceRecord::Mobilogram {
            frames,
            mobilograms,
            summed,
        } = &self.trace
        else {
            return Ok(None);
        };

        let frames = run.frames_for(frames)?;
        if mobilograms.len() != frames.len() {
            return Err(self.invalid(TraceError::LengthMismatch {
                what: "mobilograms",
                expected: frames.len(),
                actual: mobilograms.len(),
            }));
        }
        let mut traces = Vec::with_capacity(mobilograms.len());
        for (frame, record) in frames.iter().zip(mobilograms) {
            let scans = record
                .mobility_scans
                .iter()
                .map(|i| {
                    frame
                        .mobility_scan(*i)
                        .cloned()
                        .ok_or(DocumentError::UnknownMobilityScan {
                            frame: frame.index,
                            scan: *i,
                        })
                })
                .collect::<Result<Vec<Arc<MobilityScan>>, _>>()?;
            let trace = IonMobilityTrace::new(
                storage,
                record.mz.clone(),
                record.intensity.clone(),
                scans,
            )
            .map_err(|e| self.invalid(e))?;
            traces.push(trace);
        }

        let trace = match (summed, binning) {
            (Some(summed), _) => {
                let summed = SummedMobilogram::new(
                    storage,
                    summed.mobility.clone(),
                    summed.intensity.clone(),
                )
                .map_err(|e| self.invalid(e))?;
                MobilogramTimeTrace::with_summed(storage, frames, traces, summed)
            }
            (None, Some(binning)) => MobilogramTimeTrace::new(storage, frames, traces, binning),
            (None, None) => return Err(DocumentError::MissingMobilityData(self.id.clone())),
        };
        trace.map(Some).map_err(|e| self.invalid(e))
    }

    /// Rebuild whichever trace this record holds
    pub fn build(
        &self,
        run: &Run,
        storage: Option<&MemoryMapStorage>,
        binning: Option<&mut MobilogramBinning>,
    ) -> Result<FeatureData, DocumentError> {
        if let Some(trace) = self.build_chromatogram(run, storage)? {
            return Ok(trace.into());
        }
        match self.build_mobilogram(run, storage, binning)? {
            Some(trace) => Ok(trace.into()),
            None => Err(DocumentError::MissingMobilityData(self.id.clone())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputDocument {
    #[serde(default)]
    pub scans: Vec<ScanRecord>,
    #[serde(default)]
    pub frames: Vec<FrameRecord>,
    pub features: Vec<FeatureRecord>,
}

/// The spectra of a run, shared by every feature rebuilt from it
#[derive(Debug, Default)]
pub struct Run {
    scans: Vec<Arc<Scan>>,
    scan_positions: HashMap<usize, usize>,
    frames: Vec<Arc<Frame>>,
    frame_positions: HashMap<usize, usize>,
}

impl Run {
    pub fn new(scans: &[ScanRecord], frames: &[FrameRecord]) -> Self {
        let mut scans: Vec<_> = scans
            .iter()
            .map(|s| Arc::new(Scan::new(s.index, s.rt, s.ms_level, s.tic)))
            .collect();
        scans.sort_by_key(|s| s.index);
        let mut frames: Vec<_> = frames
            .iter()
            .map(|f| {
                Arc::new(Frame::new(
                    f.index,
                    f.rt,
                    f.ms_level,
                    f.tic,
                    f.mobility_type.into(),
                    &f.mobilities,
                ))
            })
            .collect();
        frames.sort_by_key(|f| f.index);

        let scan_positions = scans.iter().enumerate().map(|(i, s)| (s.index, i)).collect();
        let frame_positions = frames.iter().enumerate().map(|(i, f)| (f.index, i)).collect();
        Self {
            scans,
            scan_positions,
            frames,
            frame_positions,
        }
    }

    pub fn scans(&self) -> &[Arc<Scan>] {
        &self.scans
    }

    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    pub fn scans_for(&self, indices: &[usize]) -> Result<Vec<Arc<Scan>>, DocumentError> {
        indices
            .iter()
            .map(|i| {
                self.scan_positions
                    .get(i)
                    .map(|p| self.scans[*p].clone())
                    .ok_or(DocumentError::UnknownScan(*i))
            })
            .collect()
    }

    pub fn frames_for(&self, indices: &[usize]) -> Result<Vec<Arc<Frame>>, DocumentError> {
        indices
            .iter()
            .map(|i| {
                self.frame_positions
                    .get(i)
                    .map(|p| self.frames[*p].clone())
                    .ok_or(DocumentError::UnknownFrame(*i))
            })
            .collect()
    }

    /// Every scan of `first`'s MS level acquired between `first` and `last`, inclusive
    pub fn scans_between(&self, first: &Scan, last: &Scan) -> Vec<Arc<Scan>> {
        let (Some(start), Some(end)) = (
            self.scan_positions.get(&first.index),
            self.scan_positions.get(&last.index),
        ) else {
            return Vec::new();
        };
        self.scans[*start..=*end]
            .iter()
            .filter(|s| s.ms_level() == first.ms_level())
            .cloned()
            .collect()
    }

    /// A binning accessor for this run's frames, or `None` if the run has no mobility
    /// data. Without an explicit `bin_width`, the width recommended for the middle frame
    /// is used.
    pub fn make_binning(
        &self,
        bin_width: Option<usize>,
    ) -> Result<Option<MobilogramBinning>, TraceError> {
        let Some(middle) = self.frames.get(self.frames.len() / 2) else {
            return Ok(None);
        };
        let bin_width =
            bin_width.unwrap_or_else(|| MobilogramBinning::recommended_bin_width(middle));
        debug!("Binning mobilograms {bin_width} mobility scans at a time");
        match MobilogramBinning::new(&self.frames, bin_width) {
            Ok(binning) => Ok(Some(binning)),
            Err(TraceError::NoMobilityData) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
