//! Signal traces of detected LC/IMS-MS features and the attributes derived from them.
//!
//! A feature holds exactly one trace. Chromatographic features hold an [`IonTimeTrace`],
//! features acquired with ion mobility separation hold a [`MobilogramTimeTrace`] that
//! additionally keeps one [`IonMobilityTrace`] per frame. Traces are immutable once built.
//! Every transformation (subsetting, replacing values, remapping) produces a new trace,
//! optionally placing its buffers in a [`MemoryMapStorage`] arena.
//!
//! The [`metrics`] and [`quality`] modules compute feature attributes from any type
//! implementing the capability traits in [`tracks`].
pub mod center;
pub mod error;
pub mod feature;
pub mod ion_trace;
pub mod metrics;
pub mod mobility;
pub mod mobilogram_trace;
pub mod quality;
pub mod remap;
pub mod spectrum;
pub mod spectrum_trace;
pub mod storage;
pub mod tracks;

pub use crate::center::{CenterEstimator, CenterFunction, CenterMeasure, Weighting};
pub use crate::error::TraceError;
pub use crate::feature::{
    recompute_derived_attributes, Acquisition, Feature, FeatureAttributes, FeatureData,
    RecomputeParams,
};
pub use crate::ion_trace::IonTrace;
pub use crate::metrics::{SmallestMzDelta, ValueRange};
pub use crate::mobility::{MobilogramBinning, SummedMobilogram};
pub use crate::mobilogram_trace::MobilogramTimeTrace;
pub use crate::remap::{normalize_to_average_tic, remap_into, remap_onto_axis};
pub use crate::spectrum::{Frame, MobilityScan, MobilityType, Scan, SpectrumLike};
pub use crate::spectrum_trace::{IonMobilityTrace, IonTimeTrace, SpectrumTrace};
pub use crate::storage::{DoubleBuffer, MemoryMapStorage};
pub use crate::tracks::{IntensityTrack, MobilityTrack, MzTrack, TimeTrack, Track};
