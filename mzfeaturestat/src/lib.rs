mod args;
mod document;
mod driver;
mod progress;
mod time_range;
mod write;

pub use args::*;
pub use document::{
    DocumentError, FeatureRecord, FrameRecord, InputDocument, MobilityTypeRecord,
    MobilogramRecord, Run, ScanRecord, SummedRecord, TraceRecord,
};
pub use driver::{FeatureStatError, MZFeatureStat};
pub use progress::ProgressRecord;
pub use time_range::{TimeRange, TimeRangeParseError};
pub use write::{write_reports, FeatureReport};
