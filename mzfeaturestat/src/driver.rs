use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use clap::Parser;
use serde::{Deserialize, Serialize};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;

use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use mzfeaturedata::{
    normalize_to_average_tic, remap_onto_axis, Feature, FeatureData, IonTimeTrace,
    MemoryMapStorage, MobilogramBinning, RecomputeParams, TraceError, Track,
};

use crate::args::{
    make_center_function, positive_bin_width, ArgCenterMeasure, ArgWeighting, OutputFormat,
};
use crate::document::{DocumentError, FeatureRecord, InputDocument, Run};
use crate::progress::ProgressRecord;
use crate::time_range::TimeRange;
use crate::write::{write_reports, FeatureReport};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum FeatureStatError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("The input document could not be parsed: {0}")]
    DocumentParseError(
        #[source]
        #[from]
        serde_json::Error,
    ),
    #[error("The configuration could not be loaded: {0}")]
    ConfigurationError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("The run's mobility axis could not be built: {0}")]
    TraceError(
        #[source]
        #[from]
        TraceError,
    ),
    #[error("Failed to create a thread pool: {0}")]
    ThreadPoolError(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
}

/// Recompute the derived attributes of LC-MS and IMS-MS features.
///
/// Read a JSON document of spectra and feature traces from a file or stream, rebuild
/// each trace, and write one attribute report per feature.
#[derive(Parser, Debug, Clone, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZFeatureStat {
    /// The path to read the input document from, or if '-' is passed, read from STDIN.
    ///
    /// Gzip compressed input is detected automatically.
    #[arg()]
    pub input_file: String,

    /// The path to write the reports to, or if '-' is passed, write to STDOUT.
    ///
    /// Paths ending in `.gz` are gzip compressed.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzfeaturestat.toml` in the working directory.
    /// Environment variables prefixed with `MZFEATURESTAT_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    pub threads: i32,

    /// The retention time range to report features from, denoted (start?)-(stop?)
    #[arg(
        short='r',
        long="time-range",
        value_parser=TimeRange::from_str,
        value_name="BEGIN-END",
        long_help=r#"The retention time range to report features from, denoted (start?)-(stop?)

A feature is kept when its apex falls within the range. Imaging features have no
retention time and are always kept.
"#
    )]
    pub time_range: Option<TimeRange>,

    /// How to estimate the m/z of a feature from its points
    #[arg(short = 'c', long = "center-measure", default_value = "avg")]
    #[serde(default)]
    pub center_measure: ArgCenterMeasure,

    /// How to weight each point's intensity when estimating the m/z of a feature
    #[arg(short = 'w', long = "weighting", default_value = "linear")]
    #[serde(default)]
    pub weighting: ArgWeighting,

    /// Skip the FWHM, tailing and asymmetry factor computations
    #[arg(long = "no-quality")]
    #[serde(default)]
    pub no_quality: bool,

    /// The number of mobility scans pooled into one mobility bin.
    ///
    /// Defaults to a width suited to the run's mobility acquisition type.
    #[arg(short = 'b', long = "mobility-bin-width", value_parser = positive_bin_width)]
    pub mobility_bin_width: Option<usize>,

    /// Project each chromatogram onto every scan of its MS level in its time window
    /// before computing attributes, padding missed scans with zero intensity
    #[arg(short = 'g', long = "fill-gaps")]
    #[serde(default)]
    pub fill_gaps: bool,

    /// Normalize chromatogram intensities to the average TIC of their time window
    #[arg(short = 'n', long = "normalize-tic")]
    #[serde(default)]
    pub normalize_tic: bool,

    /// Place rebuilt traces in anonymous memory maps instead of the heap
    #[arg(short = 'm', long = "memory-map")]
    #[serde(default)]
    pub memory_map: bool,

    /// The layout of the written reports
    #[arg(short = 'f', long = "output-format", default_value = "json-lines")]
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl MZFeatureStat {
    /// Layer `mzfeaturestat.toml` or `--config-file`, then `MZFEATURESTAT_` environment
    /// variables over these arguments
    pub fn configure(self) -> Result<Self, FeatureStatError> {
        let mut figment = Figment::new().merge(Serialized::defaults(&self));
        figment = match self.config_file.as_deref() {
            Some(path) => figment.merge(Toml::file_exact(path)),
            None => figment.merge(Toml::file("mzfeaturestat.toml")),
        };
        let config = figment
            .merge(Env::prefixed("MZFEATURESTAT_"))
            .extract()?;
        Ok(config)
    }

    fn create_threadpool(&self) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };
        debug!("Using {} cores", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
    }

    fn recompute_params(&self) -> RecomputeParams {
        RecomputeParams {
            center: make_center_function(self.center_measure, self.weighting),
            compute_quality: !self.no_quality,
        }
    }

    pub fn main(&self) -> Result<(), FeatureStatError> {
        info!(
            "mzfeaturestat v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("?")
        );
        info!("Input: {}", self.input_file);
        info!("Output: {}", self.output_file.display());
        if let Ok(config) = toml::to_string(self) {
            debug!("Configuration:\n{config}");
        }

        let pool = self.create_threadpool()?;
        let start = Instant::now();
        let document = self.read_document()?;
        let (reports, prog) = pool.install(|| self.run_workflow(&document))?;

        info!("Features: {}", prog.features());
        info!(
            "Chromatograms: {} | Mobilograms: {}",
            prog.chromatograms, prog.mobilograms
        );
        info!("Points: {}", prog.points);
        if prog.gap_filled > 0 {
            info!("Gap Filled Points: {}", prog.gap_filled);
        }
        if prog.out_of_range > 0 {
            info!("Outside Time Range: {}", prog.out_of_range);
        }
        if prog.failed > 0 {
            warn!("Failed Features: {}", prog.failed);
        }

        self.write_output(&reports)?;
        info!("Elapsed Time: {:0.3?}", start.elapsed());
        Ok(())
    }

    fn open_input(&self) -> io::Result<Box<dyn BufRead>> {
        let mut handle: Box<dyn BufRead> = if self.input_file == "-" {
            Box::new(io::BufReader::new(io::stdin()))
        } else {
            Box::new(io::BufReader::new(fs::File::open(&self.input_file)?))
        };
        let compressed = handle.fill_buf()?.starts_with(&GZIP_MAGIC);
        debug!("Input compressed? {compressed}");
        if compressed {
            Ok(Box::new(io::BufReader::new(MultiGzDecoder::new(handle))))
        } else {
            Ok(handle)
        }
    }

    pub fn read_document(&self) -> Result<InputDocument, FeatureStatError> {
        let document: InputDocument = serde_json::from_reader(self.open_input()?)?;
        debug!(
            "Read {} scans, {} frames and {} features",
            document.scans.len(),
            document.frames.len(),
            document.features.len()
        );
        Ok(document)
    }

    /// Rebuild and measure every feature of `document`, in parallel on the current
    /// thread pool. Reports are returned in input order.
    pub fn run_workflow(
        &self,
        document: &InputDocument,
    ) -> Result<(Vec<FeatureReport>, ProgressRecord), FeatureStatError> {
        let run = Run::new(&document.scans, &document.frames);
        let binning = run.make_binning(self.mobility_bin_width)?;
        if let Some(binning) = binning.as_ref() {
            debug!(
                "{} mobility bins of width {}",
                binning.bin_centers().len(),
                binning.bin_width()
            );
        }
        let storage = self.memory_map.then(MemoryMapStorage::new);
        let params = self.recompute_params();

        let (reports, progress): (Vec<_>, Vec<_>) = document
            .features
            .par_iter()
            .map_init(
                || binning.clone(),
                |binning, record| {
                    self.process_feature(&run, storage.as_ref(), binning.as_mut(), &params, record)
                },
            )
            .unzip();

        if let Some(storage) = storage.as_ref() {
            debug!(
                "Mapped {} regions totalling {} bytes",
                storage.region_count(),
                storage.mapped_bytes()
            );
        }
        let prog: ProgressRecord = progress.into_iter().sum();
        let reports = reports.into_iter().flatten().collect();
        Ok((reports, prog))
    }

    fn process_feature(
        &self,
        run: &Run,
        storage: Option<&MemoryMapStorage>,
        binning: Option<&mut MobilogramBinning>,
        params: &RecomputeParams,
        record: &FeatureRecord,
    ) -> (Option<FeatureReport>, ProgressRecord) {
        let mut prog = ProgressRecord::default();
        match self.build_feature(run, storage, binning, params, record, &mut prog) {
            Ok(feature) => {
                let rt = feature.attributes().rt;
                if let (Some(range), Some(rt)) = (self.time_range, rt) {
                    if !range.contains(rt) {
                        prog.out_of_range += 1;
                        return (None, prog);
                    }
                }
                prog.points += feature.data().value_count();
                match feature.data() {
                    FeatureData::Chromatogram(_) => prog.chromatograms += 1,
                    FeatureData::Mobilogram(_) => prog.mobilograms += 1,
                }
                (Some(FeatureReport::new(record.id.as_str(), &feature)), prog)
            }
            Err(e) => {
                warn!("Skipping feature: {e}");
                prog.failed += 1;
                (None, prog)
            }
        }
    }

    fn build_feature(
        &self,
        run: &Run,
        storage: Option<&MemoryMapStorage>,
        binning: Option<&mut MobilogramBinning>,
        params: &RecomputeParams,
        record: &FeatureRecord,
        prog: &mut ProgressRecord,
    ) -> Result<Feature, DocumentError> {
        let data = match record.build(run, storage, binning)? {
            FeatureData::Chromatogram(trace) => self
                .prepare_chromatogram(run, storage, trace, prog)
                .map_err(|source| DocumentError::InvalidTrace {
                    id: record.id.clone(),
                    source,
                })?
                .into(),
            data => data,
        };
        Ok(Feature::with_params(data, record.acquisition(), params))
    }

    fn prepare_chromatogram(
        &self,
        run: &Run,
        storage: Option<&MemoryMapStorage>,
        mut trace: IonTimeTrace,
        prog: &mut ProgressRecord,
    ) -> Result<IonTimeTrace, TraceError> {
        if self.fill_gaps {
            let axis = match (trace.spectra().first(), trace.spectra().last()) {
                (Some(first), Some(last)) => run.scans_between(first, last),
                _ => Vec::new(),
            };
            if axis.len() > trace.len() {
                prog.gap_filled += axis.len() - trace.len();
                trace = remap_onto_axis(&trace, &axis, storage)?;
            }
        }
        if self.normalize_tic {
            trace = normalize_to_average_tic(&trace, storage)?;
        }
        Ok(trace)
    }

    fn write_output(&self, reports: &[FeatureReport]) -> io::Result<()> {
        if self.output_file == Path::new("-") {
            write_reports(io::stdout().lock(), reports, self.output_format)
        } else {
            let handle = io::BufWriter::new(fs::File::create(&self.output_file)?);
            let compressed = self
                .output_file
                .extension()
                .is_some_and(|ext| ext == "gz");
            if compressed {
                let mut encoder = GzEncoder::new(handle, Compression::best());
                write_reports(&mut encoder, reports, self.output_format)?;
                encoder.finish()?.flush()
            } else {
                write_reports(handle, reports, self.output_format)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DOCUMENT: &str = r#"{
        "scans": [
            {"index": 0, "rt": 10.0, "tic": 100.0},
            {"index": 1, "rt": 11.0, "tic": 200.0},
            {"index": 2, "rt": 12.0, "tic": 100.0},
            {"index": 3, "rt": 13.0, "tic": 100.0}
        ],
        "features": [
            {"id": "early", "kind": "chromatogram", "scans": [0, 2], "mz": [300.0, 300.0], "intensity": [40.0, 40.0]},
            {"id": "late", "kind": "chromatogram", "scans": [1, 2, 3], "mz": [0.0, 500.0, 0.0], "intensity": [0.0, 80.0, 0.0]},
            {"id": "broken", "kind": "chromatogram", "scans": [3, 1], "mz": [1.0, 1.0], "intensity": [1.0, 1.0]}
        ]
    }"#;

    fn make_args(extra: &[&str]) -> MZFeatureStat {
        let mut args = vec!["mzfeaturestat", "-"];
        args.extend_from_slice(extra);
        MZFeatureStat::parse_from(args)
    }

    fn document() -> InputDocument {
        serde_json::from_str(DOCUMENT).unwrap()
    }

    #[test_log::test]
    fn test_workflow() -> Result<(), FeatureStatError> {
        let args = make_args(&["-t", "2"]);
        let (reports, prog) = args.run_workflow(&document())?;
        assert_eq!(prog.chromatograms, 2);
        assert_eq!(prog.failed, 1);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].id, "early");
        assert_eq!(reports[1].id, "late");
        assert_eq!(reports[1].rt, Some(12.0));
        assert_eq!(reports[1].fwhm, Some(1.0));
        Ok(())
    }

    #[test_log::test]
    fn test_workflow_time_range_and_gaps() -> Result<(), FeatureStatError> {
        let args = make_args(&["-r", "11.5-20", "--fill-gaps", "--no-quality", "-m"]);
        let (reports, prog) = args.run_workflow(&document())?;
        assert_eq!(prog.out_of_range, 1);
        assert_eq!(prog.gap_filled, 1);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].fwhm.is_none());
        Ok(())
    }

    #[test_log::test]
    fn test_workflow_gap_filled_area() -> Result<(), FeatureStatError> {
        let args = make_args(&["--fill-gaps"]);
        let (reports, _) = args.run_workflow(&document())?;
        // the filled zero at 11 minutes splits the plateau into two triangles
        assert_eq!(reports[0].points, 3);
        assert_eq!(reports[0].area, Some(40.0));
        Ok(())
    }

    #[test_log::test]
    fn test_workflow_normalize_tic() -> Result<(), FeatureStatError> {
        let args = make_args(&["--normalize-tic"]);
        let (reports, _) = args.run_workflow(&document())?;
        // average TIC of scans 1-3 is 400 / 3
        let expected = 80.0 * (400.0 / 3.0) / 100.0;
        let height = reports[1].height.unwrap();
        assert!((height - expected).abs() < 1e-9);
        Ok(())
    }
}
