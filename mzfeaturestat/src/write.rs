use std::io::{self, Write};

use serde::Serialize;

use mzfeaturedata::metrics::mobility_fwhm;
use mzfeaturedata::{
    Acquisition, Feature, FeatureData, SmallestMzDelta, Track, ValueRange,
};

use crate::args::OutputFormat;

fn as_pair(range: Option<ValueRange>) -> Option<[f64; 2]> {
    range.map(|r| [r.start, r.end])
}

/// The attributes derived for one input feature, as written to the output stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureReport {
    pub id: String,
    pub kind: &'static str,
    pub acquisition: &'static str,
    pub points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mz_range: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smallest_mz_delta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity_range: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rt_range: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representative_spectrum: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobility: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobility_range: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobility_fwhm: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobility_unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fwhm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tailing_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asymmetry_factor: Option<f64>,
}

impl FeatureReport {
    pub fn new(id: impl Into<String>, feature: &Feature) -> Self {
        let attrs = feature.attributes();
        let data = feature.data();
        let kind = match data {
            FeatureData::Chromatogram(_) => "chromatogram",
            FeatureData::Mobilogram(_) => "mobilogram",
        };
        let acquisition = match feature.acquisition() {
            Acquisition::Chromatography => "chromatography",
            Acquisition::Imaging => "imaging",
        };
        Self {
            id: id.into(),
            kind,
            acquisition,
            points: data.value_count(),
            area: attrs.area,
            height: attrs.height,
            mz: attrs.mz,
            mz_range: as_pair(attrs.mz_range),
            smallest_mz_delta: data.smallest_mz_delta(),
            intensity_range: as_pair(attrs.intensity_range),
            rt: attrs.rt,
            rt_range: as_pair(attrs.rt_range),
            representative_spectrum: attrs.representative_spectrum.as_ref().map(|s| s.index()),
            mobility: attrs.mobility,
            mobility_range: as_pair(attrs.mobility_range),
            mobility_fwhm: as_pair(
                data.as_mobilogram()
                    .and_then(|m| mobility_fwhm(m.summed_mobility_distribution())),
            ),
            mobility_unit: attrs.mobility_unit,
            fwhm: attrs.fwhm,
            tailing_factor: attrs.tailing_factor,
            asymmetry_factor: attrs.asymmetry_factor,
        }
    }
}

/// Write `reports` to `writer` in `format`, flushing when done
pub fn write_reports<W: Write>(
    mut writer: W,
    reports: &[FeatureReport],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::JsonLines => {
            for report in reports {
                serde_json::to_writer(&mut writer, report)?;
                writer.write_all(b"\n")?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, reports)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use mzfeaturedata::{IonTimeTrace, Scan};

    use super::*;

    fn make_feature(acquisition: Acquisition) -> Feature {
        let scans = (0..3)
            .map(|i| Arc::new(Scan::new(i, 10.0 + i as f64, 1, 1e3)))
            .collect();
        let trace = IonTimeTrace::new(
            None,
            vec![500.0, 500.0, 500.0],
            vec![0.0, 50.0, 0.0],
            scans,
        )
        .unwrap();
        Feature::new(trace, acquisition)
    }

    #[test]
    fn test_report() {
        let report = FeatureReport::new("f", &make_feature(Acquisition::Chromatography));
        assert_eq!(report.kind, "chromatogram");
        assert_eq!(report.points, 3);
        assert_eq!(report.area, Some(50.0));
        assert_eq!(report.rt_range, Some([10.0, 12.0]));
        assert_eq!(report.representative_spectrum, Some(1));
        assert!(report.mobility.is_none());

        let report = FeatureReport::new("g", &make_feature(Acquisition::Imaging));
        assert_eq!(report.acquisition, "imaging");
        assert!(report.rt.is_none());
    }

    #[test]
    fn test_write_json_lines() -> io::Result<()> {
        let reports = vec![
            FeatureReport::new("a", &make_feature(Acquisition::Chromatography)),
            FeatureReport::new("b", &make_feature(Acquisition::Imaging)),
        ];
        let mut buffer = Vec::new();
        write_reports(&mut buffer, &reports, OutputFormat::JsonLines)?;
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0])?;
        assert_eq!(first["id"], "a");
        assert_eq!(first["mz"], 500.0);
        let second: serde_json::Value = serde_json::from_str(lines[1])?;
        assert!(second.get("rt").is_none());

        let mut buffer = Vec::new();
        write_reports(&mut buffer, &reports, OutputFormat::Json)?;
        let all: serde_json::Value = serde_json::from_slice(&buffer)?;
        assert_eq!(all.as_array().map(|a| a.len()), Some(2));
        Ok(())
    }
}
