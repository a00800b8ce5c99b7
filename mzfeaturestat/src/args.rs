use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use mzfeaturedata::{CenterFunction, CenterMeasure, Weighting};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgCenterMeasure {
    #[default]
    /// The weighted arithmetic mean
    Avg,
    /// The weighted median
    Median,
}

impl From<ArgCenterMeasure> for CenterMeasure {
    fn from(value: ArgCenterMeasure) -> Self {
        match value {
            ArgCenterMeasure::Avg => CenterMeasure::Avg,
            ArgCenterMeasure::Median => CenterMeasure::Median,
        }
    }
}

impl Display for ArgCenterMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgWeighting {
    /// Every point counts the same
    None,
    #[default]
    /// Weight by intensity
    Linear,
    /// Weight by the base 10 logarithm of intensity
    Log10,
    /// Weight by the square root of intensity
    Sqrt,
}

impl From<ArgWeighting> for Weighting {
    fn from(value: ArgWeighting) -> Self {
        match value {
            ArgWeighting::None => Weighting::None,
            ArgWeighting::Linear => Weighting::Linear,
            ArgWeighting::Log10 => Weighting::Log10,
            ArgWeighting::Sqrt => Weighting::Sqrt,
        }
    }
}

impl Display for ArgWeighting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub fn make_center_function(measure: ArgCenterMeasure, weighting: ArgWeighting) -> CenterFunction {
    CenterFunction::new(measure.into(), weighting.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    /// One JSON object per line
    JsonLines,
    /// A single pretty-printed JSON array
    Json,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub(crate) fn positive_bin_width(s: &str) -> Result<usize, String> {
    let value = s.parse::<usize>().map_err(|e| e.to_string())?;
    if value < 1 {
        Err(format!("`{s}` is not a positive bin width"))
    } else {
        Ok(value)
    }
}
