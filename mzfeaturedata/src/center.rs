//! Strategies for reducing paired value/weight arrays to one representative value.
use std::fmt::Display;

use itertools::Itertools;

/// How the weighted values are aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CenterMeasure {
    #[default]
    Avg,
    Median,
}

/// How raw weights (usually intensities) are transformed before aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Weighting {
    /// Every value counts the same
    None,
    #[default]
    Linear,
    /// `log10(w)`, weights below one count for nothing
    Log10,
    Sqrt,
}

impl Weighting {
    pub fn transform(&self, weight: f64) -> f64 {
        match self {
            Weighting::None => 1.0,
            Weighting::Linear => weight,
            Weighting::Log10 => weight.log10().max(0.0),
            Weighting::Sqrt => weight.sqrt(),
        }
    }
}

/// A pluggable policy computing one representative value from `values` weighted by
/// `weights`.
///
/// Implemented by [`CenterFunction`] and by any `Fn(&[f64], &[f64]) -> Option<f64>`.
/// Implementations return `None` when no value carries weight.
pub trait CenterEstimator {
    fn center(&self, values: &[f64], weights: &[f64]) -> Option<f64>;
}

impl<F> CenterEstimator for F
where
    F: Fn(&[f64], &[f64]) -> Option<f64>,
{
    fn center(&self, values: &[f64], weights: &[f64]) -> Option<f64> {
        (self)(values, weights)
    }
}

/// A [`CenterMeasure`] combined with a [`Weighting`].
///
/// The default is the intensity-weighted arithmetic mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CenterFunction {
    pub measure: CenterMeasure,
    pub weighting: Weighting,
}

impl CenterFunction {
    pub fn new(measure: CenterMeasure, weighting: Weighting) -> Self {
        Self { measure, weighting }
    }

    fn weighted_mean(&self, values: &[f64], weights: &[f64]) -> Option<f64> {
        let (acc, total) = values
            .iter()
            .zip(weights)
            .map(|(v, w)| (*v, self.weighting.transform(*w)))
            .fold((0.0, 0.0), |(acc, total), (v, w)| (acc + v * w, total + w));
        (total > 0.0).then(|| acc / total)
    }

    fn weighted_median(&self, values: &[f64], weights: &[f64]) -> Option<f64> {
        let pairs = values
            .iter()
            .zip(weights)
            .map(|(v, w)| (*v, self.weighting.transform(*w)))
            .filter(|(_, w)| *w > 0.0)
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .collect_vec();
        let half = pairs.iter().map(|(_, w)| w).sum::<f64>() / 2.0;
        let mut cumulative = 0.0;
        for (v, w) in pairs.iter() {
            cumulative += w;
            if cumulative >= half {
                return Some(*v);
            }
        }
        None
    }
}

impl CenterEstimator for CenterFunction {
    fn center(&self, values: &[f64], weights: &[f64]) -> Option<f64> {
        match self.measure {
            CenterMeasure::Avg => self.weighted_mean(values, weights),
            CenterMeasure::Median => self.weighted_median(values, weights),
        }
    }
}

impl Display for CenterFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({:?} weighting)", self.measure, self.weighting)
    }
}
