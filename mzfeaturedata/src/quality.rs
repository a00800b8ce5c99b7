//! Peak shape quality metrics.
//!
//! All widths are measured on linearly interpolated flanks. Each metric is `None` when it
//! is undefined: fewer than three points, no positive apex, or a flank that never drops
//! below the threshold height.
use crate::tracks::{IntensityTrack, TimeTrack};

/// The points where the peak crosses `fraction` of its apex height
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PeakWidth {
    pub left: f64,
    pub apex: f64,
    pub right: f64,
}

impl PeakWidth {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn leading(&self) -> f64 {
        self.apex - self.left
    }

    pub fn trailing(&self) -> f64 {
        self.right - self.apex
    }
}

fn interpolate_x(x0: f64, y0: f64, x1: f64, y1: f64, y: f64) -> f64 {
    if y1 == y0 {
        return x0;
    }
    x0 + (y - y0) * (x1 - x0) / (y1 - y0)
}

pub(crate) fn width_at(x: &[f64], y: &[f64], fraction: f64) -> Option<PeakWidth> {
    if x.len() < 3 || x.len() != y.len() {
        return None;
    }
    let (apex, height) = y
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| *v > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))?;
    let threshold = height * fraction;

    let left_i = (0..apex).rev().find(|i| y[*i] < threshold)?;
    let right_i = (apex + 1..y.len()).find(|i| y[*i] < threshold)?;

    let left = interpolate_x(x[left_i], y[left_i], x[left_i + 1], y[left_i + 1], threshold);
    let right = interpolate_x(
        x[right_i - 1],
        y[right_i - 1],
        x[right_i],
        y[right_i],
        threshold,
    );
    Some(PeakWidth {
        left,
        apex: x[apex],
        right,
    })
}

fn time_width_at<T: IntensityTrack + TimeTrack>(trace: &T, fraction: f64) -> Option<PeakWidth> {
    let times: Vec<f64> = trace.iter_retention_times().collect();
    width_at(&times, trace.intensity_values(), fraction)
}

/// Full width at half maximum along the retention time axis
pub fn fwhm<T: IntensityTrack + TimeTrack>(trace: &T) -> Option<f64> {
    time_width_at(trace, 0.5).map(|w| w.width())
}

/// The USP tailing factor, `(a + b) / 2a` measured at 5% of the apex height
pub fn tailing_factor<T: IntensityTrack + TimeTrack>(trace: &T) -> Option<f64> {
    let w = time_width_at(trace, 0.05)?;
    let a = w.leading();
    (a > 0.0).then(|| (a + w.trailing()) / (2.0 * a))
}

/// The asymmetry factor `b / a` measured at 10% of the apex height
pub fn asymmetry_factor<T: IntensityTrack + TimeTrack>(trace: &T) -> Option<f64> {
    let w = time_width_at(trace, 0.1)?;
    let a = w.leading();
    (a > 0.0).then(|| w.trailing() / a)
}
