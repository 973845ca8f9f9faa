//! Weighted circular mean of bearings.
//!
//! Bearings wrap at 360°, so they are averaged as weighted unit vectors.

use nalgebra::Vector2;

/// Resultant shorter than this is treated as "no defined direction".
const MIN_RESULTANT: f64 = 1e-9;

/// Output precision, in degrees.
const BEARING_RESOLUTION: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularMean {
    /// Mean bearing in [0, 360)
    pub bearing_deg: f64,
    /// Mean resultant length in [0, 1]; 1 means all inputs coincide
    pub concentration: f64,
}

/// Weighted circular mean of `(bearing_deg, weight)` pairs.
///
/// Returns `None` if the total weight is zero or the vectors cancel out.
pub fn weighted_circular_mean<I>(samples: I) -> Option<CircularMean>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut sum = Vector2::<f64>::zeros();
    let mut total_weight = 0.0;

    for (bearing_deg, weight) in samples {
        let rad = bearing_deg.to_radians();
        sum += Vector2::new(rad.cos(), rad.sin()) * weight;
        total_weight += weight;
    }

    if total_weight <= 0.0 {
        return None;
    }

    let resultant = sum.norm();
    if resultant < MIN_RESULTANT {
        return None;
    }

    let deg = sum.y.atan2(sum.x).to_degrees();
    let snapped = (deg / BEARING_RESOLUTION).round() * BEARING_RESOLUTION;
    // `+ 0.0` folds -0.0 into 0.0
    let bearing_deg = contracts::normalize_bearing(snapped) + 0.0;

    Some(CircularMean {
        bearing_deg,
        concentration: (resultant / total_weight).clamp(0.0, 1.0),
    })
}
