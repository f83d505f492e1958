//! Peak and edge detection on sampled curves.
//!
//! Pure functions over slices; no knowledge of spectra or plotting.

/// A detected local maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub height: f64,
    /// Topographic prominence: height above the higher of the two bases.
    pub prominence: f64,
}

/// Find local maxima whose prominence is at least `min_prominence`.
///
/// Plateaus report their first sample. Peaks are returned in index order.
pub fn find_peaks(y: &[f64], min_prominence: f64) -> Vec<Peak> {
    let n = y.len();
    let mut out = Vec::new();
    if n < 3 {
        return out;
    }

    let mut i = 1;
    while i + 1 < n {
        if y[i] > y[i - 1] {
            // Walk over a flat top.
            let mut j = i;
            while j + 1 < n && y[j + 1] == y[i] {
                j += 1;
            }
            if j + 1 < n && y[j + 1] < y[i] {
                let prominence = prominence_at(y, i);
                if prominence >= min_prominence {
                    out.push(Peak {
                        index: i,
                        height: y[i],
                        prominence,
                    });
                }
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    out
}

fn prominence_at(y: &[f64], idx: usize) -> f64 {
    let h = y[idx];

    let mut left_min = h;
    for k in (0..idx).rev() {
        if y[k] > h {
            break;
        }
        left_min = left_min.min(y[k]);
    }

    let mut right_min = h;
    for &v in &y[idx + 1..] {
        if v > h {
            break;
        }
        right_min = right_min.min(v);
    }

    h - left_min.max(right_min)
}

/// Half width at half maximum of the peak at `idx`, measured above `floor`.
///
/// Crossings are linearly interpolated. When only one side crosses half
/// maximum inside the data, that side alone is used.
pub fn half_width_half_max(x: &[f64], y: &[f64], idx: usize, floor: f64) -> Option<f64> {
    let n = x.len().min(y.len());
    if idx >= n {
        return None;
    }
    let half = floor + 0.5 * (y[idx] - floor);
    if !(y[idx] > half) {
        return None;
    }

    let left = (0..idx).rev().find(|&k| y[k] <= half).map(|k| {
        let t = (half - y[k]) / (y[k + 1] - y[k]);
        x[k] + t * (x[k + 1] - x[k])
    });
    let right = (idx + 1..n).find(|&k| y[k] <= half).map(|k| {
        let t = (y[k - 1] - half) / (y[k - 1] - y[k]);
        x[k - 1] + t * (x[k] - x[k - 1])
    });

    let hwhm = match (left, right) {
        (Some(l), Some(r)) => 0.5 * (r - l),
        (Some(l), None) => x[idx] - l,
        (None, Some(r)) => r - x[idx],
        (None, None) => return None,
    };
    (hwhm.is_finite() && hwhm > 0.0).then_some(hwhm)
}

/// Index `i` (in `start..n-1`) maximizing the forward slope `(y[i+1]-y[i])/(x[i+1]-x[i])`,
/// reported as the midpoint energy of that interval.
///
/// Returns `None` if no positive slope exists in the range.
pub fn steepest_rise(x: &[f64], y: &[f64], start: usize) -> Option<f64> {
    let n = x.len().min(y.len());
    let mut best: Option<(f64, f64)> = None;
    for i in start..n.saturating_sub(1) {
        let dx = x[i + 1] - x[i];
        if dx <= 0.0 {
            continue;
        }
        let slope = (y[i + 1] - y[i]) / dx;
        if slope > 0.0 && best.is_none_or(|(s, _)| slope > s) {
            best = Some((slope, 0.5 * (x[i] + x[i + 1])));
        }
    }
    best.map(|(_, e)| e)
}
