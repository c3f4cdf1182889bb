//! Size-adaptive parameters and the candidate-block scoring model.
//!
//! All constants here are calibrated against real question photos; change
//! them only together with a fresh calibration run.

use image::GrayImage;

use crate::models::{BoundingBox, CandidateFeatures};

/// Morphology kernel unit for an image of the given width:
/// `max(3, round(width / 400))`, rounding halves to even.
pub fn kernel_scale(width: u32) -> u32 {
    ((width as f64 / 400.0).round_ties_even() as u32).max(3)
}

/// Adaptive-threshold block size: 2.2% of the shorter side, forced odd and
/// clamped to `[21, 151]`.
pub fn auto_block_size(height: u32, width: u32) -> u32 {
    const FRACTION: f64 = 0.022;
    const MIN_BLOCK: u32 = 21;
    const MAX_BLOCK: u32 = 151;

    let k = (height.min(width) as f64 * FRACTION).round_ties_even() as u32 | 1;
    k.clamp(MIN_BLOCK, MAX_BLOCK)
}

/// Gaussian proximity of `x` to `mu` with spread `tol`. Exactly 1 at the mean;
/// 0 for a non-positive tolerance.
pub fn gaussian_score(x: f64, mu: f64, tol: f64) -> f64 {
    if tol <= 0.0 {
        return 0.0;
    }
    let z = (x - mu) / (tol + 1e-6);
    (-0.5 * z * z).exp()
}

pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Direction of a 1-D foreground projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// One sum per row; counts horizontally stacked bands such as text lines.
    Rows,
    /// One sum per column.
    Columns,
}

/// Fraction of the region extent a projection sum must reach to count as ink.
pub const LOBE_THRESHOLD_FRACTION: f64 = 0.12;

/// Count contiguous runs of a projection whose foreground count reaches
/// `max(3, round(fraction * extent))`.
///
/// For [`Axis::Rows`] the extent is the region height, for
/// [`Axis::Columns`] its width.
pub fn projection_lobes(mask: &GrayImage, region: &BoundingBox, axis: Axis, fraction: f64) -> usize {
    let x_end = (region.x + region.width).min(mask.width());
    let y_end = (region.y + region.height).min(mask.height());
    if region.x >= x_end || region.y >= y_end {
        return 0;
    }

    let extent = match axis {
        Axis::Rows => y_end - region.y,
        Axis::Columns => x_end - region.x,
    };
    let threshold = ((fraction * extent as f64).round_ties_even() as u32).max(3);

    let sums: Vec<u32> = match axis {
        Axis::Rows => (region.y..y_end)
            .map(|y| (region.x..x_end).filter(|&x| mask.get_pixel(x, y)[0] > 0).count() as u32)
            .collect(),
        Axis::Columns => (region.x..x_end)
            .map(|x| (region.y..y_end).filter(|&y| mask.get_pixel(x, y)[0] > 0).count() as u32)
            .collect(),
    };

    let mut runs = 0;
    let mut in_run = false;
    for sum in sums {
        if sum >= threshold {
            if !in_run {
                runs += 1;
                in_run = true;
            }
        } else {
            in_run = false;
        }
    }
    runs
}

/// Shape prior selected by how many ink lobes a candidate shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobeProfile {
    /// Three or more lobes: a paragraph or several lines of text.
    MultiLine,
    DoubleLobe,
    /// A single solid block.
    SingleBlock,
}

/// Target means, tolerances, and weights of one [`LobeProfile`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileParams {
    pub rect_mu: f64,
    pub rect_tol: f64,
    pub extent_mu: f64,
    pub extent_tol: f64,
    pub aspect_mu: f64,
    pub aspect_tol: f64,
    pub w_rect: f64,
    pub w_extent: f64,
    pub w_solidity: f64,
    pub w_center: f64,
    pub w_aspect: f64,
}

impl LobeProfile {
    pub fn from_lobes(lobes: usize) -> Self {
        match lobes {
            0 | 1 => LobeProfile::SingleBlock,
            2 => LobeProfile::DoubleLobe,
            _ => LobeProfile::MultiLine,
        }
    }

    pub fn params(self) -> ProfileParams {
        match self {
            LobeProfile::MultiLine => ProfileParams {
                rect_mu: 0.70,
                rect_tol: 0.20,
                extent_mu: 0.65,
                extent_tol: 0.20,
                aspect_mu: 1.0,
                aspect_tol: 0.8,
                w_rect: 0.30,
                w_extent: 0.25,
                w_solidity: 0.20,
                w_center: 0.10,
                w_aspect: 0.15,
            },
            LobeProfile::DoubleLobe => ProfileParams {
                rect_mu: 0.80,
                rect_tol: 0.15,
                extent_mu: 0.72,
                extent_tol: 0.18,
                aspect_mu: 1.0,
                aspect_tol: 0.6,
                w_rect: 0.35,
                w_extent: 0.25,
                w_solidity: 0.20,
                w_center: 0.10,
                w_aspect: 0.10,
            },
            LobeProfile::SingleBlock => ProfileParams {
                rect_mu: 0.92,
                rect_tol: 0.10,
                extent_mu: 0.85,
                extent_tol: 0.12,
                aspect_mu: 1.0,
                aspect_tol: 0.5,
                w_rect: 0.45,
                w_extent: 0.20,
                w_solidity: 0.20,
                w_center: 0.10,
                w_aspect: 0.05,
            },
        }
    }
}

/// Penalty for candidates that are specks (< 10% of the image) or cover
/// almost all of it (> 95%).
pub fn coverage_penalty(fill: f64) -> f64 {
    if fill < 0.10 {
        (0.10 - fill) * 1.5
    } else if fill > 0.95 {
        (fill - 0.95) * 3.0
    } else {
        0.0
    }
}

/// Weighted candidate score, coverage penalty included. Higher is better.
pub fn score_candidate(features: &CandidateFeatures) -> f64 {
    let p = LobeProfile::from_lobes(features.lobes()).params();

    let score = p.w_rect * gaussian_score(features.rectangularity, p.rect_mu, p.rect_tol)
        + p.w_extent * gaussian_score(features.extent, p.extent_mu, p.extent_tol)
        + p.w_solidity * clamp01(features.solidity)
        + p.w_center * features.center_score
        + p.w_aspect * gaussian_score(features.aspect_ratio, p.aspect_mu, p.aspect_tol);

    score - coverage_penalty(features.fill)
}

/// Highest-scoring item. An exact tie keeps the item seen first, so only
/// genuinely equal scores depend on iteration order.
pub fn best_by_score<T>(items: impl IntoIterator<Item = (T, f64)>) -> Option<(T, f64)> {
    let mut best: Option<(T, f64)> = None;
    for (item, score) in items {
        if best.as_ref().is_none_or(|(_, top)| score > *top) {
            best = Some((item, score));
        }
    }
    best
}
