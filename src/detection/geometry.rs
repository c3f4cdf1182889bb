//! Planar geometry helpers: polygon measures, convex hull, minimum-area
//! rectangle, quadrilateral ordering, and perspective rectification.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Quadrilateral;

/// Shortest side of a rectified output, in pixels.
pub const MIN_RECTIFIED_SIDE: u32 = 10;

/// Absolute area of a closed polygon (shoelace formula).
pub fn polygon_area(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, &(x1, y1)) in points.iter().enumerate() {
        let (x2, y2) = points[(i + 1) % points.len()];
        twice += x1 * y2 - x2 * y1;
    }
    twice.abs() / 2.0
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Convex hull in counter-clockwise order (Andrew's monotone chain).
/// Collinear points on the hull boundary are dropped.
pub fn convex_hull(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Rotated rectangle of least area enclosing a point set.
#[derive(Debug, Clone, Copy)]
pub struct MinAreaRect {
    pub corners: [(f64, f64); 4],
    pub width: f64,
    pub height: f64,
}

impl MinAreaRect {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn corners_f32(&self) -> [(f32, f32); 4] {
        self.corners.map(|(x, y)| (x as f32, y as f32))
    }
}

/// Minimum-area enclosing rectangle via rotating calipers over hull edges.
///
/// Returns `None` for an empty point set.
pub fn min_area_rect(points: &[(f64, f64)]) -> Option<MinAreaRect> {
    let hull = convex_hull(points);
    match hull.len() {
        0 => return None,
        1 => {
            let p = hull[0];
            return Some(MinAreaRect {
                corners: [p; 4],
                width: 0.0,
                height: 0.0,
            });
        }
        _ => {}
    }

    let mut best: Option<MinAreaRect> = None;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        if len == 0.0 {
            continue;
        }
        let u = ((b.0 - a.0) / len, (b.1 - a.1) / len);
        let v = (-u.1, u.0);

        let (mut min_u, mut max_u, mut min_v, mut max_v) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for &(px, py) in &hull {
            let pu = px * u.0 + py * u.1;
            let pv = px * v.0 + py * v.1;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        if best.is_some_and(|r| r.area() <= width * height) {
            continue;
        }

        let at = |su: f64, sv: f64| (su * u.0 + sv * v.0, su * u.1 + sv * v.1);
        best = Some(MinAreaRect {
            corners: [at(min_u, min_v), at(max_u, min_v), at(max_u, max_v), at(min_u, max_v)],
            width,
            height,
        });
    }
    best
}

/// Order four corners as `[top-left, top-right, bottom-left, bottom-right]`.
///
/// Top-left and bottom-right are the extremes of `x + y`; top-right and
/// bottom-left the extremes of `y - x`. Ties go to the first corner seen.
pub fn order_quad(pts: [(f32, f32); 4]) -> [(f32, f32); 4] {
    let sum = |p: &(f32, f32)| p.0 + p.1;
    let diff = |p: &(f32, f32)| p.1 - p.0;

    let argmin = |key: &dyn Fn(&(f32, f32)) -> f32| {
        let mut idx = 0;
        for i in 1..4 {
            if key(&pts[i]) < key(&pts[idx]) {
                idx = i;
            }
        }
        pts[idx]
    };
    let argmax = |key: &dyn Fn(&(f32, f32)) -> f32| {
        let mut idx = 0;
        for i in 1..4 {
            if key(&pts[i]) > key(&pts[idx]) {
                idx = i;
            }
        }
        pts[idx]
    };

    [argmin(&sum), argmin(&diff), argmax(&diff), argmax(&sum)]
}

/// Order the corners of a rectangle given in cyclic (clockwise on screen)
/// order, as produced by [`min_area_rect`].
///
/// Uses [`order_quad`] unless it picks one corner twice, which happens when
/// the rectangle is tilted by exactly 45°. Then the walk starts at the
/// corner with the smallest `x + y` and follows the cycle.
pub fn order_rect_corners(cyclic: [(f32, f32); 4]) -> [(f32, f32); 4] {
    let ordered = order_quad(cyclic);
    let distinct = (0..4).all(|i| (i + 1..4).all(|j| ordered[i] != ordered[j]));
    if distinct {
        return ordered;
    }

    let mut start = 0;
    for i in 1..4 {
        if cyclic[i].0 + cyclic[i].1 < cyclic[start].0 + cyclic[start].1 {
            start = i;
        }
    }
    let at = |offset: usize| cyclic[(start + offset) % 4];
    [at(0), at(1), at(3), at(2)]
}

/// Warp the region bounded by `quad` onto an upright rectangle.
///
/// The destination is sized by [`Quadrilateral::rectified_size`]; corners map
/// `tl → (0, 0)`, `tr → (w-1, 0)`, `bl → (0, h-1)`, `br → (w-1, h-1)`.
/// Pixels sampled from outside the source are white.
pub fn perspective_warp(image: &RgbImage, quad: &Quadrilateral) -> Result<RgbImage> {
    let (w, h) = quad.rectified_size(MIN_RECTIFIED_SIDE);
    let (wf, hf) = ((w - 1) as f32, (h - 1) as f32);
    let dst = [(0.0, 0.0), (wf, 0.0), (0.0, hf), (wf, hf)];

    let projection = Projection::from_control_points(quad.points(), dst)
        .ok_or(Error::DegenerateQuad(quad.points()))?;

    let mut output = RgbImage::new(w, h);
    warp_into(
        image,
        &projection,
        Interpolation::Bicubic,
        Rgb([255u8, 255, 255]),
        &mut output,
    );
    debug!(width = w, height = h, "Perspective warp applied");
    Ok(output)
}
