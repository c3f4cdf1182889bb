use imageproc::point::Point;
use serde::Serialize;

use crate::detection::geometry;

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}

/// Outer border of a connected foreground region, as traced on a binary mask.
#[derive(Debug, Clone)]
pub struct Contour {
    /// Position in discovery (raster scan) order.
    pub label: usize,
    pub points: Vec<Point<i32>>,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Contour {
    /// Build a contour from traced border points. Returns `None` for an empty
    /// trace.
    pub fn from_points(label: usize, points: Vec<Point<i32>>) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            label,
            points,
            min_x: min_x.max(0) as u32,
            min_y: min_y.max(0) as u32,
            max_x: max_x.max(0) as u32,
            max_y: max_y.max(0) as u32,
        })
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Enclosed polygon area (shoelace over the border points).
    pub fn area(&self) -> f64 {
        geometry::polygon_area(&self.float_points())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            x: self.min_x,
            y: self.min_y,
            width: self.width(),
            height: self.height(),
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }

    pub fn float_points(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.x as f64, p.y as f64)).collect()
    }
}

/// Four corners ordered `[top-left, top-right, bottom-left, bottom-right]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Quadrilateral {
    points: [(f32, f32); 4],
}

impl Quadrilateral {
    /// Order four arbitrary corners into the canonical layout.
    pub fn from_corners(corners: [(f32, f32); 4]) -> Self {
        Self {
            points: geometry::order_quad(corners),
        }
    }

    /// Order the cyclic corners of a rotated rectangle; stays well formed at
    /// a 45° tilt, where [`Quadrilateral::from_corners`] would repeat a corner.
    pub fn from_rect_corners(cyclic: [(f32, f32); 4]) -> Self {
        Self {
            points: geometry::order_rect_corners(cyclic),
        }
    }

    pub fn points(&self) -> [(f32, f32); 4] {
        self.points
    }

    pub fn top_left(&self) -> (f32, f32) {
        self.points[0]
    }

    pub fn top_right(&self) -> (f32, f32) {
        self.points[1]
    }

    pub fn bottom_left(&self) -> (f32, f32) {
        self.points[2]
    }

    pub fn bottom_right(&self) -> (f32, f32) {
        self.points[3]
    }

    /// Shift every corner, e.g. to map page-crop coordinates back to the photo.
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            points: self.points.map(|(x, y)| (x + dx, y + dy)),
        }
    }

    /// Destination size of the rectified rectangle: the longer of each pair
    /// of opposite edges, rounded, never below `min_side`.
    pub fn rectified_size(&self, min_side: u32) -> (u32, u32) {
        let dist = |a: (f32, f32), b: (f32, f32)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
        let [tl, tr, bl, br] = self.points;
        let w = dist(tl, tr).max(dist(bl, br)).round() as u32;
        let h = dist(tl, bl).max(dist(tr, br)).round() as u32;
        (w.max(min_side), h.max(min_side))
    }
}

/// Per-candidate measurements used by the block scorer.
#[derive(Debug, Clone, Copy)]
pub struct CandidateFeatures {
    pub area: f64,
    pub bbox: BoundingBox,
    /// Contour area over bounding-box area.
    pub extent: f64,
    /// Contour area over convex-hull area.
    pub solidity: f64,
    /// Contour area over minimum-area-rectangle area.
    pub rectangularity: f64,
    pub aspect_ratio: f64,
    /// 1 at the image center, falling to 0 at a corner.
    pub center_score: f64,
    pub vertical_lobes: usize,
    pub horizontal_lobes: usize,
    /// Contour area over image area.
    pub fill: f64,
}

impl CandidateFeatures {
    pub fn lobes(&self) -> usize {
        self.vertical_lobes.max(self.horizontal_lobes)
    }
}
