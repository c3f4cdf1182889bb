use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};

use crate::models::Contour;

/// Find the outermost borders of the foreground regions in a binary mask.
///
/// Holes, and regions nested inside holes, are skipped. Contours come back in
/// raster discovery order and are labelled accordingly.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .enumerate()
        .filter_map(|(label, c)| Contour::from_points(label, c.points))
        .collect()
}

/// The contour enclosing the largest area; the first one wins ties.
pub fn largest_contour(contours: &[Contour]) -> Option<&Contour> {
    let mut best: Option<(&Contour, f64)> = None;
    for contour in contours {
        let area = contour.area();
        if best.is_none_or(|(_, a)| area > a) {
            best = Some((contour, area));
        }
    }
    best.map(|(c, _)| c)
}
