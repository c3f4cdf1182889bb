//! Question block selection and rectification inside a page crop.

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use tracing::{debug, info, instrument};

use crate::config::RefineConfig;
use crate::detection::geometry::{self, MinAreaRect};
use crate::detection::scoring::{self, Axis};
use crate::detection::{MergeParams, binarize_and_merge, contours, equalize, preprocessing};
use crate::error::Result;
use crate::models::{CandidateFeatures, Contour, Quadrilateral};
use crate::pipeline::{PipelineResult, StageLog};

/// Find the best-scoring block in `page`, warp it upright, and binarize it.
///
/// An empty result (see [`PipelineResult::no_candidate`]) means no merged
/// region reached the minimum candidate area.
#[instrument(skip_all, fields(width = page.width(), height = page.height()))]
pub fn refine(
    page: &RgbImage,
    invert_to_black_text: bool,
    config: &RefineConfig,
    collect_stages: bool,
) -> Result<PipelineResult> {
    let mut stages = StageLog::new(collect_stages);
    let (width, height) = page.dimensions();
    if width == 0 || height == 0 {
        return Ok(PipelineResult::no_candidate(stages));
    }

    let gray = equalize(page, &config.merge);
    stages.record("refine: gray+clahe", || DynamicImage::ImageLuma8(gray.clone()));

    let params = MergeParams {
        block_size: scoring::auto_block_size(height, width),
        kernel_scale: scoring::kernel_scale(width),
        center_window: None,
    };
    let masks = binarize_and_merge(&gray, &params, &config.merge, &mut stages, "refine");

    let found = contours::find_external_contours(&masks.merged);
    if found.is_empty() {
        info!("No contours in page crop");
        return Ok(PipelineResult::no_candidate(stages));
    }

    let page_area = width as f64 * height as f64;
    let min_area = config.min_candidate_fraction * page_area;
    let mut overlay = stages.is_enabled().then(|| page.clone());

    let scored = found.iter().filter_map(|contour| {
        if contour.area() < min_area {
            return None;
        }
        let (features, rect) = measure(contour, &masks.clean, width, height, config.lobe_threshold_fraction)?;
        let score = scoring::score_candidate(&features);
        debug!(
            label = contour.label,
            score,
            area = features.area,
            extent = features.extent,
            solidity = features.solidity,
            rectangularity = features.rectangularity,
            aspect = features.aspect_ratio,
            lobes = features.lobes(),
            "Candidate scored"
        );
        if let Some(canvas) = overlay.as_mut() {
            draw_rect(canvas, &rect);
        }
        Some((rect, score))
    });
    let best = scoring::best_by_score(scored);

    if let Some(canvas) = overlay {
        stages.record("refine: candidates overlay", || DynamicImage::ImageRgb8(canvas));
    }

    let Some((rect, score)) = best else {
        info!(contours = found.len(), "No candidate above the area floor");
        return Ok(PipelineResult::no_candidate(stages));
    };

    let quad = Quadrilateral::from_rect_corners(rect.corners_f32());
    debug!(score, quad = ?quad.points(), "Best candidate");

    let warped = geometry::perspective_warp(page, &quad)?;
    stages.record("refine: warped", || DynamicImage::ImageRgb8(warped.clone()));

    let final_binary = binarize_block(&warped, config.final_threshold_bias, invert_to_black_text);
    stages.record("refine: final bw", || DynamicImage::ImageLuma8(final_binary.clone()));

    Ok(PipelineResult {
        best_quad: Some(quad),
        rectified: Some(warped),
        final_binary: Some(final_binary),
        stages,
    })
}

/// Threshold the rectified block. Ink comes out white on black unless
/// `black_text` flips it to black on white.
pub fn binarize_block(warped: &RgbImage, bias: f32, black_text: bool) -> GrayImage {
    let gray = preprocessing::to_grayscale(warped);
    let block = scoring::auto_block_size(gray.height(), gray.width());
    let thresholded = preprocessing::adaptive_threshold_gaussian(&gray, block, bias);
    if black_text {
        thresholded
    } else {
        preprocessing::invert(&thresholded)
    }
}

/// Shape features of one contour. `clean` is the noise-free ink mask the lobe
/// counts are taken from.
pub fn measure(
    contour: &Contour,
    clean: &GrayImage,
    width: u32,
    height: u32,
    lobe_fraction: f64,
) -> Option<(CandidateFeatures, MinAreaRect)> {
    let points = contour.float_points();
    let area = geometry::polygon_area(&points);
    let bbox = contour.bounding_box();
    let bbox_area = bbox.area() as f64;
    if bbox_area == 0.0 {
        return None;
    }

    let hull_area = geometry::polygon_area(&geometry::convex_hull(&points));
    let rect = geometry::min_area_rect(&points)?;

    let (cx, cy) = bbox.center();
    let (half_w, half_h) = (width as f64 / 2.0, height as f64 / 2.0);
    let dist = (cx - half_w).hypot(cy - half_h);
    let center_score = scoring::clamp01(1.0 - dist / (half_w.hypot(half_h) + 1e-6));

    let features = CandidateFeatures {
        area,
        bbox,
        extent: area / (bbox_area + 1e-6),
        solidity: area / (hull_area + 1e-6),
        rectangularity: area / rect.area().max(1.0),
        aspect_ratio: contour.aspect_ratio(),
        center_score,
        vertical_lobes: scoring::projection_lobes(clean, &bbox, Axis::Rows, lobe_fraction),
        horizontal_lobes: scoring::projection_lobes(clean, &bbox, Axis::Columns, lobe_fraction),
        fill: area / (width as f64 * height as f64 + 1e-6),
    };
    Some((features, rect))
}

fn draw_rect(canvas: &mut RgbImage, rect: &MinAreaRect) {
    let c = rect.corners_f32();
    for i in 0..4 {
        draw_line_segment_mut(canvas, c[i], c[(i + 1) % 4], Rgb([0u8, 255, 0]));
    }
}
