pub mod contours;
pub mod geometry;
pub mod morphology;
pub mod page;
pub mod preprocessing;
pub mod refine;
pub mod scoring;

pub use page::{PageCrop, locate_page};
pub use refine::refine;

use image::{DynamicImage, GrayImage, RgbImage};
use tracing::debug;

use crate::config::MergeConfig;
use crate::pipeline::StageLog;

/// Sizing of one binarize-and-merge run.
#[derive(Debug, Clone, Copy)]
pub struct MergeParams {
    /// Adaptive threshold window (odd).
    pub block_size: u32,
    /// Kernel unit `k` the morphology kernels are multiples of.
    pub kernel_scale: u32,
    /// Keep only a centered window with this linear scale per axis.
    pub center_window: Option<f64>,
}

/// Masks produced by [`binarize_and_merge`].
pub struct MergedMask {
    /// Ink as foreground, noise removed, before merging.
    pub clean: GrayImage,
    /// Ink merged into solid blobs.
    pub merged: GrayImage,
}

/// Grayscale conversion followed by CLAHE.
pub fn equalize(image: &RgbImage, config: &MergeConfig) -> GrayImage {
    let gray = preprocessing::to_grayscale(image);
    preprocessing::clahe(&gray, config.clahe_clip_limit, config.clahe_tiles)
}

/// Threshold, invert, clean, then merge ink into blocks: words into lines with
/// a wide flat kernel, lines into blocks with a narrow tall one, and a square
/// closing to fill what is left.
pub fn binarize_and_merge(
    equalized: &GrayImage,
    params: &MergeParams,
    config: &MergeConfig,
    stages: &mut StageLog,
    tag: &str,
) -> MergedMask {
    let (width, height) = equalized.dimensions();
    let k = params.kernel_scale;

    let thresholded = preprocessing::adaptive_threshold_gaussian(equalized, params.block_size, config.threshold_bias);
    let mut ink = preprocessing::invert(&thresholded);
    if let Some(scale) = params.center_window {
        ink = preprocessing::center_window(&ink, scale);
    }
    stages.record(format!("{tag}: threshold inverted"), || DynamicImage::ImageLuma8(ink.clone()));

    let min_area = config.noise_area_fraction * width as f64 * height as f64;
    let clean = preprocessing::remove_small_components(&ink, min_area);
    stages.record(format!("{tag}: noise removed"), || DynamicImage::ImageLuma8(clean.clone()));

    let merged = morphology::dilate_rect(&clean, config.line_kernel_factor * k, config.thin_kernel);
    let merged = morphology::dilate_rect(&merged, config.thin_kernel, config.block_kernel_factor * k);
    stages.record(format!("{tag}: dilate h+v"), || DynamicImage::ImageLuma8(merged.clone()));

    let close = config.close_kernel_factor * k;
    let merged = morphology::close_rect(&merged, close, close, config.close_iterations);
    stages.record(format!("{tag}: closed"), || DynamicImage::ImageLuma8(merged.clone()));

    debug!(
        block_size = params.block_size,
        kernel_scale = k,
        min_area,
        "Binarized and merged"
    );
    MergedMask { clean, merged }
}
