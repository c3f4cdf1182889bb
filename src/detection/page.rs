//! Page boundary detection: find the densest well-formed ink region near the
//! middle of the photo and crop to it.

use image::{DynamicImage, RgbImage};
use tracing::{debug, instrument, warn};

use crate::config::PageLocatorConfig;
use crate::detection::{MergeParams, binarize_and_merge, contours, equalize, scoring};
use crate::models::BoundingBox;
use crate::pipeline::StageLog;

/// The page region cut out of a photo.
pub struct PageCrop {
    pub image: RgbImage,
    /// Crop rectangle in photo coordinates.
    pub rect: BoundingBox,
    /// No page was found; `image` is the whole photo.
    pub fallback: bool,
    pub stages: StageLog,
}

/// Crop `photo` to the bounding box of its largest merged ink region.
///
/// Never fails: without any region the whole photo is returned and
/// [`PageCrop::fallback`] is set.
#[instrument(skip_all, fields(width = photo.width(), height = photo.height()))]
pub fn locate_page(photo: &RgbImage, config: &PageLocatorConfig, collect_stages: bool) -> PageCrop {
    let mut stages = StageLog::new(collect_stages);
    let (width, height) = photo.dimensions();
    let full = BoundingBox {
        x: 0,
        y: 0,
        width,
        height,
    };
    if width == 0 || height == 0 {
        return fallback(photo, full, stages);
    }

    let k = scoring::kernel_scale(width);
    let gray = equalize(photo, &config.merge);
    stages.record("page: gray+clahe", || DynamicImage::ImageLuma8(gray.clone()));

    let params = MergeParams {
        block_size: 2 * k + 1,
        kernel_scale: k,
        center_window: Some(config.center_window_area.sqrt()),
    };
    let masks = binarize_and_merge(&gray, &params, &config.merge, &mut stages, "page");

    let found = contours::find_external_contours(&masks.merged);
    debug!(contours = found.len(), "Page contours");
    let Some(page) = contours::largest_contour(&found) else {
        return fallback(photo, full, stages);
    };

    let rect = page.bounding_box();
    let image = image::imageops::crop_imm(photo, rect.x, rect.y, rect.width, rect.height).to_image();
    stages.record("page: crop", || DynamicImage::ImageRgb8(image.clone()));
    debug!(x = rect.x, y = rect.y, w = rect.width, h = rect.height, "Page located");

    PageCrop {
        image,
        rect,
        fallback: false,
        stages,
    }
}

fn fallback(photo: &RgbImage, full: BoundingBox, mut stages: StageLog) -> PageCrop {
    warn!("No page region found; using the whole photo");
    stages.record("page: crop (fallback orig)", || DynamicImage::ImageRgb8(photo.clone()));
    PageCrop {
        image: photo.clone(),
        rect: full,
        fallback: true,
        stages,
    }
}
