use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::region_labelling::{Connectivity, connected_components};

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `tiles x tiles` grid; each tile gets its own
/// clipped histogram equalization and pixel values are bilinearly
/// interpolated between the four surrounding tile mappings.
pub fn clahe(img: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    let tiles_x = tiles.clamp(1, width);
    let tiles_y = tiles.clamp(1, height);
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = (x1.saturating_sub(x0) * y1.saturating_sub(y0)).max(1);
            let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
            clip_histogram(&mut hist, limit);

            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let scale = 255.0 / area as f32;
            let mut cdf = 0u32;
            for (value, count) in hist.iter().enumerate() {
                cdf += count;
                lut[value] = (cdf as f32 * scale).round().min(255.0) as u8;
            }
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let gy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let ty0 = gy.floor().max(0.0) as u32;
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let fy = (gy - ty0 as f32).clamp(0.0, 1.0);
        for x in 0..width {
            let gx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
            let tx0 = gx.floor().max(0.0) as u32;
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let fx = (gx - tx0 as f32).clamp(0.0, 1.0);

            let v = img.get_pixel(x, y)[0] as usize;
            let at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;
            let top = at(tx0, ty0) * (1.0 - fx) + at(tx1, ty0) * fx;
            let bottom = at(tx0, ty1) * (1.0 - fx) + at(tx1, ty1) * fx;
            let value = top * (1.0 - fy) + bottom * fy;
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Clip every bin at `limit` and spread the excess evenly over all bins.
fn clip_histogram(hist: &mut [u32; 256], limit: u32) {
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let per_bin = excess / 256;
    let residual = (excess % 256) as usize;
    for bin in hist.iter_mut() {
        *bin += per_bin;
    }
    if residual > 0 {
        let step = (256 / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }
}

/// Local threshold against a Gaussian-weighted neighbourhood mean.
///
/// A pixel becomes 255 when it is brighter than the weighted mean of its
/// `block_size` window minus `bias`, otherwise 0. Ink on paper therefore ends
/// up black; call [`invert`] to make it the foreground.
pub fn adaptive_threshold_gaussian(img: &GrayImage, block_size: u32, bias: f32) -> GrayImage {
    let block_size = block_size.max(3) | 1;
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let mean = gaussian_blur_f32(img, sigma);

    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let threshold = mean.get_pixel(x, y)[0] as f32 - bias;
        let value = if pixel[0] as f32 > threshold { 255 } else { 0 };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

/// Swap foreground and background of an 8-bit image.
pub fn invert(img: &GrayImage) -> GrayImage {
    let mut out = img.clone();
    image::imageops::invert(&mut out);
    out
}

/// Clear everything outside a centered window whose sides are `linear_scale`
/// times the image sides.
pub fn center_window(mask: &GrayImage, linear_scale: f64) -> GrayImage {
    let (width, height) = mask.dimensions();
    let win_w = (width as f64 * linear_scale) as u32;
    let win_h = (height as f64 * linear_scale) as u32;
    let x1 = (width - win_w) / 2;
    let y1 = (height - win_h) / 2;
    let x2 = x1 + win_w;
    let y2 = y1 + win_h;

    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in mask.enumerate_pixels() {
        if x >= x1 && x <= x2 && y >= y1 && y <= y2 {
            out.put_pixel(x, y, *pixel);
        }
    }
    out
}

/// Drop 8-connected foreground components with fewer than `min_area` pixels.
pub fn remove_small_components(mask: &GrayImage, min_area: f64) -> GrayImage {
    let labeled = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let max_label = labeled.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut counts = vec![0u64; max_label + 1];
    for label in labeled.pixels() {
        counts[label[0] as usize] += 1;
    }

    let mut clean = GrayImage::new(mask.width(), mask.height());
    for (x, y, label) in labeled.enumerate_pixels() {
        let label = label[0] as usize;
        if label != 0 && counts[label] as f64 >= min_area {
            clean.put_pixel(x, y, Luma([255u8]));
        }
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_marks_dark_ink_as_zero() {
        let mut img = GrayImage::from_pixel(60, 60, Luma([230u8]));
        for y in 25..35 {
            for x in 10..50 {
                img.put_pixel(x, y, Luma([20u8]));
            }
        }
        let bin = adaptive_threshold_gaussian(&img, 21, 10.0);
        assert_eq!(bin.get_pixel(30, 30)[0], 0);
        assert_eq!(bin.get_pixel(5, 5)[0], 255);
        assert!(bin.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn center_window_clears_border() {
        let mask = GrayImage::from_pixel(100, 100, Luma([255u8]));
        let windowed = center_window(&mask, 0.8f64.sqrt());
        assert_eq!(windowed.get_pixel(0, 0)[0], 0);
        assert_eq!(windowed.get_pixel(99, 50)[0], 0);
        assert_eq!(windowed.get_pixel(50, 50)[0], 255);
    }

    #[test]
    fn small_components_are_removed() {
        let mut mask = GrayImage::new(50, 50);
        mask.put_pixel(2, 2, Luma([255u8]));
        for y in 20..30 {
            for x in 20..30 {
                mask.put_pixel(x, y, Luma([255u8]));
            }
        }
        let clean = remove_small_components(&mask, 5.0);
        assert_eq!(clean.get_pixel(2, 2)[0], 0);
        assert_eq!(clean.get_pixel(25, 25)[0], 255);
    }

    #[test]
    fn clahe_keeps_flat_image_flat() {
        let img = GrayImage::from_pixel(64, 48, Luma([120u8]));
        let eq = clahe(&img, 2.0, 8);
        let first = eq.get_pixel(0, 0)[0];
        assert!(eq.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn clahe_preserves_ordering_of_dark_and_light() {
        let img = GrayImage::from_fn(80, 80, |x, _| if x < 40 { Luma([40u8]) } else { Luma([200u8]) });
        let eq = clahe(&img, 2.0, 8);
        assert!(eq.get_pixel(5, 40)[0] < eq.get_pixel(75, 40)[0]);
    }
}
