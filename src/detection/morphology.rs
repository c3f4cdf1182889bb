//! Binary morphology with rectangular structuring elements.
//!
//! A rectangle is separable, so each operation runs as a row pass followed by
//! a column pass, each a sliding-window count over prefix sums. The anchor of
//! a `k`-wide window sits at `k / 2`. Pixels outside the image never count as
//! foreground for dilation and never block erosion.

use image::{GrayImage, Luma};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Dilate,
    Erode,
}

/// Dilate a binary mask with a `kernel_w x kernel_h` rectangle.
pub fn dilate_rect(mask: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    let rows = pass_rows(mask, kernel_w, Op::Dilate);
    pass_cols(&rows, kernel_h, Op::Dilate)
}

/// Erode a binary mask with a `kernel_w x kernel_h` rectangle.
pub fn erode_rect(mask: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    let rows = pass_rows(mask, kernel_w, Op::Erode);
    pass_cols(&rows, kernel_h, Op::Erode)
}

/// Morphological closing repeated `iterations` times in the OpenCV sense:
/// all dilations first, then the same number of erosions.
pub fn close_rect(mask: &GrayImage, kernel_w: u32, kernel_h: u32, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = dilate_rect(&out, kernel_w, kernel_h);
    }
    for _ in 0..iterations {
        out = erode_rect(&out, kernel_w, kernel_h);
    }
    out
}

fn pass_rows(mask: &GrayImage, k: u32, op: Op) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    let mut line = vec![false; width as usize];
    for y in 0..height {
        for x in 0..width {
            line[x as usize] = mask.get_pixel(x, y)[0] > 0;
        }
        for (x, on) in slide(&line, k, op).into_iter().enumerate() {
            if on {
                out.put_pixel(x as u32, y, Luma([255u8]));
            }
        }
    }
    out
}

fn pass_cols(mask: &GrayImage, k: u32, op: Op) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    let mut line = vec![false; height as usize];
    for x in 0..width {
        for y in 0..height {
            line[y as usize] = mask.get_pixel(x, y)[0] > 0;
        }
        for (y, on) in slide(&line, k, op).into_iter().enumerate() {
            if on {
                out.put_pixel(x, y as u32, Luma([255u8]));
            }
        }
    }
    out
}

fn slide(line: &[bool], k: u32, op: Op) -> Vec<bool> {
    let n = line.len();
    if n == 0 || k <= 1 {
        return line.to_vec();
    }
    let mut prefix = vec![0u32; n + 1];
    for (i, &on) in line.iter().enumerate() {
        prefix[i + 1] = prefix[i] + on as u32;
    }

    let k = k as isize;
    let anchor = k / 2;
    (0..n as isize)
        .map(|i| {
            let lo = (i - anchor).max(0) as usize;
            let hi = ((i - anchor + k - 1).min(n as isize - 1)) as usize;
            let count = prefix[hi + 1] - prefix[lo];
            match op {
                Op::Dilate => count > 0,
                Op::Erode => count as usize == hi - lo + 1,
            }
        })
        .collect()
}
