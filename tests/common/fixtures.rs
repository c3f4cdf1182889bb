use image::{Rgb, RgbImage};
use question_crop::BoundingBox;
use tempfile::NamedTempFile;

pub const PAPER: Rgb<u8> = Rgb([245, 245, 240]);
pub const INK: Rgb<u8> = Rgb([20, 20, 25]);
pub const TABLE: Rgb<u8> = Rgb([40, 35, 30]);

/// Fill `rect` on `img` with `color`, clipped to the image.
pub fn fill_rect(img: &mut RgbImage, rect: BoundingBox, color: Rgb<u8>) {
    let x_end = (rect.x + rect.width).min(img.width());
    let y_end = (rect.y + rect.height).min(img.height());
    for y in rect.y..y_end {
        for x in rect.x..x_end {
            img.put_pixel(x, y, color);
        }
    }
}

/// Draw rows of word-like ink bars covering `block`. Words are 40x8 with
/// 12px gaps, lines 24px apart.
pub fn draw_text_block(img: &mut RgbImage, block: BoundingBox) {
    let mut y = block.y;
    while y + 8 <= block.y + block.height {
        let mut x = block.x;
        while x + 40 <= block.x + block.width {
            fill_rect(
                img,
                BoundingBox {
                    x,
                    y,
                    width: 40,
                    height: 8,
                },
                INK,
            );
            x += 52;
        }
        y += 24;
    }
}

/// Tight bounding box of the bars drawn by [`draw_text_block`].
pub fn inked_extent(block: BoundingBox) -> BoundingBox {
    let words = (block.width - 40) / 52 + 1;
    let lines = (block.height - 8) / 24 + 1;
    BoundingBox {
        x: block.x,
        y: block.y,
        width: (words - 1) * 52 + 40,
        height: (lines - 1) * 24 + 8,
    }
}

/// A plain sheet of paper filling the frame with one centered question block.
/// Returns the photo and the inked extent of the block.
pub fn text_page() -> (RgbImage, BoundingBox) {
    let mut img = RgbImage::from_pixel(600, 800, PAPER);
    let block = BoundingBox {
        x: 150,
        y: 250,
        width: 300,
        height: 300,
    };
    draw_text_block(&mut img, block);
    (img, inked_extent(block))
}

/// A light document with a text block lying on a dark table.
/// Returns the photo and the document rectangle.
pub fn document_on_table() -> (RgbImage, BoundingBox) {
    let mut img = RgbImage::from_pixel(600, 500, TABLE);
    let doc = BoundingBox {
        x: 150,
        y: 100,
        width: 300,
        height: 300,
    };
    fill_rect(&mut img, doc, PAPER);
    draw_text_block(
        &mut img,
        BoundingBox {
            x: 190,
            y: 160,
            width: 220,
            height: 180,
        },
    );
    (img, doc)
}

pub fn blank_page() -> RgbImage {
    RgbImage::from_pixel(500, 400, PAPER)
}

/// Save `img` as a PNG temp file named `<stem>....png`.
/// The file will be automatically cleaned up when dropped.
pub fn save_temp_png(img: &RgbImage, stem: &str) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .prefix(stem)
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Save `img` as `<dir>/<name>.png`.
pub fn save_png_in(dir: &std::path::Path, name: &str, img: &RgbImage) -> std::path::PathBuf {
    let path = dir.join(format!("{name}.png"));
    img.save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}
