mod common;

use common::*;
use question_crop::RefineConfig;
use question_crop::detection::geometry::MIN_RECTIFIED_SIDE;
use question_crop::detection::{preprocessing, refine};

fn quad_bounds(quad: &Quadrilateral) -> (f32, f32, f32, f32) {
    let pts = quad.points();
    let min_x = pts.iter().map(|p| p.0).fold(f32::MAX, f32::min);
    let min_y = pts.iter().map(|p| p.1).fold(f32::MAX, f32::min);
    let max_x = pts.iter().map(|p| p.0).fold(f32::MIN, f32::max);
    let max_y = pts.iter().map(|p| p.1).fold(f32::MIN, f32::max);
    (min_x, min_y, max_x, max_y)
}

#[test]
fn test_centered_block_is_selected() -> anyhow::Result<()> {
    let (page, ink) = text_page();
    let result = refine(&page, true, &RefineConfig::default(), false)?;

    let quad = result.best_quad.expect("block should be found");
    let (min_x, min_y, max_x, max_y) = quad_bounds(&quad);
    assert!(min_x <= ink.x as f32 && min_y <= ink.y as f32);
    assert!(max_x >= (ink.x + ink.width - 1) as f32);
    assert!(max_y >= (ink.y + ink.height - 1) as f32);

    let (cx, cy) = ink.center();
    assert!((((min_x + max_x) / 2.0) as f64 - cx).abs() < 20.0);
    assert!((((min_y + max_y) / 2.0) as f64 - cy).abs() < 20.0);

    let expected = quad.rectified_size(MIN_RECTIFIED_SIDE);
    assert_eq!(result.rectified.as_ref().map(|r| r.dimensions()), Some(expected));
    assert_eq!(result.final_binary.as_ref().map(|b| b.dimensions()), Some(expected));
    Ok(())
}

#[test]
fn test_final_binary_is_strictly_binary() -> anyhow::Result<()> {
    let (page, _) = text_page();
    let result = refine(&page, true, &RefineConfig::default(), false)?;
    let binary = result.final_binary.expect("block should be found");
    assert!(binary.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    // Mostly paper, so black-on-white output is mostly white.
    let white = binary.pixels().filter(|p| p.0[0] == 255).count();
    assert!(white * 2 > binary.pixels().count());
    Ok(())
}

#[test]
fn test_blank_page_has_no_candidate() -> anyhow::Result<()> {
    let result = refine(&blank_page(), true, &RefineConfig::default(), false)?;
    assert!(result.best_quad.is_none());
    assert!(result.rectified.is_none());
    assert!(result.final_binary.is_none());
    assert_eq!(result.failure(), Some(FailureReason::NoCandidate));
    Ok(())
}

#[test]
fn test_polarity_flag_inverts_output() -> anyhow::Result<()> {
    let (page, _) = text_page();
    let config = RefineConfig::default();
    let black = refine(&page, true, &config, false)?.final_binary.expect("block");
    let white = refine(&page, false, &config, false)?.final_binary.expect("block");
    assert_eq!(preprocessing::invert(&black), white);
    Ok(())
}

#[test]
fn test_stages_are_recorded_in_order() -> anyhow::Result<()> {
    let (page, _) = text_page();
    let result = refine(&page, true, &RefineConfig::default(), true)?;
    let labels = result.stages.labels();
    assert_eq!(labels.first(), Some(&"refine: gray+clahe"));
    assert!(labels.contains(&"refine: candidates overlay"));
    assert_eq!(&labels[labels.len() - 2..], &["refine: warped", "refine: final bw"]);
    Ok(())
}

#[test]
fn test_solid_rectangle_is_the_candidate() -> anyhow::Result<()> {
    let mut page = image::RgbImage::from_pixel(500, 400, PAPER);
    let rect = BoundingBox {
        x: 92,
        y: 74,
        width: 316,
        height: 253,
    };
    fill_rect(&mut page, rect, INK);

    let result = refine(&page, true, &RefineConfig::default(), false)?;
    let quad = result.best_quad.expect("rectangle should be found");
    let (min_x, min_y, max_x, max_y) = quad_bounds(&quad);
    assert!(min_x <= rect.x as f32 && min_y <= rect.y as f32);
    assert!(max_x >= (rect.x + rect.width - 1) as f32);
    assert!(max_y >= (rect.y + rect.height - 1) as f32);

    // Merging grows the region but keeps it centered on the rectangle.
    let (cx, cy) = rect.center();
    assert!((((min_x + max_x) / 2.0) as f64 - cx).abs() < 10.0);
    assert!((((min_y + max_y) / 2.0) as f64 - cy).abs() < 10.0);

    let (w, h) = quad.rectified_size(MIN_RECTIFIED_SIDE);
    assert_eq!(result.final_binary.map(|b| b.dimensions()), Some((w, h)));
    Ok(())
}

#[test]
fn test_block_tilted_45_degrees_is_rectified() -> anyhow::Result<()> {
    // A 300x300 square turned by 45° about the page center.
    let page = image::RgbImage::from_fn(600, 600, |x, y| {
        let d = (x as i32 - 300).abs() + (y as i32 - 300).abs();
        if d <= 212 { INK } else { PAPER }
    });

    let result = refine(&page, true, &RefineConfig::default(), false)?;
    let quad = result.best_quad.expect("tilted block should be found");
    let pts = quad.points();
    for i in 0..4 {
        for j in i + 1..4 {
            assert_ne!(pts[i], pts[j], "corner repeated in {pts:?}");
        }
    }
    let expected = quad.rectified_size(MIN_RECTIFIED_SIDE);
    assert_eq!(result.final_binary.map(|b| b.dimensions()), Some(expected));
    Ok(())
}
