//! Contour tracing: extract grain boundaries from a binary mask.
//!
//! Uses Suzuki-Abe border following via
//! `imageproc::contours::find_contours` and keeps only the outermost
//! borders. Holes inside grains, and anything nested inside those holes,
//! are not tracked separately.

use image::GrayImage;
use imageproc::contours::BorderType;

use crate::types::{Contour, PixelPoint};

/// Trace the outer boundary of every top-level foreground region.
///
/// Input: a binary mask (non-zero pixels = foreground).
/// Output: one closed contour per external connected region, in the
/// border-following scan order (top-to-bottom, left-to-right by first
/// boundary pixel).
#[must_use]
pub fn trace_external(mask: &GrayImage) -> Vec<Contour> {
    let contours: Vec<imageproc::contours::Contour<i32>> =
        imageproc::contours::find_contours(mask);

    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| PixelPoint::new(p.x, p.y))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_rect(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, image::Luma([255]));
            }
        }
    }

    #[test]
    fn empty_mask_produces_no_contours() {
        let img = GrayImage::new(10, 10);
        assert!(trace_external(&img).is_empty());
    }

    #[test]
    fn two_separate_regions_produce_two_contours() {
        let mut img = GrayImage::new(30, 15);
        fill_rect(&mut img, 2, 2, 10, 10);
        fill_rect(&mut img, 15, 2, 25, 12);
        let contours = trace_external(&img);
        assert_eq!(contours.len(), 2);
        for contour in &contours {
            assert!(contour.len() >= 4, "rectangle contour too short");
        }
    }

    #[test]
    fn hole_and_island_inside_are_not_tracked() {
        // A ring with a separate island inside its hole: only the ring's
        // outer border counts.
        let mut img = GrayImage::new(30, 30);
        fill_rect(&mut img, 2, 2, 28, 28);
        for y in 6..24 {
            for x in 6..24 {
                img.put_pixel(x, y, image::Luma([0]));
            }
        }
        fill_rect(&mut img, 12, 12, 18, 18);

        let contours = trace_external(&img);
        assert_eq!(contours.len(), 1);
        let xs: Vec<i32> = contours[0].points().iter().map(|p| p.x).collect();
        assert_eq!(xs.iter().min(), Some(&2));
        assert_eq!(xs.iter().max(), Some(&27));
    }
}
