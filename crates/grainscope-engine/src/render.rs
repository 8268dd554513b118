//! Raster output: PNG encoding and contour overlays.
//!
//! Vector drawing goes through `tiny-skia`; its premultiplied pixmaps are
//! converted to straight-alpha `RgbaImage`s before encoding.

use image::{GrayImage, ImageEncoder, Rgba, RgbaImage};
use tiny_skia::{Paint, Path, PathBuilder, Pixmap, Stroke, Transform};

use crate::types::{Contour, Dimensions, EngineError, Point};

/// Encode a single-channel image as PNG.
///
/// # Errors
///
/// Returns [`EngineError::Encode`] if the encoder fails.
pub fn encode_png_gray(image: &GrayImage) -> Result<Vec<u8>, EngineError> {
    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::L8,
        )
        .map_err(|e| EngineError::Encode(e.to_string()))?;
    Ok(png)
}

/// Encode an RGBA image as PNG.
///
/// # Errors
///
/// Returns [`EngineError::Encode`] if the encoder fails.
pub fn encode_png_rgba(image: &RgbaImage) -> Result<Vec<u8>, EngineError> {
    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| EngineError::Encode(e.to_string()))?;
    Ok(png)
}

/// Draw every contour as a one-pixel white outline on black.
///
/// # Errors
///
/// - [`EngineError::InvalidInput`] if either dimension is zero.
/// - [`EngineError::Encode`] if PNG encoding fails.
pub fn render_contours(dimensions: Dimensions, contours: &[Contour]) -> Result<Vec<u8>, EngineError> {
    let mut pixmap = new_pixmap(dimensions)?;
    pixmap.fill(tiny_skia::Color::BLACK);

    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = false;
    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };

    for contour in contours {
        // Offset by half a pixel so outlines land on pixel centers.
        let points: Vec<Point> = contour
            .to_points()
            .into_iter()
            .map(|p| Point::new(p.x + 0.5, p.y + 0.5))
            .collect();
        if let Some(path) = ring_path(&points) {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    encode_png_rgba(&pixmap_to_rgba(&pixmap))
}

/// Allocate a transparent pixmap of `dimensions`.
pub(crate) fn new_pixmap(dimensions: Dimensions) -> Result<Pixmap, EngineError> {
    Pixmap::new(dimensions.width, dimensions.height).ok_or_else(|| {
        EngineError::invalid(format!(
            "cannot render a {}x{} image",
            dimensions.width, dimensions.height
        ))
    })
}

/// Closed path through `points`, or `None` with fewer than two points.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn ring_path(points: &[Point]) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.close();
    pb.finish()
}

/// Convert a premultiplied pixmap to a straight-alpha image.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let data = pixmap.data();
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (i, pixel) in img.pixels_mut().enumerate() {
        let off = i * 4;
        let a = data[off + 3];
        *pixel = if a == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            let unmul = |c: u8| (u16::from(c) * 255 / u16::from(a)) as u8;
            Rgba([unmul(data[off]), unmul(data[off + 1]), unmul(data[off + 2]), a])
        };
    }
    img
}
