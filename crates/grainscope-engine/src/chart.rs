//! Synthetic comparison charts for visual grain-size estimation.
//!
//! For each requested grain-size number the expected grain density at
//! the sample's magnification fixes how many sites are scattered over an
//! image of the sample's size. The sites are relaxed with Lloyd's
//! algorithm so the cells look like equiaxed grains, then the diagram is
//! drawn with shaded cells, black boundaries and a small label.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tiny_skia::{FillRule, LineJoin, Paint, Pixmap, Rect, Stroke, Transform};

use crate::astm::{REFERENCE_MAGNIFICATION, check_magnification, validate_g};
use crate::config::ChartConfig;
use crate::render::{encode_png_rgba, new_pixmap, pixmap_to_rgba, ring_path};
use crate::types::{Dimensions, EngineError, Point, Prerequisite};
use crate::voronoi::{lloyd_relax, voronoi_cells};

/// Fewest sites scattered for any chart.
pub const MIN_POINTS: usize = 4;

/// Most sites scattered for any chart.
pub const MAX_POINTS: usize = 2000;

/// Pixel area the density is expressed against.
const AREA_UNIT_PX: f64 = 1e6;

/// Width of cell boundaries in pixels.
const BOUNDARY_WIDTH: f32 = 1.5;

/// Gray levels used for cell shading.
const SHADE_RANGE: std::ops::RangeInclusive<u8> = 90..=230;

/// One rendered chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonChart {
    /// The grain-size number the chart depicts.
    pub g: i32,
    /// PNG bytes at the sample's image size.
    pub png: Vec<u8>,
}

/// Number of sites for grain-size number `g`.
///
/// `round(2^(g-1) * (magnification/100)^2 * area_px / 1e6)`, clamped to
/// `[MIN_POINTS, MAX_POINTS]`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn point_count(g: i32, magnification: f64, dimensions: Dimensions) -> usize {
    let n_a = 2f64.powi(g - 1) * (magnification / REFERENCE_MAGNIFICATION).powi(2);
    let expected = (n_a * dimensions.area() / AREA_UNIT_PX).round();
    if expected.is_nan() || expected <= MIN_POINTS as f64 {
        MIN_POINTS
    } else if expected >= MAX_POINTS as f64 {
        MAX_POINTS
    } else {
        expected as usize
    }
}

/// Render one chart per entry of `g_values`.
///
/// Parameters are validated before any rendering: magnification first,
/// then every grain-size number, then the config, then the image
/// dimensions.
///
/// # Errors
///
/// - [`EngineError::InvalidInput`] if `magnification` is not positive,
///   `g_values` is empty, any value is outside `(0, 15)`, or the Lloyd
///   iteration count is outside [`ChartConfig::ITERATION_RANGE`].
/// - [`EngineError::MissingPrerequisite`] if `dimensions` is `None`.
/// - [`EngineError::Encode`] if PNG encoding fails.
pub fn synthesize_charts(
    dimensions: Option<Dimensions>,
    magnification: f64,
    g_values: &[i32],
    config: &ChartConfig,
) -> Result<Vec<ComparisonChart>, EngineError> {
    check_magnification(magnification)?;
    if g_values.is_empty() {
        return Err(EngineError::invalid("no grain-size numbers requested"));
    }
    for &g in g_values {
        validate_g(f64::from(g))?;
    }
    config.validate()?;
    let dimensions =
        dimensions.ok_or(EngineError::MissingPrerequisite(Prerequisite::ImageDimensions))?;
    if dimensions.width == 0 || dimensions.height == 0 {
        return Err(EngineError::invalid("image has zero area"));
    }

    g_values
        .iter()
        .map(|&g| {
            let png = render_chart(g, magnification, dimensions, config)?;
            Ok(ComparisonChart { g, png })
        })
        .collect()
}

fn render_chart(
    g: i32,
    magnification: f64,
    dimensions: Dimensions,
    config: &ChartConfig,
) -> Result<Vec<u8>, EngineError> {
    let mut rng = StdRng::seed_from_u64(config.seed ^ u64::from(g.unsigned_abs()));
    let (w, h) = (f64::from(dimensions.width), f64::from(dimensions.height));

    let count = point_count(g, magnification, dimensions);
    let scattered: Vec<Point> = (0..count)
        .map(|_| Point::new(rng.gen_range(0.0..w), rng.gen_range(0.0..h)))
        .collect();
    let sites = lloyd_relax(&scattered, dimensions, config.iterations);
    let cells = voronoi_cells(&sites, dimensions);

    let mut pixmap = new_pixmap(dimensions)?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let mut fill = Paint::default();
    fill.anti_alias = true;
    for cell in cells.iter().filter(|c| c.bounded) {
        let shade = rng.gen_range(SHADE_RANGE);
        fill.set_color_rgba8(shade, shade, shade, 255);
        if let Some(path) = ring_path(&cell.polygon) {
            pixmap.fill_path(&path, &fill, FillRule::Winding, Transform::identity(), None);
        }
    }

    let mut ink = Paint::default();
    ink.set_color_rgba8(0, 0, 0, 255);
    ink.anti_alias = true;
    let stroke = Stroke {
        width: BOUNDARY_WIDTH,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    for cell in &cells {
        if let Some(path) = ring_path(&cell.polygon) {
            pixmap.stroke_path(&path, &ink, &stroke, Transform::identity(), None);
        }
    }

    let g_label = format!("G={g}");
    let magnification_label = format!("{magnification}X");
    draw_label(&mut pixmap, &[g_label.as_str(), magnification_label.as_str()]);

    tracing::debug!(g, sites = count, "rendered comparison chart");
    encode_png_rgba(&pixmap_to_rgba(&pixmap))
}

// ---------------------------------------------------------------------------
// Label text
// ---------------------------------------------------------------------------

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SCALE: u32 = 2;
const LABEL_PADDING: u32 = 4;

/// 5×7 bitmap rows, most significant of the low five bits leftmost.
const fn glyph(c: char) -> Option<[u8; 7]> {
    Some(match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        _ => return None,
    })
}

/// Draw `lines` in black on a white box in the top-left corner.
/// Characters without a glyph leave a gap.
#[allow(clippy::cast_precision_loss)]
fn draw_label(pixmap: &mut Pixmap, lines: &[&str]) {
    let advance = (GLYPH_WIDTH + 1) * GLYPH_SCALE;
    let line_height = (GLYPH_HEIGHT + 2) * GLYPH_SCALE;
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let chars = u32::try_from(longest).unwrap_or(u32::MAX);
    let rows = u32::try_from(lines.len()).unwrap_or(u32::MAX);

    let mut paint = Paint::default();
    paint.anti_alias = false;

    paint.set_color_rgba8(255, 255, 255, 255);
    if let Some(bg) = Rect::from_xywh(
        0.0,
        0.0,
        chars.saturating_mul(advance).saturating_add(2 * LABEL_PADDING) as f32,
        rows.saturating_mul(line_height).saturating_add(2 * LABEL_PADDING) as f32,
    ) {
        pixmap.fill_rect(bg, &paint, Transform::identity(), None);
    }

    paint.set_color_rgba8(0, 0, 0, 255);
    for (row, line) in (0_u32..).zip(lines) {
        for (col, c) in (0_u32..).zip(line.chars()) {
            let Some(bitmap) = glyph(c) else { continue };
            let x0 = LABEL_PADDING + col * advance;
            let y0 = LABEL_PADDING + row * line_height;
            for (gy, bits) in (0_u32..).zip(bitmap) {
                for gx in 0..GLYPH_WIDTH {
                    if bits & (0x10 >> gx) == 0 {
                        continue;
                    }
                    if let Some(dot) = Rect::from_xywh(
                        (x0 + gx * GLYPH_SCALE) as f32,
                        (y0 + gy * GLYPH_SCALE) as f32,
                        GLYPH_SCALE as f32,
                        GLYPH_SCALE as f32,
                    ) {
                        pixmap.fill_rect(dot, &paint, Transform::identity(), None);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grayscale::decode_and_grayscale;

    const DIMS: Dimensions = Dimensions::new(200, 150);

    #[test]
    fn point_count_follows_density_and_clamps() {
        let dims = Dimensions::new(1000, 1000);
        // 2^(8-1) = 128 grains per unit area at 100X.
        assert_eq!(point_count(8, 100.0, dims), 128);
        // Doubling magnification quadruples the count.
        assert_eq!(point_count(8, 200.0, dims), 512);
        assert_eq!(point_count(1, 100.0, dims), MIN_POINTS);
        assert_eq!(point_count(14, 400.0, dims), MAX_POINTS);
    }

    #[test]
    fn one_chart_per_requested_g_at_image_size() {
        let charts = synthesize_charts(Some(DIMS), 100.0, &[3, 5], &ChartConfig::default()).unwrap();
        assert_eq!(charts.iter().map(|c| c.g).collect::<Vec<_>>(), vec![3, 5]);
        for chart in &charts {
            let gray = decode_and_grayscale(&chart.png).unwrap();
            assert_eq!(gray.dimensions(), (200, 150));
            // Boundaries are drawn somewhere.
            assert!(gray.pixels().any(|p| p.0[0] < 50));
        }
    }

    #[test]
    fn same_seed_same_image() {
        let config = ChartConfig { seed: 42, iterations: 3 };
        let a = synthesize_charts(Some(DIMS), 100.0, &[6], &config).unwrap();
        let b = synthesize_charts(Some(DIMS), 100.0, &[6], &config).unwrap();
        assert_eq!(a, b);
        let other = ChartConfig { seed: 43, iterations: 3 };
        let c = synthesize_charts(Some(DIMS), 100.0, &[6], &other).unwrap();
        assert_ne!(a[0].png, c[0].png);
    }

    #[test]
    fn label_is_drawn_top_left() {
        let charts = synthesize_charts(Some(DIMS), 100.0, &[2], &ChartConfig::default()).unwrap();
        let gray = decode_and_grayscale(&charts[0].png).unwrap();
        // Label box background and at least one glyph dot.
        assert_eq!(gray.get_pixel(1, 1).0[0], 255);
        let ink = (LABEL_PADDING..LABEL_PADDING + 14)
            .flat_map(|y| (LABEL_PADDING..LABEL_PADDING + 30).map(move |x| (x, y)))
            .filter(|&(x, y)| gray.get_pixel(x, y).0[0] == 0)
            .count();
        assert!(ink > 0);
    }

    #[test]
    fn parameters_validated_before_dimensions() {
        let cfg = ChartConfig::default();
        assert!(matches!(
            synthesize_charts(None, 0.0, &[5], &cfg),
            Err(EngineError::InvalidInput(_))
        ));
        for bad in [0, 15, -3] {
            assert!(matches!(
                synthesize_charts(None, 100.0, &[5, bad], &cfg),
                Err(EngineError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            synthesize_charts(None, 100.0, &[], &cfg),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            synthesize_charts(None, 100.0, &[5], &cfg),
            Err(EngineError::MissingPrerequisite(Prerequisite::ImageDimensions))
        ));
    }

    #[test]
    fn unrelaxed_or_runaway_iteration_counts_are_rejected() {
        let dims = Some(Dimensions::new(64, 48));
        for iterations in [0, 6, u32::MAX] {
            let cfg = ChartConfig { seed: 1, iterations };
            assert!(matches!(
                synthesize_charts(dims, 100.0, &[5], &cfg),
                Err(EngineError::InvalidInput(_))
            ));
        }
        let cfg = ChartConfig { seed: 1, iterations: 5 };
        assert_eq!(synthesize_charts(dims, 100.0, &[5], &cfg).unwrap().len(), 1);
    }

    #[test]
    fn every_label_character_has_a_glyph() {
        for c in "G=0123456789X.-".chars() {
            assert!(glyph(c).is_some(), "{c}");
        }
        assert!(glyph('?').is_none());
    }
}
