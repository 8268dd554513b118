//! Voronoi cells and Lloyd relaxation for synthetic microstructures.
//!
//! Each cell is built by clipping a large frame around the image with
//! the bisector half-plane of every nearby site. Neighbors come from an
//! R-tree in increasing distance; once a neighbor is more than twice the
//! current cell radius away it can no longer cut the cell, so the scan
//! stops there.
//!
//! Cells that reach the frame are the unbounded cells of the true
//! diagram (truncated); they are flagged so relaxation can leave their
//! sites alone.

use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::geometry::{polygon_centroid, polygon_in_bounds};
use crate::types::{Dimensions, Point};

/// Frame margin around the image, as a multiple of its larger side.
const FRAME_MARGIN: f64 = 4.0;

/// Relative tolerance for deciding that a vertex lies on the frame.
const FRAME_TOLERANCE: f64 = 1e-9;

type IndexedSite = GeomWithData<[f64; 2], usize>;

/// One Voronoi region.
#[derive(Debug, Clone, PartialEq)]
pub struct VoronoiCell {
    /// Index of the generating site.
    pub site: usize,
    /// Cell vertices, counter-clockwise in a y-up frame, not closed.
    /// Unbounded cells are truncated at the frame.
    pub polygon: Vec<Point>,
    /// `false` if the cell extends to infinity.
    pub bounded: bool,
}

/// Axis-aligned frame used to truncate unbounded cells.
#[derive(Debug, Clone, Copy)]
struct Frame {
    min: Point,
    max: Point,
}

impl Frame {
    fn around(bounds: Dimensions) -> Self {
        let (w, h) = (f64::from(bounds.width), f64::from(bounds.height));
        let margin = FRAME_MARGIN * w.max(h).max(1.0);
        Self {
            min: Point::new(-margin, -margin),
            max: Point::new(w + margin, h + margin),
        }
    }

    fn polygon(self) -> Vec<Point> {
        vec![
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    fn touches(self, p: Point) -> bool {
        let tol = FRAME_TOLERANCE * (self.max.x - self.min.x).max(self.max.y - self.min.y);
        (p.x - self.min.x).abs() <= tol
            || (p.x - self.max.x).abs() <= tol
            || (p.y - self.min.y).abs() <= tol
            || (p.y - self.max.y).abs() <= tol
    }
}

/// Compute the Voronoi cell of every site.
///
/// Sites are expected inside (or near) `bounds`. Sites that coincide
/// exactly with an earlier site get an empty cell.
#[must_use]
pub fn voronoi_cells(sites: &[Point], bounds: Dimensions) -> Vec<VoronoiCell> {
    let frame = Frame::around(bounds);
    let tree = RTree::bulk_load(
        sites
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedSite::new([p.x, p.y], i))
            .collect(),
    );

    sites
        .iter()
        .enumerate()
        .map(|(i, &site)| {
            let mut polygon = frame.polygon();
            let mut radius = cell_radius(&polygon, site);
            for neighbor in tree.nearest_neighbor_iter(&[site.x, site.y]) {
                let j = neighbor.data;
                if j == i {
                    continue;
                }
                let other = Point::new(neighbor.geom()[0], neighbor.geom()[1]);
                let distance = site.distance(other);
                if distance > 2.0 * radius {
                    break;
                }
                if distance == 0.0 {
                    if j < i {
                        polygon.clear();
                        break;
                    }
                    continue;
                }
                polygon = clip_to_bisector(&polygon, site, other);
                if polygon.is_empty() {
                    break;
                }
                radius = cell_radius(&polygon, site);
            }

            let bounded = !polygon.is_empty() && !polygon.iter().any(|&v| frame.touches(v));
            VoronoiCell {
                site: i,
                polygon,
                bounded,
            }
        })
        .collect()
}

/// One Lloyd iteration.
///
/// A site moves to its cell's centroid only when the cell is bounded,
/// lies entirely inside `bounds` and has a non-zero area; every other
/// site keeps its position.
#[must_use]
pub fn lloyd_step(sites: &[Point], bounds: Dimensions) -> Vec<Point> {
    let cells = voronoi_cells(sites, bounds);
    let mut moved = 0_usize;
    let next = sites
        .iter()
        .zip(&cells)
        .map(|(&site, cell)| {
            if !cell.bounded || !polygon_in_bounds(&cell.polygon, bounds) {
                return site;
            }
            polygon_centroid(&cell.polygon).map_or(site, |c| {
                moved += 1;
                c
            })
        })
        .collect();
    tracing::trace!(moved, sites = sites.len(), "lloyd step");
    next
}

/// Run `iterations` Lloyd steps.
#[must_use]
pub fn lloyd_relax(sites: &[Point], bounds: Dimensions, iterations: u32) -> Vec<Point> {
    (0..iterations).fold(sites.to_vec(), |current, _| lloyd_step(&current, bounds))
}

/// Farthest vertex distance from `site`.
fn cell_radius(polygon: &[Point], site: Point) -> f64 {
    polygon.iter().map(|v| v.distance(site)).fold(0.0, f64::max)
}

/// Keep the part of `polygon` closer to `site` than to `other`
/// (Sutherland-Hodgman against the perpendicular bisector).
fn clip_to_bisector(polygon: &[Point], site: Point, other: Point) -> Vec<Point> {
    let normal = Point::new(other.x - site.x, other.y - site.y);
    let mid = Point::new((site.x + other.x) / 2.0, (site.y + other.y) / 2.0);
    // Positive means on `other`'s side.
    let side = |p: Point| (p.x - mid.x).mul_add(normal.x, (p.y - mid.y) * normal.y);

    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (k, &current) in polygon.iter().enumerate() {
        let next = polygon[(k + 1) % polygon.len()];
        let (sc, sn) = (side(current), side(next));
        if sc <= 0.0 {
            out.push(current);
        }
        if (sc < 0.0 && sn > 0.0) || (sc > 0.0 && sn < 0.0) {
            let t = sc / (sc - sn);
            out.push(Point::new(
                t.mul_add(next.x - current.x, current.x),
                t.mul_add(next.y - current.y, current.y),
            ));
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::geometry::contour_area;

    /// Sites at the centers of a `n × n` grid of `cell`-sized squares.
    fn grid(n: u32, cell: f64) -> Vec<Point> {
        let mut sites = Vec::new();
        for j in 0..n {
            for i in 0..n {
                sites.push(Point::new(
                    (f64::from(i) + 0.5) * cell,
                    (f64::from(j) + 0.5) * cell,
                ));
            }
        }
        sites
    }

    #[test]
    fn grid_cells_are_squares() {
        let sites = grid(5, 10.0);
        let cells = voronoi_cells(&sites, Dimensions::new(50, 50));
        // Site 12 is the middle of the 5×5 grid.
        let middle = &cells[12];
        assert!(middle.bounded);
        assert_abs_diff_eq!(contour_area(&middle.polygon), 100.0, epsilon = 1e-9);
        let c = polygon_centroid(&middle.polygon).unwrap();
        assert_abs_diff_eq!(c.x, 25.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.y, 25.0, epsilon = 1e-9);
        // Corner cells reach the frame.
        assert!(!cells[0].bounded);
    }

    #[test]
    fn bounded_cells_tile_their_hull() {
        let sites = grid(6, 10.0);
        let cells = voronoi_cells(&sites, Dimensions::new(60, 60));
        let bounded_area: f64 = cells
            .iter()
            .filter(|c| c.bounded)
            .map(|c| contour_area(&c.polygon))
            .sum();
        // The inner 4×4 block of cells.
        assert_abs_diff_eq!(bounded_area, 1600.0, epsilon = 1e-6);
    }

    #[test]
    fn two_sites_split_the_frame() {
        let sites = vec![Point::new(10.0, 50.0), Point::new(90.0, 50.0)];
        let cells = voronoi_cells(&sites, Dimensions::new(100, 100));
        assert!(cells.iter().all(|c| !c.bounded));
        assert!(cells[0].polygon.iter().all(|p| p.x <= 50.0 + 1e-9));
        assert!(cells[1].polygon.iter().all(|p| p.x >= 50.0 - 1e-9));
    }

    #[test]
    fn duplicate_site_gets_empty_cell() {
        let sites = vec![Point::new(10.0, 10.0), Point::new(10.0, 10.0), Point::new(30.0, 30.0)];
        let cells = voronoi_cells(&sites, Dimensions::new(40, 40));
        assert!(!cells[0].polygon.is_empty());
        assert!(cells[1].polygon.is_empty());
        assert!(!cells[1].bounded);
    }

    #[test]
    fn centroidal_grid_is_a_fixed_point() {
        let sites = grid(10, 10.0);
        let bounds = Dimensions::new(100, 100);
        let next = lloyd_step(&sites, bounds);
        for (a, b) in sites.iter().zip(&next) {
            assert!(a.distance(*b) < 1e-9, "{a:?} moved to {b:?}");
        }
    }

    #[test]
    fn perturbed_site_moves_toward_centroid() {
        let mut sites = grid(5, 10.0);
        sites[12] = Point::new(27.0, 24.0);
        let next = lloyd_step(&sites, Dimensions::new(50, 50));
        let before = sites[12].distance(Point::new(25.0, 25.0));
        let after = next[12].distance(Point::new(25.0, 25.0));
        assert!(after < before, "{before} -> {after}");
        // Unbounded corner cells stay put.
        assert_eq!(next[0], sites[0]);
    }

    #[test]
    fn relax_preserves_site_count() {
        let sites = grid(4, 25.0);
        let relaxed = lloyd_relax(&sites, Dimensions::new(100, 100), 3);
        assert_eq!(relaxed.len(), sites.len());
        assert_eq!(lloyd_relax(&sites, Dimensions::new(100, 100), 0), sites);
    }
}
