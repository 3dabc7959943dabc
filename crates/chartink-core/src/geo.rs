//! Geometry kernel: pure, stateless operations on lng/lat coordinates.
//!
//! Coordinates are `kurbo::Point` with `x` = longitude and `y` = latitude in
//! degrees; distances and areas are in meters unless noted otherwise.

use crate::features::Geometry;
use kurbo::{Point, Rect};

/// Earth radius in meters (mean).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Approximate meters per degree of latitude (equirectangular).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Segment count used for circle approximation.
pub const CIRCLE_SEGMENTS: usize = 64;

/// Close a ring by appending the first coordinate if it differs from the last.
pub fn close_ring(mut coords: Vec<Point>) -> Vec<Point> {
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last {
            coords.push(first);
        }
    }
    coords
}

/// Closed 5-coordinate rectangle ring from two opposite corners.
pub fn rectangle_from_corners(a: Point, b: Point) -> Vec<Point> {
    vec![
        Point::new(a.x, a.y),
        Point::new(b.x, a.y),
        Point::new(b.x, b.y),
        Point::new(a.x, b.y),
        Point::new(a.x, a.y),
    ]
}

/// Closed ring approximating a circle of `radius_meters` around `center`.
///
/// The radius is converted with the equirectangular meters-per-degree factor,
/// so the ring is circular in degree space rather than on the ellipsoid.
pub fn circle_approx(center: Point, radius_meters: f64, segments: usize) -> Vec<Point> {
    let radius_deg = radius_meters / METERS_PER_DEGREE;
    let mut coords = Vec::with_capacity(segments + 1);
    for i in 0..segments {
        let angle = (i as f64 / segments as f64) * std::f64::consts::TAU;
        coords.push(Point::new(
            center.x + radius_deg * angle.cos(),
            center.y + radius_deg * angle.sin(),
        ));
    }
    // Close exactly on the first coordinate; cos/sin of a full turn is not
    // bit-identical to the angle-zero vertex.
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    coords
}

/// Great-circle distance between two points in meters (haversine).
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    let lat1 = p1.y.to_radians();
    let lat2 = p2.y.to_radians();
    let dlat = (p2.y - p1.y).to_radians();
    let dlng = (p2.x - p1.x).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Total length of a polyline in meters.
pub fn polyline_length(coords: &[Point]) -> f64 {
    coords
        .windows(2)
        .map(|w| haversine_distance(w[0], w[1]))
        .sum()
}

/// Approximate polygon area in square meters.
///
/// Shoelace formula in degree space scaled by an equirectangular
/// meters-per-degree factor. The estimate degrades away from the equator and
/// for large polygons; treat the result as a rough operator-facing figure,
/// not ground truth.
pub fn polygon_area(coords: &[Point]) -> f64 {
    if coords.len() < 3 {
        return 0.0;
    }
    let n = coords.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += coords[i].x * coords[j].y;
        area -= coords[j].x * coords[i].y;
    }
    area.abs() / 2.0 * METERS_PER_DEGREE * METERS_PER_DEGREE
}

/// Arithmetic-mean center of a coordinate list.
pub fn polygon_centroid(coords: &[Point]) -> Point {
    if coords.is_empty() {
        return Point::ZERO;
    }
    let n = coords.len() as f64;
    let (sx, sy) = coords
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

/// Geographic bounding box of a coordinate list.
pub fn bounds_of(coords: &[Point]) -> Rect {
    if coords.is_empty() {
        return Rect::new(-180.0, -90.0, 180.0, 90.0);
    }
    let (mut min_x, mut min_y, mut max_x, mut max_y) =
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in coords {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Rect::new(min_x, min_y, max_x, max_y)
}

/// Planar distance in degrees between two points.
fn planar_distance(a: Point, b: Point) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// Planar distance in degrees from `point` to the segment `a`→`b`.
///
/// A zero-length segment falls back to the point-to-point distance.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < f64::EPSILON {
        return planar_distance(point, a);
    }
    let t = (((point.x - a.x) * dx + (point.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    planar_distance(point, Point::new(a.x + t * dx, a.y + t * dy))
}

/// Minimum planar distance in degrees from `point` to a polyline.
pub fn point_to_polyline_dist(point: Point, coords: &[Point]) -> f64 {
    coords
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

/// Simplify a polyline with Douglas-Peucker; `tolerance` is in degrees.
///
/// The first and last vertices are always retained, and no discarded vertex
/// deviates from the simplified path by more than `tolerance`.
pub fn simplify(coords: &[Point], tolerance: f64) -> Vec<Point> {
    if coords.len() <= 2 {
        return coords.to_vec();
    }

    let first = coords[0];
    let last = coords[coords.len() - 1];

    let mut max_distance = 0.0;
    let mut max_index = 0;
    for (i, &p) in coords.iter().enumerate().skip(1).take(coords.len() - 2) {
        let distance = point_to_segment_dist(p, first, last);
        if distance > max_distance {
            max_distance = distance;
            max_index = i;
        }
    }

    if max_distance > tolerance {
        let mut left = simplify(&coords[..=max_index], tolerance);
        let right = simplify(&coords[max_index..], tolerance);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Ray-casting point-in-polygon test against a ring.
///
/// Points exactly on the boundary are ambiguous by design: the crossing rule
/// may report either side.
pub fn point_in_polygon(point: Point, ring: &[Point]) -> bool {
    let (x, y) = (point.x, point.y);
    let mut inside = false;
    let n = ring.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (xi, yi) = (ring[i].x, ring[i].y);
        let (xj, yj) = (ring[j].x, ring[j].y);
        if ((yi > y) != (yj > y)) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Test whether a geometry intersects a geographic bounding box.
///
/// Points are tested for containment; lines match when any vertex lies inside
/// the box; polygons match when any vertex lies inside the box or any box
/// corner lies inside the polygon.
pub fn feature_intersects_bounds(geometry: &Geometry, bounds: Rect) -> bool {
    let contains = |p: &Point| {
        p.x >= bounds.x0 && p.x <= bounds.x1 && p.y >= bounds.y0 && p.y <= bounds.y1
    };
    match geometry {
        Geometry::Point(p) => contains(p),
        Geometry::LineString(pts) => pts.iter().any(contains),
        Geometry::Polygon(ring) => {
            if ring.iter().any(contains) {
                return true;
            }
            let corners = [
                Point::new(bounds.x0, bounds.y0),
                Point::new(bounds.x1, bounds.y0),
                Point::new(bounds.x1, bounds.y1),
                Point::new(bounds.x0, bounds.y1),
            ];
            corners.iter().any(|c| point_in_polygon(*c, ring))
        }
    }
}
