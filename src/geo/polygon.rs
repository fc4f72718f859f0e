//! # Polygons
//!
//! Membership tests and geodesic areas for polygons given in degrees.
//!
//! Rings are lists of `(lng, lat)` pairs. A closing vertex equal to the first
//! one is allowed but not required.

use super::CandidatePoint;

/// Mean equatorial radius used for ring areas, in meters (WGS84).
pub const WGS84_RADIUS: f64 = 6_378_137.0;

/// A polygon with one exterior ring and any number of holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<(f64, f64)>,
    pub holes: Vec<Vec<(f64, f64)>>,
}

impl Polygon {
    pub fn new(exterior: Vec<(f64, f64)>, holes: Vec<Vec<(f64, f64)>>) -> Self {
        Self { exterior, holes }
    }

    /// Checks the point is inside the exterior and outside every hole.
    pub fn contains(&self, point: CandidatePoint) -> bool {
        ring_contains(&self.exterior, point) && !self.holes.iter().any(|h| ring_contains(h, point))
    }

    /// Geodesic area in square meters, holes subtracted.
    pub fn area(&self) -> f64 {
        let outer = ring_area(&self.exterior).abs();
        let holes: f64 = self.holes.iter().map(|h| ring_area(h).abs()).sum();
        outer - holes
    }

    /// Every vertex of every ring.
    pub fn vertices(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.exterior
            .iter()
            .chain(self.holes.iter().flatten())
            .copied()
    }
}

/// Even-odd ray casting test.
///
/// Casts a ray towards increasing longitude and counts edge crossings.
pub fn ring_contains(ring: &[(f64, f64)], point: CandidatePoint) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let (px, py) = (point.lng, point.lat);
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > py) != (yj > py) {
            let x_cross = xi + (py - yi) * (xj - xi) / (yj - yi);
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Signed spherical area of a ring in square meters.
///
/// The sign depends on winding; callers take the absolute value.
pub fn ring_area(ring: &[(f64, f64)]) -> f64 {
    let n = ring.len();
    if n <= 2 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..n {
        let (lower, middle, upper) = if i == n - 2 {
            (n - 2, n - 1, 0)
        } else if i == n - 1 {
            (n - 1, 0, 1)
        } else {
            (i, i + 1, i + 2)
        };
        let p1 = ring[lower];
        let p2 = ring[middle];
        let p3 = ring[upper];
        area += (p3.0.to_radians() - p1.0.to_radians()) * p2.1.to_radians().sin();
    }
    area * WGS84_RADIUS * WGS84_RADIUS / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> Vec<(f64, f64)> {
        vec![(min, min), (max, min), (max, max), (min, max), (min, min)]
    }

    #[test]
    fn test_ring_contains() {
        let ring = square(0.0, 10.0);
        assert!(ring_contains(&ring, CandidatePoint::new(5.0, 5.0)));
        assert!(!ring_contains(&ring, CandidatePoint::new(15.0, 5.0)));
        assert!(!ring_contains(&ring, CandidatePoint::new(5.0, -1.0)));
    }

    #[test]
    fn test_concave_ring() {
        // U shape open to the north
        let ring = vec![
            (0.0, 0.0),
            (3.0, 0.0),
            (3.0, 3.0),
            (2.0, 3.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 3.0),
            (0.0, 3.0),
        ];
        assert!(ring_contains(&ring, CandidatePoint::new(0.5, 2.0)));
        assert!(ring_contains(&ring, CandidatePoint::new(2.5, 2.0)));
        assert!(!ring_contains(&ring, CandidatePoint::new(1.5, 2.0)));
    }

    #[test]
    fn test_holes_are_excluded() {
        let polygon = Polygon::new(square(0.0, 10.0), vec![square(4.0, 6.0)]);
        assert!(polygon.contains(CandidatePoint::new(2.0, 2.0)));
        assert!(!polygon.contains(CandidatePoint::new(5.0, 5.0)));
    }

    #[test]
    fn test_degenerate_ring() {
        assert!(!ring_contains(&[(0.0, 0.0), (1.0, 1.0)], CandidatePoint::new(0.5, 0.5)));
        assert_eq!(ring_area(&[(0.0, 0.0), (1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_one_degree_square_area_at_equator() {
        // about 111.3km x 111.3km on the WGS84 sphere
        let area = Polygon::new(square(0.0, 1.0), Vec::new()).area();
        assert!((area - 1.2391e10).abs() / 1.2391e10 < 0.01, "area {}", area);
    }

    #[test]
    fn test_hole_reduces_area() {
        let full = Polygon::new(square(0.0, 10.0), Vec::new()).area();
        let holed = Polygon::new(square(0.0, 10.0), vec![square(4.0, 6.0)]).area();
        assert!(holed < full);
        assert!(holed > 0.0);
    }
}
