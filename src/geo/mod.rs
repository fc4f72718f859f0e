//! # Geo Module
//!
//! Coordinates and planar geometry in longitude/latitude degrees.
//!
//! Two coordinate types exist on purpose. A [`CandidatePoint`] is a raw sample
//! in GeoJSON order (longitude first) that has not been checked against the
//! imagery oracle. A [`LatLng`] is what the oracle hands back and what ends up
//! in persisted state.

pub mod polygon;

pub use polygon::*;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A confirmed position as stored in shared state: `{lat, lng}`.
///
/// # Examples
///
/// ```
/// use roundgen::LatLng;
///
/// let pos = LatLng::new(51.5, -0.12);
/// assert!(pos.is_valid());
/// assert!(!LatLng::new(91.0, 0.0).is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new position.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Checks that latitude is in [-90, 90] and longitude in [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// An unvalidated sampled coordinate, longitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidatePoint {
    pub lng: f64,
    pub lat: f64,
}

impl CandidatePoint {
    /// Creates a new candidate point.
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Builds a candidate from a GeoJSON `[lng, lat]` pair.
    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }

    /// The same coordinate in `{lat, lng}` form.
    pub fn to_lat_lng(self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

impl From<[f64; 2]> for CandidatePoint {
    fn from(pair: [f64; 2]) -> Self {
        Self::from_lng_lat(pair)
    }
}

/// Axis-aligned box in degrees, `[min_lng, min_lat, max_lng, max_lat]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Creates a bounding box from its corners.
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// Smallest box enclosing all points, or None for an empty iterator.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut points = points.into_iter();
        let (lng, lat) = points.next()?;
        let mut bbox = Self::new(lng, lat, lng, lat);
        for (lng, lat) in points {
            bbox.min_lng = bbox.min_lng.min(lng);
            bbox.min_lat = bbox.min_lat.min(lat);
            bbox.max_lng = bbox.max_lng.max(lng);
            bbox.max_lat = bbox.max_lat.max(lat);
        }
        Some(bbox)
    }

    /// Checks the box is finite and not inverted.
    pub fn is_well_formed(&self) -> bool {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lng <= self.max_lng
            && self.min_lat <= self.max_lat
    }

    /// Checks if a point lies inside the box (edges included).
    pub fn contains(&self, point: CandidatePoint) -> bool {
        point.lng >= self.min_lng
            && point.lng <= self.max_lng
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }

    /// Draws a point uniformly in longitude/latitude inside the box.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> CandidatePoint {
        let lng = self.min_lng + rng.gen::<f64>() * (self.max_lng - self.min_lng);
        let lat = self.min_lat + rng.gen::<f64>() * (self.max_lat - self.min_lat);
        CandidatePoint::new(lng, lat)
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(raw: [f64; 4]) -> Self {
        Self::new(raw[0], raw[1], raw[2], raw[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.min_lng, bbox.min_lat, bbox.max_lng, bbox.max_lat]
    }
}

/// Wraps a longitude in degrees into [-180, 180].
pub fn wrap_longitude(lng: f64) -> f64 {
    let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lng > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Draws a point uniformly distributed over the surface of the sphere.
///
/// Sampling latitude uniformly would oversample the poles, so the inclination
/// is drawn as `acos(2v - 1)` instead.
pub fn random_point_on_sphere<R: Rng + ?Sized>(rng: &mut R) -> CandidatePoint {
    let u: f64 = rng.gen();
    let v: f64 = rng.gen();
    let theta = 2.0 * std::f64::consts::PI * u;
    let phi = (2.0 * v - 1.0).clamp(-1.0, 1.0).acos();

    let lat = phi.to_degrees() - 90.0;
    let lng = wrap_longitude(theta.to_degrees());
    CandidatePoint::new(lng, lat)
}
