//! # Shapes Module
//!
//! Named, weighted geographic regions used to steer location sampling.
//!
//! Shapes are published as a directory of GeoJSON feature documents plus an
//! `index.json` mapping each shape name to its document. They are fetched
//! lazily through a [`ShapeSource`] and kept in a [`ShapeCache`] for the rest
//! of the session.

pub mod cache;
pub mod convert;
pub mod feature;
pub mod source;

pub use cache::*;
pub use convert::*;
pub use feature::*;
pub use source::*;

use crate::geo::{BoundingBox, CandidatePoint, Polygon};
use crate::{RoundgenError, RoundgenResult};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a shape document lives, relative to the shape base location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    pub relative_path: String,
}

impl ShapeDescriptor {
    pub fn new(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
        }
    }
}

/// Contents of `index.json`: shape name to document location.
pub type ShapeIndex = BTreeMap<String, ShapeDescriptor>;

/// Properties carried by every shape document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeProperties {
    pub name: String,
    pub area: f64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A named geographic region with an area weight and a membership test.
///
/// Shapes are immutable once built and are shared behind `Arc` between the
/// cache and any running generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    name: String,
    area: f64,
    kind: Option<String>,
    bbox: BoundingBox,
    polygons: Vec<Polygon>,
}

impl Shape {
    /// Creates a shape, validating its area and bounding box.
    pub fn new(
        name: impl Into<String>,
        area: f64,
        bbox: BoundingBox,
        polygons: Vec<Polygon>,
    ) -> RoundgenResult<Self> {
        let name = name.into();
        if !area.is_finite() || area < 0.0 {
            return Err(RoundgenError::DataIntegrity(format!(
                "shape {} has invalid area {}",
                name, area
            )));
        }
        if !bbox.is_well_formed() {
            return Err(RoundgenError::DataIntegrity(format!(
                "shape {} has invalid bounding box {:?}",
                name, bbox
            )));
        }
        Ok(Self {
            name,
            area,
            kind: None,
            bbox,
            polygons,
        })
    }

    /// Builds a shape from a parsed feature document.
    ///
    /// A missing `bbox` is computed from the coordinates.
    pub fn from_feature(feature: Feature<ShapeProperties>) -> RoundgenResult<Self> {
        let polygons = feature.geometry.polygons()?;
        let bbox = match feature.bbox {
            Some(bbox) => bbox,
            None => feature.geometry.bbox()?,
        };
        let mut shape = Self::new(feature.properties.name, feature.properties.area, bbox, polygons)?;
        shape.kind = feature.properties.kind;
        Ok(shape)
    }

    /// Parses a shape document.
    ///
    /// # Examples
    ///
    /// ```
    /// use roundgen::Shape;
    ///
    /// let shape = Shape::from_json(r#"{
    ///     "type": "Feature",
    ///     "bbox": [0.0, 0.0, 1.0, 1.0],
    ///     "properties": {"name": "Square", "area": 2.5, "type": "test"},
    ///     "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
    /// }"#).unwrap();
    /// assert_eq!(shape.name(), "Square");
    /// assert_eq!(shape.area(), 2.5);
    /// ```
    pub fn from_json(document: &str) -> RoundgenResult<Self> {
        let feature: Feature<ShapeProperties> = serde_json::from_str(document)
            .map_err(|e| RoundgenError::DataIntegrity(format!("unparseable shape document: {}", e)))?;
        Self::from_feature(feature)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// The `type` property, e.g. `continent`.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Checks if a point lies inside any of the shape's polygons.
    pub fn contains(&self, point: CandidatePoint) -> bool {
        self.polygons.iter().any(|p| p.contains(point))
    }

    /// Draws a uniform point from the bounding box until one lands inside the
    /// shape.
    ///
    /// Running out of attempts means the box is a pathologically poor fit for
    /// the shape and is reported as a data integrity failure.
    pub fn random_point_within<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        max_attempts: u64,
    ) -> RoundgenResult<CandidatePoint> {
        for _ in 0..max_attempts {
            let point = self.bbox.random_point(rng);
            if self.contains(point) {
                return Ok(point);
            }
        }
        log::error!(
            "No point found inside shape {} after {} attempts; its bounding box is a poor fit",
            self.name,
            max_attempts
        );
        Err(RoundgenError::DataIntegrity(format!(
            "could not sample a point inside shape {}",
            self.name
        )))
    }
}

/// The geometry source: fetches the shape index and shape documents.
#[async_trait]
pub trait ShapeSource: Send + Sync {
    /// Fetches `index.json`.
    async fn fetch_index(&self) -> RoundgenResult<ShapeIndex>;

    /// Fetches and parses one shape document.
    async fn fetch_shape(&self, relative_path: &str) -> RoundgenResult<Shape>;
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_shape_from_json_computes_missing_bbox() {
        let shape = Shape::from_json(
            r#"{
                "type": "Feature",
                "properties": {"name": "Tri", "area": 1.0},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[0,3],[0,0]]]}
            }"#,
        )
        .unwrap();
        assert_eq!(shape.bbox(), BoundingBox::new(0.0, 0.0, 4.0, 3.0));
        assert_eq!(shape.kind(), None);
    }

    #[test]
    fn test_shape_from_bad_json() {
        assert!(matches!(
            Shape::from_json("{\"type\": \"Feature\"}"),
            Err(RoundgenError::DataIntegrity(_))
        ));
        assert!(matches!(
            Shape::from_json("not json"),
            Err(RoundgenError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_negative_area_is_rejected() {
        let doc = square_document("Bad", -1.0, 0.0, 1.0);
        assert!(matches!(
            Shape::from_json(&doc),
            Err(RoundgenError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_random_point_within_triangle() {
        let shape = Shape::from_json(
            r#"{
                "type": "Feature",
                "properties": {"name": "Tri", "area": 1.0},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[0,3],[0,0]]]}
            }"#,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let point = shape.random_point_within(&mut rng, 10_000).unwrap();
            assert!(shape.contains(point));
        }
    }

    #[test]
    fn test_random_point_within_gives_up() {
        // box that does not overlap the polygon at all
        let ring = vec![(10.0, 10.0), (11.0, 10.0), (11.0, 11.0), (10.0, 10.0)];
        let shape = Shape::new(
            "Offset",
            1.0,
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            vec![Polygon::new(ring, Vec::new())],
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            shape.random_point_within(&mut rng, 1000),
            Err(RoundgenError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_square_helper() {
        let shape = square_shape("Sq", 3.0, -1.0, 1.0);
        assert!(shape.contains(CandidatePoint::new(0.0, 0.0)));
        assert!(!shape.contains(CandidatePoint::new(2.0, 0.0)));
    }
}
