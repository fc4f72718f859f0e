//! # GeoJSON Features
//!
//! The subset of GeoJSON that shape documents use: a single `Feature` whose
//! geometry is a `Polygon` or `MultiPolygon`.

use crate::geo::{BoundingBox, Polygon};
use crate::{RoundgenError, RoundgenResult};
use serde::{Deserialize, Serialize};

/// A GeoJSON feature with typed properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature<P> {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    pub properties: P,
    pub geometry: Geometry,
}

fn feature_type() -> String {
    "Feature".to_string()
}

/// A GeoJSON feature collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection<P> {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature<P>>,
}

/// Supported geometry types. Positions are kept as raw arrays so that an
/// optional altitude component does not break parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

impl Geometry {
    /// Converts the raw coordinates into polygons.
    ///
    /// Fails when a position has fewer than two components or a polygon has
    /// no exterior ring.
    pub fn polygons(&self) -> RoundgenResult<Vec<Polygon>> {
        match self {
            Geometry::Polygon(rings) => Ok(vec![polygon_from_rings(rings)?]),
            Geometry::MultiPolygon(polygons) => polygons
                .iter()
                .map(|rings| polygon_from_rings(rings))
                .collect(),
        }
    }

    /// Bounding box over every position in the geometry.
    pub fn bbox(&self) -> RoundgenResult<BoundingBox> {
        let polygons = self.polygons()?;
        BoundingBox::enclosing(polygons.iter().flat_map(|p| p.vertices())).ok_or_else(|| {
            RoundgenError::DataIntegrity("geometry has no coordinates".to_string())
        })
    }

    /// Geodesic area in square meters.
    pub fn area(&self) -> RoundgenResult<f64> {
        Ok(self.polygons()?.iter().map(|p| p.area()).sum())
    }
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> RoundgenResult<Polygon> {
    let mut converted = rings
        .iter()
        .map(|ring| ring.iter().map(|pos| position(pos)).collect())
        .collect::<RoundgenResult<Vec<Vec<(f64, f64)>>>>()?;

    if converted.is_empty() {
        return Err(RoundgenError::DataIntegrity(
            "polygon without an exterior ring".to_string(),
        ));
    }
    let exterior = converted.remove(0);
    Ok(Polygon::new(exterior, converted))
}

fn position(raw: &[f64]) -> RoundgenResult<(f64, f64)> {
    match raw {
        [lng, lat, ..] if lng.is_finite() && lat.is_finite() => Ok((*lng, *lat)),
        _ => Err(RoundgenError::DataIntegrity(format!(
            "invalid position {:?}",
            raw
        ))),
    }
}
