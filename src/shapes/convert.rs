//! # Shape Conversion
//!
//! Turns a GeoJSON `FeatureCollection` into the published shape layout: one
//! document per feature, each with `bbox` and geodesic `area` filled in, and
//! an entry per shape appended to an existing `index.json`.

use super::{Feature, FeatureCollection, ShapeDescriptor, ShapeIndex, ShapeProperties};
use crate::{RoundgenError, RoundgenResult};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Options for a conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Which input property holds the shape name
    pub name_property: String,
    /// Value written to the `type` property of every shape
    pub type_name: String,
    /// Prefix placed before each file name in the index
    pub outputs_prefix: String,
}

impl ConvertOptions {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            name_property: "name".to_string(),
            type_name: type_name.into(),
            outputs_prefix: String::new(),
        }
    }
}

/// Converted shapes ready to be written.
#[derive(Debug, Clone)]
pub struct ProcessedShapes {
    pub index: ShapeIndex,
    pub shapes: Vec<Feature<ShapeProperties>>,
}

/// Document file name for a shape: spaces become underscores.
///
/// # Examples
///
/// ```
/// use roundgen::shapes::feature_filename;
///
/// assert_eq!(feature_filename("South America"), "South_America.json");
/// ```
pub fn feature_filename(name: &str) -> String {
    format!("{}.json", name.replace(' ', "_"))
}

fn relative_path(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// Reads a file that must hold a `FeatureCollection` at its root.
pub fn load_feature_collection(path: &Path) -> RoundgenResult<FeatureCollection<Map<String, Value>>> {
    let collection: FeatureCollection<Map<String, Value>> =
        serde_json::from_str(&fs::read_to_string(path)?)?;
    if collection.kind != "FeatureCollection" {
        return Err(RoundgenError::InvalidRequest(format!(
            "input should contain a FeatureCollection at its root but contains {}",
            collection.kind
        )));
    }
    Ok(collection)
}

/// Computes name, area, type and bbox for every feature.
pub fn process_features(
    collection: FeatureCollection<Map<String, Value>>,
    options: &ConvertOptions,
) -> RoundgenResult<ProcessedShapes> {
    let mut index = ShapeIndex::new();
    let mut shapes = Vec::with_capacity(collection.features.len());

    for feature in collection.features {
        let name = feature
            .properties
            .get(&options.name_property)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RoundgenError::InvalidRequest(format!(
                    "feature without a string {:?} property",
                    options.name_property
                ))
            })?
            .to_string();
        if index.contains_key(&name) {
            return Err(RoundgenError::InvalidRequest(format!(
                "shape of name {} appears multiple times in the input",
                name
            )));
        }

        let bbox = feature.geometry.bbox()?;
        let area = feature.geometry.area()?;
        index.insert(
            name.clone(),
            ShapeDescriptor::new(relative_path(&options.outputs_prefix, &feature_filename(&name))),
        );
        shapes.push(Feature {
            kind: feature.kind,
            bbox: Some(bbox),
            properties: ShapeProperties {
                name,
                area,
                kind: Some(options.type_name.clone()),
            },
            geometry: feature.geometry,
        });
    }

    Ok(ProcessedShapes { index, shapes })
}

/// Appends to an existing index file and writes one document per shape.
pub fn write_processed(
    processed: &ProcessedShapes,
    index_file: &Path,
    out_dir: &Path,
) -> RoundgenResult<()> {
    let mut index: ShapeIndex = serde_json::from_str(&fs::read_to_string(index_file)?)?;
    for (name, descriptor) in &processed.index {
        if index.contains_key(name) {
            return Err(RoundgenError::InvalidRequest(format!(
                "shape of name {} already exists in {}",
                name,
                index_file.display()
            )));
        }
        index.insert(name.clone(), descriptor.clone());
    }
    fs::write(index_file, serde_json::to_string(&index)?)?;

    for feature in &processed.shapes {
        let path = out_dir.join(feature_filename(&feature.properties.name));
        fs::write(path, serde_json::to_string(feature)?)?;
    }
    Ok(())
}

/// Full conversion: load, process and write. Returns the number of shapes.
pub fn convert_file(
    input: &Path,
    out_dir: &Path,
    index_file: &Path,
    options: &ConvertOptions,
) -> RoundgenResult<usize> {
    let collection = load_feature_collection(input)?;
    let processed = process_features(collection, options)?;
    write_processed(&processed, index_file, out_dir)?;
    info!(
        "Converted {} shapes from {} into {}",
        processed.shapes.len(),
        input.display(),
        out_dir.display()
    );
    Ok(processed.shapes.len())
}
