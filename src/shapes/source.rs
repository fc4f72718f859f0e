//! # Shape Sources
//!
//! Concrete geometry sources: a local directory and an HTTP base URL. Both
//! serve the same layout, an `index.json` next to the shape documents.

use super::{Shape, ShapeIndex, ShapeSource};
use crate::config::SHAPE_INDEX_FILE;
use crate::{RoundgenError, RoundgenResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Removes all trailing slashes from a base location.
///
/// # Examples
///
/// ```
/// use roundgen::shapes::trim_base_location;
///
/// assert_eq!(trim_base_location("https://host/shapes///"), "https://host/shapes");
/// assert_eq!(trim_base_location("shapes"), "shapes");
/// ```
pub fn trim_base_location(raw: &str) -> &str {
    raw.trim_end_matches('/')
}

/// Picks the source matching a base location: HTTP(S) URLs are fetched
/// remotely, anything else is treated as a directory.
pub fn source_for_location(location: &str) -> RoundgenResult<Arc<dyn ShapeSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Arc::new(HttpShapeSource::new(location)?))
    } else {
        Ok(Arc::new(DirShapeSource::new(location)))
    }
}

fn parse_index(document: &str) -> RoundgenResult<ShapeIndex> {
    serde_json::from_str(document)
        .map_err(|e| RoundgenError::DataIntegrity(format!("unparseable shape index: {}", e)))
}

/// Serves shapes from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirShapeSource {
    root: PathBuf,
}

impl DirShapeSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read(&self, relative_path: &str) -> RoundgenResult<String> {
        let path = self.root.join(relative_path.trim_start_matches('/'));
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            RoundgenError::ShapeFetch(format!("cannot read {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl ShapeSource for DirShapeSource {
    async fn fetch_index(&self) -> RoundgenResult<ShapeIndex> {
        parse_index(&self.read(SHAPE_INDEX_FILE).await?)
    }

    async fn fetch_shape(&self, relative_path: &str) -> RoundgenResult<Shape> {
        Shape::from_json(&self.read(relative_path).await?)
    }
}

/// Serves shapes from an HTTP base URL.
#[derive(Debug, Clone)]
pub struct HttpShapeSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpShapeSource {
    pub fn new(base_url: &str) -> RoundgenResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RoundgenError::ShapeFetch(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: trim_base_location(base_url).to_string(),
        }
    }

    /// Full URL of a document under the base location.
    pub fn url_for(&self, relative_path: &str) -> String {
        format!("{}/{}", self.base_url, relative_path.trim_start_matches('/'))
    }

    async fn get(&self, relative_path: &str) -> RoundgenResult<String> {
        let url = self.url_for(relative_path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RoundgenError::ShapeFetch(format!("GET {} failed: {}", url, e)))?;
        response
            .text()
            .await
            .map_err(|e| RoundgenError::ShapeFetch(format!("reading {} failed: {}", url, e)))
    }
}

#[async_trait]
impl ShapeSource for HttpShapeSource {
    async fn fetch_index(&self) -> RoundgenResult<ShapeIndex> {
        parse_index(&self.get(SHAPE_INDEX_FILE).await?)
    }

    async fn fetch_shape(&self, relative_path: &str) -> RoundgenResult<Shape> {
        Shape::from_json(&self.get(relative_path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::square_document;
    use super::*;
    use crate::shapes::ShapeDescriptor;

    #[test]
    fn test_url_for_joins_with_single_slash() {
        let source = HttpShapeSource::with_client(reqwest::Client::new(), "https://host/shapes//");
        assert_eq!(source.url_for("europe/France.json"), "https://host/shapes/europe/France.json");
        assert_eq!(source.url_for("/index.json"), "https://host/shapes/index.json");
    }

    #[tokio::test]
    async fn test_dir_source_reads_index_and_shapes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index.json"),
            r#"{"Square": {"relative_path": "Square.json"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("Square.json"), square_document("Square", 4.0, 0.0, 2.0))
            .unwrap();

        let source = DirShapeSource::new(dir.path());
        let index = source.fetch_index().await.unwrap();
        assert_eq!(index.get("Square"), Some(&ShapeDescriptor::new("Square.json")));

        let shape = source.fetch_shape("Square.json").await.unwrap();
        assert_eq!(shape.name(), "Square");
        assert_eq!(shape.area(), 4.0);
    }

    #[tokio::test]
    async fn test_dir_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirShapeSource::new(dir.path());
        assert!(matches!(
            source.fetch_shape("Nowhere.json").await,
            Err(RoundgenError::ShapeFetch(_))
        ));
    }

    #[tokio::test]
    async fn test_dir_source_corrupt_shape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Broken.json"), "{\"type\": ").unwrap();
        let source = DirShapeSource::new(dir.path());
        assert!(matches!(
            source.fetch_shape("Broken.json").await,
            Err(RoundgenError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_source_for_location() {
        assert!(source_for_location("https://example.com/shapes/").is_ok());
        assert!(source_for_location("./locations").is_ok());
    }
}
