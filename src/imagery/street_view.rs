//! # Street View Oracle
//!
//! Imagery lookups against the Street View metadata endpoint. Metadata
//! requests return the panorama location without fetching imagery.

use super::ImageryOracle;
use crate::geo::{CandidatePoint, LatLng};
use crate::{RoundgenError, RoundgenResult};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

/// Default metadata endpoint.
pub const STREET_VIEW_METADATA_URL: &str =
    "https://maps.googleapis.com/maps/api/streetview/metadata";

/// Metadata response body. Only the fields used here are parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataResponse {
    pub status: String,
    #[serde(default)]
    pub location: Option<LatLng>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl MetadataResponse {
    /// `OK` yields the panorama location, `ZERO_RESULTS` yields None and
    /// every other status is an error.
    pub fn into_position(self) -> RoundgenResult<Option<LatLng>> {
        match self.status.as_str() {
            "OK" => self.location.map(Some).ok_or_else(|| {
                RoundgenError::Oracle("OK response without a location".to_string())
            }),
            "ZERO_RESULTS" | "NOT_FOUND" => Ok(None),
            other => Err(RoundgenError::Oracle(match self.error_message {
                Some(message) => format!("{}: {}", other, message),
                None => other.to_string(),
            })),
        }
    }
}

/// Imagery oracle backed by the Street View metadata API.
#[derive(Debug, Clone)]
pub struct StreetViewOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl StreetViewOracle {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(reqwest::Client::new(), STREET_VIEW_METADATA_URL, api_key)
    }

    pub fn with_endpoint(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Query parameters for one lookup. Outdoor panoramas only.
    pub fn query(&self, point: CandidatePoint, radius_meters: f64) -> Vec<(&'static str, String)> {
        vec![
            ("location", format!("{},{}", point.lat, point.lng)),
            ("radius", format!("{}", radius_meters.round() as u64)),
            ("source", "outdoor".to_string()),
            ("key", self.api_key.clone()),
        ]
    }
}

#[async_trait]
impl ImageryOracle for StreetViewOracle {
    async fn lookup_nearest_imagery(
        &self,
        point: CandidatePoint,
        radius_meters: f64,
    ) -> RoundgenResult<Option<LatLng>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query(point, radius_meters))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RoundgenError::Oracle(format!("metadata request failed: {}", e)))?;

        let body: MetadataResponse = response
            .json()
            .await
            .map_err(|e| RoundgenError::Oracle(format!("unreadable metadata response: {}", e)))?;
        debug!("Imagery lookup near {:?}: {}", point, body.status);
        body.into_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> MetadataResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_ok_response() {
        let response = parse(
            r#"{"copyright": "x", "date": "2019-05", "location": {"lat": 48.85, "lng": 2.29},
                "pano_id": "abc", "status": "OK"}"#,
        );
        assert_eq!(response.into_position().unwrap(), Some(LatLng::new(48.85, 2.29)));
    }

    #[test]
    fn test_zero_results() {
        assert_eq!(
            parse(r#"{"status": "ZERO_RESULTS"}"#).into_position().unwrap(),
            None
        );
    }

    #[test]
    fn test_other_status_is_error() {
        let result = parse(r#"{"status": "REQUEST_DENIED", "error_message": "bad key"}"#)
            .into_position();
        match result {
            Err(RoundgenError::Oracle(message)) => assert!(message.contains("bad key")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_query_puts_latitude_first() {
        let oracle = StreetViewOracle::new("secret");
        let query = oracle.query(CandidatePoint::new(2.5, 48.0), 40_000.0);
        assert_eq!(query[0], ("location", "48,2.5".to_string()));
        assert_eq!(query[1], ("radius", "40000".to_string()));
    }
}
