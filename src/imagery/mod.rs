//! # Imagery Module
//!
//! The imagery oracle answers one question: where is the nearest point with
//! ground-level imagery within a radius of a coordinate? Generators depend on
//! the [`ImageryOracle`] trait only; [`StreetViewOracle`] is the production
//! adapter.

pub mod street_view;

pub use street_view::*;

use crate::geo::{CandidatePoint, LatLng};
use crate::RoundgenResult;
use async_trait::async_trait;

/// Lookup of the closest location with confirmed imagery.
#[async_trait]
pub trait ImageryOracle: Send + Sync {
    /// Returns the nearest confirmed position within `radius_meters`, or None
    /// when there is no imagery in range.
    ///
    /// Any other failure is an error and is not retried by callers.
    async fn lookup_nearest_imagery(
        &self,
        point: CandidatePoint,
        radius_meters: f64,
    ) -> RoundgenResult<Option<LatLng>>;
}
