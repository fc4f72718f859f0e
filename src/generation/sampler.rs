//! # Candidate Sampling
//!
//! Produces unvalidated candidate points. Which strategy runs depends on the
//! request: an explicit point list wins, then resolved shapes, and with
//! neither the whole sphere is sampled uniformly.

use super::GenerationConfig;
use crate::geo::{random_point_on_sphere, CandidatePoint};
use crate::shapes::Shape;
use crate::{RoundgenError, RoundgenResult};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Shapes weighted by area.
#[derive(Debug, Clone)]
pub struct WeightedShapes {
    shapes: Vec<Arc<Shape>>,
    total_area: f64,
}

impl WeightedShapes {
    /// Sorts the shapes by name and sums their areas.
    ///
    /// A zero total area cannot be sampled and is a data integrity failure.
    pub fn new(mut shapes: Vec<Arc<Shape>>) -> RoundgenResult<Self> {
        shapes.sort_by(|a, b| a.name().cmp(b.name()));
        let total_area: f64 = shapes.iter().map(|s| s.area()).sum();
        if !(total_area.is_finite() && total_area > 0.0) {
            return Err(RoundgenError::DataIntegrity(format!(
                "shapes {:?} have total area {}",
                shapes.iter().map(|s| s.name()).collect::<Vec<_>>(),
                total_area
            )));
        }
        Ok(Self { shapes, total_area })
    }

    pub fn shapes(&self) -> &[Arc<Shape>] {
        &self.shapes
    }

    pub fn total_area(&self) -> f64 {
        self.total_area
    }

    /// Picks a shape with probability proportional to its area.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> RoundgenResult<&Arc<Shape>> {
        let threshold = rng.gen::<f64>() * self.total_area;
        self.select_at(threshold)
    }

    /// Walks the cumulative areas and returns the first shape whose running
    /// sum exceeds `threshold`.
    pub fn select_at(&self, threshold: f64) -> RoundgenResult<&Arc<Shape>> {
        let mut cumulative = 0.0;
        for shape in &self.shapes {
            cumulative += shape.area();
            if cumulative > threshold {
                return Ok(shape);
            }
        }
        log::error!(
            "Weighted selection found no shape for threshold {} of total {}",
            threshold,
            self.total_area
        );
        Err(RoundgenError::DataIntegrity(format!(
            "no shape selected for threshold {} of total area {}",
            threshold, self.total_area
        )))
    }

    /// Picks a shape, then a uniform point inside it.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        max_attempts: u64,
    ) -> RoundgenResult<CandidatePoint> {
        let shape = self.select(rng)?;
        shape.random_point_within(rng, max_attempts)
    }
}

/// Caller-supplied candidates, shuffled once at intake and consumed from the end.
#[derive(Debug, Clone, PartialEq)]
pub struct PointList {
    points: Vec<CandidatePoint>,
    reuse_single: bool,
}

impl PointList {
    /// Shuffles the `[lng, lat]` pairs with a Fisher-Yates shuffle.
    ///
    /// A list holding exactly one point is reused for every slot instead of
    /// being consumed.
    pub fn new<R: Rng + ?Sized>(points: &[[f64; 2]], rng: &mut R) -> Self {
        let mut points: Vec<CandidatePoint> =
            points.iter().copied().map(CandidatePoint::from).collect();
        points.shuffle(rng);
        let reuse_single = points.len() == 1;
        Self {
            points,
            reuse_single,
        }
    }

    pub fn remaining(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Removes and returns the last point; None once exhausted.
    pub fn pop(&mut self) -> Option<CandidatePoint> {
        self.points.pop()
    }

    /// The candidate for the next attempt.
    pub fn next_candidate(&mut self) -> Option<CandidatePoint> {
        if self.reuse_single {
            self.points.last().copied()
        } else {
            self.pop()
        }
    }
}

/// Candidate sampling strategy for one generation run.
#[derive(Debug, Clone)]
pub enum Sampler {
    /// Area-weighted sampling inside named shapes
    Shapes(WeightedShapes),
    /// Uniform sampling over the whole sphere
    Sphere,
    /// Consumption of a caller-supplied list
    Points(PointList),
}

impl Sampler {
    /// Chooses the strategy: points first, then shapes, then the sphere.
    pub fn for_inputs<R: Rng + ?Sized>(
        points: &[[f64; 2]],
        shapes: Vec<Arc<Shape>>,
        rng: &mut R,
    ) -> RoundgenResult<Self> {
        if !points.is_empty() {
            Ok(Sampler::Points(PointList::new(points, rng)))
        } else if !shapes.is_empty() {
            Ok(Sampler::Shapes(WeightedShapes::new(shapes)?))
        } else {
            Ok(Sampler::Sphere)
        }
    }

    /// Short name for logs.
    pub fn strategy_name(&self) -> &'static str {
        match self {
            Sampler::Shapes(_) => "shapes",
            Sampler::Sphere => "sphere",
            Sampler::Points(_) => "point list",
        }
    }

    /// How many sample-and-lookup attempts one slot gets.
    pub fn attempt_bound(&self, config: &GenerationConfig) -> u32 {
        match self {
            Sampler::Sphere => config.sphere_attempts,
            Sampler::Shapes(_) | Sampler::Points(_) => config.targeted_attempts,
        }
    }

    /// Draws the next candidate. `Ok(None)` means a point list ran out.
    pub fn next_candidate<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        config: &GenerationConfig,
    ) -> RoundgenResult<Option<CandidatePoint>> {
        match self {
            Sampler::Shapes(shapes) => shapes
                .sample(rng, config.max_shape_sampling_attempts)
                .map(Some),
            Sampler::Sphere => Ok(Some(random_point_on_sphere(rng))),
            Sampler::Points(list) => Ok(list.next_candidate()),
        }
    }
}
