//! Pedestrian dead reckoning.
//!
//! [`DeadReckoningEngine`] owns a [`HeadingEstimator`] and a [`StepDetector`]
//! and advances a planar position by one stride along the current heading for
//! every detected step:
//!
//! ```text
//! x += step_length * sin(heading)   // east
//! z += step_length * cos(heading)   // north
//! ```
//!
//! The heading is updated before step detection on every sample, so a step
//! confirmed by a sample uses the heading that includes that sample.
//!
//! # Example
//!
//! ```rust
//! use wayback_perception::dead_reckoning::DeadReckoningEngine;
//! use wayback_types::StepEvent;
//!
//! let mut pdr = DeadReckoningEngine::default();
//! pdr.apply_step(&StepEvent { step_length: 0.7, timestamp_ns: 0 });
//! assert!((pdr.position().z - 0.7).abs() < 1e-6);
//! assert_eq!(pdr.position().x, 0.0);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;
use wayback_types::{Position, SensorSample, StepEvent};

use crate::heading::{HeadingConfig, HeadingEstimator};
use crate::step_detection::{StepDetector, StepDetectorConfig};

/// Configuration of both sub-estimators.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PdrConfig {
    pub step: StepDetectorConfig,
    pub heading: HeadingConfig,
}

#[derive(Debug, Clone)]
pub struct DeadReckoningEngine {
    heading: HeadingEstimator,
    steps: StepDetector,
    x: f32,
    z: f32,
}

impl DeadReckoningEngine {
    pub fn new(config: PdrConfig) -> Self {
        Self {
            heading: HeadingEstimator::new(config.heading),
            steps: StepDetector::new(config.step),
            x: 0.0,
            z: 0.0,
        }
    }

    /// Feed one sensor sample to both estimators.
    ///
    /// Returns the step confirmed by this sample, already applied to the
    /// position.
    pub fn on_sample(&mut self, sample: &SensorSample) -> Option<StepEvent> {
        self.heading.update(sample);
        let event = self
            .steps
            .on_sample(sample.acc_x, sample.acc_y, sample.acc_z, sample.timestamp_ns)?;
        self.apply_step(&event);
        Some(event)
    }

    /// Advance the position by one stride along the current heading.
    pub fn apply_step(&mut self, event: &StepEvent) {
        let heading = self.heading.heading();
        self.x += event.step_length * heading.sin();
        self.z += event.step_length * heading.cos();
        debug!(x = self.x, z = self.z, heading, "pdr position advanced");
    }

    /// Current planar position; `y` is always 0.
    pub fn position(&self) -> Position {
        Position::new(self.x, 0.0, self.z)
    }

    pub fn heading(&self) -> f32 {
        self.heading.heading()
    }

    pub fn step_count(&self) -> u32 {
        self.steps.step_count()
    }

    /// Override the position, e.g. to align with an absolute fix.
    pub fn set_position(&mut self, x: f32, z: f32) {
        self.x = x;
        self.z = z;
    }

    /// Return to the origin and clear both sub-estimators.
    pub fn reset(&mut self) {
        self.x = 0.0;
        self.z = 0.0;
        self.heading.reset();
        self.steps.reset();
    }
}

impl Default for DeadReckoningEngine {
    fn default() -> Self {
        Self::new(PdrConfig::default())
    }
}
