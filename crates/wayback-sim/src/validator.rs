//! Replays a [`SimulatedPath`] through dead reckoning and scores the result.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wayback_perception::{DeadReckoningEngine, PdrConfig};
use wayback_types::Position;

use crate::path_simulator::SimulatedPath;

/// Truth and estimate closer than this (m) mark a path as a closed loop.
const LOOP_EPSILON: f32 = 0.01;

/// Pass condition for a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Criterion {
    /// Estimated end within `max_error` metres of the true end.
    Endpoint { max_error: f32 },
    /// Estimated end within `max_error` metres of the start.
    Closing { max_error: f32 },
    /// No steps detected and the position drifted at most `max_drift`.
    Stationary { max_drift: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub description: String,
    pub total_distance: f32,
    pub truth_end: Position,
    pub estimated_end: Position,
    pub endpoint_error: f32,
    /// Distance from the estimated end back to the start, for loops.
    pub closing_error: Option<f32>,
    pub expected_steps: usize,
    pub detected_steps: u32,
    pub passed: bool,
    pub details: String,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed { "PASS" } else { "FAIL" };
        writeln!(f, "[{verdict}] {}", self.description)?;
        writeln!(f, "  distance      {:.2} m", self.total_distance)?;
        writeln!(
            f,
            "  truth end     ({:.2}, {:.2})",
            self.truth_end.x, self.truth_end.z
        )?;
        writeln!(
            f,
            "  estimated end ({:.2}, {:.2})",
            self.estimated_end.x, self.estimated_end.z
        )?;
        writeln!(f, "  endpoint err  {:.2} m", self.endpoint_error)?;
        if let Some(c) = self.closing_error {
            writeln!(f, "  closing err   {c:.2} m")?;
        }
        writeln!(
            f,
            "  steps         {} detected / {} taken",
            self.detected_steps, self.expected_steps
        )?;
        write!(f, "  {}", self.details)
    }
}

/// Runs paths through a fresh [`DeadReckoningEngine`] each time.
#[derive(Debug, Clone, Default)]
pub struct PathValidator {
    config: PdrConfig,
}

impl PathValidator {
    pub fn new(config: PdrConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PdrConfig {
        &self.config
    }

    /// Dead-reckon `path` and return the final position and step count.
    pub fn dead_reckon(&self, path: &SimulatedPath) -> (Position, u32) {
        let mut engine = DeadReckoningEngine::new(self.config);
        for sample in &path.samples {
            engine.on_sample(sample);
        }
        (engine.position(), engine.step_count())
    }

    pub fn validate(&self, path: &SimulatedPath, criterion: Criterion) -> ValidationReport {
        let (estimated_end, detected_steps) = self.dead_reckon(path);
        score(path, estimated_end, detected_steps, criterion)
    }
}

/// Compare an estimate against the path's ground truth.
///
/// Exposed separately so that estimates produced by other pipelines (e.g. the
/// full navigation core) can be scored the same way.
pub fn score(
    path: &SimulatedPath,
    estimated_end: Position,
    detected_steps: u32,
    criterion: Criterion,
) -> ValidationReport {
    let start = path.truth_start();
    let truth_end = path.truth_end();
    let endpoint_error = estimated_end.distance_2d(&truth_end);
    let is_loop = path.expected_steps() > 0 && truth_end.distance_2d(&start) < LOOP_EPSILON;
    let closing_error = is_loop.then(|| estimated_end.distance_2d(&start));

    let (passed, details) = match criterion {
        Criterion::Endpoint { max_error } => (
            endpoint_error <= max_error,
            format!("endpoint error {endpoint_error:.2} m (limit {max_error:.1} m)"),
        ),
        Criterion::Closing { max_error } => {
            let err = estimated_end.distance_2d(&start);
            (
                err <= max_error,
                format!("closing error {err:.2} m (limit {max_error:.1} m)"),
            )
        }
        Criterion::Stationary { max_drift } => {
            let drift = estimated_end.distance_2d(&start);
            (
                detected_steps == 0 && drift <= max_drift,
                format!("{detected_steps} steps, drift {drift:.3} m (limit {max_drift:.1} m)"),
            )
        }
    };

    let report = ValidationReport {
        description: path.description.clone(),
        total_distance: path.total_distance(),
        truth_end,
        estimated_end,
        endpoint_error,
        closing_error,
        expected_steps: path.expected_steps(),
        detected_steps,
        passed,
        details,
    };
    if report.passed {
        info!(path = %report.description, endpoint_error, "validation passed");
    } else {
        info!(path = %report.description, details = %report.details, "validation failed");
    }
    debug!(?report, "validation report");
    report
}
