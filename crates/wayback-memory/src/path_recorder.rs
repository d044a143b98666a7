//! Throttled trajectory buffer.
//!
//! [`PathRecorder`] stores the walk from the parking spot outward.  Points are
//! accepted only while recording and at most once per throttle interval, which
//! is independent of the fusion loop's own tick rate.  The reversed log is the
//! route used for the guided return.
//!
//! # Example
//!
//! ```rust
//! use wayback_memory::path_recorder::PathRecorder;
//! use wayback_types::{PoseSource, Position};
//!
//! let mut rec = PathRecorder::default();
//! rec.start_recording();
//! rec.record_point(Position::new(0.0, 0.0, 0.0), 0.0, PoseSource::Pdr, 0);
//! rec.record_point(Position::new(0.0, 0.0, 0.1), 0.0, PoseSource::Pdr, 50); // throttled
//! rec.record_point(Position::new(0.0, 0.0, 0.7), 0.0, PoseSource::Pdr, 250);
//! assert_eq!(rec.points().len(), 2);
//! assert_eq!(rec.reverse_path()[0].position.z, 0.7);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wayback_types::{PoseSource, Position, TrajectoryPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Minimum spacing between stored points (ms).
    pub throttle_ms: i64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { throttle_ms: 200 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathRecorder {
    config: RecorderConfig,
    points: Vec<TrajectoryPoint>,
    recording: bool,
    last_record_ms: Option<i64>,
}

impl PathRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Clear the buffer, reset the throttle and begin accepting points.
    pub fn start_recording(&mut self) {
        self.points.clear();
        self.last_record_ms = None;
        self.recording = true;
        info!("path recording started");
    }

    /// Stop accepting points; the buffer is kept.
    pub fn stop_recording(&mut self) {
        self.recording = false;
        info!(points = self.points.len(), "path recording stopped");
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Append a point if recording and the throttle interval has elapsed.
    ///
    /// `now_ms` is the wall-clock time stamped on the point.  Returns whether
    /// the point was stored.
    pub fn record_point(
        &mut self,
        position: Position,
        heading: f32,
        source: PoseSource,
        now_ms: i64,
    ) -> bool {
        if !self.recording {
            return false;
        }
        if let Some(last) = self.last_record_ms
            && now_ms - last < self.config.throttle_ms
        {
            return false;
        }

        self.last_record_ms = Some(now_ms);
        self.points.push(TrajectoryPoint {
            position,
            timestamp_ms: now_ms,
            heading,
            source,
        });
        debug!(n = self.points.len(), x = position.x, z = position.z, %source, "trajectory point");
        true
    }

    /// The recorded points in insertion order.
    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    /// The recorded points, newest first.
    pub fn reverse_path(&self) -> Vec<TrajectoryPoint> {
        self.points.iter().rev().copied().collect()
    }

    /// Empty the buffer and stop recording.
    pub fn clear(&mut self) {
        self.points.clear();
        self.recording = false;
        self.last_record_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(z: f32) -> Position {
        Position::new(0.0, 0.0, z)
    }

    #[test]
    fn record_before_start_is_noop() {
        let mut rec = PathRecorder::default();
        assert!(!rec.record_point(p(1.0), 0.0, PoseSource::Pdr, 0));
        assert!(rec.points().is_empty());
    }

    #[test]
    fn throttle_drops_points_inside_interval() {
        let mut rec = PathRecorder::default();
        rec.start_recording();
        assert!(rec.record_point(p(0.0), 0.0, PoseSource::Pdr, 1_000));
        assert!(!rec.record_point(p(0.1), 0.0, PoseSource::Pdr, 1_199));
        assert!(rec.record_point(p(0.2), 0.0, PoseSource::Pdr, 1_200));
        assert_eq!(rec.points().len(), 2);
    }

    #[test]
    fn recorded_points_are_ordered_and_spaced() {
        let mut rec = PathRecorder::default();
        rec.start_recording();
        for tick in 0..40 {
            rec.record_point(p(tick as f32), 0.0, PoseSource::Fused, tick * 50);
        }
        let pts = rec.points();
        assert_eq!(pts.len(), 10);
        for pair in pts.windows(2) {
            assert!(pair[1].timestamp_ms - pair[0].timestamp_ms >= 200);
        }
    }

    #[test]
    fn reverse_path_is_exact_reverse() {
        let mut rec = PathRecorder::default();
        rec.start_recording();
        for i in 0..5 {
            rec.record_point(p(i as f32), 0.1 * i as f32, PoseSource::Pdr, i * 1_000);
        }
        let forward: Vec<_> = rec.points().to_vec();
        let mut reversed = rec.reverse_path();
        reversed.reverse();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn stop_keeps_points_and_start_clears_them() {
        let mut rec = PathRecorder::default();
        rec.start_recording();
        rec.record_point(p(0.0), 0.0, PoseSource::Pdr, 0);
        rec.stop_recording();
        assert!(!rec.is_recording());
        assert!(!rec.record_point(p(1.0), 0.0, PoseSource::Pdr, 1_000));
        assert_eq!(rec.points().len(), 1);

        rec.start_recording();
        assert!(rec.points().is_empty());
        // Throttle was reset: an immediate point is accepted.
        assert!(rec.record_point(p(2.0), 0.0, PoseSource::Pdr, 10));
    }

    #[test]
    fn clear_empties_and_disables() {
        let mut rec = PathRecorder::default();
        rec.start_recording();
        rec.record_point(p(0.0), 0.0, PoseSource::Pdr, 0);
        rec.clear();
        assert!(rec.points().is_empty());
        assert!(!rec.is_recording());
        assert!(!rec.record_point(p(1.0), 0.0, PoseSource::Pdr, 1_000));
    }

    #[test]
    fn custom_throttle() {
        let mut rec = PathRecorder::new(RecorderConfig { throttle_ms: 0 });
        rec.start_recording();
        assert!(rec.record_point(p(0.0), 0.0, PoseSource::Pdr, 5));
        assert!(rec.record_point(p(0.0), 0.0, PoseSource::Pdr, 5));
    }
}
