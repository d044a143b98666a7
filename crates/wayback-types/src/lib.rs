use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in the local tracking frame, in metres.
///
/// `x` points east and `z` points north; `y` is vertical and is ignored by
/// every planar computation (dead reckoning, navigation, arrival checks).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The frame origin.
    pub fn origin() -> Self {
        Self::default()
    }

    /// Euclidean distance over all three axes.
    pub fn distance_3d(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Euclidean distance over the ground plane `(x, z)`, ignoring `y`.
    pub fn distance_2d(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }
}

/// One immutable snapshot of the three motion sensors.
///
/// Accelerometer in m/s², gyroscope in rad/s, magnetometer in µT.  The
/// timestamp is a monotonic clock reading in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSample {
    pub acc_x: f32,
    pub acc_y: f32,
    pub acc_z: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    pub mag_x: f32,
    pub mag_y: f32,
    pub mag_z: f32,
    pub timestamp_ns: i64,
}

/// A detected footstep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Estimated stride length in metres (never negative).
    pub step_length: f32,
    /// Sensor timestamp of the sample that confirmed the step (ns).
    pub timestamp_ns: i64,
}

/// Which estimator produced a published position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseSource {
    /// Raw pose from the visual tracker.
    #[serde(rename = "arcore")]
    Visual,
    /// Pedestrian dead reckoning only.
    Pdr,
    /// Visual pose smoothed by the per-axis Kalman filters.
    Fused,
}

impl PoseSource {
    /// Tag written into exported CSV rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            PoseSource::Visual => "arcore",
            PoseSource::Pdr => "pdr",
            PoseSource::Fused => "fused",
        }
    }
}

impl std::fmt::Display for PoseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a recorded walk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub position: Position,
    /// Wall-clock time in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Heading in radians, 0 = north, clockwise.
    pub heading: f32,
    pub source: PoseSource,
}

/// Label given to a spot marked without an explicit name.
pub const DEFAULT_SPOT_LABEL: &str = "My parking spot";

/// The user's marked destination for the guided return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub position: Position,
    pub heading: f32,
    pub timestamp_ms: i64,
    pub label: String,
}

impl ParkingSpot {
    pub fn new(position: Position, heading: f32, timestamp_ms: i64) -> Self {
        Self {
            position,
            heading,
            timestamp_ms,
            label: DEFAULT_SPOT_LABEL.to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Self-reported availability of the absolute pose source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingState {
    #[default]
    Uninitialized,
    Initialized,
    Tracking,
    Paused,
    Stopped,
    /// The tracker session failed; treated exactly like any other
    /// non-tracking state.
    Error,
}

impl TrackingState {
    /// Only `Tracking` makes the absolute pose usable.
    pub fn is_tracking(&self) -> bool {
        matches!(self, TrackingState::Tracking)
    }

    /// Map a tracker status string (`"TRACKING"`, `"PAUSED"`,
    /// `"ERROR: camera unavailable"`, ...) onto a state.
    ///
    /// Anything unrecognised is reported as [`TrackingState::Error`].
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "NOT_INITIALIZED" | "UNINITIALIZED" => TrackingState::Uninitialized,
            "INITIALIZED" => TrackingState::Initialized,
            "TRACKING" => TrackingState::Tracking,
            "PAUSED" => TrackingState::Paused,
            "STOPPED" | "DESTROYED" => TrackingState::Stopped,
            _ => TrackingState::Error,
        }
    }
}

/// Latest output of the absolute pose source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseReading {
    pub position: Position,
    pub state: TrackingState,
}

impl PoseReading {
    pub fn new(position: Position, state: TrackingState) -> Self {
        Self { position, state }
    }
}

/// One row of the sensor log captured while recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub timestamp_ms: i64,
    pub sample: SensorSample,
    pub position: Position,
    pub heading: f32,
    pub step_count: u32,
    pub source: PoseSource,
}

/// Errors surfaced through the command surface.
///
/// None of these are fatal: they describe why a requested action was not
/// carried out, and no state has been mutated when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaybackError {
    #[error("no parking spot marked")]
    NoSpotMarked,

    #[error("no recorded path")]
    NoRecordedPath,

    #[error("export failed: {0}")]
    Export(String),

    #[error("fusion loop is not running")]
    LoopClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_3d_uses_all_axes() {
        let a = Position::new(1.0, 2.0, 3.0);
        let b = Position::new(4.0, 6.0, 3.0);
        assert!((a.distance_3d(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn distance_2d_ignores_vertical_axis() {
        let a = Position::origin();
        let b = Position::new(3.0, 100.0, 4.0);
        assert!((a.distance_2d(&b) - 5.0).abs() < 1e-6);

        let c = Position::new(3.0, -42.0, 4.0);
        assert_eq!(a.distance_2d(&b), a.distance_2d(&c));
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = Position::new(5.0, 3.0, 7.0);
        assert_eq!(p.distance_3d(&p), 0.0);
        assert_eq!(p.distance_2d(&p), 0.0);
    }

    #[test]
    fn pose_source_tags() {
        assert_eq!(PoseSource::Visual.as_str(), "arcore");
        assert_eq!(PoseSource::Pdr.to_string(), "pdr");
        let json = serde_json::to_string(&PoseSource::Fused).unwrap();
        assert_eq!(json, "\"fused\"");
        let back: PoseSource = serde_json::from_str("\"arcore\"").unwrap();
        assert_eq!(back, PoseSource::Visual);
    }

    #[test]
    fn tracking_state_from_status_strings() {
        assert_eq!(TrackingState::from_status("TRACKING"), TrackingState::Tracking);
        assert_eq!(TrackingState::from_status("NOT_INITIALIZED"), TrackingState::Uninitialized);
        assert_eq!(TrackingState::from_status("paused"), TrackingState::Paused);
        assert_eq!(TrackingState::from_status("DESTROYED"), TrackingState::Stopped);
        assert_eq!(
            TrackingState::from_status("ERROR: camera unavailable"),
            TrackingState::Error
        );
    }

    #[test]
    fn only_tracking_is_usable() {
        assert!(TrackingState::Tracking.is_tracking());
        for s in [
            TrackingState::Uninitialized,
            TrackingState::Initialized,
            TrackingState::Paused,
            TrackingState::Stopped,
            TrackingState::Error,
        ] {
            assert!(!s.is_tracking(), "{s:?} must not count as tracking");
        }
    }

    #[test]
    fn parking_spot_default_label() {
        let spot = ParkingSpot::new(Position::new(1.0, 0.0, 2.0), 0.5, 1_000);
        assert_eq!(spot.label, DEFAULT_SPOT_LABEL);
        let named = spot.with_label("B2-17");
        assert_eq!(named.label, "B2-17");
    }

    #[test]
    fn error_display_gives_reason() {
        assert_eq!(WaybackError::NoSpotMarked.to_string(), "no parking spot marked");
        assert_eq!(WaybackError::NoRecordedPath.to_string(), "no recorded path");
        assert!(WaybackError::Export("disk full".into())
            .to_string()
            .contains("disk full"));
    }
}
