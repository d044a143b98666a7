//! Synchronous navigation core.
//!
//! [`NavigationCore`] owns every piece of derived state: the dead-reckoning
//! engine, the two Kalman smoothers, the trajectory, the sensor log, the
//! parking spot and the active navigation session.  It is driven by
//! [`tick`](NavigationCore::tick) and by the command methods, all on the same
//! thread.  [`FusionLoop`](crate::fusion_loop::FusionLoop) wraps it in a
//! periodic task; the validation harness drives it directly.
//!
//! # Tick order
//!
//! 1. Feed the sensor sample (if any) to the dead-reckoning engine.
//! 2. If the pose source is tracking, the fused position is the
//!    Kalman-smoothed pose (`y` passed through).  Otherwise it is the PDR
//!    position and the filters are left untouched.
//! 3. While recording, store a trajectory point and a sensor-log row.
//! 4. While navigating, update the controller; arrival ends the session.
//!
//! Snapshots hand out the trajectory and the navigation path as shared
//! `Arc<[TrajectoryPoint]>` views.  The trajectory view is rebuilt only when a
//! point is stored or recording restarts, so ticks in between publish it
//! without copying.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{info, warn};
use wayback_memory::{ExportPaths, PathRecorder, SensorLog, export_all};
use wayback_perception::{DeadReckoningEngine, ScalarKalmanFilter};
use wayback_types::{
    ParkingSpot, PoseReading, PoseSource, Position, SensorReading, SensorSample, StepEvent,
    TrackingState, TrajectoryPoint, WaybackError,
};

use crate::fusion_loop::FusionConfig;
use crate::navigation::{NavigationController, NavigationUpdate, NavigatorConfig};

/// Read-only view of the core after a tick or command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavSnapshot {
    pub position: Position,
    pub heading: f32,
    pub step_count: u32,
    pub tracking: TrackingState,
    pub source: Option<PoseSource>,
    pub recording: bool,
    pub navigating: bool,
    pub arrived: bool,
    pub trajectory: Arc<[TrajectoryPoint]>,
    pub navigation_path: Arc<[TrajectoryPoint]>,
    pub target_index: Option<usize>,
    pub remaining_distance: Option<f32>,
    pub bearing: Option<f32>,
    pub spot: Option<ParkingSpot>,
}

/// What one tick produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub position: Position,
    pub source: PoseSource,
    pub step: Option<StepEvent>,
    pub navigation: Option<NavigationUpdate>,
}

#[derive(Debug)]
pub struct NavigationCore {
    navigator_config: NavigatorConfig,
    pdr: DeadReckoningEngine,
    kalman_x: ScalarKalmanFilter,
    kalman_z: ScalarKalmanFilter,
    recorder: PathRecorder,
    trajectory_view: Arc<[TrajectoryPoint]>,
    navigation_view: Arc<[TrajectoryPoint]>,
    sensor_log: SensorLog,
    last_sample: Option<SensorSample>,
    tracking: TrackingState,
    position: Position,
    source: Option<PoseSource>,
    spot: Option<ParkingSpot>,
    navigator: Option<NavigationController>,
    last_navigation: Option<NavigationUpdate>,
    arrived: bool,
}

impl NavigationCore {
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            navigator_config: config.navigator,
            pdr: DeadReckoningEngine::new(config.pdr),
            kalman_x: ScalarKalmanFilter::from_config(config.kalman),
            kalman_z: ScalarKalmanFilter::from_config(config.kalman),
            recorder: PathRecorder::new(config.recorder),
            trajectory_view: Arc::from([]),
            navigation_view: Arc::from([]),
            sensor_log: SensorLog::new(),
            last_sample: None,
            tracking: TrackingState::default(),
            position: Position::origin(),
            source: None,
            spot: None,
            navigator: None,
            last_navigation: None,
            arrived: false,
        }
    }

    /// Run one fusion step.  `now_ms` is the wall-clock time in milliseconds.
    pub fn tick(
        &mut self,
        sample: Option<SensorSample>,
        pose: Option<PoseReading>,
        now_ms: i64,
    ) -> TickOutcome {
        let step = sample.and_then(|s| {
            self.last_sample = Some(s);
            self.pdr.on_sample(&s)
        });

        let pose = pose.unwrap_or_default();
        self.observe_tracking(pose.state);

        let (position, source) = if pose.state.is_tracking() {
            let fused = Position::new(
                self.kalman_x.update(pose.position.x),
                pose.position.y,
                self.kalman_z.update(pose.position.z),
            );
            (fused, PoseSource::Fused)
        } else {
            (self.pdr.position(), PoseSource::Pdr)
        };
        self.position = position;
        self.source = Some(source);

        let heading = self.pdr.heading();
        if self.recorder.is_recording() {
            if self.recorder.record_point(position, heading, source, now_ms) {
                self.trajectory_view = Arc::from(self.recorder.points());
            }
            self.sensor_log.log(SensorReading {
                timestamp_ms: now_ms,
                sample: self.last_sample.unwrap_or_default(),
                position,
                heading,
                step_count: self.pdr.step_count(),
                source,
            });
        }

        let navigation = self.navigator.as_mut().map(|nav| nav.update(&position));
        if let Some(update) = navigation {
            self.last_navigation = Some(update);
            if update.arrived {
                info!(x = position.x, z = position.z, "arrived at parking spot");
                self.navigator = None;
                self.navigation_view = Arc::from([]);
                self.arrived = true;
            }
        }

        TickOutcome {
            position,
            source,
            step,
            navigation,
        }
    }

    fn observe_tracking(&mut self, state: TrackingState) {
        if state == self.tracking {
            return;
        }
        if self.tracking.is_tracking() {
            warn!(?state, "absolute pose lost; falling back to dead reckoning");
        } else {
            info!(from = ?self.tracking, to = ?state, "tracking state changed");
        }
        self.tracking = state;
    }

    // ── Commands ────────────────────────────────────────────────────────────

    /// Mark the current fused position as the parking spot, replacing any
    /// previous one.
    pub fn mark_spot(&mut self, now_ms: i64) -> ParkingSpot {
        let spot = ParkingSpot::new(self.position, self.pdr.heading(), now_ms);
        info!(x = spot.position.x, z = spot.position.z, "parking spot marked");
        self.spot = Some(spot.clone());
        spot
    }

    pub fn start_recording(&mut self) {
        self.recorder.start_recording();
        self.trajectory_view = Arc::from([]);
        self.sensor_log.clear();
    }

    pub fn stop_recording(&mut self) {
        self.recorder.stop_recording();
    }

    /// Start guiding back along the reversed trajectory.
    ///
    /// Fails without touching any state when no spot is marked or nothing
    /// was recorded.
    pub fn start_navigation(&mut self) -> Result<usize, WaybackError> {
        let spot = self.spot.clone().ok_or(WaybackError::NoSpotMarked)?;
        let path = self.recorder.reverse_path();
        let nav = NavigationController::start(self.navigator_config, path, spot)?;
        let waypoints = nav.path().len();
        self.navigation_view = Arc::from(nav.path());
        self.navigator = Some(nav);
        self.last_navigation = None;
        self.arrived = false;
        Ok(waypoints)
    }

    pub fn stop_navigation(&mut self) {
        if self.navigator.take().is_some() {
            info!("navigation stopped");
        }
        self.navigation_view = Arc::from([]);
        self.last_navigation = None;
    }

    /// Write the trajectory and sensor log into `dir`.
    pub fn export_data(&self, dir: &Path, at: DateTime<Local>) -> Result<ExportPaths, WaybackError> {
        Ok(export_all(dir, self.recorder.points(), &self.sensor_log, at)?)
    }

    /// Copies of the data that [`export_data`](Self::export_data) writes.
    pub fn export_payload(&self) -> (Vec<TrajectoryPoint>, SensorLog) {
        (self.recorder.points().to_vec(), self.sensor_log.clone())
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn heading(&self) -> f32 {
        self.pdr.heading()
    }

    pub fn step_count(&self) -> u32 {
        self.pdr.step_count()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_navigating(&self) -> bool {
        self.navigator.is_some()
    }

    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    pub fn spot(&self) -> Option<&ParkingSpot> {
        self.spot.as_ref()
    }

    pub fn trajectory(&self) -> &[TrajectoryPoint] {
        self.recorder.points()
    }

    pub fn sensor_log(&self) -> &SensorLog {
        &self.sensor_log
    }

    pub fn snapshot(&self) -> NavSnapshot {
        let nav = self.last_navigation;
        NavSnapshot {
            position: self.position,
            heading: self.pdr.heading(),
            step_count: self.pdr.step_count(),
            tracking: self.tracking,
            source: self.source,
            recording: self.recorder.is_recording(),
            navigating: self.navigator.is_some(),
            arrived: self.arrived,
            trajectory: Arc::clone(&self.trajectory_view),
            navigation_path: Arc::clone(&self.navigation_view),
            target_index: nav.map(|u| u.target_index),
            remaining_distance: nav.map(|u| u.remaining_distance),
            bearing: nav.map(|u| u.bearing),
            spot: self.spot.clone(),
        }
    }
}
