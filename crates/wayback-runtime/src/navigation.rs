//! Waypoint follower for the guided return.
//!
//! [`NavigationController`] walks a reversed trajectory.  Its only state is
//! the target waypoint index, which starts at 0 and never decreases during a
//! session.  On each position update the index advances past every waypoint
//! already within `waypoint_radius` (never beyond the last one); the session
//! is over once the user is within `arrival_radius` of the parking spot.
//!
//! All distances ignore the vertical axis.  The bearing follows the heading
//! convention: `atan2(dx, dz)`, 0 = north, clockwise.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wayback_types::{ParkingSpot, Position, TrajectoryPoint, WaybackError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Distance (m) at which a waypoint counts as reached.
    pub waypoint_radius: f32,
    /// Distance (m) to the parking spot that ends the session.
    pub arrival_radius: f32,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            waypoint_radius: 1.5,
            arrival_radius: 2.0,
        }
    }
}

/// Result of one [`NavigationController::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationUpdate {
    pub target_index: usize,
    pub target: Position,
    pub remaining_distance: f32,
    /// Direction to the target, radians in `(−π, π]`.
    pub bearing: f32,
    pub arrived: bool,
}

#[derive(Debug, Clone)]
pub struct NavigationController {
    config: NavigatorConfig,
    path: Vec<TrajectoryPoint>,
    spot: ParkingSpot,
    target_index: usize,
}

impl NavigationController {
    /// Begin a session toward `spot` along `path` (already reversed).
    ///
    /// Rejects an empty path; the caller checks for a marked spot first.
    pub fn start(
        config: NavigatorConfig,
        path: Vec<TrajectoryPoint>,
        spot: ParkingSpot,
    ) -> Result<Self, WaybackError> {
        if path.is_empty() {
            return Err(WaybackError::NoRecordedPath);
        }
        info!(waypoints = path.len(), spot = %spot.label, "navigation started");
        Ok(Self {
            config,
            path,
            spot,
            target_index: 0,
        })
    }

    pub fn update(&mut self, current: &Position) -> NavigationUpdate {
        let last = self.path.len() - 1;
        while self.target_index < last
            && current.distance_2d(&self.path[self.target_index].position) < self.config.waypoint_radius
        {
            self.target_index += 1;
            debug!(target_index = self.target_index, "waypoint reached");
        }

        let target = self.path[self.target_index].position;
        let remaining_distance = current.distance_2d(&target);
        let bearing = (target.x - current.x).atan2(target.z - current.z);
        let arrived = current.distance_2d(&self.spot.position) < self.config.arrival_radius;

        NavigationUpdate {
            target_index: self.target_index,
            target,
            remaining_distance,
            bearing,
            arrived,
        }
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn path(&self) -> &[TrajectoryPoint] {
        &self.path
    }

    pub fn spot(&self) -> &ParkingSpot {
        &self.spot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};
    use wayback_types::PoseSource;

    fn wp(x: f32, z: f32) -> TrajectoryPoint {
        TrajectoryPoint {
            position: Position::new(x, 0.0, z),
            timestamp_ms: 0,
            heading: 0.0,
            source: PoseSource::Pdr,
        }
    }

    /// Return route from (0, 10) down to the spot at the origin.
    fn controller() -> NavigationController {
        let path = vec![wp(0.0, 10.0), wp(0.0, 7.5), wp(0.0, 5.0), wp(0.0, 2.5), wp(0.0, 0.0)];
        let spot = ParkingSpot::new(Position::origin(), 0.0, 0);
        NavigationController::start(NavigatorConfig::default(), path, spot).unwrap()
    }

    #[test]
    fn empty_path_is_rejected() {
        let spot = ParkingSpot::new(Position::origin(), 0.0, 0);
        let err = NavigationController::start(NavigatorConfig::default(), vec![], spot).unwrap_err();
        assert_eq!(err, WaybackError::NoRecordedPath);
    }

    #[test]
    fn starts_at_first_waypoint() {
        let mut nav = controller();
        assert_eq!(nav.target_index(), 0);
        let u = nav.update(&Position::new(0.0, 0.0, 20.0));
        assert_eq!(u.target_index, 0);
        assert!((u.remaining_distance - 10.0).abs() < 1e-5);
        // Target is due south.
        assert!((u.bearing.abs() - PI).abs() < 1e-5);
        assert!(!u.arrived);
    }

    #[test]
    fn advances_past_every_reached_waypoint() {
        let mut nav = controller();
        let u = nav.update(&Position::new(0.0, 0.0, 10.2));
        assert_eq!(u.target_index, 1);
        let u = nav.update(&Position::new(0.0, 0.0, 6.5));
        // Within 1.5 m of waypoint 1 (7.5), then waypoint 2 (5.0) is 1.5 away: not reached.
        assert_eq!(u.target_index, 2);
        assert!((u.remaining_distance - 1.5).abs() < 1e-5);
    }

    #[test]
    fn index_never_decreases() {
        let mut nav = controller();
        nav.update(&Position::new(0.0, 0.0, 10.0));
        nav.update(&Position::new(0.0, 0.0, 7.6));
        let reached = nav.target_index();
        assert_eq!(reached, 2);
        let u = nav.update(&Position::new(0.0, 0.0, 30.0));
        assert_eq!(u.target_index, reached);
    }

    #[test]
    fn index_stops_at_last_waypoint() {
        let mut nav = controller();
        let u = nav.update(&Position::new(0.0, 0.0, 0.0));
        assert_eq!(u.target_index, 0);
        for z in [10.0, 7.5, 5.0, 2.5, 0.0, 0.0] {
            nav.update(&Position::new(0.0, 0.0, z));
        }
        assert_eq!(nav.target_index(), 4);
    }

    #[test]
    fn bearing_points_east() {
        let path = vec![wp(5.0, 0.0)];
        let spot = ParkingSpot::new(Position::new(5.0, 0.0, 0.0), 0.0, 0);
        let mut nav = NavigationController::start(NavigatorConfig::default(), path, spot).unwrap();
        let u = nav.update(&Position::origin());
        assert!((u.bearing - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn arrival_within_radius_of_spot() {
        let mut nav = controller();
        assert!(!nav.update(&Position::new(0.0, 0.0, 2.0)).arrived);
        // Vertical offset is ignored.
        assert!(nav.update(&Position::new(0.0, 5.0, 1.9)).arrived);
    }
}
