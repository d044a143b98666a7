//! Yaw estimation from gyroscope and magnetometer.
//!
//! [`HeadingEstimator`] is a complementary filter.  The gyroscope yaw rate is
//! integrated for short-term accuracy, and the magnetometer heading pulls the
//! result back toward magnetic north to cancel long-term drift:
//!
//! ```text
//! gyro_heading = heading + ω_z * dt
//! heading      = gyro_heading + (1 − α) * wrap(mag_heading − gyro_heading)
//! ```
//!
//! `wrap` maps an angle difference onto `[−π, π)`, so away from the 0/2π seam
//! this is exactly `α * gyro_heading + (1 − α) * mag_heading`.
//!
//! Across the seam the two forms deliberately disagree.  With `α = 0.5`,
//! `gyro_heading = 0.05` and `mag_heading = 6.23` the linear blend lands
//! near π, facing the opposite way, while the wrapped blend stays on the
//! short arc through north.  The estimator always takes the short arc.
//!
//! Headings are in radians, `0` = north (+z), `π/2` = east (+x), increasing
//! clockwise, and are always normalised to `[0, 2π)`.  `gyro_z` is taken
//! as the heading rate with the same sign.
//!
//! # Sensor gaps
//!
//! When the time since the previous sample is not positive or exceeds
//! `max_gap_s`, the integrated state is considered stale and the heading
//! snaps to the magnetometer-only value.

use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Serialize};
use tracing::debug;
use wayback_types::SensorSample;

// ────────────────────────────────────────────────────────────────────────────
// Angle helpers
// ────────────────────────────────────────────────────────────────────────────

/// Normalise an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f32) -> f32 {
    let a = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if a >= TAU { 0.0 } else { a }
}

/// Wrap an angle difference into `[−π, π)`.
pub fn wrap_pi(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

// ────────────────────────────────────────────────────────────────────────────
// Magnetometer heading
// ────────────────────────────────────────────────────────────────────────────

/// Gravity magnitude below which the device is considered in free fall.
const MIN_GRAVITY: f32 = 0.1 * 9.81;
/// Minimum |m × g| for a usable east vector (field nearly parallel to gravity).
const MIN_EAST_NORM: f32 = 0.1;
/// Minimum horizontal projection of the device's +y axis.
const MIN_FORWARD_PROJECTION: f32 = 1e-3;

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn scale(v: [f32; 3], s: f32) -> [f32; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Tilt-compensated azimuth of the device's +y axis.
///
/// `gravity` is the accelerometer reading at rest (pointing up, device
/// frame) and `field` the magnetometer reading.  With
///
/// ```text
/// east  = normalize(field × gravity)
/// north = normalize(gravity) × east
/// ```
///
/// the azimuth is `atan2(east.y, north.y)`: the device +y axis expressed in
/// the east/north basis.  Returns `None` during free fall, when the field is
/// nearly parallel to gravity, or when +y points straight up or down and has
/// no horizontal direction.
pub fn tilt_compensated_azimuth(gravity: [f32; 3], field: [f32; 3]) -> Option<f32> {
    let g_norm = norm(gravity);
    if g_norm < MIN_GRAVITY {
        return None;
    }
    let east = cross(field, gravity);
    let e_norm = norm(east);
    if e_norm < MIN_EAST_NORM {
        return None;
    }
    let east = scale(east, 1.0 / e_norm);
    let up = scale(gravity, 1.0 / g_norm);
    let north = cross(up, east);

    if east[1].hypot(north[1]) < MIN_FORWARD_PROJECTION {
        return None;
    }
    Some(normalize_angle(east[1].atan2(north[1])))
}

/// How the magnetometer reading is turned into a heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnetometerModel {
    /// [`tilt_compensated_azimuth`] from gravity and field, falling back to
    /// `atan2(mag_y, mag_x)` when it is undefined.
    #[default]
    TiltCompensated,
    /// Horizontal compass with device x toward east and y toward north:
    /// `atan2(mag_x, mag_y)`.
    Planar,
}

impl MagnetometerModel {
    /// Magnetometer-only heading for `sample`, normalised to `[0, 2π)`.
    pub fn heading(&self, sample: &SensorSample) -> f32 {
        match self {
            MagnetometerModel::TiltCompensated => {
                let gravity = [sample.acc_x, sample.acc_y, sample.acc_z];
                let field = [sample.mag_x, sample.mag_y, sample.mag_z];
                tilt_compensated_azimuth(gravity, field)
                    .unwrap_or_else(|| normalize_angle(sample.mag_y.atan2(sample.mag_x)))
            }
            MagnetometerModel::Planar => normalize_angle(sample.mag_x.atan2(sample.mag_y)),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HeadingEstimator
// ────────────────────────────────────────────────────────────────────────────

/// Tunables for [`HeadingEstimator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingConfig {
    /// Gyroscope weight `α` (clamped to `[0, 1]`).
    pub alpha: f32,
    /// Largest sample spacing (s) still integrated; longer gaps snap to the
    /// magnetometer heading.
    pub max_gap_s: f32,
    pub magnetometer: MagnetometerModel,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            alpha: 0.98,
            max_gap_s: 1.0,
            magnetometer: MagnetometerModel::TiltCompensated,
        }
    }
}

/// Complementary filter producing a planar heading.
#[derive(Debug, Clone)]
pub struct HeadingEstimator {
    alpha: f32,
    max_gap_s: f32,
    magnetometer: MagnetometerModel,
    heading: f32,
    last_timestamp_ns: Option<i64>,
}

impl HeadingEstimator {
    pub fn new(config: HeadingConfig) -> Self {
        Self {
            alpha: config.alpha.clamp(0.0, 1.0),
            max_gap_s: config.max_gap_s,
            magnetometer: config.magnetometer,
            heading: 0.0,
            last_timestamp_ns: None,
        }
    }

    /// Advance the estimate with one sample and return the new heading.
    pub fn update(&mut self, sample: &SensorSample) -> f32 {
        let mag_heading = self.magnetometer.heading(sample);

        let Some(last) = self.last_timestamp_ns.replace(sample.timestamp_ns) else {
            self.heading = mag_heading;
            return self.heading;
        };

        let dt = (sample.timestamp_ns - last) as f32 * 1e-9;
        if dt <= 0.0 || dt > self.max_gap_s {
            debug!(dt, mag_heading, "sensor discontinuity; heading snapped to magnetometer");
            self.heading = mag_heading;
            return self.heading;
        }

        let gyro_heading = self.heading + sample.gyro_z * dt;
        let correction = (1.0 - self.alpha) * wrap_pi(mag_heading - gyro_heading);
        self.heading = normalize_angle(gyro_heading + correction);
        self.heading
    }

    /// Current heading in `[0, 2π)`.
    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn is_initialized(&self) -> bool {
        self.last_timestamp_ns.is_some()
    }

    pub fn reset(&mut self) {
        self.heading = 0.0;
        self.last_timestamp_ns = None;
    }
}

impl Default for HeadingEstimator {
    fn default() -> Self {
        Self::new(HeadingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const WORLD_FIELD: [f32; 3] = [0.0, 20.0, -40.0]; // east, north, up
    const WORLD_GRAVITY: [f32; 3] = [0.0, 0.0, 9.81];

    fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    /// Device-frame accelerometer and magnetometer readings for a device whose
    /// +y axis points at `yaw` (clockwise from north) and is pitched up by
    /// `pitch` around its own x axis.
    fn device_readings(yaw: f32, pitch: f32) -> ([f32; 3], [f32; 3]) {
        let x = [yaw.cos(), -yaw.sin(), 0.0];
        let y0 = [yaw.sin(), yaw.cos(), 0.0];
        let z0 = [0.0, 0.0, 1.0];
        let y = [
            y0[0] * pitch.cos() + z0[0] * pitch.sin(),
            y0[1] * pitch.cos() + z0[1] * pitch.sin(),
            y0[2] * pitch.cos() + z0[2] * pitch.sin(),
        ];
        let z = [
            -y0[0] * pitch.sin() + z0[0] * pitch.cos(),
            -y0[1] * pitch.sin() + z0[1] * pitch.cos(),
            -y0[2] * pitch.sin() + z0[2] * pitch.cos(),
        ];
        let to_device = |w: [f32; 3]| [dot(w, x), dot(w, y), dot(w, z)];
        (to_device(WORLD_GRAVITY), to_device(WORLD_FIELD))
    }

    fn planar_sample(heading: f32, gyro_z: f32, timestamp_ns: i64) -> SensorSample {
        SensorSample {
            acc_y: 9.81,
            gyro_z,
            mag_x: 20.0 * heading.sin(),
            mag_y: 20.0 * heading.cos(),
            mag_z: -40.0,
            timestamp_ns,
            ..Default::default()
        }
    }

    fn planar() -> HeadingEstimator {
        HeadingEstimator::new(HeadingConfig {
            magnetometer: MagnetometerModel::Planar,
            ..Default::default()
        })
    }

    fn angle_close(a: f32, b: f32, tol: f32) -> bool {
        wrap_pi(a - b).abs() < tol
    }

    #[test]
    fn normalize_and_wrap() {
        assert!((normalize_angle(-FRAC_PI_2) - 3.0 * FRAC_PI_2).abs() < 1e-5);
        assert!((normalize_angle(TAU + 0.25) - 0.25).abs() < 1e-5);
        assert!(normalize_angle(-1e-9) < TAU);
        assert!((wrap_pi(3.0 * FRAC_PI_2) + FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn flat_device_pointing_north_and_east() {
        // Flat on a table, +y toward north: field has a +y and a downward part.
        let north = tilt_compensated_azimuth([0.0, 0.0, 9.81], [0.0, 20.0, -40.0]).unwrap();
        assert!(angle_close(north, 0.0, 1e-4));

        // +y toward east: north lies along device −x.
        let east = tilt_compensated_azimuth([0.0, 0.0, 9.81], [-20.0, 0.0, -40.0]).unwrap();
        assert!((east - FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn azimuth_is_independent_of_pitch() {
        for yaw in [0.0_f32, 0.5, FRAC_PI_2, 2.0, PI, 4.0, 5.5] {
            for pitch in [0.0_f32, 0.4, -0.6, 1.2] {
                let (g, m) = device_readings(yaw, pitch);
                let az = tilt_compensated_azimuth(g, m).expect("defined for tilted device");
                assert!(
                    angle_close(az, yaw, 1e-3),
                    "yaw {yaw} pitch {pitch} gave azimuth {az}"
                );
            }
        }
    }

    #[test]
    fn azimuth_undefined_cases() {
        // Free fall.
        assert!(tilt_compensated_azimuth([0.0, 0.0, 0.1], [0.0, 20.0, -40.0]).is_none());
        // Field parallel to gravity.
        assert!(tilt_compensated_azimuth([0.0, 0.0, 9.81], [0.0, 0.0, -40.0]).is_none());
        // Device upright: +y is vertical.
        assert!(tilt_compensated_azimuth([0.0, 9.81, 0.0], [0.0, -40.0, 20.0]).is_none());
    }

    #[test]
    fn tilt_model_falls_back_to_planar_atan2() {
        let sample = SensorSample {
            acc_y: 9.81,
            mag_x: 10.0,
            mag_y: 10.0,
            ..Default::default()
        };
        let h = MagnetometerModel::TiltCompensated.heading(&sample);
        assert!((h - PI / 4.0).abs() < 1e-5);
    }

    #[test]
    fn first_sample_adopts_magnetometer_heading() {
        let mut est = planar();
        assert!(!est.is_initialized());
        let h = est.update(&planar_sample(FRAC_PI_2, 5.0, 0));
        assert!((h - FRAC_PI_2).abs() < 1e-5);
        assert!(est.is_initialized());
    }

    #[test]
    fn gyro_dominates_short_term() {
        let mut est = planar();
        est.update(&planar_sample(0.0, 0.0, 0));
        // 1 rad/s for 20 ms, magnetometer still says north.
        let h = est.update(&planar_sample(0.0, 1.0, 20_000_000));
        let expected = 0.98 * 0.02;
        assert!((h - expected).abs() < 1e-5, "got {h}");
    }

    #[test]
    fn magnetometer_removes_gyro_bias_over_time() {
        let mut est = planar();
        let mut ts = 0;
        est.update(&planar_sample(1.0, 0.0, ts));
        for _ in 0..2_000 {
            ts += 20_000_000;
            est.update(&planar_sample(1.0, 0.05, ts));
        }
        // Constant bias leaves a bounded offset of roughly ω·dt·α/(1−α).
        let residual = wrap_pi(est.heading() - 1.0).abs();
        assert!(residual < 0.06, "residual {residual}");
    }

    #[test]
    fn gap_snaps_to_magnetometer() {
        let mut est = planar();
        est.update(&planar_sample(0.0, 0.0, 0));
        est.update(&planar_sample(0.0, 3.0, 500_000_000));
        assert!(est.heading() > 1.0);

        let h = est.update(&planar_sample(2.0, 3.0, 2_000_000_000));
        assert!((h - 2.0).abs() < 1e-5);
    }

    #[test]
    fn out_of_order_sample_snaps_to_magnetometer() {
        let mut est = planar();
        est.update(&planar_sample(0.0, 0.0, 1_000_000_000));
        let h = est.update(&planar_sample(1.5, 10.0, 900_000_000));
        assert!((h - 1.5).abs() < 1e-5);
        let h = est.update(&planar_sample(1.5, 0.0, 900_000_000));
        assert!((h - 1.5).abs() < 1e-5);
    }

    #[test]
    fn heading_stays_normalised_across_north() {
        let mut est = planar();
        let mut ts = 0;
        est.update(&planar_sample(0.05, 0.0, ts));
        // Turn counter-clockwise through north.
        for i in 1..=50 {
            ts += 20_000_000;
            let truth = normalize_angle(0.05 - 0.01 * i as f32);
            let h = est.update(&planar_sample(truth, -0.5, ts));
            assert!((0.0..TAU).contains(&h));
            assert!(angle_close(h, truth, 0.05), "step {i}: {h} vs {truth}");
        }
    }

    #[test]
    fn blend_takes_the_short_arc_across_north() {
        let mut est = HeadingEstimator::new(HeadingConfig {
            alpha: 0.5,
            magnetometer: MagnetometerModel::Planar,
            ..Default::default()
        });
        est.update(&planar_sample(0.05, 0.0, 0));
        let h = est.update(&planar_sample(6.23, 0.0, 20_000_000));

        let linear = 0.5 * 0.05 + 0.5 * 6.23;
        assert!(angle_close(linear, PI, 0.01));
        let midpoint = 0.05 + 0.5 * wrap_pi(6.23 - 0.05);
        assert!(angle_close(h, midpoint, 1e-3), "got {h}");
        assert!(angle_close(h, 0.0, 0.01));
    }

    #[test]
    fn blend_matches_linear_form_away_from_north() {
        let mut est = HeadingEstimator::new(HeadingConfig {
            alpha: 0.5,
            magnetometer: MagnetometerModel::Planar,
            ..Default::default()
        });
        est.update(&planar_sample(2.0, 0.0, 0));
        let h = est.update(&planar_sample(2.6, 0.0, 20_000_000));
        assert!((h - (0.5 * 2.0 + 0.5 * 2.6)).abs() < 1e-3, "got {h}");
    }

    #[test]
    fn reset_forgets_state() {
        let mut est = planar();
        est.update(&planar_sample(1.0, 0.0, 0));
        est.reset();
        assert_eq!(est.heading(), 0.0);
        assert!(!est.is_initialized());
        let h = est.update(&planar_sample(2.5, 0.0, 10));
        assert!((h - 2.5).abs() < 1e-5);
    }

    #[test]
    fn alpha_clamped() {
        let est = HeadingEstimator::new(HeadingConfig {
            alpha: 3.0,
            ..Default::default()
        });
        assert_eq!(est.alpha, 1.0);
    }
}
