//! Synthetic IMU streams for walks with known ground truth.
//!
//! Samples are generated at 50 Hz while the simulated pedestrian takes two
//! steps per second, so every step spans exactly [`SAMPLES_PER_STEP`] samples.
//! During a walk the vertical acceleration oscillates around gravity with an
//! amplitude chosen so that the Weinberg model with `K = 0.5` yields the
//! configured stride.  The device is held flat with its +y axis pointing
//! along the walking direction, so gravity lies on device z and the
//! geomagnetic field `(0, B, V)` (east, north, up) reads
//! `(−B·sin h, B·cos h, V)`; the tilt-compensated azimuth of that pair is
//! exactly `h`.
//!
//! Ground truth holds one position per step, taken at the sample where the
//! step's acceleration peak occurs, starting at the origin.
//!
//! Segments produced by one [`PathSimulator`] share its clock, so they can be
//! joined with [`SimulatedPath::chain`] into a single continuous stream.

use std::f32::consts::{PI, TAU};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use wayback_types::{Position, SensorSample};

pub const SAMPLE_INTERVAL_NS: i64 = 20_000_000;
pub const SAMPLE_RATE_HZ: f32 = 50.0;
pub const WALK_FREQUENCY_HZ: f32 = 2.0;
pub const SAMPLES_PER_STEP: usize = 25;
pub const GRAVITY: f32 = 9.81;
pub const DEFAULT_STEP_LENGTH: f32 = 0.7;
/// Horizontal and vertical magnetic field components (µT).
pub const MAG_HORIZONTAL: f32 = 20.0;
pub const MAG_VERTICAL: f32 = -40.0;

const WEINBERG_K: f32 = 0.5;
const STILL_ACC_NOISE_SCALE: f32 = 0.2;
/// Sample within a step at which the sinusoid peaks (a quarter period).
const PEAK_OFFSET: usize = 6;

/// Acceleration amplitude (m/s²) that makes the Weinberg stride equal
/// `step_length`: `K·(2A)^¼ = L`.
pub fn walk_amplitude(step_length: f32) -> f32 {
    (step_length / WEINBERG_K).powi(4) / 2.0
}

/// Standard deviations of additive Gaussian sensor noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseModel {
    pub acc_std: f32,
    pub gyro_std: f32,
    pub mag_std: f32,
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self {
            acc_std: 0.3,
            gyro_std: 0.01,
            mag_std: 1.0,
        }
    }
}

impl NoiseModel {
    /// Every standard deviation multiplied by `factor`.
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            acc_std: self.acc_std * factor,
            gyro_std: self.gyro_std * factor,
            mag_std: self.mag_std * factor,
        }
    }
}

/// A generated sensor stream and the true positions of the walker.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPath {
    pub description: String,
    pub samples: Vec<SensorSample>,
    /// Origin followed by the position after each true step.
    pub ground_truth: Vec<Position>,
}

impl SimulatedPath {
    /// Join segments end to end.  Each segment's ground truth is shifted to
    /// start where the previous one ended.
    pub fn chain(description: impl Into<String>, parts: Vec<SimulatedPath>) -> SimulatedPath {
        let mut samples = Vec::new();
        let mut ground_truth = vec![Position::origin()];
        for part in parts {
            let start = ground_truth.last().copied().unwrap_or_default();
            samples.extend(part.samples);
            ground_truth.extend(
                part.ground_truth
                    .iter()
                    .skip(1)
                    .map(|p| Position::new(start.x + p.x, 0.0, start.z + p.z)),
            );
        }
        SimulatedPath {
            description: description.into(),
            samples,
            ground_truth,
        }
    }

    pub fn truth_start(&self) -> Position {
        self.ground_truth.first().copied().unwrap_or_default()
    }

    pub fn truth_end(&self) -> Position {
        self.ground_truth.last().copied().unwrap_or_default()
    }

    /// Number of steps actually taken.
    pub fn expected_steps(&self) -> usize {
        self.ground_truth.len().saturating_sub(1)
    }

    /// Length of the true route.
    pub fn total_distance(&self) -> f32 {
        self.ground_truth
            .windows(2)
            .map(|w| w[0].distance_2d(&w[1]))
            .sum()
    }

    /// Stream duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.samples.len() as i64 * SAMPLE_INTERVAL_NS / 1_000_000
    }
}

/// Shortest signed rotation from `from` to `to`, in `[−π, π)`.
fn shortest_delta(from: f32, to: f32) -> f32 {
    (to - from + PI).rem_euclid(TAU) - PI
}

/// Stateful generator: owns the stream clock and the noise source.
#[derive(Debug, Clone)]
pub struct PathSimulator {
    step_length: f32,
    noise: NoiseModel,
    rng: Option<StdRng>,
    next_timestamp_ns: i64,
}

impl Default for PathSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl PathSimulator {
    /// Noise-free simulator with a 0.7 m stride.
    pub fn new() -> Self {
        Self {
            step_length: DEFAULT_STEP_LENGTH,
            noise: NoiseModel::default(),
            rng: None,
            next_timestamp_ns: 0,
        }
    }

    pub fn with_step_length(mut self, step_length: f32) -> Self {
        self.step_length = step_length;
        self
    }

    /// Add seeded Gaussian noise to every sample.
    pub fn with_noise(mut self, noise: NoiseModel, seed: u64) -> Self {
        self.noise = noise;
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn step_length(&self) -> f32 {
        self.step_length
    }

    /// Run `build` with the noise scaled by `factor`.  A noise-free
    /// simulator draws from an rng seeded with `seed` for the duration.
    pub fn with_scaled_noise(
        &mut self,
        factor: f32,
        seed: u64,
        build: impl FnOnce(&mut Self) -> SimulatedPath,
    ) -> SimulatedPath {
        let saved = self.noise;
        let seeded_here = self.rng.is_none();
        if seeded_here {
            self.rng = Some(StdRng::seed_from_u64(seed));
        }
        self.noise = saved.scaled(factor);
        let path = build(self);
        self.noise = saved;
        if seeded_here {
            self.rng = None;
        }
        path
    }

    /// Box-Muller transform; zero when noise is disabled.
    fn gaussian_noise(&mut self, stddev: f32) -> f32 {
        let Some(rng) = self.rng.as_mut() else {
            return 0.0;
        };
        if stddev == 0.0 {
            return 0.0;
        }
        let u1: f32 = rng.r#gen::<f32>().max(f32::EPSILON);
        let u2: f32 = rng.r#gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        z * stddev
    }

    fn sample(&mut self, acc_up: f32, gyro_z: f32, heading: f32) -> SensorSample {
        let timestamp_ns = self.next_timestamp_ns;
        self.next_timestamp_ns += SAMPLE_INTERVAL_NS;
        let n = self.noise;
        SensorSample {
            acc_x: self.gaussian_noise(n.acc_std),
            acc_y: self.gaussian_noise(n.acc_std),
            acc_z: acc_up + self.gaussian_noise(n.acc_std),
            gyro_x: 0.0,
            gyro_y: 0.0,
            gyro_z: gyro_z + self.gaussian_noise(n.gyro_std),
            mag_x: -MAG_HORIZONTAL * heading.sin() + self.gaussian_noise(n.mag_std),
            mag_y: MAG_HORIZONTAL * heading.cos() + self.gaussian_noise(n.mag_std),
            mag_z: MAG_VERTICAL + self.gaussian_noise(n.mag_std),
            timestamp_ns,
        }
    }

    /// Walk `steps` strides while turning steadily from `from_heading` to
    /// `to_heading` along the shorter direction.
    pub fn walk(&mut self, steps: usize, from_heading: f32, to_heading: f32) -> SimulatedPath {
        let n = steps * SAMPLES_PER_STEP;
        let delta = shortest_delta(from_heading, to_heading);
        let duration_s = n as f32 / SAMPLE_RATE_HZ;
        let yaw_rate = if n > 0 { delta / duration_s } else { 0.0 };
        let amplitude = walk_amplitude(self.step_length);

        let mut samples = Vec::with_capacity(n);
        let mut ground_truth = vec![Position::origin()];
        let (mut x, mut z) = (0.0_f32, 0.0_f32);
        for i in 0..n {
            let t = i as f32 / SAMPLE_RATE_HZ;
            let heading = from_heading + delta * (i as f32 / n as f32);
            let acc_up = GRAVITY + amplitude * (TAU * WALK_FREQUENCY_HZ * t).sin();
            samples.push(self.sample(acc_up, yaw_rate, heading));

            if i % SAMPLES_PER_STEP == PEAK_OFFSET {
                x += self.step_length * heading.sin();
                z += self.step_length * heading.cos();
                ground_truth.push(Position::new(x, 0.0, z));
            }
        }

        SimulatedPath {
            description: format!("walk {steps} steps"),
            samples,
            ground_truth,
        }
    }

    /// Straight walk of about `distance` metres (rounded to whole strides).
    pub fn straight_walk(&mut self, distance: f32, heading: f32) -> SimulatedPath {
        let steps = (distance / self.step_length).round().max(0.0) as usize;
        let mut path = self.walk(steps, heading, heading);
        path.description = format!("straight {distance} m at {:.0}°", heading.to_degrees());
        path
    }

    /// Change heading over `steps` strides while still walking.
    pub fn walking_turn(&mut self, from_heading: f32, to_heading: f32, steps: usize) -> SimulatedPath {
        let mut path = self.walk(steps, from_heading, to_heading);
        path.description = format!(
            "turn {:.0}° → {:.0}°",
            from_heading.to_degrees(),
            to_heading.to_degrees()
        );
        path
    }

    /// `leg1` metres north, a three-step right turn, `leg2` metres east.
    pub fn l_shape(&mut self, leg1: f32, leg2: f32) -> SimulatedPath {
        let parts = vec![
            self.straight_walk(leg1, 0.0),
            self.walking_turn(0.0, PI / 2.0, 3),
            self.straight_walk(leg2, PI / 2.0),
        ];
        SimulatedPath::chain(format!("L-shape {leg1} m N + {leg2} m E"), parts)
    }

    /// `north` metres north, a left turn, `west` metres west, another left
    /// turn, `south` metres south: the walk from a parked car to a shop.
    pub fn parking_walk(&mut self, north: f32, west: f32, south: f32) -> SimulatedPath {
        let west_heading = 1.5 * PI;
        let parts = vec![
            self.straight_walk(north, 0.0),
            self.walking_turn(0.0, west_heading, 3),
            self.straight_walk(west, west_heading),
            self.walking_turn(west_heading, PI, 3),
            self.straight_walk(south, PI),
        ];
        SimulatedPath::chain(format!("parking {north} m N + {west} m W + {south} m S"), parts)
    }

    /// Clockwise loop: `height` north, `width` east, `height` south, `width`
    /// west, with two-step turns at every corner including the last.
    pub fn rectangle(&mut self, width: f32, height: f32) -> SimulatedPath {
        let headings = [0.0, PI / 2.0, PI, 1.5 * PI];
        let legs = [height, width, height, width];
        let mut parts = Vec::with_capacity(8);
        for (i, (&heading, &leg)) in headings.iter().zip(legs.iter()).enumerate() {
            parts.push(self.straight_walk(leg, heading));
            let next = headings[(i + 1) % headings.len()];
            parts.push(self.walking_turn(heading, next, 2));
        }
        SimulatedPath::chain(format!("rectangle {width} m × {height} m"), parts)
    }

    /// Standing still, device flat and facing north.  Accelerometer noise is
    /// reduced to a fifth: a resting device does not jitter like a walking one.
    pub fn stationary(&mut self, duration_ms: i64) -> SimulatedPath {
        let n = (duration_ms.max(0) * 1_000_000 / SAMPLE_INTERVAL_NS) as usize;
        let walking_noise = self.noise;
        self.noise.acc_std *= STILL_ACC_NOISE_SCALE;
        let samples = (0..n).map(|_| self.sample(GRAVITY, 0.0, 0.0)).collect();
        self.noise = walking_noise;
        SimulatedPath {
            description: format!("stationary {} s", duration_ms as f32 / 1000.0),
            samples,
            ground_truth: vec![Position::origin()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amplitude_matches_stride() {
        assert!((walk_amplitude(0.7) - 1.9208).abs() < 1e-3);
        let k = 0.5_f32;
        assert!((k * (2.0 * walk_amplitude(0.8)).powf(0.25) - 0.8).abs() < 1e-5);
    }

    #[test]
    fn straight_walk_shape() {
        let mut sim = PathSimulator::new();
        let path = sim.straight_walk(50.0, 0.0);
        assert_eq!(path.expected_steps(), 71);
        assert_eq!(path.samples.len(), 71 * SAMPLES_PER_STEP);
        let end = path.truth_end();
        assert!(end.x.abs() < 1e-4);
        assert!((end.z - 49.7).abs() < 1e-3);
        assert!((path.total_distance() - 49.7).abs() < 1e-3);
    }

    #[test]
    fn timestamps_are_contiguous_across_segments() {
        let mut sim = PathSimulator::new();
        let path = sim.l_shape(7.0, 7.0);
        for pair in path.samples.windows(2) {
            assert_eq!(pair[1].timestamp_ns - pair[0].timestamp_ns, SAMPLE_INTERVAL_NS);
        }
        assert_eq!(path.samples[0].timestamp_ns, 0);
    }

    #[test]
    fn turn_rate_integrates_to_turn_angle() {
        let mut sim = PathSimulator::new();
        let turn = sim.walking_turn(1.5 * PI, 0.0, 2);
        let dt = SAMPLE_INTERVAL_NS as f32 * 1e-9;
        let total: f32 = turn.samples.iter().map(|s| s.gyro_z * dt).sum();
        // Shortest way from west to north is +90°.
        assert!((total - PI / 2.0).abs() < 1e-3);
    }

    #[test]
    fn readings_encode_heading_for_tilt_compensation() {
        use wayback_perception::heading::tilt_compensated_azimuth;

        let mut sim = PathSimulator::new();
        for heading in [0.0, 0.8, PI / 2.0, PI, 4.0] {
            let s = sim.straight_walk(1.4, heading).samples[0];
            assert!((s.mag_x + MAG_HORIZONTAL * heading.sin()).abs() < 1e-4);
            assert_eq!(s.mag_z, MAG_VERTICAL);
            let az = tilt_compensated_azimuth([s.acc_x, s.acc_y, s.acc_z], [s.mag_x, s.mag_y, s.mag_z])
                .expect("flat device has a defined azimuth");
            let diff = (az - heading + PI).rem_euclid(TAU) - PI;
            assert!(diff.abs() < 1e-4, "heading {heading} read back as {az}");
        }
    }

    #[test]
    fn rectangle_closes() {
        let mut sim = PathSimulator::new();
        let path = sim.rectangle(10.0, 15.0);
        assert_eq!(path.expected_steps(), 21 + 2 + 14 + 2 + 21 + 2 + 14 + 2);
        let end = path.truth_end();
        assert!(end.distance_2d(&path.truth_start()) < 1e-3);
    }

    #[test]
    fn stationary_has_no_steps() {
        let mut sim = PathSimulator::new();
        let path = sim.stationary(5_000);
        assert_eq!(path.samples.len(), 250);
        assert_eq!(path.expected_steps(), 0);
        assert_eq!(path.duration_ms(), 5_000);
    }

    #[test]
    fn noise_is_seeded() {
        let a = PathSimulator::new()
            .with_noise(NoiseModel::default(), 7)
            .straight_walk(5.0, 0.0);
        let b = PathSimulator::new()
            .with_noise(NoiseModel::default(), 7)
            .straight_walk(5.0, 0.0);
        let clean = PathSimulator::new().straight_walk(5.0, 0.0);
        assert_eq!(a.samples, b.samples);
        assert_ne!(a.samples, clean.samples);
    }

    #[test]
    fn parking_walk_ends_north_west_of_start() {
        let mut sim = PathSimulator::new();
        let path = sim.parking_walk(30.0, 15.0, 10.0);
        let end = path.truth_end();
        // Straight legs plus the forward travel of the two walking turns.
        assert!((end.x + 17.4).abs() < 0.5, "{end:?}");
        assert!((end.z - 20.7).abs() < 0.5, "{end:?}");
        assert_eq!(path.expected_steps(), 43 + 3 + 21 + 3 + 14);
    }

    #[test]
    fn scaled_noise_is_temporary() {
        assert_eq!(
            NoiseModel::default().scaled(2.0),
            NoiseModel { acc_std: 0.6, gyro_std: 0.02, mag_std: 2.0 }
        );

        let mut sim = PathSimulator::new();
        let noisy = sim.with_scaled_noise(2.0, 3, |s| s.straight_walk(5.0, 0.0));
        let after = sim.straight_walk(5.0, 0.0);
        let clean = PathSimulator::new().straight_walk(5.0, 0.0);
        assert!(noisy.samples.iter().any(|s| s.acc_x != 0.0));
        assert_eq!(noisy.samples[0].timestamp_ns, 0);
        // The clock carries on, the noise does not.
        assert_eq!(after.samples[0].timestamp_ns, clean.duration_ms() * 1_000_000);
        assert!(after.samples.iter().all(|s| s.acc_x == 0.0));
    }
}
