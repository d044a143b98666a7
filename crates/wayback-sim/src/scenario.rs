//! Named end-to-end scenarios with their acceptance limits.
//!
//! | name         | path                                   | limit                  |
//! |--------------|----------------------------------------|------------------------|
//! | `north50`    | 50 m straight north                    | endpoint ≤ 5 m         |
//! | `east30`     | 30 m straight east                     | endpoint ≤ 3 m         |
//! | `l-shape`    | 20 m north, turn right, 15 m east      | endpoint ≤ 5 m         |
//! | `rectangle`  | 10 m × 15 m clockwise loop             | closing ≤ 3 m          |
//! | `stationary` | 5 s standing still                     | 0 steps, drift ≤ 0.1 m |
//! | `parking`    | 30 m north, 15 m west, 10 m south      | endpoint ≤ 5.5 m       |
//! | `rectangle-high-noise` | 20 m × 10 m loop, noise doubled | closing ≤ 9 m    |
//!
//! `rectangle-high-noise` always carries sensor noise: on a noise-free
//! simulator it seeds its own rng with [`HIGH_NOISE_SEED`].

use std::f32::consts::FRAC_PI_2;
use std::fmt;
use std::str::FromStr;

use crate::path_simulator::{NoiseModel, PathSimulator, SimulatedPath};
use crate::validator::{Criterion, PathValidator, ValidationReport};

/// Noise multiplier of `rectangle-high-noise`.
pub const HIGH_NOISE_FACTOR: f32 = 2.0;
pub const HIGH_NOISE_SEED: u64 = 0x5EED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    StraightNorth,
    StraightEast,
    LShape,
    Rectangle,
    Stationary,
    Parking,
    RectangleHighNoise,
}

impl Scenario {
    pub const ALL: [Scenario; 7] = [
        Scenario::StraightNorth,
        Scenario::StraightEast,
        Scenario::LShape,
        Scenario::Rectangle,
        Scenario::Stationary,
        Scenario::Parking,
        Scenario::RectangleHighNoise,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::StraightNorth => "north50",
            Scenario::StraightEast => "east30",
            Scenario::LShape => "l-shape",
            Scenario::Rectangle => "rectangle",
            Scenario::Stationary => "stationary",
            Scenario::Parking => "parking",
            Scenario::RectangleHighNoise => "rectangle-high-noise",
        }
    }

    pub fn build(&self, sim: &mut PathSimulator) -> SimulatedPath {
        match self {
            Scenario::StraightNorth => sim.straight_walk(50.0, 0.0),
            Scenario::StraightEast => sim.straight_walk(30.0, FRAC_PI_2),
            Scenario::LShape => sim.l_shape(20.0, 15.0),
            Scenario::Rectangle => sim.rectangle(10.0, 15.0),
            Scenario::Stationary => sim.stationary(5_000),
            Scenario::Parking => sim.parking_walk(30.0, 15.0, 10.0),
            Scenario::RectangleHighNoise => {
                let mut path = sim.with_scaled_noise(HIGH_NOISE_FACTOR, HIGH_NOISE_SEED, |s| {
                    s.rectangle(20.0, 10.0)
                });
                path.description.push_str(", noise ×2");
                path
            }
        }
    }

    pub fn criterion(&self) -> Criterion {
        match self {
            Scenario::StraightNorth | Scenario::LShape => Criterion::Endpoint { max_error: 5.0 },
            Scenario::StraightEast => Criterion::Endpoint { max_error: 3.0 },
            Scenario::Rectangle => Criterion::Closing { max_error: 3.0 },
            Scenario::Stationary => Criterion::Stationary { max_drift: 0.1 },
            Scenario::Parking => Criterion::Endpoint { max_error: 5.5 },
            Scenario::RectangleHighNoise => Criterion::Closing { max_error: 9.0 },
        }
    }

    pub fn run(&self, validator: &PathValidator, sim: &mut PathSimulator) -> ValidationReport {
        let path = self.build(sim);
        let mut report = validator.validate(&path, self.criterion());
        report.description = format!("{}: {}", self.name(), path.description);
        report
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Scenario::ALL.iter().map(Scenario::name).collect();
                format!("unknown scenario '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

/// Run every scenario, each from a fresh simulator.  With `noise`, the
/// simulator adds seeded sensor noise.
pub fn run_all(validator: &PathValidator, noise: Option<(NoiseModel, u64)>) -> Vec<ValidationReport> {
    Scenario::ALL
        .iter()
        .map(|scenario| {
            let mut sim = match noise {
                Some((model, seed)) => PathSimulator::new().with_noise(model, seed),
                None => PathSimulator::new(),
            };
            scenario.run(validator, &mut sim)
        })
        .collect()
}
