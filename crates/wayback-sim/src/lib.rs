//! `wayback-sim` – validation harness for the dead-reckoning pipeline.
//!
//! Generates synthetic IMU streams for walks with known ground truth, runs
//! them through dead reckoning, and checks the result against per-scenario
//! limits.  No device is needed, so the whole pipeline can be exercised in
//! CI.
//!
//! # Modules
//!
//! - [`path_simulator`] – [`PathSimulator`][path_simulator::PathSimulator]:
//!   straight walks, walking turns, L-shapes, rectangles and stationary
//!   streams, optionally with seeded Gaussian noise.
//! - [`validator`] – [`PathValidator`][validator::PathValidator] and
//!   [`ValidationReport`][validator::ValidationReport].
//! - [`scenario`] – [`Scenario`][scenario::Scenario]: the named catalogue
//!   and [`run_all`][scenario::run_all].
//!
//! # Example
//!
//! ```rust
//! use wayback_sim::{PathSimulator, PathValidator, Scenario};
//!
//! let report = Scenario::StraightEast.run(&PathValidator::default(), &mut PathSimulator::new());
//! assert!(report.passed, "{report}");
//! ```

pub mod path_simulator;
pub mod scenario;
pub mod validator;

pub use path_simulator::{NoiseModel, PathSimulator, SimulatedPath};
pub use scenario::{Scenario, run_all};
pub use validator::{Criterion, PathValidator, ValidationReport, score};
