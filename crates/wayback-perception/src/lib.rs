//! `wayback-perception` – motion estimation from raw device sensors.
//!
//! # Modules
//!
//! - [`step_detection`] – [`StepDetector`][step_detection::StepDetector]:
//!   sliding-window peak detector over the accelerometer magnitude, with
//!   Weinberg stride estimation.
//! - [`heading`] – [`HeadingEstimator`][heading::HeadingEstimator]:
//!   complementary filter blending integrated gyroscope yaw with a
//!   tilt-compensated magnetometer heading.
//! - [`dead_reckoning`] – [`DeadReckoningEngine`][dead_reckoning::DeadReckoningEngine]:
//!   advances a planar position one stride per detected step.
//! - [`kalman`] – [`ScalarKalmanFilter`][kalman::ScalarKalmanFilter]: per-axis
//!   smoother for the absolute pose.

pub mod dead_reckoning;
pub mod heading;
pub mod kalman;
pub mod step_detection;

pub use dead_reckoning::{DeadReckoningEngine, PdrConfig};
pub use heading::{HeadingConfig, HeadingEstimator, MagnetometerModel};
pub use kalman::{KalmanConfig, ScalarKalmanFilter};
pub use step_detection::{StepDetector, StepDetectorConfig};
