//! One-dimensional Kalman smoother.
//!
//! The fusion loop runs one [`ScalarKalmanFilter`] per horizontal axis to
//! smooth the visual tracker's position.  The state model is a constant: the
//! predict step only inflates the error covariance by the process noise `Q`,
//! and the update step pulls the estimate toward the measurement by the gain
//! `K = P / (P + R)`.
//!
//! # Example
//!
//! ```rust
//! use wayback_perception::kalman::ScalarKalmanFilter;
//!
//! let mut kf = ScalarKalmanFilter::new(0.01, 0.1);
//! assert_eq!(kf.update(5.0), 5.0); // first measurement passes through
//! let smoothed = kf.update(6.0);
//! assert!(smoothed > 5.0 && smoothed < 6.0);
//! ```

use serde::{Deserialize, Serialize};

/// Noise parameters for a [`ScalarKalmanFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Process noise `Q`.
    pub process_noise: f32,
    /// Measurement noise `R`.
    pub measurement_noise: f32,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.01,
            measurement_noise: 0.1,
        }
    }
}

/// Recursive estimator for a single scalar.
#[derive(Debug, Clone)]
pub struct ScalarKalmanFilter {
    process_noise: f32,
    measurement_noise: f32,
    estimate: f32,
    error_covariance: f32,
    initialized: bool,
}

impl ScalarKalmanFilter {
    pub fn new(process_noise: f32, measurement_noise: f32) -> Self {
        Self {
            process_noise,
            measurement_noise,
            estimate: 0.0,
            error_covariance: 1.0,
            initialized: false,
        }
    }

    pub fn from_config(config: KalmanConfig) -> Self {
        Self::new(config.process_noise, config.measurement_noise)
    }

    /// Fold `measurement` into the estimate and return the new estimate.
    ///
    /// The first call after construction or [`reset`](Self::reset) adopts the
    /// measurement verbatim with unit covariance.
    pub fn update(&mut self, measurement: f32) -> f32 {
        if !self.initialized {
            self.estimate = measurement;
            self.error_covariance = 1.0;
            self.initialized = true;
            return self.estimate;
        }

        let predicted_error = self.error_covariance + self.process_noise;
        let gain = predicted_error / (predicted_error + self.measurement_noise);
        self.estimate += gain * (measurement - self.estimate);
        self.error_covariance = (1.0 - gain) * predicted_error;
        self.estimate
    }

    /// Current estimate, or `None` before the first measurement.
    pub fn estimate(&self) -> Option<f32> {
        self.initialized.then_some(self.estimate)
    }

    pub fn error_covariance(&self) -> f32 {
        self.error_covariance
    }

    /// Re-tune `Q` and `R` without discarding the current estimate.
    pub fn set_noise_params(&mut self, process_noise: f32, measurement_noise: f32) {
        self.process_noise = process_noise;
        self.measurement_noise = measurement_noise;
    }

    pub fn reset(&mut self) {
        self.estimate = 0.0;
        self.error_covariance = 1.0;
        self.initialized = false;
    }
}

impl Default for ScalarKalmanFilter {
    fn default() -> Self {
        Self::from_config(KalmanConfig::default())
    }
}
