//! Footstep detection over the accelerometer magnitude.
//!
//! # Algorithm
//!
//! The detector keeps a fixed-size FIFO window of `|a| = sqrt(ax² + ay² + az²)`
//! and evaluates it only once the window is full.  The sample sitting at the
//! window's centre index is a **peak** when it equals the window maximum and
//! the maximum exceeds gravity by more than `peak_threshold`.  Requiring the
//! peak at the centre means a single physical peak is considered exactly once
//! as it slides through the window.
//!
//! A peak becomes a step only when more than `min_step_interval_ns` has passed
//! since the previous accepted step.  Stride length follows the Weinberg
//! model:
//!
//! ```text
//! step_length = K * (a_max - a_min)^0.25
//! ```
//!
//! # Plateaus
//!
//! The peak test compares floats for exact equality.  When several
//! consecutive samples tie for the maximum, each of them passes the centre in
//! turn and each is a candidate; the debounce interval is what collapses them
//! into one step.  A plateau lasting longer than the debounce interval is
//! therefore counted more than once.
//!
//! # Example
//!
//! ```rust
//! use wayback_perception::step_detection::StepDetector;
//!
//! let mut detector = StepDetector::default();
//! for i in 0..120 {
//!     // Standing still: gravity only.
//!     assert!(detector.on_sample(0.0, 9.81, 0.0, i * 16_666_667).is_none());
//! }
//! assert_eq!(detector.step_count(), 0);
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wayback_types::StepEvent;

/// Tunables for [`StepDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDetectorConfig {
    /// Number of magnitude samples in the sliding window (~0.5 s at 60 Hz).
    pub window_size: usize,
    /// Required excess of the window maximum over gravity (m/s²).
    pub peak_threshold: f32,
    /// Debounce between accepted steps (ns).
    pub min_step_interval_ns: i64,
    /// Weinberg constant `K`.
    pub weinberg_k: f32,
    /// Gravity reference subtracted from the peak (m/s²).
    pub gravity: f32,
}

impl Default for StepDetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            peak_threshold: 1.2,
            min_step_interval_ns: 300_000_000,
            weinberg_k: 0.5,
            gravity: 9.81,
        }
    }
}

/// Sliding-window peak detector with Weinberg stride estimation.
///
/// Every accepted step is returned exactly once from
/// [`on_sample`](Self::on_sample); there is no callback registration.
#[derive(Debug, Clone)]
pub struct StepDetector {
    config: StepDetectorConfig,
    window: VecDeque<f32>,
    last_step_ns: Option<i64>,
    step_count: u32,
}

impl StepDetector {
    pub fn new(config: StepDetectorConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.window_size.max(1)),
            config,
            last_step_ns: None,
            step_count: 0,
        }
    }

    pub fn config(&self) -> &StepDetectorConfig {
        &self.config
    }

    /// Ingest one accelerometer reading.
    ///
    /// Returns the [`StepEvent`] when this sample confirms a step.
    pub fn on_sample(&mut self, ax: f32, ay: f32, az: f32, timestamp_ns: i64) -> Option<StepEvent> {
        let magnitude = (ax * ax + ay * ay + az * az).sqrt();
        self.window.push_back(magnitude);
        while self.window.len() > self.config.window_size {
            self.window.pop_front();
        }
        if self.config.window_size == 0 || self.window.len() < self.config.window_size {
            return None;
        }

        let (a_min, a_max) = self
            .window
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &a| (lo.min(a), hi.max(a)));
        let centre = self.window[self.window.len() / 2];

        let is_peak = centre == a_max && (a_max - self.config.gravity) > self.config.peak_threshold;
        if !is_peak {
            return None;
        }

        if let Some(last) = self.last_step_ns
            && timestamp_ns - last <= self.config.min_step_interval_ns
        {
            debug!(timestamp_ns, since_last_ns = timestamp_ns - last, "peak rejected by debounce");
            return None;
        }

        self.last_step_ns = Some(timestamp_ns);
        self.step_count += 1;
        let step_length = self.config.weinberg_k * (a_max - a_min).max(0.0).powf(0.25);
        debug!(step = self.step_count, step_length, a_max, a_min, "step detected");

        Some(StepEvent {
            step_length,
            timestamp_ns,
        })
    }

    /// Running total of accepted steps since the last reset.
    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_step_ns = None;
        self.step_count = 0;
    }
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(StepDetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const DT_60HZ: i64 = 16_666_667;
    const DT_50HZ: i64 = 20_000_000;

    fn walking(detector: &mut StepDetector, samples: usize, amplitude: f64) -> Vec<StepEvent> {
        let mut events = Vec::new();
        for i in 0..samples {
            let t = i as f64 / 60.0;
            let ay = (9.81 + amplitude * (2.0 * PI * 2.0 * t).sin()) as f32;
            events.extend(detector.on_sample(0.0, ay, 0.0, i as i64 * DT_60HZ));
        }
        events
    }

    /// Flat 9.5 m/s² with `len` samples at `amplitude` from index `start`.
    fn plateau(start: i64, len: i64, amplitude: f32, samples: i64) -> Vec<StepEvent> {
        let mut d = StepDetector::default();
        (0..samples)
            .filter_map(|i| {
                let a = if (start..start + len).contains(&i) { amplitude } else { 9.5 };
                d.on_sample(0.0, a, 0.0, i * DT_50HZ)
            })
            .collect()
    }

    #[test]
    fn gravity_only_never_steps() {
        let mut d = StepDetector::default();
        for i in 0..120 {
            assert!(d.on_sample(0.0, 9.81, 0.0, i * DT_60HZ).is_none());
        }
        assert_eq!(d.step_count(), 0);
    }

    #[test]
    fn partial_window_never_emits() {
        let mut d = StepDetector::default();
        for i in 0..29 {
            let a = if i == 15 { 20.0 } else { 9.0 };
            assert!(d.on_sample(0.0, a, 0.0, i * DT_60HZ).is_none());
        }
    }

    #[test]
    fn walking_waveform_produces_steps() {
        for amplitude in [3.0, 4.0] {
            let mut d = StepDetector::default();
            let events = walking(&mut d, 180, amplitude);
            assert!(d.step_count() >= 1, "amplitude {amplitude} produced no steps");
            assert_eq!(d.step_count() as usize, events.len());
        }
    }

    #[test]
    fn weinberg_step_length() {
        let mut d = StepDetector::default();
        let mut event = None;
        for i in 0..30 {
            let a = if i == 15 { 13.0 } else { 8.0 };
            event = event.or(d.on_sample(0.0, a, 0.0, i * DT_60HZ));
        }
        let event = event.expect("peak at the window centre must be a step");
        let expected = 0.5 * 5.0_f32.powf(0.25);
        assert!((event.step_length - expected).abs() < 1e-5);
        assert!((event.step_length - 0.748).abs() < 0.01);
        assert_eq!(event.timestamp_ns, 29 * DT_60HZ);
    }

    #[test]
    fn peaks_closer_than_debounce_yield_one_step() {
        // Peaks at samples 20 and 30 are 200 ms apart at 50 Hz.
        let mut d = StepDetector::default();
        let mut events = Vec::new();
        for i in 0..60 {
            let a = if i == 20 || i == 30 { 14.0 } else { 9.0 };
            events.extend(d.on_sample(0.0, a, 0.0, i * DT_50HZ));
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp_ns, 34 * DT_50HZ);
    }

    #[test]
    fn second_burst_adds_at_most_one_step() {
        let mut d = StepDetector::default();
        for i in 0..30 {
            let a = if i == 15 { 14.0 } else { 9.0 };
            d.on_sample(0.0, a, 0.0, i * DT_60HZ);
        }
        let after_first = d.step_count();

        let base = 29 * DT_60HZ;
        for i in 0..30 {
            let a = if i == 15 { 14.0 } else { 9.0 };
            d.on_sample(0.0, a, 0.0, base + i * DT_60HZ);
        }
        assert!(d.step_count() <= after_first + 1);
    }

    #[test]
    fn short_plateau_is_detected_once() {
        // Every sample of a plateau shorter than the debounce interval reaches
        // the centre index as a tied maximum; only the first may step.
        for amplitude in [11.5, 13.5] {
            for start in [14, 30, 41, 57] {
                for len in 1..=15 {
                    let events = plateau(start, len, amplitude, start + len + 40);
                    assert_eq!(
                        events.len(),
                        1,
                        "amplitude {amplitude}, start {start}, {len} samples"
                    );
                }
            }
        }
    }

    #[test]
    fn plateau_longer_than_debounce_counts_twice() {
        // 25 samples at 50 Hz is 500 ms of tied maxima.
        let events = plateau(30, 25, 13.5, 110);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].timestamp_ns - events[0].timestamp_ns, 16 * DT_50HZ);
    }

    #[test]
    fn sub_threshold_peak_is_ignored() {
        let mut d = StepDetector::default();
        for i in 0..60 {
            let a = if i == 20 { 10.9 } else { 9.81 };
            assert!(d.on_sample(0.0, a, 0.0, i * DT_50HZ).is_none());
        }
    }

    #[test]
    fn reset_clears_count_and_window() {
        let mut d = StepDetector::default();
        walking(&mut d, 200, 3.0);
        assert!(d.step_count() > 0);
        d.reset();
        assert_eq!(d.step_count(), 0);
        // Window is empty again: a lone spike cannot be a step yet.
        assert!(d.on_sample(0.0, 20.0, 0.0, 0).is_none());
    }
}
