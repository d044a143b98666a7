//! `wayback-memory` – what the walk leaves behind.
//!
//! # Modules
//!
//! - [`path_recorder`] – [`PathRecorder`][path_recorder::PathRecorder]:
//!   throttled trajectory buffer whose reversal is the route back.
//! - [`export`] – [`SensorLog`][export::SensorLog] plus the CSV writers for
//!   the trajectory and sensor-log files.

pub mod export;
pub mod path_recorder;

pub use export::{ExportError, ExportPaths, SensorLog, export_all};
pub use path_recorder::{PathRecorder, RecorderConfig};
