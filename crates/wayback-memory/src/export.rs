//! Sensor log and CSV export.
//!
//! Two files are produced per export, named after the local time of the
//! export:
//!
//! | file                              | header                                                                                   |
//! |-----------------------------------|------------------------------------------------------------------------------------------|
//! | `trajectory_YYYYMMDD_HHMMSS.csv`  | `timestamp,x,y,z,heading,source`                                                          |
//! | `sensors_YYYYMMDD_HHMMSS.csv`     | `timestamp,accX,accY,accZ,gyroX,gyroY,gyroZ,magX,magY,magZ,posX,posY,posZ,heading,stepCount,source` |
//!
//! Timestamps are wall-clock milliseconds.  Floats are written in their
//! shortest round-trip form and always carry a decimal point (`1.0`, `0.7`).

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::info;
use wayback_types::{SensorReading, TrajectoryPoint, WaybackError};

pub const TRAJECTORY_HEADER: &str = "timestamp,x,y,z,heading,source";
pub const SENSOR_HEADER: &str =
    "timestamp,accX,accY,accZ,gyroX,gyroY,gyroZ,magX,magY,magZ,posX,posY,posZ,heading,stepCount,source";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<ExportError> for WaybackError {
    fn from(e: ExportError) -> Self {
        WaybackError::Export(e.to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SensorLog
// ────────────────────────────────────────────────────────────────────────────

/// Append-only buffer of [`SensorReading`]s captured while recording.
#[derive(Debug, Clone, Default)]
pub struct SensorLog {
    readings: Vec<SensorReading>,
}

impl SensorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, reading: SensorReading) {
        self.readings.push(reading);
    }

    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Writers
// ────────────────────────────────────────────────────────────────────────────

/// Write the trajectory CSV (header + one row per point) to `out`.
pub fn write_trajectory_csv<W: Write>(out: &mut W, points: &[TrajectoryPoint]) -> io::Result<()> {
    writeln!(out, "{TRAJECTORY_HEADER}")?;
    for p in points {
        writeln!(
            out,
            "{},{:?},{:?},{:?},{:?},{}",
            p.timestamp_ms, p.position.x, p.position.y, p.position.z, p.heading, p.source
        )?;
    }
    Ok(())
}

/// Write the sensor-log CSV (header + one row per reading) to `out`.
pub fn write_sensor_csv<W: Write>(out: &mut W, readings: &[SensorReading]) -> io::Result<()> {
    writeln!(out, "{SENSOR_HEADER}")?;
    for r in readings {
        let s = &r.sample;
        writeln!(
            out,
            "{},{:?},{:?},{:?},{:?},{:?},{:?},{:?},{:?},{:?},{:?},{:?},{:?},{:?},{},{}",
            r.timestamp_ms,
            s.acc_x,
            s.acc_y,
            s.acc_z,
            s.gyro_x,
            s.gyro_y,
            s.gyro_z,
            s.mag_x,
            s.mag_y,
            s.mag_z,
            r.position.x,
            r.position.y,
            r.position.z,
            r.heading,
            r.step_count,
            r.source
        )?;
    }
    Ok(())
}

/// Paths of the files written by [`export_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub trajectory: PathBuf,
    pub sensors: PathBuf,
}

fn export_file_name(prefix: &str, at: &DateTime<Local>) -> String {
    format!("{prefix}_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

fn write_file<F>(path: &Path, body: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> io::Result<()>,
{
    let mut out = BufWriter::new(fs::File::create(path)?);
    body(&mut out)?;
    out.flush()?;
    Ok(())
}

/// Write both CSV files into `dir` (created if missing), stamped with `at`.
pub fn export_all(
    dir: &Path,
    points: &[TrajectoryPoint],
    log: &SensorLog,
    at: DateTime<Local>,
) -> Result<ExportPaths, ExportError> {
    fs::create_dir_all(dir)?;

    let trajectory = dir.join(export_file_name("trajectory", &at));
    write_file(&trajectory, |out| write_trajectory_csv(out, points))?;

    let sensors = dir.join(export_file_name("sensors", &at));
    write_file(&sensors, |out| write_sensor_csv(out, log.readings()))?;

    info!(
        trajectory = %trajectory.display(),
        sensors = %sensors.display(),
        points = points.len(),
        readings = log.len(),
        "data exported"
    );
    Ok(ExportPaths {
        trajectory,
        sensors,
    })
}
