//! Periodic fusion task.
//!
//! [`FusionLoop`] owns a [`NavigationCore`] and ticks it at a fixed cadence
//! (default 50 ms).  Everything else talks to it through a [`LoopHandle`]:
//!
//! - sensor samples and tracker poses are written into [`LatestCell`]s and
//!   read once per tick, so samples arriving faster than the tick rate are
//!   dropped;
//! - commands travel over an `mpsc` channel and are applied at the start of
//!   the next tick, each answered on its own `oneshot`;
//! - a [`NavSnapshot`] is published on a `watch` channel after commands and
//!   after every tick.
//!
//! Cancellation is cooperative: [`LoopHandle::cancel`] sets a flag that the
//! loop checks at each tick boundary.  A tick already running completes and
//! publishes normally.  The loop also ends when every handle is dropped.
//!
//! # Example
//!
//! ```rust,no_run
//! use wayback_runtime::fusion_loop::{FusionConfig, FusionLoop};
//!
//! # async fn demo() -> Result<(), wayback_types::WaybackError> {
//! let (handle, task) = FusionLoop::spawn(FusionConfig::default());
//! handle.mark_spot().await?;
//! handle.start_recording().await?;
//! // ... walk ...
//! handle.stop_recording().await?;
//! handle.start_navigation().await?;
//! handle.cancel();
//! let _core = task.await;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use wayback_memory::{ExportPaths, RecorderConfig, export_all};
use wayback_perception::{KalmanConfig, PdrConfig};
use wayback_types::{ParkingSpot, PoseReading, Position, SensorSample, WaybackError};

use crate::latest::LatestCell;
use crate::navigation::NavigatorConfig;
use crate::session::{NavSnapshot, NavigationCore};

const COMMAND_QUEUE: usize = 32;

/// Every tunable of the fusion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Tick period in milliseconds.
    pub tick_ms: u64,
    pub pdr: PdrConfig,
    pub kalman: KalmanConfig,
    pub recorder: RecorderConfig,
    pub navigator: NavigatorConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            pdr: PdrConfig::default(),
            kalman: KalmanConfig::default(),
            recorder: RecorderConfig::default(),
            navigator: NavigatorConfig::default(),
        }
    }
}

/// Result of feeding a recorded sample stream through the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySummary {
    pub samples: usize,
    pub steps: u32,
    pub position: Position,
}

enum Command {
    MarkSpot(oneshot::Sender<ParkingSpot>),
    StartRecording(oneshot::Sender<()>),
    StopRecording(oneshot::Sender<()>),
    StartNavigation(oneshot::Sender<Result<usize, WaybackError>>),
    StopNavigation(oneshot::Sender<()>),
    Export {
        dir: PathBuf,
        reply: oneshot::Sender<Result<ExportPaths, WaybackError>>,
    },
    Replay {
        samples: Vec<SensorSample>,
        reply: oneshot::Sender<ReplaySummary>,
    },
}

/// Deferred answer to a command.
type Reply = Box<dyn FnOnce() + Send>;

// ────────────────────────────────────────────────────────────────────────────
// FusionLoop
// ────────────────────────────────────────────────────────────────────────────

pub struct FusionLoop {
    core: NavigationCore,
    period: Duration,
    sensors: LatestCell<SensorSample>,
    pose: LatestCell<PoseReading>,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<NavSnapshot>,
    cancelled: Arc<AtomicBool>,
    /// Added to the wall clock so loop time never runs backwards after a
    /// replay stamped ticks ahead of it.
    clock_offset_ms: i64,
}

impl FusionLoop {
    pub fn new(config: FusionConfig) -> (Self, LoopHandle) {
        let core = NavigationCore::new(&config);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        let (snap_tx, snap_rx) = watch::channel(core.snapshot());
        let sensors = LatestCell::new();
        let pose = LatestCell::new();
        let cancelled = Arc::new(AtomicBool::new(false));

        let handle = LoopHandle {
            commands: cmd_tx,
            snapshots: snap_rx,
            sensors: sensors.clone(),
            pose: pose.clone(),
            cancelled: Arc::clone(&cancelled),
        };
        let fusion = Self {
            core,
            period: Duration::from_millis(config.tick_ms.max(1)),
            sensors,
            pose,
            commands: cmd_rx,
            snapshots: snap_tx,
            cancelled,
            clock_offset_ms: 0,
        };
        (fusion, handle)
    }

    /// Build the loop and run it on the current Tokio runtime.
    pub fn spawn(config: FusionConfig) -> (LoopHandle, JoinHandle<NavigationCore>) {
        let (fusion, handle) = Self::new(config);
        (handle, tokio::spawn(fusion.run()))
    }

    /// Tick until cancelled or orphaned; returns the core for inspection.
    pub async fn run(mut self) -> NavigationCore {
        info!(period_ms = self.period.as_millis() as u64, "fusion loop started");
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if self.cancelled.load(Ordering::Acquire) {
                break;
            }
            if !self.drain_commands() {
                debug!("all loop handles dropped");
                break;
            }

            let now_ms = self.now_ms();
            self.core.tick(self.sensors.take(), self.pose.latest(), now_ms);
            self.publish();
        }

        info!("fusion loop stopped");
        self.core
    }

    /// Apply every queued command.  Returns `false` once no handle remains.
    ///
    /// Replies are sent after the post-command snapshot is published, so a
    /// caller that awaited a command observes its effect.
    fn drain_commands(&mut self) -> bool {
        let mut replies = Vec::new();
        let connected = loop {
            match self.commands.try_recv() {
                Ok(cmd) => replies.push(self.apply(cmd)),
                Err(mpsc::error::TryRecvError::Empty) => break true,
                Err(mpsc::error::TryRecvError::Disconnected) => break false,
            }
        };
        if !replies.is_empty() {
            self.publish();
            replies.into_iter().for_each(|reply| reply());
        }
        connected
    }

    fn apply(&mut self, cmd: Command) -> Reply {
        // A dropped reply receiver only means the caller stopped waiting.
        match cmd {
            Command::MarkSpot(reply) => {
                let spot = self.core.mark_spot(self.now_ms());
                Box::new(move || {
                    let _ = reply.send(spot);
                })
            }
            Command::StartRecording(reply) => {
                self.core.start_recording();
                Box::new(move || {
                    let _ = reply.send(());
                })
            }
            Command::StopRecording(reply) => {
                self.core.stop_recording();
                Box::new(move || {
                    let _ = reply.send(());
                })
            }
            Command::StartNavigation(reply) => {
                let result = self.core.start_navigation();
                if let Err(e) = &result {
                    warn!(error = %e, "navigation not started");
                }
                Box::new(move || {
                    let _ = reply.send(result);
                })
            }
            Command::StopNavigation(reply) => {
                self.core.stop_navigation();
                Box::new(move || {
                    let _ = reply.send(());
                })
            }
            Command::Export { dir, reply } => {
                let (points, log) = self.core.export_payload();
                Box::new(move || {
                    tokio::task::spawn_blocking(move || {
                        let result =
                            export_all(&dir, &points, &log, Local::now()).map_err(WaybackError::from);
                        if let Err(e) = &result {
                            warn!(error = %e, "export failed");
                        }
                        let _ = reply.send(result);
                    });
                })
            }
            Command::Replay { samples, reply } => {
                let summary = self.replay(&samples);
                Box::new(move || {
                    let _ = reply.send(summary);
                })
            }
        }
    }

    /// Loop time in milliseconds.
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis() + self.clock_offset_ms
    }

    /// Feed a sample stream tick by tick, with loop time advanced by the
    /// sample timestamps.  Afterwards the clock offset is raised so that live
    /// ticks continue from where the replay ended.
    fn replay(&mut self, samples: &[SensorSample]) -> ReplaySummary {
        let steps_before = self.core.step_count();
        let base_ms = self.now_ms();
        let first_ns = samples.first().map_or(0, |s| s.timestamp_ns);
        let pose = self.pose.latest();
        let mut end_ms = base_ms;
        for sample in samples {
            end_ms = end_ms.max(base_ms + (sample.timestamp_ns - first_ns) / 1_000_000);
            self.core.tick(Some(*sample), pose, end_ms);
        }
        self.clock_offset_ms = self
            .clock_offset_ms
            .max(end_ms - Utc::now().timestamp_millis());

        let summary = ReplaySummary {
            samples: samples.len(),
            steps: self.core.step_count().saturating_sub(steps_before),
            position: self.core.position(),
        };
        info!(
            samples = summary.samples,
            steps = summary.steps,
            clock_offset_ms = self.clock_offset_ms,
            "sensor stream replayed"
        );
        summary
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.core.snapshot());
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LoopHandle
// ────────────────────────────────────────────────────────────────────────────

/// Command surface and observation point of a running [`FusionLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<NavSnapshot>,
    sensors: LatestCell<SensorSample>,
    pose: LatestCell<PoseReading>,
    cancelled: Arc<AtomicBool>,
}

impl LoopHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, WaybackError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| WaybackError::LoopClosed)?;
        rx.await.map_err(|_| WaybackError::LoopClosed)
    }

    pub async fn mark_spot(&self) -> Result<ParkingSpot, WaybackError> {
        self.request(Command::MarkSpot).await
    }

    pub async fn start_recording(&self) -> Result<(), WaybackError> {
        self.request(Command::StartRecording).await
    }

    pub async fn stop_recording(&self) -> Result<(), WaybackError> {
        self.request(Command::StopRecording).await
    }

    /// Returns the number of waypoints on the way back.
    pub async fn start_navigation(&self) -> Result<usize, WaybackError> {
        self.request(Command::StartNavigation).await?
    }

    pub async fn stop_navigation(&self) -> Result<(), WaybackError> {
        self.request(Command::StopNavigation).await
    }

    pub async fn export_data(&self, dir: impl Into<PathBuf>) -> Result<ExportPaths, WaybackError> {
        let dir = dir.into();
        self.request(|reply| Command::Export { dir, reply }).await?
    }

    /// Push every sample through the core in order, bypassing the
    /// latest-value cell.
    pub async fn replay(&self, samples: Vec<SensorSample>) -> Result<ReplaySummary, WaybackError> {
        self.request(|reply| Command::Replay { samples, reply }).await
    }

    pub fn publish_sample(&self, sample: SensorSample) {
        self.sensors.publish(sample);
    }

    pub fn publish_pose(&self, pose: PoseReading) {
        self.pose.publish(pose);
    }

    /// Cell a sensor producer can write into directly.
    pub fn sensor_input(&self) -> LatestCell<SensorSample> {
        self.sensors.clone()
    }

    pub fn pose_input(&self) -> LatestCell<PoseReading> {
        self.pose.clone()
    }

    pub fn snapshot(&self) -> NavSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NavSnapshot> {
        self.snapshots.clone()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
