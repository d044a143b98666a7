//! `wayback-runtime` – the fusion loop and the command surface.
//!
//! # Modules
//!
//! - [`latest`] – [`LatestCell`][latest::LatestCell]: single-slot,
//!   last-write-wins cell connecting sensor and pose producers to the loop.
//! - [`navigation`] – [`NavigationController`][navigation::NavigationController]:
//!   waypoint follower over the reversed trajectory with arrival detection.
//! - [`session`] – [`NavigationCore`][session::NavigationCore]: synchronous
//!   owner of all derived state; one `tick` per fusion step plus the
//!   `mark_spot` / `start_recording` / `stop_recording` / `start_navigation` /
//!   `stop_navigation` / `export_data` commands.
//! - [`fusion_loop`] – [`FusionLoop`][fusion_loop::FusionLoop] and
//!   [`LoopHandle`][fusion_loop::LoopHandle]: the periodic Tokio task around
//!   the core, its command channel and its published
//!   [`NavSnapshot`][session::NavSnapshot].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP export.

pub mod fusion_loop;
pub mod latest;
pub mod navigation;
pub mod session;
pub mod telemetry;

pub use fusion_loop::{FusionConfig, FusionLoop, LoopHandle, ReplaySummary};
pub use latest::LatestCell;
pub use navigation::{NavigationController, NavigationUpdate, NavigatorConfig};
pub use session::{NavSnapshot, NavigationCore, TickOutcome};
pub use telemetry::{TracerProviderGuard, init_tracing};
