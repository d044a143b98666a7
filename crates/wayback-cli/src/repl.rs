//! REPL – Read-Eval-Print Loop for the wayback interactive shell.
//!
//! Supported slash-commands:
//!   /mark                  – mark the parking spot at the current position
//!   /record                – start recording the walk away from the car
//!   /stop                  – stop recording
//!   /navigate              – guide back along the recorded path
//!   /halt                  – stop navigating
//!   /export                – write the trajectory and sensor CSV files
//!   /status                – print the latest navigation snapshot
//!   /walk <scenario> [seed] – replay a synthetic walk into the live loop
//!   /validate [seed]       – run every scenario through the harness
//!   /settings              – interactively edit `~/.wayback/config.toml`
//!   /help                  – show this list
//!   /quit | /exit          – gracefully exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Runtime;
use wayback_runtime::{LoopHandle, NavSnapshot};
use wayback_sim::{NoiseModel, PathSimulator, PathValidator, Scenario, run_all};

use crate::config::{self, Config};

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Mark,
    Record,
    Stop,
    Navigate,
    Halt,
    Export,
    Status,
    Walk { scenario: Scenario, seed: Option<u64> },
    Validate { seed: Option<u64> },
    Settings,
    Help,
    Quit,
    /// Recognised command with bad arguments.
    Invalid(String),
    Unknown(String),
}

impl ReplCommand {
    /// Parse one input line.  Returns `None` for blank input.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let head = words.next()?;
        let args: Vec<&str> = words.collect();

        let cmd = match head {
            "/mark" => Self::Mark,
            "/record" => Self::Record,
            "/stop" => Self::Stop,
            "/navigate" => Self::Navigate,
            "/halt" => Self::Halt,
            "/export" => Self::Export,
            "/status" => Self::Status,
            "/settings" => Self::Settings,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            "/walk" => match args.as_slice() {
                [name] | [name, _] => match (Scenario::from_str(name), parse_seed(args.get(1))) {
                    (Ok(scenario), Ok(seed)) => Self::Walk { scenario, seed },
                    (Err(e), _) | (_, Err(e)) => Self::Invalid(e),
                },
                _ => Self::Invalid("usage: /walk <scenario> [seed]".to_string()),
            },
            "/validate" => match args.as_slice() {
                [] | [_] => match parse_seed(args.first()) {
                    Ok(seed) => Self::Validate { seed },
                    Err(e) => Self::Invalid(e),
                },
                _ => Self::Invalid("usage: /validate [seed]".to_string()),
            },
            other => Self::Unknown(other.to_string()),
        };
        Some(cmd)
    }
}

fn parse_seed(arg: Option<&&str>) -> Result<Option<u64>, String> {
    arg.map(|s| {
        s.parse::<u64>()
            .map_err(|_| format!("'{s}' is not a valid noise seed"))
    })
    .transpose()
}

/// Entry point for the interactive REPL.
///
/// Commands are forwarded to the fusion loop behind `handle`, blocking on
/// `rt` for each reply.  `shutdown` is polled each iteration; when set the
/// REPL exits cleanly.
pub fn run(rt: &Runtime, handle: &LoopHandle, cfg: &Config, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) || handle.is_cancelled() {
            break;
        }

        print!("{} ", "wayback>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let Some(cmd) = ReplCommand::parse(&line) else {
            continue;
        };

        match cmd {
            ReplCommand::Mark => cmd_mark(rt, handle),
            ReplCommand::Record => cmd_record(rt, handle),
            ReplCommand::Stop => cmd_stop(rt, handle),
            ReplCommand::Navigate => cmd_navigate(rt, handle),
            ReplCommand::Halt => cmd_halt(rt, handle),
            ReplCommand::Export => cmd_export(rt, handle, cfg),
            ReplCommand::Status => print_snapshot(&handle.snapshot()),
            ReplCommand::Walk { scenario, seed } => cmd_walk(rt, handle, scenario, seed),
            ReplCommand::Validate { seed } => cmd_validate(cfg, seed),
            ReplCommand::Settings => cmd_settings(),
            ReplCommand::Help => cmd_help(),
            ReplCommand::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            ReplCommand::Invalid(msg) => println!("{} {}", "Error:".red(), msg),
            ReplCommand::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "wayback Commands".bold().underline());
    println!("  {}                 – mark the parking spot here", "/mark".bold().cyan());
    println!("  {}               – start recording the walk", "/record".bold().cyan());
    println!("  {}                 – stop recording", "/stop".bold().cyan());
    println!("  {}             – guide back to the spot", "/navigate".bold().cyan());
    println!("  {}                 – stop navigating", "/halt".bold().cyan());
    println!("  {}               – write trajectory and sensor CSVs", "/export".bold().cyan());
    println!("  {}               – show position, heading and guidance", "/status".bold().cyan());
    println!("  {} – replay a synthetic walk", "/walk <scenario> [seed]".bold().cyan());
    println!("  {}      – run the validation scenarios", "/validate [seed]".bold().cyan());
    println!("  {}             – edit ~/.wayback/config.toml", "/settings".bold().cyan());
    println!("  {}          – exit the CLI", "/quit  /exit".bold().cyan());
    let names: Vec<_> = Scenario::ALL.iter().map(Scenario::name).collect();
    println!("  Scenarios: {}", names.join(", ").dimmed());
    println!();
}

fn cmd_mark(rt: &Runtime, handle: &LoopHandle) {
    match rt.block_on(handle.mark_spot()) {
        Ok(spot) => println!(
            "{} {} at ({:.2}, {:.2}), heading {:.1}°",
            "✓".green().bold(),
            spot.label.bold(),
            spot.position.x,
            spot.position.z,
            spot.heading.to_degrees()
        ),
        Err(e) => println!("{}: {}", "Cannot mark spot".red(), e),
    }
}

fn cmd_record(rt: &Runtime, handle: &LoopHandle) {
    match rt.block_on(handle.start_recording()) {
        Ok(()) => println!("{} Recording started.", "●".red().bold()),
        Err(e) => println!("{}: {}", "Cannot start recording".red(), e),
    }
}

fn cmd_stop(rt: &Runtime, handle: &LoopHandle) {
    match rt.block_on(handle.stop_recording()) {
        Ok(()) => println!(
            "{} Recording stopped, {} point(s) kept.",
            "■".bold(),
            handle.snapshot().trajectory.len()
        ),
        Err(e) => println!("{}: {}", "Cannot stop recording".red(), e),
    }
}

fn cmd_navigate(rt: &Runtime, handle: &LoopHandle) {
    match rt.block_on(handle.start_navigation()) {
        Ok(waypoints) => {
            println!(
                "{} Navigating back over {} waypoint(s).",
                "➜".green().bold(),
                waypoints
            );
            print_guidance(&handle.snapshot());
        }
        Err(e) => println!("{}: {}", "Cannot navigate".red(), e),
    }
}

fn cmd_halt(rt: &Runtime, handle: &LoopHandle) {
    match rt.block_on(handle.stop_navigation()) {
        Ok(()) => println!("{} Navigation stopped.", "■".bold()),
        Err(e) => println!("{}: {}", "Cannot stop navigation".red(), e),
    }
}

fn cmd_export(rt: &Runtime, handle: &LoopHandle, cfg: &Config) {
    print!("  Exporting to {} … ", cfg.export_dir.display().to_string().dimmed());
    io::stdout().flush().ok();
    match rt.block_on(handle.export_data(cfg.export_dir.clone())) {
        Ok(paths) => {
            println!("{}", "OK".green());
            println!("    {}", paths.trajectory.display().to_string().bold());
            println!("    {}", paths.sensors.display().to_string().bold());
        }
        Err(e) => println!("{}: {}", "FAILED".red(), e),
    }
}

fn cmd_walk(rt: &Runtime, handle: &LoopHandle, scenario: Scenario, seed: Option<u64>) {
    let mut sim = match seed {
        Some(seed) => PathSimulator::new().with_noise(NoiseModel::default(), seed),
        None => PathSimulator::new(),
    };
    let path = scenario.build(&mut sim);
    println!(
        "  Replaying {} ({} samples, {:.1} m, {:.1} s) …",
        scenario.to_string().bold(),
        path.samples.len(),
        path.total_distance(),
        path.duration_ms() as f64 / 1000.0
    );

    match rt.block_on(handle.replay(path.samples)) {
        Ok(summary) => {
            println!(
                "  {} {} step(s), now at ({:.2}, {:.2})",
                "✓".green().bold(),
                summary.steps,
                summary.position.x,
                summary.position.z
            );
            let snap = handle.snapshot();
            if snap.arrived {
                println!("  {}", "Arrived at the parking spot.".green().bold());
            } else if snap.navigating {
                print_guidance(&snap);
            }
        }
        Err(e) => println!("{}: {}", "Replay failed".red(), e),
    }
}

fn cmd_validate(cfg: &Config, seed: Option<u64>) {
    let validator = PathValidator::new(cfg.fusion.pdr);
    let noise = seed.map(|s| (NoiseModel::default(), s));
    let reports = run_all(&validator, noise);
    let passed = reports.iter().filter(|r| r.passed).count();

    println!();
    for report in &reports {
        let text = report.to_string();
        if report.passed {
            println!("{}", text.green());
        } else {
            println!("{}", text.red());
        }
    }
    let summary = format!("{passed}/{} scenarios passed", reports.len());
    if passed == reports.len() {
        println!("\n  {}", summary.green().bold());
    } else {
        println!("\n  {}", summary.red().bold());
    }
    println!();
}

fn cmd_settings() {
    let mut cfg = match config::load() {
        Ok(Some(c)) => c,
        Ok(None) => Config::default(),
        Err(e) => {
            println!("{}: {}", "Error loading config".red(), e);
            return;
        }
    };

    println!("{}", "Settings Editor".bold().underline());
    println!("  (press Enter to keep the current value)");

    let dir = prompt_str(
        &format!("  Export directory [{}]: ", cfg.export_dir.display()),
        &cfg.export_dir.display().to_string(),
    );
    cfg.export_dir = dir.into();

    let fusion = &mut cfg.fusion;
    fusion.tick_ms = prompt_parse("  Tick period (ms)", fusion.tick_ms, |v| *v > 0);
    fusion.pdr.heading.alpha =
        prompt_parse("  Gyro weight α", fusion.pdr.heading.alpha, |v| (0.0..=1.0).contains(v));
    fusion.pdr.step.peak_threshold =
        prompt_parse("  Step threshold (m/s²)", fusion.pdr.step.peak_threshold, |v| *v > 0.0);
    fusion.navigator.waypoint_radius =
        prompt_parse("  Waypoint radius (m)", fusion.navigator.waypoint_radius, |v| *v > 0.0);
    fusion.navigator.arrival_radius =
        prompt_parse("  Arrival radius (m)", fusion.navigator.arrival_radius, |v| *v > 0.0);

    match config::save(&cfg) {
        Ok(()) => {
            println!(
                "{} {}",
                "✓ Settings saved to".green(),
                config::config_path().display().to_string().bold()
            );
            println!("  {}", "Fusion settings apply from the next start.".dimmed());
        }
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_snapshot(snap: &NavSnapshot) {
    println!("{}", "Status".bold().underline());
    println!(
        "  Position   : ({:.2}, {:.2}, {:.2})",
        snap.position.x, snap.position.y, snap.position.z
    );
    println!("  Heading    : {:.1}°", snap.heading.to_degrees());
    println!("  Steps      : {}", snap.step_count);
    let source = snap.source.map_or("-".to_string(), |s| s.to_string());
    println!("  Tracking   : {:?} (source {})", snap.tracking, source);
    match &snap.spot {
        Some(spot) => println!(
            "  Spot       : {} at ({:.2}, {:.2})",
            spot.label, spot.position.x, spot.position.z
        ),
        None => println!("  Spot       : {}", "not marked".dimmed()),
    }
    let recording = if snap.recording { "on".red().bold() } else { "off".dimmed() };
    println!("  Recording  : {} ({} point(s))", recording, snap.trajectory.len());
    if snap.navigating {
        print_guidance(snap);
    } else if snap.arrived {
        println!("  Navigation : {}", "arrived".green().bold());
    } else {
        println!("  Navigation : {}", "idle".dimmed());
    }
}

fn print_guidance(snap: &NavSnapshot) {
    if let (Some(index), Some(distance), Some(bearing)) =
        (snap.target_index, snap.remaining_distance, snap.bearing)
    {
        println!(
            "  Navigation : waypoint {}/{}, {:.1} m to go, bearing {:.0}°",
            index + 1,
            snap.navigation_path.len(),
            distance,
            bearing.to_degrees().rem_euclid(360.0)
        );
    } else {
        println!("  Navigation : {}", "waiting for the next tick".dimmed());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Prompt for a value of type `T`.  Keeps `current` on empty input, on a
/// parse failure or when `valid` rejects the value.
fn prompt_parse<T>(label: &str, current: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let raw = prompt_str(&format!("{label} [{current}]: "), &current.to_string());
    match raw.parse::<T>() {
        Ok(v) if valid(&v) => v,
        _ => {
            println!(
                "  {} '{}' is not a valid value, keeping {}",
                "Warning:".yellow(),
                raw,
                current
            );
            current
        }
    }
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed
            }
        }
        Err(_) => default.to_string(),
    }
}
