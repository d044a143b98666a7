//! `wayback-cli` – wayback Command Line Interface
//!
//! This binary is the interactive front end of the parking-return stack.  It:
//!
//! 1. Installs the `tracing` subscriber (`RUST_LOG`, `WAYBACK_LOG_FORMAT`,
//!    optional OTLP export).
//! 2. Checks for `~/.wayback/config.toml`; runs a **First-Run Wizard** when
//!    the file is absent.
//! 3. Spawns the fusion loop on a Tokio runtime.
//! 4. Drops the user into an **interactive REPL** exposing the command
//!    surface (`/mark`, `/record`, `/navigate`, …) plus scenario replay and
//!    validation.
//! 5. Intercepts **Ctrl-C** to cancel the fusion loop and exit safely.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use wayback_runtime::{FusionLoop, init_tracing};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() {
    let _telemetry = init_tracing("wayback");

    print_banner();

    // ── First-Run Wizard ──────────────────────────────────────────────────
    match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(_)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
        }
        Err(_) => {}
    }

    let (cfg, load_error) = config::load_or_default();
    if let Some(e) = load_error {
        println!("{}: {}", "Config error".red(), e);
        println!("  Using default configuration.");
    }

    // ── Fusion loop ───────────────────────────────────────────────────────
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start the async runtime".red(), e);
            std::process::exit(1);
        }
    };

    let (handle, task) = {
        let _enter = rt.enter();
        FusionLoop::spawn(cfg.fusion)
    };
    println!(
        "  Fusion loop running every {} ms, exports go to {}",
        cfg.fusion.tick_ms.to_string().yellow(),
        cfg.export_dir.display().to_string().dimmed()
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let ctrlc_handle = handle.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – initiating graceful shutdown …".yellow().bold());
        ctrlc_handle.cancel();
        println!("{}", "  ✓ Fusion loop cancelled. Press Enter to exit.".green());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    println!();
    println!(
        "  Type {} for a list of commands.\n",
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&rt, &handle, &cfg, shutdown);

    handle.cancel();
    match rt.block_on(async { tokio::time::timeout(SHUTDOWN_GRACE, task).await }) {
        Ok(Ok(core)) => info!(
            steps = core.step_count(),
            recorded = core.trajectory().len(),
            "fusion loop stopped"
        ),
        Ok(Err(e)) => warn!(error = %e, "fusion loop task failed"),
        Err(_) => warn!("fusion loop did not stop in time"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       wayback First-Run Wizard       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up wayback.\n");

    let mut cfg = config::Config::default();

    let dir = prompt_line(
        &format!("  Export directory [{}]: ", cfg.export_dir.display()),
        &cfg.export_dir.display().to_string(),
    );
    cfg.export_dir = dir.into();

    let tick = prompt_line(
        &format!("  Fusion tick period in ms [{}]: ", cfg.fusion.tick_ms),
        &cfg.fusion.tick_ms.to_string(),
    );
    if let Ok(ms) = tick.trim().parse::<u64>()
        && ms > 0
    {
        cfg.fusion.tick_ms = ms;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#" _      __          __              __  "#.bold().cyan());
    println!("{}", r#"| | /| / /__ ___ __/ /  ___ _____  / /__"#.bold().cyan());
    println!("{}", r#"| |/ |/ / _ `/ // / _ \/ _ `/ __/ /  '_/"#.bold().cyan());
    println!("{}", r#"|__/|__/\_,_/\_, /_.__/\_,_/\__/ /_/\_\ "#.bold().cyan());
    println!("{}", r#"            /___/                        "#.bold().cyan());
    println!();
    println!("  {} {}",
        "wayback".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Find your way back to the car");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
