//! Application entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`).
//! 2. Load [`Config`] from disk (defaults on first run) or `--config PATH`.
//! 3. `--check-config`: print a summary plus any validation issues and exit.
//! 4. Build the [`App`] (hotkey listener, capture worker, pipeline).
//! 5. Run the edge loop until Ctrl-C, then drain in-flight sessions.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use voxkey::app::{self, App};
use voxkey::config::Config;

/// How long shutdown waits for in-flight sessions to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Hotkey-driven voice dictation: hold a key, speak, get polished text.
#[derive(Debug, Parser)]
#[command(name = "voxkey", version, about)]
struct Cli {
    /// Path to the config file (default: the platform config directory).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit without starting the listener.
    #[arg(long)]
    check_config: bool,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: could not load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if cli.check_config {
        return check_config(&config);
    }

    let issues = config.validate();
    for issue in &issues {
        log::warn!("config: {issue}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: could not create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        let app = match App::build(config) {
            Ok(app) => app,
            Err(e) => {
                eprintln!("error: {e:#}");
                return ExitCode::FAILURE;
            }
        };
        let runner = app.pipeline();

        tokio::select! {
            _ = app.run() => {
                log::info!("edge loop ended");
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupt received, shutting down");
            }
        }

        app::drain_in_flight(&runner, SHUTDOWN_GRACE).await;
        ExitCode::SUCCESS
    })
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env();
            Ok(config)
        }
        None => Config::load(),
    }
}

/// Print a human-readable config summary and any validation issues.
///
/// Exit code is `1` when issues were found, so scripts can gate on it.
fn check_config(config: &Config) -> ExitCode {
    println!("mode:            {}", config.mode.as_str());
    println!("activation:      {:?}", config.hotkeys.activation_mode);
    println!("main key:        {}", config.hotkeys.main_key);
    println!("context mod:     {}", display_or_disabled(&config.hotkeys.context_modifier));
    println!("cycle key:       {}", display_or_disabled(&config.hotkeys.cycle_mode_key));
    println!("transcription:   {} @ {}", config.transcription.model, config.transcription.base_url);
    println!("processing:      {} @ {}", config.processing.model, config.processing.base_url);
    println!("output:          {:?}", config.output.behavior);
    println!(
        "history:         {}",
        if config.history.enabled {
            format!("enabled ({} entries max)", config.history.max_entries)
        } else {
            "disabled".into()
        }
    );
    println!(
        "audio device:    {}",
        config.audio.device.as_deref().unwrap_or("system default")
    );
    println!(
        "vocabulary:      {} term(s)",
        config.vocabulary.len()
    );

    let issues = config.validate();
    if issues.is_empty() {
        println!("\nconfiguration OK");
        ExitCode::SUCCESS
    } else {
        println!("\n{} issue(s) found:", issues.len());
        for issue in &issues {
            println!("  - {issue}");
        }
        ExitCode::FAILURE
    }
}

fn display_or_disabled(value: &str) -> &str {
    if value.trim().is_empty() {
        "(disabled)"
    } else {
        value
    }
}
