//! Desktop simulator for the sipnpuff breath-switch input.
//!
//! Runs the real BMP280 driver, ambient filter and gesture classifier
//! against an emulated chip fed by a scripted breath trace, and routes the
//! recognised gestures the way the device does: puffs start playback, sips
//! stop it.
//!
//! ```text
//! RUST_LOG=info sipnpuff-simulator --realtime --show-pressure
//! RUST_LOG=debug sipnpuff-simulator --config tuning.json --glitch-every 50
//! ```

mod breath;
mod emulated_chip;
mod worker;

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use log::{info, warn};

use sipnpuff_core::InputConfig;
use sipnpuff_core::input::SipPuffEvent;

use breath::BreathScript;
use emulated_chip::EmulatedChip;
use worker::{GESTURE_CHANNEL, WorkerOptions};

/// How often the main thread drains the gesture channel.
const DRAIN_INTERVAL: Duration = Duration::from_millis(2);

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "sipnpuff-simulator")]
#[command(version)]
#[command(about = "Replay scripted sips and puffs through the gesture pipeline", long_about = None)]
struct Cli {
    /// JSON file with sensor, filter and classifier settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Sampling period in milliseconds
    #[arg(long, default_value_t = 10)]
    cadence_ms: u64,

    /// How many times to run through the gesture script
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Pace sampling with the wall clock instead of replaying instantly
    #[arg(long)]
    realtime: bool,

    /// Draw the differential pressure as a bar on every cycle
    #[arg(long)]
    show_pressure: bool,

    /// Fail every n-th pressure read on the emulated bus
    #[arg(long)]
    glitch_every: Option<u64>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<InputConfig> {
    let Some(path) = path else {
        return Ok(InputConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: InputConfig = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .map_err(|e| anyhow!("Invalid config file {}: {e}", path.display()))?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Event routing
// ---------------------------------------------------------------------------

/// Player action bound to a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerAction {
    Play,
    Stop,
}

fn route(event: SipPuffEvent) -> PlayerAction {
    if event.is_puff() {
        PlayerAction::Play
    } else {
        PlayerAction::Stop
    }
}

fn dispatch(event: SipPuffEvent, recognised: &mut Vec<SipPuffEvent>) {
    let action = route(event);
    info!("{} -> {:?}", event, action);
    recognised.push(event);
}

fn drain(recognised: &mut Vec<SipPuffEvent>) {
    while let Ok(event) = GESTURE_CHANNEL.try_receive() {
        dispatch(event, recognised);
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    if cli.cadence_ms == 0 {
        return Err(anyhow!("--cadence-ms must be at least 1"));
    }

    info!("Starting sipnpuff simulator");
    info!(
        "Thresholds: short {} ms, long {} ms, weak {} Pa, strong {} Pa",
        config.classifier.short_min_time_ms,
        config.classifier.long_min_time_ms,
        config.classifier.weak_thresh_pa,
        config.classifier.strong_thresh_pa
    );

    let cadence = Duration::from_millis(cli.cadence_ms);
    let script = BreathScript::demo(cli.repeat);
    let expected = script.expected_events();
    let cycles = script.total_duration().as_millis() as u64 / cli.cadence_ms;

    let chip = EmulatedChip::new(script, cadence, cli.glitch_every)
        .map_err(|e| anyhow!("Emulated chip setup failed: {e}"))?;
    let options = WorkerOptions {
        cadence,
        cycles,
        realtime: cli.realtime,
        show_pressure: cli.show_pressure,
    };
    let handle = worker::spawn(chip, config, options)?;

    let mut recognised = Vec::with_capacity(expected.len());
    while !handle.is_finished() {
        drain(&mut recognised);
        thread::sleep(DRAIN_INTERVAL);
    }
    let stats = handle
        .join()
        .map_err(|_| anyhow!("Sampling thread panicked"))??;
    drain(&mut recognised);

    info!(
        "{} cycles, {} failed reads, {} gestures ({} dropped)",
        stats.cycles, stats.failed_reads, stats.events, stats.dropped_events
    );
    if recognised == expected {
        info!("All {} scripted gestures recognised", expected.len());
    } else {
        warn!("Recognised {:?}, script contained {:?}", recognised, expected);
    }
    Ok(())
}
