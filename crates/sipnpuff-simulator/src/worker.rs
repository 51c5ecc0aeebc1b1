//! Sampling thread: owns the sensor and classifier and pushes recognised
//! gestures into [`GESTURE_CHANNEL`].

use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, anyhow};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Instant;
use log::{error, info, warn};
use sipnpuff_core::InputConfig;
use sipnpuff_core::input::{ChannelListener, GestureClassifier, SipPuffEvent};
use sipnpuff_core::pressure_bar::PressureBar;
use sipnpuff_core::sensors::{Bmp280, SensorError};
use sipnpuff_core::time::{Clock, ManualClock};

use crate::emulated_chip::EmulatedChip;

pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Gestures from the sampling thread to the main thread.
pub static GESTURE_CHANNEL: Channel<
    CriticalSectionRawMutex,
    SipPuffEvent,
    EVENT_CHANNEL_CAPACITY,
> = Channel::new();

/// Wall-clock time mapped onto embassy instants.
struct StdClock {
    origin: std::time::Instant,
}

impl StdClock {
    fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.origin.elapsed().as_micros() as u64)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub cadence: Duration,
    pub cycles: u64,
    /// Sleep between cycles and use the wall clock. Otherwise time is
    /// simulated and the script replays as fast as possible.
    pub realtime: bool,
    pub show_pressure: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerStats {
    pub cycles: u64,
    pub failed_reads: u64,
    pub events: u64,
    pub dropped_events: u32,
}

pub fn spawn(
    chip: EmulatedChip,
    config: InputConfig,
    options: WorkerOptions,
) -> anyhow::Result<JoinHandle<anyhow::Result<WorkerStats>>> {
    thread::Builder::new()
        .name("sampling".into())
        .spawn(move || run(chip, config, options))
        .context("Failed to start sampling thread")
}

fn run(
    chip: EmulatedChip,
    config: InputConfig,
    options: WorkerOptions,
) -> anyhow::Result<WorkerStats> {
    // Identity or configuration failures are fatal; nothing to sample.
    let sensor = Bmp280::init(chip, &config.sensor)
        .map_err(|e| anyhow!("Sensor bring-up failed: {e}"))?;
    info!(
        "Sampling every {} ms for {} cycles ({})",
        options.cadence.as_millis(),
        options.cycles,
        if options.realtime { "realtime" } else { "replay" }
    );

    if options.realtime {
        let classifier = GestureClassifier::new(sensor, StdClock::new(), &config);
        Ok(poll(classifier, &options, || thread::sleep(options.cadence)))
    } else {
        let clock = ManualClock::default();
        let step = embassy_time::Duration::from_micros(options.cadence.as_micros() as u64);
        let classifier = GestureClassifier::new(sensor, &clock, &config);
        // Replay outruns the consumer; hold off while the channel is full so
        // scripted gestures are not dropped.
        Ok(poll(classifier, &options, || {
            clock.advance(step);
            while GESTURE_CHANNEL.is_full() {
                thread::sleep(Duration::from_millis(1));
            }
        }))
    }
}

fn poll<C: Clock>(
    mut classifier: GestureClassifier<Bmp280<EmulatedChip>, C>,
    options: &WorkerOptions,
    mut wait: impl FnMut(),
) -> WorkerStats {
    let mut listener = ChannelListener::new(GESTURE_CHANNEL.sender());
    let bar = PressureBar::default();
    let mut stats = WorkerStats::default();

    for _ in 0..options.cycles {
        stats.cycles += 1;
        match classifier.update(&mut listener) {
            Ok(Some(_)) => stats.events += 1,
            Ok(None) => {}
            Err(e @ SensorError::Transport { .. }) => {
                stats.failed_reads += 1;
                warn!("Skipping cycle {}: {}", stats.cycles, e);
            }
            Err(e) => {
                error!("Sensor error, stopping: {}", e);
                break;
            }
        }

        if options.show_pressure {
            if let Some(pdiff) = classifier.last_differential() {
                match bar.render(pdiff) {
                    Ok(line) => println!("{}", line),
                    Err(_) => warn!("Pressure bar overflowed its line buffer"),
                }
            }
        }

        wait();
    }

    stats.dropped_events = listener.dropped();
    info!(
        "Sampling finished after {} cycles; ambient estimate {:.2} Pa",
        stats.cycles,
        classifier.ambient_estimate()
    );
    stats
}
