//! Gesture recognition over a stream of pressure differentials.
//!
//! ```text
//!            |pdiff| >= weak                  elapsed > long_min
//!   Idle ─────────────────────▶ Measuring ──────────────────────▶ FinishedWaiting
//!    ▲                              │  (emit LONG event)                 │
//!    │   |pdiff| < weak - hyst      │                                    │
//!    ├──────────────────────────────┘  (emit SHORT event if             │
//!    │                                  elapsed >= short_min)            │
//!    │                 |pdiff| < weak - hyst                             │
//!    └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `FinishedWaiting` is dead time after a long gesture: the user is usually
//! still sipping or puffing when the long event fires, and the trailing edge
//! must not start a second action.

use embassy_time::{Duration, Instant};
use log::debug;
use serde::{Deserialize, Serialize};

use super::event::{ActionLength, Direction, SipPuffEvent, Strength};
use crate::config::ConfigError;

/// Timing and pressure thresholds of the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Releases shorter than this are treated as noise.
    pub short_min_time_ms: u64,
    /// Actions held longer than this fire a long event without waiting for release.
    pub long_min_time_ms: u64,
    /// Minimum |differential| (Pa) that starts an action and counts as weak.
    pub weak_thresh_pa: f64,
    /// An action ends once |differential| drops below `weak_thresh_pa - weak_hysteresis_pa`.
    pub weak_hysteresis_pa: f64,
    /// Minimum average |differential| (Pa) of a strong action.
    pub strong_thresh_pa: f64,
    pub strong_hysteresis_pa: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            short_min_time_ms: 200,
            long_min_time_ms: 1_000,
            weak_thresh_pa: 400.0,
            weak_hysteresis_pa: 10.0,
            strong_thresh_pa: 700.0,
            strong_hysteresis_pa: 30.0,
        }
    }
}

impl ClassifierConfig {
    pub const fn short_min_time(&self) -> Duration {
        Duration::from_millis(self.short_min_time_ms)
    }

    pub const fn long_min_time(&self) -> Duration {
        Duration::from_millis(self.long_min_time_ms)
    }

    /// Reject settings the state machine cannot work with. A release
    /// threshold at or below zero would leave held actions stuck in
    /// `FinishedWaiting`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Negated comparisons so that NaN fails too.
        if !(self.weak_thresh_pa > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "weak_thresh_pa",
            });
        }
        if !(self.weak_hysteresis_pa >= 0.0 && self.weak_hysteresis_pa < self.weak_thresh_pa) {
            return Err(ConfigError::HysteresisOutOfRange);
        }
        if !(self.strong_thresh_pa >= self.weak_thresh_pa) {
            return Err(ConfigError::StrongBelowWeak);
        }
        if self.short_min_time_ms > self.long_min_time_ms {
            return Err(ConfigError::ShortExceedsLong);
        }
        Ok(())
    }

    /// |differential| below which an action is considered released.
    pub fn release_thresh_pa(&self) -> f64 {
        self.weak_thresh_pa - self.weak_hysteresis_pa
    }

    /// Strength and direction for an average differential.
    ///
    /// Strong is tested before weak and sip before puff; the first match
    /// wins. Averages inside the weak band yield `None`.
    pub fn classify(&self, average_pa: f64) -> Option<(Strength, Direction)> {
        if average_pa <= -self.strong_thresh_pa {
            Some((Strength::Strong, Direction::Sip))
        } else if average_pa >= self.strong_thresh_pa {
            Some((Strength::Strong, Direction::Puff))
        } else if average_pa <= -self.weak_thresh_pa {
            Some((Strength::Weak, Direction::Sip))
        } else if average_pa >= self.weak_thresh_pa {
            Some((Strength::Weak, Direction::Puff))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Measuring,
    FinishedWaiting,
}

/// Running sum of the differentials seen during one action.
#[derive(Debug, Clone, Copy, Default)]
struct ActionHistory {
    sum: f64,
    count: u32,
}

impl ActionHistory {
    fn push(&mut self, pdiff: f64) {
        self.sum += pdiff;
        self.count += 1;
    }

    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct GestureStateMachine {
    config: ClassifierConfig,
    state: GestureState,
    action_start: Option<Instant>,
    history: ActionHistory,
}

impl GestureStateMachine {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
            action_start: None,
            history: ActionHistory::default(),
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Replace the thresholds. Takes effect on the next step; an action in
    /// progress is finished under the new values.
    pub fn set_config(&mut self, config: ClassifierConfig) {
        self.config = config;
    }

    /// Time since the current action started, `None` while idle.
    pub fn current_duration(&self, now: Instant) -> Option<Duration> {
        self.action_start
            .map(|start| now.saturating_duration_since(start))
    }

    /// Average differential of the current action so far.
    pub fn action_average(&self) -> Option<f64> {
        (self.history.count > 0).then(|| self.history.average())
    }

    /// Advance the machine with one differential sample taken at `now`.
    pub fn step(&mut self, pdiff: f64, now: Instant) -> Option<SipPuffEvent> {
        match self.state {
            GestureState::Idle => {
                self.step_idle(pdiff, now);
                None
            }
            GestureState::Measuring => self.step_measuring(pdiff, now),
            GestureState::FinishedWaiting => {
                self.step_finished_waiting(pdiff);
                None
            }
        }
    }

    fn step_idle(&mut self, pdiff: f64, now: Instant) {
        self.reset();

        if libm::fabs(pdiff) < self.config.weak_thresh_pa {
            return;
        }

        debug!("Action started at {:.1} Pa", pdiff);
        self.action_start = Some(now);
        self.history.push(pdiff);
        self.state = GestureState::Measuring;
    }

    fn step_measuring(&mut self, pdiff: f64, now: Instant) -> Option<SipPuffEvent> {
        let elapsed = self.current_duration(now).unwrap_or(Duration::from_ticks(0));

        if elapsed > self.config.long_min_time() {
            self.state = GestureState::FinishedWaiting;
            debug!("Long action, waiting for release");
            return self.finish(ActionLength::Long);
        }

        if libm::fabs(pdiff) < self.config.release_thresh_pa() {
            // The releasing sample is not part of the action.
            let event = if elapsed >= self.config.short_min_time() {
                self.finish(ActionLength::Short)
            } else {
                debug!("Released after {} ms, ignoring", elapsed.as_millis());
                None
            };
            self.enter_idle();
            return event;
        }

        self.history.push(pdiff);
        None
    }

    fn step_finished_waiting(&mut self, pdiff: f64) {
        if libm::fabs(pdiff) < self.config.release_thresh_pa() {
            self.enter_idle();
        }
    }

    fn finish(&self, length: ActionLength) -> Option<SipPuffEvent> {
        let average = self.history.average();
        let event = self
            .config
            .classify(average)
            .map(|(strength, direction)| SipPuffEvent::new(length, strength, direction));

        match event {
            Some(event) => debug!("Recognised {} (average {:.1} Pa)", event, average),
            None => debug!("Action average {:.1} Pa matched no gesture", average),
        }
        event
    }

    fn enter_idle(&mut self) {
        debug!("Back to idle");
        self.state = GestureState::Idle;
        self.reset();
    }

    fn reset(&mut self) {
        self.action_start = None;
        self.history = ActionHistory::default();
    }
}

impl Default for GestureStateMachine {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    const CADENCE_MS: u64 = 10;

    /// Feeds constant differentials at a 10 ms cadence and collects events.
    struct Driver {
        machine: GestureStateMachine,
        now_ms: u64,
        events: Vec<SipPuffEvent>,
    }

    impl Driver {
        fn new() -> Self {
            Self {
                machine: GestureStateMachine::default(),
                now_ms: 0,
                events: Vec::new(),
            }
        }

        /// Feed `pdiff` for `duration_ms`, one sample per cycle.
        fn hold(&mut self, pdiff: f64, duration_ms: u64) {
            for _ in 0..duration_ms / CADENCE_MS {
                self.sample(pdiff);
            }
        }

        fn sample(&mut self, pdiff: f64) {
            let now = Instant::from_millis(self.now_ms);
            if let Some(event) = self.machine.step(pdiff, now) {
                self.events.push(event);
            }
            self.now_ms += CADENCE_MS;
        }
    }

    #[test]
    fn test_validate_rejects_unusable_thresholds() {
        let defaults = ClassifierConfig::default();
        assert_eq!(defaults.validate(), Ok(()));

        // Release threshold of exactly zero: |pdiff| < 0 never holds.
        let stuck = ClassifierConfig {
            weak_hysteresis_pa: defaults.weak_thresh_pa,
            ..defaults
        };
        assert!(stuck.release_thresh_pa() <= 0.0);
        assert_eq!(stuck.validate(), Err(ConfigError::HysteresisOutOfRange));

        let negative = ClassifierConfig {
            weak_hysteresis_pa: -5.0,
            ..defaults
        };
        assert_eq!(negative.validate(), Err(ConfigError::HysteresisOutOfRange));

        let no_weak = ClassifierConfig {
            weak_thresh_pa: 0.0,
            ..defaults
        };
        assert_eq!(
            no_weak.validate(),
            Err(ConfigError::NotPositive {
                field: "weak_thresh_pa"
            })
        );

        let inverted = ClassifierConfig {
            strong_thresh_pa: 300.0,
            ..defaults
        };
        assert_eq!(inverted.validate(), Err(ConfigError::StrongBelowWeak));

        let timing = ClassifierConfig {
            short_min_time_ms: 2_000,
            ..defaults
        };
        assert_eq!(timing.validate(), Err(ConfigError::ShortExceedsLong));
    }

    #[test]
    fn test_zero_differential_stays_idle() {
        let mut driver = Driver::new();
        driver.hold(0.0, 10_000);
        assert!(driver.events.is_empty());
        assert_eq!(driver.machine.state(), GestureState::Idle);
        assert_eq!(driver.machine.current_duration(Instant::from_millis(0)), None);
    }

    #[test]
    fn test_short_weak_puff() {
        let mut driver = Driver::new();
        driver.hold(500.0, 300);
        driver.sample(0.0);
        assert_eq!(driver.events, [SipPuffEvent::ShortWeakPuff]);
        assert_eq!(driver.machine.state(), GestureState::Idle);
    }

    #[test]
    fn test_long_strong_sip_then_dead_time() {
        let mut driver = Driver::new();
        driver.hold(-800.0, 1_200);
        assert_eq!(driver.events, [SipPuffEvent::LongStrongSip]);
        assert_eq!(driver.machine.state(), GestureState::FinishedWaiting);

        // Trailing edge above the release threshold: still waiting, no event.
        driver.hold(-800.0, 500);
        driver.hold(-395.0, 200);
        assert_eq!(driver.events.len(), 1);
        assert_eq!(driver.machine.state(), GestureState::FinishedWaiting);

        driver.sample(-389.0);
        assert_eq!(driver.machine.state(), GestureState::Idle);
        assert_eq!(driver.events.len(), 1);
    }

    #[test]
    fn test_too_short_release_is_noise() {
        let mut driver = Driver::new();
        driver.hold(450.0, 100);
        driver.sample(0.0);
        assert!(driver.events.is_empty());
        assert_eq!(driver.machine.state(), GestureState::Idle);
    }

    #[test]
    fn test_each_short_and_long_variant() {
        let cases = [
            (-500.0, 300, SipPuffEvent::ShortWeakSip),
            (-900.0, 300, SipPuffEvent::ShortStrongSip),
            (500.0, 300, SipPuffEvent::ShortWeakPuff),
            (900.0, 300, SipPuffEvent::ShortStrongPuff),
            (-500.0, 1_100, SipPuffEvent::LongWeakSip),
            (-900.0, 1_100, SipPuffEvent::LongStrongSip),
            (500.0, 1_100, SipPuffEvent::LongWeakPuff),
            (900.0, 1_100, SipPuffEvent::LongStrongPuff),
        ];

        for (pdiff, duration_ms, expected) in cases {
            let mut driver = Driver::new();
            driver.hold(pdiff, duration_ms);
            driver.sample(0.0);
            assert_eq!(driver.events, [expected], "pdiff {pdiff} for {duration_ms} ms");
        }
    }

    #[test]
    fn test_strong_checked_before_weak() {
        let config = ClassifierConfig::default();
        for average in [700.0, 700.001, 750.0, 5_000.0, 1.0e9] {
            assert_eq!(
                config.classify(average),
                Some((Strength::Strong, Direction::Puff))
            );
            assert_eq!(
                config.classify(-average),
                Some((Strength::Strong, Direction::Sip))
            );
        }
        assert_eq!(config.classify(699.9), Some((Strength::Weak, Direction::Puff)));
        assert_eq!(config.classify(0.0), None);
        assert_eq!(config.classify(-399.0), None);
    }

    #[test]
    fn test_classification_uses_average_not_peak() {
        let mut driver = Driver::new();
        // Peak is strong, but most of the action is weak.
        driver.hold(1_000.0, 50);
        driver.hold(450.0, 250);
        driver.sample(0.0);
        assert_eq!(driver.events, [SipPuffEvent::ShortWeakPuff]);
    }

    #[test]
    fn test_hysteresis_keeps_action_alive() {
        let mut driver = Driver::new();
        driver.hold(420.0, 100);
        // Between release threshold (390) and weak threshold: still measuring.
        driver.hold(395.0, 200);
        assert_eq!(driver.machine.state(), GestureState::Measuring);
        driver.sample(100.0);
        assert_eq!(driver.machine.state(), GestureState::Idle);
    }

    #[test]
    fn test_unmatched_average_emits_nothing() {
        // Alternating sips and puffs never release, but average out to zero.
        let mut driver = Driver::new();
        for i in 0..30 {
            driver.sample(if i % 2 == 0 { 410.0 } else { -410.0 });
        }
        assert_eq!(driver.machine.state(), GestureState::Measuring);
        driver.sample(0.0);
        assert!(driver.events.is_empty());
        assert_eq!(driver.machine.state(), GestureState::Idle);
    }

    #[test]
    fn test_current_duration_tracks_action() {
        let mut machine = GestureStateMachine::default();
        machine.step(600.0, Instant::from_millis(1_000));
        assert_eq!(
            machine.current_duration(Instant::from_millis(1_250)),
            Some(Duration::from_millis(250))
        );
        assert_eq!(machine.action_average(), Some(600.0));
    }
}
