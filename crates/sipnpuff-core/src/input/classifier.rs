use embassy_time::Duration;
use log::{debug, trace};

use super::event::{EventListener, SipPuffEvent};
use super::reference_filter::AmbientReferenceFilter;
use super::state_machine::{ClassifierConfig, GestureState, GestureStateMachine};
use crate::config::InputConfig;
use crate::sensors::{PressureSource, SensorError};
use crate::time::Clock;

/// Turns absolute pressure readings into [`SipPuffEvent`]s.
///
/// Each [`update`](Self::update) pulls one reading from the source, folds it
/// into the ambient estimate and advances the gesture state machine with the
/// difference between the two. Call it from a poll loop, roughly every 10 ms.
///
/// ```rust,ignore
/// let mut classifier = GestureClassifier::new(sensor, clock, &InputConfig::default());
/// loop {
///     if let Err(e) = classifier.update(&mut listener) {
///         warn!("Skipping cycle: {}", e);
///     }
///     delay.delay_ms(10);
/// }
/// ```
pub struct GestureClassifier<S, C> {
    source: S,
    clock: C,
    filter: AmbientReferenceFilter,
    machine: GestureStateMachine,
    last_differential: Option<f64>,
}

impl<S: PressureSource, C: Clock> GestureClassifier<S, C> {
    pub fn new(source: S, clock: C, config: &InputConfig) -> Self {
        Self {
            source,
            clock,
            filter: AmbientReferenceFilter::new(config.filter),
            machine: GestureStateMachine::new(config.classifier),
            last_differential: None,
        }
    }

    /// Run one sampling cycle.
    ///
    /// Returns the recognised event, if any, after handing it to `listener`.
    /// A failed read leaves the filter and state machine untouched.
    pub fn update<L: EventListener + ?Sized>(
        &mut self,
        listener: &mut L,
    ) -> Result<Option<SipPuffEvent>, SensorError> {
        let reading = self.source.read_pressure_pascal()?;
        self.filter.update(reading);

        let reference = self.filter.estimate();
        let pdiff = reading - reference;
        self.last_differential = Some(pdiff);
        trace!(
            "Sensor {:.2} Pa, reference {:.2} Pa, differential {:.2} Pa",
            reading, reference, pdiff
        );

        let event = self.machine.step(pdiff, self.clock.now());
        if let Some(event) = event {
            debug!("Notifying listener of {}", event);
            listener.on_gesture(event);
        }
        Ok(event)
    }

    pub fn state(&self) -> GestureState {
        self.machine.state()
    }

    /// How long the current action has lasted, `None` while idle.
    pub fn current_duration(&self) -> Option<Duration> {
        self.machine.current_duration(self.clock.now())
    }

    pub fn ambient_estimate(&self) -> f64 {
        self.filter.estimate()
    }

    /// Differential pressure fed to the state machine on the last good cycle.
    pub fn last_differential(&self) -> Option<f64> {
        self.last_differential
    }

    pub fn config(&self) -> &ClassifierConfig {
        self.machine.config()
    }

    /// Retune the gesture thresholds at runtime.
    pub fn set_config(&mut self, config: ClassifierConfig) {
        self.machine.set_config(config);
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Tear down, returning the source and clock.
    pub fn into_parts(self) -> (S, C) {
        (self.source, self.clock)
    }
}
