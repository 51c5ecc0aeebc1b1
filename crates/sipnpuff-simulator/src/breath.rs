//! Synthetic breath traces: drifting ambient pressure with scripted
//! sips and puffs on top.

use std::time::Duration;

use sipnpuff_core::input::SipPuffEvent;

/// Time taken to reach full pressure at the start and end of a gesture.
const RAMP: Duration = Duration::from_millis(60);

/// One stretch of the script: hold `offset_pa` above ambient for `duration`.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub offset_pa: f64,
    pub duration: Duration,
    /// Gesture this segment should be recognised as.
    pub expected: Option<SipPuffEvent>,
}

impl Segment {
    pub const fn rest(duration: Duration) -> Self {
        Self {
            offset_pa: 0.0,
            duration,
            expected: None,
        }
    }

    pub const fn gesture(offset_pa: f64, duration: Duration, expected: SipPuffEvent) -> Self {
        Self {
            offset_pa,
            duration,
            expected: Some(expected),
        }
    }
}

/// Pressure trace sampled at a fixed cadence.
pub struct BreathScript {
    segments: Vec<Segment>,
    ambient_pa: f64,
    elapsed: Duration,
}

impl BreathScript {
    pub fn new(segments: Vec<Segment>, ambient_pa: f64) -> Self {
        Self {
            segments,
            ambient_pa,
            elapsed: Duration::ZERO,
        }
    }

    /// Every gesture once, short ones first, separated by pauses.
    pub fn demo(repeat: u32) -> Self {
        const SHORT: Duration = Duration::from_millis(450);
        const LONG: Duration = Duration::from_millis(1_600);
        const PAUSE: Duration = Duration::from_millis(1_500);

        let gestures = [
            Segment::gesture(550.0, SHORT, SipPuffEvent::ShortWeakPuff),
            Segment::gesture(950.0, SHORT, SipPuffEvent::ShortStrongPuff),
            Segment::gesture(-550.0, SHORT, SipPuffEvent::ShortWeakSip),
            Segment::gesture(-950.0, SHORT, SipPuffEvent::ShortStrongSip),
            Segment::gesture(550.0, LONG, SipPuffEvent::LongWeakPuff),
            Segment::gesture(950.0, LONG, SipPuffEvent::LongStrongPuff),
            Segment::gesture(-550.0, LONG, SipPuffEvent::LongWeakSip),
            Segment::gesture(-950.0, LONG, SipPuffEvent::LongStrongSip),
        ];

        // Let the ambient filter settle first.
        let mut segments = vec![Segment::rest(Duration::from_secs(3))];
        for _ in 0..repeat {
            for gesture in gestures {
                segments.push(gesture);
                segments.push(Segment::rest(PAUSE));
            }
        }
        Self::new(segments, 100_650.0)
    }

    pub fn total_duration(&self) -> Duration {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Gestures the script contains, in order.
    pub fn expected_events(&self) -> Vec<SipPuffEvent> {
        self.segments.iter().filter_map(|s| s.expected).collect()
    }

    /// Pressure at the current position, then advance by `step`.
    pub fn next_pressure(&mut self, step: Duration) -> f64 {
        let pressure = self.pressure_at(self.elapsed);
        self.elapsed += step;
        pressure
    }

    fn pressure_at(&self, at: Duration) -> f64 {
        let t = at.as_secs_f64();

        // Weather drift: ±40 Pa over ten minutes, plus sensor noise.
        let drift = 40.0 * (t / 600.0 * std::f64::consts::TAU).sin();
        let noise = 1.5 * (t * 37.0).sin() + 1.0 * (t * 53.0).cos();

        self.ambient_pa + drift + noise + self.offset_at(at)
    }

    fn offset_at(&self, at: Duration) -> f64 {
        let mut start = Duration::ZERO;
        for segment in &self.segments {
            let end = start + segment.duration;
            if at < end {
                let into = at - start;
                let left = end - at;
                let ramp = into.min(left).min(RAMP).as_secs_f64() / RAMP.as_secs_f64();
                return segment.offset_pa * ramp;
            }
            start = end;
        }
        0.0
    }
}
