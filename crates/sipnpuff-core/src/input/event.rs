use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Sender, TrySendError};
use log::warn;
use serde::{Deserialize, Serialize};

/// How long the gesture lasted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionLength {
    Short,
    Long,
}

/// How far the average differential was from ambient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strength {
    Weak,
    Strong,
}

/// Sign of the differential: a sip lowers the pressure, a puff raises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Sip,
    Puff,
}

/// One recognised breath-switch gesture.
///
/// A single action produces at most one event: a long strong sip is never
/// also reported as short, nor as weak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SipPuffEvent {
    ShortWeakSip,
    ShortStrongSip,
    ShortWeakPuff,
    ShortStrongPuff,
    LongWeakSip,
    LongStrongSip,
    LongWeakPuff,
    LongStrongPuff,
}

impl SipPuffEvent {
    pub const ALL_SIPS: [SipPuffEvent; 4] = [
        Self::ShortStrongSip,
        Self::ShortWeakSip,
        Self::LongStrongSip,
        Self::LongWeakSip,
    ];

    pub const ALL_PUFFS: [SipPuffEvent; 4] = [
        Self::ShortStrongPuff,
        Self::ShortWeakPuff,
        Self::LongStrongPuff,
        Self::LongWeakPuff,
    ];

    pub const fn new(length: ActionLength, strength: Strength, direction: Direction) -> Self {
        use ActionLength::*;
        use Direction::*;
        use Strength::*;

        match (length, strength, direction) {
            (Short, Weak, Sip) => Self::ShortWeakSip,
            (Short, Strong, Sip) => Self::ShortStrongSip,
            (Short, Weak, Puff) => Self::ShortWeakPuff,
            (Short, Strong, Puff) => Self::ShortStrongPuff,
            (Long, Weak, Sip) => Self::LongWeakSip,
            (Long, Strong, Sip) => Self::LongStrongSip,
            (Long, Weak, Puff) => Self::LongWeakPuff,
            (Long, Strong, Puff) => Self::LongStrongPuff,
        }
    }

    pub const fn length(self) -> ActionLength {
        match self {
            Self::ShortWeakSip
            | Self::ShortStrongSip
            | Self::ShortWeakPuff
            | Self::ShortStrongPuff => ActionLength::Short,
            _ => ActionLength::Long,
        }
    }

    pub const fn strength(self) -> Strength {
        match self {
            Self::ShortStrongSip
            | Self::ShortStrongPuff
            | Self::LongStrongSip
            | Self::LongStrongPuff => Strength::Strong,
            _ => Strength::Weak,
        }
    }

    pub const fn direction(self) -> Direction {
        match self {
            Self::ShortWeakSip
            | Self::ShortStrongSip
            | Self::LongWeakSip
            | Self::LongStrongSip => Direction::Sip,
            _ => Direction::Puff,
        }
    }

    pub const fn is_sip(self) -> bool {
        matches!(self.direction(), Direction::Sip)
    }

    pub const fn is_puff(self) -> bool {
        matches!(self.direction(), Direction::Puff)
    }

    /// Short display label, e.g. `"long strong sip"`.
    pub const fn label(self) -> &'static str {
        match self {
            Self::ShortWeakSip => "short weak sip",
            Self::ShortStrongSip => "short strong sip",
            Self::ShortWeakPuff => "short weak puff",
            Self::ShortStrongPuff => "short strong puff",
            Self::LongWeakSip => "long weak sip",
            Self::LongStrongSip => "long strong sip",
            Self::LongWeakPuff => "long weak puff",
            Self::LongStrongPuff => "long strong puff",
        }
    }
}

impl core::fmt::Display for SipPuffEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Receiver of recognised gestures.
///
/// Called synchronously from inside `GestureClassifier::update`, so
/// implementations should hand the event off and return quickly.
pub trait EventListener {
    fn on_gesture(&mut self, event: SipPuffEvent);
}

/// Discards every event.
impl EventListener for () {
    fn on_gesture(&mut self, _event: SipPuffEvent) {}
}

impl<F: FnMut(SipPuffEvent)> EventListener for F {
    fn on_gesture(&mut self, event: SipPuffEvent) {
        self(event)
    }
}

/// Forwards events into an `embassy-sync` channel.
///
/// This is how events leave the sampling context: the channel is FIFO and
/// the classifier is its only producer. The listener never blocks; when the
/// channel is full the event is dropped and a warning logged.
pub struct ChannelListener<'a, M: RawMutex, const N: usize> {
    sender: Sender<'a, M, SipPuffEvent, N>,
    dropped: u32,
}

impl<'a, M: RawMutex, const N: usize> ChannelListener<'a, M, N> {
    pub const fn new(sender: Sender<'a, M, SipPuffEvent, N>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// Number of events lost to a full channel so far.
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<M: RawMutex, const N: usize> EventListener for ChannelListener<'_, M, N> {
    fn on_gesture(&mut self, event: SipPuffEvent) {
        if let Err(TrySendError::Full(event)) = self.sender.try_send(event) {
            self.dropped = self.dropped.saturating_add(1);
            warn!("Gesture channel full, dropping {}", event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_sync::channel::Channel;
    use std::vec::Vec;

    const LENGTHS: [ActionLength; 2] = [ActionLength::Short, ActionLength::Long];
    const STRENGTHS: [Strength; 2] = [Strength::Weak, Strength::Strong];
    const DIRECTIONS: [Direction; 2] = [Direction::Sip, Direction::Puff];

    #[test]
    fn test_parts_identify_each_variant() {
        let mut seen = Vec::new();
        for length in LENGTHS {
            for strength in STRENGTHS {
                for direction in DIRECTIONS {
                    let event = SipPuffEvent::new(length, strength, direction);
                    assert_eq!(event.length(), length);
                    assert_eq!(event.strength(), strength);
                    assert_eq!(event.direction(), direction);
                    assert!(!seen.contains(&event));
                    seen.push(event);
                }
            }
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn test_sip_and_puff_groups_partition_events() {
        assert!(SipPuffEvent::ALL_SIPS.iter().all(|e| e.is_sip() && !e.is_puff()));
        assert!(SipPuffEvent::ALL_PUFFS.iter().all(|e| e.is_puff() && !e.is_sip()));
    }

    #[test]
    fn test_closure_listener() {
        let mut received = Vec::new();
        let mut listener = |event: SipPuffEvent| received.push(event);
        listener.on_gesture(SipPuffEvent::LongStrongSip);
        assert_eq!(received, [SipPuffEvent::LongStrongSip]);
    }

    #[test]
    fn test_channel_listener_preserves_order_and_counts_drops() {
        let channel: Channel<NoopRawMutex, SipPuffEvent, 2> = Channel::new();
        let mut listener = ChannelListener::new(channel.sender());

        listener.on_gesture(SipPuffEvent::ShortWeakPuff);
        listener.on_gesture(SipPuffEvent::ShortWeakSip);
        listener.on_gesture(SipPuffEvent::LongWeakSip);

        assert_eq!(listener.dropped(), 1);
        assert_eq!(channel.try_receive(), Ok(SipPuffEvent::ShortWeakPuff));
        assert_eq!(channel.try_receive(), Ok(SipPuffEvent::ShortWeakSip));
        assert!(channel.try_receive().is_err());
    }
}
