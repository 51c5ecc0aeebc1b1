//! Breath-switch input: ambient tracking, gesture recognition and events.

mod classifier;
pub mod event;
pub mod reference_filter;
pub mod state_machine;

pub use classifier::GestureClassifier;
pub use event::{ActionLength, ChannelListener, Direction, EventListener, SipPuffEvent, Strength};
pub use reference_filter::{AmbientReferenceFilter, FilterConfig};
pub use state_machine::{ClassifierConfig, GestureState, GestureStateMachine};
