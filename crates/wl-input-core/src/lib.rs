//! Input translation layer for a mobile Wayland compositor
//!
//! Turns touch, hardware-key and IME events delivered by the host view into
//! the compositor's canonical event stream: evdev key events, text-input
//! commits and pre-edits, pointer motion/button/axis events and raw
//! multi-touch. Everything goes out through an [`EventInjectionPort`].
//!
//! [`InputDispatcher`] is the entry point; it owns the modifier state, the
//! IME bridge, the touchpad gesture recognizer and the accessory bar.

pub mod accessory;
pub mod bridge;
pub mod dispatcher;
pub mod event;
pub mod keycode;
pub mod modifiers;
pub mod passthrough;
pub mod port;
pub mod touchpad;

pub use accessory::{AccessoryBar, AccessoryItem};
pub use bridge::{CompositionRegion, CursorAnchor, CursorUpdateMode, InputBridge, KeyDisposition};
pub use dispatcher::{Dispatch, InputDispatcher};
pub use event::{KeyAction, KeyEvent, PlatformEvent, ScrollAxes, TouchAction, TouchEvent, TouchPointer};
pub use keycode::KeyMapping;
pub use modifiers::{Modifier, ModifierLatch, ModifierState, SubscriptionId};
pub use passthrough::PassthroughMultitouch;
pub use port::{
    Axis, ButtonState, CursorRect, EventInjectionPort, Injector, PortCall, PortError, PortResult,
    RecordingPort,
};
pub use touchpad::{GestureRecognizer, TouchpadGestureState};
