//! Platform input events as delivered by the host view
//!
//! These types mirror the callbacks of the Android view and its
//! `InputConnection`: motion events, key events, IME composition calls and
//! accessory-bar presses. They are serde-serializable so recorded sessions can
//! be replayed through the dispatcher (see the `wl-input replay` command).
//!
//! JSON uses a `type` field for discrimination:
//! - `{"type": "commit_text", "text": "hi"}`
//! - `{"type": "touch", "action": "down", "pointers": [{"id": 0, "x": 1.0, "y": 2.0}], "time_ms": 5}`
//! - `{"type": "modifier_tap", "modifier": "ctrl"}`

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::bridge::CursorUpdateMode;
use crate::modifiers::Modifier;

/// Phase of a multi-touch motion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchAction {
    /// First finger touched down
    Down,
    /// An additional finger touched down
    PointerDown,
    Move,
    /// Last finger lifted
    Up,
    /// A finger other than the last one lifted
    PointerUp,
    Cancel,
}

/// One finger in a motion event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPointer {
    pub id: i32,
    pub x: f64,
    pub y: f64,
}

/// Scroll values reported by the platform alongside a motion event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollAxes {
    #[serde(default)]
    pub vertical: f64,
    #[serde(default)]
    pub horizontal: f64,
}

impl ScrollAxes {
    pub fn is_zero(&self) -> bool {
        self.vertical == 0.0 && self.horizontal == 0.0
    }
}

/// A multi-touch motion event.
///
/// `pointers` holds every finger currently on the surface (for up events,
/// including the one being lifted); `action_index` selects the finger the
/// action refers to for down/up phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub action: TouchAction,
    #[serde(default)]
    pub action_index: usize,
    #[serde(default)]
    pub pointers: Vec<TouchPointer>,
    pub time_ms: u64,
    #[serde(default)]
    pub scroll: Option<ScrollAxes>,
}

impl TouchEvent {
    pub fn new(action: TouchAction, pointers: Vec<TouchPointer>, time_ms: u64) -> Self {
        Self {
            action,
            action_index: 0,
            pointers,
            time_ms,
            scroll: None,
        }
    }

    pub fn with_action_index(mut self, index: usize) -> Self {
        self.action_index = index;
        self
    }

    pub fn with_scroll(mut self, vertical: f64, horizontal: f64) -> Self {
        self.scroll = Some(ScrollAxes {
            vertical,
            horizontal,
        });
        self
    }

    /// The finger this event's action applies to.
    pub fn action_pointer(&self) -> Option<&TouchPointer> {
        self.pointers
            .get(self.action_index)
            .or_else(|| self.pointers.first())
    }

    pub fn pointer(&self, id: i32) -> Option<&TouchPointer> {
        self.pointers.iter().find(|p| p.id == id)
    }

    /// Event time as carried on the port.
    pub fn port_time(&self) -> u32 {
        port_time(self.time_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Down,
    Up,
}

/// A key event carrying an Android `KeyEvent` keycode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub keycode: u32,
    pub action: KeyAction,
    pub time_ms: u64,
}

impl KeyEvent {
    pub fn down(keycode: u32, time_ms: u64) -> Self {
        Self {
            keycode,
            action: KeyAction::Down,
            time_ms,
        }
    }

    pub fn up(keycode: u32, time_ms: u64) -> Self {
        Self {
            keycode,
            action: KeyAction::Up,
            time_ms,
        }
    }

    pub fn port_time(&self) -> u32 {
        port_time(self.time_ms)
    }
}

/// Everything the host view can deliver, in one ordered stream.
///
/// IME callbacks carry no timestamp on the platform; `time_ms` is optional
/// and falls back to the wall clock when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// IME committed final text
    CommitText {
        text: String,
        #[serde(default)]
        time_ms: Option<u64>,
    },
    /// IME replaced the composing (pre-edit) text
    SetComposingText { text: String },
    /// IME finished composition without committing
    FinishComposingText,
    /// IME asked to delete characters around the cursor
    DeleteSurroundingText {
        before: usize,
        after: usize,
        #[serde(default)]
        time_ms: Option<u64>,
    },
    /// IME replaced previously committed text (autocorrect)
    CommitCorrection { old_text: String, new_text: String },
    /// Key event sent by the IME through its input connection
    ImeKey(KeyEvent),
    /// Key event from a hardware keyboard
    Key(KeyEvent),
    /// Multi-touch motion event on the compositor surface
    Touch(TouchEvent),
    /// Mouse wheel or trackpad scroll outside a touch sequence
    Scroll {
        #[serde(default)]
        vertical: f64,
        #[serde(default)]
        horizontal: f64,
        time_ms: u64,
    },
    /// Accessory-bar modifier button tapped
    ModifierTap {
        modifier: Modifier,
        #[serde(default)]
        time_ms: Option<u64>,
    },
    /// Accessory-bar key pressed, by label
    AccessoryKey {
        key: String,
        #[serde(default)]
        time_ms: Option<u64>,
    },
    /// The compositor surface gained or lost focus
    FocusChanged { focused: bool },
    /// IME asked for cursor anchor updates
    RequestCursorUpdates { mode: CursorUpdateMode },
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Fold a millisecond timestamp into the 31-bit range the port carries.
pub fn port_time(time_ms: u64) -> u32 {
    (time_ms % i32::MAX as u64) as u32
}
