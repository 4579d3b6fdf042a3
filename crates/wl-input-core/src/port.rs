//! The compositor-facing event injection boundary
//!
//! [`EventInjectionPort`] is implemented by whatever sits on the other side of
//! the native call boundary (the compositor core, a uinput device, a test
//! recorder). The input layer only ever calls into it; it never reads state
//! back except for the text cursor rectangle.
//!
//! Calls are fire-and-forget. A failing call must not stop the rest of an
//! event sequence, so components never use the port directly: they go
//! through [`Injector`], which logs and absorbs every error.

use std::fmt;

use evdev::Key;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a port implementation may report
#[derive(Debug, Error)]
pub enum PortError {
    /// The port cannot express this kind of event
    #[error("{call} is not supported by this port")]
    Unsupported { call: &'static str },

    /// The compositor refused the event
    #[error("compositor rejected {call}: {reason}")]
    Rejected { call: &'static str, reason: String },

    /// Device or socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PortResult<T = ()> = Result<T, PortError>;

/// Pointer button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonState {
    Released = 0,
    Pressed = 1,
}

/// Scroll axis, numbered like `wl_pointer.axis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Vertical = 0,
    Horizontal = 1,
}

/// Text cursor rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// The canonical event sink of the compositor core.
pub trait EventInjectionPort {
    /// Inject an evdev key press or release.
    fn inject_key(&mut self, key: Key, pressed: bool, time_ms: u32) -> PortResult;

    /// Commit final text through the text-input protocol.
    fn commit_text(&mut self, text: &str) -> PortResult;

    /// Replace the pre-edit (composition) string. Cursor positions are byte
    /// offsets into `text`.
    fn preedit_text(&mut self, text: &str, cursor_begin: usize, cursor_end: usize) -> PortResult;

    /// Delete characters around the text cursor.
    fn delete_surrounding_text(&mut self, before: usize, after: usize) -> PortResult;

    fn pointer_motion(&mut self, x: f64, y: f64, time_ms: u32) -> PortResult;

    fn pointer_button(&mut self, button: Key, state: ButtonState, time_ms: u32) -> PortResult;

    fn pointer_axis(&mut self, axis: Axis, value: f64, time_ms: u32) -> PortResult;

    fn pointer_enter(&mut self, x: f64, y: f64, time_ms: u32) -> PortResult;

    fn pointer_leave(&mut self, time_ms: u32) -> PortResult;

    fn touch_down(&mut self, id: i32, x: f64, y: f64, time_ms: u32) -> PortResult;

    fn touch_motion(&mut self, id: i32, x: f64, y: f64, time_ms: u32) -> PortResult;

    fn touch_up(&mut self, id: i32, time_ms: u32) -> PortResult;

    fn touch_cancel(&mut self) -> PortResult;

    /// Close a group of touch events that belong to one platform callback.
    fn touch_frame(&mut self) -> PortResult;

    /// Keyboard focus of the client surface changed.
    fn keyboard_focus(&mut self, focused: bool) -> PortResult;

    /// Current text cursor rectangle of the focused client.
    fn cursor_rect(&mut self) -> PortResult<CursorRect>;
}

/// Error-absorbing view over a port.
///
/// Every method forwards one call and logs a failure at `warn` level instead
/// of returning it, so a failed Shift press does not keep the following
/// character keys from being attempted.
pub struct Injector<'a, P: EventInjectionPort + ?Sized> {
    port: &'a mut P,
}

impl<'a, P: EventInjectionPort + ?Sized> Injector<'a, P> {
    pub fn new(port: &'a mut P) -> Self {
        Self { port }
    }

    fn absorb<T>(call: &str, result: PortResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("{} failed: {}", call, e);
                None
            }
        }
    }

    pub fn press_key(&mut self, key: Key, time_ms: u32) {
        Self::absorb("inject_key", self.port.inject_key(key, true, time_ms));
    }

    pub fn release_key(&mut self, key: Key, time_ms: u32) {
        Self::absorb("inject_key", self.port.inject_key(key, false, time_ms));
    }

    /// Press and release a key
    pub fn tap_key(&mut self, key: Key, time_ms: u32) {
        self.press_key(key, time_ms);
        self.release_key(key, time_ms);
    }

    pub fn commit_text(&mut self, text: &str) {
        Self::absorb("commit_text", self.port.commit_text(text));
    }

    pub fn preedit_text(&mut self, text: &str, cursor_begin: usize, cursor_end: usize) {
        Self::absorb(
            "preedit_text",
            self.port.preedit_text(text, cursor_begin, cursor_end),
        );
    }

    pub fn clear_preedit(&mut self) {
        self.preedit_text("", 0, 0);
    }

    pub fn delete_surrounding_text(&mut self, before: usize, after: usize) {
        Self::absorb(
            "delete_surrounding_text",
            self.port.delete_surrounding_text(before, after),
        );
    }

    pub fn pointer_motion(&mut self, x: f64, y: f64, time_ms: u32) {
        Self::absorb("pointer_motion", self.port.pointer_motion(x, y, time_ms));
    }

    pub fn pointer_button(&mut self, button: Key, state: ButtonState, time_ms: u32) {
        Self::absorb(
            "pointer_button",
            self.port.pointer_button(button, state, time_ms),
        );
    }

    /// Press immediately followed by release, one millisecond apart.
    pub fn click(&mut self, button: Key, time_ms: u32) {
        self.pointer_button(button, ButtonState::Pressed, time_ms);
        self.pointer_button(button, ButtonState::Released, time_ms.wrapping_add(1));
    }

    pub fn pointer_axis(&mut self, axis: Axis, value: f64, time_ms: u32) {
        Self::absorb("pointer_axis", self.port.pointer_axis(axis, value, time_ms));
    }

    pub fn pointer_enter(&mut self, x: f64, y: f64, time_ms: u32) {
        Self::absorb("pointer_enter", self.port.pointer_enter(x, y, time_ms));
    }

    pub fn pointer_leave(&mut self, time_ms: u32) {
        Self::absorb("pointer_leave", self.port.pointer_leave(time_ms));
    }

    pub fn touch_down(&mut self, id: i32, x: f64, y: f64, time_ms: u32) {
        Self::absorb("touch_down", self.port.touch_down(id, x, y, time_ms));
    }

    pub fn touch_motion(&mut self, id: i32, x: f64, y: f64, time_ms: u32) {
        Self::absorb("touch_motion", self.port.touch_motion(id, x, y, time_ms));
    }

    pub fn touch_up(&mut self, id: i32, time_ms: u32) {
        Self::absorb("touch_up", self.port.touch_up(id, time_ms));
    }

    pub fn touch_cancel(&mut self) {
        Self::absorb("touch_cancel", self.port.touch_cancel());
    }

    pub fn touch_frame(&mut self) {
        Self::absorb("touch_frame", self.port.touch_frame());
    }

    pub fn keyboard_focus(&mut self, focused: bool) {
        Self::absorb("keyboard_focus", self.port.keyboard_focus(focused));
    }

    pub fn cursor_rect(&mut self) -> Option<CursorRect> {
        Self::absorb("cursor_rect", self.port.cursor_rect())
    }
}

/// A single call made against a port, as recorded by [`RecordingPort`].
///
/// Serialized as JSON with a `call` field for discrimination, e.g.
/// `{"call": "key", "keycode": 46, "pressed": true, "time_ms": 10}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum PortCall {
    Key {
        keycode: u16,
        pressed: bool,
        time_ms: u32,
    },
    CommitText {
        text: String,
    },
    PreeditText {
        text: String,
        cursor_begin: usize,
        cursor_end: usize,
    },
    DeleteSurroundingText {
        before: usize,
        after: usize,
    },
    PointerMotion {
        x: f64,
        y: f64,
        time_ms: u32,
    },
    PointerButton {
        button: u16,
        state: ButtonState,
        time_ms: u32,
    },
    PointerAxis {
        axis: Axis,
        value: f64,
        time_ms: u32,
    },
    PointerEnter {
        x: f64,
        y: f64,
        time_ms: u32,
    },
    PointerLeave {
        time_ms: u32,
    },
    TouchDown {
        id: i32,
        x: f64,
        y: f64,
        time_ms: u32,
    },
    TouchMotion {
        id: i32,
        x: f64,
        y: f64,
        time_ms: u32,
    },
    TouchUp {
        id: i32,
        time_ms: u32,
    },
    TouchCancel,
    TouchFrame,
    KeyboardFocus {
        focused: bool,
    },
    CursorRect,
}

type FailurePredicate = Box<dyn Fn(&PortCall) -> bool>;

/// Port that records every call in order.
///
/// Used by tests and by the CLI replay command. Calls matching the optional
/// failure predicate are still recorded, then reported as rejected.
#[derive(Default)]
pub struct RecordingPort {
    calls: Vec<PortCall>,
    cursor: CursorRect,
    fail_when: Option<FailurePredicate>,
}

impl fmt::Debug for RecordingPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingPort")
            .field("calls", &self.calls)
            .field("cursor", &self.cursor)
            .field("fail_when", &self.fail_when.is_some())
            .finish()
    }
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rectangle returned from [`EventInjectionPort::cursor_rect`].
    pub fn with_cursor_rect(mut self, rect: CursorRect) -> Self {
        self.cursor = rect;
        self
    }

    /// Reject every call for which `predicate` returns true.
    pub fn fail_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PortCall) -> bool + 'static,
    {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    pub fn calls(&self) -> &[PortCall] {
        &self.calls
    }

    /// Drain the recorded calls.
    pub fn take(&mut self) -> Vec<PortCall> {
        std::mem::take(&mut self.calls)
    }

    /// Recorded key events as `(keycode, pressed)` pairs.
    pub fn key_events(&self) -> Vec<(u16, bool)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PortCall::Key {
                    keycode, pressed, ..
                } => Some((*keycode, *pressed)),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, name: &'static str, call: PortCall) -> PortResult {
        let rejected = self.fail_when.as_ref().is_some_and(|f| f(&call));
        self.calls.push(call);
        if rejected {
            return Err(PortError::Rejected {
                call: name,
                reason: "failure injected".to_string(),
            });
        }
        Ok(())
    }
}

impl EventInjectionPort for RecordingPort {
    fn inject_key(&mut self, key: Key, pressed: bool, time_ms: u32) -> PortResult {
        self.record(
            "inject_key",
            PortCall::Key {
                keycode: key.code(),
                pressed,
                time_ms,
            },
        )
    }

    fn commit_text(&mut self, text: &str) -> PortResult {
        self.record(
            "commit_text",
            PortCall::CommitText {
                text: text.to_string(),
            },
        )
    }

    fn preedit_text(&mut self, text: &str, cursor_begin: usize, cursor_end: usize) -> PortResult {
        self.record(
            "preedit_text",
            PortCall::PreeditText {
                text: text.to_string(),
                cursor_begin,
                cursor_end,
            },
        )
    }

    fn delete_surrounding_text(&mut self, before: usize, after: usize) -> PortResult {
        self.record(
            "delete_surrounding_text",
            PortCall::DeleteSurroundingText { before, after },
        )
    }

    fn pointer_motion(&mut self, x: f64, y: f64, time_ms: u32) -> PortResult {
        self.record("pointer_motion", PortCall::PointerMotion { x, y, time_ms })
    }

    fn pointer_button(&mut self, button: Key, state: ButtonState, time_ms: u32) -> PortResult {
        self.record(
            "pointer_button",
            PortCall::PointerButton {
                button: button.code(),
                state,
                time_ms,
            },
        )
    }

    fn pointer_axis(&mut self, axis: Axis, value: f64, time_ms: u32) -> PortResult {
        self.record("pointer_axis", PortCall::PointerAxis { axis, value, time_ms })
    }

    fn pointer_enter(&mut self, x: f64, y: f64, time_ms: u32) -> PortResult {
        self.record("pointer_enter", PortCall::PointerEnter { x, y, time_ms })
    }

    fn pointer_leave(&mut self, time_ms: u32) -> PortResult {
        self.record("pointer_leave", PortCall::PointerLeave { time_ms })
    }

    fn touch_down(&mut self, id: i32, x: f64, y: f64, time_ms: u32) -> PortResult {
        self.record("touch_down", PortCall::TouchDown { id, x, y, time_ms })
    }

    fn touch_motion(&mut self, id: i32, x: f64, y: f64, time_ms: u32) -> PortResult {
        self.record("touch_motion", PortCall::TouchMotion { id, x, y, time_ms })
    }

    fn touch_up(&mut self, id: i32, time_ms: u32) -> PortResult {
        self.record("touch_up", PortCall::TouchUp { id, time_ms })
    }

    fn touch_cancel(&mut self) -> PortResult {
        self.record("touch_cancel", PortCall::TouchCancel)
    }

    fn touch_frame(&mut self) -> PortResult {
        self.record("touch_frame", PortCall::TouchFrame)
    }

    fn keyboard_focus(&mut self, focused: bool) -> PortResult {
        self.record("keyboard_focus", PortCall::KeyboardFocus { focused })
    }

    fn cursor_rect(&mut self) -> PortResult<CursorRect> {
        self.record("cursor_rect", PortCall::CursorRect)?;
        Ok(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_port_keeps_order() {
        let mut port = RecordingPort::new();
        port.inject_key(Key::KEY_A, true, 1).unwrap();
        port.commit_text("x").unwrap();
        port.touch_frame().unwrap();

        assert_eq!(
            port.calls(),
            &[
                PortCall::Key {
                    keycode: 30,
                    pressed: true,
                    time_ms: 1
                },
                PortCall::CommitText {
                    text: "x".to_string()
                },
                PortCall::TouchFrame,
            ]
        );
    }

    #[test]
    fn test_injector_absorbs_failures() {
        let mut port = RecordingPort::new().fail_when(|call| {
            matches!(call, PortCall::Key { keycode: 42, .. })
        });

        {
            let mut injector = Injector::new(&mut port);
            injector.press_key(Key::KEY_LEFTSHIFT, 5);
            injector.tap_key(Key::KEY_A, 5);
            injector.release_key(Key::KEY_LEFTSHIFT, 5);
        }

        // Every call was attempted even though the Shift events failed
        assert_eq!(
            port.key_events(),
            vec![(42, true), (30, true), (30, false), (42, false)]
        );
    }

    #[test]
    fn test_click_releases_one_ms_later() {
        let mut port = RecordingPort::new();
        Injector::new(&mut port).click(Key::BTN_RIGHT, u32::MAX);

        assert_eq!(
            port.calls(),
            &[
                PortCall::PointerButton {
                    button: 0x111,
                    state: ButtonState::Pressed,
                    time_ms: u32::MAX
                },
                PortCall::PointerButton {
                    button: 0x111,
                    state: ButtonState::Released,
                    time_ms: 0
                },
            ]
        );
    }

    #[test]
    fn test_cursor_rect_failure_yields_none() {
        let mut port = RecordingPort::new().fail_when(|call| matches!(call, PortCall::CursorRect));
        assert_eq!(Injector::new(&mut port).cursor_rect(), None);

        let rect = CursorRect {
            x: 1,
            y: 2,
            width: 3,
            height: 4,
        };
        let mut port = RecordingPort::new().with_cursor_rect(rect);
        assert_eq!(Injector::new(&mut port).cursor_rect(), Some(rect));
    }

    #[test]
    fn test_port_call_json_shape() {
        let call = PortCall::PointerAxis {
            axis: Axis::Vertical,
            value: -5.0,
            time_ms: 7,
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["call"], "pointer_axis");
        assert_eq!(json["axis"], "vertical");
        assert_eq!(json["value"], -5.0);
    }
}
