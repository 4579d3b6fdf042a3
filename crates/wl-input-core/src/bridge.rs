//! IME bridge: turns input-method callbacks into text-input or key events
//!
//! # Two Commit Paths
//!
//! Committed text normally travels through the text-input protocol so that
//! any script (CJK, emoji) reaches the client unchanged. When accessory-bar
//! modifiers are active, chords like Ctrl+C only make sense as key events, so
//! text made entirely of mappable ASCII is replayed as evdev keys wrapped in
//! modifier press/release:
//!
//! ```text
//! Ctrl sticky, commit "c":
//!   Ctrl↓  C↓  C↑  Ctrl↑        then Ctrl is released (sticky, not locked)
//! ```
//!
//! If any character has no keycode the whole commit falls back to the text
//! path, and sticky modifiers are still cleared so they never leak into the
//! next unrelated input.

use bitflags::bitflags;
use evdev::Key;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::event::{KeyAction, KeyEvent};
use crate::keycode::{self, android};
use crate::modifiers::{Modifier, ModifierState};
use crate::port::{EventInjectionPort, Injector};

/// Pending IME composition (pre-edit) text.
///
/// Cursor positions are byte offsets into `text`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionRegion {
    pub text: String,
    pub cursor_begin: usize,
    pub cursor_end: usize,
}

impl CompositionRegion {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

bitflags! {
    /// Flags of an IME cursor-update request
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CursorUpdateMode: u32 {
        /// Report the cursor position once, right away
        const IMMEDIATE = 1;
        /// Keep reporting on every change
        const MONITOR   = 2;
    }
}

impl Serialize for CursorUpdateMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for CursorUpdateMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Ok(CursorUpdateMode::from_bits_truncate(bits))
    }
}

/// Insertion marker reported back to the platform IME.
///
/// Derived from the compositor's cursor rectangle: the marker sits at the
/// rectangle's left edge, with its baseline on the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorAnchor {
    pub x: f32,
    pub top: f32,
    pub baseline: f32,
    pub bottom: f32,
}

/// What the bridge did with an IME key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Fully handled here (Backspace/Delete and their suppressed key-ups)
    Handled,
    /// Not an editing key; the caller routes it like a hardware key
    Forward,
}

/// Translates IME callbacks for one text field.
#[derive(Debug, Default)]
pub struct InputBridge {
    composition: CompositionRegion,
}

impl InputBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn composition(&self) -> &CompositionRegion {
        &self.composition
    }

    /// Commit final text from the IME.
    pub fn commit_text<P: EventInjectionPort + ?Sized>(
        &mut self,
        port: &mut P,
        modifiers: &mut ModifierState,
        text: &str,
        time_ms: u32,
    ) {
        if text.is_empty() {
            return;
        }
        let mut out = Injector::new(port);

        if !modifiers.has_active_modifiers() {
            tracing::debug!("commit_text {:?} via text-input", text);
            self.clear_composition(&mut out);
            out.commit_text(text);
            return;
        }

        let Some(mappings) = keycode::map_str(text) else {
            tracing::debug!(
                "Modifiers active but {:?} has unmapped characters, committing as text",
                text
            );
            self.clear_composition(&mut out);
            out.commit_text(text);
            modifiers.clear_sticky_modifiers();
            return;
        };

        tracing::debug!(
            "commit_text {:?} as key events with {:?}",
            text,
            modifiers.active_modifiers()
        );
        self.clear_composition(&mut out);

        let active = modifiers.active_modifiers();
        let shift_held = modifiers.is_active(Modifier::Shift);

        for modifier in &active {
            out.press_key(modifier.to_key(), time_ms);
        }
        for mapping in mappings {
            let extra_shift = mapping.needs_shift && !shift_held;
            if extra_shift {
                out.press_key(Key::KEY_LEFTSHIFT, time_ms);
            }
            out.tap_key(mapping.key, time_ms);
            if extra_shift {
                out.release_key(Key::KEY_LEFTSHIFT, time_ms);
            }
        }
        for modifier in &active {
            out.release_key(modifier.to_key(), time_ms);
        }

        modifiers.clear_sticky_modifiers();
    }

    /// Replace the composition text. The whole string is the pre-edit
    /// cursor span.
    pub fn set_composing_text<P: EventInjectionPort + ?Sized>(&mut self, port: &mut P, text: &str) {
        tracing::debug!("set_composing_text {:?}", text);
        self.composition = CompositionRegion {
            text: text.to_string(),
            cursor_begin: 0,
            cursor_end: text.len(),
        };
        Injector::new(port).preedit_text(text, 0, text.len());
    }

    pub fn finish_composing_text<P: EventInjectionPort + ?Sized>(&mut self, port: &mut P) {
        tracing::debug!("finish_composing_text");
        self.composition = CompositionRegion::default();
        Injector::new(port).clear_preedit();
    }

    /// Delete `before` characters behind the cursor and `after` in front.
    ///
    /// The request is forwarded to the text-input protocol and also replayed
    /// as Backspace/Delete key pairs for clients without text-input support.
    pub fn delete_surrounding_text<P: EventInjectionPort + ?Sized>(
        &mut self,
        port: &mut P,
        modifiers: &mut ModifierState,
        before: usize,
        after: usize,
        time_ms: u32,
    ) {
        tracing::debug!("delete_surrounding_text before={} after={}", before, after);
        let mut out = Injector::new(port);
        out.delete_surrounding_text(before, after);
        for _ in 0..before {
            out.tap_key(Key::KEY_BACKSPACE, time_ms);
        }
        for _ in 0..after {
            out.tap_key(Key::KEY_DELETE, time_ms);
        }
        modifiers.clear_sticky_modifiers();
    }

    /// Handle a key event sent by the IME through its input connection.
    pub fn send_key_event<P: EventInjectionPort + ?Sized>(
        &mut self,
        port: &mut P,
        modifiers: &mut ModifierState,
        event: &KeyEvent,
    ) -> KeyDisposition {
        let (before, after, key) = match event.keycode {
            android::KEYCODE_DEL => (1, 0, Key::KEY_BACKSPACE),
            android::KEYCODE_FORWARD_DEL => (0, 1, Key::KEY_DELETE),
            _ => return KeyDisposition::Forward,
        };

        if event.action == KeyAction::Down {
            tracing::debug!("IME key {:?} as surrounding delete", key);
            let mut out = Injector::new(port);
            out.delete_surrounding_text(before, after);
            out.tap_key(key, event.port_time());
            modifiers.clear_sticky_modifiers();
        }

        // The key-up was already covered by the tap above
        KeyDisposition::Handled
    }

    /// Replace previously committed text with an autocorrect suggestion.
    ///
    /// Always goes through the text path, whatever the modifier state.
    pub fn commit_correction<P: EventInjectionPort + ?Sized>(
        &mut self,
        port: &mut P,
        old_text: &str,
        new_text: &str,
    ) {
        tracing::debug!("commit_correction {:?} -> {:?}", old_text, new_text);
        let mut out = Injector::new(port);
        let delete_len = old_text.chars().count();
        if delete_len > 0 {
            out.delete_surrounding_text(delete_len, 0);
        }
        out.commit_text(new_text);
    }

    /// Answer an IME cursor-update request.
    ///
    /// Returns the anchor to report when an immediate update was requested
    /// and the compositor supplied a cursor rectangle.
    pub fn request_cursor_updates<P: EventInjectionPort + ?Sized>(
        &mut self,
        port: &mut P,
        mode: CursorUpdateMode,
    ) -> Option<CursorAnchor> {
        tracing::debug!("request_cursor_updates {:?}", mode);
        if !mode.contains(CursorUpdateMode::IMMEDIATE) {
            return None;
        }
        let rect = Injector::new(port).cursor_rect()?;
        // The i32 sum can overflow
        let bottom = rect.y as f32 + rect.height as f32;
        Some(CursorAnchor {
            x: rect.x as f32,
            top: rect.y as f32,
            baseline: bottom,
            bottom,
        })
    }

    /// Drop any pending composition without notifying the compositor.
    pub fn reset(&mut self) {
        self.composition = CompositionRegion::default();
    }

    fn clear_composition<P: EventInjectionPort + ?Sized>(&mut self, out: &mut Injector<'_, P>) {
        if !self.composition.is_empty() {
            self.composition = CompositionRegion::default();
            out.clear_preedit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{CursorRect, PortCall, RecordingPort};

    const CTRL: u16 = 29;
    const SHIFT: u16 = 42;
    const BACKSPACE: u16 = 14;
    const DELETE: u16 = 111;

    fn sticky(modifiers: &[Modifier]) -> ModifierState {
        let mut state = ModifierState::new();
        for m in modifiers {
            state.tap_at(*m, 1_000);
        }
        state
    }

    fn locked(modifier: Modifier) -> ModifierState {
        let mut state = ModifierState::new();
        state.tap_at(modifier, 1_000);
        state.tap_at(modifier, 1_100);
        state
    }

    #[test]
    fn test_plain_commit_is_single_text_call() {
        let mut port = RecordingPort::new();
        let mut modifiers = ModifierState::new();
        let mut bridge = InputBridge::new();

        bridge.commit_text(&mut port, &mut modifiers, "Hello", 0);

        assert_eq!(
            port.calls(),
            &[PortCall::CommitText {
                text: "Hello".to_string()
            }]
        );
    }

    #[test]
    fn test_ctrl_c_becomes_key_chord() {
        let mut port = RecordingPort::new();
        let mut modifiers = sticky(&[Modifier::Ctrl]);
        let mut bridge = InputBridge::new();

        bridge.commit_text(&mut port, &mut modifiers, "c", 0);

        assert_eq!(
            port.key_events(),
            vec![(CTRL, true), (46, true), (46, false), (CTRL, false)]
        );
        assert!(port
            .calls()
            .iter()
            .all(|c| matches!(c, PortCall::Key { .. })));
        assert!(!modifiers.is_active(Modifier::Ctrl));
    }

    #[test]
    fn test_uppercase_adds_shift_around_each_char() {
        let mut port = RecordingPort::new();
        let mut modifiers = sticky(&[Modifier::Alt]);
        let mut bridge = InputBridge::new();

        bridge.commit_text(&mut port, &mut modifiers, "A", 0);

        assert_eq!(
            port.key_events(),
            vec![
                (56, true),
                (SHIFT, true),
                (30, true),
                (30, false),
                (SHIFT, false),
                (56, false),
            ]
        );
    }

    #[test]
    fn test_no_extra_shift_when_shift_active() {
        let mut port = RecordingPort::new();
        let mut modifiers = sticky(&[Modifier::Shift, Modifier::Super]);
        let mut bridge = InputBridge::new();

        bridge.commit_text(&mut port, &mut modifiers, "?", 0);

        assert_eq!(
            port.key_events(),
            vec![
                (SHIFT, true),
                (125, true),
                (53, true),
                (53, false),
                (SHIFT, false),
                (125, false),
            ]
        );
    }

    #[test]
    fn test_unmapped_text_falls_back_and_clears_sticky() {
        let mut port = RecordingPort::new();
        let mut modifiers = sticky(&[Modifier::Ctrl]);
        let mut bridge = InputBridge::new();

        bridge.commit_text(&mut port, &mut modifiers, "a😀", 0);

        assert_eq!(
            port.calls(),
            &[PortCall::CommitText {
                text: "a😀".to_string()
            }]
        );
        assert!(!modifiers.has_active_modifiers());
    }

    #[test]
    fn test_locked_modifier_survives_commit() {
        let mut port = RecordingPort::new();
        let mut modifiers = locked(Modifier::Ctrl);
        let mut bridge = InputBridge::new();

        bridge.commit_text(&mut port, &mut modifiers, "x", 0);
        bridge.commit_text(&mut port, &mut modifiers, "日本", 0);

        assert!(modifiers.is_active(Modifier::Ctrl));
        assert!(modifiers.is_locked(Modifier::Ctrl));
        assert_eq!(port.key_events().len(), 4);
    }

    #[test]
    fn test_empty_commit_does_nothing() {
        let mut port = RecordingPort::new();
        let mut modifiers = sticky(&[Modifier::Ctrl]);
        let mut bridge = InputBridge::new();

        bridge.commit_text(&mut port, &mut modifiers, "", 0);

        assert!(port.calls().is_empty());
        assert!(modifiers.is_active(Modifier::Ctrl));
    }

    #[test]
    fn test_commit_clears_pending_composition() {
        let mut port = RecordingPort::new();
        let mut modifiers = ModifierState::new();
        let mut bridge = InputBridge::new();

        bridge.set_composing_text(&mut port, "こん");
        assert_eq!(bridge.composition().cursor_end, "こん".len());
        bridge.commit_text(&mut port, &mut modifiers, "こんにちは", 0);

        assert_eq!(
            port.calls(),
            &[
                PortCall::PreeditText {
                    text: "こん".to_string(),
                    cursor_begin: 0,
                    cursor_end: 6
                },
                PortCall::PreeditText {
                    text: String::new(),
                    cursor_begin: 0,
                    cursor_end: 0
                },
                PortCall::CommitText {
                    text: "こんにちは".to_string()
                },
            ]
        );
        assert!(bridge.composition().is_empty());
    }

    #[test]
    fn test_composing_text_leaves_modifiers_alone() {
        let mut port = RecordingPort::new();
        let modifiers = sticky(&[Modifier::Shift]);
        let mut bridge = InputBridge::new();

        bridge.set_composing_text(&mut port, "ab");
        bridge.finish_composing_text(&mut port);

        assert!(modifiers.is_active(Modifier::Shift));
        assert!(bridge.composition().is_empty());
        assert_eq!(port.calls().len(), 2);
    }

    #[test]
    fn test_delete_surrounding_text_order() {
        let mut port = RecordingPort::new();
        let mut modifiers = sticky(&[Modifier::Ctrl]);
        let mut bridge = InputBridge::new();

        bridge.delete_surrounding_text(&mut port, &mut modifiers, 2, 1, 0);

        assert_eq!(
            port.calls()[0],
            PortCall::DeleteSurroundingText {
                before: 2,
                after: 1
            }
        );
        assert_eq!(
            port.key_events(),
            vec![
                (BACKSPACE, true),
                (BACKSPACE, false),
                (BACKSPACE, true),
                (BACKSPACE, false),
                (DELETE, true),
                (DELETE, false),
            ]
        );
        assert!(!modifiers.has_active_modifiers());
    }

    #[test]
    fn test_ime_backspace_down_handled_and_up_suppressed() {
        let mut port = RecordingPort::new();
        let mut modifiers = ModifierState::new();
        let mut bridge = InputBridge::new();

        let down = KeyEvent::down(android::KEYCODE_DEL, 20);
        let up = KeyEvent::up(android::KEYCODE_DEL, 25);

        assert_eq!(
            bridge.send_key_event(&mut port, &mut modifiers, &down),
            KeyDisposition::Handled
        );
        assert_eq!(
            bridge.send_key_event(&mut port, &mut modifiers, &up),
            KeyDisposition::Handled
        );

        assert_eq!(
            port.calls(),
            &[
                PortCall::DeleteSurroundingText {
                    before: 1,
                    after: 0
                },
                PortCall::Key {
                    keycode: BACKSPACE,
                    pressed: true,
                    time_ms: 20
                },
                PortCall::Key {
                    keycode: BACKSPACE,
                    pressed: false,
                    time_ms: 20
                },
            ]
        );
    }

    #[test]
    fn test_ime_forward_delete() {
        let mut port = RecordingPort::new();
        let mut modifiers = ModifierState::new();
        let mut bridge = InputBridge::new();

        bridge.send_key_event(
            &mut port,
            &mut modifiers,
            &KeyEvent::down(android::KEYCODE_FORWARD_DEL, 0),
        );

        assert_eq!(
            port.calls()[0],
            PortCall::DeleteSurroundingText {
                before: 0,
                after: 1
            }
        );
        assert_eq!(port.key_events(), vec![(DELETE, true), (DELETE, false)]);
    }

    #[test]
    fn test_other_ime_keys_are_forwarded() {
        let mut port = RecordingPort::new();
        let mut modifiers = ModifierState::new();
        let mut bridge = InputBridge::new();

        let disposition = bridge.send_key_event(
            &mut port,
            &mut modifiers,
            &KeyEvent::down(android::KEYCODE_ENTER, 0),
        );

        assert_eq!(disposition, KeyDisposition::Forward);
        assert!(port.calls().is_empty());
    }

    #[test]
    fn test_commit_correction_ignores_modifiers() {
        let mut port = RecordingPort::new();
        let mut bridge = InputBridge::new();

        bridge.commit_correction(&mut port, "teh", "the");

        assert_eq!(
            port.calls(),
            &[
                PortCall::DeleteSurroundingText {
                    before: 3,
                    after: 0
                },
                PortCall::CommitText {
                    text: "the".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_commit_correction_counts_characters() {
        let mut port = RecordingPort::new();
        let mut bridge = InputBridge::new();

        bridge.commit_correction(&mut port, "café", "cafe");

        assert_eq!(
            port.calls()[0],
            PortCall::DeleteSurroundingText {
                before: 4,
                after: 0
            }
        );
    }

    #[test]
    fn test_cursor_anchor_from_rect() {
        let mut port = RecordingPort::new().with_cursor_rect(CursorRect {
            x: 10,
            y: 20,
            width: 2,
            height: 16,
        });
        let mut bridge = InputBridge::new();

        let anchor = bridge
            .request_cursor_updates(&mut port, CursorUpdateMode::IMMEDIATE | CursorUpdateMode::MONITOR)
            .expect("should report an anchor");
        assert_eq!(
            anchor,
            CursorAnchor {
                x: 10.0,
                top: 20.0,
                baseline: 36.0,
                bottom: 36.0
            }
        );

        assert_eq!(
            bridge.request_cursor_updates(&mut port, CursorUpdateMode::MONITOR),
            None
        );
        assert_eq!(port.calls(), &[PortCall::CursorRect]);
    }

    #[test]
    fn test_cursor_anchor_near_i32_max_does_not_overflow() {
        let mut port = RecordingPort::new().with_cursor_rect(CursorRect {
            x: 0,
            y: i32::MAX - 5,
            width: 1,
            height: 16,
        });
        let mut bridge = InputBridge::new();

        let anchor = bridge
            .request_cursor_updates(&mut port, CursorUpdateMode::IMMEDIATE)
            .expect("should report an anchor");
        assert!(anchor.bottom >= anchor.top);
        assert_eq!(anchor.bottom, (i32::MAX - 5) as f32 + 16.0);
    }

    #[test]
    fn test_cursor_update_mode_from_bits() {
        let mode: CursorUpdateMode = serde_json::from_str("3").expect("should deserialize");
        assert!(mode.contains(CursorUpdateMode::IMMEDIATE));
        assert!(mode.contains(CursorUpdateMode::MONITOR));
        assert_eq!(serde_json::to_string(&mode).unwrap(), "3");
    }
}
