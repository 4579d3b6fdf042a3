//! Routes platform events to the input components
//!
//! The dispatcher owns the port and every piece of input state, and lends
//! the shared [`ModifierState`] to whichever component handles an event.
//! Events are processed strictly in delivery order, one at a time.

use wl_input_config::Config;

use crate::accessory::AccessoryBar;
use crate::bridge::{CursorAnchor, InputBridge, KeyDisposition};
use crate::event::{now_ms, port_time, KeyAction, KeyEvent, PlatformEvent};
use crate::keycode::android_keycode_to_linux;
use crate::modifiers::{Modifier, ModifierState};
use crate::passthrough::PassthroughMultitouch;
use crate::port::{Axis, EventInjectionPort, Injector};
use crate::touchpad::GestureRecognizer;

/// Result of dispatching one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    /// The event was handled
    Consumed,
    /// The event had no effect (unmapped key, unknown accessory button, ...)
    Ignored,
    /// The IME asked for the cursor position; report this anchor back
    CursorAnchor(CursorAnchor),
}

/// Owns the input layer for one compositor surface.
#[derive(Debug)]
pub struct InputDispatcher<P: EventInjectionPort> {
    port: P,
    modifiers: ModifierState,
    bridge: InputBridge,
    recognizer: GestureRecognizer,
    passthrough: PassthroughMultitouch,
    accessory_bar: AccessoryBar,
    touchpad_mode: bool,
}

impl<P: EventInjectionPort> InputDispatcher<P> {
    pub fn new(port: P, config: &Config) -> Self {
        tracing::debug!(
            "Input dispatcher created (touchpad mode: {})",
            config.global.touchpad_mode
        );
        Self {
            port,
            modifiers: ModifierState::new(),
            bridge: InputBridge::new(),
            recognizer: GestureRecognizer::new(),
            passthrough: PassthroughMultitouch::new(),
            accessory_bar: AccessoryBar::from_config(&config.accessory_bar),
            touchpad_mode: config.global.touchpad_mode,
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }

    pub fn modifiers(&self) -> &ModifierState {
        &self.modifiers
    }

    /// Mutable modifier state, e.g. to subscribe a UI observer.
    pub fn modifiers_mut(&mut self) -> &mut ModifierState {
        &mut self.modifiers
    }

    pub fn bridge(&self) -> &InputBridge {
        &self.bridge
    }

    pub fn recognizer(&self) -> &GestureRecognizer {
        &self.recognizer
    }

    pub fn accessory_bar(&self) -> &AccessoryBar {
        &self.accessory_bar
    }

    pub fn touchpad_mode(&self) -> bool {
        self.touchpad_mode
    }

    /// Switch between touchpad and direct touch. Drops any gesture in
    /// progress.
    pub fn set_touchpad_mode(&mut self, enabled: bool) {
        if self.touchpad_mode != enabled {
            tracing::info!("Touchpad mode {}", if enabled { "enabled" } else { "disabled" });
            self.recognizer.reset();
        }
        self.touchpad_mode = enabled;
    }

    /// Process one platform event.
    pub fn dispatch(&mut self, event: PlatformEvent) -> Dispatch {
        match event {
            PlatformEvent::CommitText { text, time_ms } => {
                let time = port_time(time_ms.unwrap_or_else(now_ms));
                self.bridge
                    .commit_text(&mut self.port, &mut self.modifiers, &text, time);
            }
            PlatformEvent::SetComposingText { text } => {
                self.bridge.set_composing_text(&mut self.port, &text);
            }
            PlatformEvent::FinishComposingText => {
                self.bridge.finish_composing_text(&mut self.port);
            }
            PlatformEvent::DeleteSurroundingText {
                before,
                after,
                time_ms,
            } => {
                let time = port_time(time_ms.unwrap_or_else(now_ms));
                self.bridge.delete_surrounding_text(
                    &mut self.port,
                    &mut self.modifiers,
                    before,
                    after,
                    time,
                );
            }
            PlatformEvent::CommitCorrection { old_text, new_text } => {
                self.bridge
                    .commit_correction(&mut self.port, &old_text, &new_text);
            }
            PlatformEvent::ImeKey(key_event) => {
                let disposition =
                    self.bridge
                        .send_key_event(&mut self.port, &mut self.modifiers, &key_event);
                if disposition == KeyDisposition::Forward {
                    return self.hardware_key(&key_event);
                }
            }
            PlatformEvent::Key(key_event) => return self.hardware_key(&key_event),
            PlatformEvent::Touch(touch) => {
                if self.touchpad_mode {
                    self.recognizer.handle(&mut self.port, &touch);
                } else {
                    self.passthrough.handle(&mut self.port, &touch);
                }
            }
            PlatformEvent::Scroll {
                vertical,
                horizontal,
                time_ms,
            } => {
                if vertical == 0.0 && horizontal == 0.0 {
                    return Dispatch::Ignored;
                }
                let time = port_time(time_ms);
                let mut out = Injector::new(&mut self.port);
                if vertical != 0.0 {
                    out.pointer_axis(Axis::Vertical, vertical, time);
                }
                if horizontal != 0.0 {
                    out.pointer_axis(Axis::Horizontal, horizontal, time);
                }
            }
            PlatformEvent::ModifierTap { modifier, time_ms } => {
                self.modifiers
                    .tap_at(modifier, time_ms.unwrap_or_else(now_ms));
            }
            PlatformEvent::AccessoryKey { key, time_ms } => {
                let now = time_ms.unwrap_or_else(now_ms);
                if !self
                    .accessory_bar
                    .press(&mut self.port, &mut self.modifiers, &key, now)
                {
                    return Dispatch::Ignored;
                }
            }
            PlatformEvent::FocusChanged { focused } => {
                tracing::debug!("Keyboard focus {}", if focused { "gained" } else { "lost" });
                Injector::new(&mut self.port).keyboard_focus(focused);
                if !focused {
                    self.bridge.reset();
                    self.recognizer.reset();
                }
            }
            PlatformEvent::RequestCursorUpdates { mode } => {
                return match self.bridge.request_cursor_updates(&mut self.port, mode) {
                    Some(anchor) => Dispatch::CursorAnchor(anchor),
                    None => Dispatch::Consumed,
                };
            }
        }

        Dispatch::Consumed
    }

    /// Key event from the view (hardware keyboard or forwarded IME key).
    fn hardware_key(&mut self, event: &KeyEvent) -> Dispatch {
        let Some(key) = android_keycode_to_linux(event.keycode) else {
            tracing::debug!("Dropping unmapped Android keycode {}", event.keycode);
            return Dispatch::Ignored;
        };
        let time = event.port_time();
        let mut out = Injector::new(&mut self.port);

        match event.action {
            KeyAction::Down => {
                out.press_key(key, time);
                if Modifier::from_key(key).is_none() {
                    self.modifiers.clear_sticky_modifiers();
                }
            }
            KeyAction::Up => out.release_key(key, time),
        }

        Dispatch::Consumed
    }
}
