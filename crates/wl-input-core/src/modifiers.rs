//! Sticky/locked modifier state shared by every input source
//!
//! # Tap State Machine
//!
//! Each of the four modifiers cycles through three visible states when its
//! accessory-bar button is tapped:
//!
//! ```text
//!   ┌──────────┐   tap    ┌──────────┐  tap < 400ms  ┌──────────┐
//!   │ INACTIVE │ ───────► │  STICKY  │ ────────────► │  LOCKED  │
//!   └──────────┘          └──────────┘               └──────────┘
//!        ▲                     │ tap >= 400ms              │ tap
//!        └─────────────────────┴───────────────────────────┘
//! ```
//!
//! - **Sticky** modifiers apply to the next key or commit and are then
//!   released by [`ModifierState::clear_sticky_modifiers`].
//! - **Locked** modifiers persist until tapped again.
//!
//! The double-tap window is measured between tap timestamps; there is no
//! timer. The last tap time is recorded on every tap, whichever branch runs.
//!
//! The state is an explicit object: the dispatcher owns it and lends it to the
//! IME bridge, the accessory bar and the hardware key path. UI code observes
//! it through [`ModifierState::subscribe`].

use std::fmt;

use evdev::Key;
use serde::{Deserialize, Serialize};

use crate::event::now_ms;

/// Window in which a second tap locks a sticky modifier.
pub const DOUBLE_TAP_THRESHOLD_MS: u64 = 400;

/// Normalized modifier key.
///
/// Left and right variants of hardware keys collapse onto the same modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Shift,
    Ctrl,
    Alt,
    Super,
}

impl Modifier {
    /// Every modifier, in the order their key events are emitted.
    pub const ALL: [Modifier; 4] = [Modifier::Shift, Modifier::Ctrl, Modifier::Alt, Modifier::Super];

    /// Check if an evdev key is a modifier and return its normalized form.
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => Some(Modifier::Ctrl),
            Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => Some(Modifier::Shift),
            Key::KEY_LEFTALT | Key::KEY_RIGHTALT => Some(Modifier::Alt),
            Key::KEY_LEFTMETA | Key::KEY_RIGHTMETA => Some(Modifier::Super),
            _ => None,
        }
    }

    /// Parse a modifier name string (case-insensitive).
    ///
    /// Recognized names:
    /// - Ctrl: "ctrl", "control"
    /// - Shift: "shift"
    /// - Alt: "alt"
    /// - Super: "super", "meta", "logo", "win"
    pub fn from_str_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "CTRL" | "CONTROL" => Some(Modifier::Ctrl),
            "SHIFT" => Some(Modifier::Shift),
            "ALT" => Some(Modifier::Alt),
            "SUPER" | "META" | "LOGO" | "WIN" => Some(Modifier::Super),
            _ => None,
        }
    }

    /// The evdev key injected for this modifier (left variant).
    pub fn to_key(self) -> Key {
        match self {
            Modifier::Ctrl => Key::KEY_LEFTCTRL,
            Modifier::Shift => Key::KEY_LEFTSHIFT,
            Modifier::Alt => Key::KEY_LEFTALT,
            Modifier::Super => Key::KEY_LEFTMETA,
        }
    }

    /// XKB modifier mask bit for this modifier.
    pub fn xkb_bit(self) -> u32 {
        match self {
            Modifier::Shift => 1 << 0,
            Modifier::Ctrl => 1 << 2,
            Modifier::Alt => 1 << 3,
            Modifier::Super => 1 << 6,
        }
    }

    fn index(self) -> usize {
        match self {
            Modifier::Shift => 0,
            Modifier::Ctrl => 1,
            Modifier::Alt => 2,
            Modifier::Super => 3,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Ctrl => write!(f, "Ctrl"),
            Modifier::Shift => write!(f, "Shift"),
            Modifier::Alt => write!(f, "Alt"),
            Modifier::Super => write!(f, "Super"),
        }
    }
}

/// State of a single modifier. `locked` implies `active`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModifierLatch {
    pub active: bool,
    pub locked: bool,
    pub last_tap_ms: u64,
}

impl ModifierLatch {
    /// Active for the next key only.
    pub fn is_sticky(&self) -> bool {
        self.active && !self.locked
    }
}

/// Handle returned by [`ModifierState::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(Modifier, ModifierLatch)>;

/// Sticky/locked state of Shift, Ctrl, Alt and Super.
#[derive(Default)]
pub struct ModifierState {
    latches: [ModifierLatch; 4],
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl fmt::Debug for ModifierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierState")
            .field("latches", &self.latches)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of one modifier.
    pub fn get(&self, modifier: Modifier) -> ModifierLatch {
        self.latches[modifier.index()]
    }

    pub fn is_active(&self, modifier: Modifier) -> bool {
        self.get(modifier).active
    }

    pub fn is_locked(&self, modifier: Modifier) -> bool {
        self.get(modifier).locked
    }

    /// Tap a modifier using the wall clock.
    pub fn tap(&mut self, modifier: Modifier) -> ModifierLatch {
        self.tap_at(modifier, now_ms())
    }

    /// Tap a modifier at the given time (milliseconds, any monotonic origin).
    ///
    /// | current          | condition       | next             |
    /// |------------------|-----------------|------------------|
    /// | inactive         |                 | sticky           |
    /// | sticky           | elapsed < 400ms | locked           |
    /// | sticky           | elapsed >= 400ms| inactive         |
    /// | locked           |                 | inactive         |
    pub fn tap_at(&mut self, modifier: Modifier, now_ms: u64) -> ModifierLatch {
        let previous = self.get(modifier);
        let elapsed = now_ms.saturating_sub(previous.last_tap_ms);

        let (active, locked) = match (previous.active, previous.locked) {
            (_, true) => (false, false),
            (true, false) if elapsed < DOUBLE_TAP_THRESHOLD_MS => (true, true),
            (true, false) => (false, false),
            (false, false) => (true, false),
        };

        let next = ModifierLatch {
            active,
            locked,
            last_tap_ms: now_ms,
        };
        tracing::debug!(
            "{} tap: active={} locked={} (elapsed {}ms)",
            modifier,
            active,
            locked,
            elapsed
        );
        self.set(modifier, next);
        next
    }

    /// Release every sticky modifier; locked modifiers are untouched.
    pub fn clear_sticky_modifiers(&mut self) {
        for modifier in Modifier::ALL {
            let latch = self.get(modifier);
            if latch.is_sticky() {
                self.set(
                    modifier,
                    ModifierLatch {
                        active: false,
                        ..latch
                    },
                );
            }
        }
    }

    pub fn has_active_modifiers(&self) -> bool {
        self.latches.iter().any(|latch| latch.active)
    }

    /// Active modifiers in emission order (Shift, Ctrl, Alt, Super).
    pub fn active_modifiers(&self) -> Vec<Modifier> {
        Modifier::ALL
            .into_iter()
            .filter(|m| self.is_active(*m))
            .collect()
    }

    /// XKB depressed-modifier mask for the active modifiers.
    pub fn xkb_mod_mask(&self) -> u32 {
        Modifier::ALL
            .into_iter()
            .filter(|m| self.is_active(*m))
            .fold(0, |mask, m| mask | m.xkb_bit())
    }

    /// Register an observer called with the new state of every modifier
    /// whose active/locked flags change.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(Modifier, ModifierLatch) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    fn set(&mut self, modifier: Modifier, next: ModifierLatch) {
        let slot = &mut self.latches[modifier.index()];
        let changed = slot.active != next.active || slot.locked != next.locked;
        *slot = next;

        if changed {
            for (_, observer) in self.observers.iter_mut() {
                observer(modifier, next);
            }
        }
    }
}
