//! Accessory bar: extra keys shown above the on-screen keyboard
//!
//! Each button is either a plain key (Esc, arrows, ...) or a modifier
//! toggle. Modifier toggles drive [`ModifierState::tap_at`]; plain keys are
//! injected wrapped in the currently active modifiers.

use evdev::Key;
use wl_input_config::AccessoryBarConfig;

use crate::event::port_time;
use crate::keycode::parse_key;
use crate::modifiers::{Modifier, ModifierState};
use crate::port::{EventInjectionPort, Injector};

/// One accessory-bar button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessoryItem {
    Key { label: String, key: Key },
    Modifier { label: String, modifier: Modifier },
}

impl AccessoryItem {
    /// Resolve a configured key name. Modifier names become toggles.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(modifier) = Modifier::from_str_name(name) {
            return Some(AccessoryItem::Modifier {
                label: name.to_string(),
                modifier,
            });
        }
        parse_key(name).map(|key| AccessoryItem::Key {
            label: name.to_string(),
            key,
        })
    }

    pub fn label(&self) -> &str {
        match self {
            AccessoryItem::Key { label, .. } | AccessoryItem::Modifier { label, .. } => label,
        }
    }
}

/// Resolved accessory-bar layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryBar {
    rows: Vec<Vec<AccessoryItem>>,
}

impl Default for AccessoryBar {
    fn default() -> Self {
        Self::from_config(&AccessoryBarConfig::default())
    }
}

impl AccessoryBar {
    /// Build the bar from configuration.
    ///
    /// Names that fail to resolve are logged and skipped; rows left empty
    /// are dropped.
    pub fn from_config(config: &AccessoryBarConfig) -> Self {
        let mut rows = Vec::new();

        for names in &config.rows {
            let mut row = Vec::new();
            for name in names {
                match AccessoryItem::from_name(name) {
                    Some(item) => row.push(item),
                    None => tracing::warn!("Unknown accessory-bar key '{}', skipping", name),
                }
            }
            if !row.is_empty() {
                rows.push(row);
            }
        }

        tracing::debug!("Accessory bar has {} rows", rows.len());
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<AccessoryItem>] {
        &self.rows
    }

    /// Find a button by label (case-insensitive).
    pub fn find(&self, label: &str) -> Option<&AccessoryItem> {
        self.rows
            .iter()
            .flatten()
            .find(|item| item.label().eq_ignore_ascii_case(label))
    }

    /// Press the button with the given label. Returns false if the bar has
    /// no such button.
    pub fn press<P: EventInjectionPort + ?Sized>(
        &self,
        port: &mut P,
        modifiers: &mut ModifierState,
        label: &str,
        now_ms: u64,
    ) -> bool {
        match self.find(label) {
            Some(AccessoryItem::Key { key, .. }) => {
                send_accessory_key(port, modifiers, *key, port_time(now_ms));
                true
            }
            Some(AccessoryItem::Modifier { modifier, .. }) => {
                modifiers.tap_at(*modifier, now_ms);
                true
            }
            None => {
                tracing::debug!("No accessory-bar button labelled '{}'", label);
                false
            }
        }
    }
}

/// Tap `key` wrapped in the active modifiers, then release sticky ones.
pub fn send_accessory_key<P: EventInjectionPort + ?Sized>(
    port: &mut P,
    modifiers: &mut ModifierState,
    key: Key,
    time_ms: u32,
) {
    let active = modifiers.active_modifiers();
    let mut out = Injector::new(port);

    for modifier in &active {
        out.press_key(modifier.to_key(), time_ms);
    }
    out.tap_key(key, time_ms);
    for modifier in &active {
        out.release_key(modifier.to_key(), time_ms);
    }

    modifiers.clear_sticky_modifiers();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::RecordingPort;

    #[test]
    fn test_default_bar_layout() {
        let bar = AccessoryBar::default();
        assert_eq!(bar.rows().len(), 2);
        assert_eq!(bar.rows()[0].len(), 9);
        assert_eq!(bar.rows()[1].len(), 8);

        assert_eq!(
            bar.find("esc"),
            Some(&AccessoryItem::Key {
                label: "Esc".to_string(),
                key: Key::KEY_ESC
            })
        );
        assert_eq!(
            bar.find("Super"),
            Some(&AccessoryItem::Modifier {
                label: "Super".to_string(),
                modifier: Modifier::Super
            })
        );
        assert!(bar.find("F5").is_none());
    }

    #[test]
    fn test_unknown_names_are_skipped() {
        let config = AccessoryBarConfig {
            rows: vec![
                vec!["Tab".to_string(), "Hyper".to_string()],
                vec!["Compose".to_string()],
            ],
        };
        let bar = AccessoryBar::from_config(&config);

        assert_eq!(bar.rows().len(), 1);
        assert_eq!(bar.rows()[0].len(), 1);
        assert_eq!(bar.rows()[0][0].label(), "Tab");
    }

    #[test]
    fn test_key_wrapped_in_active_modifiers() {
        let mut port = RecordingPort::new();
        let mut modifiers = ModifierState::new();
        modifiers.tap_at(Modifier::Alt, 0);
        modifiers.tap_at(Modifier::Shift, 0);

        send_accessory_key(&mut port, &mut modifiers, Key::KEY_TAB, 9);

        assert_eq!(
            port.key_events(),
            vec![
                (42, true),
                (56, true),
                (15, true),
                (15, false),
                (42, false),
                (56, false),
            ]
        );
        assert!(!modifiers.has_active_modifiers());
    }

    #[test]
    fn test_press_modifier_taps_state() {
        let mut port = RecordingPort::new();
        let mut modifiers = ModifierState::new();
        let bar = AccessoryBar::default();

        assert!(bar.press(&mut port, &mut modifiers, "Ctrl", 1_000));
        assert!(bar.press(&mut port, &mut modifiers, "ctrl", 1_200));

        assert!(modifiers.is_locked(Modifier::Ctrl));
        assert!(port.calls().is_empty());
    }

    #[test]
    fn test_press_key_keeps_locked_modifier() {
        let mut port = RecordingPort::new();
        let mut modifiers = ModifierState::new();
        let bar = AccessoryBar::default();

        bar.press(&mut port, &mut modifiers, "Ctrl", 1_000);
        bar.press(&mut port, &mut modifiers, "Ctrl", 1_100);
        assert!(bar.press(&mut port, &mut modifiers, "Up", 1_500));

        assert_eq!(
            port.key_events(),
            vec![(29, true), (103, true), (103, false), (29, false)]
        );
        assert!(modifiers.is_locked(Modifier::Ctrl));
    }

    #[test]
    fn test_press_unknown_label() {
        let mut port = RecordingPort::new();
        let mut modifiers = ModifierState::new();
        assert!(!AccessoryBar::default().press(&mut port, &mut modifiers, "Nope", 0));
        assert!(port.calls().is_empty());
    }
}
