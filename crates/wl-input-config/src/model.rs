//! Configuration data model

use serde::Serialize;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub global: GlobalConfig,
    pub accessory_bar: AccessoryBarConfig,
}

/// Global settings
#[derive(Debug, Clone, Default, Serialize)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
    /// Map touches to indirect pointer gestures instead of forwarding them
    /// as multi-touch.
    pub touchpad_mode: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Layout of the on-screen accessory bar shown above the soft keyboard.
///
/// Each row is a list of key names. Modifier names (`Shift`, `Ctrl`, `Alt`,
/// `Super`) become sticky/lock toggles, every other name is a plain key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryBarConfig {
    pub rows: Vec<Vec<String>>,
}

impl Default for AccessoryBarConfig {
    fn default() -> Self {
        let row = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Self {
            rows: vec![
                row(&[
                    "Esc", "Grave", "Tab", "Slash", "Minus", "Home", "Up", "End", "PageUp",
                ]),
                row(&[
                    "Shift", "Ctrl", "Alt", "Super", "Left", "Down", "Right", "PageDown",
                ]),
            ],
        }
    }
}
