//! KDL configuration parser

use std::path::Path;

use crate::error::ConfigError;
use crate::model::*;

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl ships its own miette version, so rebuild the span by hand
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "accessory-bar" => {
                config.accessory_bar = parse_accessory_bar(node)?;
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "log-level" => {
                    if let Some(val) = first_string(child) {
                        global.log_level = val
                            .parse()
                            .map_err(|e| ConfigError::Invalid { message: e })?;
                    }
                }
                "touchpad-mode" => {
                    // A bare `touchpad-mode` node means enabled
                    global.touchpad_mode = match child.entries().first() {
                        None => true,
                        Some(entry) => entry.value().as_bool().ok_or_else(|| {
                            ConfigError::Invalid {
                                message: format!(
                                    "touchpad-mode expects true or false, got {}",
                                    entry.value()
                                ),
                            }
                        })?,
                    };
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_accessory_bar(node: &kdl::KdlNode) -> Result<AccessoryBarConfig, ConfigError> {
    let mut rows = Vec::new();
    let mut invalid_keys = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "row" => {
                    let mut row = Vec::new();
                    for entry in child.entries() {
                        let Some(name) = entry.value().as_string() else {
                            return Err(ConfigError::Invalid {
                                message: format!(
                                    "accessory-bar row entries must be strings, got {}",
                                    entry.value()
                                ),
                            });
                        };
                        if !is_valid_key(name) {
                            invalid_keys.push(name.to_string());
                        }
                        row.push(name.to_string());
                    }
                    if row.is_empty() {
                        return Err(ConfigError::Invalid {
                            message: format!("accessory-bar row {} is empty", rows.len() + 1),
                        });
                    }
                    rows.push(row);
                }
                name => {
                    tracing::warn!("Unknown accessory-bar option: {}", name);
                }
            }
        }
    }

    if !invalid_keys.is_empty() {
        return Err(ConfigError::InvalidKeys {
            context: "accessory-bar".to_string(),
            invalid_keys,
        });
    }

    // An accessory-bar block without rows keeps the stock layout
    if rows.is_empty() {
        return Ok(AccessoryBarConfig::default());
    }

    Ok(AccessoryBarConfig { rows })
}

fn first_string(node: &kdl::KdlNode) -> Option<&str> {
    node.entries().first().and_then(|e| e.value().as_string())
}

/// Check if a key name is recognized
///
/// Returns true if the key is recognized, false otherwise
/// NOTE: This must stay in sync with parse_key() in wl-input-core/src/keycode.rs
pub fn is_valid_key(name: &str) -> bool {
    match name.to_uppercase().as_str() {
        // Special keys
        "ESCAPE" | "ESC" => true,
        "ENTER" | "RETURN" => true,
        "TAB" => true,
        "SPACE" => true,
        "BACKSPACE" => true,

        // Letters
        "A" | "B" | "C" | "D" | "E" | "F" | "G" | "H" | "I" | "J" | "K" | "L" | "M" | "N" | "O"
        | "P" | "Q" | "R" | "S" | "T" | "U" | "V" | "W" | "X" | "Y" | "Z" => true,

        // Number keys
        "0" | "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9" => true,

        // Modifiers (become accessory toggles)
        "CTRL" | "CONTROL" => true,
        "SHIFT" => true,
        "ALT" => true,
        "SUPER" | "META" | "LOGO" | "WIN" => true,

        // Symbol keys
        "MINUS" | "-" => true,
        "EQUALS" | "EQUAL" | "=" => true,
        "LEFTBRACE" | "LBRACE" | "[" => true,
        "RIGHTBRACE" | "RBRACE" | "]" => true,
        "SEMICOLON" | ";" => true,
        "APOSTROPHE" | "'" => true,
        "GRAVE" | "`" => true,
        "BACKSLASH" | "\\" => true,
        "COMMA" | "," => true,
        "DOT" | "PERIOD" | "." => true,
        "SLASH" | "/" => true,

        // Arrow keys
        "UP" | "DOWN" | "LEFT" | "RIGHT" => true,

        // Navigation keys
        "HOME" => true,
        "END" => true,
        "PAGEUP" | "PGUP" => true,
        "PAGEDOWN" | "PGDN" | "PGDOWN" => true,
        "INSERT" | "INS" => true,
        "DELETE" | "DEL" => true,

        // Function keys F1-F12
        "F1" | "F2" | "F3" | "F4" | "F5" | "F6" | "F7" | "F8" | "F9" | "F10" | "F11" | "F12" => true,

        other => {
            // Raw kernel names are resolved by evdev in the core crate
            other.starts_with("KEY_") && other.len() > 4
        }
    }
}
