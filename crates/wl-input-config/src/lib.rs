//! Configuration parsing for wl-input
//!
//! This crate handles parsing the KDL configuration file that selects the
//! touch handling mode, the log level and the accessory bar layout.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{is_valid_key, parse_config, parse_config_str};
