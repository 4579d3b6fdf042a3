use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(wl_input::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(wl_input::config::invalid))]
    Invalid { message: String },

    #[error("Unknown key name(s) in {context}: {}", invalid_keys.join(", "))]
    #[diagnostic(
        code(wl_input::config::invalid_keys),
        help("use names like \"Esc\", \"PageUp\", \"Ctrl\" or raw evdev names such as \"KEY_F13\"")
    )]
    InvalidKeys {
        context: String,
        invalid_keys: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
