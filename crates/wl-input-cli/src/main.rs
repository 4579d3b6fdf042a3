//! wl-input CLI
//!
//! Configuration checker and debugging tool for the wl-input translation
//! layer.

mod uinput;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;
use wl_input_config::Config;
use wl_input_core::{
    keycode, AccessoryBar, AccessoryItem, Dispatch, EventInjectionPort, InputDispatcher,
    PlatformEvent, PortCall, RecordingPort,
};

use crate::uinput::UinputPort;

#[derive(Parser, Debug)]
#[command(name = "wl-input")]
#[command(about = "Touch, key and IME input translation for a mobile Wayland compositor")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/wl-input/config.kdl")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// Show the evdev key sequence for each character of TEXT
    Map {
        text: String,
    },

    /// List the resolved accessory-bar layout
    Keys,

    /// Replay a JSON-lines file of platform events through the input layer
    Replay {
        file: PathBuf,

        /// Force touchpad mode on
        #[arg(long, conflicts_with = "no_touchpad")]
        touchpad: bool,

        /// Force touchpad mode off
        #[arg(long)]
        no_touchpad: bool,

        /// Inject into a uinput virtual device instead of printing port calls
        #[arg(long)]
        uinput: bool,
    },
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();

    init_tracing(&config_path);

    match cli.command {
        Commands::Validate => cmd_validate(&config_path),
        Commands::Map { text } => cmd_map(&text),
        Commands::Keys => cmd_keys(&config_path),
        Commands::Replay {
            file,
            touchpad,
            no_touchpad,
            uinput,
        } => {
            let mode = match (touchpad, no_touchpad) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            cmd_replay(&config_path, &file, mode, uinput)
        }
    }
}

/// `RUST_LOG` wins; otherwise use the configured log level, or `warn` when
/// there is no usable configuration.
fn init_tracing(config_path: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = wl_input_config::parse_config(config_path)
            .map(|config| config.global.log_level.as_filter())
            .unwrap_or("warn");
        EnvFilter::new(level)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the configuration, falling back to defaults when the file does not
/// exist.
fn load_config(config_path: &Path) -> miette::Result<Config> {
    if !config_path.exists() {
        tracing::info!(
            "No configuration at {}, using defaults",
            config_path.display()
        );
        return Ok(Config::default());
    }
    wl_input_config::parse_config(config_path).map_err(miette::Report::new)
}

fn cmd_validate(config_path: &Path) -> miette::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = wl_input_config::parse_config(config_path).map_err(miette::Report::new)?;

    println!("Configuration is valid!");
    println!("  Log level: {}", config.global.log_level.as_filter());
    println!(
        "  Touchpad mode: {}",
        if config.global.touchpad_mode { "on" } else { "off" }
    );
    println!("  Accessory bar: {} row(s)", config.accessory_bar.rows.len());
    for row in &config.accessory_bar.rows {
        println!("    - {}", row.join(" "));
    }
    Ok(())
}

fn cmd_map(text: &str) -> miette::Result<()> {
    for line in describe_mappings(text) {
        println!("{}", line);
    }
    Ok(())
}

/// One line per character: its key (with Shift if needed) or the fact that
/// it can only be committed as text.
fn describe_mappings(text: &str) -> Vec<String> {
    text.chars()
        .map(|ch| match keycode::map(ch) {
            Some(mapping) => format!(
                "{:?} -> {}{:?} ({})",
                ch,
                if mapping.needs_shift { "Shift+" } else { "" },
                mapping.key,
                mapping.keycode()
            ),
            None => format!("{:?} -> unmapped (text-input only)", ch),
        })
        .collect()
}

fn cmd_keys(config_path: &Path) -> miette::Result<()> {
    let config = load_config(config_path)?;
    let bar = AccessoryBar::from_config(&config.accessory_bar);

    for (index, row) in bar.rows().iter().enumerate() {
        println!("Row {}:", index + 1);
        for item in row {
            match item {
                AccessoryItem::Key { label, key } => {
                    println!("  {:<10} key {:?} ({})", label, key, key.code())
                }
                AccessoryItem::Modifier { label, modifier } => {
                    println!("  {:<10} modifier toggle {}", label, modifier)
                }
            }
        }
    }
    Ok(())
}

fn cmd_replay(
    config_path: &Path,
    file: &Path,
    touchpad_mode: Option<bool>,
    use_uinput: bool,
) -> miette::Result<()> {
    let config = load_config(config_path)?;
    let script = std::fs::read_to_string(file).into_diagnostic()?;
    let events = parse_script(&script)?;
    tracing::info!("Replaying {} event(s) from {}", events.len(), file.display());

    if use_uinput {
        let port = UinputPort::new("wl-input").map_err(|e| miette::miette!("{:#}", e))?;
        let mut dispatcher = InputDispatcher::new(port, &config);
        let ignored = replay(&mut dispatcher, touchpad_mode, events);
        println!("Replay finished ({} event(s) ignored)", ignored);
        return Ok(());
    }

    let mut dispatcher = InputDispatcher::new(RecordingPort::new(), &config);
    replay(&mut dispatcher, touchpad_mode, events);
    let calls = dispatcher.into_port().take();

    let stdout = std::io::stdout();
    write_calls(&mut stdout.lock(), &calls)
}

/// Parse a JSON-lines event script. Blank lines and `#` comments are
/// skipped.
fn parse_script(script: &str) -> miette::Result<Vec<PlatformEvent>> {
    let mut events = Vec::new();
    for (index, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(line)
            .map_err(|e| miette::miette!("line {}: invalid event: {}", index + 1, e))?;
        events.push(event);
    }
    Ok(events)
}

/// Dispatch every event in order and return how many were ignored.
fn replay<P: EventInjectionPort>(
    dispatcher: &mut InputDispatcher<P>,
    touchpad_mode: Option<bool>,
    events: Vec<PlatformEvent>,
) -> usize {
    if let Some(enabled) = touchpad_mode {
        dispatcher.set_touchpad_mode(enabled);
    }

    let mut ignored = 0;
    for event in events {
        match dispatcher.dispatch(event) {
            Dispatch::Consumed => {}
            Dispatch::Ignored => ignored += 1,
            Dispatch::CursorAnchor(anchor) => {
                tracing::info!(
                    "Cursor anchor: x={} top={} bottom={}",
                    anchor.x,
                    anchor.top,
                    anchor.bottom
                );
            }
        }
    }
    ignored
}

fn write_calls<W: Write>(out: &mut W, calls: &[PortCall]) -> miette::Result<()> {
    for call in calls {
        let line = serde_json::to_string(call).into_diagnostic()?;
        writeln!(out, "{}", line).into_diagnostic()?;
    }
    Ok(())
}
