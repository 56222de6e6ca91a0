//! # APOD Viewer
//!
//! Shows NASA's Astronomy Picture of the Day for any date since the archive
//! began, and keeps a count of how many pictures were fetched today.
//!
//! ## Features
//! - Fetches the picture and its explanation for a chosen date
//! - Falls back to a placeholder for videos and other non-image formats
//! - Counts pictures fetched per calendar day, carried across restarts
//! - Remembers the "show on startup" and "limit range" preferences
//!
//! ## Architecture
//! - `apod.rs` - APOD API client (request building, response validation)
//! - `session.rs` - Session state machine and display command protocol
//! - `console.rs` - Terminal front-end (display sink, prompt, one-shot mode)
//! - `settings.rs` - Persisted session settings
//! - `counter.rs` - Per-day fetch counter and rollover
//! - `format.rs` - Displayable image format check
//! - `range.rs` - Selectable date window
//! - `config.rs` - Endpoint, API key and file locations
//!
//! ## CLI Usage
//! - No arguments: interactive session
//! - `--date`, `-d YYYY-MM-DD`: fetch one date and exit
//! - `--no-save`: keep settings in memory only
//! - `--api-key KEY`: store a NASA API key
//! - `--help`, `-h`: Show help message

mod apod;     // APOD API client
mod config;   // User configuration
mod console;  // Terminal front-end
mod counter;  // Images-fetched-today counter
mod format;   // Displayable format check
mod range;    // Calendar bounds
mod session;  // Session controller
mod settings; // Settings persistence

use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

use crate::apod::PictureFetcher;
use crate::config::AppConfig;
use crate::session::FetchState;
use crate::settings::{JsonFileStore, MemoryStore, SettingsStore};

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Interactive,
    Once(NaiveDate),
    SetApiKey(String),
    Help,
    Version,
}

#[derive(Debug, PartialEq, Eq)]
struct Options {
    mode: Mode,
    no_save: bool,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut mode = Mode::Interactive;
    let mut no_save = false;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--date" | "-d" => {
                let value = iter.next().ok_or("--date needs a YYYY-MM-DD value")?;
                let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map_err(|e| format!("Invalid date {value}: {e}"))?;
                mode = Mode::Once(date);
            }
            "--api-key" => {
                let value = iter.next().ok_or("--api-key needs a value")?;
                mode = Mode::SetApiKey(value.clone());
            }
            "--no-save" => no_save = true,
            "--help" | "-h" => mode = Mode::Help,
            "--version" | "-v" => mode = Mode::Version,
            other => return Err(format!("Unknown argument: {other}")),
        }
    }

    Ok(Options { mode, no_save })
}

/// Prints help message
fn print_help(program: &str) {
    println!("Astronomy Picture of the Day viewer\n");
    println!("Usage: {} [OPTIONS]\n", program);
    println!("Options:");
    println!("  (none)               Start an interactive session");
    println!("  --date, -d DATE      Show the picture for DATE (YYYY-MM-DD) and exit");
    println!("  --no-save            Do not read or write saved settings");
    println!("  --api-key KEY        Save a NASA API key (default: DEMO_KEY)");
    println!("  --version, -v        Show version information");
    println!("  --help, -h           Show this help message");
    println!();
    println!("The {} environment variable overrides the saved API key.", config::API_KEY_ENV);
    println!("Set RUST_LOG=debug for request logging.");
}

/// Logs go to stderr so they never mix with the picture output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_settings(config: &AppConfig, no_save: bool) -> SettingsStore {
    if no_save {
        return SettingsStore::new(MemoryStore::new());
    }
    match config.settings_file() {
        Some(path) => {
            let store = JsonFileStore::open(path);
            tracing::debug!(path = %store.path().display(), "using settings file");
            SettingsStore::new(store)
        }
        None => {
            tracing::warn!("no config directory available, settings will not be saved");
            SettingsStore::new(MemoryStore::new())
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("apod-viewer");

    let options = match parse_args(args.get(1..).unwrap_or_default()) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    match options.mode {
        Mode::Help => {
            print_help(program);
            return;
        }
        Mode::Version => {
            println!("apod-viewer {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        _ => {}
    }

    init_logging();
    let config = AppConfig::load();

    if let Mode::SetApiKey(key) = &options.mode {
        let updated = AppConfig {
            api_key: key.clone(),
            ..config
        };
        if let Err(e) = updated.save() {
            eprintln!("{e}");
            std::process::exit(1);
        }
        println!("API key saved.");
        return;
    }

    let fetcher = match PictureFetcher::from_config(&config) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let settings = open_settings(&config, options.no_save);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    match options.mode {
        Mode::Once(date) => {
            let state = rt.block_on(console::run_once(fetcher, settings, date));
            if state == FetchState::Failed {
                std::process::exit(1);
            }
        }
        _ => rt.block_on(console::run_interactive(fetcher, settings)),
    }
}
