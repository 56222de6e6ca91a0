//! # Terminal Front-end
//!
//! Plays the part of the picture viewer's window on a terminal:
//! - [`ConsoleSink`] prints the display commands the session controller emits
//! - [`run_interactive`] turns typed lines into date-selection and checkbox events
//! - [`run_once`] fetches a single date and exits
//!
//! ## Event loop
//! Fetches never run on the loop itself. Each selection spawns a tokio task
//! that performs the HTTP request and sends its result back over a channel,
//! so the prompt keeps accepting input while a request is in flight:
//!
//! ```text
//!   stdin ──► Command ──► SessionController::select_date ──► tokio::spawn(fetch)
//!                                  ▲                                   │
//!                                  └──── complete_fetch ◄── mpsc ◄─────┘
//! ```
//!
//! Leaving the prompt (`quit`, end of input) waits for the fetch still in
//! flight, then counts as losing focus and flushes the session to the
//! settings store.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::apod::{FetchError, HttpTransport, PictureFetcher, PictureRecord};
use crate::range::DateWindow;
use crate::session::{
    local_today, Checkbox, Clock, DisplayError, DisplaySink, FetchState, FetchTicket,
    SessionController,
};
use crate::settings::SettingsStore;

/// Prints display commands to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    /// Last image URL shown, for the `status` command.
    image: Option<String>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySink for ConsoleSink {
    fn set_image(&mut self, url: &str) -> Result<(), DisplayError> {
        // A terminal can only hand the link on; anything but http(s) is unusable
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(DisplayError(format!("Cannot open image at {url}")));
        }
        println!("Image: {url}");
        self.image = Some(url.to_string());
        Ok(())
    }

    fn set_copyright_text(&mut self, text: &str) {
        println!("Copyright: {text}");
    }

    fn set_explanation_text(&mut self, text: &str) {
        if !text.is_empty() {
            println!("\n{text}\n");
        }
    }

    fn set_image_count_text(&mut self, text: &str) {
        println!("Images today: {text}");
    }

    fn set_checkbox(&mut self, checkbox: Checkbox, checked: bool) {
        let mark = if checked { "x" } else { " " };
        println!("[{mark}] {}", checkbox.name());
    }

    fn set_calendar_bounds(&mut self, window: DateWindow) {
        println!("Dates available: {} to {}", window.min, window.max);
    }

    fn set_selected_date(&mut self, date: NaiveDate) {
        println!("Date: {date}");
    }
}

/// One line of user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Select(NaiveDate),
    Today,
    Launch,
    Toggle(Checkbox, bool),
    Save,
    Status,
    Help,
    Quit,
}

/// Parses a line typed at the prompt.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let first = words.next().ok_or_else(|| "Empty command".to_string())?;
    let rest: Vec<&str> = words.collect();

    let command = match (first.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("today", []) => Command::Today,
        ("launch", []) => Command::Launch,
        ("save", []) => Command::Save,
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        ("limit", [value]) => Command::Toggle(Checkbox::LimitRange, parse_switch(value)?),
        ("startup", [value]) => Command::Toggle(Checkbox::ShowOnStartup, parse_switch(value)?),
        (_, []) => NaiveDate::parse_from_str(first, "%Y-%m-%d")
            .map(Command::Select)
            .map_err(|_| format!("Unknown command or date: {first}"))?,
        _ => return Err(format!("Unexpected arguments: {line}")),
    };

    Ok(command)
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => Err(format!("Expected on or off, got {other}")),
    }
}

fn print_commands() {
    println!("Commands:");
    println!("  YYYY-MM-DD         Show the picture for that date");
    println!("  today              Show today's picture");
    println!("  launch             Jump to the first APOD (1995-06-16)");
    println!("  limit on|off       Limit the calendar to the current year");
    println!("  startup on|off     Show today's picture on startup");
    println!("  save               Save settings now");
    println!("  status             Show the current session");
    println!("  quit               Save and exit");
}

type FetchOutcome = (FetchTicket, Result<PictureRecord, FetchError>);

/// Runs the request for `ticket` in the background and reports back on `tx`.
fn spawn_fetch<T>(
    fetcher: &Arc<PictureFetcher<T>>,
    tx: &mpsc::UnboundedSender<FetchOutcome>,
    ticket: FetchTicket,
) where
    T: HttpTransport + 'static,
{
    println!("Fetching picture for {}...", ticket.date());
    debug!(seq = ticket.seq(), "spawning fetch");
    let fetcher = fetcher.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = fetcher.fetch(ticket.date()).await;
        // The receiver is gone only when the prompt has exited
        let _ = tx.send((ticket, result));
    });
}

fn save(controller: &mut SessionController<ConsoleSink>) {
    match controller.focus_lost() {
        Ok(()) => info!("settings saved"),
        Err(e) => warn!(error = %e, "failed to save settings"),
    }
}

fn print_status(controller: &SessionController<ConsoleSink>) {
    let session = controller.session();
    let state = match controller.state() {
        FetchState::Idle => "idle".to_string(),
        FetchState::Fetching { date, .. } => format!("fetching {date}"),
        FetchState::Displayed { degraded: false } => "displayed".to_string(),
        FetchState::Displayed { degraded: true } => "displayed (unsupported format)".to_string(),
        FetchState::Failed => "failed".to_string(),
    };
    println!(
        "Date: {}",
        session
            .selected_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("State: {state}");
    if let Some(url) = &controller.sink().image {
        println!("Image: {url}");
    }
    println!("Images today: {}", session.images_fetched_today);
    let window = controller.window();
    println!("Dates available: {} to {}", window.min, window.max);
}

/// Interactive session on stdin/stdout.
pub async fn run_interactive<T>(fetcher: PictureFetcher<T>, settings: SettingsStore)
where
    T: HttpTransport + 'static,
{
    let input = BufReader::new(tokio::io::stdin());
    run_prompt(fetcher, settings, input, Box::new(local_today)).await;
}

/// Runs the prompt over `input` until `quit` or end of input, then waits for
/// the fetch still in flight before saving. Returns the finished controller.
async fn run_prompt<T, R>(
    fetcher: PictureFetcher<T>,
    settings: SettingsStore,
    input: R,
    clock: Clock,
) -> SessionController<ConsoleSink>
where
    T: HttpTransport + 'static,
    R: AsyncBufRead + Unpin,
{
    let fetcher = Arc::new(fetcher);
    let (tx, mut rx) = mpsc::unbounded_channel::<FetchOutcome>();

    println!("Astronomy Picture of the Day (type 'help' for commands)");
    let mut controller = SessionController::new(settings, ConsoleSink::new(), clock);
    if let Some(ticket) = controller.startup_fetch() {
        spawn_fetch(&fetcher, &tx, ticket);
    }

    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "failed to read input");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                match parse_command(&line) {
                    Ok(Command::Select(date)) => {
                        let ticket = controller.select_date(date);
                        spawn_fetch(&fetcher, &tx, ticket);
                    }
                    Ok(Command::Today) => {
                        let ticket = controller.select_date(local_today());
                        spawn_fetch(&fetcher, &tx, ticket);
                    }
                    Ok(Command::Launch) => {
                        let ticket = controller.jump_to_launch_date();
                        spawn_fetch(&fetcher, &tx, ticket);
                    }
                    Ok(Command::Toggle(checkbox, checked)) => controller.toggle_checkbox(checkbox, checked),
                    Ok(Command::Save) => save(&mut controller),
                    Ok(Command::Status) => print_status(&controller),
                    Ok(Command::Help) => print_commands(),
                    Ok(Command::Quit) => break,
                    Err(message) => println!("{message}"),
                }
            }
            Some((ticket, result)) = rx.recv() => {
                controller.complete_fetch(ticket, result);
            }
        }
    }

    // Every sender left belongs to a spawned fetch, so `recv` yields None once
    // they have all finished.
    drop(tx);
    while controller.is_fetching() {
        match rx.recv().await {
            Some((ticket, result)) => {
                controller.complete_fetch(ticket, result);
            }
            None => break,
        }
    }

    save(&mut controller);
    controller
}

/// Fetches the picture for `date`, prints it, saves the session, and returns
/// the state the fetch ended in.
pub async fn run_once<T: HttpTransport>(
    fetcher: PictureFetcher<T>,
    settings: SettingsStore,
    date: NaiveDate,
) -> FetchState {
    let mut controller = SessionController::new(settings, ConsoleSink::new(), Box::new(local_today));
    let ticket = controller.select_date(date);
    controller.fetch_and_complete(&fetcher, ticket).await;
    save(&mut controller);

    controller.state()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apod::tests::StubTransport;
    use crate::settings::{
        JsonFileStore, KeyValueStore, MemoryStore, KEY_IMAGE_COUNT_TODAY, KEY_SHOW_ON_STARTUP,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_dates_and_keywords() {
        assert_eq!(parse_command("2024-06-15"), Ok(Command::Select(date(2024, 6, 15))));
        assert_eq!(parse_command("  today "), Ok(Command::Today));
        assert_eq!(parse_command("LAUNCH"), Ok(Command::Launch));
        assert_eq!(parse_command("q"), Ok(Command::Quit));
        assert_eq!(parse_command("?"), Ok(Command::Help));
    }

    #[test]
    fn test_parse_checkbox_switches() {
        assert_eq!(
            parse_command("limit on"),
            Ok(Command::Toggle(Checkbox::LimitRange, true))
        );
        assert_eq!(
            parse_command("startup off"),
            Ok(Command::Toggle(Checkbox::ShowOnStartup, false))
        );
        assert!(parse_command("limit sometimes").is_err());
        assert!(parse_command("limit").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_command("").is_err());
        assert!(parse_command("2024-13-01").is_err());
        assert!(parse_command("tomorrow").is_err());
        assert!(parse_command("today please").is_err());
    }

    #[test]
    fn test_console_sink_rejects_non_http_images() {
        let mut sink = ConsoleSink::new();
        assert!(sink.set_image("https://apod.nasa.gov/x.jpg").is_ok());
        assert_eq!(sink.image.as_deref(), Some("https://apod.nasa.gov/x.jpg"));
        assert!(sink.set_image("ftp://example.com/x.jpg").is_err());
    }

    #[tokio::test]
    async fn test_run_once_reports_outcome() {
        let ok = PictureFetcher::new(
            StubTransport::ok(r#"{"url":"https://x/y.jpg","explanation":"E"}"#),
            "https://api.nasa.gov/planetary/apod",
            "DEMO_KEY",
        );
        assert_eq!(
            run_once(ok, SettingsStore::new(MemoryStore::new()), date(2024, 6, 1)).await,
            FetchState::Displayed { degraded: false }
        );

        let missing = PictureFetcher::new(
            StubTransport::status(404, "Not Found"),
            "https://api.nasa.gov/planetary/apod",
            "DEMO_KEY",
        );
        assert_eq!(
            run_once(missing, SettingsStore::new(MemoryStore::new()), date(1990, 1, 1)).await,
            FetchState::Failed
        );
    }

    #[tokio::test]
    async fn test_run_once_saves_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let fetcher = PictureFetcher::new(
            StubTransport::ok(r#"{"url":"https://x/y.jpg"}"#),
            "https://api.nasa.gov/planetary/apod",
            "DEMO_KEY",
        );

        let store = SettingsStore::new(crate::settings::JsonFileStore::open(&path));
        run_once(fetcher, store, date(2024, 6, 1)).await;

        let reopened = SettingsStore::new(crate::settings::JsonFileStore::open(&path));
        assert_eq!(reopened.read(KEY_IMAGE_COUNT_TODAY).as_deref(), Some("1"));
    }

    fn fixed_clock() -> Clock {
        Box::new(|| date(2024, 6, 20))
    }

    #[tokio::test]
    async fn test_end_of_input_waits_for_pending_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut seeded = JsonFileStore::open(&path);
        seeded
            .set_many(&[(KEY_SHOW_ON_STARTUP, "false".to_string())])
            .unwrap();

        let fetcher = PictureFetcher::new(
            StubTransport::ok(r#"{"url":"https://x/y.jpg"}"#),
            "https://api.nasa.gov/planetary/apod",
            "DEMO_KEY",
        );
        // Input ends right after the selection, before the fetch can answer
        let controller = run_prompt(
            fetcher,
            SettingsStore::new(JsonFileStore::open(&path)),
            &b"2024-06-15\n"[..],
            fixed_clock(),
        )
        .await;

        assert_eq!(controller.state(), FetchState::Displayed { degraded: false });
        assert_eq!(controller.sink().image.as_deref(), Some("https://x/y.jpg"));

        let reopened = SettingsStore::new(JsonFileStore::open(&path));
        assert_eq!(reopened.read(KEY_IMAGE_COUNT_TODAY).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_quit_reports_failed_fetch_before_saving() {
        let fetcher = PictureFetcher::new(
            StubTransport::replying(Err(FetchError::Transport {
                message: "connection refused".to_string(),
            })),
            "http://127.0.0.1:9/apod",
            "DEMO_KEY",
        );
        let controller = run_prompt(
            fetcher,
            SettingsStore::new(MemoryStore::new()),
            &b"startup off\n2024-06-15\nquit\n"[..],
            fixed_clock(),
        )
        .await;

        assert_eq!(controller.state(), FetchState::Failed);
        assert_eq!(controller.session().selected_date, Some(date(2024, 6, 15)));
        assert!(!controller.session().show_on_startup);
        assert_eq!(controller.session().images_fetched_today, 0);
    }
}
