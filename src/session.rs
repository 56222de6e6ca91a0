//! # Session Controller
//!
//! Owns the per-run session state and reacts to the display's input events
//! (date selected, checkbox toggled, jump to launch date, focus lost).
//!
//! ## Fetch lifecycle
//! ```text
//!            select_date            complete_fetch (Ok, displayable)
//!   Idle ───────────────► Fetching ───────────────────────────────► Displayed
//!                            │       complete_fetch (Ok, other format)
//!                            ├─────────────────────────────────────► Displayed { degraded }
//!                            │       complete_fetch (Err) / image rejected
//!                            └─────────────────────────────────────► Failed
//! ```
//! A new selection can start from any state. Every selection gets a
//! [`FetchTicket`] with a fresh sequence number, and a result is only applied
//! if its ticket is the newest one issued. An older request finishing late is
//! dropped instead of overwriting the picture for the current date.
//!
//! ## Display commands
//! The controller never renders anything itself. It drives a [`DisplaySink`],
//! which may be a GUI, the terminal front-end, or a recorder in tests.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::apod::{FetchError, HttpTransport, PictureFetcher, PictureRecord};
use crate::counter;
use crate::format::is_displayable;
use crate::range::{DateWindow, LAUNCH_DATE};
use crate::settings::{PersistedSettings, SettingsError, SettingsStore};

/// Credit shown when a picture has no named copyright holder.
pub const DEFAULT_COPYRIGHT: &str = "NASA";

/// The two checkboxes whose state is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkbox {
    /// Fetch today's picture as soon as the session starts.
    ShowOnStartup,
    /// Restrict the date picker to the current year.
    LimitRange,
}

impl Checkbox {
    pub fn name(&self) -> &'static str {
        match self {
            Checkbox::ShowOnStartup => "show on startup",
            Checkbox::LimitRange => "limit range",
        }
    }
}

/// The display could not show the image at the given URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DisplayError(pub String);

/// Commands the controller sends to whatever is showing the session.
pub trait DisplaySink {
    /// Points the image view at `url`. Fails if the image cannot be decoded.
    fn set_image(&mut self, url: &str) -> Result<(), DisplayError>;
    fn set_copyright_text(&mut self, text: &str);
    fn set_explanation_text(&mut self, text: &str);
    fn set_image_count_text(&mut self, text: &str);
    fn set_checkbox(&mut self, checkbox: Checkbox, checked: bool);
    fn set_calendar_bounds(&mut self, window: DateWindow);
    /// Moves the date picker to a date chosen by the controller, not the user.
    fn set_selected_date(&mut self, date: NaiveDate);
}

/// In-memory state for one run of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub selected_date: Option<NaiveDate>,
    pub images_fetched_today: u32,
    pub show_on_startup: bool,
    pub limit_range_to_current_year: bool,
}

impl Session {
    fn from_settings(settings: PersistedSettings) -> Self {
        Self {
            selected_date: None,
            images_fetched_today: settings.images_fetched_today,
            show_on_startup: settings.show_on_startup,
            limit_range_to_current_year: settings.limit_range,
        }
    }

    fn to_settings(&self) -> PersistedSettings {
        PersistedSettings {
            images_fetched_today: self.images_fetched_today,
            show_on_startup: self.show_on_startup,
            limit_range: self.limit_range_to_current_year,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching { seq: u64, date: NaiveDate },
    /// `degraded` is set when the URL is not a displayable image type and
    /// the metadata was replaced by a placeholder.
    Displayed { degraded: bool },
    Failed,
}

/// Identifies one issued fetch. Pass it back to [`SessionController::complete_fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
    date: NaiveDate,
}

impl FetchTicket {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Source of "today" for rollover and date bounds.
pub type Clock = Box<dyn Fn() -> NaiveDate + Send>;

/// Today's date in the local time zone.
pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub struct SessionController<S> {
    session: Session,
    state: FetchState,
    sink: S,
    settings: SettingsStore,
    clock: Clock,
    /// Day the current count belongs to.
    counted_on: NaiveDate,
    last_seq: u64,
}

impl<S: DisplaySink> SessionController<S> {
    /// Restores the session from `settings` and pushes its initial state to
    /// the display. Does not fetch anything; see [`Self::startup_fetch`].
    pub fn new(settings: SettingsStore, sink: S, clock: Clock) -> Self {
        let today = clock();
        let session = Session::from_settings(settings.load(today));
        info!(
            count = session.images_fetched_today,
            show_on_startup = session.show_on_startup,
            limit_range = session.limit_range_to_current_year,
            "session restored"
        );

        let mut controller = Self {
            session,
            state: FetchState::Idle,
            sink,
            settings,
            clock,
            counted_on: today,
            last_seq: 0,
        };

        let count = controller.session.images_fetched_today.to_string();
        controller.sink.set_image_count_text(&count);
        controller
            .sink
            .set_checkbox(Checkbox::ShowOnStartup, controller.session.show_on_startup);
        controller
            .sink
            .set_checkbox(Checkbox::LimitRange, controller.session.limit_range_to_current_year);
        let window = controller.window();
        controller.sink.set_calendar_bounds(window);

        controller
    }

    /// Selects today if the user asked to see today's picture on startup.
    pub fn startup_fetch(&mut self) -> Option<FetchTicket> {
        if !self.session.show_on_startup {
            return None;
        }
        let today = (self.clock)();
        self.sink.set_selected_date(today);
        Some(self.select_date(today))
    }

    /// Handles a date selection: enters `Fetching` and issues a new ticket.
    ///
    /// The date window is advisory, so out-of-range dates are still fetched.
    pub fn select_date(&mut self, date: NaiveDate) -> FetchTicket {
        self.last_seq += 1;
        let ticket = FetchTicket {
            seq: self.last_seq,
            date,
        };

        if !self.window().contains(date) {
            debug!(%date, "selected date is outside the calendar bounds");
        }

        self.session.selected_date = Some(date);
        self.state = FetchState::Fetching {
            seq: ticket.seq,
            date,
        };

        // Clear the previous picture's metadata while the request is in flight
        self.sink.set_copyright_text(DEFAULT_COPYRIGHT);
        self.sink.set_explanation_text("");

        ticket
    }

    /// Applies the outcome of the fetch identified by `ticket`.
    ///
    /// Returns false, leaving everything untouched, unless `ticket` is the
    /// fetch still in flight. A newer selection, or an earlier completion of
    /// the same ticket, makes it stale.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<PictureRecord, FetchError>,
    ) -> bool {
        let in_flight = matches!(self.state, FetchState::Fetching { seq, .. } if seq == ticket.seq);
        if !in_flight {
            debug!(
                date = %ticket.date,
                seq = ticket.seq,
                latest = self.last_seq,
                "dropping result of stale fetch"
            );
            return false;
        }

        self.state = match result {
            Ok(record) => self.show_picture(&record),
            Err(err) => {
                warn!(date = %ticket.date, error = %err, "fetch failed");
                self.sink.set_explanation_text(&failure_message(&err));
                FetchState::Failed
            }
        };
        true
    }

    /// True while the newest selection is waiting for its result.
    pub fn is_fetching(&self) -> bool {
        matches!(self.state, FetchState::Fetching { .. })
    }

    /// Fetches the picture for `ticket` and applies the result.
    pub async fn fetch_and_complete<T: HttpTransport>(
        &mut self,
        fetcher: &PictureFetcher<T>,
        ticket: FetchTicket,
    ) -> bool {
        let result = fetcher.fetch(ticket.date).await;
        self.complete_fetch(ticket, result)
    }

    fn show_picture(&mut self, record: &PictureRecord) -> FetchState {
        if let Err(err) = self.sink.set_image(&record.url) {
            warn!(url = %record.url, error = %err, "display rejected image");
            self.sink
                .set_explanation_text(&format!("Image data is not supported. {err}"));
            return FetchState::Failed;
        }

        let degraded = !is_displayable(&record.url);
        if degraded {
            self.sink.set_explanation_text(&format!(
                "Image type is not supported. URL is {}",
                record.url
            ));
        } else {
            let copyright = record
                .copyright
                .as_deref()
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_COPYRIGHT);
            self.sink.set_copyright_text(copyright);
            self.sink.set_explanation_text(&record.explanation);
        }

        // Unsupported formats still count: the service call itself succeeded
        self.count_fetch();

        FetchState::Displayed { degraded }
    }

    fn count_fetch(&mut self) {
        let today = (self.clock)();
        if today != self.counted_on {
            info!(from = %self.counted_on, to = %today, "new day, resetting image count");
            self.session.images_fetched_today = 0;
            self.counted_on = today;
        }
        self.session.images_fetched_today = counter::increment(self.session.images_fetched_today);
        let count = self.session.images_fetched_today.to_string();
        self.sink.set_image_count_text(&count);
    }

    /// Handles a checkbox change from the display.
    pub fn toggle_checkbox(&mut self, checkbox: Checkbox, checked: bool) {
        match checkbox {
            Checkbox::ShowOnStartup => self.session.show_on_startup = checked,
            Checkbox::LimitRange => {
                self.session.limit_range_to_current_year = checked;
                let window = self.window();
                self.sink.set_calendar_bounds(window);
            }
        }
        self.sink.set_checkbox(checkbox, checked);
    }

    /// Opens the full archive and selects the APOD launch date.
    pub fn jump_to_launch_date(&mut self) -> FetchTicket {
        self.session.limit_range_to_current_year = false;
        self.sink.set_checkbox(Checkbox::LimitRange, false);
        let window = self.window();
        self.sink.set_calendar_bounds(window);
        self.sink.set_selected_date(LAUNCH_DATE);
        self.select_date(LAUNCH_DATE)
    }

    /// Flushes the session to the settings store. The fetch state is unchanged.
    pub fn focus_lost(&mut self) -> Result<(), SettingsError> {
        let today = (self.clock)();
        if today != self.counted_on {
            self.session.images_fetched_today = 0;
            self.counted_on = today;
        }
        self.settings.save(&self.session.to_settings(), today)?;
        debug!(count = self.session.images_fetched_today, "session saved");
        Ok(())
    }

    /// Current bounds for the date picker.
    pub fn window(&self) -> DateWindow {
        DateWindow::for_session(self.session.limit_range_to_current_year, (self.clock)())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Text shown in the explanation area when a fetch fails.
fn failure_message(err: &FetchError) -> String {
    match err {
        FetchError::Service { .. } | FetchError::Transport { .. } => {
            format!("We were unable to retrieve the NASA picture for that day: {err}")
        }
        FetchError::Malformed { .. } => format!("Image data is not supported. {err}"),
    }
}
