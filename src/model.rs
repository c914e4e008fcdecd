use std::time::Instant;

use chrono::NaiveDate;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace};

use crate::credentials::CredentialStore;
use crate::domain::{
    Effect, HELP_TEXT, HistoryConfig, HistoryError, InputField, Message, NO_DATA_MESSAGE,
    NO_MATCHES_MESSAGE,
};
use crate::filter::{DATE_INPUT_FORMAT, FilterState, parse_date_input};
use crate::inputter::{InputResult, Inputter};
use crate::record::{ProjectRecord, ProjectRow};

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    LOADING,
    READY,
    NAVIGATING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    INPUT,
}

pub struct Model {
    config: HistoryConfig,
    credentials: CredentialStore,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    rows: Vec<ProjectRow>,
    visible: Vec<usize>, // Indices into rows that pass the filters, in row order.
    filters: FilterState,
    loading: bool,
    error: Option<String>,
    notice: Option<String>, // "no data" and "no matches" share one banner
    cursor_row: usize,      // Position in visible
    table_height: usize,
    input: Option<Inputter>,
    last_input: Option<InputResult>,
    search_before_input: String,
    show_popup: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &HistoryConfig) -> Self {
        Self {
            config: config.clone(),
            credentials: CredentialStore::new(config.token_store.clone(), config.token.clone()),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            rows: Vec::new(),
            visible: Vec::new(),
            filters: FilterState::default(),
            loading: false,
            error: None,
            notice: None,
            cursor_row: 0,
            table_height: 20,
            input: None,
            last_input: None,
            search_before_input: String::new(),
            show_popup: false,
            status_message: "Started history-view".to_string(),
            last_status_message_update: Instant::now(),
        }
    }

    pub fn update(&mut self, message: Option<Message>) -> Option<Effect> {
        let msg = message?;
        trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);

        // Handled the same way in every modus.
        let msg = match msg {
            Message::Quit => {
                self.quit();
                return None;
            }
            Message::Loaded(result) => {
                self.loaded(result);
                return None;
            }
            Message::Resize(width, height) => {
                self.ui_resize(width, height);
                return None;
            }
            other => other,
        };

        match self.modus {
            Modus::TABLE => match msg {
                Message::Load => return self.load(),
                Message::MoveUp => self.move_selection_up(1),
                Message::MoveDown => self.move_selection_down(1),
                Message::MovePageUp => self.move_selection_up(self.table_height.max(1)),
                Message::MovePageDown => self.move_selection_down(self.table_height.max(1)),
                Message::MoveBeginning => self.cursor_row = 0,
                Message::MoveEnd => self.cursor_row = self.visible.len().saturating_sub(1),
                Message::Focus(field) => self.focus(field),
                Message::ApplyFilters => self.apply_filters(),
                Message::ClearFilters => {
                    self.filters.clear();
                    self.apply_filters();
                    self.set_status_message("Filters cleared");
                }
                Message::NewRequest => return Some(self.new_request()),
                Message::CopyRow => return self.copy_row(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::POPUP => {
                if let Message::Exit | Message::Help = msg {
                    self.close_popup();
                }
            }
            Modus::INPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key);
                }
            }
        }
        None
    }

    // -------------------- Loading ---------------------- //

    /// Resolves the token before anything is shown as loading, so a missing
    /// credential never flashes the spinner and never reaches the network.
    fn load(&mut self) -> Option<Effect> {
        if self.loading {
            debug!("Load already in flight, ignoring");
            return None;
        }
        let token = match self.credentials.token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.loaded(Err(HistoryError::MissingCredential));
                return None;
            }
            Err(e) => {
                self.loaded(Err(e));
                return None;
            }
        };
        self.loading = true;
        self.status = Status::LOADING;
        self.error = None;
        self.notice = None;
        self.set_status_message("Loading project history ...");
        Some(Effect::Fetch(token))
    }

    fn loaded(&mut self, result: Result<Vec<ProjectRecord>, HistoryError>) {
        self.loading = false;
        self.status = Status::READY;
        match result {
            Ok(records) if records.is_empty() => {
                info!("Project history is empty");
                self.rows.clear();
                self.visible.clear();
                self.cursor_row = 0;
                self.notice = Some(NO_DATA_MESSAGE.to_string());
                self.set_status_message("No projects");
            }
            Ok(records) => {
                self.rows = ProjectRow::build_all(
                    &records,
                    &self.config.display_zone,
                    &self.config.date_format,
                );
                self.cursor_row = 0;
                self.apply_filters();
                self.set_status_message(format!("Loaded {} projects", self.rows.len()));
            }
            Err(e) => {
                error!("Error loading project history: {e}");
                self.error = Some(e.banner_text());
                self.set_status_message("Loading failed");
            }
        }
    }

    // -------------------- Filtering ---------------------- //

    pub fn set_search(&mut self, text: &str) {
        self.filters.set_search(text);
        self.apply_filters();
    }

    pub fn set_date_filters(&mut self, created: Option<NaiveDate>, completed: Option<NaiveDate>) {
        self.filters.created = created;
        self.filters.completed = completed;
        self.apply_filters();
    }

    fn apply_filters(&mut self) {
        self.visible = self.filters.apply(&self.rows);
        self.cursor_row = self.cursor_row.min(self.visible.len().saturating_sub(1));
        self.update_no_results_message();
    }

    fn update_no_results_message(&mut self) {
        if self.rows.is_empty() {
            // Keep whatever the last load reported.
            return;
        }
        self.notice = if self.visible.is_empty() {
            Some(NO_MATCHES_MESSAGE.to_string())
        } else {
            None
        };
    }

    // -------------------- Input handling ---------------------- //

    fn focus(&mut self, field: InputField) {
        trace!("Focus {:?}", field);
        let day = |d: Option<NaiveDate>| {
            d.map(|d| d.format(DATE_INPUT_FORMAT).to_string())
                .unwrap_or_default()
        };
        let current = match field {
            InputField::Search => self.filters.search().to_string(),
            InputField::DateCreated => day(self.filters.created),
            InputField::DateCompleted => day(self.filters.completed),
        };
        self.search_before_input = self.filters.search().to_string();

        let input = Inputter::new(field, &current);
        self.last_input = Some(input.get());
        self.input = Some(input);
        self.previous_modus = self.modus;
        self.modus = Modus::INPUT;
    }

    fn raw_input(&mut self, key: KeyEvent) {
        let Some(input) = self.input.as_mut() else {
            self.modus = Modus::TABLE;
            return;
        };
        let result = input.read(key);

        if result.field == InputField::Search {
            let text = if result.canceled {
                self.search_before_input.clone()
            } else {
                result.input.clone()
            };
            self.set_search(&text);
        }

        if result.finished {
            self.finish_input(&result);
            self.input = None;
            self.last_input = None;
            self.modus = self.previous_modus;
            self.previous_modus = Modus::INPUT;
        } else {
            self.last_input = Some(result);
        }
    }

    fn finish_input(&mut self, result: &InputResult) {
        if result.canceled || result.field == InputField::Search {
            return;
        }
        match parse_date_input(&result.input) {
            Ok(day) => {
                match result.field {
                    InputField::DateCreated => self.filters.created = day,
                    InputField::DateCompleted => self.filters.completed = day,
                    InputField::Search => {}
                }
                self.apply_filters();
                self.set_status_message(format!("{} rows visible", self.visible.len()));
            }
            Err(e) => {
                debug!("Rejected date input {:?}: {e}", result.input);
                self.set_status_message(format!(
                    "Invalid date \"{}\", expected YYYY-MM-DD",
                    result.input
                ));
            }
        }
    }

    // -------------------- Other actions ---------------------- //

    fn new_request(&mut self) -> Effect {
        let url = self.config.new_request_url();
        info!("Navigating to {url}");
        self.status = Status::NAVIGATING;
        Effect::Navigate(url)
    }

    fn copy_row(&mut self) -> Option<Effect> {
        let row = self.selected_row()?;
        let line = row
            .cells
            .iter()
            .map(|c| wrap_cell_content(c))
            .collect::<Vec<String>>()
            .join(",");
        self.set_status_message("Copied row to clipboard");
        Some(Effect::CopyToClipboard(line))
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.show_popup = true;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.show_popup = false;
    }

    fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.status, Status::QUITTING | Status::NAVIGATING)
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        // Title, header row, banner and status line.
        self.table_height = height.saturating_sub(5);
        trace!("UI was resized! w:{width}, h:{height}");
    }

    fn move_selection_up(&mut self, size: usize) {
        self.cursor_row = self.cursor_row.saturating_sub(size);
    }

    fn move_selection_down(&mut self, size: usize) {
        let last = self.visible.len().saturating_sub(1);
        self.cursor_row = (self.cursor_row + size).min(last);
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    // -------------------- Read access for rendering ---------------------- //

    pub fn rows(&self) -> &[ProjectRow] {
        &self.rows
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &ProjectRow> {
        self.visible.iter().map(|&idx| &self.rows[idx])
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn is_visible(&self, idx: usize) -> bool {
        self.visible.binary_search(&idx).is_ok()
    }

    pub fn selected_row(&self) -> Option<&ProjectRow> {
        self.visible.get(self.cursor_row).map(|&idx| &self.rows[idx])
    }

    pub fn cursor_row(&self) -> usize {
        self.cursor_row
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn input(&self) -> Option<&InputResult> {
        self.last_input.as_ref()
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::INPUT
    }

    pub fn popup(&self) -> Option<&'static str> {
        self.show_popup.then_some(HELP_TEXT)
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }
}

/// Quote a cell for a comma separated line.
fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = needs_escaping || c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}
