use std::path::PathBuf;
use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

use crate::credentials::BearerToken;
use crate::record::{DisplayZone, ProjectRecord};

pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication required. Please login.";
pub const NO_DATA_MESSAGE: &str = "No project history found.";
pub const NO_MATCHES_MESSAGE: &str = "No matching projects found";
pub const LOAD_FAILED_PREFIX: &str = "Failed to load project history";

pub const PROJECT_HISTORY_PATH: &str = "/api/project-history";
pub const NEW_REQUEST_PATH: &str = "/index.html";
pub const AUTH_TOKEN_KEY: &str = "authToken";

pub const HELP_TEXT: &str = "\
q          quit
/          search (applied on every keystroke)
c          filter by date created (YYYY-MM-DD)
d          filter by date completed (YYYY-MM-DD)
f          apply filters
x          clear all filters
r          reload project history
n          new request
y          copy selected row
j/k, ↓/↑   move selection
PgDn/PgUp  move selection by a page
g/G        first/last row
?          this help
Esc        close help / cancel input";

/// Everything that can go wrong while loading the project history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Authentication required. Please login.")]
    MissingCredential,

    #[error("Invalid JSON response: {body}")]
    InvalidResponse { body: String },

    #[error("HTTP error! status: {status}, message: {message}")]
    HttpError { status: u16, message: String },

    #[error("network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("cannot read credential store {}: {reason}", .path.display())]
    Storage { path: PathBuf, reason: String },
}

impl HistoryError {
    /// Text shown in the error banner.
    pub fn banner_text(&self) -> String {
        match self {
            HistoryError::MissingCredential => AUTH_REQUIRED_MESSAGE.to_string(),
            other => format!("{LOAD_FAILED_PREFIX}: {other}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("cannot start http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("cannot install logging: {0}")]
    Logging(String),
}

/// Input fields the user can type into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputField {
    Search,
    DateCreated,
    DateCompleted,
}

impl InputField {
    pub fn label(&self) -> &'static str {
        match self {
            InputField::Search => "Search",
            InputField::DateCreated => "Date created",
            InputField::DateCompleted => "Date completed",
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    Load,
    Loaded(Result<Vec<ProjectRecord>, HistoryError>),
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Resize(usize, usize),
    Focus(InputField),
    ApplyFilters,
    ClearFilters,
    NewRequest,
    CopyRow,
    Help,
    Exit,
    RawKey(KeyEvent),
}

/// Side effects the model asks the event loop to perform.
#[derive(Debug, PartialEq)]
pub enum Effect {
    Fetch(BearerToken),
    Navigate(String),
    CopyToClipboard(String),
}

#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct HistoryConfig {
    pub base_url: String,
    pub token_store: PathBuf,
    pub token: Option<String>,
    pub request_timeout: Duration,
    pub date_format: String,
    pub display_zone: DisplayZone,
    pub event_poll_time: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            token_store: PathBuf::from("storage.json"),
            token: None,
            request_timeout: Duration::from_secs(30),
            date_format: "%Y-%m-%d".to_string(),
            display_zone: DisplayZone::Local,
            event_poll_time: 100,
        }
    }
}

impl HistoryConfig {
    pub fn history_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), PROJECT_HISTORY_PATH)
    }

    pub fn new_request_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), NEW_REQUEST_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_banner_has_no_prefix() {
        assert_eq!(
            HistoryError::MissingCredential.banner_text(),
            AUTH_REQUIRED_MESSAGE
        );
    }

    #[test]
    fn http_error_banner_carries_status_and_message() {
        let err = HistoryError::HttpError {
            status: 401,
            message: "unauthorized".to_string(),
        };
        let text = err.banner_text();
        assert!(text.starts_with(LOAD_FAILED_PREFIX));
        assert!(text.contains("401"));
        assert!(text.contains("unauthorized"));
    }

    #[test]
    fn urls_join_without_double_slash() {
        let cfg = HistoryConfig::default().base_url("http://host:8080/");
        assert_eq!(cfg.history_url(), "http://host:8080/api/project-history");
        assert_eq!(cfg.new_request_url(), "http://host:8080/index.html");
    }
}
