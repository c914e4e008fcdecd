//! Fetching the project history.
//!
//! [`HistorySource`] is the transport seam: [`HttpHistorySource`] talks to the
//! backend with [`reqwest`], tests plug in canned responses. [`HistoryLoader`]
//! runs one fetch for an already resolved bearer token and classifies the result.

use std::future::Future;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::credentials::BearerToken;
use crate::domain::{HistoryConfig, HistoryError};
use crate::record::ProjectRecord;

/// Status and raw body text of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HistorySource: Send + Sync {
    fn fetch(
        &self,
        token: &BearerToken,
    ) -> impl Future<Output = Result<RawResponse, HistoryError>> + Send;
}

pub struct HttpHistorySource {
    client: reqwest::Client,
    url: String,
}

impl HttpHistorySource {
    pub fn new(config: &HistoryConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            url: config.history_url(),
        })
    }
}

impl HistorySource for HttpHistorySource {
    async fn fetch(&self, token: &BearerToken) -> Result<RawResponse, HistoryError> {
        debug!("GET {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token.secret())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("Response status: {status}, {} bytes", body.len());
        Ok(RawResponse { status, body })
    }
}

/// Classify a response. The body is parsed before the status is looked at, so a
/// failing response without a JSON body reports as [`HistoryError::InvalidResponse`].
pub fn parse_response(raw: RawResponse) -> Result<Vec<ProjectRecord>, HistoryError> {
    let value: Value = match serde_json::from_str(&raw.body) {
        Ok(value) => value,
        Err(e) => {
            debug!("Body is not JSON: {e}");
            return Err(HistoryError::InvalidResponse { body: raw.body });
        }
    };

    if !raw.is_success() {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| raw.body.clone());
        return Err(HistoryError::HttpError {
            status: raw.status,
            message,
        });
    }

    let items = match value {
        Value::Array(items) => items,
        other => {
            warn!("Expected a list of projects, got {}", json_kind(&other));
            return Ok(Vec::new());
        }
    };

    // Field content is decoded leniently, only an element that is not a record
    // object at all rejects the response.
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<ProjectRecord>(item).map_err(|e| {
                debug!("Malformed project record: {e}");
                HistoryError::InvalidResponse {
                    body: raw.body.clone(),
                }
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

pub struct HistoryLoader<S> {
    source: S,
}

impl<S: HistorySource> HistoryLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub async fn load(&self, token: &BearerToken) -> Result<Vec<ProjectRecord>, HistoryError> {
        let raw = self.source.fetch(token).await?;
        let records = parse_response(raw)?;
        info!("Loaded {} projects", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::record::{DisplayZone, EMPTY_CELL, ProjectRow};

    struct CannedSource {
        response: RawResponse,
        calls: AtomicUsize,
        seen_token: Mutex<Option<String>>,
    }

    impl CannedSource {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: RawResponse {
                    status,
                    body: body.to_string(),
                },
                calls: AtomicUsize::new(0),
                seen_token: Mutex::new(None),
            }
        }
    }

    impl HistorySource for CannedSource {
        async fn fetch(&self, token: &BearerToken) -> Result<RawResponse, HistoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_token.lock().unwrap() = Some(token.secret().to_string());
            Ok(self.response.clone())
        }
    }

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string(),
        }
    }

    const ONE_RECORD: &str = r#"[{"project_name":"Acme Retread","region":"North",
        "department":"QA","tyre_size":"205/55R16","protocol":"P1","status":"In Progress",
        "created_at":"2024-01-01T00:00:00Z","completed_at":null}]"#;

    #[test]
    fn empty_list_is_no_data() {
        assert!(parse_response(raw(200, "[]")).unwrap().is_empty());
    }

    #[test]
    fn non_list_success_is_no_data() {
        assert!(parse_response(raw(200, r#"{"rows":[]}"#)).unwrap().is_empty());
    }

    #[test]
    fn parses_records() {
        let records = parse_response(raw(200, ONE_RECORD)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].project_name, "Acme Retread");
    }

    #[test]
    fn non_json_body_keeps_raw_text() {
        match parse_response(raw(200, "<html>oops</html>")) {
            Err(HistoryError::InvalidResponse { body }) => assert_eq!(body, "<html>oops</html>"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_json_error_body_is_invalid_response() {
        assert!(matches!(
            parse_response(raw(502, "Bad Gateway")),
            Err(HistoryError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn error_status_carries_server_message() {
        match parse_response(raw(401, r#"{"message":"unauthorized"}"#)) {
            Err(HistoryError::HttpError { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "unauthorized");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn error_status_without_message_uses_body() {
        match parse_response(raw(500, r#"{"error":"boom"}"#)) {
            Err(HistoryError::HttpError { message, .. }) => assert_eq!(message, r#"{"error":"boom"}"#),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn element_that_is_not_a_record_is_invalid_response() {
        assert!(matches!(
            parse_response(raw(200, r#"[{"project_name":"x"}, 42]"#)),
            Err(HistoryError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn empty_completion_date_still_loads() {
        let body = r#"[{"project_name":"Acme Retread","region":"North","department":"QA",
            "tyre_size":"205/55R16","protocol":"P1","status":"In Progress",
            "created_at":"2024-01-01T00:00:00Z","completed_at":""}]"#;
        let records = parse_response(raw(200, body)).unwrap();
        let row = ProjectRow::from_record(&records[0], &DisplayZone::Utc, "%Y-%m-%d");
        assert_eq!(row.cells[5], "2024-01-01");
        assert_eq!(row.cells[7], EMPTY_CELL);
    }

    #[test]
    fn timestamps_without_offset_or_time_still_load() {
        let body = r#"[
            {"project_name":"a","status":"Done","created_at":"2024-01-01T10:00:00",
             "completed_at":"2024-02-01"},
            {"project_name":"b","status":"Done","created_at":"2024-01-01 10:00:00"}
        ]"#;
        let records = parse_response(raw(200, body)).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.created_at.is_some()));
        assert!(records[0].completed_at.is_some());
    }

    #[test]
    fn partial_records_load_with_empty_cells() {
        let records = parse_response(raw(200, r#"[{"project_name":"x"}]"#)).unwrap();
        let row = ProjectRow::from_record(&records[0], &DisplayZone::Utc, "%Y-%m-%d");
        assert_eq!(row.cells[0], "x");
        assert_eq!(row.cells[1], "");
        assert_eq!(row.cells[5], EMPTY_CELL);
    }

    #[tokio::test]
    async fn sends_given_token() {
        let loader = HistoryLoader::new(CannedSource::new(200, ONE_RECORD));
        let records = loader.load(&BearerToken::new("secret")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(loader.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            loader.source.seen_token.lock().unwrap().as_deref(),
            Some("secret")
        );
    }
}
