use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::render::status_class;

pub const COLUMN_NAMES: [&str; 8] = [
    "Project name",
    "Region",
    "Department",
    "Tyre size",
    "Protocol",
    "Date created",
    "Status",
    "Date completed",
];

pub const STATUS_COLUMN: usize = 6;

/// Rendered in place of a missing or unreadable date.
pub const EMPTY_CELL: &str = "-";

/// One project entry as returned by the history endpoint.
///
/// Decoding is lenient: odd field content ends up as an empty cell or a
/// missing date instead of failing the whole response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProjectRecord {
    #[serde(default, deserialize_with = "text")]
    pub project_name: String,
    #[serde(default, deserialize_with = "text")]
    pub region: String,
    #[serde(default, deserialize_with = "text")]
    pub department: String,
    #[serde(default, deserialize_with = "text")]
    pub tyre_size: String,
    #[serde(default, deserialize_with = "text")]
    pub protocol: String,
    #[serde(default, deserialize_with = "text")]
    pub status: String,
    #[serde(default, deserialize_with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::String(s) => parse_timestamp(s),
        // Milliseconds since the epoch.
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    if parsed.is_none() && !value.is_null() && value != Value::String(String::new()) {
        debug!("Unreadable timestamp {value}, showing it as missing");
    }
    Ok(parsed)
}

/// Accepts RFC 3339, date-times without an offset (taken as UTC) and plain dates.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Time zone dates are shown and compared in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayZone {
    /// The system zone, resolved per timestamp so daylight saving changes are honoured.
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl DisplayZone {
    pub fn localize(&self, ts: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            DisplayZone::Local => ts.with_timezone(&Local).fixed_offset(),
            DisplayZone::Utc => ts.fixed_offset(),
            DisplayZone::Fixed(offset) => ts.with_timezone(offset),
        }
    }
}

/// Display form of a record. Cells hold plain text, escaping happens when markup is produced.
#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub cells: [String; 8],
    pub status_class: String,
    pub created_day: Option<NaiveDate>,
    pub completed_day: Option<NaiveDate>,
    haystack: String,
}

impl ProjectRow {
    pub fn from_record(record: &ProjectRecord, zone: &DisplayZone, date_format: &str) -> Self {
        let created = record.created_at.map(|c| zone.localize(c));
        let completed = record.completed_at.map(|c| zone.localize(c));
        let date_cell = |d: Option<DateTime<FixedOffset>>| {
            d.map(|d| d.format(date_format).to_string())
                .unwrap_or_else(|| EMPTY_CELL.to_string())
        };

        let cells = [
            record.project_name.clone(),
            record.region.clone(),
            record.department.clone(),
            record.tyre_size.clone(),
            record.protocol.clone(),
            date_cell(created),
            record.status.clone(),
            date_cell(completed),
        ];
        let haystack = cells.join(" ").to_lowercase();

        Self {
            status_class: status_class(&record.status),
            created_day: created.map(|c| c.date_naive()),
            completed_day: completed.map(|c| c.date_naive()),
            cells,
            haystack,
        }
    }

    /// `needle` has to be lower case already.
    pub fn contains(&self, needle: &str) -> bool {
        needle.is_empty() || self.haystack.contains(needle)
    }

    pub fn build_all(
        records: &[ProjectRecord],
        zone: &DisplayZone,
        date_format: &str,
    ) -> Vec<ProjectRow> {
        records
            .iter()
            .map(|r| ProjectRow::from_record(r, zone, date_format))
            .collect()
    }
}
