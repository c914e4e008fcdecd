use chrono::NaiveDate;
use tracing::debug;

use crate::record::ProjectRow;

pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

/// Currently applied filters. Unset filters do not constrain anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    search: String,
    pub created: Option<NaiveDate>,
    pub completed: Option<NaiveDate>,
}

impl FilterState {
    pub fn set_search(&mut self, text: &str) {
        self.search = text.to_lowercase();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn is_active(&self) -> bool {
        !self.search.is_empty() || self.created.is_some() || self.completed.is_some()
    }

    pub fn clear(&mut self) {
        *self = FilterState::default();
    }

    pub fn matches(&self, row: &ProjectRow) -> bool {
        row.contains(&self.search) && self.matches_dates(row)
    }

    fn matches_dates(&self, row: &ProjectRow) -> bool {
        let created_ok = self.created.is_none_or(|day| row.created_day == Some(day));
        match self.completed {
            None => created_ok,
            // Rows without a completion date never pass an active completed filter.
            Some(day) => created_ok && row.completed_day == Some(day),
        }
    }

    /// Indices of the rows passing every filter, in row order.
    pub fn apply(&self, rows: &[ProjectRow]) -> Vec<usize> {
        let visible: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.matches(row))
            .map(|(idx, _)| idx)
            .collect();
        debug!(
            "Filter {:?}: {}/{} rows visible",
            self,
            visible.len(),
            rows.len()
        );
        visible
    }
}

/// Parses the content of a date input. Empty input clears the filter.
pub fn parse_date_input(input: &str) -> Result<Option<NaiveDate>, chrono::ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input, DATE_INPUT_FORMAT).map(Some)
}
