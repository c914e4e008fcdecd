//! HTML rendering of the history view.
//!
//! Produces the same element ids the history page script works with, so a
//! rendered snapshot can be dropped into the page unchanged.

use std::fmt::Write;

use crate::filter::DATE_INPUT_FORMAT;
use crate::model::Model;
use crate::record::{COLUMN_NAMES, ProjectRow, STATUS_COLUMN};

pub fn escape_html(unsafe_text: &str) -> String {
    let mut out = String::with_capacity(unsafe_text.len());
    for c in unsafe_text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

/// Whitespace as the page script's `\s` sees it. Differs from
/// [`char::is_whitespace`]: U+FEFF counts, U+0085 does not.
fn is_script_space(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n'
            | '\u{000B}'
            | '\u{000C}'
            | '\r'
            | ' '
            | '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
            | '\u{FEFF}'
    )
}

/// `"In Progress"` becomes `"status-in-progress"`.
pub fn status_class(status: &str) -> String {
    let mut class = String::from("status-");
    let mut in_space = false;
    for c in status.to_lowercase().chars() {
        if is_script_space(c) {
            if !in_space {
                class.push('-');
            }
            in_space = true;
        } else {
            class.push(c);
            in_space = false;
        }
    }
    class
}

pub fn render_row(row: &ProjectRow, visible: bool) -> String {
    let mut tr = String::from(if visible {
        "<tr>"
    } else {
        "<tr style=\"display:none\">"
    });
    for (idx, cell) in row.cells.iter().enumerate() {
        if idx == STATUS_COLUMN {
            let _ = write!(
                tr,
                "<td class=\"{}\">{}</td>",
                escape_html(&row.status_class),
                escape_html(cell)
            );
        } else {
            let _ = write!(tr, "<td>{}</td>", escape_html(cell));
        }
    }
    tr.push_str("</tr>");
    tr
}

fn display(shown: bool) -> &'static str {
    if shown { "block" } else { "none" }
}

fn banner(id: &str, text: Option<&str>) -> String {
    format!(
        "<div id=\"{id}\" style=\"display:{}\">{}</div>\n",
        display(text.is_some()),
        escape_html(text.unwrap_or_default())
    )
}

/// Snapshot of the whole view: controls, status banners and table.
pub fn render_page(model: &Model) -> String {
    let filters = model.filters();
    let day = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.format(DATE_INPUT_FORMAT).to_string())
            .unwrap_or_default()
    };

    let mut page = String::new();
    page.push_str("<div class=\"history-controls\">\n");
    let _ = writeln!(
        page,
        "<input id=\"searchInput\" type=\"text\" value=\"{}\">",
        escape_html(filters.search())
    );
    let _ = writeln!(
        page,
        "<input id=\"dateCreated\" type=\"date\" value=\"{}\">",
        day(filters.created)
    );
    let _ = writeln!(
        page,
        "<input id=\"dateCompleted\" type=\"date\" value=\"{}\">",
        day(filters.completed)
    );
    page.push_str("<button id=\"filterBtn\">Filter</button>\n");
    page.push_str("<button id=\"newRequestBtn\">New Request</button>\n");
    page.push_str("</div>\n");

    let _ = writeln!(
        page,
        "<div id=\"loadingSpinner\" style=\"display:{}\"></div>",
        display(model.is_loading())
    );
    page.push_str(&banner("errorMessage", model.error()));
    page.push_str(&banner("noDataMessage", model.notice()));

    page.push_str("<table>\n<thead><tr>");
    for name in COLUMN_NAMES {
        let _ = write!(page, "<th>{name}</th>");
    }
    page.push_str("</tr></thead>\n<tbody id=\"historyTableBody\">\n");
    for (idx, row) in model.rows().iter().enumerate() {
        page.push_str(&render_row(row, model.is_visible(idx)));
        page.push('\n');
    }
    page.push_str("</tbody>\n</table>\n");
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AUTH_REQUIRED_MESSAGE, HistoryConfig, HistoryError, Message};
    use crate::model::tests::config;
    use crate::record::tests::{acme, utc};

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#039;y&#039;&lt;/script&gt;"
        );
    }

    #[test]
    fn status_class_collapses_whitespace() {
        assert_eq!(status_class("In Progress"), "status-in-progress");
        assert_eq!(status_class("On  \tHold"), "status-on-hold");
        assert_eq!(status_class("DONE"), "status-done");
    }

    #[test]
    fn status_class_uses_script_whitespace_rules() {
        assert_eq!(status_class("On\u{FEFF}Hold"), "status-on-hold");
        assert_eq!(status_class("On\u{00A0}\u{3000}Hold"), "status-on-hold");
        assert_eq!(status_class("On\u{0085}Hold"), "status-on\u{0085}hold");
    }

    #[test]
    fn row_has_status_class_and_placeholder() {
        let row = ProjectRow::from_record(&acme(), &utc(), "%Y-%m-%d");
        let html = render_row(&row, true);
        assert_eq!(html.matches("<td").count(), 8);
        assert!(html.contains("<td class=\"status-in-progress\">In Progress</td>"));
        assert!(html.ends_with("<td>-</td></tr>"));
    }

    #[test]
    fn untrusted_names_are_escaped() {
        let mut record = acme();
        record.project_name = "<script>alert(1)</script>".to_string();
        let row = ProjectRow::from_record(&record, &utc(), "%Y-%m-%d");
        let html = render_row(&row, true);
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn hidden_rows_are_not_displayed() {
        let row = ProjectRow::from_record(&acme(), &utc(), "%Y-%m-%d");
        assert!(render_row(&row, false).starts_with("<tr style=\"display:none\">"));
    }

    #[test]
    fn page_shows_no_match_banner() {
        let mut model = Model::init(&config());
        model.update(Some(Message::Load));
        model.update(Some(Message::Loaded(Ok(vec![acme()]))));
        model.set_search("nothing like this");

        let page = render_page(&model);
        assert!(page.contains("<div id=\"loadingSpinner\" style=\"display:none\">"));
        assert!(page.contains(
            "<div id=\"noDataMessage\" style=\"display:block\">No matching projects found</div>"
        ));
        assert!(page.contains("<tr style=\"display:none\"><td>Acme Retread</td>"));
    }

    #[test]
    fn page_shows_error_banner() {
        let mut model = Model::init(&config());
        model.update(Some(Message::Load));
        model.update(Some(Message::Loaded(Err(HistoryError::HttpError {
            status: 401,
            message: "<b>unauthorized</b>".to_string(),
        }))));

        let page = render_page(&model);
        assert!(page.contains("<div id=\"errorMessage\" style=\"display:block\">"));
        assert!(page.contains("401"));
        assert!(page.contains("&lt;b&gt;unauthorized&lt;/b&gt;"));
        assert!(page.contains("<tbody id=\"historyTableBody\">\n</tbody>"));
    }

    #[test]
    fn page_without_token_shows_auth_message_and_no_spinner() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = HistoryConfig::default().token_store(dir.path().join("storage.json"));
        let mut model = Model::init(&cfg);
        model.update(Some(Message::Load));

        let page = render_page(&model);
        assert!(page.contains("<div id=\"loadingSpinner\" style=\"display:none\">"));
        assert!(page.contains(&format!(
            "<div id=\"errorMessage\" style=\"display:block\">{AUTH_REQUIRED_MESSAGE}</div>"
        )));
    }
}
