use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::filter::DATE_INPUT_FORMAT;
use crate::model::Model;
use crate::record::{COLUMN_NAMES, ProjectRow, STATUS_COLUMN};

const COLUMN_WIDTHS: [Constraint; 8] = [
    Constraint::Fill(3),
    Constraint::Fill(1),
    Constraint::Fill(1),
    Constraint::Length(11),
    Constraint::Fill(1),
    Constraint::Length(12),
    Constraint::Length(13),
    Constraint::Length(14),
];

#[derive(Debug, Default)]
pub struct TableUI {
    state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let [controls, banner, table, statusline] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        frame.render_widget(Self::controls(model), controls);
        frame.render_widget(Self::banner(model), banner);
        self.draw_table(model, frame, table);
        frame.render_widget(Self::statusline(model), statusline);

        if let Some(text) = model.popup() {
            Self::draw_popup(frame, text);
        }
    }

    fn controls(model: &Model) -> Paragraph<'static> {
        let filters = model.filters();
        let day = |d: Option<chrono::NaiveDate>| {
            d.map(|d| d.format(DATE_INPUT_FORMAT).to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        let mut spans = vec![
            " Search: ".into(),
            Span::from(filters.search().to_string()).yellow(),
            "  Created: ".into(),
            Span::from(day(filters.created)).yellow(),
            "  Completed: ".into(),
            Span::from(day(filters.completed)).yellow(),
        ];
        if filters.is_active() {
            spans.push("  [filtered, x clears]".magenta().bold());
        }
        Paragraph::new(Line::from(spans))
    }

    fn banner(model: &Model) -> Paragraph<'static> {
        if model.is_loading() {
            Paragraph::new(" Loading project history ...".blue().bold())
        } else if let Some(error) = model.error() {
            Paragraph::new(Span::from(format!(" {error}")).red().bold())
        } else if let Some(notice) = model.notice() {
            Paragraph::new(Span::from(format!(" {notice}")).yellow())
        } else {
            Paragraph::new("")
        }
    }

    fn draw_table(&mut self, model: &Model, frame: &mut Frame, area: Rect) {
        let title = Line::from(" Project history ".bold());
        let instructions = Line::from(vec![
            " Search ".into(),
            "</>".blue().bold(),
            " Dates ".into(),
            "<c/d>".blue().bold(),
            " New request ".into(),
            "<n>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered())
            .border_set(border::THICK);

        let header = Row::new(COLUMN_NAMES.map(Cell::from)).bold();
        let rows = model.visible_rows().map(Self::row);
        let table = Table::new(rows, COLUMN_WIDTHS)
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().reversed());

        self.state.select(if model.visible_count() == 0 {
            None
        } else {
            Some(model.cursor_row())
        });
        frame.render_stateful_widget(table, area, &mut self.state);
    }

    fn row(row: &ProjectRow) -> Row<'_> {
        Row::new(row.cells.iter().enumerate().map(|(idx, cell)| {
            let cell = Cell::from(cell.as_str());
            if idx == STATUS_COLUMN {
                cell.style(Style::default().fg(status_color(&row.status_class)))
            } else {
                cell
            }
        }))
    }

    fn statusline(model: &Model) -> Paragraph<'static> {
        match model.input() {
            Some(input) => {
                let (before, after) = split_at_char(&input.input, input.cursor_pos);
                Paragraph::new(Line::from(vec![
                    Span::from(format!(" {}: ", input.field.label())).bold(),
                    Span::from(before),
                    "█".into(),
                    Span::from(after),
                ]))
            }
            None => Paragraph::new(Line::from(vec![
                Span::from(format!(
                    " {}/{} rows ",
                    model.visible_count(),
                    model.rows().len()
                ))
                .bold(),
                Span::from(model.status_message().to_string()),
            ])),
        }
    }

    fn draw_popup(frame: &mut Frame, text: &str) {
        let area = frame.area();
        let height = (text.lines().count() as u16 + 2).min(area.height);
        let width = 50.min(area.width);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(text.to_string())
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(" Help ".bold())),
            popup,
        );
    }
}

fn status_color(status_class: &str) -> Color {
    match status_class {
        "status-completed" | "status-done" => Color::Green,
        "status-in-progress" => Color::Yellow,
        "status-rejected" | "status-cancelled" | "status-failed" => Color::Red,
        _ => Color::Reset,
    }
}

fn split_at_char(s: &str, pos: usize) -> (String, String) {
    let at = s.char_indices().nth(pos).map(|(i, _)| i).unwrap_or(s.len());
    (s[..at].to_string(), s[at..].to_string())
}
