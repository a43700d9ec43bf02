use chrono::{DateTime, Datelike, Local, Utc};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, Paragraph, Row, StatefulWidget, Table, TableState, Widget, Wrap,
    },
};

use crate::bulk::ConfirmPrompt;
use crate::email::MessageRecord;
use crate::gateway::FolderChoice;
use crate::input::choice_label;
use crate::list::{ListRow, ListState};

/// Warning indicator character for messages
pub const WARNING_CHAR: char = '⚠';

/// Shown in place of any missing field
pub const PLACEHOLDER: &str = "(none)";

/// Format a date for display in message lists
/// Shows time for current year, year for older messages
pub fn format_date(date: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = date.with_timezone(&Local);
    let now = Local::now();

    if local.year() == now.year() {
        // Current year: "Jan 15 10:30"
        local.format("%b %d %H:%M").to_string()
    } else {
        // Previous years: "Jan 15  2024"
        local.format("%b %d  %Y").to_string()
    }
}

/// Human readable message size
pub fn format_size(bytes: u64) -> String {
    match bytes {
        0..1024 => format!("{bytes} B"),
        1024..1_048_576 => format!("{} KB", bytes / 1024),
        _ => format!("{:.1} MB", bytes as f64 / 1_048_576.0),
    }
}

/// Column values of a list row. None renders as [`PLACEHOLDER`].
pub trait RowDisplay {
    fn cells(&self) -> Vec<Option<String>>;
}

/// UI state that supplements the screen state
#[derive(Debug, Default)]
pub struct UiState {
    pub status_message: Option<String>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
    }

    /// Sets a status prefixed with the warning marker
    pub fn set_warning(&mut self, msg: impl AsRef<str>) {
        self.status_message = Some(format!("{WARNING_CHAR} {}", msg.as_ref()));
    }

    /// Clear the status message
    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Returns true if there's a status message to display
    pub fn has_status(&self) -> bool {
        self.status_message.is_some()
    }

    pub fn status(&self) -> Option<&str> {
        self.status_message.as_deref()
    }
}

/// Box of `width` x `height` centered in `area`, clamped to it
fn modal_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Widget for the busy/loading modal overlay
pub struct BusyModalWidget<'a> {
    message: &'a str,
}

impl<'a> BusyModalWidget<'a> {
    pub fn new(message: &'a str) -> Self {
        Self { message }
    }
}

impl Widget for BusyModalWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let display_msg = format!("⠿ {}", self.message);

        let msg_width = display_msg.chars().count() as u16 + 4;
        let box_width = msg_width.max(20).min(area.width.saturating_sub(4));
        let modal_area = modal_area(area, box_width, 3);

        Clear.render(modal_area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let inner = block.inner(modal_area);
        block.render(modal_area, buf);

        let msg_x = inner.x + (inner.width.saturating_sub(display_msg.chars().count() as u16)) / 2;
        buf.set_line(
            msg_x,
            inner.y,
            &Line::from(Span::styled(
                display_msg,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            inner.width,
        );
    }
}

/// Widget for status message modal overlay (used for warnings)
pub struct StatusModalWidget<'a> {
    message: &'a str,
}

impl<'a> StatusModalWidget<'a> {
    pub fn new(message: &'a str) -> Self {
        Self { message }
    }
}

impl Widget for StatusModalWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let msg_width = self.message.chars().count() as u16 + 4;
        let box_width = msg_width.max(20).min(area.width.saturating_sub(4));
        let modal_area = modal_area(area, box_width, 3);

        Clear.render(modal_area, buf);

        // Yellow for warnings
        let color = if self.message.starts_with(WARNING_CHAR) {
            Color::Yellow
        } else {
            Color::White
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color));

        let inner = block.inner(modal_area);
        block.render(modal_area, buf);

        let msg_x =
            inner.x + (inner.width.saturating_sub(self.message.chars().count() as u16)) / 2;
        buf.set_line(
            msg_x,
            inner.y,
            &Line::from(Span::styled(
                self.message,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            inner.width,
        );
    }
}

/// Bordered list showing the visible window of a [`ListState`].
///
/// Each row starts with its selection mark. The first cells get the fixed
/// `widths`; the remaining cells share what is left.
pub struct ListWidget<'a, T> {
    state: &'a ListState<T>,
    title: String,
    widths: &'a [u16],
    empty_notice: &'a str,
}

impl<'a, T> ListWidget<'a, T> {
    pub fn new(state: &'a ListState<T>, title: impl Into<String>, widths: &'a [u16]) -> Self {
        Self {
            state,
            title: title.into(),
            widths,
            empty_notice: "Nothing here (press q to go back)",
        }
    }

    pub fn empty_notice(mut self, notice: &'a str) -> Self {
        self.empty_notice = notice;
        self
    }
}

impl<T: ListRow + RowDisplay> Widget for ListWidget<'_, T> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.state.marked_count() > 0 {
            format!("{}[{} selected] ", self.title, self.state.marked_count())
        } else {
            self.title
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        let inner = block.inner(area);
        block.render(area, buf);

        if self.state.is_empty() {
            let msg = self.empty_notice;
            let x = inner.x + (inner.width.saturating_sub(msg.chars().count() as u16)) / 2;
            let y = inner.y + inner.height / 2;
            buf.set_line(
                x,
                y,
                &Line::from(Span::styled(msg, Style::default().fg(Color::DarkGray))),
                inner.width,
            );
            return;
        }

        let mut highlighted = None;
        let mut column_count = 0;
        let rows: Vec<Row> = self
            .state
            .visible()
            .enumerate()
            .map(|(row_index, (index, item))| {
                if index == self.state.selected_index() {
                    highlighted = Some(row_index);
                }
                let marked = self.state.is_marked(item.row_id());
                let cells = item.cells();
                column_count = column_count.max(cells.len());

                let mark = if marked { "[x]" } else { "[ ]" };
                let row = Row::new(
                    std::iter::once(mark.to_string()).chain(
                        cells
                            .into_iter()
                            .map(|cell| cell.unwrap_or_else(|| PLACEHOLDER.to_string())),
                    ),
                );
                if marked {
                    row.style(Style::default().fg(Color::Cyan))
                } else {
                    row
                }
            })
            .collect();

        let fixed = self.widths.len().min(column_count);
        let widths: Vec<Constraint> = std::iter::once(Constraint::Length(3)) // Mark
            .chain(self.widths[..fixed].iter().map(|&w| Constraint::Length(w)))
            .chain((fixed..column_count).map(|_| Constraint::Min(10)))
            .collect();

        let table = Table::new(rows, widths).row_highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let mut table_state = TableState::default().with_selected(highlighted);
        StatefulWidget::render(table, inner, buf, &mut table_state);
    }
}

/// Widget for the help bar at the bottom
pub struct HelpBarWidget<'a> {
    text: &'a str,
}

impl<'a> HelpBarWidget<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }
}

impl Widget for HelpBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.text)
            .style(Style::default().fg(Color::DarkGray))
            .render(area, buf);
    }
}

/// Widget for the confirmation dialog
pub struct ConfirmDialogWidget<'a> {
    prompt: &'a ConfirmPrompt,
}

impl<'a> ConfirmDialogWidget<'a> {
    pub fn new(prompt: &'a ConfirmPrompt) -> Self {
        Self { prompt }
    }
}

impl Widget for ConfirmDialogWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.prompt.title.as_str())
            .style(Style::default().fg(Color::Red));

        let inner = block.inner(area);
        block.render(area, buf);

        for (i, line) in self.prompt.lines.iter().enumerate() {
            if i >= inner.height as usize {
                break;
            }

            let style = if line.starts_with(WARNING_CHAR) {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };

            buf.set_line(
                inner.x,
                inner.y + i as u16,
                &Line::from(Span::styled(line.clone(), style)),
                inner.width,
            );
        }
    }
}

/// Report of a finished batch. Long failure lists scroll; the bottom
/// border shows which lines are on screen.
pub struct ReportWidget<'a> {
    lines: &'a [String],
    scroll: usize,
}

impl<'a> ReportWidget<'a> {
    pub fn new(lines: &'a [String], scroll: usize) -> Self {
        Self { lines, scroll }
    }
}

/// Largest scroll offset that still fills a report box `height` rows tall
pub fn max_report_scroll(total: usize, height: u16) -> usize {
    total.saturating_sub(height.saturating_sub(2) as usize)
}

impl Widget for ReportWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let total = self.lines.len();
        let page = area.height.saturating_sub(2) as usize;
        let scroll = self.scroll.min(max_report_scroll(total, area.height));
        let footer = if total > page {
            format!(
                " lines {}-{} of {} | j/k PgUp/PgDn: scroll | q/Enter: close ",
                scroll + 1,
                (scroll + page).min(total),
                total
            )
        } else {
            " q/Enter: close ".to_string()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Result ")
            .title_bottom(footer);

        let lines: Vec<Line> = self
            .lines
            .iter()
            .map(|line| {
                let style = if line.starts_with("  ") {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default()
                };
                Line::from(Span::styled(line.as_str(), style))
            })
            .collect();

        Paragraph::new(lines)
            .block(block)
            .scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0))
            .render(area, buf);
    }
}

/// Main menu with quick-choice labels
pub struct MenuWidget<'a> {
    entries: &'a [&'a str],
    mailbox: &'a str,
    summary: String,
}

impl<'a> MenuWidget<'a> {
    pub fn new(entries: &'a [&'a str], mailbox: &'a str, summary: impl Into<String>) -> Self {
        Self {
            entries,
            mailbox,
            summary: summary.into(),
        }
    }
}

impl Widget for MenuWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", self.mailbox));

        let inner = block.inner(area);
        block.render(area, buf);

        buf.set_line(
            inner.x + 1,
            inner.y,
            &Line::from(Span::styled(
                self.summary.as_str(),
                Style::default().fg(Color::DarkGray),
            )),
            inner.width.saturating_sub(1),
        );

        for (i, entry) in self.entries.iter().enumerate() {
            let y = inner.y + 2 + i as u16;
            if y >= inner.y + inner.height {
                break;
            }
            let label = choice_label(i).unwrap_or(' ');
            let line = Line::from(vec![
                Span::styled(
                    format!("{label}) "),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(*entry),
            ]);
            buf.set_line(inner.x + 1, y, &line, inner.width.saturating_sub(1));
        }
    }
}

/// Folder picker with quick-choice labels and a highlighted cursor
pub struct FolderPickerWidget<'a> {
    choices: &'a [FolderChoice],
    selected: usize,
}

impl<'a> FolderPickerWidget<'a> {
    pub fn new(choices: &'a [FolderChoice], selected: usize) -> Self {
        Self { choices, selected }
    }
}

impl Widget for FolderPickerWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Move to folder ")
            .border_style(Style::default().fg(Color::Cyan));

        let inner = block.inner(area);
        block.render(area, buf);

        let height = inner.height as usize;
        let offset = (self.selected + 1).saturating_sub(height);

        for (row, (i, choice)) in self
            .choices
            .iter()
            .enumerate()
            .skip(offset)
            .take(height)
            .enumerate()
        {
            let style = if i == self.selected {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let label = choice_label(i).map_or_else(|| "  ".to_string(), |c| format!("{c})"));
            buf.set_line(
                inner.x,
                inner.y + row as u16,
                &Line::from(Span::styled(format!("{label} {}", choice.path), style)),
                inner.width,
            );
        }
    }
}

/// Single-line text entry
pub struct PromptWidget<'a> {
    label: &'a str,
    value: &'a str,
}

impl<'a> PromptWidget<'a> {
    pub fn new(label: &'a str, value: &'a str) -> Self {
        Self { label, value }
    }
}

impl Widget for PromptWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", self.label))
            .title_bottom(" Enter: search | Esc: cancel ");

        let inner = block.inner(area);
        block.render(area, buf);

        buf.set_line(
            inner.x,
            inner.y,
            &Line::from(vec![
                Span::raw(self.value),
                Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
            ]),
            inner.width,
        );
    }
}

/// Every field of one message
pub struct DetailWidget<'a> {
    record: &'a MessageRecord,
}

impl<'a> DetailWidget<'a> {
    pub fn new(record: &'a MessageRecord) -> Self {
        Self { record }
    }
}

impl Widget for DetailWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let record = self.record;
        let or_placeholder = |value: Option<String>| value.unwrap_or_else(|| PLACEHOLDER.into());
        let join = |values: &[String]| (!values.is_empty()).then(|| values.join(", "));

        let fields = [
            ("Subject", record.subject.clone()),
            ("From", record.sender_name.clone()),
            ("Address", record.sender_address.clone()),
            ("Domain", Some(record.domain_key())),
            ("Received", record.received_at.as_ref().map(format_date)),
            ("Size", record.size_bytes.map(format_size)),
            ("To", join(&record.recipients)),
            ("Categories", join(&record.categories)),
            ("Id", record.has_id().then(|| record.id.clone())),
        ];

        let lines: Vec<Line> = fields
            .into_iter()
            .map(|(name, value)| {
                Line::from(vec![
                    Span::styled(
                        format!("{name:>11}: "),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::raw(or_placeholder(value)),
                ])
            })
            .collect();

        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(" Message "))
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}
