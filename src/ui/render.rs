use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect, Size},
};

use crate::bulk::ConfirmPrompt;
use crate::email::MessageRecord;
use crate::gateway::FolderChoice;
use crate::list::ListRow;
use crate::ui::widgets::{
    BusyModalWidget, ConfirmDialogWidget, DetailWidget, FolderPickerWidget, HelpBarWidget,
    ListWidget, MenuWidget, PromptWidget, ReportWidget, RowDisplay, StatusModalWidget,
};

pub const MENU_HELP: &str = "1-5: choose | q: quit";
pub const OVERVIEW_HELP: &str = "j/k: move | space: mark | *: all | -: none | Enter: open | d: delete domain | m: move domain | r: refresh | q: back";
pub const MESSAGES_HELP: &str = "j/k: move | PgUp/PgDn | space: mark | *: all | -: none | Enter: details | d: delete | m: move | r: refresh | q: back";
pub const DETAIL_HELP: &str = "d: delete | m: move | q: back";

/// Splits the screen into main content and the help bar
fn main_layout(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Main content
            Constraint::Length(1), // Help bar
        ])
        .split(area);
    (chunks[0], chunks[1])
}

/// Rows a bordered list can show on a terminal of `size`
pub fn list_viewport_height(size: Size) -> usize {
    let (main, _) = main_layout(Rect::new(0, 0, size.width, size.height));
    main.height.saturating_sub(2).max(1) as usize
}

/// Draws a list screen with its help bar and any pending status
pub fn render_list<T: ListRow + RowDisplay>(
    frame: &mut Frame,
    widget: ListWidget<'_, T>,
    help: &str,
    status: Option<&str>,
) {
    let (main, help_area) = main_layout(frame.area());
    frame.render_widget(widget, main);
    frame.render_widget(HelpBarWidget::new(help), help_area);
    render_status(frame, status);
}

pub fn render_menu(
    frame: &mut Frame,
    entries: &[&str],
    mailbox: &str,
    summary: &str,
    status: Option<&str>,
) {
    let (main, help_area) = main_layout(frame.area());
    frame.render_widget(MenuWidget::new(entries, mailbox, summary), main);
    frame.render_widget(HelpBarWidget::new(MENU_HELP), help_area);
    render_status(frame, status);
}

pub fn render_detail(frame: &mut Frame, record: &MessageRecord, status: Option<&str>) {
    let (main, help_area) = main_layout(frame.area());
    frame.render_widget(DetailWidget::new(record), main);
    frame.render_widget(HelpBarWidget::new(DETAIL_HELP), help_area);
    render_status(frame, status);
}

// Overlays

fn render_status(frame: &mut Frame, status: Option<&str>) {
    if let Some(msg) = status {
        frame.render_widget(StatusModalWidget::new(msg), frame.area());
    }
}

pub fn render_confirm(frame: &mut Frame, prompt: &ConfirmPrompt) {
    let dialog_area = centered_rect(60, 30, frame.area());
    frame.render_widget(ConfirmDialogWidget::new(prompt), dialog_area);
}

pub fn render_busy(frame: &mut Frame, message: &str) {
    frame.render_widget(BusyModalWidget::new(message), frame.area());
}

pub fn render_report(frame: &mut Frame, lines: &[String], scroll: usize) {
    let area = report_area(frame.area());
    frame.render_widget(ReportWidget::new(lines, scroll), area);
}

fn report_area(area: Rect) -> Rect {
    centered_rect(80, 70, area)
}

/// Height of the report box on a terminal of `size`
pub fn report_height(size: Size) -> u16 {
    report_area(Rect::new(0, 0, size.width, size.height)).height
}

pub fn render_folder_picker(frame: &mut Frame, choices: &[FolderChoice], selected: usize) {
    let area = centered_rect(50, 60, frame.area());
    frame.render_widget(FolderPickerWidget::new(choices, selected), area);
}

pub fn render_prompt(frame: &mut Frame, label: &str, value: &str) {
    let area = centered_rect(60, 20, frame.area());
    let area = Rect {
        height: area.height.max(3),
        ..area
    };
    frame.render_widget(PromptWidget::new(label, value), area);
}

/// Creates a centered rectangle for dialogs
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 100, 100);
        let centered = centered_rect(50, 50, area);

        // Should be roughly centered
        assert!(centered.x > 0);
        assert!(centered.y > 0);
        assert!(centered.width < area.width);
        assert!(centered.height < area.height);
    }

    #[test]
    fn test_list_viewport_height_excludes_chrome() {
        assert_eq!(list_viewport_height(Size::new(80, 24)), 21);
        assert_eq!(list_viewport_height(Size::new(80, 2)), 1);
    }

    #[test]
    fn test_report_height_fits_terminal() {
        let height = report_height(Size::new(100, 30));
        assert!(height > 2);
        assert!(height < 30);
    }
}
