//! The interactive shell: screens, modal dialogs and the session they act on.
//!
//! Every screen follows the same loop: draw, block for one event, feed it to
//! the list controller, then carry out whatever intent comes back. Gateway
//! calls and index writes happen only here and in the bulk executor.

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{Frame, Terminal, backend::Backend};
use tracing::{debug, info, warn};

use crate::bulk::{
    ActionKind, BulkAction, BulkActionRequest, BulkExecutor, BulkOutcome, Confirm, ConfirmPrompt,
    MessageRef,
};
use crate::gateway::{FolderChoice, GatewayError, MailGateway, folder_paths};
use crate::index::{CacheError, RebuildSummary, SenderIndex};
use crate::input::{choice_index, confirm_answer, list_input};
use crate::list::{ListInput, ListIntent, ListPhase, ListState, RowSource};
use crate::ui::render::{
    MESSAGES_HELP, OVERVIEW_HELP, list_viewport_height, render_busy, render_confirm,
    render_detail, render_folder_picker, render_list, render_menu, render_prompt, render_report,
    report_height,
};
use crate::ui::widgets::{ListWidget, UiState, max_report_scroll};
use crate::views::{DomainRow, DomainSource, MessageRow, MessageSource, ViewContext};

const MENU_ENTRIES: [&str; 5] = [
    "Domain overview",
    "Recent messages",
    "Search",
    "Rebuild index",
    "Quit",
];

/// Fixed column widths: count, newest
const DOMAIN_WIDTHS: [u16; 2] = [6, 13];
/// Fixed column widths: date, sender, size
const MESSAGE_WIDTHS: [u16; 3] = [13, 24, 8];

/// Input the screens react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Key(KeyEvent),
    Resize,
}

/// Where screens get their input from
pub trait EventSource {
    fn next_event(&mut self) -> Result<UiEvent>;
}

/// Blocking reads from the real terminal
pub struct TerminalEvents;

impl EventSource for TerminalEvents {
    fn next_event(&mut self) -> Result<UiEvent> {
        loop {
            match event::read().context("Failed to read terminal input")? {
                Event::Key(key) if key.kind == KeyEventKind::Press => return Ok(UiEvent::Key(key)),
                Event::Resize(..) => return Ok(UiEvent::Resize),
                _ => {}
            }
        }
    }
}

/// Terminal plus input source plus the status overlay
pub struct Tui<B: Backend> {
    terminal: Terminal<B>,
    events: Box<dyn EventSource>,
    ui_state: UiState,
}

impl<B: Backend> Tui<B> {
    pub fn new(terminal: Terminal<B>, events: Box<dyn EventSource>) -> Self {
        Self {
            terminal,
            events,
            ui_state: UiState::new(),
        }
    }

    pub fn into_terminal(self) -> Terminal<B> {
        self.terminal
    }

    fn draw(&mut self, render: impl FnOnce(&mut Frame)) -> Result<()> {
        self.terminal.draw(render).context("Failed to draw")?;
        Ok(())
    }

    fn viewport(&self) -> Result<usize> {
        Ok(list_viewport_height(self.terminal.size()?))
    }

    fn status(&self) -> Option<String> {
        self.ui_state.status_message.clone()
    }

    /// Next key press; None when the screen only needs a redraw
    fn next_key(&mut self) -> Result<Option<KeyEvent>> {
        Ok(match self.events.next_event()? {
            UiEvent::Key(key) => Some(key),
            UiEvent::Resize => None,
        })
    }

    /// Clears a pending status; true when there was one to dismiss
    fn dismiss_status(&mut self) -> bool {
        let had_status = self.ui_state.has_status();
        self.ui_state.clear_status();
        had_status
    }

    fn ask(&mut self, prompt: &ConfirmPrompt, backdrop: &dyn Fn(&mut Frame)) -> Result<bool> {
        loop {
            self.draw(|f| {
                backdrop(f);
                render_confirm(f, prompt);
            })?;
            if let Some(key) = self.next_key()?
                && let Some(answer) = confirm_answer(key)
            {
                return Ok(answer);
            }
        }
    }

    fn show_busy(&mut self, message: &str, backdrop: &dyn Fn(&mut Frame)) -> Result<()> {
        self.draw(|f| {
            backdrop(f);
            render_busy(f, message);
        })
    }

    /// Shows a batch report until it is closed with q, Esc or Enter
    fn show_report(&mut self, lines: &[String], backdrop: &dyn Fn(&mut Frame)) -> Result<()> {
        let mut scroll = 0;
        loop {
            let height = report_height(self.terminal.size()?);
            let limit = max_report_scroll(lines.len(), height);
            let page = usize::from(height.saturating_sub(2)).max(1);
            scroll = scroll.min(limit);

            self.draw(|f| {
                backdrop(f);
                render_report(f, lines, scroll);
            })?;
            let Some(key) = self.next_key()? else {
                continue;
            };

            match list_input(key) {
                ListInput::Quit | ListInput::Activate => return Ok(()),
                ListInput::Down => scroll = (scroll + 1).min(limit),
                ListInput::Up => scroll = scroll.saturating_sub(1),
                ListInput::PageDown => scroll = (scroll + page).min(limit),
                ListInput::PageUp => scroll = scroll.saturating_sub(page),
                ListInput::First => scroll = 0,
                ListInput::Last => scroll = limit,
                _ => {}
            }
        }
    }

    fn pick_folder(
        &mut self,
        choices: &[FolderChoice],
        backdrop: &dyn Fn(&mut Frame),
    ) -> Result<Option<FolderChoice>> {
        let mut selected = 0;
        loop {
            self.draw(|f| {
                backdrop(f);
                render_folder_picker(f, choices, selected);
            })?;
            let Some(key) = self.next_key()? else {
                continue;
            };

            if let Some(index) = choice_index(key, choices.len()) {
                return Ok(choices.get(index).cloned());
            }
            match key.code {
                KeyCode::Down => selected = (selected + 1).min(choices.len().saturating_sub(1)),
                KeyCode::Up => selected = selected.saturating_sub(1),
                KeyCode::Enter => return Ok(choices.get(selected).cloned()),
                KeyCode::Esc | KeyCode::Char('q') => return Ok(None),
                _ => {}
            }
        }
    }

    /// Single-line text entry; None when cancelled or left blank
    fn read_line(&mut self, label: &str, backdrop: &dyn Fn(&mut Frame)) -> Result<Option<String>> {
        let mut value = String::new();
        loop {
            self.draw(|f| {
                backdrop(f);
                render_prompt(f, label, &value);
            })?;
            let Some(key) = self.next_key()? else {
                continue;
            };

            match key.code {
                KeyCode::Char(c) => value.push(c),
                KeyCode::Backspace => {
                    value.pop();
                }
                KeyCode::Enter => {
                    let term = value.trim();
                    return Ok((!term.is_empty()).then(|| term.to_string()));
                }
                KeyCode::Esc => return Ok(None),
                _ => {}
            }
        }
    }
}

/// Yes/no dialog drawn over the screen that triggered it
struct DialogConfirm<'a, B: Backend> {
    tui: &'a mut Tui<B>,
    backdrop: &'a dyn Fn(&mut Frame),
}

impl<B: Backend> Confirm for DialogConfirm<'_, B> {
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> bool {
        match self.tui.ask(prompt, self.backdrop) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "confirmation dialog failed; treating as cancel");
                false
            }
        }
    }
}

/// One opened mailbox: its gateway, its index and the executor acting on both
pub struct Session {
    mailbox: String,
    gateway: Box<dyn MailGateway>,
    index: SenderIndex,
    executor: BulkExecutor,
    recent_count: usize,
    index_limit: Option<usize>,
}

impl Session {
    pub fn new(
        mailbox: impl Into<String>,
        gateway: Box<dyn MailGateway>,
        index: SenderIndex,
        recent_count: usize,
        index_limit: Option<usize>,
    ) -> Self {
        Self {
            mailbox: mailbox.into(),
            gateway,
            index,
            executor: BulkExecutor::new(),
            recent_count: recent_count.max(1),
            index_limit,
        }
    }

    /// Loads the cached index; returns true when it has to be rebuilt
    pub fn load_index(&mut self) -> bool {
        match self.index.load() {
            Ok(count) => {
                info!(count, mailbox = %self.mailbox, "using cached sender index");
                false
            }
            Err(CacheError::Missing(path)) => {
                info!(path = %path.display(), "no cached sender index yet");
                true
            }
            Err(e) => {
                warn!(error = %e, "no usable cache; a rebuild is required");
                true
            }
        }
    }

    pub fn rebuild(&mut self) -> Result<RebuildSummary, GatewayError> {
        self.index.rebuild(self.gateway.as_mut(), self.index_limit)
    }

    pub fn index(&self) -> &SenderIndex {
        &self.index
    }

    fn summary(&self) -> String {
        if self.index.is_empty() {
            "Index is empty".to_string()
        } else {
            format!(
                "{} messages from {} domains indexed",
                self.index.total_messages(),
                self.index.domain_count()
            )
        }
    }
}

/// Runs the main menu until the operator quits
pub fn run<B: Backend>(tui: &mut Tui<B>, session: &mut Session, rebuild_first: bool) -> Result<()> {
    if rebuild_first {
        rebuild(tui, session)?;
    }

    loop {
        let summary = session.summary();
        let status = tui.status();
        tui.draw(|f| {
            render_menu(
                f,
                &MENU_ENTRIES,
                &session.mailbox,
                &summary,
                status.as_deref(),
            )
        })?;

        let Some(key) = tui.next_key()? else {
            continue;
        };
        if tui.dismiss_status() {
            continue;
        }
        if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
            return Ok(());
        }

        match choice_index(key, MENU_ENTRIES.len()) {
            Some(0) => overview_screen(tui, session)?,
            Some(1) => {
                let limit = session.recent_count;
                message_screen(tui, session, ViewContext::Recent { limit })?;
            }
            Some(2) => search(tui, session)?,
            Some(3) => rebuild(tui, session)?,
            Some(4) => return Ok(()),
            _ => {}
        }
    }
}

fn rebuild<B: Backend>(tui: &mut Tui<B>, session: &mut Session) -> Result<()> {
    let summary = session.summary();
    let mailbox = session.mailbox.clone();
    tui.show_busy("Rebuilding index...", &|f: &mut Frame| {
        render_menu(f, &MENU_ENTRIES, &mailbox, &summary, None)
    })?;

    match session.rebuild() {
        Ok(done) => tui.ui_state.set_status(format!(
            "Indexed {} messages from {} domains",
            done.messages, done.domains
        )),
        Err(e) => {
            warn!(error = %e, "rebuild failed; keeping previous index");
            tui.ui_state
                .set_warning(format!("Rebuild failed, previous index kept: {e}"));
        }
    }
    Ok(())
}

fn search<B: Backend>(tui: &mut Tui<B>, session: &mut Session) -> Result<()> {
    let summary = session.summary();
    let mailbox = session.mailbox.clone();
    let term = tui.read_line("Search sender or subject", &|f: &mut Frame| {
        render_menu(f, &MENU_ENTRIES, &mailbox, &summary, None)
    })?;

    if let Some(term) = term {
        message_screen(tui, session, ViewContext::Search { term })?;
    }
    Ok(())
}

fn overview_widget(list: &ListState<DomainRow>) -> ListWidget<'_, DomainRow> {
    ListWidget::new(list, ViewContext::Overview.title(), &DOMAIN_WIDTHS)
        .empty_notice("No domains indexed (rebuild from the menu, q to go back)")
}

fn messages_widget<'a>(list: &'a ListState<MessageRow>, title: &str) -> ListWidget<'a, MessageRow> {
    ListWidget::new(list, title, &MESSAGE_WIDTHS).empty_notice("No messages (q to go back)")
}

/// Asks for whatever a bulk action still needs; None when the operator
/// backs out or no destination is available.
fn choose_action<B: Backend>(
    tui: &mut Tui<B>,
    session: &mut Session,
    kind: ActionKind,
    backdrop: &dyn Fn(&mut Frame),
) -> Result<Option<BulkAction>> {
    if kind == ActionKind::Delete {
        return Ok(Some(BulkAction::Delete));
    }

    let folders = match session.gateway.list_folders() {
        Ok(folders) => folders,
        Err(e) => {
            warn!(error = %e, "failed to list folders");
            tui.ui_state
                .set_warning(format!("Could not list folders: {e}"));
            return Ok(None);
        }
    };

    let choices = folder_paths(&folders);
    if choices.is_empty() {
        tui.ui_state.set_warning("No folders to move to");
        return Ok(None);
    }

    Ok(tui
        .pick_folder(&choices, backdrop)?
        .map(|choice| BulkAction::Move {
            folder_id: choice.id,
            folder_name: choice.path,
        }))
}

fn present_outcome<B: Backend>(
    tui: &mut Tui<B>,
    session: &mut Session,
    outcome: BulkOutcome,
    backdrop: &dyn Fn(&mut Frame),
) -> Result<()> {
    match outcome {
        BulkOutcome::Cancelled => debug!("operator cancelled bulk action"),
        BulkOutcome::NoTargets => tui.ui_state.set_warning("Nothing indexed for that selection"),
        BulkOutcome::Completed(report) => {
            if !report.is_clean() {
                warn!(
                    failed = report.failed,
                    warnings = report.warnings.len(),
                    "bulk action finished with problems"
                );
            }
            tui.show_report(&report.summary_lines(), backdrop)?;
            session.executor.acknowledge();
        }
    }
    Ok(())
}

fn overview_screen<B: Backend>(tui: &mut Tui<B>, session: &mut Session) -> Result<()> {
    let context = ViewContext::Overview;
    let rows = DomainSource::new(&session.index).fetch_current(&context)?;
    let mut list = ListState::new(rows, tui.viewport()?);

    loop {
        list.set_viewport_height(tui.viewport()?);
        let status = tui.status();
        tui.draw(|f| render_list(f, overview_widget(&list), OVERVIEW_HELP, status.as_deref()))?;

        let Some(key) = tui.next_key()? else {
            continue;
        };
        if tui.dismiss_status() {
            continue;
        }

        let reload = match list.handle(list_input(key)) {
            None => false,
            Some(ListIntent::Exit) => return Ok(()),
            Some(ListIntent::Refresh) => true,
            Some(ListIntent::Activate(domain)) => {
                message_screen(tui, session, ViewContext::Domain(domain))?;
                true
            }
            Some(ListIntent::Bulk { ids, kind }) => {
                let backdrop =
                    |f: &mut Frame| render_list(f, overview_widget(&list), OVERVIEW_HELP, None);
                if let Some(action) = choose_action(tui, session, kind, &backdrop)? {
                    let mut confirm = DialogConfirm {
                        tui: &mut *tui,
                        backdrop: &backdrop,
                    };
                    let outcome = session.executor.run_domains(
                        &ids,
                        action,
                        &mut confirm,
                        session.gateway.as_mut(),
                        &mut session.index,
                    );
                    present_outcome(tui, session, outcome, &backdrop)?;
                }
                true
            }
        };

        if reload {
            list.replace_items(DomainSource::new(&session.index).fetch_current(&context)?);
            if list.phase() == ListPhase::Exit {
                return Ok(());
            }
        }
    }
}

fn message_screen<B: Backend>(
    tui: &mut Tui<B>,
    session: &mut Session,
    context: ViewContext,
) -> Result<()> {
    let rows = match MessageSource::new(&session.index, session.gateway.as_mut())
        .fetch_current(&context)
    {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "failed to load messages");
            tui.ui_state.set_warning(format!("{e:#}"));
            return Ok(());
        }
    };

    debug!(key = ?context.index_key(), rows = rows.len(), "opened message list");
    let title = context.title();
    let mut list = ListState::new(rows, tui.viewport()?);

    loop {
        list.set_viewport_height(tui.viewport()?);
        let status = tui.status();
        tui.draw(|f| {
            render_list(
                f,
                messages_widget(&list, &title),
                MESSAGES_HELP,
                status.as_deref(),
            )
        })?;

        let Some(key) = tui.next_key()? else {
            continue;
        };
        if tui.dismiss_status() {
            continue;
        }

        let reload = match list.handle(list_input(key)) {
            None => false,
            Some(ListIntent::Exit) => return Ok(()),
            Some(ListIntent::Refresh) => true,
            Some(ListIntent::Activate(id)) => match list.find(&id).cloned() {
                Some(row) => detail_screen(tui, session, &row)?,
                None => false,
            },
            Some(ListIntent::Bulk { ids, kind }) => {
                let targets: Vec<MessageRef> = ids
                    .iter()
                    .filter_map(|id| list.find(id))
                    .map(MessageRow::target)
                    .collect();
                let backdrop = |f: &mut Frame| {
                    render_list(f, messages_widget(&list, &title), MESSAGES_HELP, None)
                };
                if let Some(action) = choose_action(tui, session, kind, &backdrop)?
                    && let Some(request) = BulkActionRequest::new(targets, action)
                {
                    let mut confirm = DialogConfirm {
                        tui: &mut *tui,
                        backdrop: &backdrop,
                    };
                    let outcome = session.executor.run(
                        request,
                        &mut confirm,
                        session.gateway.as_mut(),
                        &mut session.index,
                    );
                    present_outcome(tui, session, outcome, &backdrop)?;
                }
                true
            }
        };

        if reload {
            match MessageSource::new(&session.index, session.gateway.as_mut())
                .fetch_current(&context)
            {
                Ok(rows) => list.replace_items(rows),
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "failed to reload messages");
                    tui.ui_state.set_warning(format!("{e:#}"));
                }
            }
            if list.phase() == ListPhase::Exit {
                return Ok(());
            }
        }
    }
}

/// Shows one message with single-message actions. Returns true when an
/// action ran, so the list behind it has to be reloaded.
fn detail_screen<B: Backend>(
    tui: &mut Tui<B>,
    session: &mut Session,
    row: &MessageRow,
) -> Result<bool> {
    loop {
        let status = tui.status();
        tui.draw(|f| render_detail(f, &row.record, status.as_deref()))?;

        let Some(key) = tui.next_key()? else {
            continue;
        };
        if tui.dismiss_status() {
            continue;
        }

        let kind = match list_input(key) {
            ListInput::Quit => return Ok(false),
            ListInput::Delete => ActionKind::Delete,
            ListInput::Move => ActionKind::Move,
            _ => continue,
        };

        let backdrop = |f: &mut Frame| render_detail(f, &row.record, None);
        let Some(action) = choose_action(tui, session, kind, &backdrop)? else {
            continue;
        };
        let request = BulkActionRequest::new(vec![row.target()], action)
            .ok_or_else(|| anyhow!("a single message is always a valid target"))?;

        let mut confirm = DialogConfirm {
            tui: &mut *tui,
            backdrop: &backdrop,
        };
        let outcome = session.executor.run(
            request,
            &mut confirm,
            session.gateway.as_mut(),
            &mut session.index,
        );
        let ran = matches!(outcome, BulkOutcome::Completed(_));
        present_outcome(tui, session, outcome, &backdrop)?;
        if ran {
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::ExecutorPhase;
    use crate::demo::DemoGateway;
    use crate::gateway::MockMailGateway;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;
    use std::collections::VecDeque;

    struct Script(VecDeque<UiEvent>);

    impl Script {
        fn keys(keys: &str) -> Self {
            Self(keys.chars().map(key).collect())
        }

        fn then(mut self, event: UiEvent) -> Self {
            self.0.push_back(event);
            self
        }

        fn then_keys(mut self, keys: &str) -> Self {
            self.0.extend(keys.chars().map(key));
            self
        }
    }

    impl EventSource for Script {
        fn next_event(&mut self) -> Result<UiEvent> {
            self.0
                .pop_front()
                .ok_or_else(|| anyhow!("input script exhausted"))
        }
    }

    fn key(c: char) -> UiEvent {
        let code = match c {
            '\n' => KeyCode::Enter,
            '\x1b' => KeyCode::Esc,
            c => KeyCode::Char(c),
        };
        UiEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn tui(script: Script) -> Tui<TestBackend> {
        let terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        Tui::new(terminal, Box::new(script))
    }

    fn demo_session() -> Session {
        let mut session = Session::new(
            "demo@example.com",
            Box::new(DemoGateway::new()),
            SenderIndex::in_memory(),
            50,
            None,
        );
        session.rebuild().unwrap();
        session
    }

    #[test]
    fn test_quit_from_menu() {
        let mut session = demo_session();
        let mut tui = tui(Script::keys("q"));
        assert!(run(&mut tui, &mut session, false).is_ok());
    }

    #[test]
    fn test_exhausted_input_is_an_error() {
        let mut session = demo_session();
        let mut tui = tui(Script::keys("1"));
        assert!(run(&mut tui, &mut session, false).is_err());
    }

    #[test]
    fn test_delete_largest_domain_from_overview() {
        let mut session = demo_session();
        let before = session.index().total_messages();
        let mut tui = tui(Script::keys("1dy\nqq"));

        run(&mut tui, &mut session, false).unwrap();

        assert!(session.index().bucket("outdoor-supply.example").is_none());
        assert_eq!(session.index().total_messages(), before - 32);
        assert_eq!(session.executor.phase(), ExecutorPhase::Idle);
    }

    #[test]
    fn test_marked_domains_are_handled_together() {
        let mut session = demo_session();
        let keys: Vec<String> = session
            .index()
            .domains()
            .iter()
            .take(2)
            .map(|bucket| bucket.key().to_string())
            .collect();
        let mut tui = tui(Script::keys("1 j dy\nqq"));

        run(&mut tui, &mut session, false).unwrap();

        // Only the locked demo message may survive
        for key in &keys {
            if let Some(bucket) = session.index().bucket(key) {
                assert!(bucket.messages().iter().all(|m| m.id == "demo_9"));
            }
        }
        assert_eq!(session.executor.phase(), ExecutorPhase::Idle);
    }

    #[test]
    fn test_long_report_scrolls_to_last_failure() {
        let mut session = demo_session();
        let mut failing = MockMailGateway::new();
        failing
            .expect_delete_message()
            .returning(|_| Err(GatewayError::Remote("locked".into())));
        session.gateway = Box::new(failing);

        let mut tui = tui(Script::keys("1dyG"));
        assert!(run(&mut tui, &mut session, false).is_err());

        let buffer = tui.terminal.backend().buffer();
        let screen: String = (0..buffer.area.height)
            .flat_map(|y| (0..buffer.area.width).map(move |x| (x, y)))
            .map(|pos| buffer[pos].symbol())
            .collect();
        assert!(screen.contains("(promo_32)"));
        assert!(!screen.contains("(promo_1)"));
        assert_eq!(
            session
                .index()
                .bucket("outdoor-supply.example")
                .map(|b| b.count()),
            Some(32)
        );
    }

    #[test]
    fn test_declined_confirmation_changes_nothing() {
        let mut session = demo_session();
        let before = session.index().total_messages();
        let mut tui = tui(Script::keys("1dnqq"));

        run(&mut tui, &mut session, false).unwrap();

        assert_eq!(session.index().total_messages(), before);
    }

    #[test]
    fn test_partial_failure_keeps_locked_message() {
        let mut session = demo_session();
        let mut tui = tui(Script::keys("*dy\nq"));

        message_screen(&mut tui, &mut session, ViewContext::Domain("stripe.com".into())).unwrap();

        let stripe = session.index().bucket("stripe.com").unwrap();
        assert_eq!(stripe.count(), 1);
        assert_eq!(stripe.messages()[0].id, "demo_9");
    }

    #[test]
    fn test_move_from_detail_view() {
        let mut session = demo_session();
        let mut tui = tui(Script::keys("\nm1y\nq"));

        message_screen(&mut tui, &mut session, ViewContext::Domain("github.com".into())).unwrap();

        let github = session.index().bucket("github.com").unwrap();
        assert_eq!(github.count(), 2);
        assert!(github.messages().iter().all(|m| m.id != "demo_1"));
    }

    #[test]
    fn test_folder_picker_escape_cancels_move() {
        let mut session = demo_session();
        let mut tui = tui(Script::keys("m\x1bq"));

        message_screen(&mut tui, &mut session, ViewContext::Domain("github.com".into())).unwrap();

        assert_eq!(session.index().bucket("github.com").unwrap().count(), 3);
    }

    #[test]
    fn test_search_delete_reconciles_message_domain() {
        let mut session = demo_session();
        let mut tui = tui(Script::keys("3linear\ndy\nqq"));

        run(&mut tui, &mut session, false).unwrap();

        let linear = session.index().bucket("linear.app").unwrap();
        assert_eq!(linear.count(), 1);
        assert_eq!(linear.messages()[0].id, "demo_5");
    }

    #[test]
    fn test_deleting_last_message_leaves_emptied_list() {
        let mut session = demo_session();
        let mut tui = tui(Script::keys("dy\n"));

        message_screen(&mut tui, &mut session, ViewContext::Domain("figma.com".into())).unwrap();

        assert!(session.index().bucket("figma.com").is_none());
    }

    #[test]
    fn test_resize_redraws_without_consuming_input() {
        let mut session = demo_session();
        let mut tui = tui(Script::keys("1").then(UiEvent::Resize).then_keys("qq"));
        assert!(run(&mut tui, &mut session, false).is_ok());
    }

    #[test]
    fn test_failed_rebuild_keeps_index_and_warns() {
        let mut session = demo_session();
        let before = session.index().total_messages();

        let mut failing = MockMailGateway::new();
        failing
            .expect_fetch_messages()
            .returning(|_| Err(GatewayError::Remote("offline".into())));
        session.gateway = Box::new(failing);

        let mut tui = tui(Script::keys("4"));
        let _ = run(&mut tui, &mut session, false);

        assert_eq!(session.index().total_messages(), before);
        assert!(
            tui.ui_state
                .status()
                .is_some_and(|s| s.contains("Rebuild failed"))
        );
    }

    #[test]
    fn test_load_index_requests_rebuild_without_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let index = SenderIndex::with_path(dir.path().join("missing.json"));
        let mut session = Session::new("x@y.com", Box::new(DemoGateway::new()), index, 50, None);

        assert!(session.load_index());
        session.rebuild().unwrap();

        let index = SenderIndex::with_path(dir.path().join("missing.json"));
        let mut reopened = Session::new("x@y.com", Box::new(DemoGateway::new()), index, 50, None);
        assert!(!reopened.load_index());
        assert_eq!(
            reopened.index().total_messages(),
            session.index().total_messages()
        );
    }
}
