//! Generic paginated list with a focus cursor and a multi-select set.
//!
//! [`ListState::handle`] is the whole transition function: it consumes one
//! input, updates cursor/scroll/selection and returns what the caller has to
//! do next. It never touches the terminal, so every transition is testable
//! without one.

use std::collections::HashSet;

use crate::bulk::ActionKind;

/// A row that can be shown in a [`ListState`]
pub trait ListRow {
    /// Identifier that is unique within one list
    fn row_id(&self) -> &str;
}

/// Supplies the current rows for a screen. The context is passed on every
/// call so sources hold no per-screen state of their own.
pub trait RowSource<C> {
    type Row: ListRow;

    fn fetch_current(&mut self, context: &C) -> anyhow::Result<Vec<Self::Row>>;
}

/// The fixed input vocabulary understood by every list screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListInput {
    Up,
    Down,
    PageUp,
    PageDown,
    First,
    Last,
    ToggleSelect,
    SelectAll,
    SelectNone,
    Activate,
    Delete,
    Move,
    Refresh,
    Quit,
    Unrecognized,
}

/// Work the shell has to carry out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListIntent {
    /// Open the detail view for this row
    Activate(String),
    /// Run a bulk action over these rows, in list order
    Bulk { ids: Vec<String>, kind: ActionKind },
    /// Re-fetch the rows from the source
    Refresh,
    /// Leave the screen
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPhase {
    Active,
    /// No rows: only quit is accepted
    Empty,
    Exit,
}

#[derive(Debug, Clone)]
pub struct ListState<T> {
    items: Vec<T>,
    selected: usize,
    top: usize,
    marked: HashSet<String>,
    viewport_height: usize,
    phase: ListPhase,
}

impl<T: ListRow> ListState<T> {
    pub fn new(items: Vec<T>, viewport_height: usize) -> Self {
        let phase = if items.is_empty() {
            ListPhase::Empty
        } else {
            ListPhase::Active
        };

        Self {
            items,
            selected: 0,
            top: 0,
            marked: HashSet::new(),
            viewport_height: viewport_height.max(1),
            phase,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn phase(&self) -> ListPhase {
        self.phase
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    #[cfg(test)]
    pub fn top_visible_index(&self) -> usize {
        self.top
    }

    #[cfg(test)]
    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    /// The row under the cursor
    pub fn focused(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    pub fn find(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.row_id() == id)
    }

    pub fn is_marked(&self, id: &str) -> bool {
        self.marked.contains(id)
    }

    pub fn marked_count(&self) -> usize {
        self.marked.len()
    }

    /// Rows inside the viewport paired with their absolute index
    pub fn visible(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .skip(self.top)
            .take(self.viewport_height)
    }

    /// Applies one input and reports the follow-up work, if any
    pub fn handle(&mut self, input: ListInput) -> Option<ListIntent> {
        if input == ListInput::Quit {
            self.phase = ListPhase::Exit;
            return Some(ListIntent::Exit);
        }
        if self.phase != ListPhase::Active {
            return None;
        }

        let page = self.viewport_height;
        match input {
            ListInput::Up => self.move_to(self.selected.saturating_sub(1)),
            ListInput::Down => self.move_to(self.selected.saturating_add(1)),
            ListInput::PageUp => self.move_to(self.selected.saturating_sub(page)),
            ListInput::PageDown => self.move_to(self.selected.saturating_add(page)),
            ListInput::First => self.move_to(0),
            ListInput::Last => self.move_to(usize::MAX),
            ListInput::ToggleSelect => self.toggle_focused(),
            ListInput::SelectAll => {
                self.marked = self.items.iter().map(|i| i.row_id().to_string()).collect();
            }
            ListInput::SelectNone => self.marked.clear(),
            ListInput::Activate => {
                return self
                    .focused()
                    .map(|item| ListIntent::Activate(item.row_id().to_string()));
            }
            ListInput::Delete => return self.bulk(ActionKind::Delete),
            ListInput::Move => return self.bulk(ActionKind::Move),
            ListInput::Refresh => return Some(ListIntent::Refresh),
            ListInput::Quit | ListInput::Unrecognized => {}
        }
        None
    }

    /// Adapts scrolling to a new viewport height, keeping the cursor visible
    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height.max(1);
        self.clamp();
    }

    /// Swaps in a freshly fetched row sequence.
    ///
    /// An empty sequence ends the screen. Otherwise the cursor is clamped
    /// into range and marks for rows that disappeared are dropped.
    pub fn replace_items(&mut self, items: Vec<T>) {
        self.items = items;
        if self.items.is_empty() {
            self.marked.clear();
            self.selected = 0;
            self.top = 0;
            self.phase = ListPhase::Exit;
            return;
        }

        let present: HashSet<&str> = self.items.iter().map(ListRow::row_id).collect();
        self.marked.retain(|id| present.contains(id.as_str()));
        if self.phase == ListPhase::Empty {
            self.phase = ListPhase::Active;
        }
        self.clamp();
    }

    fn move_to(&mut self, index: usize) {
        self.selected = index.min(self.items.len().saturating_sub(1));
        self.scroll_into_view();
    }

    fn toggle_focused(&mut self) {
        let Some(id) = self.focused().map(|item| item.row_id().to_string()) else {
            return;
        };
        if !self.marked.remove(&id) {
            self.marked.insert(id);
        }
    }

    /// Targets are the marked rows in list order, or the focused row alone
    fn bulk(&self, kind: ActionKind) -> Option<ListIntent> {
        let ids: Vec<String> = if self.marked.is_empty() {
            self.focused()
                .map(|item| vec![item.row_id().to_string()])
                .unwrap_or_default()
        } else {
            self.items
                .iter()
                .map(ListRow::row_id)
                .filter(|id| self.marked.contains(*id))
                .map(str::to_string)
                .collect()
        };

        (!ids.is_empty()).then_some(ListIntent::Bulk { ids, kind })
    }

    fn clamp(&mut self) {
        let len = self.items.len();
        self.selected = self.selected.min(len.saturating_sub(1));
        self.top = self.top.min(len.saturating_sub(self.viewport_height));
        self.scroll_into_view();
    }

    /// Scrolls the minimum distance that brings the cursor into view
    fn scroll_into_view(&mut self) {
        if self.selected < self.top {
            self.top = self.selected;
        } else if self.selected >= self.top + self.viewport_height {
            self.top = self.selected + 1 - self.viewport_height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(String);

    impl ListRow for Row {
        fn row_id(&self) -> &str {
            &self.0
        }
    }

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| Row(format!("r{i}"))).collect()
    }

    fn press(state: &mut ListState<Row>, input: ListInput, times: usize) {
        for _ in 0..times {
            state.handle(input);
        }
    }

    fn assert_cursor_visible(state: &ListState<Row>) {
        if state.len() > 0 {
            assert!(state.selected_index() < state.len());
            assert!(state.top_visible_index() <= state.selected_index());
            assert!(
                state.selected_index() < state.top_visible_index() + state.viewport_height()
            );
        }
    }

    #[test]
    fn test_scrolls_minimally_to_last_row() {
        let mut state = ListState::new(rows(25), 10);
        for _ in 0..24 {
            state.handle(ListInput::Down);
            assert_cursor_visible(&state);
        }

        assert_eq!(state.selected_index(), 24);
        assert_eq!(state.top_visible_index(), 15);
    }

    #[test]
    fn test_up_down_clamp_at_bounds() {
        let mut state = ListState::new(rows(3), 10);

        state.handle(ListInput::Up);
        assert_eq!(state.selected_index(), 0);

        press(&mut state, ListInput::Down, 5);
        assert_eq!(state.selected_index(), 2);
    }

    #[test]
    fn test_page_moves_by_viewport_height() {
        let mut state = ListState::new(rows(25), 10);

        state.handle(ListInput::PageDown);
        assert_eq!(state.selected_index(), 10);
        assert_eq!(state.top_visible_index(), 1);

        state.handle(ListInput::PageDown);
        state.handle(ListInput::PageDown);
        assert_eq!(state.selected_index(), 24);
        assert_cursor_visible(&state);

        state.handle(ListInput::PageUp);
        assert_eq!(state.selected_index(), 14);
        assert_eq!(state.top_visible_index(), 14);

        press(&mut state, ListInput::PageUp, 3);
        assert_eq!(state.selected_index(), 0);
        assert_eq!(state.top_visible_index(), 0);
    }

    #[test]
    fn test_first_and_last() {
        let mut state = ListState::new(rows(30), 7);

        state.handle(ListInput::Last);
        assert_eq!(state.selected_index(), 29);
        assert_eq!(state.top_visible_index(), 23);

        state.handle(ListInput::First);
        assert_eq!(state.selected_index(), 0);
        assert_eq!(state.top_visible_index(), 0);
    }

    #[test]
    fn test_visible_window() {
        let mut state = ListState::new(rows(25), 10);
        state.handle(ListInput::Last);

        let visible: Vec<usize> = state.visible().map(|(i, _)| i).collect();
        assert_eq!(visible, (15..25).collect::<Vec<_>>());
    }

    #[test]
    fn test_toggle_twice_restores_selection() {
        let mut state = ListState::new(rows(5), 10);
        state.handle(ListInput::Down);
        state.handle(ListInput::ToggleSelect);
        state.handle(ListInput::Down);

        let before = state.marked.clone();
        state.handle(ListInput::ToggleSelect);
        assert!(state.is_marked("r2"));
        state.handle(ListInput::ToggleSelect);
        assert_eq!(state.marked, before);
        assert!(state.is_marked("r1"));
    }

    #[test]
    fn test_select_all_covers_rows_outside_viewport() {
        let mut state = ListState::new(rows(25), 5);
        state.handle(ListInput::SelectAll);
        assert_eq!(state.marked_count(), 25);
        assert!(state.is_marked("r24"));

        state.handle(ListInput::SelectNone);
        assert_eq!(state.marked_count(), 0);
    }

    #[test]
    fn test_bulk_targets_marked_rows_in_order() {
        let mut state = ListState::new(rows(5), 10);
        press(&mut state, ListInput::Down, 3);
        state.handle(ListInput::ToggleSelect);
        state.handle(ListInput::First);
        state.handle(ListInput::ToggleSelect);

        let intent = state.handle(ListInput::Delete);
        assert_eq!(
            intent,
            Some(ListIntent::Bulk {
                ids: vec!["r0".to_string(), "r3".to_string()],
                kind: ActionKind::Delete,
            })
        );
    }

    #[test]
    fn test_bulk_without_marks_targets_focused_row() {
        let mut state = ListState::new(rows(5), 10);
        state.handle(ListInput::Down);

        let intent = state.handle(ListInput::Move);
        assert_eq!(
            intent,
            Some(ListIntent::Bulk {
                ids: vec!["r1".to_string()],
                kind: ActionKind::Move,
            })
        );
    }

    #[test]
    fn test_activate_targets_focused_row_only() {
        let mut state = ListState::new(rows(5), 10);
        state.handle(ListInput::SelectAll);
        press(&mut state, ListInput::Down, 2);

        assert_eq!(
            state.handle(ListInput::Activate),
            Some(ListIntent::Activate("r2".to_string()))
        );
    }

    #[test]
    fn test_empty_list_only_accepts_quit() {
        let mut state: ListState<Row> = ListState::new(Vec::new(), 10);
        assert_eq!(state.phase(), ListPhase::Empty);

        for input in [
            ListInput::Down,
            ListInput::Activate,
            ListInput::Delete,
            ListInput::SelectAll,
            ListInput::Refresh,
        ] {
            assert_eq!(state.handle(input), None);
        }
        assert_eq!(state.phase(), ListPhase::Empty);

        assert_eq!(state.handle(ListInput::Quit), Some(ListIntent::Exit));
        assert_eq!(state.phase(), ListPhase::Exit);
    }

    #[test]
    fn test_unrecognized_input_is_ignored() {
        let mut state = ListState::new(rows(5), 10);
        state.handle(ListInput::Down);

        assert_eq!(state.handle(ListInput::Unrecognized), None);
        assert_eq!(state.selected_index(), 1);
        assert_eq!(state.phase(), ListPhase::Active);
    }

    #[test]
    fn test_refresh_requests_reload() {
        let mut state = ListState::new(rows(2), 10);
        assert_eq!(state.handle(ListInput::Refresh), Some(ListIntent::Refresh));
    }

    #[test]
    fn test_replace_items_prunes_stale_marks_and_clamps() {
        let mut state = ListState::new(rows(25), 10);
        state.handle(ListInput::SelectAll);
        state.handle(ListInput::Last);

        state.replace_items(rows(12));

        assert_eq!(state.marked_count(), 12);
        assert!(!state.is_marked("r20"));
        assert_eq!(state.selected_index(), 11);
        assert_eq!(state.top_visible_index(), 2);
        assert_cursor_visible(&state);
    }

    #[test]
    fn test_replace_items_with_nothing_exits() {
        let mut state = ListState::new(rows(3), 10);
        state.handle(ListInput::SelectAll);

        state.replace_items(Vec::new());

        assert_eq!(state.phase(), ListPhase::Exit);
        assert_eq!(state.marked_count(), 0);
        assert_eq!(state.handle(ListInput::Down), None);
    }

    #[test]
    fn test_viewport_shrink_keeps_cursor_visible() {
        let mut state = ListState::new(rows(25), 10);
        press(&mut state, ListInput::Down, 9);
        assert_eq!(state.top_visible_index(), 0);

        state.set_viewport_height(4);
        assert_eq!(state.top_visible_index(), 6);
        assert_cursor_visible(&state);

        state.set_viewport_height(0);
        assert_eq!(state.viewport_height(), 1);
        assert_eq!(state.top_visible_index(), 9);
    }

    #[test]
    fn test_cursor_invariant_under_mixed_inputs() {
        let mut state = ListState::new(rows(40), 6);
        let script = [
            ListInput::PageDown,
            ListInput::Down,
            ListInput::PageDown,
            ListInput::Last,
            ListInput::PageUp,
            ListInput::Up,
            ListInput::First,
            ListInput::PageDown,
        ];

        for (step, input) in script.iter().cycle().take(64).enumerate() {
            state.handle(*input);
            assert_cursor_visible(&state);
            if step % 9 == 0 {
                let keep = 40 - step / 3;
                state.replace_items(rows(keep));
                assert_cursor_visible(&state);
            }
        }
    }
}
