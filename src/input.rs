use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::list::ListInput;

/// Characters offered for quick-choice menus, in display order
const CHOICE_LABELS: &str = "123456789abcdefghijklmnoprstuvwxyz";

/// Maps a key press to the list vocabulary
pub fn list_input(key: KeyEvent) -> ListInput {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('u') if ctrl => ListInput::PageUp,
        KeyCode::Char('d') if ctrl => ListInput::PageDown,
        KeyCode::Char('c') if ctrl => ListInput::Quit,
        _ if ctrl => ListInput::Unrecognized,
        KeyCode::Char('j') | KeyCode::Down => ListInput::Down,
        KeyCode::Char('k') | KeyCode::Up => ListInput::Up,
        KeyCode::PageDown => ListInput::PageDown,
        KeyCode::PageUp => ListInput::PageUp,
        KeyCode::Char('g') | KeyCode::Home => ListInput::First,
        KeyCode::Char('G') | KeyCode::End => ListInput::Last,
        KeyCode::Char(' ') => ListInput::ToggleSelect,
        KeyCode::Char('*') => ListInput::SelectAll,
        KeyCode::Char('-') => ListInput::SelectNone,
        KeyCode::Enter => ListInput::Activate,
        KeyCode::Char('d') => ListInput::Delete,
        KeyCode::Char('m') => ListInput::Move,
        KeyCode::Char('r') => ListInput::Refresh,
        KeyCode::Char('q') | KeyCode::Esc => ListInput::Quit,
        _ => ListInput::Unrecognized,
    }
}

/// Answer to a yes/no dialog, or None for keys the dialog ignores
pub fn confirm_answer(key: KeyEvent) -> Option<bool> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(false),
        _ => None,
    }
}

/// Label shown next to the choice at `index`, if one is left.
/// `q` is skipped so it can always mean quit.
pub fn choice_label(index: usize) -> Option<char> {
    CHOICE_LABELS.chars().nth(index)
}

/// Index of the choice a key selects among `count` choices
pub fn choice_index(key: KeyEvent, count: usize) -> Option<usize> {
    let KeyCode::Char(c) = key.code else {
        return None;
    };
    CHOICE_LABELS
        .chars()
        .take(count)
        .position(|label| label == c.to_ascii_lowercase())
}
