use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{Action, App, AppView};

pub fn handle_key(app: &App, key: KeyEvent) -> Action {
    match app.view {
        AppView::Main => handle_main_keys(key, app.session.focus.is_some()),
        AppView::Help => handle_help_keys(key),
    }
}

fn handle_main_keys(key: KeyEvent, focused: bool) -> Action {
    match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Esc => {
            if focused {
                Action::ClearFocus
            } else {
                Action::Quit
            }
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('?') | KeyCode::Char('/') => Action::ToggleHelp,
        KeyCode::Char('=') | KeyCode::Char('+') => Action::IncreaseInterval,
        KeyCode::Char('-') => Action::DecreaseInterval,
        KeyCode::Up | KeyCode::Char('k') => Action::ScrollUp,
        KeyCode::Down | KeyCode::Char('j') => Action::ScrollDown,
        KeyCode::Char(c @ '1'..='9') => Action::FocusRank(c as usize - '0' as usize),
        KeyCode::Char('0') => Action::ClearFocus,
        _ => Action::None,
    }
}

fn handle_help_keys(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('/') | KeyCode::Char('q') => {
            Action::ToggleHelp
        }
        _ => Action::None,
    }
}

pub struct KeyBinding {
    pub key: &'static str,
    pub description: &'static str,
}

pub const KEY_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "↑/k ↓/j",
        description: "Scroll the process table",
    },
    KeyBinding {
        key: "1-9",
        description: "Focus the process at that rank",
    },
    KeyBinding {
        key: "0/Esc",
        description: "Clear focus",
    },
    KeyBinding {
        key: "-/+",
        description: "Decrease/increase sampling interval (1-60s)",
    },
    KeyBinding {
        key: "?",
        description: "Toggle help",
    },
    KeyBinding {
        key: "q",
        description: "Quit",
    },
];
