//! TUI application state.
//!
//! The app is a pure reader of the accumulated store: every frame it pulls
//! a fresh ranked snapshot plus session counters, and the only writes it
//! ever performs go through the engine's command channel as validated
//! configuration changes.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::UserConfig;
use crate::engine::{
    resolve_focus, validate_interval, EngineCommand, ProcessEnergyRecord, SessionStats,
    StoreReader,
};

/// How long a status-line message stays visible.
const STATUS_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppView {
    #[default]
    Main,
    Help,
}

/// Actions produced by the input layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleHelp,
    IncreaseInterval,
    DecreaseInterval,
    FocusRank(usize),
    ClearFocus,
    ScrollUp,
    ScrollDown,
    None,
}

pub struct StatusMessage {
    pub text: String,
    set_at: Instant,
}

pub struct App {
    reader: StoreReader,
    commands: mpsc::Sender<EngineCommand>,
    pub snapshot: Vec<ProcessEnergyRecord>,
    pub session: SessionStats,
    pub view: AppView,
    pub interval_secs: u64,
    pub process_count: usize,
    pub scroll_offset: usize,
    pub status: Option<StatusMessage>,
}

impl App {
    pub fn new(
        reader: StoreReader,
        commands: mpsc::Sender<EngineCommand>,
        config: &UserConfig,
    ) -> Self {
        let session = reader.session();
        let interval_secs = session.interval_secs;

        Self {
            reader,
            commands,
            snapshot: Vec::new(),
            session,
            view: AppView::default(),
            interval_secs,
            process_count: config.process_count.max(1),
            scroll_offset: 0,
            status: None,
        }
    }

    /// Pull fresh state before rendering a frame.
    pub fn refresh(&mut self) {
        self.snapshot = self.reader.snapshot();
        self.session = self.reader.session();

        if let Some(status) = &self.status {
            if status.set_at.elapsed() >= STATUS_TTL {
                self.status = None;
            }
        }

        let max_offset = self.snapshot.len().saturating_sub(1);
        self.scroll_offset = self.scroll_offset.min(max_offset);
    }

    /// Returns false when the app should exit.
    pub fn handle_action(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return false,
            Action::ToggleHelp => {
                self.view = match self.view {
                    AppView::Main => AppView::Help,
                    AppView::Help => AppView::Main,
                };
            }
            Action::IncreaseInterval => self.set_interval(self.interval_secs.saturating_add(1)),
            Action::DecreaseInterval => self.set_interval(self.interval_secs.saturating_sub(1)),
            Action::FocusRank(rank) => self.focus_rank(rank),
            Action::ClearFocus => {
                self.send(EngineCommand::SetFocus(None));
                self.set_status("focus cleared");
            }
            Action::ScrollUp => self.scroll_offset = self.scroll_offset.saturating_sub(1),
            Action::ScrollDown => {
                if self.scroll_offset + 1 < self.snapshot.len() {
                    self.scroll_offset += 1;
                }
            }
            Action::None => {}
        }
        true
    }

    pub fn focused_record(&self) -> Option<&ProcessEnergyRecord> {
        let focus = self.session.focus.as_deref()?;
        self.snapshot.iter().find(|r| r.name == focus)
    }

    fn set_interval(&mut self, secs: u64) {
        match validate_interval(secs) {
            Ok(secs) => {
                self.send(EngineCommand::SetInterval(secs));
                self.interval_secs = secs;
                self.set_status(format!("interval: {secs}s"));
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    fn focus_rank(&mut self, rank: usize) {
        match resolve_focus(&self.snapshot, rank) {
            Ok(name) => {
                self.set_status(format!("focused: {name}"));
                self.send(EngineCommand::SetFocus(Some(name)));
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    fn send(&self, command: EngineCommand) {
        // Channel full means the engine is briefly behind; dropping a
        // config nudge is harmless and the operator can re-press.
        if let Err(e) = self.commands.try_send(command) {
            debug!(error = %e, "Dropped engine command");
        }
    }

    fn set_status(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            set_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{shared, AccumulatedStateStore};

    fn test_app() -> (App, mpsc::Receiver<EngineCommand>) {
        let store = shared(AccumulatedStateStore::new(2, 10));
        let reader = StoreReader::new(store);
        let (tx, rx) = mpsc::channel(8);
        let app = App::new(reader, tx, &UserConfig::default());
        (app, rx)
    }

    #[test]
    fn quit_action_stops_the_loop() {
        let (mut app, _rx) = test_app();
        assert!(app.handle_action(Action::None));
        assert!(!app.handle_action(Action::Quit));
    }

    #[test]
    fn interval_adjustment_sends_validated_command() {
        let (mut app, mut rx) = test_app();

        app.handle_action(Action::IncreaseInterval);
        assert_eq!(app.interval_secs, 3);
        assert_eq!(rx.try_recv().unwrap(), EngineCommand::SetInterval(3));
    }

    #[test]
    fn out_of_range_interval_is_rejected_at_the_boundary() {
        let (mut app, mut rx) = test_app();
        app.interval_secs = 60;

        app.handle_action(Action::IncreaseInterval);

        // Engine never sees the invalid value; the operator sees a message.
        assert_eq!(app.interval_secs, 60);
        assert!(rx.try_recv().is_err());
        assert!(app.status.unwrap().text.contains("interval"));
    }

    #[test]
    fn focus_on_empty_snapshot_is_rejected() {
        let (mut app, mut rx) = test_app();

        app.handle_action(Action::FocusRank(1));

        assert!(rx.try_recv().is_err());
        assert!(app.status.unwrap().text.contains("rank"));
    }

    #[test]
    fn help_view_toggles() {
        let (mut app, _rx) = test_app();
        app.handle_action(Action::ToggleHelp);
        assert_eq!(app.view, AppView::Help);
        app.handle_action(Action::ToggleHelp);
        assert_eq!(app.view, AppView::Main);
    }
}
