mod focus;
mod help;
mod processes;
mod status_bar;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::app::{App, AppView};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Height of the focus pane when a process is focused.
const FOCUS_HEIGHT: u16 = 8;

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let outer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(area);

    status_bar::render_title_bar(frame, outer_chunks[0], app);
    status_bar::render_status_bar(frame, outer_chunks[2], app);

    let content_area = outer_chunks[1];
    let show_focus = app.focused_record().is_some() && content_area.height > FOCUS_HEIGHT + 6;

    if show_focus {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(FOCUS_HEIGHT)])
            .split(content_area);

        processes::render(frame, chunks[0], app);
        focus::render(frame, chunks[1], app);
    } else {
        processes::render(frame, content_area, app);
    }

    if app.view == AppView::Help {
        help::render_help(frame, app);
    }
}

/// "12.34 W" from milliwatts, or "N/A" when the rail did not answer.
pub fn format_power_mw(mw: Option<f64>) -> String {
    match mw {
        Some(mw) => format!("{:.2} W", mw / 1000.0),
        None => "N/A".to_string(),
    }
}

/// Human-scaled energy from millijoules: mJ below a joule, J below a
/// kilojoule, kJ above.
pub fn format_energy_mj(mj: f64) -> String {
    if mj < 1_000.0 {
        format!("{mj:.0} mJ")
    } else if mj < 1_000_000.0 {
        format!("{:.2} J", mj / 1_000.0)
    } else {
        format!("{:.2} kJ", mj / 1_000_000.0)
    }
}

pub fn format_cpu_percent(percent: f64) -> String {
    format!("{percent:.1}%")
}
