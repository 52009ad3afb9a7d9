use std::time::Duration;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;
use crate::ui::{format_power_mw, VERSION};

pub fn render_title_bar(frame: &mut Frame, area: Rect, app: &App) {
    let summary = app.session.last_summary;

    let mut spans = vec![
        Span::styled(
            format!(" wattop v{VERSION} "),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  pkg "),
        Span::raw(format_power_mw(summary.and_then(|s| s.package_power_mw))),
        Span::raw("  sys "),
        Span::raw(format_power_mw(summary.and_then(|s| s.system_power_mw))),
    ];

    if let Some(summary) = summary {
        spans.push(Span::raw(format!(
            "  cpu {:.1}%",
            summary.total_cpu_percent
        )));
    }

    if app.session.sensors_degraded() {
        spans.push(Span::styled(
            "  ⚠ sensors unavailable",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

pub fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(44)])
        .split(area);

    let left = match &app.status {
        Some(status) => Line::from(Span::styled(
            format!(" {}", status.text),
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(Span::styled(
            " ?:help  1-9:focus  -/+:interval  q:quit",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(left), chunks[0]);

    // Truncate to whole seconds so humantime prints "5m 12s", not nanos.
    let uptime = Duration::from_secs(app.session.uptime().as_secs());
    let right = Line::from(Span::styled(
        format!(
            "ticks {} ({} degraded)  {}s  up {} ",
            app.session.tick_count,
            app.session.degraded_ticks,
            app.interval_secs,
            humantime::format_duration(uptime),
        ),
        Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(
        Paragraph::new(right).alignment(Alignment::Right),
        chunks[1],
    );
}
