use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Sparkline},
    Frame,
};

use crate::app::App;
use crate::ui::{format_cpu_percent, format_energy_mj, format_power_mw};

/// Detail pane for the focused process: recent power shares as a sparkline
/// plus the record's running totals.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let Some(record) = app.focused_record() else {
        return;
    };

    let block = Block::default()
        .title(format!(" {} ", record.name))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1)])
        .split(inner);

    let stats = Line::from(vec![
        Span::styled("power ", Style::default().fg(Color::DarkGray)),
        Span::raw(format_power_mw(Some(record.last_power_mw))),
        Span::styled("  cpu ", Style::default().fg(Color::DarkGray)),
        Span::raw(format_cpu_percent(record.last_cpu_percent)),
        Span::styled("  cpu energy ", Style::default().fg(Color::DarkGray)),
        Span::raw(format_energy_mj(record.cpu_energy_mj)),
        Span::styled("  sys energy ", Style::default().fg(Color::DarkGray)),
        Span::raw(format_energy_mj(record.system_energy_mj)),
    ]);
    frame.render_widget(Paragraph::new(stats), chunks[0]);

    // Sparkline wants integers; milliwatts already carry enough resolution.
    let width = chunks[1].width as usize;
    let history: Vec<u64> = record
        .power_history
        .iter()
        .map(|mw| mw.max(0.0) as u64)
        .collect();
    let start = history.len().saturating_sub(width);

    let sparkline = Sparkline::default()
        .data(&history[start..])
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(sparkline, chunks[1]);
}
