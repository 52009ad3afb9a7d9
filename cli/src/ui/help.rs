use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::App;
use crate::input::KEY_BINDINGS;
use crate::ui::VERSION;

fn centered_fixed_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

pub fn render_help(frame: &mut Frame, app: &App) {
    let content_height = KEY_BINDINGS.len() as u16 + 9;
    let content_width = 58;
    let area = centered_fixed_rect(frame.area(), content_width, content_height);

    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(KEY_BINDINGS.len() as u16 + 1),
            Constraint::Min(1),
        ])
        .margin(1)
        .split(inner);

    let title = Paragraph::new(Line::from(Span::styled(
        format!("wattop v{VERSION} - Process Power Attribution"),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )))
    .centered();
    frame.render_widget(title, chunks[0]);

    let lines: Vec<Line> = KEY_BINDINGS
        .iter()
        .map(|binding| {
            Line::from(vec![
                Span::styled(
                    format!("{:10}", binding.key),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(binding.description),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), chunks[1]);

    let footer = Paragraph::new(vec![
        Line::from(Span::styled(
            format!(
                "Sampling every {}s. Energy totals are attributed from the",
                app.interval_secs
            ),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            "package rail by each process's share of total CPU time.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    frame.render_widget(footer, chunks[2]);
}
