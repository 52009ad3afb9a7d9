use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Row, Table},
    Frame,
};

use crate::app::App;
use crate::ui::{format_cpu_percent, format_energy_mj, format_power_mw};

const COL_RANK: u16 = 4;
const COL_CPU: u16 = 7;
const COL_POWER: u16 = 9;
const COL_ENERGY: u16 = 11;
const COL_SPACING: u16 = 10;
const COL_NAME_MIN: u16 = 12;

pub fn render(frame: &mut Frame, area: Rect, app: &mut App) {
    let title = match app.session.focus.as_deref() {
        Some(name) => format!(" Processes [focused: {name}] "),
        None => " Processes ".to_string(),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let fixed_width = COL_RANK + COL_CPU + COL_POWER + COL_ENERGY * 2 + COL_SPACING;
    let name_width = inner.width.saturating_sub(fixed_width).max(COL_NAME_MIN);

    let header = Row::new(
        ["#", "Process", "CPU%", "Power", "CPU Energy", "Sys Energy"].map(|h| {
            Span::styled(
                h,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
        }),
    )
    .height(1);

    let max_visible = (inner.height.saturating_sub(1)) as usize;
    let focus = app.session.focus.clone();

    let rows: Vec<Row> = app
        .snapshot
        .iter()
        .enumerate()
        .skip(app.scroll_offset)
        .take(max_visible.min(app.process_count))
        .map(|(idx, record)| {
            let is_focused = focus.as_deref() == Some(record.name.as_str());

            let style = if is_focused {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let mut name = record.name.clone();
            let limit = name_width as usize;
            if name.chars().count() > limit {
                name = name.chars().take(limit.saturating_sub(1)).collect();
                name.push('…');
            }

            Row::new(vec![
                format!("{}", idx + 1),
                name,
                format_cpu_percent(record.last_cpu_percent),
                format_power_mw(Some(record.last_power_mw)),
                format_energy_mj(record.cpu_energy_mj),
                format_energy_mj(record.system_energy_mj),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(COL_RANK),
        Constraint::Min(name_width),
        Constraint::Length(COL_CPU),
        Constraint::Length(COL_POWER),
        Constraint::Length(COL_ENERGY),
        Constraint::Length(COL_ENERGY),
    ];

    let table = Table::new(rows, widths).header(header).column_spacing(2);
    frame.render_widget(table, inner);
}
