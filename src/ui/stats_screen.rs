use exhale::{
    stats::views::{self, TechniqueShare},
    util::format_duration,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::{ui::charting, App};

/// Days shown in the practice chart
const CHART_WEEKS: u32 = 2;

/// Technique names longer than this are cut in the table
const NAME_COLUMNS: usize = 32;

/// Pure presenter for one technique row
pub fn present_share(share: &TechniqueShare) -> Row<'static> {
    let color = if share.percentage >= 50.0 {
        Color::Green
    } else if share.percentage >= 20.0 {
        Color::Cyan
    } else {
        Color::Gray
    };

    Row::new(vec![
        Cell::from(charting::fit_width(&share.name, NAME_COLUMNS)),
        Cell::from(share.count.to_string()),
        Cell::from(format!("{:.1}%", share.percentage)).style(Style::default().fg(color)),
    ])
}

pub fn render_stats(app: &mut App, f: &mut Frame) {
    let area = f.area();
    let doc = &app.stats;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Length(3), // streak and totals
            Constraint::Min(8),    // chart
            Constraint::Length(8), // techniques
            Constraint::Length(1), // legend
        ])
        .split(area);

    let title = Paragraph::new("Practice Statistics")
        .block(Block::default().borders(Borders::ALL).title("Stats"))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let streak = views::streak_info(doc);
    let summary = views::practice_summary(doc);
    let next = match (streak.next_milestone, streak.days_to_next()) {
        (Some(m), Some(left)) => format!("{left} days to the {m}-day mark"),
        _ => String::from("every milestone reached"),
    };
    let average = summary
        .average_session_seconds
        .map_or_else(|| String::from("-"), |s| format_duration(s.round() as u64));
    let overview = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(
                format!("streak {} days", streak.current),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("   best {}   {}", streak.max, next)),
        ]),
        Line::from(format!(
            "{} sessions   {} total   {} average   {:.0}% completed",
            summary.total_sessions,
            format_duration(summary.total_duration_seconds),
            average,
            summary.completion_rate
        )),
    ])
    .alignment(Alignment::Center);
    f.render_widget(overview, chunks[1]);

    let series = views::weekly_series(doc, CHART_WEEKS, app.today);
    let bars = charting::daily_minute_bars(&series);
    let bar_refs: Vec<(&str, u64)> = bars.iter().map(|(l, v)| (l.as_str(), *v)).collect();
    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Minutes per day"),
        )
        .data(bar_refs.as_slice())
        .bar_width(charting::bar_width(chunks[2].width, bar_refs.len()))
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Green))
        .value_style(Style::default().fg(Color::Black).bg(Color::Green));
    f.render_widget(chart, chunks[2]);

    let shares = views::technique_distribution(doc);
    if shares.is_empty() {
        let empty = Paragraph::new("No sessions recorded yet. Finish a session to start your history.")
            .block(Block::default().borders(Borders::ALL).title("Techniques"))
            .alignment(Alignment::Center);
        f.render_widget(empty, chunks[3]);
    } else {
        let header = Row::new(vec!["Technique", "Sessions", "Share"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
        let rows: Vec<Row> = shares.iter().map(present_share).collect();
        let table = Table::new(
            rows,
            [
                Constraint::Percentage(60),
                Constraint::Percentage(20),
                Constraint::Percentage(20),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Techniques"));
        f.render_widget(table, chunks[3]);
    }

    let legend = Paragraph::new(Span::styled(
        "(b)ack / (r)estart / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ));
    f.render_widget(legend, chunks[4]);
}
