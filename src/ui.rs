pub mod charting;
pub mod screen;
pub mod stats_screen;

use exhale::{celebration::MilestoneCelebration, util::format_duration};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Widget, Wrap},
};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Colour of the current phase: holds are amber, user-paced steps magenta,
/// and breathing steps alternate so consecutive phases read differently
fn phase_color(step_index: usize, is_hold: bool, awaits_action: bool) -> Color {
    if awaits_action {
        Color::Magenta
    } else if is_hold {
        Color::Yellow
    } else if step_index % 2 == 0 {
        Color::Green
    } else {
        Color::Cyan
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Session => render_session(self, area, buf),
            // the stats screen draws itself through the frame
            AppState::Results | AppState::Stats => render_results(self, area, buf),
        }
    }
}

fn render_session(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let seq = &app.sequencer;
    let Some(step) = seq.current_step() else {
        Paragraph::new(Span::styled("Preparing session…", dim_style))
            .alignment(Alignment::Center)
            .render(area, buf);
        return;
    };

    let top = area.height.saturating_sub(9) / 2;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(top),
            Constraint::Length(1), // technique
            Constraint::Length(1),
            Constraint::Length(1), // phase
            Constraint::Length(1), // countdown
            Constraint::Length(2), // instruction
            Constraint::Length(1), // cycle info
            Constraint::Length(1), // gauge
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled(app.technique.name.as_str(), dim_style))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let color = phase_color(seq.step_index(), step.is_hold, step.waits_for_action());
    Paragraph::new(Span::styled(
        step.name.to_uppercase(),
        bold_style.fg(color),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    let countdown = match seq.phase_remaining_ms() {
        Some(ms) => format!("{}", ms.div_ceil(1000)),
        None => String::from("press space when ready"),
    };
    Paragraph::new(Span::styled(countdown, bold_style))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    Paragraph::new(Span::styled(step.instruction.as_str(), italic_style))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[5], buf);

    let mut info = vec![format!("cycle {}", seq.cycle_count())];
    if let Some((breath, of)) = seq.breath_progress() {
        info.push(format!("breath {breath}/{of}"));
    }
    if let Some(policy) = seq.catalog().and_then(|c| c.rounds) {
        let round = (seq.round_count() + 1).min(policy.max_rounds);
        info.push(format!("round {round}/{}", policy.max_rounds));
    }
    Paragraph::new(Span::styled(info.join("   "), dim_style))
        .alignment(Alignment::Center)
        .render(chunks[6], buf);

    Gauge::default()
        .gauge_style(Style::default().fg(color))
        .ratio(seq.progress().clamp(0.0, 1.0))
        .label(format!(
            "{} left",
            charting::format_clock(seq.remaining_ms())
        ))
        .render(chunks[7], buf);

    let legend = if step.waits_for_action() {
        "(space) continue / (esc) finish"
    } else {
        "(space) skip phase / (esc) finish"
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[9], buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1), // headline
            Constraint::Length(1), // duration and cycles
            Constraint::Length(1), // saved status
            Constraint::Length(1), // streak
            Constraint::Length(2), // milestone message
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let completed = app.last_record.as_ref().is_some_and(|r| r.completed);
    let headline = if completed {
        Span::styled("Session complete", bold_style.fg(Color::Green))
    } else {
        Span::styled("Session ended early", bold_style.fg(Color::Yellow))
    };
    Paragraph::new(headline)
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let practiced = app
        .last_record
        .as_ref()
        .map_or(0, |r| r.duration_seconds);
    Paragraph::new(Span::styled(
        format!(
            "{} of {}   {} cycles",
            format_duration(practiced),
            app.technique.name,
            app.sequencer.cycle_count()
        ),
        bold_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let saved = match &app.last_outcome {
        Some(outcome) if outcome.success => Span::styled("saved", Style::default().fg(Color::Green)),
        Some(_) => Span::styled(
            "kept for this run only, saving failed",
            Style::default().fg(Color::Red),
        ),
        None => Span::styled(
            "too short to count toward your stats",
            Style::default().add_modifier(Modifier::DIM),
        ),
    };
    Paragraph::new(saved)
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    Paragraph::new(Span::styled(
        format!(
            "streak {} days   best {}",
            app.stats.streak, app.stats.max_streak
        ),
        Style::default().fg(Color::Cyan),
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);

    if let Some(message) = app
        .last_outcome
        .as_ref()
        .and_then(|o| o.milestone_message.as_deref())
    {
        Paragraph::new(Line::from(Span::styled(
            message,
            bold_style.fg(Color::Magenta),
        )))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[5], buf);
    }

    Paragraph::new(Span::styled("(r)estart / (s)tats / (esc)ape", italic_style))
        .render(chunks[7], buf);

    if app.celebration.is_active {
        render_celebration(&app.celebration, area, buf);
    }
}

/// Draw the milestone sparks on top of the results screen
fn render_celebration(celebration: &MilestoneCelebration, area: Rect, buf: &mut Buffer) {
    let colors = [
        Color::Yellow,
        Color::Magenta,
        Color::Cyan,
        Color::Green,
        Color::LightBlue,
        Color::LightYellow,
    ];

    for spark in &celebration.sparks {
        if spark.x < 0.0 || spark.y < 0.0 {
            continue;
        }
        let (x, y) = (spark.x as u16, spark.y as u16);
        if x >= area.width || y >= area.height {
            continue;
        }

        let color = colors[spark.color_index % colors.len()];
        let fade = 1.0 - spark.age / spark.max_age;
        let style = if spark.is_letter() || fade > 0.6 {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else if fade > 0.3 {
            Style::default().fg(color)
        } else {
            Style::default().fg(color).add_modifier(Modifier::DIM)
        };

        if let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) {
            cell.set_symbol(&spark.symbol.to_string());
            cell.set_style(style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use exhale::catalog::{Catalog, Step, Technique};
    use exhale::session::SessionRecord;
    use exhale::stats::RecordOutcome;

    fn create_test_app(steps: Vec<Step>) -> App {
        let technique = Technique::new("test", "Test Breath", "", Catalog::new(steps));
        let mut app = App::new(technique, 60_000);
        app.start().unwrap();
        app
    }

    fn rendered(app: &App) -> String {
        let area = Rect::new(0, 0, 80, 24);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_session_shows_phase_and_countdown() {
        let mut app = create_test_app(vec![
            Step::timed("Inhale", 4000, "Breathe in through the nose"),
            Step::hold("Hold", 4000, "Keep still"),
        ]);
        app.sequencer.tick(1500).unwrap();

        let text = rendered(&app);
        assert!(text.contains("INHALE"));
        assert!(text.contains("Breathe in through the nose"));
        assert!(text.contains("3"));
        assert!(text.contains("Test Breath"));
        assert!(text.contains("cycle 1"));
        assert!(text.contains("00:59 left"));
    }

    #[test]
    fn test_session_waiting_for_action() {
        let app = create_test_app(vec![
            Step::until_action("Hold", "Hold as long as is comfortable"),
            Step::timed("Recover", 15_000, "Deep breath in"),
        ]);

        let text = rendered(&app);
        assert!(text.contains("press space when ready"));
        assert!(text.contains("(space) continue"));
    }

    #[test]
    fn test_results_completed_and_saved() {
        let mut app = create_test_app(vec![Step::timed("Inhale", 4000, "in")]);
        app.state = AppState::Results;
        app.last_record = Some(SessionRecord::new("test", "Test Breath", 300, Local::now(), true));
        app.last_outcome = Some(RecordOutcome {
            success: true,
            milestone: Some(7),
            milestone_message: Some("One full week of practice".into()),
        });
        app.stats.streak = 7;
        app.stats.max_streak = 7;

        let text = rendered(&app);
        assert!(text.contains("Session complete"));
        assert!(text.contains("5m of Test Breath"));
        assert!(text.contains("saved"));
        assert!(text.contains("streak 7 days"));
        assert!(text.contains("One full week of practice"));
        assert!(text.contains("(r)estart / (s)tats / (esc)ape"));
    }

    #[test]
    fn test_results_short_run_not_saved() {
        let mut app = create_test_app(vec![Step::timed("Inhale", 4000, "in")]);
        app.state = AppState::Results;
        app.last_record = Some(SessionRecord::new("test", "Test Breath", 4, Local::now(), false));

        let text = rendered(&app);
        assert!(text.contains("Session ended early"));
        assert!(text.contains("too short to count"));
    }

    #[test]
    fn test_results_save_failure_is_visible() {
        let mut app = create_test_app(vec![Step::timed("Inhale", 4000, "in")]);
        app.state = AppState::Results;
        app.last_outcome = Some(RecordOutcome {
            success: false,
            milestone: None,
            milestone_message: None,
        });

        assert!(rendered(&app).contains("saving failed"));
    }

    #[test]
    fn test_celebration_draws_banner_letters() {
        let mut app = create_test_app(vec![Step::timed("Inhale", 4000, "in")]);
        app.state = AppState::Results;
        app.celebration.start(3, 80, 24);
        for spark in app.celebration.sparks.iter_mut().filter(|s| s.is_letter()) {
            if let Some((tx, ty)) = spark.target {
                spark.x = tx;
                spark.y = ty;
            }
        }

        let text = rendered(&app);
        assert!(text.contains('S'));
        assert!(text.contains('K'));
    }

    #[test]
    fn test_phase_color() {
        assert_eq!(phase_color(0, false, false), Color::Green);
        assert_eq!(phase_color(1, false, false), Color::Cyan);
        assert_eq!(phase_color(1, true, false), Color::Yellow);
        assert_eq!(phase_color(2, true, true), Color::Magenta);
    }
}
