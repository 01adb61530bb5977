use ratatui::Frame;

use crate::{ui::stats_screen::render_stats, App, AppState};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &mut App, f: &mut Frame);
}

/// Breathing screen - phase, countdown and session progress
pub struct SessionScreen;

impl Screen for SessionScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }
}

/// Results screen - renders the results UI using the App widget
pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }
}

/// Practice history screen
pub struct StatsScreen;

impl Screen for StatsScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        render_stats(app, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Session => Box::new(SessionScreen),
        AppState::Results => Box::new(ResultsScreen),
        AppState::Stats => Box::new(StatsScreen),
    }
}
