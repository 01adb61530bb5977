mod ui;

use chrono::Local;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use exhale::{
    catalog::{Technique, TechniqueLibrary},
    celebration::MilestoneCelebration,
    config::{Config, ConfigStore, FileConfigStore, Overrides},
    runtime::{BreathEvent, InputSource, Pace, Runner, TerminalInput, WallClock},
    sequencer::{Sequencer, SequencerEvent},
    session::SessionRecord,
    stats::{
        export, views, FileStatsStore, RecordOutcome, SqliteStatsStore, StatsAggregator,
        StatsDocument, StatsStore, StoreError,
    },
    util::format_duration,
};
use log::{debug, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
};

/// calm breathing tui with guided phases, daily streaks and practice analytics
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A calm breathing TUI that paces you through guided techniques, keeps a daily practice streak and shows where your minutes went."
)]
pub struct Cli {
    /// technique to practice (see --list)
    #[clap(short = 't', long)]
    technique: Option<String>,

    /// session length in minutes
    #[clap(short = 'm', long)]
    minutes: Option<u32>,

    /// JSON file with extra techniques, merged over the built-in ones
    #[clap(long, value_name = "PATH")]
    techniques_file: Option<PathBuf>,

    /// keep statistics in this JSON file instead of the default database
    #[clap(long, value_name = "PATH")]
    stats_file: Option<PathBuf>,

    /// list available techniques and exit
    #[clap(long)]
    list: bool,

    /// print practice statistics and exit
    #[clap(long)]
    stats: bool,

    /// delete all recorded statistics and exit
    #[clap(long)]
    reset_stats: bool,

    /// write the session history as CSV and exit
    #[clap(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// remember the given technique and length as defaults
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// CLI flags win over the stored config
    fn overrides(&self) -> Overrides {
        Overrides {
            technique: self.technique.clone(),
            session_minutes: self.minutes,
            techniques_file: self.techniques_file.clone(),
            stats_file: self.stats_file.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Session,
    Results,
    Stats,
}

type Aggregator = StatsAggregator<Box<dyn StatsStore>>;

pub struct App {
    pub technique: Technique,
    pub target_ms: u64,
    pub sequencer: Sequencer,
    pub state: AppState,
    pub last_record: Option<SessionRecord>,
    pub last_outcome: Option<RecordOutcome>,
    pub celebration: MilestoneCelebration,
    /// Copy of the stats document for rendering
    pub stats: StatsDocument,
    pub today: chrono::NaiveDate,
}

impl App {
    pub fn new(technique: Technique, target_ms: u64) -> Self {
        Self {
            technique,
            target_ms,
            sequencer: Sequencer::new(),
            state: AppState::Session,
            last_record: None,
            last_outcome: None,
            celebration: MilestoneCelebration::new(),
            stats: StatsDocument::default(),
            today: Local::now().date_naive(),
        }
    }

    pub fn start(&mut self) -> Result<(), Box<dyn Error>> {
        self.sequencer
            .start(self.technique.catalog.clone(), self.target_ms)?;
        self.state = AppState::Session;
        self.last_record = None;
        self.last_outcome = None;
        self.celebration.stop();
        Ok(())
    }

    /// Record the run that just stopped or completed and switch to results.
    /// Runs shorter than the recording minimum are shown but not saved.
    pub fn finish(&mut self, aggregator: &Aggregator, width: u16, height: u16) {
        let record = SessionRecord::from_run(
            &self.sequencer,
            &self.technique.id,
            &self.technique.name,
            Local::now(),
        );

        if let Some(record) = &record {
            if record.is_worth_recording() {
                let outcome = aggregator.record_session(record.clone());
                if let Some(days) = outcome.milestone {
                    self.celebration.start(days, width, height);
                }
                self.last_outcome = Some(outcome);
            } else {
                debug!("not recording {}s session", record.duration_seconds);
            }
        }

        self.last_record = record;
        self.refresh_stats(aggregator);
        self.state = AppState::Results;
    }

    pub fn refresh_stats(&mut self, aggregator: &Aggregator) {
        self.stats = aggregator.snapshot();
        self.today = aggregator.today();
    }
}

fn open_store(cfg: &Config) -> Result<Box<dyn StatsStore>, StoreError> {
    match &cfg.stats_file {
        Some(path) => Ok(Box::new(FileStatsStore::with_path(path))),
        None => Ok(Box::new(SqliteStatsStore::open_default()?)),
    }
}

fn load_library(cfg: &Config) -> Result<TechniqueLibrary, Box<dyn Error>> {
    let library = TechniqueLibrary::default();
    match &cfg.techniques_file {
        Some(path) => Ok(library.with_file(path)?),
        None => Ok(library),
    }
}

fn list_techniques(library: &TechniqueLibrary) -> String {
    library
        .iter()
        .map(|t| {
            format!(
                "{:<10} {:<28} {} per cycle\n{:<10} {}",
                t.id,
                t.name,
                format_duration(t.catalog.cycle_duration_ms() / 1000),
                "",
                t.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn stats_report(doc: &StatsDocument, today: chrono::NaiveDate) -> String {
    let summary = views::practice_summary(doc);
    let streak = views::streak_info(doc);
    let mut lines = vec![
        format!(
            "sessions: {} ({} completed)",
            summary.total_sessions, summary.completed_sessions
        ),
        format!(
            "practice: {}",
            format_duration(summary.total_duration_seconds)
        ),
        format!("streak:   {} days (best {})", streak.current, streak.max),
    ];
    if let (Some(next), Some(left)) = (streak.next_milestone, streak.days_to_next()) {
        lines.push(format!("next:     {next} days ({left} to go)"));
    }

    let week: u64 = views::weekly_series(doc, 1, today)
        .iter()
        .map(|p| p.duration_seconds)
        .sum();
    lines.push(format!("last 7 days: {}", format_duration(week)));

    let favorites = views::technique_distribution(doc);
    if !favorites.is_empty() {
        lines.push(String::from("techniques:"));
        for share in favorites {
            lines.push(format!(
                "  {:<28} {:>4} {:>5.1}%",
                share.name, share.count, share.percentage
            ));
        }
    }
    lines.join("\n")
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let cfg = config_store.load().apply(&cli.overrides());
    if let Err(e) = cfg.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::ValueValidation, e).exit();
    }
    if cli.save_config {
        config_store.save(&cfg)?;
    }

    let library = load_library(&cfg)?;
    if cli.list {
        println!("{}", list_techniques(&library));
        return Ok(());
    }

    let aggregator: Aggregator = StatsAggregator::new(open_store(&cfg)?);
    let loaded = aggregator.load_from_storage();
    if loaded.recovered_from_corruption {
        eprintln!("stats were unreadable and have been started afresh");
    }
    if !loaded.success {
        if cli.stats || cli.export.is_some() {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::Io, "could not read stored statistics")
                .exit();
        }
        if !cli.reset_stats {
            eprintln!("could not read stored statistics; new sessions will be saved once it is readable");
        }
    }

    if cli.reset_stats {
        if !aggregator.reset_stats() {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::Io, "failed to delete stored statistics")
                .exit();
        }
        println!("statistics reset");
        return Ok(());
    }
    if let Some(path) = &cli.export {
        let written = aggregator.with_document(|doc| export::export_sessions(doc, path))?;
        println!("exported {written} sessions to {}", path.display());
        return Ok(());
    }
    if cli.stats {
        let today = aggregator.today();
        println!("{}", aggregator.with_document(|doc| stats_report(doc, today)));
        return Ok(());
    }

    let technique = match library.get(&cfg.technique) {
        Ok(t) => t.clone(),
        Err(e) => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::InvalidValue, e).exit();
        }
    };
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut app = App::new(technique, cfg.session_target_ms());
    app.refresh_stats(&aggregator);
    app.start()?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut runner = Runner::new(
        TerminalInput::new(),
        WallClock::new(cfg.tick_interval()),
    );
    let result = start_tui(&mut terminal, &mut app, &aggregator, &mut runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// What the key handler asks the loop to do next
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Finish,
    Restart,
    Quit,
}

fn handle_key(app: &mut App, key: KeyEvent) -> Flow {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        if app.sequencer.is_running() {
            app.sequencer.stop();
            return Flow::Finish;
        }
        return Flow::Quit;
    }

    match app.state {
        AppState::Session => match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Err(e) = app.sequencer.advance() {
                    debug!("advance ignored: {e}");
                }
                if app.sequencer.has_finished() {
                    return Flow::Finish;
                }
                Flow::Continue
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                if app.sequencer.stop() {
                    Flow::Finish
                } else {
                    Flow::Quit
                }
            }
            _ => Flow::Continue,
        },
        AppState::Results => match key.code {
            KeyCode::Char('r') => Flow::Restart,
            KeyCode::Char('s') => {
                app.state = AppState::Stats;
                Flow::Continue
            }
            KeyCode::Esc | KeyCode::Char('q') => Flow::Quit,
            _ => Flow::Continue,
        },
        AppState::Stats => match key.code {
            KeyCode::Char('r') => Flow::Restart,
            KeyCode::Char('b') | KeyCode::Backspace => {
                app.state = AppState::Results;
                Flow::Continue
            }
            KeyCode::Esc | KeyCode::Char('q') => Flow::Quit,
            _ => Flow::Continue,
        },
    }
}

fn start_tui<B: Backend, I: InputSource, P: Pace>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    aggregator: &Aggregator,
    runner: &mut Runner<I, P>,
) -> Result<(), Box<dyn Error>> {
    runner.restart_clock();
    terminal.draw(|f| ui(app, f))?;

    loop {
        let flow = match runner.step() {
            BreathEvent::Tick { elapsed_ms } => {
                let mut flow = Flow::Continue;
                if app.sequencer.is_running() {
                    match app.sequencer.tick(elapsed_ms) {
                        Ok(events) => {
                            if events
                                .iter()
                                .any(|e| matches!(e, SequencerEvent::Completed { .. }))
                            {
                                flow = Flow::Finish;
                            }
                        }
                        Err(e) => warn!("tick rejected: {e}"),
                    }
                }
                app.celebration.update();
                flow
            }
            BreathEvent::Resize => Flow::Continue,
            BreathEvent::Key(key) => handle_key(app, key),
        };

        match flow {
            Flow::Continue => {}
            Flow::Finish => {
                let size = terminal.size().unwrap_or_default();
                app.finish(aggregator, size.width, size.height);
            }
            Flow::Restart => {
                app.start()?;
                runner.restart_clock();
            }
            Flow::Quit => break,
        }

        terminal.draw(|f| ui(app, f))?;
    }

    if app.last_outcome.as_ref().is_some_and(|o| !o.success) && !aggregator.retry_persist() {
        warn!("statistics could not be saved");
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    let screen = crate::ui::screen::current_screen(&app.state);
    screen.render(app, f);
}
