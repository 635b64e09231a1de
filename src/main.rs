mod ui;

use codetype::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, DurationPreset, FileConfigStore},
    error::SessionError,
    language::CodeLanguage,
    logging::init_logging,
    runtime::{spawn_fetch, AppEvent, CrosstermEventSource, EventSource, FixedTicker, Runner, Ticker},
    session::{InputOutcome, Phase, SnippetResult},
    sink::{report_finished, LeaderboardEntry, Profile, Report, UserContext},
    snippets::{EmbeddedSnippets, FixedSnippet, SnippetSource},
    stats::{StatsDb, LEADERBOARD_SIZE},
    trainer::{Delivery, Trainer},
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::File,
    io::{self, stdin},
    path::PathBuf,
    sync::{mpsc::Sender, Arc},
};
use webbrowser::Browser;

/// typing-speed trainer for real source code snippets
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Practice typing real source code against the clock. Results, experience and a leaderboard are kept in a local database."
)]
pub struct Cli {
    /// number of seconds to run the test (30, 60 and 120 are the presets)
    #[clap(short = 'd', long)]
    duration: Option<u64>,

    /// language to pull snippets from
    #[clap(short = 'l', long, value_enum)]
    language: Option<CodeLanguage>,

    /// custom snippet to type instead of the built-in ones
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// name results are recorded under
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// path of the results database
    #[clap(long)]
    db: Option<PathBuf>,

    /// print the top results and exit
    #[clap(long)]
    leaderboard: bool,

    /// write every stored result to a csv file and exit
    #[clap(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,
}

impl Cli {
    /// Overlay command line flags on the stored config
    fn apply_to(&self, config: &mut Config) {
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(language) = self.language {
            config.language = language;
        }
        if let Some(user) = &self.user {
            config.user_name = user.clone();
        }
    }

    fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .or_else(AppDirs::db_path)
            .unwrap_or_else(|| PathBuf::from("codetype_stats.db"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Typing,
    Results,
    Leaderboard,
}

pub struct App {
    pub trainer: Trainer,
    pub state: AppState,
    pub duration_secs: u64,
    pub language: CodeLanguage,
    pub profile: Profile,
    pub report: Option<Report>,
    pub leaderboard: Vec<LeaderboardEntry>,
    db: StatsDb,
    source: Arc<dyn SnippetSource>,
}

impl App {
    pub fn new(
        trainer: Trainer,
        db: StatsDb,
        source: Arc<dyn SnippetSource>,
        profile: Profile,
    ) -> Self {
        Self {
            duration_secs: trainer.session().duration_secs(),
            language: trainer.language(),
            trainer,
            state: AppState::Typing,
            profile,
            report: None,
            leaderboard: Vec::new(),
            db,
            source,
        }
    }

    /// Start over with a fresh session and the current settings
    pub fn restart(&mut self, tx: &Sender<AppEvent>) -> Result<(), SessionError> {
        self.trainer = Trainer::new(self.duration_secs, self.language)?;
        self.state = AppState::Typing;
        self.report = None;
        self.request_snippet(tx);
        Ok(())
    }

    pub fn request_snippet(&mut self, tx: &Sender<AppEvent>) {
        if let Some(ticket) = self.trainer.request_snippet() {
            spawn_fetch(Arc::clone(&self.source), ticket, tx.clone());
        }
    }

    /// Feed an edited copy of the typed text to the trainer
    fn edit_input(&mut self, edit: impl FnOnce(&mut String), tx: &Sender<AppEvent>) -> bool {
        let mut typed = self.trainer.session().typed_text();
        edit(&mut typed);

        let was_idle = self.trainer.phase() == Phase::Idle;
        if self.trainer.apply_input(&typed) == InputOutcome::SnippetComplete {
            self.request_snippet(tx);
        }
        was_idle && self.trainer.phase() == Phase::Active
    }

    pub fn finish(&mut self, result: SnippetResult) {
        let report = report_finished(result, &mut self.profile, &self.db, &self.db);
        self.report = Some(report);
        self.state = AppState::Results;
    }

    pub fn show_leaderboard(&mut self) {
        match self.db.leaderboard(LEADERBOARD_SIZE) {
            Ok(entries) => self.leaderboard = entries,
            Err(e) => tracing::warn!(error = %e, "failed to load leaderboard"),
        }
        self.state = AppState::Leaderboard;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let store = FileConfigStore::new();
    let mut config = store.load();
    cli.apply_to(&mut config);

    if cli.leaderboard {
        let db = StatsDb::open(cli.db_path())?;
        print_leaderboard(&db.leaderboard(LEADERBOARD_SIZE)?);
        return Ok(());
    }

    if let Some(path) = &cli.export_csv {
        let db = StatsDb::open(cli.db_path())?;
        let written = db.export_csv(File::create(path)?)?;
        println!("exported {written} results to {}", path.display());
        return Ok(());
    }

    let trainer = match Trainer::new(config.duration_secs, config.language) {
        Ok(trainer) => trainer,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(log_path) = AppDirs::log_path() {
        if let Err(e) = init_logging(&log_path, &config.log_filter) {
            eprintln!("logging disabled: {e}");
        }
    }
    if let Err(e) = store.save(&config) {
        tracing::warn!(error = %e, "failed to save config");
    }

    let db = StatsDb::open(cli.db_path())?;
    let profile = db.ensure_user(&UserContext::local(config.user_name.as_str()))?;
    let source: Arc<dyn SnippetSource> = match &cli.prompt {
        Some(prompt) => Arc::new(FixedSnippet::new(prompt.clone())),
        None => Arc::new(EmbeddedSnippets::new()),
    };
    let mut app = App::new(trainer, db, source, profile);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    let res = start_tui(&mut terminal, &mut app, runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn print_leaderboard(entries: &[LeaderboardEntry]) {
    println!(
        "{:<5} {:<20} {:>5} {:>9} {:<11} {}",
        "rank", "name", "wpm", "accuracy", "language", "date"
    );
    for entry in entries {
        println!(
            "{:<5} {:<20} {:>5} {:>8}% {:<11} {}",
            entry.rank,
            entry.name,
            entry.wpm,
            entry.accuracy,
            entry.language.to_string(),
            entry.date.format("%Y-%m-%d")
        );
    }
}

fn start_tui<B: Backend, E: EventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut runner: Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    let tx = runner.sender();
    app.request_snippet(&tx);

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            AppEvent::Tick => {
                // the countdown only runs once typing has started
                if app.state == AppState::Typing && app.trainer.phase() == Phase::Active {
                    if let Some(result) = app.trainer.tick() {
                        app.finish(result);
                    }
                }
            }
            AppEvent::Resize => {}
            AppEvent::Snippet(ticket, fetched) => {
                if app.trainer.deliver_snippet(ticket, fetched) == Delivery::Placeholder {
                    tracing::info!(language = %app.language, "typing against placeholder snippet");
                }
            }
            AppEvent::Key(key) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
                {
                    break;
                }
                if key.code == KeyCode::Esc {
                    break;
                }

                match app.state {
                    AppState::Typing => {
                        if handle_typing_key(app, key, &tx)? {
                            runner.reset_ticks();
                        }
                    }
                    AppState::Results => match key.code {
                        KeyCode::Char('r') => app.restart(&tx)?,
                        KeyCode::Char('d') => {
                            app.duration_secs = DurationPreset::cycle(app.duration_secs);
                            app.restart(&tx)?;
                        }
                        KeyCode::Char('l') => app.show_leaderboard(),
                        KeyCode::Char('t') => share(app),
                        _ => {}
                    },
                    AppState::Leaderboard => match key.code {
                        KeyCode::Char('r') => app.restart(&tx)?,
                        KeyCode::Char('b') | KeyCode::Backspace => {
                            app.state = if app.report.is_some() {
                                AppState::Results
                            } else {
                                AppState::Typing
                            };
                        }
                        _ => {}
                    },
                }
            }
        }
    }

    Ok(())
}

/// Returns true when this key started the session clock
fn handle_typing_key(
    app: &mut App,
    key: KeyEvent,
    tx: &Sender<AppEvent>,
) -> Result<bool, SessionError> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('d') => {
                if let Some(result) = app.trainer.end_now() {
                    app.finish(result);
                }
            }
            KeyCode::Char('r') => app.restart(tx)?,
            KeyCode::Char('l') => app.show_leaderboard(),
            _ => {}
        }
        return Ok(false);
    }

    let started = match key.code {
        KeyCode::Char(c) => app.edit_input(|typed| typed.push(c), tx),
        KeyCode::Enter => app.edit_input(|typed| typed.push('\n'), tx),
        KeyCode::Backspace => app.edit_input(
            |typed| {
                typed.pop();
            },
            tx,
        ),
        _ => false,
    };
    Ok(started)
}

fn share(app: &App) {
    let Some(report) = &app.report else {
        return;
    };
    if Browser::is_available() {
        let url = format!(
            "https://twitter.com/intent/tweet?text={}%20wpm%20%2F%20{}%25%20acc%20typing%20{}%20code",
            report.score.wpm,
            report.score.accuracy,
            report.result.language.slug()
        );
        webbrowser::open(&url).unwrap_or_default();
    }
}
