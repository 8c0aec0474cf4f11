mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use digita::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    profile::{Aggregator, MemoryProfiles, ProfileDb, UserProgress},
    runtime::{AppEvent, CrosstermEventSource, EventSource, Runner, FRAME_INTERVAL},
    session::{Mode, Phase, SessionEvent, SessionMachine},
    texts::{PoolTextSource, TextSource},
    timer::{IntervalTimer, Timer},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin, Write},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// terminal typing trainer: beginner drills and a timed challenge game
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    version,
    about,
    long_about = "A typing trainer with a guided beginner drill and a timed challenge game with lives, combo multiplier and score. Progress is tracked per user."
)]
pub struct Cli {
    /// sign in as this user and skip the login screen
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// practice mode to open with
    #[clap(short = 'm', long, value_enum)]
    mode: Option<Mode>,

    /// challenge length in seconds (invalid values fall back to 60)
    #[clap(short = 'd', long)]
    duration: Option<String>,

    /// starting lives in challenge mode, 1 to 99 (invalid values fall back to 3)
    #[clap(short = 'l', long)]
    lives: Option<String>,

    /// custom text for the beginner drill
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// use the light theme
    #[clap(long)]
    light: bool,

    /// disable the terminal bell cues
    #[clap(long)]
    mute: bool,
}

impl Cli {
    /// Fold command line overrides into the stored config.
    fn apply_to(&self, cfg: &mut Config) {
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        if self.duration.is_some() || self.lives.is_some() {
            let settings = cfg
                .challenge_settings()
                .with_overrides(self.duration.as_deref(), self.lives.as_deref());
            cfg.challenge_duration_secs = settings.duration_secs as i64;
            cfg.challenge_lives = settings.lives as i64;
        }
        if self.light {
            cfg.theme = digita::config::Theme::Light;
        }
        if self.mute {
            cfg.sound = false;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Practice,
    Results,
    Profile,
}

pub struct App {
    pub session: SessionMachine,
    pub screen: Screen,
    pub config: Config,
    pub login_input: String,
    pub notice: Option<String>,
    pub progress: Option<UserProgress>,
    pub confirm_reset: bool,
    pub should_quit: bool,
    config_store: FileConfigStore,
    bell: bool,
}

impl App {
    pub fn new(
        config: Config,
        config_store: FileConfigStore,
        texts: Box<dyn TextSource>,
        aggregator: Box<dyn Aggregator>,
    ) -> Self {
        let session = SessionMachine::new(config.mode, IntervalTimer::new(), texts, aggregator)
            .with_settings(config.challenge_settings());

        Self {
            session,
            screen: Screen::Login,
            login_input: config.last_user.clone().unwrap_or_default(),
            config,
            notice: None,
            progress: None,
            confirm_reset: false,
            should_quit: false,
            config_store,
            bell: false,
        }
    }

    pub fn sign_in(&mut self, username: &str) {
        match self.session.sign_in(username) {
            Ok(()) => {
                self.config.last_user = self.session.user().map(str::to_string);
                self.save_config();
                self.refresh_progress();
                self.notice = None;
                self.screen = Screen::Practice;
            }
            Err(err) => self.notice = Some(format!("Enter a username ({err})")),
        }
    }

    pub fn sign_out(&mut self) {
        self.session.sign_out();
        self.progress = None;
        self.login_input.clear();
        self.screen = Screen::Login;
    }

    /// Take (and clear) a pending bell request.
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }

    fn save_config(&self) {
        if let Err(err) = self.config_store.save(&self.config) {
            tracing::warn!("could not save config: {err}");
        }
    }

    fn refresh_progress(&mut self) {
        match self.session.progress() {
            Ok(progress) => self.progress = progress,
            Err(err) => {
                tracing::warn!("could not load progress: {err}");
                self.notice = Some("Progress unavailable".to_string());
            }
        }
    }

    fn apply_events(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            match event {
                SessionEvent::Cue { positive: false } if self.config.sound => self.bell = true,
                SessionEvent::Ended { .. } => {
                    if self.config.sound {
                        self.bell = true;
                    }
                    self.refresh_progress();
                    self.screen = Screen::Results;
                }
                _ => {}
            }
        }
    }

    fn start(&mut self) {
        match self.session.start() {
            Ok(events) => {
                self.notice = None;
                self.apply_events(events);
            }
            Err(err) => self.notice = Some(err.to_string()),
        }
    }

    fn play_again(&mut self) {
        self.session.reset(true);
        self.screen = Screen::Practice;
        self.start();
    }

    fn type_char(&mut self, c: char) {
        match self.session.phase() {
            Phase::Idle => self.start(),
            Phase::Ended => return,
            Phase::Active => {}
        }
        let mut next = self.session.typed().to_string();
        next.push(c);
        self.feed(&next);
    }

    fn backspace(&mut self) {
        if !self.session.is_active() {
            return;
        }
        let mut next = self.session.typed().to_string();
        next.pop();
        self.feed(&next);
    }

    fn feed(&mut self, typed: &str) {
        match self.session.on_input(typed) {
            Ok(events) => self.apply_events(events),
            Err(err) => self.notice = Some(err.to_string()),
        }
    }

    fn switch_mode(&mut self) {
        let mode = self.session.mode().toggled();
        self.session.set_mode(mode);
        self.config.mode = mode;
        self.save_config();
    }

    pub fn on_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Tick => self.on_tick(),
            AppEvent::Resize => {}
            AppEvent::Key(key) => self.on_key(key),
            AppEvent::Disconnected => {
                tracing::warn!("terminal input closed, shutting down");
                self.should_quit = true;
            }
        }
    }

    pub fn on_tick(&mut self) {
        let events = self.session.poll_timer();
        self.apply_events(events);
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.screen {
            Screen::Login => self.on_login_key(key),
            Screen::Practice if ctrl => self.on_practice_shortcut(key),
            Screen::Practice => self.on_practice_key(key),
            Screen::Results => self.on_results_key(key),
            Screen::Profile => self.on_profile_key(key),
        }
    }

    fn on_login_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => {
                let username = self.login_input.clone();
                self.sign_in(&username);
            }
            KeyCode::Backspace => {
                self.login_input.pop();
            }
            KeyCode::Char(c) => self.login_input.push(c),
            _ => {}
        }
    }

    fn on_practice_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => self.switch_mode(),
            KeyCode::Enter => match self.session.phase() {
                Phase::Idle => self.start(),
                Phase::Ended => self.play_again(),
                Phase::Active => {}
            },
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c) => self.type_char(c),
            _ => {}
        }
    }

    fn on_practice_shortcut(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('n') => self.session.new_text(),
            KeyCode::Char('r') => {
                self.session.reset(true);
                self.notice = None;
            }
            KeyCode::Char('p') if self.session.is_active() => {
                self.notice = Some("Finish or reset (^r) the session to open the profile".to_string());
            }
            KeyCode::Char('p') => {
                self.refresh_progress();
                self.notice = None;
                self.screen = Screen::Profile;
            }
            KeyCode::Char('t') => {
                self.config.theme = self.config.theme.toggled();
                self.save_config();
            }
            KeyCode::Char('s') => {
                self.config.sound = !self.config.sound;
                self.save_config();
            }
            KeyCode::Char('l') => self.sign_out(),
            _ => {}
        }
    }

    fn on_results_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char('r') => self.play_again(),
            KeyCode::Char('n') => {
                self.session.new_text();
                self.screen = Screen::Practice;
            }
            KeyCode::Char('p') => self.screen = Screen::Profile,
            KeyCode::Esc => self.screen = Screen::Practice,
            KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    fn on_profile_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('x') => {
                self.confirm_reset = true;
                self.notice = Some("Reset all progress for this user? (y/n)".to_string());
            }
            KeyCode::Char('y') if self.confirm_reset => {
                self.confirm_reset = false;
                match self.session.reset_progress() {
                    Ok(progress) => {
                        self.progress = progress;
                        self.notice = Some("Progress reset".to_string());
                    }
                    Err(err) => {
                        tracing::warn!("could not reset progress: {err}");
                        self.notice = Some("Could not reset progress".to_string());
                    }
                }
            }
            KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('q') if !self.confirm_reset => {
                self.notice = None;
                self.screen = Screen::Practice;
            }
            _ => {
                self.confirm_reset = false;
                self.notice = None;
            }
        }
    }
}

fn init_logging() -> Option<WorkerGuard> {
    let log_dir = AppDirs::log_dir()?;
    std::fs::create_dir_all(&log_dir).ok()?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "digita.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // file only: the terminal belongs to the TUI
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();

    tracing::info!("logging to {}", log_dir.display());
    Some(guard)
}

fn open_profiles() -> Box<dyn Aggregator> {
    match ProfileDb::open_default() {
        Ok(db) => Box::new(db),
        Err(err) => {
            tracing::warn!("profile database unavailable, progress will not be saved: {err}");
            Box::new(MemoryProfiles::new())
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let _log_guard = init_logging();

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply_to(&mut config);

    let mut texts = PoolTextSource::new();
    if let Some(prompt) = cli.prompt.clone() {
        texts = texts.with_beginner_text(prompt);
    }

    let mut app = App::new(config, config_store, Box::new(texts), open_profiles());
    app.save_config();
    if let Some(user) = cli.user.as_deref() {
        app.sign_in(user);
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(CrosstermEventSource::new(), FRAME_INTERVAL);
    let outcome = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B, E>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend + Write,
    E: EventSource,
{
    terminal.draw(|f| ui::draw(app, f))?;

    while !app.should_quit {
        app.on_event(runner.step(app.session.timer().until_next_tick()));

        terminal.draw(|f| ui::draw(app, f))?;

        if app.take_bell() {
            let backend = terminal.backend_mut();
            backend.write_all(b"\x07")?;
            Write::flush(backend)?;
        }
    }

    Ok(())
}
