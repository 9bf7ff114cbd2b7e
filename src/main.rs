mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    collections::VecDeque,
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, Instant},
};

use wordrill::{
    app_dirs::AppDirs,
    audio::{CommandSpeaker, MutedSpeaker, Speaker},
    backend::{SessionBackend, SqliteSessionBackend},
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    controller::{
        Notice, PracticeController, PracticeView, SessionParams, ViewPhase, ViewSignal,
    },
    logging::init_file_logging,
    model::{PlanId, ResultSummary, ScheduleId},
    runtime::{
        CrosstermEventSource, FixedTicker, PracticeEvent, PracticeEventSource, Runner, Ticker,
    },
    wordbook,
};

const TICK_RATE_MS: u64 = 100;
const TOAST_MS: u64 = 3000;

/// vocabulary spelling drills in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Practice the words of a study plan in three steps per word: copy it, spell it from cues, then spell it from its pronunciation alone."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// path of the SQLite database (defaults to the state directory)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// never run the speech program
    #[clap(long, global = true)]
    no_audio: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// start a new practice session for a plan's schedule occurrence
    Practice {
        #[clap(long)]
        plan: PlanId,
        #[clap(long)]
        schedule: ScheduleId,
    },
    /// continue an unfinished session
    Resume { session_id: String },
    /// append the words of a CSV file (word,meaning,ipa,syllables) to a plan
    Import {
        #[clap(long)]
        plan: PlanId,
        csv: PathBuf,
    },
    /// list the sessions of a plan
    Sessions {
        #[clap(long)]
        plan: PlanId,
    },
    /// abandon a session for good
    Cancel { session_id: String },
    /// show where settings live and what is in effect
    Config {
        /// write the effective settings (defaults filled in) to the config file
        #[clap(long)]
        init: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Practice,
    Results(ResultSummary),
}

#[derive(Debug)]
pub struct App {
    pub state: AppState,
    pub view: PracticeView,
    pub toast: Option<Notice>,
}

type Controller = PracticeController<SqliteSessionBackend, Box<dyn Speaker>, SystemClock>;

/// Notices waiting to be shown, one at a time for `TOAST_MS` each.
#[derive(Debug, Default)]
struct Toasts {
    queue: VecDeque<Notice>,
    shown_until: Option<Instant>,
}

impl Toasts {
    fn extend(&mut self, notices: impl IntoIterator<Item = Notice>) {
        self.queue.extend(notices);
    }

    /// The toast to display at `now`; moves on once the front one has been up
    /// long enough.
    fn current(&mut self, now: Instant) -> Option<Notice> {
        if self.shown_until.is_some_and(|until| now >= until) {
            self.queue.pop_front();
            self.shown_until = None;
        }
        let front = self.queue.front()?;
        if self.shown_until.is_none() {
            self.shown_until = Some(now + Duration::from_millis(TOAST_MS));
        }
        Some(front.clone())
    }
}

enum LoopEnd {
    Quit,
    Reload,
}

enum KeyOutcome {
    Continue,
    Quit,
    Reload,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = FileConfigStore::new();
    let config = store.load();

    if let Some(log_path) = AppDirs::log_path() {
        init_file_logging(&log_path);
    }

    if let Command::Config { init } = cli.command {
        if init {
            store.save(&config)?;
            println!("Wrote {}", store.path().display());
        } else {
            println!("# {}", store.path().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        return Ok(());
    }

    let db_path = cli
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .or_else(AppDirs::db_path)
        .ok_or("could not determine a database location, pass --db")?;
    let mut backend = SqliteSessionBackend::open(&db_path)?;

    match cli.command.clone() {
        Command::Import { plan, csv } => {
            let count = wordbook::import_file(&mut backend, plan, &csv)?;
            println!("Imported {count} words into plan {plan}");
        }
        Command::Sessions { plan } => {
            let sessions = backend.list_sessions(plan)?;
            if sessions.is_empty() {
                println!("No sessions for plan {plan}");
            }
            for s in sessions {
                println!(
                    "{}  schedule {:<4} {:<9} {:>3}/{:<3} steps  {}",
                    s.session_id,
                    s.schedule_id,
                    s.status.to_string(),
                    s.steps_submitted,
                    s.total_steps,
                    s.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Cancel { session_id } => {
            backend.cancel_session(&session_id)?;
            println!("Cancelled session {session_id}");
        }
        Command::Practice { plan, schedule } => {
            run_practice(&cli, &config, backend, SessionParams::new_session(plan, schedule))?;
        }
        Command::Resume { session_id } => {
            run_practice(&cli, &config, backend, SessionParams::resume(session_id))?;
        }
        Command::Config { .. } => {}
    }

    Ok(())
}

fn run_practice(
    cli: &Cli,
    config: &Config,
    backend: SqliteSessionBackend,
    params: SessionParams,
) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;

    let events = CrosstermEventSource::new();
    let speaker: Box<dyn Speaker> = if cli.no_audio {
        Box::new(MutedSpeaker::new(events.sender()))
    } else {
        Box::new(CommandSpeaker::new(
            config.tts_program.clone(),
            config.tts_args.clone(),
            events.sender(),
        ))
    };
    let clock = SystemClock::new();
    let mut controller = PracticeController::new(backend, speaker, clock, config.engine());
    if let Err(e) = controller.initialize(params) {
        tracing::error!(error = %e, "Could not start practice");
    }

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));
    let result = loop {
        match start_tui(&mut terminal, &mut controller, &runner, clock) {
            Ok(LoopEnd::Reload) => controller = controller.reload(),
            Ok(LoopEnd::Quit) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    controller.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    if let Some(session) = controller.session() {
        if controller.view().phase != ViewPhase::Completed {
            println!(
                "Session {} saved, continue with `wordrill resume {}`",
                session.session_id, session.session_id
            );
        }
    }

    result
}

fn start_tui<B: Backend, E: PracticeEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    controller: &mut Controller,
    runner: &Runner<E, T>,
    clock: SystemClock,
) -> Result<LoopEnd, Box<dyn Error>> {
    let mut app = App {
        state: AppState::Practice,
        view: controller.view(),
        toast: None,
    };
    let mut toasts = Toasts::default();

    loop {
        controller.poll_timers();

        toasts.extend(controller.take_notices());
        app.toast = toasts.current(Instant::now());

        match controller.take_signal() {
            Some(ViewSignal::ShowResults(summary)) => app.state = AppState::Results(summary),
            Some(ViewSignal::BackToPlan { .. }) => return Ok(LoopEnd::Quit),
            None => {}
        }

        app.view = controller.view();
        terminal.draw(|f| f.render_widget(&app, f.area()))?;

        let deadline = controller
            .next_deadline()
            .map(|due| Duration::from_millis(due.saturating_sub(clock.now_ms())));

        match runner.step_until(deadline) {
            PracticeEvent::Tick | PracticeEvent::Resize => {}
            PracticeEvent::PlaybackFinished { ticket, outcome } => {
                controller.on_playback_finished(ticket, outcome)
            }
            PracticeEvent::Key(key) => match handle_key(controller, &app, key) {
                KeyOutcome::Continue => {}
                KeyOutcome::Quit => return Ok(LoopEnd::Quit),
                KeyOutcome::Reload => return Ok(LoopEnd::Reload),
            },
        }
    }
}

fn handle_key(controller: &mut Controller, app: &App, key: KeyEvent) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Continue;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if matches!(app.state, AppState::Results(_)) {
        let quit = matches!(key.code, KeyCode::Esc | KeyCode::Enter)
            || (ctrl && key.code == KeyCode::Char('c'));
        return if quit {
            KeyOutcome::Quit
        } else {
            KeyOutcome::Continue
        };
    }

    if matches!(app.view.phase, ViewPhase::Failed(_)) && key.code == KeyCode::Char('r') {
        return KeyOutcome::Reload;
    }

    match key.code {
        KeyCode::Esc => controller.exit(),
        KeyCode::Char('c') if ctrl => controller.exit(),
        KeyCode::Char('p') if ctrl => {
            let toggled = if controller.is_paused() {
                controller.resume()
            } else {
                controller.pause()
            };
            if let Err(e) = toggled {
                tracing::debug!(error = %e, "Pause toggle rejected");
            }
        }
        KeyCode::Char('s') if ctrl => controller.play_pronunciation(),
        KeyCode::Char('f') if ctrl => {
            if controller.is_exhausted() {
                if let Err(e) = controller.finish() {
                    tracing::debug!(error = %e, "Completion retry failed");
                }
            }
        }
        KeyCode::Enter => {
            controller.submit();
        }
        KeyCode::Backspace => controller.backspace(),
        KeyCode::Char(c) if !ctrl => controller.type_char(c),
        _ => {}
    }
    KeyOutcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordrill::controller::NoticeLevel;

    #[test]
    fn cli_parses_practice_with_global_flags() {
        let cli = Cli::try_parse_from([
            "wordrill",
            "practice",
            "--plan",
            "3",
            "--schedule",
            "9",
            "--no-audio",
            "--db",
            "/tmp/w.db",
        ])
        .unwrap();
        assert!(cli.no_audio);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/w.db")));
        match cli.command {
            Command::Practice { plan, schedule } => assert_eq!((plan, schedule), (3, 9)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_requires_schedule_for_practice() {
        assert!(Cli::try_parse_from(["wordrill", "practice", "--plan", "3"]).is_err());
    }

    fn notice(message: &str) -> Notice {
        Notice {
            level: NoticeLevel::Info,
            message: message.to_string(),
        }
    }

    #[test]
    fn toasts_are_shown_one_after_another() {
        let start = Instant::now();
        let mut toasts = Toasts::default();
        toasts.extend(vec![notice("Resumed practice session"), notice("Could not complete")]);

        assert_eq!(toasts.current(start), Some(notice("Resumed practice session")));
        let later = start + Duration::from_millis(TOAST_MS - 1);
        assert_eq!(toasts.current(later), Some(notice("Resumed practice session")));

        let second = start + Duration::from_millis(TOAST_MS);
        assert_eq!(toasts.current(second), Some(notice("Could not complete")));
        toasts.extend(vec![notice("Session paused")]);
        let third = second + Duration::from_millis(TOAST_MS);
        assert_eq!(toasts.current(third), Some(notice("Session paused")));
        assert_eq!(toasts.current(third + Duration::from_millis(TOAST_MS)), None);
    }

    #[test]
    fn cli_parses_config_init() {
        let cli = Cli::try_parse_from(["wordrill", "config", "--init"]).unwrap();
        assert!(matches!(cli.command, Command::Config { init: true }));
    }

    #[test]
    fn cli_parses_import() {
        let cli = Cli::try_parse_from(["wordrill", "import", "--plan", "2", "words.csv"]).unwrap();
        match cli.command {
            Command::Import { plan, csv } => {
                assert_eq!(plan, 2);
                assert_eq!(csv, PathBuf::from("words.csv"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
