// panedash-cli/src/main.rs
mod app;
mod logging;

use clap::Parser;
use crossbeam::channel::{Receiver, bounded, unbounded};
use crossbeam::select;
use crossterm::{
    event::{self, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    io::{self, Stdout},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
    thread,
};

use panedash_core::{ConfigFile, ConfigWatcher, GenerationBuilder, Supervisor, WidgetRegistry};

use crate::app::Action;

/// Terminal dashboard of live widgets, rebuilt whenever its config file changes
#[derive(Debug, Parser)]
#[command(name = "panedash", version, about)]
struct Cli {
    /// Config file to load (default: ./panedash.toml, then the user config dir)
    #[arg(short, long, env = "PANEDASH_CONFIG")]
    config: Option<PathBuf>,

    /// Where to write logs
    #[arg(long, env = "PANEDASH_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Log at debug level and honour RUST_LOG
    #[arg(long)]
    debug: bool,

    /// Do not reload when the config file changes
    #[arg(long)]
    no_watch: bool,
}

type Term = Terminal<CrosstermBackend<Stdout>>;

/// Restores the terminal when dropped, including while unwinding
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<(Self, Term)> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err);
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok((Self, terminal))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "exiting");
            eprintln!("panedash: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = cli.log_file.clone().unwrap_or_else(logging::default_log_path);
    let _log_guard = logging::init(cli.debug, &log_path)?;
    logging::install_panic_hook();

    let config_path = ConfigFile::resolve_path(cli.config.clone())?;
    if ConfigFile::write_default(&config_path)? {
        tracing::info!(path = %config_path.display(), "wrote starter config");
    }

    let mut registry = WidgetRegistry::new();
    panedash_widgets::register_builtin(&mut registry);
    tracing::debug!(types = ?registry.list_widgets(), "widget types registered");

    let builder = GenerationBuilder::new(Arc::new(registry));
    let supervisor = Arc::new(Supervisor::start(&config_path, builder)?);

    let (trigger_tx, trigger_rx) = bounded(1);
    let reloader = supervisor.spawn_reloader(trigger_rx)?;
    let watcher = if cli.no_watch {
        drop(trigger_tx);
        None
    } else {
        match ConfigWatcher::spawn(&config_path, trigger_tx) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!(error = %err, "hot reload disabled");
                None
            }
        }
    };

    let result = run_ui(&supervisor);

    // Dropping the watcher releases the last trigger sender, ending the reloader
    drop(watcher);
    if let Err(err) = supervisor.shutdown() {
        tracing::warn!(error = %err, "shutdown");
    }
    if reloader.join().is_err() {
        tracing::error!("config reloader panicked");
    }

    result.map_err(Into::into)
}

fn run_ui(supervisor: &Supervisor) -> io::Result<()> {
    let (_guard, mut terminal) = TerminalGuard::enter()?;
    let input = spawn_input_reader()?;
    render_loop(&mut terminal, supervisor, &input)
}

/// Forward terminal events to the render loop. Blocks in `event::read`, so
/// the thread is left to die with the process.
fn spawn_input_reader() -> io::Result<Receiver<CEvent>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("input".to_string())
        .spawn(move || {
            loop {
                match event::read() {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "terminal input failed");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// Sole consumer of the live generation's redraw bus and the only code that
/// touches the terminal.
///
/// A swap closes the old bus, which wakes the select so the next iteration
/// picks up the new generation.
fn render_loop(terminal: &mut Term, supervisor: &Supervisor, input: &Receiver<CEvent>) -> io::Result<()> {
    let mut dirty = true;

    loop {
        let generation = supervisor.live();

        if dirty {
            let reload_error = supervisor.last_error();
            terminal.draw(|frame| app::draw(frame, &generation, reload_error.as_deref()))?;
            dirty = false;
        }

        select! {
            recv(generation.redraw().receiver()) -> _ => { dirty = true }
            recv(input) -> msg => match msg {
                Ok(CEvent::Key(key)) => {
                    // `generation` may have been retired while we waited
                    if app::dispatch_key(supervisor, key) == Action::Quit {
                        tracing::info!("quit requested");
                        return Ok(());
                    }
                    dirty = true;
                }
                Ok(CEvent::Resize(..)) => dirty = true,
                Ok(_) => {}
                Err(_) => return Err(io::Error::other("terminal input closed")),
            },
        }
    }
}
