//! `docsbot` – manage the local Ollama runtime used by the docs bot.
//!
//! ```text
//! docsbot {install|pull|start|stop|status|test|setup}
//! ```
//!
//! With no subcommand, `setup` runs: install, start, pull, status, then the
//! `.env` lines the bot needs.  `OLLAMA_MODEL` and `OLLAMA_BASE_URL` (also
//! read from a `.env` in the working directory) pick the model and server.
//!
//! Exit status is `0` on success, `1` on any failure, `130` after Ctrl-C.

mod console;

use clap::{CommandFactory, Parser, ValueEnum};
use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use console::{ConsoleReporter, report_failure};
use docsbot_ollama::{Lifecycle, LifecycleError, Settings};

#[derive(Debug, Parser)]
#[command(
    name = "docsbot",
    version,
    about = "Install, run and check the local Ollama runtime used by the docs bot"
)]
struct Cli {
    #[arg(value_enum, default_value_t = Command::Setup)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Command {
    /// Install Ollama if it is not on PATH
    Install,
    /// Pull the configured model, starting the server if needed
    Pull,
    /// Start the Ollama server in the background
    Start,
    /// Stop running Ollama servers
    Stop,
    /// Show installation, server and model status
    Status,
    /// Send a test prompt to the configured model
    Test,
    /// install + start + pull + status
    Setup,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help / --version go to stdout and are not failures.
            let _ = e.print();
            if !e.use_stderr() {
                return ExitCode::SUCCESS;
            }
            // Clap gives an unknown command only a tip, without usage.
            if e.kind() == clap::error::ErrorKind::InvalidValue {
                eprintln!("\n{}", Cli::command().render_usage());
            }
            return ExitCode::FAILURE;
        }
    };

    // Load .env first so RUST_LOG and OLLAMA_* from it take effect.
    let dotenv = dotenvy::dotenv();
    let _guard = docsbot_ollama::init_tracing("docsbot");
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to load .env"),
    }

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            report_failure(&e.to_string(), None);
            return ExitCode::FAILURE;
        }
    };
    debug!(?settings, command = ?cli.command, "Resolved settings");

    let interrupted = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(interrupted.clone());

    let lifecycle = match Lifecycle::system(settings, Box::new(ConsoleReporter)) {
        Ok(lifecycle) => lifecycle.with_interrupt_flag(interrupted),
        Err(e) => return fail(&e),
    };

    match dispatch(&lifecycle, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn dispatch(lifecycle: &Lifecycle, command: Command) -> Result<(), LifecycleError> {
    match command {
        Command::Install => lifecycle.install(),
        Command::Pull => lifecycle.pull(),
        Command::Start => lifecycle.start(),
        Command::Stop => lifecycle.stop(),
        Command::Status => lifecycle.status().map(|_| ()),
        Command::Test => lifecycle.test().map(|_| ()),
        Command::Setup => lifecycle.setup(),
    }
}

fn fail(err: &LifecycleError) -> ExitCode {
    report_failure(&err.to_string(), err.hint().as_deref());
    ExitCode::from(err.exit_code())
}

/// First Ctrl-C aborts the current wait; a second one exits immediately.
fn install_ctrlc_handler(interrupted: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        if interrupted.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!();
        eprintln!(
            "{}",
            "⚠  Ctrl-C received – stopping after the current step (press again to quit now)"
                .yellow()
                .bold()
        );
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }
}
