//! Host side effects: locating, installing and driving the `ollama` binary.
//!
//! [`SystemHost`] is the real implementation.  The lifecycle handlers only
//! see the [`Host`] trait so they can be exercised without a machine-wide
//! Ollama install.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use sysinfo::{ProcessRefreshKind, RefreshKind, Signal, UpdateKind};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::settings::Settings;

/// Name of the Ollama executable looked up on `PATH`.
pub const OLLAMA_BINARY: &str = "ollama";

/// Errors from running commands on the host.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Automatic installation is not supported on this platform; download Ollama from https://ollama.com/download")]
    UnsupportedPlatform,
}

/// Side effects the lifecycle needs from the machine it runs on.
pub trait Host {
    /// Path of the `ollama` executable, if it is on `PATH`.
    fn locate_binary(&self) -> Option<PathBuf>;

    /// Run the upstream installer to completion.
    fn run_installer(&self) -> Result<(), HostError>;

    /// Spawn `ollama serve` detached, with output appended to `log_file`.
    /// Returns the child's pid; the handle is not retained.
    fn spawn_server(&self, log_file: &Path) -> Result<u32, HostError>;

    /// Send a termination signal to every running `ollama serve`.
    /// Returns the number of processes signalled.
    fn terminate_server(&self) -> Result<usize, HostError>;

    /// Run `ollama pull <model>` in the foreground.
    fn pull_model(&self, model: &str) -> Result<(), HostError>;
}

/// [`Host`] backed by real processes.
pub struct SystemHost {
    binary: String,
    install_script_url: String,
    serve_host: Option<String>,
}

impl SystemHost {
    pub fn new(settings: &Settings) -> Self {
        Self {
            binary: OLLAMA_BINARY.to_string(),
            install_script_url: settings.install_script_url.clone(),
            serve_host: settings.serve_host(),
        }
    }

    /// Command for the `ollama` binary, pointed at the configured server.
    fn binary_command(&self) -> Command {
        // Prefer the resolved path so a freshly installed binary is found
        // even when PATH caching would miss it.
        let mut cmd = match self.locate_binary() {
            Some(path) => Command::new(path),
            None => Command::new(&self.binary),
        };
        // `serve` listens on it and `pull` connects to it.
        if let Some(ref host) = self.serve_host {
            cmd.env("OLLAMA_HOST", host);
        }
        cmd
    }
}

impl Host for SystemHost {
    fn locate_binary(&self) -> Option<PathBuf> {
        which::which(&self.binary).ok()
    }

    fn run_installer(&self) -> Result<(), HostError> {
        if cfg!(target_os = "macos") && which::which("brew").is_ok() {
            info!("Installing Ollama with Homebrew");
            let mut cmd = Command::new("brew");
            cmd.args(["install", "ollama"]);
            return run_to_completion(cmd, "brew install ollama");
        }

        if cfg!(unix) {
            let script = format!("curl -fsSL {} | sh", self.install_script_url);
            info!(url = %self.install_script_url, "Running upstream install script");
            let mut cmd = Command::new("sh");
            cmd.args(["-c", &script]);
            return run_to_completion(cmd, &script);
        }

        Err(HostError::UnsupportedPlatform)
    }

    fn spawn_server(&self, log_file: &Path) -> Result<u32, HostError> {
        let log_err = |source: std::io::Error| HostError::LogFile {
            path: log_file.to_path_buf(),
            source,
        };
        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(log_err)?;
        let stderr = stdout.try_clone().map_err(log_err)?;

        let mut cmd = self.binary_command();
        cmd.arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        // Own process group, so a Ctrl-C in this terminal does not reach it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|source| HostError::Spawn {
            command: format!("{} serve", self.binary),
            source,
        })?;
        let pid = child.id();
        info!(pid, log = %log_file.display(), "Ollama server spawned");
        Ok(pid)
    }

    fn terminate_server(&self) -> Result<usize, HostError> {
        let sys = sysinfo::System::new_with_specifics(
            RefreshKind::nothing().with_processes(
                ProcessRefreshKind::nothing()
                    .with_cmd(UpdateKind::Always)
                    .with_exe(UpdateKind::Always),
            ),
        );
        let own_pid = std::process::id();

        let mut signalled = 0;
        for process in sys.processes().values() {
            let pid = process.pid().as_u32();
            if pid == own_pid || !is_serve_command(process.cmd(), &self.binary) {
                continue;
            }
            let sent = match process.kill_with(Signal::Term) {
                Some(sent) => sent,
                // TERM is not available on this platform.
                None => process.kill(),
            };
            if sent {
                debug!(pid, "Sent termination signal to Ollama server");
                signalled += 1;
            } else {
                warn!(pid, "Failed to signal Ollama server process");
            }
        }
        Ok(signalled)
    }

    fn pull_model(&self, model: &str) -> Result<(), HostError> {
        let mut cmd = self.binary_command();
        cmd.args(["pull", model]);
        run_to_completion(cmd, &format!("{} pull {model}", self.binary))
    }
}

/// Run `cmd` with inherited stdio and map a non-zero exit to an error.
fn run_to_completion(mut cmd: Command, display: &str) -> Result<(), HostError> {
    let status = cmd.status().map_err(|source| HostError::Spawn {
        command: display.to_string(),
        source,
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(HostError::CommandFailed {
            command: display.to_string(),
            status,
        })
    }
}

/// `true` when `argv` runs `binary` with `serve` as the following argument,
/// e.g. `["/usr/local/bin/ollama", "serve"]`.
pub(crate) fn is_serve_command(argv: &[OsString], binary: &str) -> bool {
    argv.windows(2).any(|pair| {
        let program = Path::new(&pair[0])
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        program.as_deref() == Some(binary) && pair[1] == "serve"
    })
}
