//! [`Lifecycle`] – the seven handlers behind the `docsbot` subcommands.
//!
//! No state is kept between calls: every handler re-queries the binary,
//! the process table or the HTTP API before acting.  That makes each
//! handler idempotent but also check-then-act, so two concurrent
//! invocations (e.g. two `start`s) can race and are not supported.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use docsbot_types::{GenerateOutcome, ModelPresence, ModelTag, StatusReport};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::api::{ApiError, OllamaClient, ServerApi};
use crate::host::{Host, HostError, SystemHost};
use crate::report::Reporter;
use crate::settings::Settings;

/// Prompt sent by [`Lifecycle::test`].
pub const TEST_PROMPT: &str = "Say hello and tell me what you are in one sentence.";

/// Command name used in corrective hints.
const CLI_NAME: &str = "docsbot";

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Ollama is not installed")]
    NotInstalled,

    #[error("The installer finished but `ollama` is still not on PATH")]
    InstallFailed,

    #[error("Ollama is not running at {base_url}")]
    NotRunning { base_url: String },

    #[error("Model '{model}' not found in Ollama. Available models: {}", list_or_none(.available))]
    ModelMissing { model: String, available: Vec<String> },

    #[error("Ollama did not become ready within {}s", .waited.as_secs())]
    StartTimeout { waited: Duration, log_file: PathBuf },

    #[error("Ollama is still running after signalling {signalled} process(es)")]
    StopFailed { signalled: usize },

    #[error("Interrupted")]
    Interrupted,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

impl LifecycleError {
    /// Corrective action to show under the error, if there is one.
    pub fn hint(&self) -> Option<String> {
        match self {
            LifecycleError::NotInstalled => Some(format!("Run: {CLI_NAME} install")),
            LifecycleError::InstallFailed => Some(
                "Open a new shell, or install manually from https://ollama.com/download".to_string(),
            ),
            LifecycleError::NotRunning { .. } => Some(format!("Run: {CLI_NAME} start")),
            LifecycleError::ModelMissing { model, .. } => {
                Some(format!("Run: {CLI_NAME} pull  (or: ollama pull {model})"))
            }
            LifecycleError::StartTimeout { log_file, .. } => {
                Some(format!("Check the server log: {}", log_file.display()))
            }
            LifecycleError::StopFailed { .. } => Some(
                "If Ollama runs as a system service, stop it there (e.g. `sudo systemctl stop ollama`)"
                    .to_string(),
            ),
            LifecycleError::Interrupted | LifecycleError::Host(_) | LifecycleError::Api(_) => None,
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            LifecycleError::Interrupted => 130,
            _ => 1,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timing
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed waits used by the handlers.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Delay between readiness checks after spawning the server.
    pub poll_interval: Duration,
    /// Number of readiness checks before giving up.
    pub startup_attempts: u32,
    /// Extra settle time after `pull` had to start the server.
    pub pull_grace: Duration,
    /// Wait between signalling the server and re-checking it.
    pub stop_grace: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            startup_attempts: 30,
            pull_grace: Duration::from_secs(3),
            stop_grace: Duration::from_secs(2),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

pub struct Lifecycle {
    settings: Settings,
    timing: Timing,
    host: Box<dyn Host>,
    api: Box<dyn ServerApi>,
    reporter: Box<dyn Reporter>,
    interrupted: Arc<AtomicBool>,
}

impl Lifecycle {
    pub fn new(
        settings: Settings,
        host: Box<dyn Host>,
        api: Box<dyn ServerApi>,
        reporter: Box<dyn Reporter>,
    ) -> Self {
        Self {
            settings,
            timing: Timing::default(),
            host,
            api,
            reporter,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Lifecycle driving the real `ollama` binary and HTTP API.
    pub fn system(settings: Settings, reporter: Box<dyn Reporter>) -> Result<Self, LifecycleError> {
        let host = SystemHost::new(&settings);
        let api = OllamaClient::new(&settings)?;
        Ok(Self::new(settings, Box::new(host), Box::new(api), reporter))
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Share a flag that aborts waits with [`LifecycleError::Interrupted`]
    /// once set (the CLI sets it from its Ctrl-C handler).
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    // ── Checks ──────────────────────────────────────────────────────────────

    /// Path of the installed binary, if any.
    pub fn installation(&self) -> Option<PathBuf> {
        self.host.locate_binary()
    }

    pub fn is_running(&self) -> bool {
        self.api.ping()
    }

    pub fn model_presence(&self) -> Result<ModelPresence, ApiError> {
        let models = self.api.list_models()?;
        Ok(ModelPresence::from_tags(&self.settings.model, &models))
    }

    pub fn is_model_available(&self) -> bool {
        self.model_presence()
            .map(|p| p.is_available())
            .unwrap_or(false)
    }

    fn require_installed(&self) -> Result<PathBuf, LifecycleError> {
        self.installation().ok_or(LifecycleError::NotInstalled)
    }

    fn not_running(&self) -> LifecycleError {
        LifecycleError::NotRunning {
            base_url: self.settings.base_url.clone(),
        }
    }

    fn pause(&self, duration: Duration) -> Result<(), LifecycleError> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Err(LifecycleError::Interrupted);
        }
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
        if self.interrupted.load(Ordering::SeqCst) {
            return Err(LifecycleError::Interrupted);
        }
        Ok(())
    }

    // ── Handlers ────────────────────────────────────────────────────────────

    #[instrument(skip(self))]
    pub fn install(&self) -> Result<(), LifecycleError> {
        if let Some(path) = self.installation() {
            self.reporter
                .warn(&format!("Ollama is already installed at {}", path.display()));
            return Ok(());
        }

        self.reporter.info("Installing Ollama...");
        self.host.run_installer()?;

        match self.installation() {
            Some(path) => {
                info!(path = %path.display(), "Ollama installed");
                self.reporter
                    .success(&format!("Ollama installed at {}", path.display()));
                Ok(())
            }
            None => Err(LifecycleError::InstallFailed),
        }
    }

    #[instrument(skip(self), fields(model = %self.settings.model))]
    pub fn pull(&self) -> Result<(), LifecycleError> {
        self.require_installed()?;

        if !self.is_running() {
            self.reporter
                .info("Ollama is not running, starting it first...");
            self.start()?;
            self.pause(self.timing.pull_grace)?;
        }

        let model = &self.settings.model;
        self.reporter.info(&format!("Pulling model {model}..."));
        self.host.pull_model(model)?;
        self.reporter.success(&format!("Model {model} is ready"));
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.require_installed()?;

        if self.is_running() {
            self.reporter.warn(&format!(
                "Ollama is already running at {}",
                self.settings.base_url
            ));
            return Ok(());
        }

        self.reporter.info("Starting Ollama server...");
        let pid = self.host.spawn_server(&self.settings.log_file)?;

        for attempt in 1..=self.timing.startup_attempts {
            if self.is_running() {
                info!(pid, attempt, "Ollama is ready");
                self.reporter.success(&format!(
                    "Ollama server started at {} (pid {pid})",
                    self.settings.base_url
                ));
                return Ok(());
            }
            debug!(attempt, "Ollama not ready yet");
            if attempt < self.timing.startup_attempts {
                self.pause(self.timing.poll_interval)?;
            }
        }

        Err(LifecycleError::StartTimeout {
            waited: self.timing.poll_interval * self.timing.startup_attempts,
            log_file: self.settings.log_file.clone(),
        })
    }

    #[instrument(skip(self))]
    pub fn stop(&self) -> Result<(), LifecycleError> {
        if !self.is_running() {
            self.reporter.warn("Ollama is not running");
            return Ok(());
        }

        self.reporter.info("Stopping Ollama server...");
        let signalled = self.host.terminate_server()?;
        debug!(signalled, "Termination signals sent");
        self.pause(self.timing.stop_grace)?;

        if self.is_running() {
            return Err(LifecycleError::StopFailed { signalled });
        }
        info!("Ollama stopped");
        self.reporter.success("Ollama server stopped");
        Ok(())
    }

    /// Print the installed / running / model summary.
    ///
    /// Fails when Ollama is not installed or not running; a missing model is
    /// only a warning.
    #[instrument(skip(self))]
    pub fn status(&self) -> Result<StatusReport, LifecycleError> {
        let r = &self.reporter;
        r.heading("Ollama Status");

        let Some(binary) = self.installation() else {
            r.error("Installed: no");
            return Err(LifecycleError::NotInstalled);
        };
        r.success(&format!("Installed: yes ({})", binary.display()));

        if !self.is_running() {
            r.error(&format!("Running:   no ({})", self.settings.base_url));
            return Err(self.not_running());
        }
        r.success(&format!("Running:   yes ({})", self.settings.base_url));

        let model = &self.settings.model;
        let models = match self.api.list_models() {
            Ok(models) => models,
            Err(e) => {
                r.warn(&format!("Could not list models: {e}"));
                Vec::new()
            }
        };
        let presence = ModelPresence::from_tags(model, &models);
        match &presence {
            ModelPresence::Available(tag) => r.success(&format!("Model:     {model} ({tag})")),
            ModelPresence::Missing { .. } => r.warn(&format!(
                "Model:     {model} not found. Run: {CLI_NAME} pull"
            )),
        }

        r.line("");
        r.line("Available models:");
        if models.is_empty() {
            r.line("  (none)");
        }
        for tag in &models {
            r.line(&format_model_line(tag));
        }

        Ok(StatusReport {
            binary,
            running: true,
            model: presence,
            models,
        })
    }

    /// Send [`TEST_PROMPT`] to the configured model and print the answer.
    #[instrument(skip(self), fields(model = %self.settings.model))]
    pub fn test(&self) -> Result<GenerateOutcome, LifecycleError> {
        if !self.is_running() {
            return Err(self.not_running());
        }
        let model = &self.settings.model;
        if let ModelPresence::Missing { available } = self.model_presence()? {
            return Err(LifecycleError::ModelMissing {
                model: model.clone(),
                available,
            });
        }

        self.reporter
            .info(&format!("Testing model {model} with: \"{TEST_PROMPT}\""));
        let outcome = self.api.generate(TEST_PROMPT)?;
        match &outcome {
            GenerateOutcome::Text(text) => {
                self.reporter.success("Model responded:");
                self.reporter.line(text);
            }
            GenerateOutcome::Raw(body) => {
                self.reporter
                    .warn("Could not extract a response; raw output follows:");
                self.reporter.line(body);
            }
        }
        Ok(outcome)
    }

    /// install → start → pull → status, then print the `.env` settings.
    #[instrument(skip(self))]
    pub fn setup(&self) -> Result<(), LifecycleError> {
        self.reporter.heading("Setting up Ollama for the docs bot");

        self.install()?;
        self.start()?;
        self.pull()?;
        self.status()?;

        self.print_env_guidance();
        Ok(())
    }

    fn print_env_guidance(&self) {
        let r = &self.reporter;
        r.line("");
        r.success("Setup complete!");
        r.line("");
        r.line("Add these lines to your .env to use the local model:");
        r.line("");
        r.line("  LLM_PROVIDER=ollama");
        r.line(&format!("  OLLAMA_MODEL={}", self.settings.model));
        r.line(&format!("  OLLAMA_BASE_URL={}", self.settings.base_url));
        r.line("");
        r.line(&format!("Then check the model with: {CLI_NAME} test"));
    }
}

fn format_model_line(tag: &ModelTag) -> String {
    match tag.human_size() {
        Some(size) => format!("  • {} ({size})", tag.name),
        None => format!("  • {}", tag.name),
    }
}
