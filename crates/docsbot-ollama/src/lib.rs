//! `docsbot-ollama` – local Ollama runtime management for the docs bot.
//!
//! # Modules
//!
//! - [`settings`] – [`Settings`]: model, endpoint and timeouts, resolved
//!   from defaults, `~/.docsbot/config.toml` and `OLLAMA_*` env vars.
//! - [`api`] – [`OllamaClient`]: blocking client for `/api/tags` and
//!   `/api/generate`, behind the [`ServerApi`] trait.
//! - [`host`] – [`SystemHost`]: runs the installer, spawns and terminates
//!   `ollama serve`, runs `ollama pull`, behind the [`Host`] trait.
//! - [`lifecycle`] – [`Lifecycle`]: the install / pull / start / stop /
//!   status / test / setup handlers built on the two traits.
//! - [`report`] – [`Reporter`]: sink for user-facing progress lines.
//! - [`telemetry`] – [`init_tracing`]: global `tracing` subscriber with an
//!   optional OTLP exporter.

pub mod api;
pub mod host;
pub mod lifecycle;
pub mod report;
pub mod settings;
pub mod telemetry;

pub use api::{ApiError, OllamaClient, ServerApi};
pub use host::{Host, HostError, SystemHost};
pub use lifecycle::{Lifecycle, LifecycleError, TEST_PROMPT, Timing};
pub use report::Reporter;
pub use settings::{Settings, SettingsError};
pub use telemetry::{TracerProviderGuard, init_tracing};
