//! Settings – defaults, `~/.docsbot/config.toml`, then `OLLAMA_*` env vars.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default Ollama API endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Resolved configuration for the Ollama tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Model pulled, checked and queried (e.g. "llama3.2").
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the Ollama HTTP API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for generation requests, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,

    /// Context window passed as `num_ctx` on generation requests.
    #[serde(default = "default_context_window")]
    pub context_window: u32,

    /// File receiving the stdout/stderr of a server we spawn.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Upstream install script piped to `sh` on Linux.
    #[serde(default = "default_install_script_url")]
    pub install_script_url: String,
}

fn default_model() -> String {
    "llama3.2".to_string()
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_request_timeout_secs() -> f64 {
    120.0
}
fn default_context_window() -> u32 {
    8192
}
fn default_log_file() -> PathBuf {
    std::env::temp_dir().join("ollama.log")
}
fn default_install_script_url() -> String {
    "https://ollama.com/install.sh".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            context_window: default_context_window(),
            log_file: default_log_file(),
            install_script_url: default_install_script_url(),
        }
    }
}

impl Settings {
    /// Resolve settings from the config file (if any) and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = load_from(&config_path())?.unwrap_or_default();
        apply_env_overrides(&mut settings);
        settings.normalize();
        Ok(settings)
    }

    /// Base URL without a trailing slash.
    pub fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_request_timeout_secs()))
    }

    /// `host:port` to hand to `ollama serve` through `OLLAMA_HOST`, or `None`
    /// when the server's own default already matches `base_url`.
    pub fn serve_host(&self) -> Option<String> {
        if self.base_url == DEFAULT_BASE_URL {
            return None;
        }
        let without_scheme = self
            .base_url
            .strip_prefix("http://")
            .or_else(|| self.base_url.strip_prefix("https://"))
            .unwrap_or(&self.base_url);
        let host = without_scheme.split('/').next().unwrap_or(without_scheme);
        (!host.is_empty()).then(|| host.to_string())
    }

    fn normalize(&mut self) {
        let trimmed = self.base_url.trim_end_matches('/').len();
        self.base_url.truncate(trimmed);
    }
}

/// Return the config file path: `$DOCSBOT_CONFIG`, else `~/.docsbot/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(explicit) = std::env::var("DOCSBOT_CONFIG") {
        return PathBuf::from(explicit);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".docsbot").join("config.toml")
}

/// Load settings from a specific path.  Returns `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Settings>, SettingsError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = toml::from_str(&raw).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(settings))
}

/// Apply environment variable overrides to `settings`.
///
/// | Variable | Field |
/// |---|---|
/// | `OLLAMA_MODEL` | `model` |
/// | `OLLAMA_BASE_URL` | `base_url` |
/// | `OLLAMA_TIMEOUT` | `request_timeout_secs` |
/// | `OLLAMA_CONTEXT_WINDOW` | `context_window` |
/// | `OLLAMA_LOG_FILE` | `log_file` |
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(v) = std::env::var("OLLAMA_MODEL")
        && !v.trim().is_empty()
    {
        settings.model = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("OLLAMA_BASE_URL")
        && !v.trim().is_empty()
    {
        settings.base_url = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("OLLAMA_TIMEOUT") {
        match v.trim().parse::<f64>() {
            Ok(secs) if secs.is_finite() && secs > 0.0 => settings.request_timeout_secs = secs,
            _ => warn!(value = %v, "Ignoring invalid OLLAMA_TIMEOUT"),
        }
    }
    if let Ok(v) = std::env::var("OLLAMA_CONTEXT_WINDOW") {
        match v.trim().parse::<u32>() {
            Ok(n) => settings.context_window = n,
            Err(_) => warn!(value = %v, "Ignoring invalid OLLAMA_CONTEXT_WINDOW"),
        }
    }
    if let Ok(v) = std::env::var("OLLAMA_LOG_FILE")
        && !v.trim().is_empty()
    {
        settings.log_file = PathBuf::from(v.trim());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 5] = [
        "OLLAMA_MODEL",
        "OLLAMA_BASE_URL",
        "OLLAMA_TIMEOUT",
        "OLLAMA_CONTEXT_WINDOW",
        "OLLAMA_LOG_FILE",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: tests touching the environment are #[serial].
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    fn defaults_match_the_bot_settings() {
        let s = Settings::default();
        assert_eq!(s.model, "llama3.2");
        assert_eq!(s.base_url, "http://localhost:11434");
        assert_eq!(s.request_timeout_secs, 120.0);
        assert_eq!(s.context_window, 8192);
        assert!(s.log_file.ends_with("ollama.log"));
    }

    #[test]
    fn config_path_points_to_docsbot_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.docsbot/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn load_from_fills_unset_keys_with_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = \"mistral\"\ncontext_window = 4096\n").unwrap();

        let s = load_from(&path).expect("load ok").expect("some");
        assert_eq!(s.model, "mistral");
        assert_eq!(s.context_window, 4096);
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn load_from_rejects_malformed_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = [unterminated").unwrap();
        assert!(matches!(load_from(&path), Err(SettingsError::Parse { .. })));
    }

    #[test]
    #[serial]
    fn env_overrides_model_and_url() {
        clear_env();
        // SAFETY: serialised with the other env tests.
        unsafe {
            std::env::set_var("OLLAMA_MODEL", "mistral");
            std::env::set_var("OLLAMA_BASE_URL", "http://gpu-box:11434");
        }
        let mut s = Settings::default();
        apply_env_overrides(&mut s);
        assert_eq!(s.model, "mistral");
        assert_eq!(s.base_url, "http://gpu-box:11434");
        clear_env();
    }

    #[test]
    #[serial]
    fn env_overrides_numeric_fields() {
        clear_env();
        // SAFETY: serialised with the other env tests.
        unsafe {
            std::env::set_var("OLLAMA_TIMEOUT", "45.5");
            std::env::set_var("OLLAMA_CONTEXT_WINDOW", "16384");
        }
        let mut s = Settings::default();
        apply_env_overrides(&mut s);
        assert_eq!(s.request_timeout_secs, 45.5);
        assert_eq!(s.context_window, 16384);
        clear_env();
    }

    #[test]
    #[serial]
    fn env_ignores_invalid_numbers() {
        clear_env();
        // SAFETY: serialised with the other env tests.
        unsafe {
            std::env::set_var("OLLAMA_TIMEOUT", "soon");
            std::env::set_var("OLLAMA_CONTEXT_WINDOW", "-1");
        }
        let mut s = Settings::default();
        apply_env_overrides(&mut s);
        assert_eq!(s.request_timeout_secs, 120.0);
        assert_eq!(s.context_window, 8192);
        clear_env();
    }

    #[test]
    #[serial]
    fn load_reads_explicit_config_then_env() {
        clear_env();
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("docsbot.toml");
        fs::write(&path, "model = \"phi3\"\nbase_url = \"http://127.0.0.1:9999/\"\n").unwrap();
        // SAFETY: serialised with the other env tests.
        unsafe {
            std::env::set_var("DOCSBOT_CONFIG", &path);
            std::env::set_var("OLLAMA_MODEL", "qwen2.5");
        }
        let s = Settings::load().expect("load");
        assert_eq!(s.model, "qwen2.5");
        assert_eq!(s.base_url, "http://127.0.0.1:9999");
        // SAFETY: serialised with the other env tests.
        unsafe { std::env::remove_var("DOCSBOT_CONFIG") };
        clear_env();
    }

    #[test]
    fn api_url_joins_without_double_slash() {
        let s = Settings {
            base_url: "http://localhost:11434/".into(),
            ..Settings::default()
        };
        assert_eq!(s.api_url("/api/tags"), "http://localhost:11434/api/tags");
    }

    #[test]
    fn serve_host_only_for_non_default_urls() {
        assert_eq!(Settings::default().serve_host(), None);
        let s = Settings {
            base_url: "http://0.0.0.0:11500".into(),
            ..Settings::default()
        };
        assert_eq!(s.serve_host().as_deref(), Some("0.0.0.0:11500"));
    }

    #[test]
    fn request_timeout_converts_seconds() {
        let s = Settings {
            request_timeout_secs: 1.5,
            ..Settings::default()
        };
        assert_eq!(s.request_timeout(), Duration::from_millis(1500));
    }
}
