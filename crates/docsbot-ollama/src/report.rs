//! [`Reporter`] – where the lifecycle handlers send user-facing output.
//!
//! Diagnostics go through `tracing`; this trait carries the human-readable
//! progress lines.  The CLI renders them with colors.

pub trait Reporter {
    /// Section title, e.g. "Ollama Status".
    fn heading(&self, title: &str);
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    /// Unadorned output line.
    fn line(&self, message: &str);
}

