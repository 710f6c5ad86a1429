//! Colored console rendering of lifecycle progress.

use colored::Colorize;
use docsbot_ollama::Reporter;

/// Writes progress to stdout and errors to stderr.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn heading(&self, title: &str) {
        println!();
        println!("{}", title.bold().underline());
    }

    fn info(&self, message: &str) {
        println!("{} {}", "[INFO]".blue().bold(), message);
    }

    fn success(&self, message: &str) {
        println!("{} {}", "[OK]".green().bold(), message);
    }

    fn warn(&self, message: &str) {
        println!("{} {}", "[WARN]".yellow().bold(), message);
    }

    fn error(&self, message: &str) {
        eprintln!("{} {}", "[ERROR]".red().bold(), message);
    }

    fn line(&self, message: &str) {
        println!("{message}");
    }
}

/// Print a fatal error and its corrective hint.
pub fn report_failure(message: &str, hint: Option<&str>) {
    ConsoleReporter.error(message);
    if let Some(hint) = hint {
        eprintln!("        {}", hint.dimmed());
    }
}
