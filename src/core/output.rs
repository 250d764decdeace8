//! Colored status output for distwrap
//!
//! Uses owo-colors for terminal colors. Everything goes to stderr: stdout is
//! reserved for the installed distribution path that the wrapper script reads.

use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enable or disable verbose output (`-v` / `DISTWRAP_VERBOSE`)
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Print an action header (blue, bold), verbose only
/// Example: "==> Downloading https://..."
pub fn action(message: &str) {
    if is_verbose() {
        eprintln!("{} {}", "==>".blue().bold(), message.bold());
    }
}

/// Print a detail line (dimmed), verbose only
/// Example: "     extracted tool-3.9.6-bin.zip"
pub fn detail(message: &str) {
    if is_verbose() {
        eprintln!("     {}", message.dimmed());
    }
}

/// Print an info message (cyan), verbose only
pub fn info(message: &str) {
    if is_verbose() {
        eprintln!("{} {}", "::".cyan(), message);
    }
}

/// Print a success message (green), verbose only
/// Example: "==> tool-3.9.6 installed"
pub fn success(message: &str) {
    if is_verbose() {
        eprintln!("{} {}", "==>".green().bold(), message.green());
    }
}

/// Print a warning message (yellow)
pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Print an error message (red)
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_toggle() {
        set_verbose(true);
        assert!(is_verbose());
        detail("shown");
        set_verbose(false);
        assert!(!is_verbose());
        detail("hidden");
    }
}
