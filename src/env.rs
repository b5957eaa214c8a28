use crate::history::History;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable interpreter state threaded through every command execution.
///
/// This replaces process-wide globals: the working-directory mirror, the
/// loop-termination flag and the history buffer are owned here and passed
/// explicitly to whatever needs them.
#[derive(Debug, Clone)]
pub struct Environment {
    /// The shell's view of the working directory, kept in sync with the
    /// process by the `cd` built-in.
    pub current_dir: PathBuf,
    /// Set by the `exit` built-in; the interactive loop checks it after
    /// every line.
    pub should_exit: bool,
    /// Circular log of accepted input lines.
    pub history: History,
}

impl Environment {
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Environment {
            current_dir,
            should_exit: false,
            history: History::default(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}
