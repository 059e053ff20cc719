//! Error type shared by the browsing engine.
//!
//! Errors come in two tiers. Recoverable ones are shown to the user as a blocking warning
//! banner and the session carries on. Fatal ones unwind to `main`, which restores the
//! terminal and exits with a diagnostic. [BrowserError::is_fatal] decides which is which.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Could not normalize path: \"{0}\"")]
    PathNormalization(PathBuf),

    #[error("Could not cd to: \"{path}\" ({source})")]
    ChangeDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not find file: \"{0}\"")]
    NotFound(PathBuf),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid argument for {command} {value:?}: {reason}")]
    BadArgument {
        command: String,
        value: String,
        reason: &'static str,
    },

    #[error("No suspended process at position {0}")]
    NoJob(usize),

    #[error("Failed to set terminal attributes: {0}")]
    Terminal(#[source] io::Error),

    #[error("Failed to hand over the terminal to process group {pgid}: {source}")]
    ForegroundControl {
        pgid: i32,
        #[source]
        source: nix::Error,
    },

    #[error("Failed to run {shell}: {source}")]
    Exec {
        shell: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for process {pid}: {source}")]
    Wait {
        pid: i32,
        #[source]
        source: nix::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BrowserError {
    /// Fatal errors end the session after the terminal is restored.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrowserError::Terminal(_)
                | BrowserError::ForegroundControl { .. }
                | BrowserError::Wait { .. }
                | BrowserError::Io(_)
        )
    }

    pub(crate) fn bad_argument(command: &str, value: &str, reason: &'static str) -> Self {
        BrowserError::BadArgument {
            command: command.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_the_variant() {
        assert!(!BrowserError::UnknownCommand("nope".into()).is_fatal());
        assert!(!BrowserError::NotFound(PathBuf::from("/x")).is_fatal());
        assert!(!BrowserError::bad_argument("move:", "x", "expected a number").is_fatal());
        assert!(BrowserError::Terminal(io::Error::other("tcsetattr")).is_fatal());
        assert!(BrowserError::Io(io::Error::other("boom")).is_fatal());
        let exec = BrowserError::Exec {
            shell: PathBuf::from("/nonexistent/sh"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(!exec.is_fatal());
    }

    #[test]
    fn messages_name_the_input() {
        let err = BrowserError::UnknownCommand("frobnicate".into());
        assert_eq!(err.to_string(), "Unknown command: frobnicate");

        let err = BrowserError::bad_argument("scroll:", "12x", "expected a number");
        assert!(err.to_string().contains("scroll:"));
        assert!(err.to_string().contains("12x"));
    }
}
