//! Command file side channel.
//!
//! Scripts append NUL-terminated commands to the file named by `SIFT_CMDFILE`. The session
//! drains it after start-up and after every foreground script: the file is read, deleted and
//! split into commands. The path itself is a [tempfile::TempPath], so whatever is left behind
//! is removed when the session ends.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

use tempfile::TempPath;

pub struct CommandFile {
    path: TempPath,
}

impl CommandFile {
    /// Reserves a fresh command file in the temp directory.
    pub fn create() -> io::Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("sift-cmd.")
            .tempfile()?
            .into_temp_path();
        Ok(CommandFile { path })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Takes every queued command, oldest first, and deletes the file.
    pub fn drain(&self) -> io::Result<Vec<String>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        Ok(split_commands(&bytes))
    }
}

/// Splits a NUL-delimited buffer, dropping empty records.
pub fn split_commands(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|&b| b == 0)
        .filter(|cmd| !cmd.is_empty())
        .map(|cmd| String::from_utf8_lossy(cmd).into_owned())
        .collect()
}
