//! Tracing subscriber setup for sift.
//!
//! Logs go to a file, never to the terminal the browser draws on. The file is
//! `$SIFT_LOG_FILE` when set, otherwise `sift/sift.log` under the state directory (or the
//! cache directory where there is none). `$SIFT_LOG` takes an EnvFilter directive and
//! defaults to `info`.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Where the log file goes, if anywhere.
pub fn log_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("SIFT_LOG_FILE") {
        return Some(PathBuf::from(path));
    }
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .map(|dir| dir.join("sift").join("sift.log"))
}

/// Build the subscriber writing to `log_file`.
pub fn build_subscriber(
    log_file: File,
    env_filter: EnvFilter,
) -> impl tracing::Subscriber + Send + Sync {
    let fmt_layer = fmt::layer().with_ansi(false).with_writer(Arc::new(log_file));

    tracing_subscriber::registry().with(fmt_layer).with(env_filter)
}

/// Installs the global subscriber. Any failure leaves logging disabled.
pub fn init() {
    let Some(path) = log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let directives = std::env::var("SIFT_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = build_subscriber(file, env_filter).try_init();
}
