//! Miscellaneous utilities for sift.
//!
//! - [helpers]: home directory expansion and shortening, path normalization.
//! - [cli]: command-line parsing and help output.
//! - [logging]: the tracing subscriber writing to the log file.

pub mod cli;
pub mod helpers;
pub mod logging;

pub use helpers::{expand_home_path, get_home, normalize_path, shorten_home_path};
