//! The general configuration settings for sift.
//!
//! [General] is deserialized from the `[general]` table of sift.toml; [InternalGeneral] is the
//! validated form the browser starts from. Invalid sort or column specs are reported and
//! replaced by the defaults.

use crate::core::formatter::valid_columns;
use crate::core::sort::SortSpec;

use serde::Deserialize;

use std::path::PathBuf;

pub(crate) const DEFAULT_GLOB: &str = "*";
pub(crate) const DEFAULT_SORT: &str = "+n";
pub(crate) const DEFAULT_COLUMNS: &str = "*smpn";
pub(crate) const DEFAULT_SHELL: &str = "sh";

#[derive(Deserialize, Debug)]
#[serde(default)]
pub(crate) struct General {
    glob: String,
    sort: String,
    columns: String,
    interleave: bool,
    shell: String,
}

impl Default for General {
    fn default() -> Self {
        General {
            glob: DEFAULT_GLOB.to_string(),
            sort: DEFAULT_SORT.to_string(),
            columns: DEFAULT_COLUMNS.to_string(),
            interleave: false,
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InternalGeneral {
    glob: String,
    sort: SortSpec,
    columns: String,
    interleave: bool,
    shell: PathBuf,
}

impl From<General> for InternalGeneral {
    fn from(g: General) -> Self {
        let sort = SortSpec::parse(&g.sort).unwrap_or_else(|| {
            eprintln!("Invalid sort spec {:?}, using {:?}", g.sort, DEFAULT_SORT);
            SortSpec::default()
        });
        let columns = if valid_columns(&g.columns) {
            g.columns
        } else {
            eprintln!(
                "Invalid column spec {:?}, using {:?}",
                g.columns, DEFAULT_COLUMNS
            );
            DEFAULT_COLUMNS.to_string()
        };
        let glob = if g.glob.trim().is_empty() {
            DEFAULT_GLOB.to_string()
        } else {
            g.glob
        };
        let shell = which::which(&g.shell).unwrap_or_else(|_| PathBuf::from(&g.shell));

        Self {
            glob,
            sort,
            columns,
            interleave: g.interleave,
            shell,
        }
    }
}

impl Default for InternalGeneral {
    fn default() -> Self {
        InternalGeneral::from(General::default())
    }
}

impl InternalGeneral {
    #[inline]
    pub fn glob(&self) -> &str {
        &self.glob
    }

    #[inline]
    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    #[inline]
    pub fn columns(&self) -> &str {
        &self.columns
    }

    #[inline]
    pub fn interleave(&self) -> bool {
        self.interleave
    }

    /// The shell scripts run with, resolved on `$PATH` when possible.
    #[inline]
    pub fn shell(&self) -> &PathBuf {
        &self.shell
    }
}
