//! The main config loading module for sift.
//!
//! Handles loading and deserializing settings from `sift.toml` into the [Config] struct
//! through the internal [RawConfig], and writes the commented default file for `--init`.

use crate::config::input::BindingConfig;
use crate::config::{General, InternalGeneral};
use crate::utils::helpers::get_home;

use serde::Deserialize;
use std::{fs, io, path::Path, path::PathBuf};

/// Raw configuration as read from the toml file.
/// It is converted into the main [Config] struct, which validates it.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub(crate) struct RawConfig {
    general: General,
    bindings: Vec<BindingConfig>,
}

/// Processed configuration the browser starts from.
#[derive(Debug, Default)]
pub struct Config {
    general: InternalGeneral,
    bindings: Vec<BindingConfig>,
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            general: InternalGeneral::from(raw.general),
            bindings: raw.bindings,
        }
    }
}

impl Config {
    /// Loads the configuration from [Config::default_path].
    ///
    /// A missing file means internal defaults; a malformed one is reported on stderr and
    /// also falls back to the defaults.
    pub fn load() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error parsing config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parses sift.toml content.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<RawConfig>(content).map(Config::from)
    }

    // Getters

    #[inline]
    pub fn general(&self) -> &InternalGeneral {
        &self.general
    }

    #[inline]
    pub(crate) fn bindings(&self) -> &[BindingConfig] {
        &self.bindings
    }

    /// Determine the configuration file path.
    /// Checks the SIFT_CONFIG environment variable first,
    /// then XDG_CONFIG_HOME, then ~/.config/sift/sift.toml.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("SIFT_CONFIG") {
            return PathBuf::from(path);
        }

        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg_config).join("sift/sift.toml");
        }

        if let Some(home) = get_home() {
            return home.join(".config/sift/sift.toml");
        }
        PathBuf::from("sift.toml")
    }

    /// Writes the commented default configuration. Refuses to overwrite an existing file.
    pub fn generate_default(path: &Path) -> io::Result<()> {
        if path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("Config file already exists at {:?}", path),
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_TOML)?;
        println!("Default config generated at {:?}", path);
        Ok(())
    }
}

const DEFAULT_TOML: &str = r##"# sift.toml - default configuration for sift
#
# Commented values are the internal defaults.

[general]
# Space separated glob patterns making up a listing.
# glob = "*"

# Sort keys in priority order, each with + (ascending) or - (descending):
# n name, s size, p permissions, m/c/a modify/change/access time, r random, * selected
# sort = "+n"

# Columns from left to right:
# * selection marker, n name, s size, p permissions, m/c/a times, r random rank
# columns = "*smpn"

# Mix directories with files instead of listing them first.
# interleave = false

# Shell used to run binding scripts.
# shell = "sh"

# Bindings are applied on top of the built-in ones; rebinding a key replaces it.
# A first line starting with '#' is the description shown in the help menu.
# A body of the form "+command" runs a browser command without a shell.
#
# [[bindings]]
# keys = ["o"]
# script = """#Open with xdg-open
# xdg-open "$SIFT_CURSOR" >/dev/null 2>&1 &"""
#
# [[bindings]]
# keys = ["Ctrl-h"]
# script = "#Home\n+cd:~"
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_general_and_bindings() -> Result<(), Box<dyn std::error::Error>> {
        let config = Config::parse(
            r#"
            [general]
            glob = ".* *"
            sort = "-s+n"
            interleave = true

            [[bindings]]
            keys = ["x", "Ctrl-x"]
            script = "+quit"
            "#,
        )?;
        assert_eq!(config.general().glob(), ".* *");
        assert_eq!(config.general().sort().to_string(), "-s+n");
        assert_eq!(config.general().columns(), "*smpn");
        assert!(config.general().interleave());
        assert_eq!(config.bindings().len(), 1);
        assert_eq!(config.bindings()[0].keys(), ["x", "Ctrl-x"]);
        Ok(())
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config = Config::parse("[general]\nsort = \"+q\"\ncolumns = \"nn\"\n")?;
        assert_eq!(config.general().sort().to_string(), "+n");
        assert_eq!(config.general().columns(), "*smpn");
        Ok(())
    }

    #[test]
    fn default_file_parses_and_is_not_overwritten() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("nested/sift.toml");

        Config::generate_default(&path)?;
        let written = fs::read_to_string(&path)?;
        let config = Config::parse(&written)?;
        assert_eq!(config.general().glob(), "*");
        assert!(config.bindings().is_empty());

        let err = Config::generate_default(&path).err();
        assert_eq!(err.map(|e| e.kind()), Some(io::ErrorKind::AlreadyExists));
        Ok(())
    }
}
