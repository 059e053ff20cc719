//! Command-line argument parsing and help for sift.
//!
//! `sift [OPTIONS] [+COMMAND]... [PATH]`. Arguments starting with `+` are browser commands
//! run after start-up; the single non-option argument is the starting directory.
//!
//! When invoked with no args/flags (sift), sift simply opens the current directory.

use crate::app::BrowserState;
use crate::app::keymap::split_description;
use crate::config::Config;
use crate::config::input::DEFAULT_BINDINGS;

use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// What to print on stdout once the browser quits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExitOutput {
    pub print_dir: bool,
    pub print_selection: bool,
    pub null: bool,
}

impl ExitOutput {
    /// Bytes to write to stdout for the final state: the directory first, then the selection
    /// oldest first, each followed by a newline or NUL.
    pub fn render(&self, state: &BrowserState) -> Vec<u8> {
        let separator = if self.null { b'\0' } else { b'\n' };
        let mut out = Vec::new();
        if self.print_dir {
            out.extend_from_slice(state.path().as_os_str().as_bytes());
            out.push(separator);
        }
        if self.print_selection {
            for path in state.selected_paths() {
                out.extend_from_slice(path.as_os_str().as_bytes());
                out.push(separator);
            }
        }
        out
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub output: ExitOutput,
    pub commands: Vec<String>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CliAction {
    Run(CliOptions),
    Exit,
    /// Bad usage, already reported on stderr.
    Fail,
}

pub fn handle_args() -> CliAction {
    parse_args(std::env::args().skip(1))
}

/// Parses the arguments after the program name. Informational flags print and return
/// [CliAction::Exit].
pub fn parse_args<I>(args: I) -> CliAction
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();
    let mut only_paths = false;

    for arg in args {
        if only_paths {
            if !set_path(&mut options, arg) {
                return CliAction::Fail;
            }
            continue;
        }
        match arg.as_str() {
            "--version" | "-v" => {
                print_version();
                return CliAction::Exit;
            }
            "-h" | "--help" => {
                print_help();
                return CliAction::Exit;
            }
            "--keybinds" => {
                print_keybinds();
                return CliAction::Exit;
            }
            "--init" => {
                if let Err(e) = Config::generate_default(&Config::default_path()) {
                    eprintln!("Error: {}", e);
                    return CliAction::Fail;
                }
                return CliAction::Exit;
            }
            "-d" | "--print-dir" => options.output.print_dir = true,
            "-s" | "--print-selection" => options.output.print_selection = true,
            "-0" | "--null" => options.output.null = true,
            "--" => only_paths = true,
            a if a.starts_with('+') && a.len() > 1 => options.commands.push(a[1..].to_string()),
            a if a.starts_with('-') && a.len() > 1 => {
                eprintln!("Unknown argument: {}", a);
                eprintln!("Try --help for available options");
                return CliAction::Fail;
            }
            _ => {
                if !set_path(&mut options, arg) {
                    return CliAction::Fail;
                }
            }
        }
    }
    CliAction::Run(options)
}

fn set_path(options: &mut CliOptions, arg: String) -> bool {
    if options.path.is_some() {
        eprintln!("Error: sift accepts only one directory.");
        eprintln!("Usage: sift [OPTIONS] [+COMMAND]... [PATH]");
        return false;
    }
    options.path = Some(PathBuf::from(arg));
    true
}

fn print_version() {
    println!("sift {}", env!("CARGO_PKG_VERSION"));
}

fn print_help() {
    println!(
        r#"sift - A terminal file browser that runs shell scripts on your selection

USAGE:
  sift [OPTIONS] [+COMMAND]... [PATH]

PATH:
  Directory to open (defaults to current directory)

COMMANDS:
  +COMMAND                Run a browser command after start-up, e.g. +sort:-s or +glob:*.rs

OPTIONS:
  -d, --print-dir         Print the final directory on exit
  -s, --print-selection   Print the selected paths on exit, oldest selection first
  -0, --null              Separate printed paths with NUL instead of newline
      --init              Generate the default configuration
      --keybinds          Display all the default keybinds
  -h, --help              Print help information
  -v, --version           Display the current installed version of sift

ENVIRONMENT:
  SIFT_CONFIG             Override the default config path
  SIFT_LOG                Log filter, e.g. "debug" or "sift_tui=trace" [default: info]
  SIFT_LOG_FILE           Override the log file path
"#
    );
}

/// The default binding table as `keys  description` rows.
pub fn keybinds_text() -> String {
    let mut text = String::from("Key Bindings\n\n");
    for (keys, script) in DEFAULT_BINDINGS {
        let (description, body) = split_description(script);
        let keys = keys.join(", ");
        let description = description.unwrap_or(body);
        text.push_str(&format!("  {:<28}{}\n", keys, description));
    }
    text.push_str(
        "\n  Key names: single characters, Space, Comma, Colon, Enter, Esc, Tab, BackTab,\n  \
         Backspace, Delete, Insert, Home, End, PgUp, PgDn, Up, Down, Left, Right, F1-F12,\n  \
         MouseLeft, MouseLeftDouble, MouseRight, ScrollUp, ScrollDown ...\n  \
         Modifiers: Ctrl-x, Alt-x, Shift-x or <c-x>\n",
    );
    text
}

fn print_keybinds() {
    println!("{}", keybinds_text());
}
