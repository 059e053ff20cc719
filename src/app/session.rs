//! The browsing session: one explicit context object for everything the browser owns.
//!
//! [Session] ties the [BrowserState] to the key bindings, the command file, the overlay stack
//! and (when there is one) the terminal. Commands enter through [Session::execute], which
//! turns recoverable errors into warnings and hands fatal ones back to the caller.
//!
//! Scripts run in the foreground: the terminal is put back into cooked mode, the job table
//! waits for the script, the terminal is re-entered, the listing refreshed and any commands
//! the script queued are drained.

use crate::app::keymap::{Action, Binding, Input, Key, Keymap};
use crate::app::nav::Target;
use crate::app::state::BrowserState;
use crate::config::Config;
use crate::core::cmdfile::CommandFile;
use crate::core::input::{InputEvent, MouseEvent};
use crate::core::jobs::{JobOutcome, ScriptInvocation};
use crate::core::terminal::TermMode;
use crate::error::BrowserError;
use crate::ui::overlays::{Overlay, OverlayStack};
use crate::ui::render::column_at;

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Defines `sift_cmd` for every script.
const PRELUDE: &str = "sift_cmd() { printf '%s\\0' \"$@\" >> \"$SIFT_CMDFILE\"; }\n";
/// `$SIFT_CLICKED` when the column header was clicked.
pub const COLUMN_LABEL: &str = "<column label>";

/// Status reported for a script whose shell could not be started, as a shell would.
const EXEC_FAILED: i32 = 127;

/// What the pointer was over when a mouse binding fired.
#[derive(Debug, Clone, Default)]
struct MouseContext {
    clicked: OsString,
    column: String,
}

enum Foreground<'a> {
    Spawn(&'a ScriptInvocation),
    Resume(usize),
}

pub struct Session {
    pub(crate) state: BrowserState,
    pub(crate) keymap: Keymap,
    pub(crate) overlays: OverlayStack,
    cmdfile: CommandFile,
    term: Option<TermMode>,
    shell: PathBuf,
    depth: u32,
    width: u16,
    height: u16,
    status: Option<String>,
}

impl Session {
    /// Starts a session listing `start`. Without a terminal, scripts inherit the standard
    /// streams and mode switches are skipped.
    pub fn new(config: &Config, start: &Path, term: Option<TermMode>) -> Result<Self, BrowserError> {
        let depth = std::env::var("SIFT_DEPTH")
            .ok()
            .and_then(|d| d.parse::<u32>().ok())
            .unwrap_or(0)
            + 1;

        let mut session = Session {
            state: BrowserState::new(config.general()),
            keymap: Keymap::from_config(config),
            overlays: OverlayStack::new(),
            cmdfile: CommandFile::create()?,
            term,
            shell: config.general().shell().clone(),
            depth,
            width: 80,
            height: 24,
            status: None,
        };
        session.state.populate(Target::Dir(start))?;
        session.drain_commands()?;
        tracing::info!(dir = %session.state.path().display(), depth, "session started");
        Ok(session)
    }

    /// A session without a terminal, for scripted use and tests.
    pub fn headless(config: &Config, start: &Path) -> Result<Self, BrowserError> {
        Self::new(config, start, None)
    }

    // Getters / Accessors

    #[inline]
    pub fn state(&self) -> &BrowserState {
        &self.state
    }

    #[inline]
    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    #[inline]
    pub fn overlays(&self) -> &OverlayStack {
        &self.overlays
    }

    #[inline]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    #[inline]
    pub fn cmdfile_path(&self) -> &Path {
        self.cmdfile.path()
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Texts of the warnings still waiting to be acknowledged, oldest first.
    pub fn warnings(&self) -> Vec<&str> {
        self.overlays
            .iter()
            .filter_map(|o| match o {
                Overlay::Warning { text } => Some(text.as_str()),
                Overlay::Help => None,
            })
            .collect()
    }

    #[inline]
    pub fn should_quit(&self) -> bool {
        self.state.quit
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.state.dirty
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.state.dirty = true;
    }

    /// Called by the renderer after a full redraw.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.state.dirty = false;
    }

    /// Records the terminal size; the listing gets all rows but the path, header and status
    /// lines.
    pub fn set_viewport(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.state.set_screen_rows(height as usize);
    }

    // Terminal

    /// Reader and writer handles on the session's terminal.
    pub fn terminal_handles(&self) -> Result<(File, File), BrowserError> {
        let tty = self
            .term
            .as_ref()
            .map(TermMode::tty)
            .ok_or_else(|| BrowserError::Terminal(io::Error::other("no terminal")))?;
        let reader = tty.try_clone().map_err(BrowserError::Terminal)?;
        let writer = tty.try_clone().map_err(BrowserError::Terminal)?;
        Ok((reader, writer))
    }

    pub fn enter_terminal(&mut self) -> Result<(), BrowserError> {
        if let Some(term) = self.term.as_mut() {
            term.enter()?;
        }
        self.state.dirty = true;
        Ok(())
    }

    pub fn leave_terminal(&mut self) -> Result<(), BrowserError> {
        match self.term.as_mut() {
            Some(term) => term.leave(),
            None => Ok(()),
        }
    }

    /// Pops the top overlay. Returns whether there was one, so the key that dismissed it is
    /// not also dispatched.
    pub fn dismiss_overlay(&mut self) -> bool {
        if self.overlays.pop().is_some() {
            self.state.dirty = true;
            return true;
        }
        false
    }

    // Commands

    /// Runs one interpreter command.
    ///
    /// Recoverable failures become a warning overlay and `Ok(())`; fatal ones are returned.
    pub fn execute(&mut self, command: &str) -> Result<(), BrowserError> {
        tracing::debug!(command, "execute");
        if let Err(e) = self.apply(command) {
            if e.is_fatal() {
                tracing::error!("{}", e);
                return Err(e);
            }
            self.warn(e);
        }
        for notice in self.state.take_notices() {
            self.warn(notice);
        }
        Ok(())
    }

    pub(crate) fn warn(&mut self, error: BrowserError) {
        tracing::warn!("{}", error);
        self.overlays.push(Overlay::Warning {
            text: error.to_string(),
        });
        self.state.dirty = true;
    }

    /// Executes every queued command file entry, stopping once one of them quits.
    pub fn drain_commands(&mut self) -> Result<(), BrowserError> {
        let commands = match self.cmdfile.drain() {
            Ok(commands) => commands,
            Err(e) => {
                tracing::warn!("reading command file failed: {}", e);
                return Ok(());
            }
        };
        for command in commands {
            self.execute(&command)?;
            if self.state.quit {
                break;
            }
        }
        Ok(())
    }

    // Input

    /// Dispatches one decoded input event to its binding, if any.
    pub fn handle_event(&mut self, event: InputEvent) -> Result<(), BrowserError> {
        match event {
            InputEvent::Key { code, modifiers } => {
                let key = Key::new(Input::Key(code), modifiers);
                match self.keymap.lookup(key).cloned() {
                    Some(binding) => self.run_binding(&binding, None),
                    None => Ok(()),
                }
            }
            InputEvent::Mouse(mouse) => {
                let key = Key::new(Input::Mouse(mouse.button, mouse.kind), mouse.modifiers);
                match self.keymap.lookup(key).cloned() {
                    Some(binding) => {
                        let context = self.mouse_context(&mouse);
                        self.run_binding(&binding, Some(&context))
                    }
                    None => Ok(()),
                }
            }
        }
    }

    fn run_binding(
        &mut self,
        binding: &Binding,
        mouse: Option<&MouseContext>,
    ) -> Result<(), BrowserError> {
        match binding.action() {
            Action::Command(command) => self.execute(command),
            Action::Queued(command) => {
                self.run_script_with(&format!("sift_cmd \"{command}\""), mouse)
            }
            Action::Shell(body) => self.run_script_with(body, mouse),
        }
    }

    fn mouse_context(&self, mouse: &MouseEvent) -> MouseContext {
        let onscreen = self.state.onscreen();
        let clicked = match mouse.row as usize {
            0 => OsString::new(),
            1 => OsString::from(COLUMN_LABEL),
            row if row - 2 < onscreen => self
                .state
                .files()
                .get(self.state.scroll() + row - 2)
                .map(|&id| self.state.entry(id).path().as_os_str().to_os_string())
                .unwrap_or_default(),
            _ => OsString::new(),
        };
        let column = column_at(self.state.columns(), self.width, mouse.column)
            .map(String::from)
            .unwrap_or_default();
        MouseContext { clicked, column }
    }

    // Scripts

    /// Runs a shell script in the foreground with the selection as its arguments.
    pub fn run_script(&mut self, body: &str) -> Result<(), BrowserError> {
        self.run_script_with(body, None)
    }

    fn run_script_with(
        &mut self,
        body: &str,
        mouse: Option<&MouseContext>,
    ) -> Result<(), BrowserError> {
        let invocation = self.invocation(body, mouse);
        self.foreground(Foreground::Spawn(&invocation))
    }

    /// Continues the `n`th most recent job in the foreground.
    pub(crate) fn resume_job(&mut self, n: usize) -> Result<(), BrowserError> {
        if n >= self.state.jobs.len() {
            return Err(BrowserError::NoJob(n));
        }
        self.foreground(Foreground::Resume(n))
    }

    fn foreground(&mut self, job: Foreground<'_>) -> Result<(), BrowserError> {
        self.leave_terminal()?;
        let tty = self.term.as_ref().map(TermMode::tty);
        let outcome = match job {
            Foreground::Spawn(invocation) => self.state.jobs.spawn(invocation, tty),
            Foreground::Resume(n) => self.state.jobs.resume(n, tty),
        };
        self.enter_terminal()?;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                if matches!(e, BrowserError::Exec { .. }) {
                    self.status = Some(format!("exit {EXEC_FAILED}"));
                }
                self.warn(e);
                return Ok(());
            }
        };

        self.status = match outcome {
            JobOutcome::Exited(0) | JobOutcome::Vanished => None,
            JobOutcome::Exited(code) => Some(format!("exit {code}")),
            JobOutcome::Killed(sig) => Some(format!("killed by {sig}")),
            JobOutcome::Stopped(_) => Some(format!("stopped [{}]", self.state.jobs.len())),
        };

        if let Err(e) = self.state.populate(Target::Refresh) {
            if e.is_fatal() {
                return Err(e);
            }
            self.warn(e);
        }
        self.drain_commands()
    }

    fn invocation(&self, body: &str, mouse: Option<&MouseContext>) -> ScriptInvocation {
        let state = &self.state;
        let mut invocation =
            ScriptInvocation::new(self.shell.clone(), format!("{PRELUDE}{body}"));
        invocation.args = state.selected_paths();

        let cursor = state
            .cursor_entry()
            .map(|e| e.path().as_os_str().to_os_string())
            .unwrap_or_default();
        let interleave = if state.interleave() { "1" } else { "0" };
        invocation.env = vec![
            ("SIFT_CMDFILE", self.cmdfile.path().as_os_str().to_os_string()),
            ("SIFT_CURSOR", cursor),
            ("SIFT_GLOB", state.globs().into()),
            ("SIFT_SORT", state.sort().to_string().into()),
            ("SIFT_COLUMNS", state.columns().into()),
            ("SIFT_INTERLEAVE", interleave.into()),
            ("SIFT_DEPTH", self.depth.to_string().into()),
        ];
        match mouse {
            Some(context) => {
                invocation
                    .env
                    .push(("SIFT_CLICKED", context.clicked.clone()));
                invocation
                    .env
                    .push(("SIFT_MOUSECOL", context.column.clone().into()));
            }
            None => invocation.unset = vec!["SIFT_CLICKED", "SIFT_MOUSECOL"],
        }
        invocation
    }

    /// Stops the browser like a shell job, handing the terminal back until it is continued.
    pub(crate) fn suspend(&mut self) -> Result<(), BrowserError> {
        if self.term.is_none() {
            tracing::debug!("suspend ignored without a terminal");
            return Ok(());
        }
        self.leave_terminal()?;
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGTSTP)
            .map_err(|e| BrowserError::Terminal(e.into()))?;
        self.enter_terminal()
    }

    /// Hangs up every remaining job. The command file and the terminal are released when the
    /// session is dropped.
    pub fn shutdown(&mut self) {
        self.state.jobs.hangup_all();
        tracing::info!("session ended");
    }
}
