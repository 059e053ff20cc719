//! Terminal mode handling and the event loop for sift.
//!
//! [TermMode] owns the controlling terminal and switches it between the browser's raw,
//! alternate-screen mode (`Running`) and the cooked mode scripts run in (`Suspended`). Both
//! directions are idempotent, and the signal handler sees the same termios snapshots
//! through [SIGNALS].
//!
//! [run_terminal] draws with ratatui on the terminal device, reads input through
//! [InputReader] and hands each event to the session until it quits.

use crate::app::Session;
use crate::core::input::{ClickTracker, Decoder, InputEvent};
use crate::core::signals::SIGNALS;
use crate::error::BrowserError;
use crate::ui;

use crossterm::{
    cursor::{Hide, Show},
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen},
};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{self, SetArg, Termios};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, AsRawFd};
use std::time::Instant;

/// How long a partial escape sequence may sit before it is flushed as typed keys.
const ESC_TIMEOUT_MS: u16 = 25;
/// Poll period while idle, so resizes and resumes are noticed.
const IDLE_TIMEOUT_MS: u16 = 250;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModeState {
    /// Raw mode on the alternate screen, owned by the browser.
    Running,
    /// Cooked mode on the main screen, as the user's shell left it.
    Suspended,
}

fn termios_error(e: Errno) -> BrowserError {
    BrowserError::Terminal(e.into())
}

pub struct TermMode {
    tty: File,
    cooked: Termios,
    raw: Termios,
    state: ModeState,
}

impl TermMode {
    /// Opens `/dev/tty` and snapshots its cooked and raw settings. Starts `Suspended`.
    pub fn open() -> Result<Self, BrowserError> {
        let tty = OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/tty")
            .map_err(BrowserError::Terminal)?;
        let cooked = termios::tcgetattr(&tty).map_err(termios_error)?;
        let mut raw = cooked.clone();
        termios::cfmakeraw(&mut raw);

        SIGNALS.register_terminal(tty.as_raw_fd(), cooked.clone().into(), raw.clone().into());
        Ok(TermMode {
            tty,
            cooked,
            raw,
            state: ModeState::Suspended,
        })
    }

    #[inline]
    pub fn tty(&self) -> &File {
        &self.tty
    }

    #[inline]
    pub fn state(&self) -> ModeState {
        self.state
    }

    pub fn enter(&mut self) -> Result<(), BrowserError> {
        if self.state == ModeState::Running {
            return Ok(());
        }
        termios::tcsetattr(&self.tty, SetArg::TCSAFLUSH, &self.raw).map_err(termios_error)?;
        let mut out = &self.tty;
        execute!(out, EnterAlternateScreen, Hide, EnableMouseCapture)
            .map_err(BrowserError::Terminal)?;
        self.state = ModeState::Running;
        SIGNALS.set_raw(true);
        tracing::debug!("terminal entered raw mode");
        Ok(())
    }

    pub fn leave(&mut self) -> Result<(), BrowserError> {
        if self.state == ModeState::Suspended {
            return Ok(());
        }
        SIGNALS.set_raw(false);
        self.state = ModeState::Suspended;
        let mut out = &self.tty;
        execute!(out, DisableMouseCapture, Show, LeaveAlternateScreen)
            .map_err(BrowserError::Terminal)?;
        termios::tcsetattr(&self.tty, SetArg::TCSAFLUSH, &self.cooked).map_err(termios_error)?;
        tracing::debug!("terminal restored to cooked mode");
        Ok(())
    }
}

impl Drop for TermMode {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

/// Reads terminal bytes and decodes them into events.
#[derive(Default)]
pub struct InputReader {
    decoder: Decoder,
    clicks: ClickTracker,
    pending: VecDeque<InputEvent>,
}

impl InputReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits up to the idle period for the next event.
    ///
    /// Returns `Ok(None)` on timeouts and signal interruptions so the caller can look at
    /// resize and resume flags.
    pub fn next_event(&mut self, tty: &File) -> io::Result<Option<InputEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        let timeout = if self.decoder.is_pending() {
            ESC_TIMEOUT_MS
        } else {
            IDLE_TIMEOUT_MS
        };
        let mut fds = [PollFd::new(tty.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(timeout)) {
            Ok(0) => {
                let flushed = self.decoder.flush();
                return Ok(flushed.map(|e| self.track(e)));
            }
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let mut buf = [0u8; 256];
        let n = match io::Read::read(&mut &*tty, &mut buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "terminal closed",
                ));
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(None),
            Err(e) => return Err(e),
        };

        for &byte in &buf[..n] {
            if let Some(event) = self.decoder.feed(byte) {
                let event = self.track(event);
                self.pending.push_back(event);
            }
        }
        Ok(self.pending.pop_front())
    }

    fn track(&mut self, event: InputEvent) -> InputEvent {
        match event {
            InputEvent::Mouse(mouse) => InputEvent::Mouse(self.clicks.observe(mouse, Instant::now())),
            other => other,
        }
    }
}

/// Runs the browser on the session's terminal until it quits.
///
/// Returns the first fatal error; recoverable ones have already been shown as warnings.
pub fn run_terminal(session: &mut Session) -> Result<(), BrowserError> {
    let (reader_tty, writer_tty) = session.terminal_handles()?;
    let mut terminal =
        Terminal::new(CrosstermBackend::new(writer_tty)).map_err(BrowserError::Terminal)?;
    let mut reader = InputReader::new();

    session.enter_terminal()?;
    loop {
        if session.should_quit() {
            break;
        }
        if SIGNALS.take_resized() | SIGNALS.take_resumed() {
            session.mark_dirty();
        }

        if session.is_dirty() {
            terminal.clear().map_err(BrowserError::Terminal)?;
        }
        let size = terminal.size().map_err(BrowserError::Terminal)?;
        session.set_viewport(size.width, size.height);
        terminal
            .draw(|frame| ui::render(frame, session))
            .map_err(BrowserError::Terminal)?;
        session.clear_dirty();

        let event = match reader.next_event(&reader_tty) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => return Err(BrowserError::Terminal(e)),
        };
        if session.dismiss_overlay() {
            continue;
        }
        session.handle_event(event)?;
    }

    Ok(())
}
