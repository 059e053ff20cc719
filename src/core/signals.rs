//! Signal handling for sift.
//!
//! Terminating signals (interrupt, terminate, hangup, resource limits) and `SIGTSTP` all go
//! through one handler. It restores the cooked terminal, forwards a hangup (or the stop) to
//! every child process group, and re-raises the signal with the default disposition. When
//! the browser is continued after a stop, the handler puts the terminal back into raw mode
//! and re-arms itself.
//!
//! The handler only touches [SIGNALS], a static of atomics plus termios snapshots written
//! once, and only makes async-signal-safe calls (`write`, `tcsetattr`, `kill`, `raise`,
//! `sigaction`).

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use once_cell::sync::OnceCell;

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Upper bound on child process groups the handler can reach.
const MAX_TRACKED: usize = 64;

/// Undoes mouse reporting, cursor hiding and the alternate screen.
const LEAVE_SEQUENCE: &[u8] =
    b"\x1b[?1006l\x1b[?1015l\x1b[?1003l\x1b[?1002l\x1b[?1000l\x1b[?25h\x1b[?1049l";
/// Inverse of [LEAVE_SEQUENCE].
const ENTER_SEQUENCE: &[u8] =
    b"\x1b[?1049h\x1b[?25l\x1b[?1000h\x1b[?1002h\x1b[?1003h\x1b[?1015h\x1b[?1006h";

const FATAL_SIGNALS: [Signal; 8] = [
    Signal::SIGINT,
    Signal::SIGTERM,
    Signal::SIGHUP,
    Signal::SIGQUIT,
    Signal::SIGXCPU,
    Signal::SIGXFSZ,
    Signal::SIGVTALRM,
    Signal::SIGPROF,
];

/// State reachable from signal handlers.
pub struct SignalContext {
    tty_fd: AtomicI32,
    cooked: OnceCell<libc::termios>,
    raw: OnceCell<libc::termios>,
    in_raw: AtomicBool,
    children: [AtomicI32; MAX_TRACKED],
    resized: AtomicBool,
    resumed: AtomicBool,
}

pub static SIGNALS: SignalContext = SignalContext {
    tty_fd: AtomicI32::new(-1),
    cooked: OnceCell::new(),
    raw: OnceCell::new(),
    in_raw: AtomicBool::new(false),
    children: [const { AtomicI32::new(0) }; MAX_TRACKED],
    resized: AtomicBool::new(false),
    resumed: AtomicBool::new(false),
};

impl SignalContext {
    /// Records the terminal the handler restores. Only the first registration sticks.
    pub fn register_terminal(&self, fd: i32, cooked: libc::termios, raw: libc::termios) {
        let _ = self.cooked.set(cooked);
        let _ = self.raw.set(raw);
        self.tty_fd.store(fd, Ordering::SeqCst);
    }

    pub fn set_raw(&self, raw: bool) {
        self.in_raw.store(raw, Ordering::SeqCst);
    }

    /// Makes a child process group reachable for hangup forwarding.
    pub fn track_child(&self, pgid: i32) {
        for slot in &self.children {
            if slot
                .compare_exchange(0, pgid, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return;
            }
        }
        tracing::warn!(pgid, "too many child processes to track for signal cleanup");
    }

    pub fn untrack_child(&self, pgid: i32) {
        for slot in &self.children {
            let _ = slot.compare_exchange(pgid, 0, Ordering::SeqCst, Ordering::SeqCst);
        }
    }

    /// True once after a `SIGWINCH`.
    pub fn take_resized(&self) -> bool {
        self.resized.swap(false, Ordering::SeqCst)
    }

    /// True once after the browser was continued from a stop.
    pub fn take_resumed(&self) -> bool {
        self.resumed.swap(false, Ordering::SeqCst)
    }

    /// Puts the terminal back into cooked mode if the browser had it raw. Usable from signal
    /// handlers and the panic hook.
    pub fn restore_terminal(&self) -> bool {
        if !self.in_raw.swap(false, Ordering::SeqCst) {
            return false;
        }
        let fd = self.tty_fd.load(Ordering::SeqCst);
        if fd < 0 {
            return false;
        }
        // SAFETY: write and tcsetattr are async-signal-safe; the buffers are 'static.
        unsafe {
            libc::write(fd, LEAVE_SEQUENCE.as_ptr().cast(), LEAVE_SEQUENCE.len());
            if let Some(cooked) = self.cooked.get() {
                libc::tcsetattr(fd, libc::TCSAFLUSH, cooked);
            }
        }
        true
    }

    fn reenter_terminal(&self) {
        let fd = self.tty_fd.load(Ordering::SeqCst);
        if fd < 0 {
            return;
        }
        // SAFETY: see restore_terminal.
        unsafe {
            if let Some(raw) = self.raw.get() {
                libc::tcsetattr(fd, libc::TCSAFLUSH, raw);
            }
            libc::write(fd, ENTER_SEQUENCE.as_ptr().cast(), ENTER_SEQUENCE.len());
        }
        self.in_raw.store(true, Ordering::SeqCst);
    }

    fn signal_children(&self, sig: libc::c_int) {
        for slot in &self.children {
            let pgid = slot.load(Ordering::SeqCst);
            if pgid <= 0 {
                continue;
            }
            // SAFETY: kill is async-signal-safe.
            unsafe {
                libc::kill(-pgid, sig);
                if sig == libc::SIGHUP {
                    libc::kill(-pgid, libc::SIGCONT);
                }
            }
        }
    }
}

extern "C" fn cleanup_and_reraise(sig: libc::c_int) {
    let was_raw = SIGNALS.restore_terminal();
    let forward = if sig == libc::SIGTSTP {
        libc::SIGTSTP
    } else {
        libc::SIGHUP
    };
    SIGNALS.signal_children(forward);

    // SA_RESETHAND restored the default action, so this stops or kills the process.
    unsafe {
        libc::raise(sig);
    }

    // Only reached after SIGCONT following a stop.
    if was_raw {
        SIGNALS.reenter_terminal();
    }
    SIGNALS.resumed.store(true, Ordering::SeqCst);
    let _ = install(Signal::SIGTSTP, SigHandler::Handler(cleanup_and_reraise));
}

extern "C" fn note_resize(_: libc::c_int) {
    SIGNALS.resized.store(true, Ordering::SeqCst);
}

fn install(signal: Signal, handler: SigHandler) -> nix::Result<SigAction> {
    let flags = match handler {
        SigHandler::Handler(_) if signal != Signal::SIGWINCH => {
            SaFlags::SA_NODEFER | SaFlags::SA_RESETHAND
        }
        _ => SaFlags::empty(),
    };
    let action = SigAction::new(handler, flags, SigSet::empty());
    // SAFETY: the handlers only use async-signal-safe operations on SIGNALS.
    unsafe { sigaction(signal, &action) }
}

/// Installs the cleanup handler for terminating signals and `SIGTSTP`, and the resize flag.
pub fn install_handlers() {
    for signal in FATAL_SIGNALS.into_iter().chain([Signal::SIGTSTP]) {
        if let Err(e) = install(signal, SigHandler::Handler(cleanup_and_reraise)) {
            tracing::error!("Failed to set {} handler: {}", signal, e);
        }
    }
    if let Err(e) = install(Signal::SIGWINCH, SigHandler::Handler(note_resize)) {
        tracing::error!("Failed to set SIGWINCH handler: {}", e);
    }
}

/// Sets how the browser reacts to `SIGTTOU` around foreground hand-offs.
pub fn set_ttou_ignored(ignored: bool) -> nix::Result<()> {
    let handler = if ignored {
        SigHandler::SigIgn
    } else {
        SigHandler::SigDfl
    };
    install(Signal::SIGTTOU, handler).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_slots_are_reused() {
        let ctx = SignalContext {
            tty_fd: AtomicI32::new(-1),
            cooked: OnceCell::new(),
            raw: OnceCell::new(),
            in_raw: AtomicBool::new(false),
            children: [const { AtomicI32::new(0) }; MAX_TRACKED],
            resized: AtomicBool::new(false),
            resumed: AtomicBool::new(false),
        };
        ctx.track_child(100);
        ctx.track_child(200);
        ctx.untrack_child(100);
        ctx.track_child(300);

        let live: Vec<i32> = ctx
            .children
            .iter()
            .map(|s| s.load(Ordering::SeqCst))
            .filter(|&p| p != 0)
            .collect();
        assert_eq!(live, vec![300, 200]);
    }

    #[test]
    fn restore_without_terminal_is_a_no_op() {
        let ctx = SignalContext {
            tty_fd: AtomicI32::new(-1),
            cooked: OnceCell::new(),
            raw: OnceCell::new(),
            in_raw: AtomicBool::new(true),
            children: [const { AtomicI32::new(0) }; MAX_TRACKED],
            resized: AtomicBool::new(false),
            resumed: AtomicBool::new(false),
        };
        assert!(!ctx.restore_terminal());
        assert!(!ctx.in_raw.load(Ordering::SeqCst));
    }
}
