//! Process and job control for sift.
//!
//! Scripts run as `$shell -c <script> sift <args...>` in a process group of their own. While a
//! script runs it owns the terminal's foreground; the browser blocks in `waitpid` with
//! `WUNTRACED` until the script exits, dies from a signal, or stops. Stopped scripts stay in
//! the [JobTable] and can be resumed with [JobTable::resume]. `SIGTTOU` is ignored around
//! every foreground hand-off so the browser is never stopped by its own `tcsetpgrp`.
//!
//! Without a terminal (tests, scripted use) the hand-off is skipped and children inherit the
//! browser's standard streams.

use crate::core::signals::{self, SIGNALS};
use crate::error::BrowserError;

use nix::errno::Errno;
use nix::sys::signal::{SigHandler, Signal, killpg, signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{Pid, getpgrp, getpid, setpgid, tcsetpgrp};

use std::ffi::OsString;
use std::fs::File;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// `$0` of every script.
const SCRIPT_NAME: &str = "sift";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Terminated,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Exited(i32),
    Killed(Signal),
    Stopped(Signal),
    /// The process was already reaped elsewhere.
    Vanished,
}

#[derive(Debug)]
pub struct Job {
    pid: Pid,
    state: JobState,
    command: String,
}

impl Job {
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// First line of the script, for display.
    #[inline]
    pub fn command(&self) -> &str {
        &self.command
    }
}

/// Everything needed to launch one script.
#[derive(Debug, Clone)]
pub struct ScriptInvocation {
    pub shell: PathBuf,
    pub script: String,
    pub args: Vec<PathBuf>,
    pub env: Vec<(&'static str, OsString)>,
    pub unset: Vec<&'static str>,
}

impl ScriptInvocation {
    pub fn new(shell: impl Into<PathBuf>, script: impl Into<String>) -> Self {
        ScriptInvocation {
            shell: shell.into(),
            script: script.into(),
            args: Vec::new(),
            env: Vec::new(),
            unset: Vec::new(),
        }
    }

    fn command(&self, tty: Option<&File>) -> std::io::Result<Command> {
        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&self.script)
            .arg(SCRIPT_NAME)
            .args(&self.args);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        for key in &self.unset {
            command.env_remove(key);
        }
        if let Some(tty) = tty {
            command
                .stdin(Stdio::from(tty.try_clone()?))
                .stdout(Stdio::from(tty.try_clone()?));
        }

        let tty_fd = tty.map(|t| t.as_raw_fd());
        let child_setup = move || -> std::io::Result<()> {
            setpgid(Pid::from_raw(0), Pid::from_raw(0))?;
            if let Some(fd) = tty_fd {
                // SAFETY: fd stays open in the child until exec.
                tcsetpgrp(unsafe { BorrowedFd::borrow_raw(fd) }, getpid())?;
            }
            for sig in [
                Signal::SIGTTOU,
                Signal::SIGTTIN,
                Signal::SIGTSTP,
                Signal::SIGINT,
                Signal::SIGQUIT,
            ] {
                // SAFETY: resetting a disposition to default is async-signal-safe.
                unsafe { signal(sig, SigHandler::SigDfl) }?;
            }
            Ok(())
        };
        // SAFETY: child_setup only calls async-signal-safe functions.
        unsafe {
            command.pre_exec(child_setup);
        }
        Ok(command)
    }
}

/// The running-process list, oldest first.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Launches a script in the foreground and waits until it exits or stops.
    pub fn spawn(
        &mut self,
        invocation: &ScriptInvocation,
        tty: Option<&File>,
    ) -> Result<JobOutcome, BrowserError> {
        let mut command = invocation.command(tty)?;

        signals::set_ttou_ignored(true).map_err(|e| BrowserError::Terminal(e.into()))?;
        let child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                // pre_exec may have handed the terminal to the dead child already.
                let _ = tty.map_or(Ok(()), reclaim_terminal);
                let _ = signals::set_ttou_ignored(false);
                tracing::warn!(shell = %invocation.shell.display(), "exec failed: {}", source);
                return Err(BrowserError::Exec {
                    shell: invocation.shell.clone(),
                    source,
                });
            }
        };
        let pid = Pid::from_raw(child.id() as i32);
        // The child calls setpgid too; whichever runs first wins.
        let _ = setpgid(pid, pid);

        SIGNALS.track_child(pid.as_raw());
        self.jobs.push(Job {
            pid,
            state: JobState::Running,
            command: invocation.script.lines().last().unwrap_or_default().to_string(),
        });
        tracing::info!(pid = pid.as_raw(), "started script");

        let outcome = self.foreground(pid, tty);
        let restored = signals::set_ttou_ignored(false);
        let outcome = outcome?;
        restored.map_err(|e| BrowserError::Terminal(e.into()))?;
        Ok(outcome)
    }

    /// Continues the `n`th job counted from the most recent and waits for it like a new one.
    pub fn resume(&mut self, n: usize, tty: Option<&File>) -> Result<JobOutcome, BrowserError> {
        let index = self
            .jobs
            .len()
            .checked_sub(n + 1)
            .ok_or(BrowserError::NoJob(n))?;
        let pid = self.jobs[index].pid;

        signals::set_ttou_ignored(true).map_err(|e| BrowserError::Terminal(e.into()))?;
        if let Some(tty) = tty {
            give_terminal(tty, pid)?;
        }
        let outcome = match killpg(pid, Signal::SIGCONT) {
            Err(Errno::ESRCH) => {
                self.finish(pid);
                Ok(JobOutcome::Vanished)
            }
            _ => {
                self.jobs[index].state = JobState::Running;
                tracing::info!(pid = pid.as_raw(), "resumed job");
                self.wait(pid)
            }
        };
        let reclaimed = tty.map_or(Ok(()), reclaim_terminal);
        let restored = signals::set_ttou_ignored(false);
        let outcome = outcome?;
        reclaimed?;
        restored.map_err(|e| BrowserError::Terminal(e.into()))?;
        Ok(outcome)
    }

    /// Sends a hangup (and a continue, for stopped ones) to every job and forgets them.
    pub fn hangup_all(&mut self) {
        for job in self.jobs.drain(..) {
            let _ = killpg(job.pid, Signal::SIGHUP);
            let _ = killpg(job.pid, Signal::SIGCONT);
            SIGNALS.untrack_child(job.pid.as_raw());
            tracing::info!(pid = job.pid.as_raw(), "sent hangup to job");
        }
    }

    fn foreground(&mut self, pid: Pid, tty: Option<&File>) -> Result<JobOutcome, BrowserError> {
        if let Some(tty) = tty {
            match tcsetpgrp(tty, pid) {
                // Lost the race with a child that already exited; waitpid reports it.
                Ok(()) | Err(Errno::EPERM) | Err(Errno::ESRCH) => {}
                Err(source) => {
                    return Err(BrowserError::ForegroundControl {
                        pgid: pid.as_raw(),
                        source,
                    });
                }
            }
        }
        let outcome = self.wait(pid);
        let reclaimed = tty.map_or(Ok(()), reclaim_terminal);
        let outcome = outcome?;
        reclaimed?;
        Ok(outcome)
    }

    fn wait(&mut self, pid: Pid) -> Result<JobOutcome, BrowserError> {
        loop {
            let outcome = match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Exited(_, code)) => JobOutcome::Exited(code),
                Ok(WaitStatus::Signaled(_, sig, _)) => JobOutcome::Killed(sig),
                Ok(WaitStatus::Stopped(_, sig)) => {
                    if let Some(job) = self.jobs.iter_mut().find(|j| j.pid == pid) {
                        job.state = JobState::Stopped;
                    }
                    tracing::info!(pid = pid.as_raw(), %sig, "job stopped");
                    return Ok(JobOutcome::Stopped(sig));
                }
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => JobOutcome::Vanished,
                Err(source) => {
                    return Err(BrowserError::Wait {
                        pid: pid.as_raw(),
                        source,
                    });
                }
            };
            self.finish(pid);
            tracing::info!(pid = pid.as_raw(), ?outcome, "job finished");
            return Ok(outcome);
        }
    }

    fn finish(&mut self, pid: Pid) {
        if let Some(job) = self.jobs.iter_mut().find(|j| j.pid == pid) {
            job.state = JobState::Terminated;
        }
        self.jobs.retain(|j| j.state != JobState::Terminated);
        SIGNALS.untrack_child(pid.as_raw());
    }
}

fn give_terminal(tty: &File, pgid: Pid) -> Result<(), BrowserError> {
    tcsetpgrp(tty, pgid).map_err(|source| BrowserError::ForegroundControl {
        pgid: pgid.as_raw(),
        source,
    })
}

fn reclaim_terminal(tty: &File) -> Result<(), BrowserError> {
    give_terminal(tty, getpgrp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn shell() -> Option<PathBuf> {
        which::which("sh").ok()
    }

    /// Skips the test when no POSIX shell is on PATH.
    macro_rules! skip_if_no_sh {
        () => {
            match shell() {
                Some(sh) => sh,
                None => return Ok(()),
            }
        };
    }

    #[test]
    fn exit_status_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let sh = skip_if_no_sh!();
        let mut jobs = JobTable::new();

        let outcome = jobs.spawn(&ScriptInvocation::new(&sh, "exit 7"), None)?;
        assert_eq!(outcome, JobOutcome::Exited(7));
        assert!(jobs.is_empty());
        Ok(())
    }

    #[test]
    fn stopped_script_stays_listed_until_resumed() -> Result<(), Box<dyn std::error::Error>> {
        let sh = skip_if_no_sh!();
        let mut jobs = JobTable::new();

        let outcome = jobs.spawn(&ScriptInvocation::new(&sh, "kill -STOP $$; exit 3"), None)?;
        assert_eq!(outcome, JobOutcome::Stopped(Signal::SIGSTOP));
        assert_eq!(jobs.len(), 1);
        assert_eq!(
            jobs.iter().map(Job::state).collect::<Vec<_>>(),
            vec![JobState::Stopped]
        );

        let outcome = jobs.resume(0, None)?;
        assert_eq!(outcome, JobOutcome::Exited(3));
        assert!(jobs.is_empty());
        Ok(())
    }

    #[test]
    fn resume_without_jobs_is_recoverable() {
        let mut jobs = JobTable::new();
        let err = jobs.resume(0, None).err();
        assert!(matches!(err, Some(BrowserError::NoJob(0))));
        assert!(!err.is_some_and(|e| e.is_fatal()));
    }

    #[test]
    fn arguments_and_environment_reach_the_script() -> Result<(), Box<dyn std::error::Error>> {
        let sh = skip_if_no_sh!();
        let dir = tempdir()?;
        let out = dir.path().join("out");

        let mut invocation = ScriptInvocation::new(
            &sh,
            format!(
                "printf '%s|' \"$0\" \"$@\" \"$SIFT_CURSOR\" > '{}'",
                out.display()
            ),
        );
        invocation.args = vec![PathBuf::from("/a"), PathBuf::from("/b c")];
        invocation.env = vec![("SIFT_CURSOR", OsString::from("/cur"))];

        let mut jobs = JobTable::new();
        assert_eq!(jobs.spawn(&invocation, None)?, JobOutcome::Exited(0));
        assert_eq!(fs::read_to_string(&out)?, "sift|/a|/b c|/cur|");
        Ok(())
    }

    #[test]
    fn missing_shell_is_recoverable() {
        let mut jobs = JobTable::new();
        let err = jobs
            .spawn(&ScriptInvocation::new("/nonexistent/sift-shell", "true"), None)
            .err();
        assert!(matches!(err, Some(BrowserError::Exec { .. })));
        assert!(!err.is_some_and(|e| e.is_fatal()));
        assert!(jobs.is_empty());
    }
}
