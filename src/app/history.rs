//! Linear navigation history.
//!
//! Visiting a new directory truncates everything forward of the current position. Moving
//! back and forward only shifts the position, and only once the directory change actually
//! succeeded.

use std::path::{Path, PathBuf};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Back,
    Forward,
}

#[derive(Debug, Default)]
pub struct History {
    entries: Vec<PathBuf>,
    current: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly visited directory and drops the forward history.
    pub fn push(&mut self, path: PathBuf) {
        if let Some(current) = self.current {
            self.entries.truncate(current + 1);
        }
        self.entries.push(path);
        self.current = Some(self.entries.len() - 1);
    }

    /// Directory one step in `step`'s direction, if any.
    pub fn peek(&self, step: Step) -> Option<&Path> {
        let current = self.current?;
        let index = match step {
            Step::Back => current.checked_sub(1)?,
            Step::Forward => current + 1,
        };
        self.entries.get(index).map(PathBuf::as_path)
    }

    /// Moves the position after a successful back/forward navigation.
    pub fn commit(&mut self, step: Step) {
        if self.peek(step).is_none() {
            return;
        }
        self.current = self.current.map(|c| match step {
            Step::Back => c - 1,
            Step::Forward => c + 1,
        });
    }

    #[inline]
    pub fn current(&self) -> Option<&Path> {
        self.entries.get(self.current?).map(PathBuf::as_path)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
