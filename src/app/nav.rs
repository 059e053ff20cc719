//! Directory listing, cursor and scroll logic for sift.
//!
//! [BrowserState::populate] is the one place a listing is built: it changes the process
//! directory, updates history, drops the old listing from the cache, expands the glob
//! patterns, assigns shuffle ranks, sorts, and puts the cursor back somewhere sensible.
//!
//! Cursor and scroll always satisfy `cursor < max(nfiles, 1)` and
//! `scroll <= max(0, nfiles - onscreen)`, with a scroll-off margin kept around the cursor.

use crate::app::history::Step;
use crate::app::state::{BrowserState, CHROME_ROWS};
use crate::core::cache::EntryId;
use crate::core::glob;
use crate::error::BrowserError;
use crate::utils::helpers::{normalize_path, trim_trailing_slash};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Largest scroll-off margin, in rows.
const MAX_SCROLLOFF: usize = 5;

/// Where [BrowserState::populate] should go.
#[derive(Copy, Clone, Debug)]
pub enum Target<'a> {
    /// A user supplied path, resolved against the current directory.
    Path(&'a str),
    /// An already resolved directory.
    Dir(&'a Path),
    Back,
    Forward,
    /// Re-read the current directory.
    Refresh,
}

impl BrowserState {
    /// Lists `target` and makes it the current directory.
    ///
    /// A failed directory change leaves the state untouched. Back/forward only move the
    /// history position and are no-ops at either end of it.
    pub(crate) fn populate(&mut self, target: Target<'_>) -> Result<(), BrowserError> {
        let step = match target {
            Target::Back => Some(Step::Back),
            Target::Forward => Some(Step::Forward),
            _ => None,
        };

        let mut unnormalized = None;
        let dir = match target {
            Target::Path(input) => match normalize_path(&self.path, input) {
                Ok(path) => path,
                Err(path) => {
                    unnormalized = Some(path.clone());
                    path
                }
            },
            Target::Dir(path) => path
                .canonicalize()
                .unwrap_or_else(|_| trim_trailing_slash(path)),
            Target::Back | Target::Forward => {
                let Some(path) = step.and_then(|s| self.history.peek(s)) else {
                    return Ok(());
                };
                path.to_path_buf()
            }
            Target::Refresh => self.path.clone(),
        };

        let same_dir = dir == self.path;
        let old_cursor = self.cursor;
        let old_scroll = self.scroll;
        let cursor_path = self.cursor_entry().map(|e| e.path().to_path_buf());

        std::env::set_current_dir(&dir).map_err(|source| BrowserError::ChangeDir {
            path: dir.clone(),
            source,
        })?;
        if let Some(path) = unnormalized {
            self.notices.push(BrowserError::PathNormalization(path));
        }

        match step {
            Some(step) => self.history.commit(step),
            None if !same_dir => self.history.push(dir.clone()),
            None => {}
        }
        let departed = if same_dir {
            None
        } else {
            tracing::debug!(dir = %dir.display(), "entering directory");
            Some(std::mem::replace(&mut self.path, dir)).filter(|p| !p.as_os_str().is_empty())
        };
        if let Some(departed) = &departed {
            self.previous = Some(departed.clone());
        }

        for id in std::mem::take(&mut self.files) {
            if let Some(entry) = self.cache.get_mut(id) {
                entry.index = None;
            }
            self.cache.release_if_unreferenced(id);
        }

        let matches = match glob::expand(&self.globs) {
            Ok(matches) => matches,
            Err(e) if e.kind() == ErrorKind::OutOfMemory => return Err(e.into()),
            Err(e) => {
                tracing::warn!("glob {:?} failed: {}", self.globs, e);
                self.notices.push(BrowserError::bad_argument(
                    "glob:",
                    &self.globs,
                    "invalid pattern",
                ));
                Vec::new()
            }
        };
        for path in matches {
            let id = match self.cache.load(&self.path, &path) {
                Ok(id) => id,
                // Vanished between glob and lstat.
                Err(_) => continue,
            };
            let entry = &mut self.cache[id];
            if entry.index.is_some() {
                continue;
            }
            entry.index = Some(self.files.len());
            self.files.push(id);
        }

        self.shuffle();
        self.sort_files();

        if same_dir {
            let position = cursor_path.and_then(|p| self.position_of(&p));
            self.scroll = old_scroll.min(self.max_scroll());
            self.set_cursor(position.unwrap_or(old_cursor));
        } else {
            self.scroll = 0;
            let position = departed.as_deref().and_then(|d| self.position_of(d));
            self.set_cursor(position.unwrap_or(0));
        }
        self.dirty = true;
        Ok(())
    }

    /// Re-sorts the listing, keeping the cursor on the same entry.
    pub(crate) fn resort(&mut self) {
        let current = self.files.get(self.cursor).copied();
        self.sort_files();
        if let Some(index) = current.and_then(|id| self.cache[id].index) {
            self.set_cursor(index);
        }
        self.dirty = true;
    }

    /// Listing position of the entry with this full path.
    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.files
            .iter()
            .position(|&id| self.cache[id].path() == path)
    }

    pub(crate) fn set_cursor(&mut self, target: usize) {
        let n = self.files.len();
        if n == 0 {
            self.cursor = 0;
            self.scroll = 0;
            return;
        }
        self.cursor = target.min(n - 1);

        let onscreen = self.onscreen.max(1);
        let margin = self.scrolloff();
        if self.cursor < self.scroll + margin {
            self.scroll = self.cursor.saturating_sub(margin);
        }
        if self.cursor + margin + 1 > self.scroll + onscreen {
            self.scroll = self.cursor + margin + 1 - onscreen;
        }
        self.scroll = self.scroll.min(self.max_scroll());
    }

    /// Scrolls the window, dragging the cursor along when it would leave the margins.
    pub(crate) fn set_scroll(&mut self, target: usize) {
        let max_scroll = self.max_scroll();
        self.scroll = target.min(max_scroll);
        let n = self.files.len();
        if n == 0 {
            self.cursor = 0;
            return;
        }

        let onscreen = self.onscreen.max(1);
        let margin = self.scrolloff();
        let low = if self.scroll == 0 {
            0
        } else {
            self.scroll + margin
        };
        let high = if self.scroll == max_scroll {
            n - 1
        } else {
            self.scroll + onscreen - 1 - margin
        };
        self.cursor = self.cursor.clamp(low.min(n - 1), high.min(n - 1));
    }

    /// Moves the cursor and gives every entry passed over the selection state of the entry
    /// the cursor started on.
    pub(crate) fn spread(&mut self, target: usize) {
        let Some(&anchor) = self.files.get(self.cursor) else {
            return;
        };
        let selected = self.cache[anchor].is_selected();
        let from = self.cursor;
        self.set_cursor(target);

        let (lo, hi) = (from.min(self.cursor), from.max(self.cursor));
        for i in lo..=hi {
            self.set_selected(self.files[i], selected);
        }
    }

    /// Records the terminal height. The listing gets every row but the chrome.
    pub(crate) fn set_screen_rows(&mut self, rows: usize) {
        self.screen_rows = rows;
        self.set_onscreen(rows.saturating_sub(CHROME_ROWS));
    }

    /// Records the listing height and re-clamps cursor and scroll to it.
    pub(crate) fn set_onscreen(&mut self, rows: usize) {
        if self.onscreen != rows.max(1) {
            self.onscreen = rows.max(1);
            self.scroll = self.scroll.min(self.max_scroll());
            self.set_cursor(self.cursor);
        }
    }

    #[inline]
    fn max_scroll(&self) -> usize {
        self.files.len().saturating_sub(self.onscreen.max(1))
    }

    #[inline]
    fn scrolloff(&self) -> usize {
        MAX_SCROLLOFF.min((self.onscreen.max(1) - 1) / 2)
    }

    fn sort_files(&mut self) {
        let cache = &self.cache;
        let sort = &self.sort;
        let interleave = self.interleave;
        self.files
            .sort_by(|&a, &b| sort.compare(&cache[a], &cache[b], interleave));
        for (i, &id) in self.files.iter().enumerate() {
            self.cache[id].index = Some(i);
        }
    }

    /// Assigns reproducible shuffle ranks: the seed folds in the entry count and every inode,
    /// so the same set of files always gets the same ranks.
    fn shuffle(&mut self) {
        let n = self.files.len();
        let mut order: Vec<(u64, EntryId)> = self
            .files
            .iter()
            .map(|&id| (self.cache[id].metadata().ino(), id))
            .collect();

        let mut seed = n as u64 + 1;
        for &(ino, _) in &order {
            seed ^= ((ino ^ 89_869_747) ^ (ino << 16)).wrapping_mul(3_644_798_167);
        }
        let cache = &self.cache;
        order.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| cache[a.1].path().cmp(cache[b.1].path()))
        });

        let mut rng = StdRng::seed_from_u64(seed);
        let mut ranks = vec![0usize; n];
        for i in 0..n {
            let j = rng.next_u32() as usize % (i + 1);
            ranks[i] = ranks[j];
            ranks[j] = i;
        }
        for ((_, id), rank) in order.into_iter().zip(ranks) {
            self.cache[id].rank = rank;
        }
    }
}

/// Parses a `move:`/`scroll:` value into an absolute position.
///
/// Accepts `N`, `+N`, `-N`, and any of those with a `%` suffix (percent of `screen`) or
/// `%n` suffix (percent of `nfiles`). Negative results clamp to 0; the caller clamps the
/// upper end.
pub fn parse_motion(value: &str, current: usize, screen: usize, nfiles: usize) -> Option<usize> {
    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1i64, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => (0, value),
    };
    let (digits, base) = match rest.split_once('%') {
        None => (rest, None),
        Some((digits, "")) => (digits, Some(screen)),
        Some((digits, "n")) => (digits, Some(nfiles)),
        Some(_) => return None,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let number: i64 = digits.parse().ok()?;
    let amount = match base {
        Some(base) => number.checked_mul(base as i64)? / 100,
        None => number,
    };
    let target = match sign {
        0 => amount,
        sign => (current as i64).checked_add(sign * amount)?,
    };
    Some(target.max(0) as usize)
}

/// Directory a `cd:` value names, for the special values that are not plain paths.
pub(crate) fn special_dir(state: &BrowserState, value: &str) -> Option<PathBuf> {
    match value {
        "" => crate::utils::helpers::get_home(),
        "-" => state.previous.clone(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InternalGeneral;
    use crate::core::sort::SortSpec;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    fn state_with(names: &[&str]) -> Result<(tempfile::TempDir, BrowserState), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        for name in names {
            fs::write(dir.path().join(name), b"")?;
        }
        let mut state = BrowserState::new(&InternalGeneral::default());
        state.populate(Target::Dir(dir.path()))?;
        Ok((dir, state))
    }

    fn names(state: &BrowserState) -> Vec<String> {
        state
            .files()
            .iter()
            .map(|&id| state.entry(id).name_str().into_owned())
            .collect()
    }

    fn assert_bounds(state: &BrowserState) {
        let n = state.nfiles();
        assert!(state.cursor() < n.max(1), "cursor {} of {}", state.cursor(), n);
        assert!(state.scroll() <= n.saturating_sub(state.onscreen()));
    }

    #[test]
    fn motion_values() {
        assert_eq!(parse_motion("7", 3, 20, 100), Some(7));
        assert_eq!(parse_motion("+2", 3, 20, 100), Some(5));
        assert_eq!(parse_motion("-5", 3, 20, 100), Some(0));
        assert_eq!(parse_motion("50%", 0, 20, 100), Some(10));
        assert_eq!(parse_motion("+50%", 4, 20, 100), Some(14));
        assert_eq!(parse_motion("100%n", 0, 20, 100), Some(100));
        assert_eq!(parse_motion("-10%n", 50, 20, 100), Some(40));
        assert_eq!(parse_motion("", 0, 20, 100), None);
        assert_eq!(parse_motion("+", 0, 20, 100), None);
        assert_eq!(parse_motion("3x", 0, 20, 100), None);
        assert_eq!(parse_motion("5%x", 0, 20, 100), None);
    }

    #[test]
    #[serial]
    fn cursor_and_scroll_stay_in_bounds() -> Result<(), Box<dyn std::error::Error>> {
        let names: Vec<String> = (0..40).map(|i| format!("f{i:02}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (_dir, mut state) = state_with(&refs)?;
        state.set_onscreen(10);

        for target in [0, 39, 100, 5, 20, 0] {
            state.set_cursor(target);
            assert_bounds(&state);
            assert!(state.cursor() >= state.scroll());
            assert!(state.cursor() < state.scroll() + state.onscreen());
        }
        for target in [0, 3, 30, 1000, 7] {
            state.set_scroll(target);
            assert_bounds(&state);
            assert!(state.cursor() >= state.scroll());
            assert!(state.cursor() < state.scroll() + state.onscreen());
        }

        state.set_cursor(20);
        assert_eq!(state.scroll(), 20 + 4 + 1 - 10, "scroll-off margin of 4 rows");
        Ok(())
    }

    #[test]
    #[serial]
    fn empty_listing_pins_cursor_to_zero() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut state) = state_with(&[])?;
        state.set_cursor(10);
        state.set_scroll(10);
        assert_eq!((state.cursor(), state.scroll()), (0, 0));
        Ok(())
    }

    #[test]
    #[serial]
    fn refresh_keeps_the_cursor_entry() -> Result<(), Box<dyn std::error::Error>> {
        let (dir, mut state) = state_with(&["b", "d"])?;
        state.set_cursor(1);
        fs::write(dir.path().join("a"), b"")?;
        fs::write(dir.path().join("c"), b"")?;

        state.populate(Target::Refresh)?;
        assert_eq!(names(&state), vec!["a", "b", "c", "d"]);
        assert_eq!(state.cursor(), 3);
        Ok(())
    }

    #[test]
    #[serial]
    fn parent_listing_lands_on_departed_directory() -> Result<(), Box<dyn std::error::Error>> {
        let (dir, mut state) = state_with(&["a", "b"])?;
        fs::create_dir(dir.path().join("sub"))?;
        fs::create_dir(dir.path().join("zz"))?;

        state.populate(Target::Path("sub"))?;
        state.populate(Target::Path(".."))?;
        let cursor = state.cursor_entry().map(|e| e.name_str().into_owned());
        assert_eq!(cursor.as_deref(), Some("sub"));
        Ok(())
    }

    #[test]
    #[serial]
    fn failed_cd_leaves_state_unchanged() -> Result<(), Box<dyn std::error::Error>> {
        let (dir, mut state) = state_with(&["a"])?;
        let before = state.path().to_path_buf();

        let err = state.populate(Target::Path("missing"));
        assert!(matches!(err, Err(BrowserError::ChangeDir { .. })));
        assert_eq!(state.path(), before);
        assert_eq!(names(&state), vec!["a"]);
        assert_eq!(std::env::current_dir()?, fs::canonicalize(dir.path())?);
        Ok(())
    }

    #[test]
    #[serial]
    fn shuffle_ranks_are_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut state) = state_with(&["a", "b", "c", "d", "e", "f"])?;
        let ranks = |state: &BrowserState| -> Vec<(String, usize)> {
            let mut out: Vec<_> = state
                .files()
                .iter()
                .map(|&id| (state.entry(id).name_str().into_owned(), state.entry(id).rank()))
                .collect();
            out.sort();
            out
        };
        let first = ranks(&state);

        state.sort = SortSpec::parse("-s").ok_or("bad sort")?;
        state.populate(Target::Refresh)?;
        assert_eq!(ranks(&state), first);

        let mut all: Vec<usize> = first.iter().map(|(_, r)| *r).collect();
        all.sort_unstable();
        assert_eq!(all, (0..6).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    #[serial]
    fn sorting_twice_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut state) = state_with(&["b10", "b9", "A", "a", "0001", "1"])?;
        state.sort = SortSpec::parse("r").ok_or("bad sort")?;
        state.resort();
        let once = names(&state);
        state.resort();
        assert_eq!(names(&state), once);
        Ok(())
    }
}
