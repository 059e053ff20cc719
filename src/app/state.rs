//! Browser state for sift.
//!
//! [BrowserState] is the aggregate the command interpreter mutates and the renderer reads:
//! the current directory and its listing, cursor and scroll, the selection, the listing
//! settings (globs, sort, columns, interleave), navigation history, the entry cache and the
//! job table.
//!
//! Listing and selection both hold [EntryId]s into the cache. The selection keeps the order
//! entries were selected in, oldest first, which is also the order scripts receive them.

use crate::app::history::History;
use crate::config::InternalGeneral;
use crate::core::cache::{Entry, EntryCache, EntryId};
use crate::core::jobs::JobTable;
use crate::core::sort::SortSpec;
use crate::error::BrowserError;

use std::path::{Path, PathBuf};

/// Listing rows shown before the first resize is known.
pub(crate) const DEFAULT_ONSCREEN: usize = 21;
/// Rows taken by the path, header and status lines.
pub(crate) const CHROME_ROWS: usize = 3;

pub struct BrowserState {
    pub(crate) path: PathBuf,
    pub(crate) previous: Option<PathBuf>,
    pub(crate) files: Vec<EntryId>,
    pub(crate) selection: Vec<EntryId>,
    pub(crate) cursor: usize,
    pub(crate) scroll: usize,

    pub(crate) globs: String,
    pub(crate) sort: SortSpec,
    pub(crate) columns: String,
    pub(crate) interleave: bool,

    pub(crate) dirty: bool,
    pub(crate) quit: bool,
    pub(crate) onscreen: usize,
    /// Terminal height, the base of `N%` motions.
    pub(crate) screen_rows: usize,

    pub(crate) history: History,
    pub(crate) cache: EntryCache,
    pub(crate) jobs: JobTable,
    /// Recoverable problems noticed mid-operation, shown once the operation finishes.
    pub(crate) notices: Vec<BrowserError>,
}

impl BrowserState {
    /// An empty state with the configured listing settings. Nothing is listed until the
    /// first populate.
    pub fn new(general: &InternalGeneral) -> Self {
        BrowserState {
            path: PathBuf::new(),
            previous: None,
            files: Vec::new(),
            selection: Vec::new(),
            cursor: 0,
            scroll: 0,
            globs: general.glob().to_string(),
            sort: general.sort().clone(),
            columns: general.columns().to_string(),
            interleave: general.interleave(),
            dirty: true,
            quit: false,
            onscreen: DEFAULT_ONSCREEN,
            screen_rows: DEFAULT_ONSCREEN + CHROME_ROWS,
            history: History::new(),
            cache: EntryCache::new(),
            jobs: JobTable::new(),
            notices: Vec::new(),
        }
    }

    // Getters / Accessors

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn files(&self) -> &[EntryId] {
        &self.files
    }

    #[inline]
    pub fn nfiles(&self) -> usize {
        self.files.len()
    }

    /// Selected entries, oldest first.
    #[inline]
    pub fn selection(&self) -> &[EntryId] {
        &self.selection
    }

    #[inline]
    pub fn nselected(&self) -> usize {
        self.selection.len()
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    #[inline]
    pub fn onscreen(&self) -> usize {
        self.onscreen
    }

    #[inline]
    pub fn globs(&self) -> &str {
        &self.globs
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

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    #[inline]
    pub fn cache(&self) -> &EntryCache {
        &self.cache
    }

    #[inline]
    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    #[inline]
    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.cache[id]
    }

    pub fn cursor_entry(&self) -> Option<&Entry> {
        self.files.get(self.cursor).map(|&id| &self.cache[id])
    }

    /// Full paths of the selection, oldest-selected first.
    pub fn selected_paths(&self) -> Vec<PathBuf> {
        self.selection
            .iter()
            .map(|&id| self.cache[id].path().to_path_buf())
            .collect()
    }

    pub(crate) fn take_notices(&mut self) -> Vec<BrowserError> {
        std::mem::take(&mut self.notices)
    }

    // Selection

    /// Adds or removes one entry. A deselected entry that is not listed is released.
    pub(crate) fn set_selected(&mut self, id: EntryId, selected: bool) {
        let Some(entry) = self.cache.get_mut(id) else {
            return;
        };
        if entry.selected == selected {
            return;
        }
        entry.selected = selected;
        if selected {
            self.selection.push(id);
        } else {
            self.selection.retain(|&other| other != id);
            self.cache.release_if_unreferenced(id);
        }
        self.dirty = true;
    }

    pub(crate) fn toggle_selected(&mut self, id: EntryId) {
        let selected = self.cache.get(id).is_some_and(Entry::is_selected);
        self.set_selected(id, !selected);
    }

    /// Selects every listed entry.
    pub(crate) fn select_all(&mut self) {
        for i in 0..self.files.len() {
            self.set_selected(self.files[i], true);
        }
    }

    /// Inverts the selection state of every listed entry.
    pub(crate) fn toggle_all(&mut self) {
        for i in 0..self.files.len() {
            self.toggle_selected(self.files[i]);
        }
    }

    /// Empties the selection, including entries outside the current listing.
    pub(crate) fn clear_selection(&mut self) {
        for id in std::mem::take(&mut self.selection) {
            if let Some(entry) = self.cache.get_mut(id) {
                entry.selected = false;
            }
            self.cache.release_if_unreferenced(id);
        }
        self.dirty = true;
    }
}
