//! Entry cache for sift.
//!
//! Every filesystem object the browser has touched lives in one [EntryCache] arena and is
//! addressed by a generation-checked [EntryId]. An entry is identified by its fingerprint
//! (device, inode, full path) so two hard links are two entries.
//!
//! Lifetime follows two roles. An entry is *viewed* while it has a display index in the
//! current listing and *selected* while it is in the selection. As soon as it has neither
//! role [EntryCache::release_if_unreferenced] frees its slot; callers invoke it after every
//! transition that may drop the last role.

use crate::error::BrowserError;
use crate::utils::helpers::{normalize_path, trim_trailing_slash};

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs::{self, Metadata};
use std::io;
use std::ops::{Index, IndexMut};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// Handle to a cached entry. Stale handles never alias a newer entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryId {
    index: u32,
    generation: u32,
}

/// One filesystem object as seen by the browser.
#[derive(Debug)]
pub struct Entry {
    path: PathBuf,
    name: OsString,
    link_target: Option<PathBuf>,
    target_mode: Option<u32>,
    metadata: Metadata,
    pub(crate) rank: usize,
    pub(crate) index: Option<usize>,
    pub(crate) selected: bool,
}

impl Entry {
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name relative to the directory it was last loaded from, or its last component.
    #[inline]
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    #[inline]
    pub fn name_str(&self) -> std::borrow::Cow<'_, str> {
        self.name.to_string_lossy()
    }

    #[inline]
    pub fn link_target(&self) -> Option<&Path> {
        self.link_target.as_deref()
    }

    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    #[inline]
    pub fn is_viewed(&self) -> bool {
        self.index.is_some()
    }

    #[inline]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    #[inline]
    pub fn is_symlink(&self) -> bool {
        self.metadata.file_type().is_symlink()
    }

    /// Directories and symlinks pointing at directories.
    pub fn is_dir(&self) -> bool {
        if self.metadata.is_dir() {
            return true;
        }
        self.target_mode.is_some_and(|m| m & S_IFMT == S_IFDIR)
    }

    fn matches(&self, dev: u64, ino: u64, path: &Path) -> bool {
        self.metadata.dev() == dev
            && self.metadata.ino() == ino
            && self.path.as_os_str() == path.as_os_str()
    }
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Result of [EntryCache::lookup_or_load].
#[derive(Debug, Clone, Copy)]
pub struct Lookup {
    pub id: EntryId,
    /// False when the path could not be normalized and was used as written.
    pub normalized: bool,
}

/// Arena owning every loaded entry, bucketed by inode.
#[derive(Default)]
pub struct EntryCache {
    slots: Vec<Slot>,
    free: Vec<u32>,
    buckets: HashMap<u64, Vec<EntryId>>,
}

impl EntryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entry.as_ref())
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entry.as_mut())
    }

    /// Whether `id` still refers to a loaded entry.
    #[inline]
    pub fn contains(&self, id: EntryId) -> bool {
        self.get(id).is_some()
    }

    /// Number of loaded entries.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Loads `path` (joined onto `root` when relative) without normalizing it.
    ///
    /// Used for glob results, which are already relative to the current directory and may
    /// legitimately end in `.` or `..`. An existing entry with the same fingerprint is reused
    /// and its metadata and name refreshed against `root`.
    pub fn load(&mut self, root: &Path, path: &Path) -> io::Result<EntryId> {
        let full = trim_trailing_slash(&if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        });
        let metadata = fs::symlink_metadata(&full)?;
        let (dev, ino) = (metadata.dev(), metadata.ino());

        if let Some(id) = self.find(dev, ino, &full) {
            let entry = &mut self[id];
            entry.metadata = metadata;
            entry.name = display_name(root, &entry.path);
            return Ok(id);
        }

        let (link_target, target_mode) = if metadata.file_type().is_symlink() {
            (
                fs::read_link(&full).ok(),
                fs::metadata(&full).ok().map(|m| m.mode()),
            )
        } else {
            (None, None)
        };

        let entry = Entry {
            name: display_name(root, &full),
            path: full,
            link_target,
            target_mode,
            metadata,
            rank: 0,
            index: None,
            selected: false,
        };
        let id = self.insert(entry);
        self.buckets.entry(ino).or_default().push(id);
        Ok(id)
    }

    /// Resolves a user supplied path and loads it.
    ///
    /// `~` is expanded and `.`/`..` resolved; when that fails the joined path is loaded as is
    /// and [Lookup::normalized] is false so the caller can warn.
    pub fn lookup_or_load(&mut self, root: &Path, input: &str) -> Result<Lookup, BrowserError> {
        let (path, normalized) = match normalize_path(root, input) {
            Ok(path) => (path, true),
            Err(path) => (path, false),
        };
        match self.load(root, &path) {
            Ok(id) => Ok(Lookup { id, normalized }),
            Err(_) => Err(BrowserError::NotFound(path)),
        }
    }

    /// Frees the entry if it is neither viewed nor selected. Returns whether it was freed.
    pub fn release_if_unreferenced(&mut self, id: EntryId) -> bool {
        let ino = match self.get(id) {
            Some(e) if e.index.is_none() && !e.selected => e.metadata.ino(),
            _ => return false,
        };

        if let Some(bucket) = self.buckets.get_mut(&ino) {
            bucket.retain(|&other| other != id);
            if bucket.is_empty() {
                self.buckets.remove(&ino);
            }
        }
        let slot = &mut self.slots[id.index as usize];
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        true
    }

    fn find(&self, dev: u64, ino: u64, path: &Path) -> Option<EntryId> {
        self.buckets
            .get(&ino)?
            .iter()
            .copied()
            .find(|&id| self.get(id).is_some_and(|e| e.matches(dev, ino, path)))
    }

    fn insert(&mut self, entry: Entry) -> EntryId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            EntryId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            EntryId {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        }
    }
}

impl Index<EntryId> for EntryCache {
    type Output = Entry;

    fn index(&self, id: EntryId) -> &Entry {
        match self.get(id) {
            Some(entry) => entry,
            None => panic!("stale entry handle {id:?}"),
        }
    }
}

impl IndexMut<EntryId> for EntryCache {
    fn index_mut(&mut self, id: EntryId) -> &mut Entry {
        match self.get_mut(id) {
            Some(entry) => entry,
            None => panic!("stale entry handle {id:?}"),
        }
    }
}

/// Path relative to `root` when it lives below it, otherwise the last component.
fn display_name(root: &Path, full: &Path) -> OsString {
    let root = root.as_os_str().as_bytes();
    let full_bytes = full.as_os_str().as_bytes();
    let prefix_len = if root.ends_with(b"/") {
        root.len()
    } else {
        root.len() + 1
    };

    if full_bytes.len() > prefix_len
        && full_bytes.starts_with(root)
        && (root.ends_with(b"/") || full_bytes[root.len()] == b'/')
    {
        return OsStr::from_bytes(&full_bytes[prefix_len..]).to_os_string();
    }
    full.file_name()
        .map(OsStr::to_os_string)
        .unwrap_or_else(|| full.as_os_str().to_os_string())
}
