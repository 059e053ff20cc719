//! Sort specification and multi-key comparator.
//!
//! A [SortSpec] is an ordered list of `(direction, key)` pairs written as text, e.g. `+n-s`
//! (name ascending, then size descending). Each key appears at most once. Unless directories
//! are interleaved, they always come before files regardless of the spec.

use crate::core::cache::Entry;

use std::cmp::Ordering;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortField {
    Name,
    Size,
    Permissions,
    Modified,
    Changed,
    Accessed,
    Random,
    Selected,
}

impl SortField {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'n' => SortField::Name,
            's' => SortField::Size,
            'p' => SortField::Permissions,
            'm' => SortField::Modified,
            'c' => SortField::Changed,
            'a' => SortField::Accessed,
            'r' => SortField::Random,
            '*' => SortField::Selected,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            SortField::Name => 'n',
            SortField::Size => 's',
            SortField::Permissions => 'p',
            SortField::Modified => 'm',
            SortField::Changed => 'c',
            SortField::Accessed => 'a',
            SortField::Random => 'r',
            SortField::Selected => '*',
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

/// How a key in a `sort:` argument sets its direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Direction {
    Ascending,
    Descending,
    Toggle,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec {
            keys: vec![SortKey {
                field: SortField::Name,
                descending: false,
            }],
        }
    }
}

impl SortSpec {
    /// Parses a full spec such as `+n-s`. Toggle markers count as ascending.
    pub fn parse(input: &str) -> Option<Self> {
        let mut spec = SortSpec { keys: Vec::new() };
        spec.merge(input)?;
        Some(spec)
    }

    #[inline]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Direction of `field` if it is part of the spec.
    pub fn direction_of(&self, field: SortField) -> Option<bool> {
        self.keys
            .iter()
            .find(|k| k.field == field)
            .map(|k| k.descending)
    }

    /// Merges `input` into the front of the spec.
    ///
    /// Keys keep their relative order from `input` and move ahead of every other key. A key
    /// written with `~` turns descending only when it already was the front key and
    /// ascending, otherwise it becomes ascending. Returns `None` and leaves the spec untouched
    /// when `input` is malformed.
    pub fn merge(&mut self, input: &str) -> Option<()> {
        let parsed = parse_pairs(input)?;
        let front = self.keys.first().copied();

        let mut merged: Vec<SortKey> = Vec::with_capacity(self.keys.len() + parsed.len());
        for (direction, field) in parsed {
            let descending = match direction {
                Direction::Ascending => false,
                Direction::Descending => true,
                Direction::Toggle => front.is_some_and(|f| f.field == field && !f.descending),
            };
            merged.retain(|k| k.field != field);
            merged.push(SortKey { field, descending });
        }
        for key in &self.keys {
            if !merged.iter().any(|k| k.field == key.field) {
                merged.push(*key);
            }
        }
        self.keys = merged;
        Some(())
    }

    /// Compares two entries by this spec.
    pub fn compare(&self, a: &Entry, b: &Entry, interleave: bool) -> Ordering {
        if !interleave {
            match (a.is_dir(), b.is_dir()) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => {}
            }
        }

        for key in &self.keys {
            let ord = compare_field(key.field, a, b);
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in &self.keys {
            let sign = if key.descending { '-' } else { '+' };
            write!(f, "{}{}", sign, key.field.as_char())?;
        }
        Ok(())
    }
}

fn parse_pairs(input: &str) -> Option<Vec<(Direction, SortField)>> {
    let mut out = Vec::new();
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        let (direction, key) = match c {
            '+' => (Direction::Ascending, chars.next()?),
            '-' => (Direction::Descending, chars.next()?),
            '~' => (Direction::Toggle, chars.next()?),
            other => (Direction::Ascending, other),
        };
        out.push((direction, SortField::from_char(key)?));
    }
    if out.is_empty() { None } else { Some(out) }
}

fn compare_field(field: SortField, a: &Entry, b: &Entry) -> Ordering {
    let (ma, mb) = (a.metadata(), b.metadata());
    match field {
        SortField::Name => compare_names(a.name().as_bytes(), b.name().as_bytes()),
        SortField::Size => ma.size().cmp(&mb.size()),
        SortField::Permissions => (ma.mode() & 0o7777).cmp(&(mb.mode() & 0o7777)),
        SortField::Modified => (ma.mtime(), ma.mtime_nsec()).cmp(&(mb.mtime(), mb.mtime_nsec())),
        SortField::Changed => (ma.ctime(), ma.ctime_nsec()).cmp(&(mb.ctime(), mb.ctime_nsec())),
        SortField::Accessed => (ma.atime(), ma.atime_nsec()).cmp(&(mb.atime(), mb.atime_nsec())),
        SortField::Random => a.rank().cmp(&b.rank()),
        SortField::Selected => b.is_selected().cmp(&a.is_selected()),
    }
}

/// Case-insensitive name comparison with numeric digit runs.
///
/// Digit runs compare by length first, then by value, so `9` sorts before `10` and
/// `1, 2, 9` all sort before `0001`.
pub fn compare_names(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let end_a = digit_run_end(a, i);
            let end_b = digit_run_end(b, j);
            let ord = (end_a - i)
                .cmp(&(end_b - j))
                .then_with(|| a[i..end_a].cmp(&b[j..end_b]));
            if ord != Ordering::Equal {
                return ord;
            }
            i = end_a;
            j = end_b;
        } else {
            let (ca, cb) = (a[i].to_ascii_lowercase(), b[j].to_ascii_lowercase());
            if ca != cb {
                return ca.cmp(&cb);
            }
            i += 1;
            j += 1;
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

fn digit_run_end(s: &[u8], start: usize) -> usize {
    s[start..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(s.len(), |p| start + p)
}
