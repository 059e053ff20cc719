//! Display formatting for listing cells in sift.
//!
//! Each column key of the column specification maps to one cell formatter here. The renderer
//! only pads and places the strings; widths are measured with unicode-width.

use crate::core::cache::Entry;

use chrono::{Local, TimeZone};
use humansize::{DECIMAL, format_size};
use unicode_width::UnicodeWidthChar;

use std::fs::Metadata;
use std::os::unix::fs::{MetadataExt, PermissionsExt};

/// Every column key [format_cell] understands.
pub const COLUMN_KEYS: &str = "*nspmcar";

/// A column spec is a non-empty string of known keys, each used once.
pub fn valid_columns(spec: &str) -> bool {
    !spec.is_empty()
        && spec
            .char_indices()
            .all(|(i, c)| COLUMN_KEYS.contains(c) && !spec[..i].contains(c))
}

/// Formats file attributes like `ls -l` does, e.g. `drwxr-xr-x`.
pub fn format_attributes(meta: &Metadata) -> String {
    let file_type = meta.file_type();
    let first = if file_type.is_dir() {
        'd'
    } else if file_type.is_symlink() {
        'l'
    } else {
        '-'
    };
    let mode = meta.permissions().mode();
    let mut chars = [first, '-', '-', '-', '-', '-', '-', '-', '-', '-'];
    for (i, shift) in [6u32, 3, 0].into_iter().enumerate() {
        let base = 1 + i * 3;
        if (mode >> (shift + 2)) & 1 != 0 {
            chars[base] = 'r';
        }
        if (mode >> (shift + 1)) & 1 != 0 {
            chars[base + 1] = 'w';
        }
        if (mode >> shift) & 1 != 0 {
            chars[base + 2] = 'x';
        }
    }
    chars.iter().collect()
}

/// Human-readable size, or `-` for directories.
pub fn format_file_size(size: u64, is_dir: bool) -> String {
    if is_dir {
        "-".into()
    } else {
        format_size(size, DECIMAL)
    }
}

/// Local time for a `(seconds, nanoseconds)` timestamp, or `-` when it is out of range.
pub fn format_file_time(secs: i64, nsecs: i64) -> String {
    Local
        .timestamp_opt(secs, nsecs.clamp(0, 999_999_999) as u32)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Name cell: directories get a trailing `/`, symlinks show their target.
pub fn format_name(entry: &Entry) -> String {
    let mut name = entry.name_str().into_owned();
    if entry.is_dir() && !name.ends_with('/') {
        name.push('/');
    }
    if let Some(target) = entry.link_target() {
        name.push_str(" -> ");
        name.push_str(&target.to_string_lossy());
    }
    name
}

/// Text of one cell for the column `key`. Unknown keys render empty.
pub fn format_cell(entry: &Entry, key: char) -> String {
    let meta = entry.metadata();
    match key {
        '*' => if entry.is_selected() { "*" } else { " " }.to_string(),
        'n' => format_name(entry),
        's' => format_file_size(meta.size(), meta.is_dir()),
        'p' => format_attributes(meta),
        'm' => format_file_time(meta.mtime(), meta.mtime_nsec()),
        'c' => format_file_time(meta.ctime(), meta.ctime_nsec()),
        'a' => format_file_time(meta.atime(), meta.atime_nsec()),
        'r' => entry.rank().to_string(),
        _ => String::new(),
    }
}

/// Cleans `line` and fits it to exactly `width` columns.
///
/// Control characters are dropped, tabs expand to 4-column stops, and the result is
/// truncated or padded with spaces.
pub fn sanitize_to_exact_width(line: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    let mut current_w = 0;

    for ch in line.chars() {
        if ch == '\t' {
            let space_count = 4 - (current_w % 4);
            if current_w + space_count > width {
                break;
            }
            out.push_str(&" ".repeat(space_count));
            current_w += space_count;
            continue;
        }
        if ch.is_control() {
            continue;
        }

        let w = ch.width().unwrap_or(0);
        if current_w + w > width {
            break;
        }
        out.push(ch);
        current_w += w;
    }

    if current_w < width {
        out.push_str(&" ".repeat(width - current_w));
    }
    out
}

/// Like [sanitize_to_exact_width] but right-aligned, for numeric cells.
pub fn right_align(line: &str, width: usize) -> String {
    let used = line
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| c.width().unwrap_or(0))
        .sum::<usize>();
    if used >= width {
        return sanitize_to_exact_width(line, width);
    }
    let mut out = " ".repeat(width - used);
    out.push_str(&sanitize_to_exact_width(line, used));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::EntryCache;
    use std::fs;
    use tempfile::tempdir;
    use unicode_width::UnicodeWidthStr;

    #[test]
    fn sanitized_cells_have_exact_width() {
        let width = 10;
        for input in ["short.txt", "very_long_filename.txt", "🦀_crab.rs", "\t_tab", "a\x1bb"] {
            let result = sanitize_to_exact_width(input, width);
            assert_eq!(result.width(), width, "input {input:?} gave {result:?}");
            assert!(!result.chars().any(char::is_control));
        }
    }

    #[test]
    fn right_alignment_pads_on_the_left() {
        assert_eq!(right_align("12", 5), "   12");
        assert_eq!(right_align("123456", 3), "123");
    }

    #[test]
    fn cells_for_a_directory_and_a_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = fs::canonicalize(dir.path())?;
        fs::create_dir(root.join("sub"))?;
        fs::write(root.join("file.txt"), b"hello")?;

        let mut cache = EntryCache::new();
        let sub = cache.load(&root, &root.join("sub"))?;
        let file = cache.load(&root, &root.join("file.txt"))?;

        assert_eq!(format_cell(&cache[sub], 'n'), "sub/");
        assert_eq!(format_cell(&cache[sub], 's'), "-");
        assert!(format_cell(&cache[sub], 'p').starts_with('d'));
        assert_eq!(format_cell(&cache[file], 'n'), "file.txt");
        assert_eq!(format_cell(&cache[file], 's'), "5 B");
        assert_eq!(format_cell(&cache[file], '*'), " ");
        assert_eq!(format_cell(&cache[file], 'm').len(), 16);
        Ok(())
    }

    #[test]
    fn column_specs() {
        assert!(valid_columns("*smpn"));
        assert!(valid_columns("n"));
        assert!(!valid_columns(""));
        assert!(!valid_columns("nn"));
        assert!(!valid_columns("nx"));
    }

    #[test]
    fn out_of_range_time_is_a_dash() {
        assert_eq!(format_file_time(i64::MAX, 0), "-");
    }
}
