//! Glob pattern expansion for directory listings.
//!
//! Patterns are space-delimited and each one is expanded on its own with the C library's
//! `glob(3)`, unsorted, relative to the process working directory. Results of all patterns
//! are concatenated in pattern order. Hidden files only match patterns that start with a
//! dot, which is also how `.` and `..` can appear in a listing.

use std::ffi::{CStr, CString, OsStr};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// Owns a `glob_t` and frees it on drop.
struct GlobBuf(libc::glob_t);

impl GlobBuf {
    fn new() -> Self {
        // SAFETY: glob_t is a plain C struct for which all-zero is the documented initial state.
        GlobBuf(unsafe { std::mem::zeroed() })
    }

    fn paths(&self) -> Vec<PathBuf> {
        let count = self.0.gl_pathc as usize;
        if count == 0 || self.0.gl_pathv.is_null() {
            return Vec::new();
        }
        // SAFETY: after a successful glob() gl_pathv holds gl_pathc valid C strings.
        let raw = unsafe { std::slice::from_raw_parts(self.0.gl_pathv, count) };
        raw.iter()
            .filter(|p| !p.is_null())
            .map(|&p| {
                let bytes = unsafe { CStr::from_ptr(p) }.to_bytes();
                PathBuf::from(OsStr::from_bytes(bytes))
            })
            .collect()
    }
}

impl Drop for GlobBuf {
    fn drop(&mut self) {
        // SAFETY: globfree accepts a zeroed or filled glob_t exactly once.
        unsafe { libc::globfree(&mut self.0) };
    }
}

/// Expands one pattern. No match is not an error.
pub fn expand_one(pattern: &str) -> io::Result<Vec<PathBuf>> {
    let c_pattern = CString::new(pattern).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "glob pattern contains a NUL byte")
    })?;
    let mut buf = GlobBuf::new();

    // SAFETY: c_pattern is a valid C string and buf.0 a valid glob_t for the call's duration.
    let rc = unsafe { libc::glob(c_pattern.as_ptr(), libc::GLOB_NOSORT, None, &mut buf.0) };
    match rc {
        0 => Ok(buf.paths()),
        libc::GLOB_NOMATCH => Ok(Vec::new()),
        libc::GLOB_NOSPACE => Err(io::Error::new(
            io::ErrorKind::OutOfMemory,
            "out of memory while expanding glob",
        )),
        // GLOB_ABORTED: an unreadable directory; keep whatever was matched.
        _ => Ok(buf.paths()),
    }
}

/// Expands every space-delimited pattern in `patterns`, concatenating the results.
pub fn expand(patterns: &str) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for pattern in patterns.split_whitespace() {
        out.extend(expand_one(pattern)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use tempfile::tempdir;

    struct CwdGuard(PathBuf);

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    #[test]
    #[serial]
    fn expands_patterns_independently() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        File::create(dir.path().join("a.rs"))?;
        File::create(dir.path().join("b.txt"))?;
        File::create(dir.path().join(".hidden"))?;

        let _guard = CwdGuard(std::env::current_dir()?);
        std::env::set_current_dir(dir.path())?;

        let mut all = expand("*")?;
        all.sort();
        assert_eq!(all, vec![PathBuf::from("a.rs"), PathBuf::from("b.txt")]);

        let mixed = expand("*.txt *.rs *.none")?;
        assert_eq!(mixed, vec![PathBuf::from("b.txt"), PathBuf::from("a.rs")]);

        let dots = expand(".*")?;
        assert!(dots.contains(&PathBuf::from(".hidden")));
        assert!(!dots.contains(&PathBuf::from("a.rs")));
        Ok(())
    }

    #[test]
    fn rejects_nul_in_pattern() {
        assert!(expand_one("a\0b").is_err());
    }
}
