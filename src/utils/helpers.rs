//! Helpers for sift.
//!
//! Path utilities used by the entry cache, the command interpreter and the renderer:
//! - Expanding a leading `~` to the home directory
//! - Normalizing user supplied paths against the current directory
//! - Displaying the home directory as "~" in file paths

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// Returns the home directory of the current user, if it can be determined.
pub fn get_home() -> Option<PathBuf> {
    dirs::home_dir()
}

/// Expands a leading `~` or `~/` to the home directory.
///
/// Anything else, including `~user`, is returned unchanged.
pub fn expand_home_path(input: &str) -> PathBuf {
    if input == "~" {
        if let Some(home) = get_home() {
            return home;
        }
    } else if let Some(rest) = input.strip_prefix("~/")
        && let Some(home) = get_home()
    {
        return home.join(rest);
    }
    PathBuf::from(input)
}

/// Drops trailing separators, keeping a lone "/".
pub fn trim_trailing_slash(path: &Path) -> PathBuf {
    let bytes = path.as_os_str().as_bytes();
    let mut end = bytes.len();
    while end > 1 && bytes[end - 1] == b'/' {
        end -= 1;
    }
    PathBuf::from(OsStr::from_bytes(&bytes[..end]))
}

/// Resolves `input` against `root` the way the entry cache expects.
///
/// `~` is expanded, relative paths are joined onto `root`, and `.`/`..` are resolved by
/// canonicalizing the parent directory while keeping the final component as written, so a
/// symlink is addressed as itself rather than its target. A path ending in `.` or `..` is
/// canonicalized as a whole.
///
/// On failure the joined but unresolved path is returned in `Err` so callers can warn and
/// carry on with it.
pub fn normalize_path(root: &Path, input: &str) -> Result<PathBuf, PathBuf> {
    let expanded = expand_home_path(input);
    let joined = trim_trailing_slash(&if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    });

    let resolved = match (joined.parent(), joined.file_name()) {
        (Some(parent), Some(name)) => parent.canonicalize().map(|p| p.join(name)),
        _ => joined.canonicalize(),
    };
    resolved.map_err(|_| joined)
}

/// Util function to shorten home directory to ~.
/// Is used by the path line in the renderer.
pub fn shorten_home_path<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();
    if let Some(home_dir) = get_home()
        && let Ok(stripped) = path.strip_prefix(&home_dir)
    {
        if stripped.as_os_str().is_empty() {
            return "~".to_string();
        } else {
            let mut short = stripped.display().to_string();
            if short.starts_with(MAIN_SEPARATOR) {
                short.remove(0);
            }
            return format!("~{}{}", MAIN_SEPARATOR, short);
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::error;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_normalize_relative_and_dotdot() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().canonicalize()?;
        fs::create_dir(root.join("sub"))?;
        File::create(root.join("file.txt"))?;

        assert_eq!(normalize_path(&root, "file.txt"), Ok(root.join("file.txt")));
        assert_eq!(
            normalize_path(&root.join("sub"), "../file.txt"),
            Ok(root.join("file.txt"))
        );
        assert_eq!(normalize_path(&root.join("sub"), ".."), Ok(root.clone()));
        assert_eq!(normalize_path(&root, "sub/"), Ok(root.join("sub")));
        Ok(())
    }

    #[test]
    fn test_normalize_keeps_symlink_name() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().canonicalize()?;
        fs::create_dir(root.join("real"))?;
        std::os::unix::fs::symlink(root.join("real"), root.join("link"))?;

        assert_eq!(normalize_path(&root, "link"), Ok(root.join("link")));
        Ok(())
    }

    #[test]
    fn test_normalize_failure_returns_joined() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().canonicalize()?;

        let result = normalize_path(&root, "missing/deeper/file");
        assert_eq!(result, Err(root.join("missing/deeper/file")));
        Ok(())
    }

    #[test]
    fn test_trim_trailing_slash() {
        assert_eq!(trim_trailing_slash(Path::new("/")), PathBuf::from("/"));
        assert_eq!(trim_trailing_slash(Path::new("/a/b//")), PathBuf::from("/a/b"));
        assert_eq!(trim_trailing_slash(Path::new("a/.")), PathBuf::from("a/."));
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = get_home() {
            assert_eq!(expand_home_path("~"), home);
            assert_eq!(expand_home_path("~/docs"), home.join("docs"));
        }
        assert_eq!(expand_home_path("~other"), PathBuf::from("~other"));
        assert_eq!(expand_home_path("/abs"), PathBuf::from("/abs"));
    }
}
