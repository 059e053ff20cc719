//! The command interpreter.
//!
//! A command is `name` or `name:value`. The name (including the colon, when present) is
//! looked up in [COMMANDS]; `interleave` and `interleave:` are different entries. A command
//! that fails validation returns a recoverable error before touching the state.

use crate::app::nav::{Target, parse_motion, special_dir};
use crate::app::session::Session;
use crate::core::cache::EntryId;
use crate::core::formatter::valid_columns;
use crate::error::BrowserError;
use crate::ui::overlays::Overlay;

use phf::phf_map;
use std::path::Path;

type Handler = fn(&mut Session, &str) -> Result<(), BrowserError>;

static COMMANDS: phf::Map<&'static str, Handler> = phf_map! {
    "bind:" => bind as Handler,
    "cd:" => cd as Handler,
    "columns:" => columns as Handler,
    "deselect" => deselect_all as Handler,
    "deselect:" => deselect as Handler,
    "fg" => fg as Handler,
    "fg:" => fg as Handler,
    "glob:" => glob as Handler,
    "goto:" => goto as Handler,
    "help" => help as Handler,
    "interleave" => interleave as Handler,
    "interleave:" => interleave as Handler,
    "move:" => move_cursor as Handler,
    "quit" => quit as Handler,
    "refresh" => refresh as Handler,
    "scroll:" => scroll as Handler,
    "select" => select_all as Handler,
    "select:" => select as Handler,
    "sort:" => sort as Handler,
    "spread:" => spread as Handler,
    "suspend" => suspend as Handler,
    "toggle" => toggle_all as Handler,
    "toggle:" => toggle as Handler,
};

/// Names of every command, colon included where the command takes a value.
pub fn command_names() -> impl Iterator<Item = &'static str> {
    COMMANDS.keys().copied()
}

impl Session {
    pub(crate) fn apply(&mut self, command: &str) -> Result<(), BrowserError> {
        let (name, value) = match command.find(':') {
            Some(i) => (&command[..=i], &command[i + 1..]),
            None => (command, ""),
        };
        let handler = COMMANDS
            .get(name)
            .ok_or_else(|| BrowserError::UnknownCommand(command.to_string()))?;
        handler(self, value)
    }

    /// The entry a selection command addresses: the cursor entry for an empty value.
    fn addressed(&mut self, value: &str) -> Result<Option<EntryId>, BrowserError> {
        let state = &mut self.state;
        if value.is_empty() {
            return Ok(state.files.get(state.cursor).copied());
        }
        let lookup = state.cache.lookup_or_load(&state.path, value)?;
        if !lookup.normalized {
            if let Some(entry) = state.cache.get(lookup.id) {
                state
                    .notices
                    .push(BrowserError::PathNormalization(entry.path().to_path_buf()));
            }
        }
        Ok(Some(lookup.id))
    }

    fn select_with(
        &mut self,
        value: &str,
        apply: fn(&mut crate::app::state::BrowserState, EntryId),
    ) -> Result<(), BrowserError> {
        if let Some(id) = self.addressed(value)? {
            apply(&mut self.state, id);
            self.state.cache.release_if_unreferenced(id);
        }
        Ok(())
    }
}

/// Value as a `0`/`1` flag; empty means toggle.
fn flag(command: &str, value: &str, current: bool) -> Result<bool, BrowserError> {
    match value {
        "" => Ok(!current),
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(BrowserError::bad_argument(command, value, "expected 0 or 1")),
    }
}

fn bind(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    let Some((names, script)) = value.split_once(':') else {
        return Err(BrowserError::bad_argument("bind:", value, "expected keys:script"));
    };
    session
        .keymap
        .bind_names(names, script)
        .map_err(|name| BrowserError::bad_argument("bind:", name, "unknown key"))?;
    session.mark_dirty();
    Ok(())
}

fn cd(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    let state = &mut session.state;
    match value {
        "<" => state.populate(Target::Back),
        ">" => state.populate(Target::Forward),
        "" | "-" => match special_dir(state, value) {
            Some(dir) => state.populate(Target::Dir(&dir)),
            None => Err(BrowserError::bad_argument("cd:", value, "no such directory")),
        },
        path => state.populate(Target::Path(path)),
    }
}

fn columns(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    if !valid_columns(value) {
        return Err(BrowserError::bad_argument("columns:", value, "unknown or repeated column"));
    }
    session.state.columns = value.to_string();
    session.mark_dirty();
    Ok(())
}

fn deselect_all(session: &mut Session, _: &str) -> Result<(), BrowserError> {
    session.state.clear_selection();
    Ok(())
}

fn deselect(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    session.select_with(value, |state, id| state.set_selected(id, false))
}

fn fg(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    let n = if value.is_empty() {
        0
    } else {
        value
            .parse::<usize>()
            .map_err(|_| BrowserError::bad_argument("fg:", value, "expected a job number"))?
    };
    session.resume_job(n)
}

fn glob(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    if value.trim().is_empty() {
        return Err(BrowserError::bad_argument("glob:", value, "empty pattern"));
    }
    session.state.globs = value.to_string();
    session.state.populate(Target::Refresh)
}

fn goto(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    let state = &mut session.state;
    let lookup = state.cache.lookup_or_load(&state.path, value)?;
    let (index, path) = match state.cache.get(lookup.id) {
        Some(entry) => (entry.index(), entry.path().to_path_buf()),
        None => return Err(BrowserError::NotFound(value.into())),
    };
    if let Some(index) = index {
        state.set_cursor(index);
        state.dirty = true;
        return Ok(());
    }

    state.cache.release_if_unreferenced(lookup.id);
    let parent = path.parent().unwrap_or(Path::new("/")).to_path_buf();
    state.populate(Target::Dir(&parent))?;
    match state.position_of(&path) {
        Some(index) => {
            state.set_cursor(index);
            Ok(())
        }
        None => Err(BrowserError::NotFound(path)),
    }
}

fn help(session: &mut Session, _: &str) -> Result<(), BrowserError> {
    session.overlays.push(Overlay::Help);
    session.mark_dirty();
    Ok(())
}

fn interleave(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    let state = &mut session.state;
    state.interleave = flag("interleave:", value, state.interleave)?;
    state.resort();
    Ok(())
}

fn move_cursor(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    let state = &mut session.state;
    let target = parse_motion(value, state.cursor, state.screen_rows, state.files.len())
        .ok_or_else(|| BrowserError::bad_argument("move:", value, "expected N, +N, -N or N%"))?;
    state.set_cursor(target);
    state.dirty = true;
    Ok(())
}

fn quit(session: &mut Session, _: &str) -> Result<(), BrowserError> {
    session.state.quit = true;
    Ok(())
}

fn refresh(session: &mut Session, _: &str) -> Result<(), BrowserError> {
    session.state.populate(Target::Refresh)
}

fn scroll(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    let state = &mut session.state;
    let target = parse_motion(value, state.scroll, state.screen_rows, state.files.len())
        .ok_or_else(|| BrowserError::bad_argument("scroll:", value, "expected N, +N, -N or N%"))?;
    state.set_scroll(target);
    state.dirty = true;
    Ok(())
}

fn select_all(session: &mut Session, _: &str) -> Result<(), BrowserError> {
    session.state.select_all();
    Ok(())
}

fn select(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    session.select_with(value, |state, id| state.set_selected(id, true))
}

fn sort(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    let state = &mut session.state;
    let mut spec = state.sort.clone();
    spec.merge(value)
        .ok_or_else(|| BrowserError::bad_argument("sort:", value, "unknown or repeated key"))?;
    state.sort = spec;
    state.resort();
    Ok(())
}

fn spread(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    let state = &mut session.state;
    let target = parse_motion(value, state.cursor, state.screen_rows, state.files.len())
        .ok_or_else(|| BrowserError::bad_argument("spread:", value, "expected N, +N, -N or N%"))?;
    state.spread(target);
    state.dirty = true;
    Ok(())
}

fn suspend(session: &mut Session, _: &str) -> Result<(), BrowserError> {
    session.suspend()
}

fn toggle_all(session: &mut Session, _: &str) -> Result<(), BrowserError> {
    session.state.toggle_all();
    Ok(())
}

fn toggle(session: &mut Session, value: &str) -> Result<(), BrowserError> {
    session.select_with(value, |state, id| state.toggle_selected(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serial_test::serial;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn session_in(dir: &Path, names: &[&str]) -> Result<Session, Box<dyn std::error::Error>> {
        for name in names {
            File::create(dir.join(name))?;
        }
        Ok(Session::headless(&Config::default(), dir)?)
    }

    fn names(session: &Session) -> Vec<String> {
        let state = session.state();
        state
            .files()
            .iter()
            .map(|&id| state.entry(id).name_str().into_owned())
            .collect()
    }

    #[test]
    fn names_only_end_in_a_colon() {
        for name in command_names() {
            assert!(!name.trim_end_matches(':').contains(':'), "{name}");
        }
        assert!(COMMANDS.contains_key("interleave"));
        assert!(COMMANDS.contains_key("interleave:"));
    }

    #[test]
    #[serial]
    fn percent_motion_scales_by_screen_height() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let names: Vec<String> = (0..100).map(|i| format!("f{i:03}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut session = session_in(dir.path(), &refs)?;
        session.set_viewport(80, 23);
        assert_eq!(session.state().onscreen(), 20);

        session.execute("move:100%")?;
        assert_eq!(session.state().cursor(), 23);
        session.execute("move:-50%n")?;
        assert_eq!(session.state().cursor(), 0);
        Ok(())
    }

    #[test]
    #[serial]
    fn unknown_command_warns_without_changes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut session = session_in(dir.path(), &["a", "b"])?;
        session.execute("move:1")?;

        session.execute("frobnicate:3")?;
        session.execute("move")?;
        assert_eq!(session.state().cursor(), 1);
        assert_eq!(session.warnings().len(), 2);
        assert!(session.warnings()[0].contains("frobnicate:3"));
        Ok(())
    }

    #[test]
    #[serial]
    fn bad_values_are_rejected_before_mutation() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut session = session_in(dir.path(), &["a"])?;

        session.execute("sort:+q")?;
        session.execute("columns:nn")?;
        session.execute("interleave:2")?;
        session.execute("glob:")?;
        assert_eq!(session.state().sort().to_string(), "+n");
        assert_eq!(session.state().columns(), "*smpn");
        assert!(!session.state().interleave());
        assert_eq!(session.state().globs(), "*");
        assert_eq!(session.warnings().len(), 4);
        Ok(())
    }

    #[test]
    #[serial]
    fn flag_commands_toggle_or_set() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut session = session_in(dir.path(), &["a"])?;

        session.execute("interleave")?;
        assert!(session.state().interleave());
        session.execute("interleave:1")?;
        assert!(session.state().interleave());
        session.execute("interleave:0")?;
        assert!(!session.state().interleave());
        Ok(())
    }

    #[test]
    #[serial]
    fn sort_and_glob_change_the_listing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut session = session_in(dir.path(), &["a.txt", "b.rs", "c.txt"])?;

        session.execute("sort:-n")?;
        assert_eq!(names(&session), ["c.txt", "b.rs", "a.txt"]);
        session.execute("glob:*.txt")?;
        assert_eq!(names(&session), ["c.txt", "a.txt"]);
        assert!(session.warnings().is_empty());
        Ok(())
    }

    #[test]
    #[serial]
    fn spread_copies_the_anchor_selection() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut session = session_in(dir.path(), &["a", "b", "c", "d"])?;

        session.execute("select:")?;
        session.execute("spread:2")?;
        assert_eq!(session.state().nselected(), 3);
        assert_eq!(session.state().cursor(), 2);

        session.execute("deselect:")?;
        session.execute("spread:0")?;
        assert_eq!(session.state().nselected(), 0);
        Ok(())
    }

    #[test]
    #[serial]
    fn goto_enters_the_parent_directory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("sub"))?;
        File::create(dir.path().join("sub/x"))?;
        File::create(dir.path().join("sub/y"))?;
        let mut session = session_in(dir.path(), &[])?;

        session.execute("goto:sub/y")?;
        assert_eq!(session.state().path(), dir.path().join("sub").canonicalize()?);
        assert_eq!(names(&session)[session.state().cursor()], "y");

        session.execute("goto:missing")?;
        assert_eq!(session.warnings().len(), 1);
        Ok(())
    }

    #[test]
    #[serial]
    fn bind_replaces_and_rejects_unknown_keys() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut session = session_in(dir.path(), &["a"])?;
        let before = session.keymap().bindings().len();

        session.execute("bind:q:#Leave\n+quit")?;
        assert_eq!(session.keymap().bindings().len(), before);
        session.execute("bind:NoSuchKey:+quit")?;
        session.execute("bind:q")?;
        assert_eq!(session.warnings().len(), 2);
        Ok(())
    }

    #[test]
    #[serial]
    fn fg_without_jobs_warns() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut session = session_in(dir.path(), &[])?;
        session.execute("fg")?;
        session.execute("fg:x")?;
        assert_eq!(session.warnings().len(), 2);
        assert!(session.warnings()[0].contains("position 0"));
        Ok(())
    }
}
