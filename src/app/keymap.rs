//! Key bindings for sift.
//!
//! A [Keymap] is an ordered table of [Binding]s, each mapping one [Key] (a key or mouse
//! input plus modifiers) to a script. Rebinding a key replaces its binding in place, so the
//! help menu keeps the table order. Bindings sharing a description form one help entry.

use crate::config::Config;
use crate::config::input::DEFAULT_BINDINGS;
use crate::core::input::{MouseButton, MouseKind};

use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;

/// Characters that make a `+command` body go through the shell.
const SHELL_META: &str = "|&;$`'\"\\(){}[]*?!";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Input {
    Key(KeyCode),
    Mouse(MouseButton, MouseKind),
}

/// Key + modifiers as used in the binding table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key {
    pub input: Input,
    pub modifiers: KeyModifiers,
}

impl Key {
    pub fn new(input: Input, modifiers: KeyModifiers) -> Self {
        Key { input, modifiers }
    }
}

#[derive(Clone, Debug)]
pub struct Binding {
    key: Key,
    description: Option<String>,
    body: String,
}

impl Binding {
    #[inline]
    pub fn key(&self) -> Key {
        self.key
    }

    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The script without its description line.
    #[inline]
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn action(&self) -> Action<'_> {
        classify(&self.body)
    }
}

/// How a binding body runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action<'a> {
    /// `+command` without shell metacharacters: run directly.
    Command(&'a str),
    /// `+command` with metacharacters: the shell expands it and queues the result.
    Queued(&'a str),
    /// Anything else is a shell script.
    Shell(&'a str),
}

#[derive(Debug, Default)]
pub struct Keymap {
    bindings: Vec<Binding>,
    index: HashMap<Key, usize>,
}

impl Keymap {
    /// The built-in bindings with the user's bindings applied on top.
    pub fn from_config(config: &Config) -> Self {
        let mut keymap = Keymap::default();
        for (names, script) in DEFAULT_BINDINGS {
            for name in *names {
                if let Some(key) = parse_key(name) {
                    keymap.bind(key, script);
                }
            }
        }
        for binding in config.bindings() {
            for name in binding.keys() {
                match parse_key(name) {
                    Some(key) => keymap.bind(key, binding.script()),
                    None => eprintln!("Ignoring binding for unknown key {:?}", name),
                }
            }
        }
        keymap
    }

    /// Binds `key` to `script`, replacing an existing binding in place. An empty script
    /// removes the binding.
    pub fn bind(&mut self, key: Key, script: &str) {
        if script.trim().is_empty() {
            if let Some(i) = self.index.remove(&key) {
                self.bindings.remove(i);
                self.reindex();
            }
            return;
        }

        let (description, body) = split_description(script);
        let binding = Binding {
            key,
            description,
            body,
        };
        match self.index.get(&key) {
            Some(&i) => self.bindings[i] = binding,
            None => {
                self.index.insert(key, self.bindings.len());
                self.bindings.push(binding);
            }
        }
    }

    /// Binds every comma separated key name in `names`. Nothing is bound if any name is
    /// unknown; the offending name is returned.
    pub fn bind_names<'a>(&mut self, names: &'a str, script: &str) -> Result<(), &'a str> {
        let keys = names
            .split(',')
            .map(|name| parse_key(name.trim()).ok_or(name))
            .collect::<Result<Vec<_>, _>>()?;
        for key in keys {
            self.bind(key, script);
        }
        Ok(())
    }

    /// Looks up the binding for a key, ignoring Shift when there is no exact match.
    pub fn lookup(&self, key: Key) -> Option<&Binding> {
        if let Some(&i) = self.index.get(&key) {
            return Some(&self.bindings[i]);
        }
        if key.modifiers.contains(KeyModifiers::SHIFT) {
            let unshifted = Key::new(key.input, key.modifiers - KeyModifiers::SHIFT);
            return self.index.get(&unshifted).map(|&i| &self.bindings[i]);
        }
        None
    }

    #[inline]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// `(keys, description)` rows for the help menu, one per description in table order.
    pub fn help_entries(&self) -> Vec<(String, String)> {
        let mut rows: Vec<(String, String)> = Vec::new();
        for binding in &self.bindings {
            let description = binding
                .description()
                .map(str::to_string)
                .unwrap_or_else(|| binding.body().lines().next().unwrap_or_default().to_string());
            let name = key_name(binding.key);
            match rows.iter_mut().find(|(_, d)| *d == description) {
                Some((keys, _)) => {
                    keys.push_str(", ");
                    keys.push_str(&name);
                }
                None => rows.push((name, description)),
            }
        }
        rows
    }

    fn reindex(&mut self) {
        self.index = self
            .bindings
            .iter()
            .enumerate()
            .map(|(i, b)| (b.key, i))
            .collect();
    }
}

/// Splits an optional `#Description` first line off a script.
pub fn split_description(script: &str) -> (Option<String>, String) {
    match script.strip_prefix('#') {
        Some(rest) => match rest.split_once('\n') {
            Some((description, body)) => (Some(description.trim().to_string()), body.to_string()),
            None => (Some(rest.trim().to_string()), String::new()),
        },
        None => (None, script.to_string()),
    }
}

pub fn classify(body: &str) -> Action<'_> {
    let trimmed = body.trim();
    match trimmed.strip_prefix('+') {
        Some(rest) if rest.chars().any(|c| c.is_whitespace() || SHELL_META.contains(c)) => {
            Action::Queued(rest)
        }
        Some(rest) => Action::Command(rest),
        None => Action::Shell(body),
    }
}

/// Parses a key name such as `j`, `Ctrl-d`, `<c-x>`, `alt+Left`, `F5` or `MouseLeftDouble`.
pub fn parse_key(s: &str) -> Option<Key> {
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(Key::new(Input::Key(KeyCode::Char(c)), KeyModifiers::NONE));
    }

    let is_bracketed = s.len() > 2 && s.starts_with('<') && s.ends_with('>');
    let mut rest = if is_bracketed { &s[1..s.len() - 1] } else { s };

    let mut modifiers = KeyModifiers::NONE;
    while let Some(pos) = rest.find(['-', '+']) {
        if pos == 0 {
            break;
        }
        let modifier = match rest[..pos].to_ascii_lowercase().as_str() {
            "c" | "ctrl" | "control" => KeyModifiers::CONTROL,
            "a" | "m" | "alt" | "meta" => KeyModifiers::ALT,
            "s" | "shift" => KeyModifiers::SHIFT,
            _ => break,
        };
        modifiers |= modifier;
        rest = &rest[pos + 1..];
    }

    let input = parse_input(rest)?;
    Some(normalize(Key::new(input, modifiers)))
}

fn parse_input(name: &str) -> Option<Input> {
    use MouseButton as B;
    use MouseKind as K;

    let code = match name.to_ascii_lowercase().as_str() {
        "space" | "spc" => KeyCode::Char(' '),
        "comma" => KeyCode::Char(','),
        "colon" => KeyCode::Char(':'),
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "backtab" => KeyCode::BackTab,
        "backspace" | "back" | "bs" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "insert" | "ins" => KeyCode::Insert,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pgup" | "pageup" => KeyCode::PageUp,
        "pgdn" | "pagedown" => KeyCode::PageDown,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,

        "mouseleft" => return Some(Input::Mouse(B::Left, K::Press)),
        "mousemiddle" => return Some(Input::Mouse(B::Middle, K::Press)),
        "mouseright" => return Some(Input::Mouse(B::Right, K::Press)),
        "mouseleftrelease" => return Some(Input::Mouse(B::Left, K::Release)),
        "mouseleftdouble" => return Some(Input::Mouse(B::Left, K::DoubleClick)),
        "mouserightdouble" => return Some(Input::Mouse(B::Right, K::DoubleClick)),
        "mouseleftdrag" => return Some(Input::Mouse(B::Left, K::Drag)),
        "scrollup" => return Some(Input::Mouse(B::WheelUp, K::Press)),
        "scrolldown" => return Some(Input::Mouse(B::WheelDown, K::Press)),

        lower => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => {
                    let n: u8 = lower.strip_prefix('f')?.parse().ok()?;
                    if !(1..=12).contains(&n) {
                        return None;
                    }
                    KeyCode::F(n)
                }
            }
        }
    };
    Some(Input::Key(code))
}

/// Folds Shift into the key where the terminal does: `Shift-j` is `J`, `Shift-Tab` is
/// BackTab, and Ctrl letters are lowercase.
fn normalize(mut key: Key) -> Key {
    match &mut key.input {
        Input::Key(KeyCode::Char(c)) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                *c = c.to_ascii_lowercase();
            } else if key.modifiers.contains(KeyModifiers::SHIFT) {
                *c = c.to_ascii_uppercase();
                key.modifiers -= KeyModifiers::SHIFT;
            }
        }
        Input::Key(code @ KeyCode::Tab) if key.modifiers.contains(KeyModifiers::SHIFT) => {
            *code = KeyCode::BackTab;
            key.modifiers -= KeyModifiers::SHIFT;
        }
        _ => {}
    }
    key
}

/// Display name of a key, in the form [parse_key] accepts.
pub fn key_name(key: Key) -> String {
    let mut name = String::new();
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        name.push_str("Ctrl-");
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        name.push_str("Alt-");
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        name.push_str("Shift-");
    }

    let base: String = match key.input {
        Input::Key(code) => match code {
            KeyCode::Char(' ') => "Space".into(),
            KeyCode::Char(',') => "Comma".into(),
            KeyCode::Char(':') => "Colon".into(),
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "Enter".into(),
            KeyCode::Esc => "Esc".into(),
            KeyCode::Tab => "Tab".into(),
            KeyCode::BackTab => "BackTab".into(),
            KeyCode::Backspace => "Backspace".into(),
            KeyCode::Delete => "Delete".into(),
            KeyCode::Insert => "Insert".into(),
            KeyCode::Home => "Home".into(),
            KeyCode::End => "End".into(),
            KeyCode::PageUp => "PgUp".into(),
            KeyCode::PageDown => "PgDn".into(),
            KeyCode::Up => "Up".into(),
            KeyCode::Down => "Down".into(),
            KeyCode::Left => "Left".into(),
            KeyCode::Right => "Right".into(),
            KeyCode::F(n) => format!("F{n}"),
            other => format!("{other:?}"),
        },
        Input::Mouse(button, kind) => {
            let button = match button {
                MouseButton::Left => "MouseLeft",
                MouseButton::Middle => "MouseMiddle",
                MouseButton::Right => "MouseRight",
                MouseButton::WheelUp => "ScrollUp",
                MouseButton::WheelDown => "ScrollDown",
            };
            let kind = match kind {
                MouseKind::Press => "",
                MouseKind::Release => "Release",
                MouseKind::Drag => "Drag",
                MouseKind::DoubleClick => "Double",
            };
            format!("{button}{kind}")
        }
    };
    name.push_str(&base);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Key {
        Key::new(Input::Key(code), modifiers)
    }

    #[test]
    fn key_name_forms() {
        let ctrl_d = key(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(parse_key("Ctrl-d"), Some(ctrl_d));
        assert_eq!(parse_key("<c-d>"), Some(ctrl_d));
        assert_eq!(parse_key("ctrl+D"), Some(ctrl_d));
        assert_eq!(parse_key("Shift-j"), Some(key(KeyCode::Char('J'), KeyModifiers::NONE)));
        assert_eq!(parse_key("Shift-Tab"), Some(key(KeyCode::BackTab, KeyModifiers::NONE)));
        assert_eq!(parse_key("-"), Some(key(KeyCode::Char('-'), KeyModifiers::NONE)));
        assert_eq!(parse_key("Alt--"), Some(key(KeyCode::Char('-'), KeyModifiers::ALT)));
        assert_eq!(parse_key("Comma"), Some(key(KeyCode::Char(','), KeyModifiers::NONE)));
        assert_eq!(parse_key("F12"), Some(key(KeyCode::F(12), KeyModifiers::NONE)));
        assert_eq!(
            parse_key("MouseLeftDouble"),
            Some(Key::new(
                Input::Mouse(MouseButton::Left, MouseKind::DoubleClick),
                KeyModifiers::NONE
            ))
        );
        assert_eq!(parse_key("F13"), None);
        assert_eq!(parse_key("Hyper-x"), None);
        assert_eq!(parse_key("Ctrl-"), None);
    }

    #[test]
    fn names_round_trip_through_the_parser() {
        for name in ["Alt-Left", "Ctrl-z", "Space", "PgDn", "ScrollUp", "MouseLeftDrag", "G"] {
            let key = parse_key(name).map(key_name);
            assert_eq!(key.as_deref(), Some(name));
        }
    }

    #[test]
    fn rebinding_replaces_in_place() {
        let mut keymap = Keymap::default();
        keymap.bind_names("a", "#First\n+quit").ok();
        keymap.bind_names("b", "#Second\n+refresh").ok();
        keymap.bind_names("a", "#Third\n+help").ok();

        let descriptions: Vec<_> = keymap.bindings().iter().filter_map(Binding::description).collect();
        assert_eq!(descriptions, vec!["Third", "Second"]);

        assert_eq!(keymap.bind_names("c,Bogus", "+quit"), Err("Bogus"));
        assert!(keymap.lookup(key(KeyCode::Char('c'), KeyModifiers::NONE)).is_none());

        keymap.bind_names("a", "").ok();
        assert_eq!(keymap.bindings().len(), 1);
        assert!(keymap.lookup(key(KeyCode::Char('b'), KeyModifiers::NONE)).is_some());
    }

    #[test]
    fn help_groups_by_description() {
        let mut keymap = Keymap::default();
        keymap.bind_names("j,Down", "#Move down\n+move:+1").ok();
        keymap.bind_names("q", "+quit").ok();
        assert_eq!(
            keymap.help_entries(),
            vec![
                ("j, Down".to_string(), "Move down".to_string()),
                ("q".to_string(), "+quit".to_string()),
            ]
        );
    }

    #[test]
    fn shift_falls_back_to_plain_binding() {
        let mut keymap = Keymap::default();
        keymap.bind_names("MouseLeft", "+quit").ok();
        let shifted = Key::new(
            Input::Mouse(MouseButton::Left, MouseKind::Press),
            KeyModifiers::SHIFT,
        );
        assert!(keymap.lookup(shifted).is_some());
    }

    #[test]
    fn bodies_are_classified() {
        assert_eq!(classify("+cd:.."), Action::Command("cd:.."));
        assert_eq!(classify("+cd:~"), Action::Command("cd:~"));
        assert_eq!(classify("+cd:<"), Action::Command("cd:<"));
        assert_eq!(classify("+glob:.* *"), Action::Queued("glob:.* *"));
        assert_eq!(classify("+cd:$HOME"), Action::Queued("cd:$HOME"));
        assert_eq!(classify("ls -l"), Action::Shell("ls -l"));
        assert_eq!(
            split_description("#Parent\n+cd:.."),
            (Some("Parent".to_string()), "+cd:..".to_string())
        );
        assert_eq!(split_description("+quit"), (None, "+quit".to_string()));
    }

    #[test]
    fn defaults_all_parse() {
        let keymap = Keymap::from_config(&Config::default());
        let total: usize = DEFAULT_BINDINGS.iter().map(|(keys, _)| keys.len()).sum();
        assert_eq!(keymap.bindings().len(), total);
    }
}
