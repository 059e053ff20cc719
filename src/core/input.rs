//! Terminal input decoding.
//!
//! [Decoder] turns the raw byte stream of a terminal in raw mode into [InputEvent]s, one byte
//! at a time. It understands plain and UTF-8 characters, control characters, Alt via an `ESC`
//! prefix, CSI and SS3 sequences for navigation and function keys, and SGR mouse reports
//! (`CSI < b ; x ; y M|m`). DCS/OSC/PM/APC strings are swallowed.
//!
//! A lone `ESC` is ambiguous until more input arrives, so callers feed whatever is available
//! and call [Decoder::flush] once the input has gone idle.
//!
//! [ClickTracker] is kept separate: it turns two releases of the same mouse button within
//! [DOUBLE_CLICK_WINDOW] into a double click.

use crossterm::event::{KeyCode, KeyModifiers};
use std::time::{Duration, Instant};

/// Two same-button releases closer than this form a double click.
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(200);

const MAX_PARAMS: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MouseKind {
    Press,
    Release,
    Drag,
    DoubleClick,
}

/// A mouse report with 0-based screen coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MouseEvent {
    pub button: MouseButton,
    pub kind: MouseKind,
    pub column: u16,
    pub row: u16,
    pub modifiers: KeyModifiers,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Key {
        code: KeyCode,
        modifiers: KeyModifiers,
    },
    Mouse(MouseEvent),
}

impl InputEvent {
    fn key(code: KeyCode) -> Self {
        InputEvent::Key {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn ctrl(c: char) -> Self {
        InputEvent::Key {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::CONTROL,
        }
    }

    fn with_alt(self) -> Self {
        match self {
            InputEvent::Key { code, modifiers } => InputEvent::Key {
                code,
                modifiers: modifiers | KeyModifiers::ALT,
            },
            other => other,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    CsiParam,
    CsiIntermediate,
    Ss3,
    Dcs,
    DcsEscape,
    Utf8 { need: usize },
}

/// Byte-at-a-time decoder for ANSI/xterm input.
#[derive(Debug)]
pub struct Decoder {
    state: State,
    params: Vec<u8>,
    utf8: Vec<u8>,
    alt: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Decoder {
            state: State::Ground,
            params: Vec::with_capacity(MAX_PARAMS),
            utf8: Vec::with_capacity(4),
            alt: false,
        }
    }

    /// True while a sequence has been started but not finished.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.state != State::Ground
    }

    /// Consumes one byte, returning an event once a sequence is complete.
    pub fn feed(&mut self, byte: u8) -> Option<InputEvent> {
        match self.state {
            State::Ground => self.ground(byte),
            State::Escape => self.escape(byte),
            State::CsiParam => match byte {
                b'0'..=b'9' | b';' | b':' | b'<' | b'=' | b'>' | b'?' => {
                    if self.params.len() < MAX_PARAMS {
                        self.params.push(byte);
                    }
                    None
                }
                0x20..=0x2f => {
                    self.state = State::CsiIntermediate;
                    None
                }
                0x40..=0x7e => {
                    self.state = State::Ground;
                    self.dispatch_csi(byte)
                }
                0x1b => {
                    self.state = State::Escape;
                    None
                }
                _ => {
                    self.state = State::Ground;
                    None
                }
            },
            State::CsiIntermediate => {
                match byte {
                    0x20..=0x2f => {}
                    0x1b => self.state = State::Escape,
                    _ => self.state = State::Ground,
                }
                None
            }
            State::Ss3 => {
                self.state = State::Ground;
                let code = match byte {
                    b'A' => KeyCode::Up,
                    b'B' => KeyCode::Down,
                    b'C' => KeyCode::Right,
                    b'D' => KeyCode::Left,
                    b'H' => KeyCode::Home,
                    b'F' => KeyCode::End,
                    b'M' => KeyCode::Enter,
                    b'P'..=b'S' => KeyCode::F(byte - b'P' + 1),
                    _ => return None,
                };
                Some(InputEvent::key(code))
            }
            State::Dcs => {
                match byte {
                    0x07 => self.state = State::Ground,
                    0x1b => self.state = State::DcsEscape,
                    _ => {}
                }
                None
            }
            State::DcsEscape => {
                self.state = if byte == b'\\' {
                    State::Ground
                } else {
                    State::Dcs
                };
                None
            }
            State::Utf8 { need } => self.utf8_continue(byte, need),
        }
    }

    /// Resolves a sequence cut short by idle input. A lone `ESC` becomes the Esc key.
    pub fn flush(&mut self) -> Option<InputEvent> {
        let state = std::mem::replace(&mut self.state, State::Ground);
        self.alt = false;
        match state {
            State::Escape => Some(InputEvent::key(KeyCode::Esc)),
            State::CsiParam if self.params.is_empty() => {
                Some(InputEvent::key(KeyCode::Char('[')).with_alt())
            }
            State::Ss3 => Some(InputEvent::key(KeyCode::Char('O')).with_alt()),
            _ => None,
        }
    }

    fn ground(&mut self, byte: u8) -> Option<InputEvent> {
        let event = match byte {
            0x1b => {
                self.state = State::Escape;
                return None;
            }
            b'\r' => InputEvent::key(KeyCode::Enter),
            b'\t' => InputEvent::key(KeyCode::Tab),
            0x7f => InputEvent::key(KeyCode::Backspace),
            0x00 => InputEvent::ctrl(' '),
            0x01..=0x1a => InputEvent::ctrl((b'a' + byte - 1) as char),
            0x1c..=0x1f => InputEvent::ctrl((byte + 0x40) as char),
            0x20..=0x7e => InputEvent::key(KeyCode::Char(byte as char)),
            0xc0..=0xdf => return self.utf8_start(byte, 1),
            0xe0..=0xef => return self.utf8_start(byte, 2),
            0xf0..=0xf7 => return self.utf8_start(byte, 3),
            _ => return None,
        };
        Some(event)
    }

    fn escape(&mut self, byte: u8) -> Option<InputEvent> {
        self.state = State::Ground;
        match byte {
            b'[' => {
                self.params.clear();
                self.state = State::CsiParam;
                None
            }
            b'O' => {
                self.state = State::Ss3;
                None
            }
            b'P' | b']' | b'X' | b'^' | b'_' => {
                self.state = State::Dcs;
                None
            }
            0x1b => {
                self.state = State::Escape;
                Some(InputEvent::key(KeyCode::Esc))
            }
            _ => {
                self.alt = true;
                let event = self.ground(byte);
                if self.state == State::Ground {
                    self.alt = false;
                }
                event.map(InputEvent::with_alt)
            }
        }
    }

    fn utf8_start(&mut self, byte: u8, need: usize) -> Option<InputEvent> {
        self.utf8.clear();
        self.utf8.push(byte);
        self.state = State::Utf8 { need };
        None
    }

    fn utf8_continue(&mut self, byte: u8, need: usize) -> Option<InputEvent> {
        if byte & 0xc0 != 0x80 {
            self.state = State::Ground;
            self.alt = false;
            return self.ground(byte);
        }
        self.utf8.push(byte);
        if need > 1 {
            self.state = State::Utf8 { need: need - 1 };
            return None;
        }

        self.state = State::Ground;
        let alt = std::mem::take(&mut self.alt);
        let c = std::str::from_utf8(&self.utf8).ok()?.chars().next()?;
        let event = InputEvent::key(KeyCode::Char(c));
        Some(if alt { event.with_alt() } else { event })
    }

    fn dispatch_csi(&mut self, final_byte: u8) -> Option<InputEvent> {
        if let Some(rest) = self.params.strip_prefix(b"<") {
            return decode_sgr_mouse(rest, final_byte).map(InputEvent::Mouse);
        }

        let numbers = parse_params(&self.params);
        let first = numbers.first().copied().flatten();
        let modifiers = numbers
            .get(1)
            .copied()
            .flatten()
            .map_or(KeyModifiers::NONE, decode_modifiers);

        let code = match final_byte {
            b'A' => KeyCode::Up,
            b'B' => KeyCode::Down,
            b'C' => KeyCode::Right,
            b'D' => KeyCode::Left,
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            b'Z' => KeyCode::BackTab,
            b'P'..=b'S' => KeyCode::F(final_byte - b'P' + 1),
            b'~' => match first? {
                1 | 7 => KeyCode::Home,
                2 => KeyCode::Insert,
                3 => KeyCode::Delete,
                4 | 8 => KeyCode::End,
                5 => KeyCode::PageUp,
                6 => KeyCode::PageDown,
                n @ 11..=15 => KeyCode::F((n - 10) as u8),
                n @ 17..=21 => KeyCode::F((n - 11) as u8),
                n @ 23..=24 => KeyCode::F((n - 12) as u8),
                _ => return None,
            },
            _ => return None,
        };
        Some(InputEvent::Key { code, modifiers })
    }
}

/// Splits `1;5` into numbers; empty fields are `None`.
fn parse_params(params: &[u8]) -> Vec<Option<u32>> {
    params
        .split(|&b| b == b';')
        .map(|field| {
            std::str::from_utf8(field)
                .ok()
                .filter(|s| !s.is_empty())
                .and_then(|s| s.parse().ok())
        })
        .collect()
}

/// xterm modifier parameter: value - 1 is a bitmask of shift(1), alt(2), ctrl(4), meta(8).
fn decode_modifiers(param: u32) -> KeyModifiers {
    let bits = param.saturating_sub(1);
    let mut modifiers = KeyModifiers::NONE;
    if bits & 1 != 0 {
        modifiers |= KeyModifiers::SHIFT;
    }
    if bits & 2 != 0 || bits & 8 != 0 {
        modifiers |= KeyModifiers::ALT;
    }
    if bits & 4 != 0 {
        modifiers |= KeyModifiers::CONTROL;
    }
    modifiers
}

fn decode_sgr_mouse(params: &[u8], final_byte: u8) -> Option<MouseEvent> {
    if final_byte != b'M' && final_byte != b'm' {
        return None;
    }
    let numbers = parse_params(params);
    let [Some(code), Some(x), Some(y)] = numbers.as_slice() else {
        return None;
    };
    let (code, x, y) = (*code, *x, *y);

    let mut modifiers = KeyModifiers::NONE;
    if code & 4 != 0 {
        modifiers |= KeyModifiers::SHIFT;
    }
    if code & 8 != 0 {
        modifiers |= KeyModifiers::ALT;
    }
    if code & 16 != 0 {
        modifiers |= KeyModifiers::CONTROL;
    }
    let motion = code & 32 != 0;

    let button = if code & 64 != 0 {
        match code & 3 {
            0 => MouseButton::WheelUp,
            1 => MouseButton::WheelDown,
            _ => return None,
        }
    } else {
        match code & 3 {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            // Motion with no button held.
            _ => return None,
        }
    };

    let kind = if motion {
        MouseKind::Drag
    } else if final_byte == b'm' {
        MouseKind::Release
    } else {
        MouseKind::Press
    };

    Some(MouseEvent {
        button,
        kind,
        column: x.saturating_sub(1).min(u16::MAX as u32) as u16,
        row: y.saturating_sub(1).min(u16::MAX as u32) as u16,
        modifiers,
    })
}

/// Coalesces quick same-button releases into double clicks.
#[derive(Debug, Default)]
pub struct ClickTracker {
    last_release: Option<(MouseButton, Instant)>,
}

impl ClickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the event, upgraded to [MouseKind::DoubleClick] when it completes one.
    pub fn observe(&mut self, event: MouseEvent, now: Instant) -> MouseEvent {
        if event.kind != MouseKind::Release {
            return event;
        }
        match self.last_release.take() {
            Some((button, at))
                if button == event.button
                    && now.saturating_duration_since(at) < DOUBLE_CLICK_WINDOW =>
            {
                MouseEvent {
                    kind: MouseKind::DoubleClick,
                    ..event
                }
            }
            _ => {
                self.last_release = Some((event.button, now));
                event
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<InputEvent> {
        let mut decoder = Decoder::new();
        let mut out: Vec<InputEvent> = bytes.iter().filter_map(|&b| decoder.feed(b)).collect();
        out.extend(decoder.flush());
        out
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> InputEvent {
        InputEvent::Key { code, modifiers }
    }

    #[test]
    fn plain_and_control_bytes() {
        assert_eq!(
            decode_all(b"a\r\x01\x7f\t"),
            vec![
                key(KeyCode::Char('a'), KeyModifiers::NONE),
                key(KeyCode::Enter, KeyModifiers::NONE),
                key(KeyCode::Char('a'), KeyModifiers::CONTROL),
                key(KeyCode::Backspace, KeyModifiers::NONE),
                key(KeyCode::Tab, KeyModifiers::NONE),
            ]
        );
    }

    #[test]
    fn utf8_is_accumulated() {
        assert_eq!(
            decode_all("é🦀".as_bytes()),
            vec![
                key(KeyCode::Char('é'), KeyModifiers::NONE),
                key(KeyCode::Char('🦀'), KeyModifiers::NONE),
            ]
        );
    }

    #[test]
    fn lone_escape_and_alt_prefix() {
        assert_eq!(decode_all(b"\x1b"), vec![key(KeyCode::Esc, KeyModifiers::NONE)]);
        assert_eq!(
            decode_all(b"\x1bx"),
            vec![key(KeyCode::Char('x'), KeyModifiers::ALT)]
        );
    }

    #[test]
    fn csi_and_ss3_keys() {
        assert_eq!(
            decode_all(b"\x1b[A\x1bOB\x1b[5~\x1b[15~\x1b[24~\x1bOP"),
            vec![
                key(KeyCode::Up, KeyModifiers::NONE),
                key(KeyCode::Down, KeyModifiers::NONE),
                key(KeyCode::PageUp, KeyModifiers::NONE),
                key(KeyCode::F(5), KeyModifiers::NONE),
                key(KeyCode::F(12), KeyModifiers::NONE),
                key(KeyCode::F(1), KeyModifiers::NONE),
            ]
        );
    }

    #[test]
    fn csi_modifier_parameter() {
        assert_eq!(
            decode_all(b"\x1b[1;5C\x1b[1;2A\x1b[3;3~"),
            vec![
                key(KeyCode::Right, KeyModifiers::CONTROL),
                key(KeyCode::Up, KeyModifiers::SHIFT),
                key(KeyCode::Delete, KeyModifiers::ALT),
            ]
        );
    }

    #[test]
    fn sgr_mouse_reports() {
        let events = decode_all(b"\x1b[<0;10;5M\x1b[<0;10;5m\x1b[<65;1;1M\x1b[<18;3;4M\x1b[<35;7;7M");
        assert_eq!(
            events,
            vec![
                InputEvent::Mouse(MouseEvent {
                    button: MouseButton::Left,
                    kind: MouseKind::Press,
                    column: 9,
                    row: 4,
                    modifiers: KeyModifiers::NONE,
                }),
                InputEvent::Mouse(MouseEvent {
                    button: MouseButton::Left,
                    kind: MouseKind::Release,
                    column: 9,
                    row: 4,
                    modifiers: KeyModifiers::NONE,
                }),
                InputEvent::Mouse(MouseEvent {
                    button: MouseButton::WheelDown,
                    kind: MouseKind::Press,
                    column: 0,
                    row: 0,
                    modifiers: KeyModifiers::NONE,
                }),
                InputEvent::Mouse(MouseEvent {
                    button: MouseButton::Right,
                    kind: MouseKind::Press,
                    column: 2,
                    row: 3,
                    modifiers: KeyModifiers::CONTROL,
                }),
            ],
            "hover motion without a button must be dropped"
        );
    }

    #[test]
    fn string_sequences_are_swallowed() {
        assert_eq!(
            decode_all(b"\x1b]0;title\x07q\x1bPdata\x1b\\w"),
            vec![
                key(KeyCode::Char('q'), KeyModifiers::NONE),
                key(KeyCode::Char('w'), KeyModifiers::NONE),
            ]
        );
    }

    #[test]
    fn unknown_sequences_do_not_leak() {
        assert_eq!(
            decode_all(b"\x1b[?1;2cz\x1b[200$xy"),
            vec![
                key(KeyCode::Char('z'), KeyModifiers::NONE),
                key(KeyCode::Char('y'), KeyModifiers::NONE),
            ]
        );
    }

    #[test]
    fn double_click_window() {
        let release = MouseEvent {
            button: MouseButton::Left,
            kind: MouseKind::Release,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        };
        let start = Instant::now();
        let mut clicks = ClickTracker::new();

        assert_eq!(clicks.observe(release, start).kind, MouseKind::Release);
        let second = clicks.observe(release, start + Duration::from_millis(150));
        assert_eq!(second.kind, MouseKind::DoubleClick);

        // A third quick release starts a new pair.
        let third = clicks.observe(release, start + Duration::from_millis(250));
        assert_eq!(third.kind, MouseKind::Release);
        let late = clicks.observe(release, start + Duration::from_millis(500));
        assert_eq!(late.kind, MouseKind::Release);

        let right = MouseEvent {
            button: MouseButton::Right,
            ..release
        };
        assert_eq!(
            clicks.observe(right, start + Duration::from_millis(520)).kind,
            MouseKind::Release
        );
    }
}
