//! Keystroke byte reader with sentinel values, concretized from
//! `original_source/clink/terminal/include/terminal/terminal_in.h`
//! (SPEC_FULL.md §4.8).
//!
//! Raw bytes are `0x00..=0xFF`; four reserved `u32` sentinels (`>=
//! 0x8000_0000`) carry out-of-band conditions the edit loop must react
//! to without treating them as insertable characters.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::collections::VecDeque;
use std::time::Duration;

pub const INPUT_NONE: u32 = 0x8000_0000;
pub const INPUT_TIMEOUT: u32 = 0x8000_0001;
pub const INPUT_ABORT: u32 = 0x8000_0002;
pub const INPUT_RESIZE: u32 = 0x8000_0003;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalInput {
    Byte(u8),
    None,
    Timeout,
    Abort,
    Resize,
}

impl TerminalInput {
    pub fn to_u32(self) -> u32 {
        match self {
            TerminalInput::Byte(b) => b as u32,
            TerminalInput::None => INPUT_NONE,
            TerminalInput::Timeout => INPUT_TIMEOUT,
            TerminalInput::Abort => INPUT_ABORT,
            TerminalInput::Resize => INPUT_RESIZE,
        }
    }

    pub fn from_u32(v: u32) -> Self {
        match v {
            0x00..=0xFF => TerminalInput::Byte(v as u8),
            INPUT_TIMEOUT => TerminalInput::Timeout,
            INPUT_ABORT => TerminalInput::Abort,
            INPUT_RESIZE => TerminalInput::Resize,
            _ => TerminalInput::None,
        }
    }
}

pub trait TerminalIn {
    /// Blocks for up to `timeout` waiting for the next input. The only
    /// blocking call in the whole runtime (spec §5 "Suspension points").
    fn read(&mut self, timeout: Duration) -> TerminalInput;
}

/// Translate a parsed key event back into the raw byte sequence a
/// terminal in cooked mode would have sent, so the binder's byte-chord
/// model still applies verbatim on top of `crossterm`'s portable event
/// parsing.
fn key_event_to_bytes(ev: &KeyEvent) -> Vec<u8> {
    match ev.code {
        KeyCode::Char(c) => {
            if ev.modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() {
                vec![(c.to_ascii_uppercase() as u8) & 0x1f]
            } else {
                let mut buf = [0u8; 4];
                c.encode_utf8(&mut buf).as_bytes().to_vec()
            }
        }
        KeyCode::Enter => vec![0x0d],
        KeyCode::Tab => vec![0x09],
        KeyCode::BackTab => vec![0x1b, b'[', b'Z'],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        _ => Vec::new(),
    }
}

/// `crossterm`-backed [`TerminalIn`]. Buffers the bytes produced by one
/// parsed key event so a multi-byte UTF-8 character or an escape
/// sequence is delivered one byte per `read` call, matching a real
/// terminal's byte stream.
pub struct CrosstermTerminalIn {
    pending: VecDeque<u8>,
}

impl Default for CrosstermTerminalIn {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermTerminalIn {
    pub fn new() -> Self {
        Self { pending: VecDeque::new() }
    }
}

impl TerminalIn for CrosstermTerminalIn {
    fn read(&mut self, timeout: Duration) -> TerminalInput {
        if let Some(b) = self.pending.pop_front() {
            return TerminalInput::Byte(b);
        }
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(k)) if matches!(k.kind, KeyEventKind::Press | KeyEventKind::Repeat) => {
                    let bytes = key_event_to_bytes(&k);
                    if bytes.is_empty() {
                        return TerminalInput::None;
                    }
                    self.pending.extend(bytes);
                    TerminalInput::Byte(self.pending.pop_front().expect("just extended"))
                }
                Ok(Event::Resize(_, _)) => TerminalInput::Resize,
                Ok(_) => TerminalInput::None,
                Err(_) => TerminalInput::Abort,
            },
            Ok(false) => TerminalInput::Timeout,
            Err(_) => TerminalInput::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trips_through_u32_encoding() {
        let input = TerminalInput::Byte(0x41);
        assert_eq!(TerminalInput::from_u32(input.to_u32()), input);
    }

    #[test]
    fn sentinels_round_trip_through_u32_encoding() {
        for s in [TerminalInput::Timeout, TerminalInput::Abort, TerminalInput::Resize] {
            assert_eq!(TerminalInput::from_u32(s.to_u32()), s);
        }
    }

    #[test]
    fn sentinel_values_are_reserved_above_byte_range() {
        assert!(INPUT_NONE >= 0x8000_0000);
        assert!(INPUT_TIMEOUT >= 0x8000_0000);
        assert!(INPUT_ABORT >= 0x8000_0000);
        assert!(INPUT_RESIZE >= 0x8000_0000);
    }

    #[test]
    fn key_event_maps_ctrl_letter_to_control_byte() {
        let ev = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_event_to_bytes(&ev), vec![0x03]);
    }

    #[test]
    fn key_event_maps_plain_char_to_utf8_bytes() {
        let ev = KeyEvent::new(KeyCode::Char('é'), KeyModifiers::NONE);
        assert_eq!(key_event_to_bytes(&ev), "é".as_bytes().to_vec());
    }

    #[test]
    fn key_event_maps_enter_and_tab() {
        assert_eq!(
            key_event_to_bytes(&KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)),
            vec![0x0d]
        );
        assert_eq!(
            key_event_to_bytes(&KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE)),
            vec![0x09]
        );
    }
}
