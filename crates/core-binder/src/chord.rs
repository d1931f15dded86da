//! Chord syntax: parses `binder.bind`'s textual chord form into raw bytes.
//!
//! Grammar (spec §6): bytes are literal except `^X` (Ctrl-X, `X & 0x1f`),
//! `\e`/`\x1b` (ESC), `\t`/`\r`/`\n`/`\\`, and the general `\xHH` hex escape
//! (an extension grounded in the same convention, since `\x1b` is just its
//! single documented instance).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChordError {
    #[error("chord must not be empty")]
    EmptyChord,
    #[error("unknown escape sequence '\\{0}'")]
    UnknownEscape(char),
    #[error("truncated escape sequence at end of chord")]
    TruncatedEscape,
}

/// Parse a textual chord into the raw byte sequence the binder stores.
pub fn parse(chord: &str) -> Result<Vec<u8>, ChordError> {
    let bytes = chord.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'^' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_alphabetic() {
            out.push(bytes[i + 1].to_ascii_uppercase() & 0x1f);
            i += 2;
            continue;
        }
        if b == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'e' => {
                    out.push(0x1b);
                    i += 2;
                }
                b't' => {
                    out.push(0x09);
                    i += 2;
                }
                b'r' => {
                    out.push(0x0d);
                    i += 2;
                }
                b'n' => {
                    out.push(0x0a);
                    i += 2;
                }
                b'\\' => {
                    out.push(0x5c);
                    i += 2;
                }
                b'x' => {
                    if i + 3 < bytes.len() {
                        let hex = std::str::from_utf8(&bytes[i + 2..i + 4])
                            .ok()
                            .and_then(|h| u8::from_str_radix(h, 16).ok());
                        match hex {
                            Some(v) => {
                                out.push(v);
                                i += 4;
                            }
                            None => return Err(ChordError::TruncatedEscape),
                        }
                    } else {
                        return Err(ChordError::TruncatedEscape);
                    }
                }
                other => return Err(ChordError::UnknownEscape(other as char)),
            }
            continue;
        }
        out.push(b);
        i += 1;
    }

    if out.is_empty() {
        return Err(ChordError::EmptyChord);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_bytes_pass_through() {
        assert_eq!(parse("ab").unwrap(), vec![b'a', b'b']);
    }

    #[test]
    fn ctrl_escape() {
        assert_eq!(parse("^C").unwrap(), vec![0x03]);
        assert_eq!(parse("^c").unwrap(), vec![0x03]);
    }

    #[test]
    fn esc_aliases() {
        assert_eq!(parse("\\e").unwrap(), vec![0x1b]);
        assert_eq!(parse("\\x1b").unwrap(), vec![0x1b]);
    }

    #[test]
    fn whitespace_escapes() {
        assert_eq!(parse("\\t").unwrap(), vec![0x09]);
        assert_eq!(parse("\\r").unwrap(), vec![0x0d]);
        assert_eq!(parse("\\n").unwrap(), vec![0x0a]);
        assert_eq!(parse("\\\\").unwrap(), vec![0x5c]);
    }

    #[test]
    fn multi_byte_chord() {
        // Alt-b is commonly encoded as ESC followed by 'b'.
        assert_eq!(parse("\\eb").unwrap(), vec![0x1b, b'b']);
    }

    #[test]
    fn empty_chord_rejected() {
        assert_eq!(parse(""), Err(ChordError::EmptyChord));
    }

    #[test]
    fn unknown_escape_rejected() {
        assert_eq!(parse("\\q"), Err(ChordError::UnknownEscape('q')));
    }

    #[test]
    fn truncated_hex_escape_rejected() {
        assert_eq!(parse("\\x1"), Err(ChordError::TruncatedEscape));
    }
}
