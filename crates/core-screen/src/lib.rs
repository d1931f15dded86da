//! Character-cell screen buffer: cursor motion, region clears, insert/
//! delete chars, and attribute-run-aware writes.
//!
//! This is the Rust-idiomatic analogue of the original's `screen_buffer.h`
//! virtual interface (SPEC_FULL.md §4.8): a trait so the editor core can
//! be tested against a recording fake, implemented here by a
//! crossterm-backed struct the way `core-terminal::CrosstermBackend`
//! implements `TerminalBackend`.

use anyhow::Result;
use core_attrs::{Attributes, Colour};
use crossterm::{
    cursor, queue,
    style::{self, Attribute as CAttribute, Color as CColor},
    terminal,
};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearType {
    All,
    FromCursor,
    ToCursor,
}

pub trait ScreenBuffer {
    fn begin(&mut self) -> Result<()>;
    fn end(&mut self) -> Result<()>;
    fn columns(&self) -> u16;
    fn rows(&self) -> u16;
    fn write(&mut self, text: &str) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn clear(&mut self, ty: ClearType) -> Result<()>;
    fn clear_line(&mut self, ty: ClearType) -> Result<()>;
    fn set_cursor(&mut self, col: u16, row: u16) -> Result<()>;
    fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<()>;
    fn insert_chars(&mut self, n: u16) -> Result<()>;
    fn delete_chars(&mut self, n: u16) -> Result<()>;
    fn set_attributes(&mut self, attrs: Attributes) -> Result<()>;
}

fn colour_to_crossterm(c: Colour) -> CColor {
    match c {
        Colour::Palette(p) => CColor::AnsiValue(p),
        Colour::Rgb(r, g, b) => {
            let [r, g, b] = Colour::Rgb(r, g, b).as_888().unwrap_or([255, 255, 255]);
            CColor::Rgb { r, g, b }
        }
    }
}

/// `crossterm`-backed screen buffer writing a buffered byte stream to
/// stdout, the same `queue!`-then-`flush` discipline the teacher's
/// terminal backend uses.
pub struct CrosstermScreen<W: Write> {
    out: W,
    current: Attributes,
}

impl CrosstermScreen<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> CrosstermScreen<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            current: Attributes::new(),
        }
    }

    /// Write `text` after applying only the attribute fields that differ
    /// from the last-applied state, an attribute *run* rather than a
    /// full re-emission per write.
    pub fn write_run(&mut self, text: &str, attrs: Attributes) -> Result<()> {
        let delta = Attributes::diff(self.current, attrs);
        self.apply_delta(delta)?;
        self.current = Attributes::merge(self.current, attrs);
        write!(self.out, "{text}")?;
        Ok(())
    }

    fn apply_delta(&mut self, delta: Attributes) -> Result<()> {
        let fg = delta.get_fg();
        if fg.present {
            queue!(self.out, style::SetForegroundColor(colour_to_crossterm(fg.value)))?;
        }
        let bg = delta.get_bg();
        if bg.present {
            queue!(self.out, style::SetBackgroundColor(colour_to_crossterm(bg.value)))?;
        }
        let bold = delta.get_bold();
        if bold.present {
            let attr = if bold.value { CAttribute::Bold } else { CAttribute::NormalIntensity };
            queue!(self.out, style::SetAttribute(attr))?;
        }
        let underline = delta.get_underline();
        if underline.present {
            let attr = if underline.value { CAttribute::Underlined } else { CAttribute::NoUnderline };
            queue!(self.out, style::SetAttribute(attr))?;
        }
        Ok(())
    }
}

impl<W: Write> ScreenBuffer for CrosstermScreen<W> {
    fn begin(&mut self) -> Result<()> {
        queue!(self.out, cursor::Hide)?;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        queue!(self.out, style::ResetColor, cursor::Show)?;
        self.current = Attributes::new();
        self.flush()
    }

    fn columns(&self) -> u16 {
        terminal::size().map(|(c, _)| c).unwrap_or(80)
    }

    fn rows(&self) -> u16 {
        terminal::size().map(|(_, r)| r).unwrap_or(24)
    }

    fn write(&mut self, text: &str) -> Result<()> {
        write!(self.out, "{text}")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn clear(&mut self, ty: ClearType) -> Result<()> {
        let kind = match ty {
            ClearType::All => terminal::ClearType::All,
            ClearType::FromCursor => terminal::ClearType::FromCursorDown,
            ClearType::ToCursor => terminal::ClearType::FromCursorUp,
        };
        queue!(self.out, terminal::Clear(kind))?;
        Ok(())
    }

    fn clear_line(&mut self, ty: ClearType) -> Result<()> {
        let kind = match ty {
            ClearType::All => terminal::ClearType::CurrentLine,
            ClearType::FromCursor => terminal::ClearType::UntilNewLine,
            ClearType::ToCursor => terminal::ClearType::UntilNewLine,
        };
        queue!(self.out, terminal::Clear(kind))?;
        Ok(())
    }

    fn set_cursor(&mut self, col: u16, row: u16) -> Result<()> {
        queue!(self.out, cursor::MoveTo(col, row))?;
        Ok(())
    }

    fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<()> {
        if dx > 0 {
            queue!(self.out, cursor::MoveRight(dx as u16))?;
        } else if dx < 0 {
            queue!(self.out, cursor::MoveLeft((-dx) as u16))?;
        }
        if dy > 0 {
            queue!(self.out, cursor::MoveDown(dy as u16))?;
        } else if dy < 0 {
            queue!(self.out, cursor::MoveUp((-dy) as u16))?;
        }
        Ok(())
    }

    fn insert_chars(&mut self, n: u16) -> Result<()> {
        if n > 0 {
            write!(self.out, "\x1b[{n}@")?;
        }
        Ok(())
    }

    fn delete_chars(&mut self, n: u16) -> Result<()> {
        if n > 0 {
            write!(self.out, "\x1b[{n}P")?;
        }
        Ok(())
    }

    fn set_attributes(&mut self, attrs: Attributes) -> Result<()> {
        let delta = Attributes::diff(self.current, attrs);
        self.apply_delta(delta)?;
        self.current = Attributes::merge(self.current, attrs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_run_only_emits_changed_attribute_escapes() {
        let mut screen = CrosstermScreen::new(Vec::<u8>::new());
        let mut a = Attributes::new();
        a.set_fg(2);
        screen.write_run("hello", a).unwrap();
        let after_first = screen.out.len();

        // Re-applying the identical attribute set should not reissue the
        // colour escape: diff(current, a) has no fields present.
        screen.write_run(" world", a).unwrap();
        let added = &screen.out[after_first..];
        let s = String::from_utf8_lossy(added);
        assert!(!s.contains("\x1b[38"), "unexpected foreground escape in: {s:?}");
        assert!(s.ends_with(" world"));
    }

    #[test]
    fn insert_and_delete_chars_emit_csi_sequences() {
        let mut screen = CrosstermScreen::new(Vec::<u8>::new());
        screen.insert_chars(3).unwrap();
        screen.delete_chars(2).unwrap();
        let s = String::from_utf8_lossy(&screen.out);
        assert!(s.contains("3@"));
        assert!(s.contains("2P"));
    }

    #[test]
    fn zero_count_insert_delete_are_no_ops() {
        let mut screen = CrosstermScreen::new(Vec::<u8>::new());
        screen.insert_chars(0).unwrap();
        screen.delete_chars(0).unwrap();
        assert!(screen.out.is_empty());
    }
}
