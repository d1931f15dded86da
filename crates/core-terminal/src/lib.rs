//! Terminal backend abstraction, raw-mode guard, and the byte-stream
//! keystroke reader with its sentinel values (spec §2 #2, §6).
//!
//! Unlike a full-screen TUI, a line editor embedded in a host shell edits
//! inline. It enters raw mode to read keystrokes one byte at a time but
//! never takes over the alternate screen, so shell scrollback and any
//! preceding prompt output stay on screen exactly where the host printed
//! them.

use anyhow::Result;
use crossterm::{cursor::Show, execute, terminal::{disable_raw_mode, enable_raw_mode}};
use std::io::stdout;

pub mod input;

pub use input::{CrosstermTerminalIn, TerminalIn, TerminalInput};

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
}

pub struct CrosstermBackend {
    entered: bool,
}

/// RAII guard ensuring terminal state restoration even if caller early-returns or panics.
pub struct TerminalGuard<'a> {
    backend: &'a mut CrosstermBackend,
    active: bool,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_>> {
        self.enter()?;
        Ok(TerminalGuard {
            backend: self,
            active: true,
        })
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            self.entered = true;
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), Show)?;
            disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl<'a> Drop for TerminalGuard<'a> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.backend.leave();
        }
    }
}
