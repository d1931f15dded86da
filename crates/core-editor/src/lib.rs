//! Editor core: owns the binder, bind resolver, line buffer and match
//! collection; pumps terminal bytes through the resolver; dispatches
//! bindings to modules; orchestrates match generation (spec §2 #9, §4.3).
//!
//! Modules and generators are registered by mutable borrow rather than
//! owned. They outlive one `edit()` call but the editor never needs to
//! outlive them either, so there is no reason to force `Box<dyn ..>` and
//! its allocation (spec §9 "Shared ownership of modules/generators").

mod guards;

pub use guards::{CompareScopeGuard, WorkingDirGuard};

use core_binder::{BindResolver, Binder, Binding};
use core_linebuf::LineBuffer;
use core_matches::{CompareScope, Match, MatchCollection};
use core_screen::{ClearType, ScreenBuffer};
use core_settings::Settings;
use core_terminal::{TerminalIn, TerminalInput};
use core_words::{DelimiterConfig, LineState};
use std::time::Duration;
use tracing::{debug, trace};

/// How long the terminal read blocks before yielding an `input_timeout`
/// sentinel back to the loop (spec §5 "periodic wakeup for blink/animation").
const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Node/edge capacity handed to the binder rebuilt at the top of every
/// `edit()` call.
const DEFAULT_BINDER_CAPACITY: usize = 8192;

/// Flags a module sets on the shared result object for the editor to
/// apply after `on_input` returns (spec §4.3 "Result processing").
#[derive(Debug, Clone, Default)]
pub struct EditResult {
    pub redraw: bool,
    pub accept_line: bool,
    pub abort: bool,
    pub append_match_lcd: bool,
    pub accept_match: Option<usize>,
    pub regenerate_matches: bool,
    pub set_bind_group: Option<u8>,
    pub pass_to_other_modules: bool,
}

impl EditResult {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Borrowed view of editor-owned state, handed to modules for the
/// duration of a single callback. `bind_group` is the group active
/// *before* this callback runs, a module that wants to restore it later
/// (e.g. the tab completer leaving a modal prompt) reads it here rather
/// than receiving it back from a setter, since the switch itself is only
/// requested via [`EditResult::set_bind_group`] and applied afterward.
pub struct EditContext<'a> {
    pub buffer: &'a mut LineBuffer,
    pub matches: &'a mut MatchCollection,
    pub settings: &'a Settings,
    pub delimiters: &'a DelimiterConfig,
    pub bind_group: u8,
    /// The screen a module renders onto directly. The tab completer's
    /// query prompt and paged match listing are the only things in this
    /// workspace that need it; the editor itself only ever draws the
    /// prompt/buffer line (spec §4.4 "Paged printing").
    pub screen: &'a mut dyn ScreenBuffer,
}

impl<'a> EditContext<'a> {
    /// Retokenizes the buffer on demand. There is no incremental reparse
    /// (spec Non-goal), so every module that needs word/cursor context
    /// derives it fresh here.
    pub fn line_state(&self) -> LineState {
        LineState::parse(self.buffer.view(), self.delimiters)
    }
}

/// A pluggable consumer of binder events and producer of [`EditResult`]
/// actions (spec §6 "Editor module interface").
pub trait EditorModule {
    /// Registers this module's chords against `binder`, tagging them with
    /// `module_id` (this module's index in the editor's module table).
    /// Called at the start of every `edit()` call in registration order.
    fn bind_input(&mut self, binder: &mut Binder, module_id: u8);

    fn on_begin_line(&mut self, _prompt: &str, _ctx: &mut EditContext<'_>) {}

    fn on_end_line(&mut self) {}

    fn on_matches_changed(&mut self, _ctx: &mut EditContext<'_>) {}

    /// `id`/`chord` identify the specific binding that fired; only the
    /// module that owns the binding is called (spec §5 "Ordering
    /// guarantees").
    fn on_input(&mut self, id: u8, chord: &[u8], ctx: &mut EditContext<'_>, result: &mut EditResult);

    fn on_terminal_resize(&mut self, _columns: u16, _rows: u16) {}
}

/// A pluggable producer of matches for the current [`LineState`] (spec
/// §4.3 "Match generator contract"). The first generator to return `true`
/// owns the match collection for this completion attempt.
pub trait MatchGenerator {
    fn generate(&mut self, line_state: &LineState, matches: &mut MatchCollection) -> bool;
}

enum PumpOutcome {
    Continue,
    Accept,
    Abort,
}

/// Owns the binder, bind resolver, line buffer, and match collection for
/// one or more `edit()` sessions; borrows modules and generators rather
/// than owning them.
pub struct Editor<'m> {
    settings: Settings,
    delimiters: DelimiterConfig,
    modules: Vec<&'m mut dyn EditorModule>,
    generators: Vec<&'m mut dyn MatchGenerator>,
    capacity: usize,
}

impl<'m> Editor<'m> {
    pub fn new(settings: Settings) -> Self {
        Self::with_delimiters(settings, DelimiterConfig::default())
    }

    pub fn with_delimiters(settings: Settings, delimiters: DelimiterConfig) -> Self {
        Self {
            settings,
            delimiters,
            modules: Vec::new(),
            generators: Vec::new(),
            capacity: DEFAULT_BINDER_CAPACITY,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Registers a module. Registration order is the tie-break order for
    /// overlapping bindings and the dispatch order for broadcast
    /// callbacks (spec §4.3, §5).
    pub fn add_module(&mut self, module: &'m mut dyn EditorModule) -> u8 {
        let id = self.modules.len() as u8;
        self.modules.push(module);
        id
    }

    pub fn add_generator(&mut self, generator: &'m mut dyn MatchGenerator) {
        self.generators.push(generator);
    }

    /// Runs one line-editing session. Returns `true` with `out_buffer`
    /// holding the final line if the user accepted it, `false` on abort
    /// or EOF (spec §4.3 "edit(out_buffer) -> bool").
    pub fn edit(
        &mut self,
        prompt: &str,
        term_in: &mut dyn TerminalIn,
        screen: &mut dyn ScreenBuffer,
        out_buffer: &mut String,
    ) -> bool {
        let _scope_guard = CompareScopeGuard::acquire(self.settings.compare_scope());
        let _cwd_guard = WorkingDirGuard::acquire();

        let mut binder = Binder::new(self.capacity);
        for (idx, module) in self.modules.iter_mut().enumerate() {
            module.bind_input(&mut binder, idx as u8);
        }
        let mut resolver = BindResolver::new(&binder);

        let mut buffer = LineBuffer::new();
        let mut matches = MatchCollection::new(self.settings.compare_scope());

        for module in self.modules.iter_mut() {
            let mut ctx = EditContext {
                buffer: &mut buffer,
                matches: &mut matches,
                settings: &self.settings,
                delimiters: &self.delimiters,
                bind_group: resolver.group(),
                screen: &mut *screen,
            };
            module.on_begin_line(prompt, &mut ctx);
        }

        let _ = self.render(prompt, &buffer, screen);

        let accepted = loop {
            match term_in.read(READ_TIMEOUT) {
                TerminalInput::Byte(b) => match self.pump_byte(b, &mut resolver, &mut buffer, &mut matches, screen) {
                    PumpOutcome::Continue => {
                        let _ = self.render(prompt, &buffer, screen);
                    }
                    PumpOutcome::Accept => break true,
                    PumpOutcome::Abort => break false,
                },
                TerminalInput::Timeout => {}
                TerminalInput::Abort => {
                    debug!(target: "editor", "terminal_read_failure_surfaced_as_abort");
                    break false;
                }
                TerminalInput::Resize => {
                    let (cols, rows) = (screen.columns(), screen.rows());
                    for module in self.modules.iter_mut() {
                        module.on_terminal_resize(cols, rows);
                    }
                }
                TerminalInput::None => {}
            }
        };

        for module in self.modules.iter_mut() {
            module.on_end_line();
        }

        if accepted {
            out_buffer.clear();
            out_buffer.push_str(buffer.text());
        }
        accepted
    }

    fn render(&self, prompt: &str, buffer: &LineBuffer, screen: &mut dyn ScreenBuffer) -> anyhow::Result<()> {
        screen.clear_line(ClearType::All)?;
        screen.set_cursor(0, 0)?;
        screen.write(prompt)?;
        screen.write(buffer.text())?;
        let trailing = (buffer.len() - buffer.cursor()) as i32;
        if trailing > 0 {
            screen.move_cursor(-trailing, 0)?;
        }
        screen.flush()
    }

    fn pump_byte(
        &mut self,
        byte: u8,
        resolver: &mut BindResolver<'_>,
        buffer: &mut LineBuffer,
        matches: &mut MatchCollection,
        screen: &mut dyn ScreenBuffer,
    ) -> PumpOutcome {
        if !resolver.step(byte) {
            return PumpOutcome::Continue;
        }
        self.resolve_and_dispatch(resolver, buffer, matches, screen)
    }

    /// Drains every binding resolvable from the current position,
    /// dispatching each to its owning module and claiming the whole
    /// matched depth in turn. If a claim leaves a suffix pending, re-feeds
    /// it immediately, the resolver requires that before any new
    /// terminal byte is read (spec §4.2 step 3).
    fn resolve_and_dispatch(
        &mut self,
        resolver: &mut BindResolver<'_>,
        buffer: &mut LineBuffer,
        matches: &mut MatchCollection,
        screen: &mut dyn ScreenBuffer,
    ) -> PumpOutcome {
        loop {
            let mut outcome = PumpOutcome::Continue;
            let mut last_binding: Option<Binding> = None;
            while let Some(binding) = resolver.next() {
                let (this_outcome, pass_through) = self.dispatch_binding(&binding, resolver, buffer, matches, screen);
                outcome = this_outcome;
                last_binding = Some(binding);
                if !pass_through || !matches!(outcome, PumpOutcome::Continue) {
                    break;
                }
            }
            match last_binding {
                // At least one sibling binding matched this depth. Claim
                // consumes however many bytes it covered (every sibling at
                // one node shares the same depth, per trie construction).
                Some(binding) => resolver.claim(&binding),
                // Dead end with nothing bound at all: the chord is simply
                // not mapped to anything, so discard it the same way an
                // overflowed chord is discarded (spec §7) rather than
                // leaving the resolver parked on an unreachable node.
                None => resolver.reset(),
            }
            if !matches!(outcome, PumpOutcome::Continue) {
                return outcome;
            }
            if resolver.take_pending_input() {
                let remaining: Vec<u8> = resolver.pending_bytes().to_vec();
                let mut resolve_again = false;
                for b in remaining {
                    if resolver.step(b) {
                        resolve_again = true;
                    }
                }
                if !resolve_again {
                    break;
                }
            } else {
                break;
            }
        }
        PumpOutcome::Continue
    }

    /// Dispatches one binding to its owning module and applies the
    /// resulting `EditResult`. Returns the pump outcome plus whether the
    /// module asked to let the next sibling binding at this depth run too
    /// (spec §4.3 "pass_to_other_modules").
    fn dispatch_binding(
        &mut self,
        binding: &Binding,
        resolver: &mut BindResolver<'_>,
        buffer: &mut LineBuffer,
        matches: &mut MatchCollection,
        screen: &mut dyn ScreenBuffer,
    ) -> (PumpOutcome, bool) {
        let mut result = EditResult::new();
        {
            let mut ctx = EditContext {
                buffer: &mut *buffer,
                matches: &mut *matches,
                settings: &self.settings,
                delimiters: &self.delimiters,
                bind_group: resolver.group(),
                screen: &mut *screen,
            };
            if let Some(module) = self.modules.get_mut(binding.module as usize) {
                trace!(target: "editor", module = binding.module, id = binding.id, "dispatch");
                module.on_input(binding.id, &binding.chord, &mut ctx, &mut result);
            }
        }
        let pass_through = result.pass_to_other_modules;
        let outcome = self.apply_result(&result, resolver, buffer, matches, screen);
        (outcome, pass_through)
    }

    fn apply_result(
        &mut self,
        result: &EditResult,
        resolver: &mut BindResolver<'_>,
        buffer: &mut LineBuffer,
        matches: &mut MatchCollection,
        screen: &mut dyn ScreenBuffer,
    ) -> PumpOutcome {
        let mut matches_changed = false;

        if let Some(index) = result.accept_match {
            if let Some(m) = matches.get(index).cloned() {
                self.accept_match(buffer, matches.prefix_included(), &m);
                matches.clear();
                matches_changed = true;
            }
        } else if result.append_match_lcd {
            let lcd = matches.get_match_lcd();
            if !lcd.is_empty() {
                self.append_lcd(buffer, &lcd);
            }
        }

        if result.regenerate_matches {
            self.regenerate_matches(buffer, matches);
            matches_changed = true;
        }

        if let Some(group) = result.set_bind_group {
            resolver.set_group(group);
        }

        if matches_changed {
            self.broadcast_matches_changed(resolver.group(), buffer, matches, screen);
        }

        if result.accept_line {
            PumpOutcome::Accept
        } else if result.abort {
            PumpOutcome::Abort
        } else {
            PumpOutcome::Continue
        }
    }

    /// Replace range for an accepted match: the whole end word when the
    /// generator's matches already embed the typed prefix
    /// (`prefix_included`), otherwise only the span from the cursor to
    /// the word's end, leaving what the user already typed untouched
    /// and inserting the rest after it.
    fn accept_match(&self, buffer: &mut LineBuffer, prefix_included: bool, m: &Match) {
        let (start, end) = self.completion_range(buffer, prefix_included);
        let mut text = m.text.clone();
        match m.suffix {
            Some(b) => text.push(b as char),
            None => text.push(' '),
        }
        let _ = buffer.replace_range(start, end, &text);
    }

    fn completion_range(&self, buffer: &LineBuffer, prefix_included: bool) -> (usize, usize) {
        let state = LineState::parse(buffer.view(), &self.delimiters);
        let cursor = buffer.cursor();
        match state.end_word() {
            Some(w) => {
                let word_start = w.offset as usize;
                let word_end = (w.end() as usize).max(cursor);
                if prefix_included {
                    (word_start, word_end)
                } else {
                    (cursor.min(word_end), word_end)
                }
            }
            None => (cursor, cursor),
        }
    }

    /// LCD-append always replaces the typed prefix (word start through
    /// cursor). Unlike `accept_match`, it is never about a generator's
    /// `prefix_included` convention, only about extending what the user
    /// typed so far.
    fn append_lcd(&self, buffer: &mut LineBuffer, lcd: &str) {
        let state = LineState::parse(buffer.view(), &self.delimiters);
        if let Some(w) = state.end_word() {
            let word_start = w.offset as usize;
            let cursor = buffer.cursor().max(word_start);
            let _ = buffer.replace_range(word_start, cursor, lcd);
        }
    }

    fn regenerate_matches(&mut self, buffer: &LineBuffer, matches: &mut MatchCollection) {
        matches.clear();
        let state = LineState::parse(buffer.view(), &self.delimiters);
        for generator in self.generators.iter_mut() {
            if generator.generate(&state, matches) {
                debug!(target: "editor", count = matches.count(), "matches_regenerated");
                return;
            }
        }
    }

    fn broadcast_matches_changed(
        &mut self,
        bind_group: u8,
        buffer: &mut LineBuffer,
        matches: &mut MatchCollection,
        screen: &mut dyn ScreenBuffer,
    ) {
        for module in self.modules.iter_mut() {
            let mut ctx = EditContext {
                buffer: &mut *buffer,
                matches: &mut *matches,
                settings: &self.settings,
                delimiters: &self.delimiters,
                bind_group,
                screen: &mut *screen,
            };
            module.on_matches_changed(&mut ctx);
        }
    }
}
