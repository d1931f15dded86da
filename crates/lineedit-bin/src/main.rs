//! Demo host: a minimal shell-replacement loop wiring the line-editor
//! runtime together, analogous to the original's `host.cpp` edit-line
//! loop (SPEC_FULL.md §6).

use anyhow::Result;
use clap::Parser;
use core_binder::Binder;
use core_editor::{EditContext, EditResult, Editor, EditorModule, MatchGenerator};
use core_matches::{Match, MatchCollection};
use core_screen::{CrosstermScreen, ScreenBuffer};
use core_settings::Settings;
use core_tabcomplete::TabCompleter;
use core_terminal::{CrosstermBackend, CrosstermTerminalIn};
use core_words::LineState;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "lineedit", version, about = "Embedded line-editor runtime demo")]
struct Args {
    /// Prompt string printed before every line.
    #[arg(long, default_value = "$ ")]
    prompt: String,
    /// Settings file overriding the discovered default (see
    /// `core_settings::discover`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

/// Lists directory entries whose name matches the end word's filename
/// component, grounded on the original's `file_match_generator`
/// (SPEC_FULL.md §6). Directories get the platform path separator as
/// their match suffix instead of the default trailing space.
struct FilesystemMatchGenerator;

fn split_path_prefix(prefix: &str) -> (&str, &str) {
    match prefix.rfind(['/', '\\']) {
        Some(i) => prefix.split_at(i + 1),
        None => ("", prefix),
    }
}

impl MatchGenerator for FilesystemMatchGenerator {
    fn generate(&mut self, line_state: &LineState, matches: &mut MatchCollection) -> bool {
        matches.set_prefix_included(true);
        let prefix = line_state.end_word_prefix();
        let (dir_text, file_prefix) = split_path_prefix(prefix);
        let dir_path = if dir_text.is_empty() { Path::new(".") } else { Path::new(dir_text) };

        let Ok(entries) = std::fs::read_dir(dir_path) else {
            return true;
        };
        let file_prefix_lower = file_prefix.to_lowercase();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.to_lowercase().starts_with(&file_prefix_lower) {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            matches.add(Match {
                text: format!("{dir_text}{name}"),
                displayable: Some(name.to_string()),
                aux: None,
                suffix: is_dir.then_some(std::path::MAIN_SEPARATOR as u8),
            });
        }
        true
    }
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let file_appender = tracing_appender::rolling::never(log_dir, "lineedit.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .try_init()
    {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();

    let args = Args::parse();
    info!(target: "runtime", prompt = args.prompt.as_str(), "startup");

    let settings = core_settings::load_from(args.settings.as_deref());

    let mut backend = CrosstermBackend::new();
    let _terminal_guard = backend.enter_guard()?;
    let mut term_in = CrosstermTerminalIn::new();
    let mut screen = CrosstermScreen::stdout();

    let mut tab_completer = TabCompleter::new();
    let mut fs_generator = FilesystemMatchGenerator;

    loop {
        let mut editor = Editor::new(settings);
        editor.add_module(&mut tab_completer);
        let mut line_module = LineEditingModule;
        editor.add_module(&mut line_module);
        editor.add_generator(&mut fs_generator);

        let mut line = String::new();
        let accepted = editor.edit(&args.prompt, &mut term_in, &mut screen, &mut line);
        let _ = screen.write("\r\n");
        let _ = screen.flush();

        if !accepted {
            debug!(target: "runtime", "session_ended_without_accept");
            break;
        }
        if line.is_empty() {
            continue;
        }
        let _ = screen.write(&format!("you typed: {line}\r\n"));
        let _ = screen.flush();
    }

    Ok(())
}

/// Minimal default editing behavior: Enter accepts, Ctrl-C/Ctrl-D abort,
/// Backspace deletes the char before the cursor, everything else not
/// already claimed by the tab completer inserts itself. A real host
/// would register a readline-emulation module here instead (spec.md's
/// "readline adapter" is explicitly out of scope, per the Non-goals).
struct LineEditingModule;

const ID_ACCEPT: u8 = 1;
const ID_ABORT: u8 = 2;
const ID_BACKSPACE: u8 = 3;
const ID_INSERT: u8 = 4;

impl EditorModule for LineEditingModule {
    fn bind_input(&mut self, binder: &mut Binder, module_id: u8) {
        let group = binder.default_group();
        binder.bind(group, "\r", ID_ACCEPT, module_id);
        binder.bind(group, "^C", ID_ABORT, module_id);
        binder.bind(group, "^D", ID_ABORT, module_id);
        binder.bind(group, "\x7f", ID_BACKSPACE, module_id);
        binder.bind_wildcard(group, ID_INSERT, module_id);
    }

    fn on_input(&mut self, id: u8, chord: &[u8], ctx: &mut EditContext<'_>, result: &mut EditResult) {
        match id {
            ID_ACCEPT => result.accept_line = true,
            ID_ABORT => result.abort = true,
            ID_BACKSPACE => {
                let cursor = ctx.buffer.cursor();
                if cursor > 0 {
                    let prev = ctx.buffer.text()[..cursor]
                        .char_indices()
                        .next_back()
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    let _ = ctx.buffer.delete_range(prev, cursor);
                }
            }
            ID_INSERT => {
                if let Ok(text) = std::str::from_utf8(chord) {
                    ctx.buffer.insert(text);
                }
            }
            _ => {}
        }
    }
}
