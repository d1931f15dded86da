//! Typed-by-name settings registry.
//!
//! The external contract (spec §6, §9) is only "read a typed value by
//! name", the original's process-wide singleton registry is modeled
//! here as an explicit [`Settings`] object threaded through the editor,
//! the same way the host binary threads its own config through rather
//! than reading from a global. Settings load once from an optional
//! TOML file at the start of `edit()`, falling back to documented
//! defaults on a missing or malformed file (never hard-fail on a bad
//! config file).

use core_attrs::Attributes;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreCase {
    Off,
    On,
    #[default]
    Relaxed,
}

impl From<IgnoreCase> for core_matches::CompareScope {
    fn from(v: IgnoreCase) -> Self {
        match v {
            IgnoreCase::Off => core_matches::CompareScope::Exact,
            IgnoreCase::On => core_matches::CompareScope::Caseless,
            IgnoreCase::Relaxed => core_matches::CompareScope::Relaxed,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ColourFile {
    #[serde(default)]
    fg: Option<u8>,
    #[serde(default)]
    bg: Option<u8>,
    #[serde(default)]
    bold: Option<bool>,
    #[serde(default)]
    underline: Option<bool>,
}

fn colour_to_attributes(c: Option<ColourFile>) -> Attributes {
    let mut a = Attributes::new();
    if let Some(c) = c {
        if let Some(fg) = c.fg {
            a.set_fg(fg);
        }
        if let Some(bg) = c.bg {
            a.set_bg(bg);
        }
        if let Some(bold) = c.bold {
            a.set_bold(bold);
        }
        if let Some(underline) = c.underline {
            a.set_underline(underline);
        }
    }
    a
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MatchFile {
    #[serde(default)]
    ignore_case: IgnoreCase,
    #[serde(default)]
    query_threshold: Option<u32>,
    #[serde(default)]
    vertical: Option<bool>,
    #[serde(default)]
    column_pad: Option<u16>,
    #[serde(default)]
    max_width: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ColourFileGroup {
    #[serde(default)]
    interact: Option<ColourFile>,
    #[serde(default)]
    minor: Option<ColourFile>,
    #[serde(default)]
    major: Option<ColourFile>,
    #[serde(default)]
    highlight: Option<ColourFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    add_history_cmd: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    r#match: MatchFile,
    #[serde(default)]
    colour: ColourFileGroup,
    #[serde(default)]
    history: HistoryFile,
}

/// The typed settings consumed by the editor core and tab completer, per
/// spec §6 "Settings consumed".
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub match_ignore_case: IgnoreCase,
    pub match_query_threshold: u32,
    pub match_vertical: bool,
    pub match_column_pad: u16,
    pub match_max_width: u16,
    pub colour_interact: Attributes,
    pub colour_minor: Attributes,
    pub colour_major: Attributes,
    pub colour_highlight: Attributes,
    pub history_add_history_cmd: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            match_ignore_case: IgnoreCase::Relaxed,
            match_query_threshold: 100,
            match_vertical: true,
            match_column_pad: 2,
            match_max_width: 106,
            colour_interact: Attributes::new(),
            colour_minor: Attributes::new(),
            colour_major: Attributes::new(),
            colour_highlight: Attributes::new(),
            history_add_history_cmd: true,
        }
    }
}

impl Settings {
    fn from_file(file: SettingsFile) -> Self {
        let defaults = Self::default();
        Self {
            match_ignore_case: file.r#match.ignore_case,
            match_query_threshold: file.r#match.query_threshold.unwrap_or(defaults.match_query_threshold),
            match_vertical: file.r#match.vertical.unwrap_or(defaults.match_vertical),
            match_column_pad: file.r#match.column_pad.unwrap_or(defaults.match_column_pad),
            match_max_width: file.r#match.max_width.unwrap_or(defaults.match_max_width),
            colour_interact: colour_to_attributes(file.colour.interact),
            colour_minor: colour_to_attributes(file.colour.minor),
            colour_major: colour_to_attributes(file.colour.major),
            colour_highlight: colour_to_attributes(file.colour.highlight),
            history_add_history_cmd: file
                .history
                .add_history_cmd
                .unwrap_or(defaults.history_add_history_cmd),
        }
    }

    pub fn compare_scope(&self) -> core_matches::CompareScope {
        self.match_ignore_case.into()
    }
}

/// Best-effort config path: a local `lineedit.toml` first, then the
/// platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("lineedit.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("lineedit").join("lineedit.toml");
    }
    PathBuf::from("lineedit.toml")
}

/// Load settings from `path` (or the discovered default), falling back to
/// [`Settings::default`] on a missing or malformed file rather than
/// failing the caller.
pub fn load_from(path: Option<&Path>) -> Settings {
    let path = path.map(PathBuf::from).unwrap_or_else(discover);
    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<SettingsFile>(&content) {
            Ok(file) => Settings::from_file(file),
            Err(e) => {
                tracing::debug!(target: "settings", path = %path.display(), error = %e, "parse_error_falling_back_to_defaults");
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let s = Settings::default();
        assert_eq!(s.match_ignore_case, IgnoreCase::Relaxed);
        assert_eq!(s.match_query_threshold, 100);
        assert!(s.match_vertical);
        assert_eq!(s.match_column_pad, 2);
        assert_eq!(s.match_max_width, 106);
        assert!(s.history_add_history_cmd);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let s = load_from(Some(Path::new("__definitely_missing__.toml")));
        assert_eq!(s.match_query_threshold, 100);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "not valid toml {{{").unwrap();
        let s = load_from(Some(tmp.path()));
        assert_eq!(s.match_query_threshold, 100);
    }

    #[test]
    fn parses_overridden_values() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            r#"
            [match]
            ignore_case = "on"
            query_threshold = 50
            vertical = false

            [colour.minor]
            fg = 8
            "#,
        )
        .unwrap();
        let s = load_from(Some(tmp.path()));
        assert_eq!(s.match_ignore_case, IgnoreCase::On);
        assert_eq!(s.match_query_threshold, 50);
        assert!(!s.match_vertical);
        assert_eq!(s.colour_minor.get_fg().value, core_attrs::Colour::Palette(8));
    }

    #[test]
    fn compare_scope_follows_ignore_case() {
        let mut s = Settings::default();
        s.match_ignore_case = IgnoreCase::Off;
        assert_eq!(s.compare_scope(), core_matches::CompareScope::Exact);
    }
}
