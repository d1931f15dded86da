//! Match candidate collection.
//!
//! Generators fill a [`MatchCollection`] each completion attempt; the tab
//! completer reads it back for acceptance, LCD-append, and paged display.
//! Duplicate detection and the longest-common-denominator computation both
//! depend on the active [`CompareScope`], which the settings layer installs
//! for the duration of one `edit()` call (see `core-editor`'s
//! `CompareScopeGuard`).

use unicode_width::UnicodeWidthStr;

/// How two match strings are compared for duplicate detection and LCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareScope {
    Exact,
    Caseless,
    #[default]
    Relaxed,
}

fn key_char(c: char, scope: CompareScope) -> char {
    match scope {
        CompareScope::Exact => c,
        CompareScope::Caseless => c.to_ascii_lowercase(),
        CompareScope::Relaxed => {
            let c = c.to_ascii_lowercase();
            if c == '_' { '-' } else { c }
        }
    }
}

fn normalize(s: &str, scope: CompareScope) -> String {
    s.chars().map(|c| key_char(c, scope)).collect()
}

/// A single completion candidate. `text` is what gets inserted,
/// `displayable` (when present) is what gets printed instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub text: String,
    pub displayable: Option<String>,
    pub aux: Option<String>,
    pub suffix: Option<u8>,
}

impl Match {
    pub fn simple(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            displayable: None,
            aux: None,
            suffix: None,
        }
    }

    /// The string actually printed to the screen.
    pub fn display(&self) -> &str {
        self.displayable.as_deref().unwrap_or(&self.text)
    }
}

/// Ordered, dedup-on-insert container of [`Match`] records.
///
/// Cleared at the start of each completion attempt, filled by generators
/// (first to claim ownership wins, per the editor's generator contract),
/// read by the completer, and dropped at line end.
#[derive(Debug, Default)]
pub struct MatchCollection {
    scope: CompareScope,
    entries: Vec<Match>,
    seen: std::collections::HashSet<String>,
    prefix_included: bool,
}

impl MatchCollection {
    pub fn new(scope: CompareScope) -> Self {
        Self {
            scope,
            entries: Vec::new(),
            seen: std::collections::HashSet::new(),
            prefix_included: false,
        }
    }

    pub fn scope(&self) -> CompareScope {
        self.scope
    }

    pub fn set_scope(&mut self, scope: CompareScope) {
        self.scope = scope;
    }

    /// Clear all matches and the prefix-included flag ahead of a new
    /// completion attempt.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
        self.prefix_included = false;
    }

    /// Signals that matches already include the word being completed
    /// (default: matches replace only the text after the end-word
    /// prefix).
    pub fn set_prefix_included(&mut self, included: bool) {
        self.prefix_included = included;
    }

    pub fn prefix_included(&self) -> bool {
        self.prefix_included
    }

    /// Insert `m`, ignoring it if a match with the same identity (under
    /// the active compare scope) was already inserted. Returns whether it
    /// was actually added.
    pub fn add(&mut self, m: Match) -> bool {
        let key = normalize(&m.text, self.scope);
        if !self.seen.insert(key) {
            return false;
        }
        self.entries.push(m);
        true
    }

    pub fn add_text(&mut self, text: impl Into<String>) -> bool {
        self.add(Match::simple(text))
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Match> {
        self.entries.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Match> {
        self.entries.iter()
    }

    /// Printable cell width of the displayable string at index `i`.
    pub fn get_cell_count(&self, i: usize) -> usize {
        self.get(i).map(|m| m.display().width()).unwrap_or(0)
    }

    pub fn has_aux(&self) -> bool {
        self.entries.iter().any(|m| m.aux.is_some())
    }

    /// Longest prefix shared by every match, case-folded only. Extension
    /// never collapses `-`/`_` the way the `Relaxed` compare scope does
    /// for duplicate detection, it only folds case, matching and
    /// `README`/`readme.txt` still yielding `README` while `case_map-1`
    /// and `case_map_2` stop at the dash/underscore divergence. Ties
    /// (case divergence) resolve to the byte sequence of the
    /// first-inserted match, per spec §4.5.
    pub fn get_match_lcd(&self) -> String {
        let Some(first) = self.entries.first() else {
            return String::new();
        };
        let first_chars: Vec<char> = first.text.chars().collect();
        let rest: Vec<Vec<char>> = self.entries[1..]
            .iter()
            .map(|m| m.text.chars().collect())
            .collect();

        let mut lcd_len = 0usize;
        'outer: for (i, &fc) in first_chars.iter().enumerate() {
            let target = key_char(fc, CompareScope::Caseless);
            for other in &rest {
                match other.get(i) {
                    Some(&c) if key_char(c, CompareScope::Caseless) == target => {}
                    _ => break 'outer,
                }
            }
            lcd_len = i + 1;
        }
        first_chars[..lcd_len].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcd_is_prefix_of_every_match_and_maximal() {
        let mut mc = MatchCollection::new(CompareScope::Relaxed);
        mc.add_text("case_map-1");
        mc.add_text("case_map_2");
        let lcd = mc.get_match_lcd();
        assert_eq!(lcd, "case_map");
        for m in mc.iter() {
            assert!(m.text.starts_with(&lcd) || normalize(&m.text, mc.scope()).starts_with(&normalize(&lcd, mc.scope())));
        }
        // extending by one char breaks the shared-prefix property for at
        // least one element (the `-`/`_` divergence at position 8).
        let longer = format!("{lcd}_");
        assert!(!mc.iter().all(|m| normalize(&m.text, mc.scope()).starts_with(&normalize(&longer, mc.scope()))));
    }

    #[test]
    fn lcd_uses_first_inserted_bytes_on_divergence() {
        let mut mc = MatchCollection::new(CompareScope::Caseless);
        mc.add_text("README");
        mc.add_text("readme.txt");
        assert_eq!(mc.get_match_lcd(), "README");
    }

    #[test]
    fn exact_scope_treats_case_as_distinct() {
        let mut mc = MatchCollection::new(CompareScope::Exact);
        assert!(mc.add_text("Foo"));
        assert!(mc.add_text("foo"));
        assert_eq!(mc.count(), 2);
    }

    #[test]
    fn caseless_scope_dedupes_case_variants() {
        let mut mc = MatchCollection::new(CompareScope::Caseless);
        assert!(mc.add_text("Foo"));
        assert!(!mc.add_text("foo"));
        assert_eq!(mc.count(), 1);
    }

    #[test]
    fn relaxed_scope_equates_dash_and_underscore() {
        let mut mc = MatchCollection::new(CompareScope::Relaxed);
        assert!(mc.add_text("case-map"));
        assert!(!mc.add_text("case_map"));
        assert_eq!(mc.count(), 1);
    }

    #[test]
    fn cleared_collection_has_no_matches_or_flags() {
        let mut mc = MatchCollection::new(CompareScope::Relaxed);
        mc.add_text("a");
        mc.set_prefix_included(true);
        mc.clear();
        assert_eq!(mc.count(), 0);
        assert!(!mc.prefix_included());
        assert_eq!(mc.get_match_lcd(), "");
    }

    #[test]
    fn has_aux_reflects_any_record() {
        let mut mc = MatchCollection::new(CompareScope::Exact);
        mc.add_text("a");
        assert!(!mc.has_aux());
        mc.add(Match {
            text: "b".into(),
            displayable: None,
            aux: Some("desc".into()),
            suffix: None,
        });
        assert!(mc.has_aux());
    }

    #[test]
    fn displayable_falls_back_to_match_text() {
        let m = Match::simple("file1");
        assert_eq!(m.display(), "file1");
    }
}
