//! RAII scope guards for resources `edit()` must restore on every exit path
//! (spec §5 "Resources"), the same pattern `core-terminal::TerminalGuard`
//! uses for raw mode.

use core_matches::CompareScope;
use std::cell::Cell;
use std::path::PathBuf;

thread_local! {
    static ACTIVE_SCOPE: Cell<CompareScope> = Cell::new(CompareScope::default());
}

/// Installs `scope` as the thread-local active compare mode for the
/// duration of one `edit()` call, restoring whatever was active before on
/// drop (spec §5, §9 "String compare scope").
pub struct CompareScopeGuard {
    previous: CompareScope,
}

impl CompareScopeGuard {
    pub fn acquire(scope: CompareScope) -> Self {
        let previous = ACTIVE_SCOPE.with(|c| c.replace(scope));
        Self { previous }
    }

    pub fn active() -> CompareScope {
        ACTIVE_SCOPE.with(|c| c.get())
    }
}

impl Drop for CompareScopeGuard {
    fn drop(&mut self) {
        ACTIVE_SCOPE.with(|c| c.set(self.previous));
    }
}

/// Captures the working directory on entry to `edit()` and restores it on
/// drop, even if a module or generator changes it mid-session (spec §5
/// "Working directory: saved on entry... restored on exit (guaranteed)").
pub struct WorkingDirGuard {
    original: Option<PathBuf>,
}

impl WorkingDirGuard {
    pub fn acquire() -> Self {
        Self {
            original: std::env::current_dir().ok(),
        }
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Some(dir) = &self.original {
            let _ = std::env::set_current_dir(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_scope_guard_restores_previous_on_drop() {
        let _outer = CompareScopeGuard::acquire(CompareScope::Exact);
        {
            let _inner = CompareScopeGuard::acquire(CompareScope::Caseless);
            assert_eq!(CompareScopeGuard::active(), CompareScope::Caseless);
        }
        assert_eq!(CompareScopeGuard::active(), CompareScope::Exact);
    }

    #[test]
    fn working_dir_guard_restores_cwd_on_drop() {
        let original = std::env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        {
            let _guard = WorkingDirGuard::acquire();
            std::env::set_current_dir(tmp.path()).unwrap();
            assert_eq!(std::env::current_dir().unwrap(), tmp.path().canonicalize().unwrap());
        }
        assert_eq!(std::env::current_dir().unwrap(), original);
    }
}
