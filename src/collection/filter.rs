//! Which processes are eligible for display.

/// Returns whether a process with the given name should be shown.
///
/// Empty names are skipped, as are kernel threads, which are reported with
/// their name wrapped in brackets (e.g. `[kworker/0:1]`).
///
/// This only applies to the CPU/memory process list; GPU processes are all
/// kept.
#[inline]
pub fn should_include(name: &str) -> bool {
    !(name.is_empty() || name.starts_with('['))
}
