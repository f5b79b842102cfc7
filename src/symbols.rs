//! Stable glyphs for processes, so a process can be picked out across tables.

use std::sync::Mutex;

use indexmap::IndexMap;

use crate::{collection::Pid, constants::DEFAULT_SYMBOLS};

#[derive(Debug)]
struct Assignments {
    /// Pid to glyph index, least recently used first.
    by_recency: IndexMap<Pid, usize>,

    /// Whether each glyph is currently assigned.
    taken: Vec<bool>,
}

/// Hands out glyphs from a fixed alphabet to pids.
///
/// A pid keeps its glyph for as long as it keeps being accessed. Once every
/// glyph is in use, the glyph of the least recently accessed pid is reassigned.
/// This is shared between whatever renders the tables, so all access is
/// behind a lock.
#[derive(Debug)]
pub struct SymbolAllocator {
    glyphs: Vec<char>,
    assignments: Mutex<Assignments>,
}

impl Default for SymbolAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOLS.to_vec())
    }
}

impl SymbolAllocator {
    pub fn new(glyphs: Vec<char>) -> Self {
        Self {
            assignments: Mutex::new(Assignments {
                by_recency: IndexMap::with_capacity(glyphs.len()),
                taken: vec![false; glyphs.len()],
            }),
            glyphs,
        }
    }

    /// Returns the glyph for `pid` and its index in the alphabet, assigning
    /// one if needed, and marks `pid` as the most recently used.
    ///
    /// Returns [`None`] only if the alphabet is empty.
    pub fn access_pid(&self, pid: Pid) -> Option<(char, usize)> {
        let mut assignments = self
            .assignments
            .lock()
            .expect("symbol lock should not be poisoned");

        let Assignments { by_recency, taken } = &mut *assignments;
        let last = by_recency.len().saturating_sub(1);

        let existing = by_recency
            .get_full(&pid)
            .map(|(position, _, &index)| (position, index));

        let index = if let Some((position, index)) = existing {
            by_recency.move_index(position, last);
            index
        } else if let Some(free) = taken.iter().position(|taken| !taken) {
            taken[free] = true;
            by_recency.insert(pid, free);
            free
        } else {
            let (evicted, index) = by_recency.shift_remove_index(0)?;
            log::trace!("Reassigning glyph {index} from pid {evicted} to pid {pid}.");
            by_recency.insert(pid, index);
            index
        };

        Some((self.glyphs[index], index))
    }

    /// The glyph alphabet.
    pub fn glyphs(&self) -> &[char] {
        &self.glyphs
    }

    /// How many pids currently hold a glyph.
    pub fn len(&self) -> usize {
        self.assignments
            .lock()
            .expect("symbol lock should not be poisoned")
            .by_recency
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
