use std::collections::HashMap;

use grokscope_core::{NavEntry, ViewportId};

use crate::SessionError;

/// Added to the distance of lines at or before the cursor so they sort after
/// every line below it. Effectively infinite, not a file length.
pub const WRAP_DISTANCE: usize = 1_000_000_000;

/// Per-viewport stacks of locations to jump back to.
#[derive(Debug, Clone, Default)]
pub struct NavHistory {
    stacks: HashMap<ViewportId, Vec<NavEntry>>,
}

impl NavHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, viewport: ViewportId, entry: NavEntry) {
        self.stacks.entry(viewport).or_default().push(entry);
    }

    pub fn pop(&mut self, viewport: ViewportId) -> Result<NavEntry, SessionError> {
        self.stacks
            .get_mut(&viewport)
            .and_then(Vec::pop)
            .ok_or(SessionError::EmptyStack(viewport))
    }

    pub fn depth(&self, viewport: ViewportId) -> usize {
        self.stacks.get(&viewport).map_or(0, Vec::len)
    }

    pub fn viewports(&self) -> usize {
        self.stacks.len()
    }
}

/// Picks the annotated line reached first when moving forward from
/// `current_line`, wrapping past the end of the file.
///
/// Ties keep the earliest entry of `lines`.
pub fn next_annotation_target(current_line: usize, lines: &[usize]) -> Option<usize> {
    // Ordered by (wrapped, distance): lines ahead of the cursor always win.
    let mut best: Option<((bool, i128), usize)> = None;
    for &line in lines {
        let offset = line as i128 - current_line as i128;
        let key = if offset > 0 {
            (false, offset)
        } else {
            (true, offset + WRAP_DISTANCE as i128)
        };

        if best.is_none_or(|(best_key, _)| key < best_key) {
            best = Some((key, line));
        }
    }
    best.map(|(_, line)| line)
}
