use crate::position::Position;
use std::collections::BTreeSet;

/// Collects the positions whose endpoints changed since the last drain.
///
/// This is the change-notification sink handed to the surrounding game: after
/// a tick it drains the set and persists or redraws those blocks. Marking is
/// fire-and-forget and idempotent within one drain window.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    changed: BTreeSet<Position>,
    total_marks: u64,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an endpoint position as changed.
    pub fn mark(&mut self, pos: Position) {
        self.changed.insert(pos);
        self.total_marks += 1;
    }

    pub fn is_changed(&self, pos: Position) -> bool {
        self.changed.contains(&pos)
    }

    pub fn any_changed(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Iterate changed positions in position order.
    pub fn changed(&self) -> impl Iterator<Item = &Position> {
        self.changed.iter()
    }

    /// Take every changed position, leaving the tracker clean.
    pub fn drain(&mut self) -> Vec<Position> {
        std::mem::take(&mut self.changed).into_iter().collect()
    }

    /// Number of `mark` calls over the tracker's lifetime, including repeats.
    pub fn total_marks(&self) -> u64 {
        self.total_marks
    }
}
